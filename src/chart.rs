//! Plotly-shaped figure descriptions.
//!
//! A [`Figure`] serializes to `{ "data": [...], "layout": {...} }`, which
//! `Plotly.react` accepts as is. Every label is resolved through the
//! language table when the figure is built, so a language switch means
//! rebuilding the figures rather than patching them.

use serde::Serialize;

use crate::analysis::{intersections, summary, ChartKind, ThresholdControl};
use crate::compare::series_color;
use crate::i18n::Lang;
use crate::params::ParameterSet;
use crate::result::{
    Animation, CompareSeries, Comparison, Frame, Plane, Profile, ProfileAxis, ResultPayload, Volume,
};

const EXPOSURE_COLOR: &str = "rgb(31, 119, 180)";
const THICKNESS_COLOR: &str = "rgb(214, 39, 40)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: String,
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scatter {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mode: &'static str,
    pub line: LineStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<Vec<f64>>,
    pub colorscale: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeTrace {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub value: Vec<f64>,
    pub colorscale: &'static str,
    pub opacity: f64,
    pub surface_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Scatter(Scatter),
    Heatmap(Heatmap),
    Volume(VolumeTrace),
}

impl Trace {
    fn name(&self) -> &str {
        match self {
            Trace::Scatter(t) => &t.name,
            Trace::Heatmap(t) => &t.name,
            Trace::Volume(t) => &t.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub zaxis: Axis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub line: LineStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<String>,
    pub layer: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub xref: &'static str,
    pub yref: &'static str,
    pub showarrow: bool,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bordercolor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: String,
    pub xaxis: Axis,
    pub yaxis: Axis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<Scene>,
    pub shapes: Vec<Shape>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    /// Semantic plot name, also used for CSV file names.
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "data")]
    pub traces: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    fn new(name: &str, title: String, x_title: String, y_title: String) -> Self {
        Figure {
            name: name.to_string(),
            traces: Vec::new(),
            layout: Layout {
                title,
                xaxis: Axis { title: x_title },
                yaxis: Axis { title: y_title },
                scene: None,
                shapes: Vec::new(),
                annotations: Vec::new(),
            },
        }
    }

    /// Line traces that carry series data, in draw order.
    pub fn series(&self) -> impl Iterator<Item = &Scatter> {
        self.traces.iter().filter_map(|trace| match trace {
            Trace::Scatter(s) => Some(s),
            _ => None,
        })
    }

    pub fn trace_names(&self) -> Vec<&str> {
        self.traces.iter().map(Trace::name).collect()
    }
}

fn line(name: String, x: &[f64], y: &[f64], color: &str) -> Trace {
    Trace::Scatter(Scatter {
        name,
        x: x.to_vec(),
        y: y.to_vec(),
        mode: "lines",
        line: LineStyle {
            color: color.to_string(),
            width: 2.0,
            dash: None,
        },
    })
}

fn colorscale(kind: ChartKind) -> &'static str {
    match kind {
        ChartKind::Exposure => "Viridis",
        ChartKind::Thickness => "Plasma",
    }
}

fn profile_figures(profile: &Profile, lang: Lang) -> Vec<Figure> {
    let x_title = match profile.axis {
        ProfileAxis::Position => lang.text("axis_position"),
        ProfileAxis::Depth => lang.text("axis_depth"),
    };
    let (exposure_title, exposure_axis) = match profile.axis {
        ProfileAxis::Position => ("chart_exposure", "axis_exposure"),
        ProfileAxis::Depth => ("chart_intensity", "axis_intensity"),
    };
    let mut exposure = Figure::new(
        "exposure",
        lang.text(exposure_title).to_string(),
        x_title.to_string(),
        lang.text(exposure_axis).to_string(),
    );
    exposure.traces.push(line(
        lang.text("series_exposure").to_string(),
        &profile.x,
        &profile.exposure,
        EXPOSURE_COLOR,
    ));
    let mut thickness = Figure::new(
        "thickness",
        lang.text("chart_thickness").to_string(),
        x_title.to_string(),
        lang.text("axis_thickness").to_string(),
    );
    thickness.traces.push(line(
        lang.text("series_thickness").to_string(),
        &profile.x,
        &profile.thickness,
        THICKNESS_COLOR,
    ));
    vec![exposure, thickness]
}

fn plane_figures(plane: &Plane, lang: Lang) -> Vec<Figure> {
    [
        (ChartKind::Exposure, "exposure_xy", "chart_exposure_xy", "series_exposure", &plane.exposure),
        (ChartKind::Thickness, "thickness_xy", "chart_thickness_xy", "series_thickness", &plane.thickness),
    ]
    .into_iter()
    .map(|(kind, name, title, series, z)| {
        let mut fig = Figure::new(
            name,
            lang.text(title).to_string(),
            lang.text("axis_x").to_string(),
            lang.text("axis_y").to_string(),
        );
        fig.traces.push(Trace::Heatmap(Heatmap {
            name: lang.text(series).to_string(),
            x: plane.x.clone(),
            y: plane.y.clone(),
            z: z.clone(),
            colorscale: colorscale(kind),
        }));
        fig
    })
    .collect()
}

fn volume_figures(volume: &Volume, lang: Lang) -> Vec<Figure> {
    [
        (ChartKind::Exposure, "exposure_3d", "chart_exposure_3d", "series_exposure", &volume.exposure),
        (ChartKind::Thickness, "thickness_3d", "chart_thickness_3d", "series_thickness", &volume.thickness),
    ]
    .into_iter()
    .map(|(kind, name, title, series, values)| {
        let (x, y, z, value) = volume.points(values);
        let mut fig = Figure::new(
            name,
            lang.text(title).to_string(),
            lang.text("axis_x").to_string(),
            lang.text("axis_y").to_string(),
        );
        fig.layout.scene = Some(Scene {
            xaxis: Axis { title: lang.text("axis_x").to_string() },
            yaxis: Axis { title: lang.text("axis_y").to_string() },
            zaxis: Axis { title: lang.text("axis_z").to_string() },
        });
        fig.traces.push(Trace::Volume(VolumeTrace {
            name: lang.text(series).to_string(),
            x,
            y,
            z,
            value,
            colorscale: colorscale(kind),
            opacity: 0.1,
            surface_count: 17,
        }));
        fig
    })
    .collect()
}

fn frame_figures(frame: &Frame, lang: Lang) -> Vec<Figure> {
    match frame {
        Frame::Profile(p) => profile_figures(p, lang),
        Frame::Plane(p) => plane_figures(p, lang),
        Frame::Volume(v) => volume_figures(v, lang),
    }
}

/// Figures for one animation frame, each carrying a time label.
pub fn render_frame(animation: &Animation, index: usize, lang: Lang) -> Vec<Figure> {
    let frame = match animation.frames.get(index) {
        Some(frame) => frame,
        None => return Vec::new(),
    };
    let t = animation.times.get(index).copied().unwrap_or(0.0);
    let label = format!(
        "{}  {}",
        lang.format("time_label", &[("t", format!("{:.2}", t))]),
        lang.format(
            "frame_label",
            &[
                ("frame", (index + 1).to_string()),
                ("total", animation.frames.len().to_string()),
            ],
        )
    );
    let mut figures = frame_figures(frame, lang);
    for fig in &mut figures {
        fig.layout.annotations.push(Annotation {
            name: "time_label".into(),
            text: label.clone(),
            x: 0.5,
            y: 1.05,
            xref: "paper",
            yref: "paper",
            showarrow: false,
            visible: true,
            bordercolor: None,
        });
    }
    figures
}

/// Interactive figures for a single-calculation result. Static image
/// results have no figures; they are shown as the decoded PNGs.
pub fn render(payload: &ResultPayload, lang: Lang) -> Vec<Figure> {
    match payload {
        ResultPayload::OneD(p) => profile_figures(p, lang),
        ResultPayload::TwoD(p) => plane_figures(p, lang),
        ResultPayload::ThreeD(v) => volume_figures(v, lang),
        ResultPayload::Animated(a) => render_frame(a, 0, lang),
        ResultPayload::Images(_) => Vec::new(),
    }
}

fn set_name(sets: &[ParameterSet], set_id: u32, lang: Lang) -> String {
    match sets.iter().find(|set| set.id == set_id) {
        Some(set) => set.display_name(lang),
        None => lang.format("param_set_name", &[("id", set_id.to_string())]),
    }
}

/// Exposure and thickness comparison figures, one line per set.
pub fn comparison(data: &Comparison, sets: &[ParameterSet], lang: Lang) -> [Figure; 2] {
    let build = |name: &str, title: &str, y_title: &str, series: &[CompareSeries]| {
        let mut fig = Figure::new(
            name,
            lang.text(title).to_string(),
            lang.text("axis_position").to_string(),
            lang.text(y_title).to_string(),
        );
        for (i, s) in series.iter().enumerate() {
            fig.traces.push(line(set_name(sets, s.set_id, lang), &data.x, &s.data, series_color(i)));
        }
        fig
    };
    [
        build("exposure", "chart_compare_exposure", "axis_exposure", &data.exposure),
        build("thickness", "chart_compare_thickness", "axis_thickness", &data.thickness),
    ]
}

fn line_name(kind: ChartKind, index: usize) -> String {
    format!("threshold_line_{}_{}", kind.as_str(), index)
}

fn point_name(kind: ChartKind, index: usize, n: usize) -> String {
    format!("threshold_point_{}_{}_{}", kind.as_str(), index, n)
}

fn title_name(kind: ChartKind, index: usize) -> String {
    format!("threshold_{}_{}_title", kind.as_str(), index)
}

fn details_name(kind: ChartKind, index: usize) -> String {
    format!("threshold_{}_{}_details", kind.as_str(), index)
}

fn is_overlay(name: &str) -> bool {
    name.starts_with("threshold_")
}

/// Removes every threshold shape and annotation.
pub fn clear_overlays(fig: &mut Figure) {
    fig.layout.shapes.retain(|s| !is_overlay(&s.name));
    fig.layout.annotations.retain(|a| !is_overlay(&a.name));
}

/// Redraws threshold overlays from the figure's current series. Controls
/// pointing past the last series are skipped.
pub fn apply_thresholds(fig: &mut Figure, kind: ChartKind, controls: &[ThresholdControl], lang: Lang) {
    clear_overlays(fig);
    let series: Vec<Scatter> = fig.series().cloned().collect();
    for ctl in controls.iter().filter(|c| c.visible && c.kind == kind) {
        let s = match series.get(ctl.index) {
            Some(s) if !s.x.is_empty() => s,
            _ => continue,
        };
        let (x_min, x_max) = s
            .x
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let color = s.line.color.clone();
        fig.layout.shapes.push(Shape {
            name: line_name(kind, ctl.index),
            kind: "line",
            x0: x_min,
            x1: x_max,
            y0: ctl.value,
            y1: ctl.value,
            line: LineStyle {
                color: color.clone(),
                width: 2.0,
                dash: Some("dashdot"),
            },
            fillcolor: None,
            layer: "below",
        });

        let rx = (x_max - x_min).abs() * 0.005;
        let ry = (ctl.max - ctl.min).abs() * 0.01;
        for (n, c) in intersections(&s.x, &s.y, ctl.value).iter().enumerate() {
            fig.layout.shapes.push(Shape {
                name: point_name(kind, ctl.index, n),
                kind: "circle",
                x0: c.x - rx,
                x1: c.x + rx,
                y0: c.y - ry,
                y1: c.y + ry,
                line: LineStyle {
                    color: color.clone(),
                    width: 1.0,
                    dash: None,
                },
                fillcolor: Some(color.clone()),
                layer: "above",
            });
        }

        let marker = if ctl.expanded { "▲" } else { "▼" };
        let title_y = 0.95 - ctl.index as f64 * 0.08;
        let title = lang.format(
            "threshold_title",
            &[("name", s.name.clone()), ("value", ctl.display_value())],
        );
        fig.layout.annotations.push(Annotation {
            name: title_name(kind, ctl.index),
            text: format!("{} {}", marker, title),
            x: 0.02,
            y: title_y,
            xref: "paper",
            yref: "paper",
            showarrow: false,
            visible: true,
            bordercolor: Some(color),
        });
        fig.layout.annotations.push(Annotation {
            name: details_name(kind, ctl.index),
            text: summary(lang, kind, &s.name, &s.x, &s.y, ctl.value).join("<br>"),
            x: 0.02,
            y: title_y - 0.15,
            xref: "paper",
            yref: "paper",
            showarrow: false,
            visible: ctl.expanded,
            bordercolor: Some("#ccc".into()),
        });
    }
}

const MEASURE_COLOR: &str = "#ff6600";

fn span(values: &[f64]) -> f64 {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if hi > lo {
        hi - lo
    } else {
        1.0
    }
}

pub fn clear_measurement(fig: &mut Figure) {
    fig.layout.shapes.retain(|s| !s.name.starts_with("measure_"));
    fig.layout.annotations.retain(|a| !a.name.starts_with("measure_"));
}

/// Replaces the measurement marks with `points` (one or two), joined by a
/// line and labelled once complete.
pub fn mark_measurement(fig: &mut Figure, points: &[(f64, f64)], label: Option<String>) {
    clear_measurement(fig);
    let (rx, ry) = match fig.series().next() {
        Some(s) => (span(&s.x) * 0.005, span(&s.y) * 0.01),
        None => (0.005, 0.01),
    };
    let style = |width| LineStyle {
        color: MEASURE_COLOR.into(),
        width,
        dash: None,
    };
    for (n, (x, y)) in points.iter().take(2).enumerate() {
        fig.layout.shapes.push(Shape {
            name: format!("measure_point_{}", n),
            kind: "circle",
            x0: x - rx,
            x1: x + rx,
            y0: y - ry,
            y1: y + ry,
            line: style(1.0),
            fillcolor: Some(MEASURE_COLOR.into()),
            layer: "above",
        });
    }
    if let [a, b, ..] = points {
        fig.layout.shapes.push(Shape {
            name: "measure_line".into(),
            kind: "line",
            x0: a.0,
            x1: b.0,
            y0: a.1,
            y1: b.1,
            line: LineStyle {
                dash: Some("dot"),
                ..style(2.0)
            },
            fillcolor: None,
            layer: "above",
        });
        if let Some(text) = label {
            fig.layout.annotations.push(Annotation {
                name: "measure_result".into(),
                text,
                x: (a.0 + b.0) / 2.0,
                y: (a.1 + b.1) / 2.0,
                xref: "x",
                yref: "y",
                showarrow: true,
                visible: true,
                bordercolor: Some(MEASURE_COLOR.into()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelKind;

    fn comparison_data() -> Comparison {
        Comparison {
            x: vec![0.0, 1.0, 2.0, 3.0],
            exposure: vec![
                CompareSeries { set_id: 1, data: vec![0.0, 100.0, 0.0, 100.0] },
                CompareSeries { set_id: 2, data: vec![50.0, 60.0, 50.0, 60.0] },
            ],
            thickness: vec![
                CompareSeries { set_id: 1, data: vec![1.0, 0.2, 1.0, 0.2] },
                CompareSeries { set_id: 2, data: vec![0.9, 0.5, 0.9, 0.5] },
            ],
        }
    }

    fn sets() -> Vec<ParameterSet> {
        let mut a = ParameterSet::new(1, ModelKind::Dill);
        a.custom_name = Some("A".into());
        vec![a, ParameterSet::new(2, ModelKind::Dill)]
    }

    #[test]
    fn test_profile_labels_follow_language() {
        let payload = ResultPayload::OneD(Profile {
            axis: ProfileAxis::Position,
            x: vec![0.0, 1.0],
            exposure: vec![1.0, 2.0],
            thickness: vec![0.5, 0.4],
        });
        let zh = render(&payload, Lang::Zh);
        let en = render(&payload, Lang::En);
        assert_eq!(zh.len(), 2);
        assert_eq!(zh[0].layout.xaxis.title, "位置 (μm)");
        assert_eq!(en[0].layout.xaxis.title, "Position (μm)");
        assert_eq!(en[1].layout.title, "Photoresist Thickness Distribution");
        assert_eq!(en[0].name, "exposure");
    }

    #[test]
    fn test_plane_uses_channel_colorscales() {
        let payload = ResultPayload::TwoD(Plane {
            x: vec![0.0, 1.0],
            y: vec![0.0],
            exposure: vec![vec![1.0, 2.0]],
            thickness: vec![vec![0.1, 0.2]],
        });
        let figs = render(&payload, Lang::En);
        let scales: Vec<_> = figs
            .iter()
            .map(|f| match &f.traces[0] {
                Trace::Heatmap(h) => h.colorscale,
                _ => "",
            })
            .collect();
        assert_eq!(scales, vec!["Viridis", "Plasma"]);
        let json = serde_json::to_value(&figs[0]).unwrap();
        assert_eq!(json["data"][0]["type"], "heatmap");
        assert_eq!(json["layout"]["title"], "2D Exposure Dose Distribution");
    }

    #[test]
    fn test_frame_has_time_label() {
        let animation = Animation {
            times: vec![0.0, 0.5],
            frames: vec![
                Frame::Profile(Profile {
                    axis: ProfileAxis::Position,
                    x: vec![0.0],
                    exposure: vec![1.0],
                    thickness: vec![1.0],
                });
                2
            ],
        };
        let figs = render_frame(&animation, 1, Lang::En);
        assert_eq!(figs[0].layout.annotations[0].text, "Time: 0.50 s  Frame 2/2");
        assert!(render_frame(&animation, 5, Lang::En).is_empty());
    }

    #[test]
    fn test_comparison_names_and_colors() {
        let [exposure, thickness] = comparison(&comparison_data(), &sets(), Lang::En);
        assert_eq!(exposure.trace_names(), vec!["A", "Parameter Set 2"]);
        let colors: Vec<_> = thickness.series().map(|s| s.line.color.as_str()).collect();
        assert_eq!(colors, vec!["rgb(31, 119, 180)", "rgb(255, 127, 14)"]);
    }

    #[test]
    fn test_threshold_overlay() {
        let [mut exposure, _] = comparison(&comparison_data(), &sets(), Lang::En);
        let mut ctl = ThresholdControl::fallback(ChartKind::Exposure, 0);
        ctl.set_value(50.0);
        ctl.visible = true;
        apply_thresholds(&mut exposure, ChartKind::Exposure, &[ctl.clone()], Lang::En);

        let names: Vec<_> = exposure.layout.shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names[0], "threshold_line_exposure_0");
        assert_eq!(names.len(), 1 + 3);
        let title = &exposure.layout.annotations[0];
        assert_eq!(title.text, "▼ A threshold: 50.0 mJ/cm²");
        assert!(!exposure.layout.annotations[1].visible);

        ctl.visible = false;
        apply_thresholds(&mut exposure, ChartKind::Exposure, &[ctl], Lang::En);
        assert!(exposure.layout.shapes.is_empty());
        assert!(exposure.layout.annotations.is_empty());
    }

    #[test]
    fn test_stale_controls_are_skipped() {
        let [_, mut thickness] = comparison(&comparison_data(), &sets(), Lang::En);
        let mut ctl = ThresholdControl::fallback(ChartKind::Thickness, 5);
        ctl.visible = true;
        apply_thresholds(&mut thickness, ChartKind::Thickness, &[ctl], Lang::En);
        assert!(thickness.layout.shapes.is_empty());
    }

    #[test]
    fn test_measurement_marks_replace_each_other() {
        let [mut exposure, _] = comparison(&comparison_data(), &sets(), Lang::En);
        mark_measurement(&mut exposure, &[(0.0, 10.0)], None);
        assert_eq!(exposure.layout.shapes.len(), 1);

        mark_measurement(&mut exposure, &[(0.0, 10.0), (3.0, 14.0)], Some("d".into()));
        let names: Vec<_> = exposure.layout.shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["measure_point_0", "measure_point_1", "measure_line"]);
        assert_eq!(exposure.layout.annotations[0].x, 1.5);

        clear_measurement(&mut exposure);
        assert!(exposure.layout.shapes.is_empty());
        assert!(exposure.layout.annotations.is_empty());
    }
}
