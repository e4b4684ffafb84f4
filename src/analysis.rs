//! Threshold analysis of 1D series, two-point measurement and the
//! closed-form point breakdown shown when a sample is clicked.

use serde::{Deserialize, Serialize};

use crate::i18n::Lang;
use crate::model::ModelKind;
use crate::params::ParameterSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Exposure,
    Thickness,
}

impl ChartKind {
    pub const ALL: [ChartKind; 2] = [ChartKind::Exposure, ChartKind::Thickness];

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Exposure => "exposure",
            ChartKind::Thickness => "thickness",
        }
    }

    pub fn from_id(value: &str) -> Option<Self> {
        match value {
            "exposure" => Some(ChartKind::Exposure),
            "thickness" => Some(ChartKind::Thickness),
            _ => None,
        }
    }

    fn unit(self) -> &'static str {
        match self {
            ChartKind::Exposure => " mJ/cm²",
            ChartKind::Thickness => "",
        }
    }

    fn decimals(self) -> usize {
        match self {
            ChartKind::Exposure => 1,
            ChartKind::Thickness => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Crossing {
    pub x: f64,
    pub y: f64,
    /// Index of the left sample of the bracketing pair.
    pub segment: usize,
}

/// Every point where `y` crosses `v`, one per sign change of `y[i] - v`.
///
/// A sample is below when `y < v` and at-or-above otherwise, so a curve
/// touching the threshold without passing it yields no crossing.
pub fn intersections(x: &[f64], y: &[f64], v: f64) -> Vec<Crossing> {
    let n = x.len().min(y.len());
    let mut out = Vec::new();
    for i in 1..n {
        let (y1, y2) = (y[i - 1], y[i]);
        if (y1 < v) == (y2 < v) {
            continue;
        }
        let (x1, x2) = (x[i - 1], x[i]);
        let t = (v - y1) / (y2 - y1);
        out.push(Crossing {
            x: x1 + t * (x2 - x1),
            y: v,
            segment: i - 1,
        });
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Coverage {
    pub above_length: f64,
    pub below_length: f64,
    pub above_area: f64,
    pub below_area: f64,
    pub above_percent: f64,
}

/// Classifies each segment by its trapezoid midpoint.
pub fn coverage(x: &[f64], y: &[f64], v: f64) -> Coverage {
    let n = x.len().min(y.len());
    let mut cov = Coverage::default();
    for i in 1..n {
        let dx = x[i] - x[i - 1];
        let mid = (y[i - 1] + y[i]) / 2.0;
        if mid > v {
            cov.above_area += (mid - v) * dx;
            cov.above_length += dx;
        } else {
            cov.below_area += (v - mid) * dx;
            cov.below_length += dx;
        }
    }
    let span = if n > 1 { x[n - 1] - x[0] } else { 0.0 };
    cov.above_percent = if span.abs() > f64::EPSILON {
        cov.above_length / span * 100.0
    } else {
        0.0
    };
    cov
}

const DEFAULT_PERCENTAGES: [f64; 4] = [0.3, 0.5, 0.7, 0.4];

/// Slider state for one series' threshold line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdControl {
    pub kind: ChartKind,
    pub index: usize,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: f64,
    pub visible: bool,
    /// Whether the detailed analysis annotation is unfolded.
    pub expanded: bool,
}

fn extent(values: &[f64]) -> Option<(f64, f64)> {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    let first = finite.next()?;
    Some(finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

impl ThresholdControl {
    /// Range, step and default taken from the series' own data. Returns
    /// `None` when the series has no finite samples.
    pub fn derive(values: &[f64], kind: ChartKind, index: usize) -> Option<Self> {
        let (lo, hi) = extent(values)?;
        let span = hi - lo;
        let (min, max, step) = match kind {
            ChartKind::Exposure => (
                (lo - span * 0.1).max(0.0),
                hi + span * 0.1,
                (span / 1000.0).max(0.1),
            ),
            ChartKind::Thickness => {
                let min = (lo - span * 0.05).max(0.0);
                let max = (hi + span * 0.05).min(1.0).max(min);
                (min, max, (span / 1000.0).max(0.001))
            }
        };
        let pct = DEFAULT_PERCENTAGES[index % DEFAULT_PERCENTAGES.len()];
        let value = (lo + span * pct).clamp(min, max);
        Some(ThresholdControl {
            kind,
            index,
            min,
            max,
            step,
            value,
            visible: false,
            expanded: false,
        })
    }

    /// Range used before any data has been drawn.
    pub fn fallback(kind: ChartKind, index: usize) -> Self {
        let (min, max, step, value) = match kind {
            ChartKind::Exposure => {
                let value = [80.0, 100.0, 120.0, 90.0].get(index).copied().unwrap_or(100.0);
                (10.0, 200.0, 1.0, value)
            }
            ChartKind::Thickness => {
                let value = DEFAULT_PERCENTAGES.get(index).copied().unwrap_or(0.5);
                (0.0, 1.0, 0.01, value)
            }
        };
        ThresholdControl {
            kind,
            index,
            min,
            max,
            step,
            value,
            visible: false,
            expanded: false,
        }
    }

    pub fn set_value(&mut self, value: f64) -> f64 {
        self.value = if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.min
        };
        self.value
    }

    pub fn display_value(&self) -> String {
        format!("{:.*}{}", self.kind.decimals(), self.value, self.kind.unit())
    }
}

/// Localized analysis lines for one threshold over one series.
pub fn summary(lang: Lang, kind: ChartKind, name: &str, x: &[f64], y: &[f64], v: f64) -> Vec<String> {
    let crossings = intersections(x, y, v);
    let cov = coverage(x, y, v);
    let unit = kind.unit();
    let mut lines = vec![lang.format(
        "threshold_title",
        &[("name", name.to_string()), ("value", format!("{:.2}{}", v, unit))],
    )];

    if crossings.is_empty() {
        lines.push(lang.text("analysis_no_crossings").to_string());
        lines.push(
            lang.text(match kind {
                ChartKind::Exposure => "analysis_no_exposure",
                ChartKind::Thickness => "analysis_no_thickness",
            })
            .to_string(),
        );
    } else {
        lines.push(lang.format("analysis_crossings", &[("count", crossings.len().to_string())]));
        for (g, group) in crossings.chunks(3).enumerate() {
            let text: Vec<String> = group
                .iter()
                .enumerate()
                .map(|(i, c)| format!("#{}: x={:.2}μm", g * 3 + i + 1, c.x))
                .collect();
            lines.push(format!("  {}", text.join("  ")));
        }
        let percent = format!("{:.1}", cov.above_percent);
        match kind {
            ChartKind::Exposure if crossings.len() >= 2 => {
                let width = (crossings[1].x - crossings[0].x).abs();
                lines.push(lang.text("analysis_process").to_string());
                lines.push(format!(
                    "  {}",
                    lang.format("analysis_line_width", &[("width", format!("{:.2}", width))])
                ));
                lines.push(format!("  {}", lang.format("analysis_window", &[("percent", percent)])));
            }
            ChartKind::Exposure => {}
            ChartKind::Thickness => {
                lines.push(lang.text("analysis_process").to_string());
                lines.push(format!(
                    "  {}",
                    lang.format("analysis_thickness_ok", &[("percent", percent)])
                ));
                if cov.above_percent < 80.0 {
                    lines.push(format!("  {}", lang.text("analysis_coverage_low")));
                }
            }
        }
    }

    lines.push(lang.format("analysis_above", &[("percent", format!("{:.1}", cov.above_percent))]));
    match kind {
        ChartKind::Exposure => lines.push(lang.format(
            "analysis_integral_diff",
            &[("value", format!("{:.1}{}·μm", cov.above_area, unit))],
        )),
        ChartKind::Thickness => {
            let mean = cov.above_area / cov.above_length.max(0.001);
            lines.push(lang.format("analysis_mean_excess", &[("value", format!("{:.3}", mean))]));
        }
    }

    let peak = extent(y).map(|(_, hi)| hi).unwrap_or(0.0);
    if peak.abs() > f64::EPSILON {
        let ratio = v / peak * 100.0;
        lines.push(lang.format("analysis_ratio", &[("percent", format!("{:.1}", ratio))]));
        match kind {
            ChartKind::Exposure if ratio < 50.0 => lines.push(lang.text("advice_low").to_string()),
            ChartKind::Exposure if ratio > 90.0 => lines.push(lang.text("advice_high").to_string()),
            ChartKind::Exposure => {}
            ChartKind::Thickness => {
                let key = if cov.above_percent > 90.0 {
                    "advice_thickness_good"
                } else if cov.above_percent > 70.0 {
                    "advice_thickness_fair"
                } else {
                    "advice_thickness_poor"
                };
                lines.push(lang.text(key).to_string());
            }
        }
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    pub dx: f64,
    pub dy: f64,
    pub distance: f64,
}

impl Measurement {
    pub fn between(a: (f64, f64), b: (f64, f64)) -> Self {
        let dx = b.0 - a.0;
        let dy = b.1 - a.1;
        Measurement {
            dx,
            dy,
            distance: dx.hypot(dy),
        }
    }

    pub fn describe(&self, lang: Lang) -> String {
        lang.format(
            "measure_result",
            &[
                ("dx", format!("{:.3}", self.dx)),
                ("dy", format!("{:.3}", self.dy)),
                ("distance", format!("{:.3}", self.distance)),
            ],
        )
    }
}

/// Chart click handling. Measuring and point info never coexist.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Measuring { first: Option<(f64, f64)> },
    PointInfo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Click {
    Ignored,
    MeasureStarted,
    Measured(Measurement),
    Inspect { x: f64, y: f64 },
}

impl InteractionMode {
    /// Turning measurement on discards point info; turning it off drops a
    /// half-finished measurement.
    pub fn toggle_measurement(&mut self) -> bool {
        *self = match self {
            InteractionMode::Measuring { .. } => InteractionMode::Idle,
            _ => InteractionMode::Measuring { first: None },
        };
        self.is_measuring()
    }

    pub fn toggle_point_info(&mut self) -> bool {
        *self = match self {
            InteractionMode::PointInfo => InteractionMode::Idle,
            _ => InteractionMode::PointInfo,
        };
        *self == InteractionMode::PointInfo
    }

    pub fn is_measuring(&self) -> bool {
        matches!(self, InteractionMode::Measuring { .. })
    }

    pub fn click(&mut self, x: f64, y: f64) -> Click {
        match self {
            InteractionMode::Idle => Click::Ignored,
            InteractionMode::PointInfo => Click::Inspect { x, y },
            InteractionMode::Measuring { first } => match first.take() {
                None => {
                    *first = Some((x, y));
                    Click::MeasureStarted
                }
                Some(start) => Click::Measured(Measurement::between(start, (x, y))),
            },
        }
    }
}

/// Closed-form values behind one clicked sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointInfo {
    pub model: ModelKind,
    pub kind: ChartKind,
    pub set_name: String,
    pub x: f64,
    pub y: f64,
    pub formula: &'static str,
    /// `(i18n key, value)` pairs in display order.
    pub terms: Vec<(&'static str, f64)>,
}

impl PointInfo {
    pub fn lines(&self, lang: Lang) -> Vec<String> {
        let mut lines = vec![
            format!("{}: {:.3} μm", lang.text("point_position"), self.x),
            format!("{}: {:.3}", lang.text("point_value"), self.y),
            self.formula.to_string(),
        ];
        lines.extend(
            self.terms
                .iter()
                .map(|(key, value)| format!("{}: {:.4}", lang.text(key), value)),
        );
        lines
    }
}

/// A/B/C fit of resist thickness and prebake temperature (AZ4562).
pub fn enhanced_dill_abc(z_h: f64, t: f64) -> (f64, f64, f64) {
    let d = z_h;
    let a = -0.11989 * d + 0.00466 * t + 0.00551 * d * d - 0.0001084 * d * t - 0.00001287 * t * t
        + 0.79655;
    let b = 0.00066301 * d + 0.00024413 * t - 0.0096;
    let c = -0.01233 * d + 0.00054385 * t + 0.00056988 * d * d - 0.00001487 * d * t
        - 0.00000115 * t * t
        + 0.0629;
    (a, b, c)
}

fn modulation(set: &ParameterSet, x: f64) -> f64 {
    let v = set.number("V").unwrap_or(0.0);
    let k = set.number("K").unwrap_or(0.0);
    1.0 + v * (k * x).cos()
}

pub fn point_info(set: &ParameterSet, kind: ChartKind, x: f64, y: f64, lang: Lang) -> PointInfo {
    let p = |key: &str| set.number(key).unwrap_or(0.0);
    let (formula, terms) = match set.model {
        ModelKind::Dill => {
            let dose = p("I_avg") * p("t_exp") * modulation(set, x);
            let m = (-p("C") * dose).exp();
            let formula = match kind {
                ChartKind::Exposure => "D(x) = I_avg × t_exp × (1 + V × cos(K·x))",
                ChartKind::Thickness => "M(x) = exp(-C × D(x))",
            };
            (formula, vec![("point_dose", dose), ("point_pac", m)])
        }
        ModelKind::EnhancedDill => {
            let (a, b, c) = enhanced_dill_abc(p("z_h"), p("T"));
            let intensity = p("I0") * modulation(set, x);
            let formula = match kind {
                ChartKind::Exposure => "I(x) = I0 × (1 + V × cos(K·x))",
                ChartKind::Thickness => "∂M/∂t = -I·M·C(z_h, T, t_B)",
            };
            (
                formula,
                vec![
                    ("point_fit_a", a),
                    ("point_fit_b", b),
                    ("point_fit_c", c),
                    ("point_intensity", intensity),
                ],
            )
        }
        ModelKind::Car => {
            let dose = p("I_avg") * p("t_exp") * modulation(set, x);
            let acid = p("acid_gen_efficiency") * dose;
            let deprotection = 1.0 - (-p("reaction_rate") * acid * p("amplification")).exp();
            let formula = match kind {
                ChartKind::Exposure => "[H⁺] = η × D(x)",
                ChartKind::Thickness => "M = 1 - exp(-k·[H⁺]·A)",
            };
            (
                formula,
                vec![
                    ("point_dose", dose),
                    ("point_acid", acid),
                    ("point_deprotection", deprotection),
                ],
            )
        }
    };
    PointInfo {
        model: set.model,
        kind,
        set_name: set.display_name(lang),
        x,
        y,
        formula,
        terms,
    }
}
