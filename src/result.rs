//! Typed calculation results.
//!
//! The backend has grown several spellings for the same arrays depending on
//! model and dimensionality. [`normalize`] folds all of them into one
//! [`ResultPayload`] and checks shapes once, so nothing downstream needs to
//! probe JSON keys.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ResultError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAxis {
    Position,
    /// Enhanced Dill depth profiles run along z.
    Depth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub axis: ProfileAxis,
    pub x: Vec<f64>,
    pub exposure: Vec<f64>,
    pub thickness: Vec<f64>,
}

/// Row-major planes: `exposure[j][i]` sits at `(x[i], y[j])`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plane {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub exposure: Vec<Vec<f64>>,
    pub thickness: Vec<Vec<f64>>,
}

/// Flattened volumes, index `(i * ny + j) * nz + k` for `(x[i], y[j], z[k])`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Volume {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub exposure: Vec<f64>,
    pub thickness: Vec<f64>,
}

impl Volume {
    pub fn len(&self) -> usize {
        self.x.len() * self.y.len() * self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates and value of every sample, for scatter-style volume traces.
    pub fn points(&self, values: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut xs = Vec::with_capacity(self.len());
        let mut ys = Vec::with_capacity(self.len());
        let mut zs = Vec::with_capacity(self.len());
        let mut vs = Vec::with_capacity(self.len());
        for (i, x) in self.x.iter().enumerate() {
            for (j, y) in self.y.iter().enumerate() {
                for (k, z) in self.z.iter().enumerate() {
                    let idx = (i * self.y.len() + j) * self.z.len() + k;
                    xs.push(*x);
                    ys.push(*y);
                    zs.push(*z);
                    vs.push(values.get(idx).copied().unwrap_or(f64::NAN));
                }
            }
        }
        (xs, ys, zs, vs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Profile(Profile),
    Plane(Plane),
    Volume(Volume),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Animation {
    pub times: Vec<f64>,
    pub frames: Vec<Frame>,
}

/// Base64 PNG plots from the static-image endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotImages {
    pub exposure: String,
    pub thickness: String,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPlot {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PlotImages {
    pub fn decode_exposure(&self) -> Result<DecodedPlot, ResultError> {
        decode_png(&self.exposure)
    }

    pub fn decode_thickness(&self) -> Result<DecodedPlot, ResultError> {
        decode_png(&self.thickness)
    }
}

pub fn decode_png(encoded: &str) -> Result<DecodedPlot, ResultError> {
    let payload = match encoded.split_once("base64,") {
        Some((_, rest)) => rest,
        None => encoded,
    };
    let png = STANDARD
        .decode(payload.trim())
        .map_err(|e| ResultError::Image(format!("base64: {}", e)))?;
    let img = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
        .map_err(|e| ResultError::Image(e.to_string()))?;
    Ok(DecodedPlot {
        width: img.width(),
        height: img.height(),
        png,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPayload {
    OneD(Profile),
    TwoD(Plane),
    ThreeD(Volume),
    Animated(Animation),
    Images(PlotImages),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareSeries {
    pub set_id: u32,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub x: Vec<f64>,
    pub exposure: Vec<CompareSeries>,
    pub thickness: Vec<CompareSeries>,
}

fn shape(msg: impl Into<String>) -> ResultError {
    ResultError::Shape(msg.into())
}

fn floats(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

fn matrix(value: &Value) -> Option<Vec<Vec<f64>>> {
    value.as_array()?.iter().map(floats).collect()
}

fn nesting(value: &Value) -> usize {
    match value.as_array().and_then(|items| items.first()) {
        Some(first) => 1 + nesting(first),
        None if value.is_array() => 1,
        None => 0,
    }
}

/// First present key among `keys`, also looking inside `grid_data`.
fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let grid = obj.get("grid_data").and_then(Value::as_object);
    keys.iter().find_map(|key| {
        obj.get(*key)
            .filter(|v| !v.is_null())
            .or_else(|| grid.and_then(|g| g.get(*key)).filter(|v| !v.is_null()))
    })
}

fn coords(obj: &Map<String, Value>, keys: &[&str], name: &'static str) -> Result<Vec<f64>, ResultError> {
    let value = pick(obj, keys).ok_or(ResultError::Missing(name))?;
    floats(value).ok_or_else(|| shape(format!("{} is not a numeric array", name)))
}

const X_KEYS: &[&str] = &["x_coords", "x"];
const Y_KEYS: &[&str] = &["y_coords", "y"];
const EXPOSURE_KEYS: &[&str] = &["exposure_dose", "acid_concentration"];
const THICKNESS_KEYS: &[&str] = &["thickness", "deprotection"];
const EXPOSURE_XY_KEYS: &[&str] = &["z_exposure_dose", "xy_exposure", "exposure_xy"];
const THICKNESS_XY_KEYS: &[&str] = &["z_thickness", "xy_thickness", "thickness_xy"];

/// Accepts nested `[ny][nx]`, transposed `[nx][ny]` or a flat row-major list.
fn plane_values(value: &Value, nx: usize, ny: usize, name: &str) -> Result<Vec<Vec<f64>>, ResultError> {
    if nesting(value) == 1 {
        let flat = floats(value).ok_or_else(|| shape(format!("{} is not numeric", name)))?;
        if flat.len() != nx * ny {
            return Err(shape(format!(
                "{} has {} values, expected {}x{}",
                name,
                flat.len(),
                ny,
                nx
            )));
        }
        return Ok(flat.chunks(nx.max(1)).map(<[f64]>::to_vec).collect());
    }
    let rows = matrix(value).ok_or_else(|| shape(format!("{} is not a numeric matrix", name)))?;
    if rows.len() == ny && rows.iter().all(|row| row.len() == nx) {
        return Ok(rows);
    }
    if rows.len() == nx && rows.iter().all(|row| row.len() == ny) {
        return Ok((0..ny)
            .map(|j| (0..nx).map(|i| rows[i][j]).collect())
            .collect());
    }
    Err(shape(format!("{} does not match a {}x{} grid", name, ny, nx)))
}

fn volume_values(value: &Value, n: (usize, usize, usize), name: &str) -> Result<Vec<f64>, ResultError> {
    let flat: Option<Vec<f64>> = match nesting(value) {
        1 => floats(value),
        3 => value.as_array().and_then(|outer| {
            let mut out = Vec::new();
            for plane in outer {
                if plane.as_array()?.len() != n.1 {
                    return None;
                }
                for row in matrix(plane)? {
                    if row.len() != n.2 {
                        return None;
                    }
                    out.extend(row);
                }
            }
            Some(out)
        }),
        _ => None,
    };
    match flat {
        Some(values) if values.len() == n.0 * n.1 * n.2 => Ok(values),
        _ => Err(shape(format!(
            "{} does not match a {}x{}x{} volume",
            name, n.0, n.1, n.2
        ))),
    }
}

fn profile(obj: &Map<String, Value>) -> Result<Profile, ResultError> {
    // Enhanced Dill depth profile
    if let (Some(z), Some(i), Some(m)) = (obj.get("z"), obj.get("I"), obj.get("M")) {
        return profile_from(ProfileAxis::Depth, z, i, m);
    }
    let x = pick(obj, &["x", "positions", "x_coords"]).ok_or(ResultError::Missing("x"))?;
    let exposure = pick(obj, EXPOSURE_KEYS).ok_or(ResultError::Missing("exposure_dose"))?;
    let thickness = pick(obj, THICKNESS_KEYS).ok_or(ResultError::Missing("thickness"))?;
    profile_from(ProfileAxis::Position, x, exposure, thickness)
}

fn profile_from(axis: ProfileAxis, x: &Value, exposure: &Value, thickness: &Value) -> Result<Profile, ResultError> {
    let x = floats(x).ok_or_else(|| shape("x is not a numeric array"))?;
    let exposure = floats(exposure).ok_or_else(|| shape("exposure is not a numeric array"))?;
    let thickness = floats(thickness).ok_or_else(|| shape("thickness is not a numeric array"))?;
    if exposure.len() != x.len() || thickness.len() != x.len() {
        return Err(shape(format!(
            "profile lengths differ: x={}, exposure={}, thickness={}",
            x.len(),
            exposure.len(),
            thickness.len()
        )));
    }
    Ok(Profile {
        axis,
        x,
        exposure,
        thickness,
    })
}

fn has_volume(obj: &Map<String, Value>) -> bool {
    if obj.get("is_3d").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    pick(obj, &["z_coords"]).is_some()
        && pick(obj, EXPOSURE_KEYS).map(nesting) == Some(3)
}

fn volume(obj: &Map<String, Value>, exposure: &Value, thickness: &Value) -> Result<Volume, ResultError> {
    let x = coords(obj, X_KEYS, "x_coords")?;
    let y = coords(obj, Y_KEYS, "y_coords")?;
    let z = coords(obj, &["z_coords"], "z_coords")?;
    let n = (x.len(), y.len(), z.len());
    Ok(Volume {
        exposure: volume_values(exposure, n, "exposure")?,
        thickness: volume_values(thickness, n, "thickness")?,
        x,
        y,
        z,
    })
}

fn plane(obj: &Map<String, Value>, exposure: &Value, thickness: &Value) -> Result<Plane, ResultError> {
    let x = coords(obj, X_KEYS, "x_coords")?;
    let y = coords(obj, Y_KEYS, "y_coords")?;
    Ok(Plane {
        exposure: plane_values(exposure, x.len(), y.len(), "exposure")?,
        thickness: plane_values(thickness, x.len(), y.len(), "thickness")?,
        x,
        y,
    })
}

fn frame(obj: &Map<String, Value>, exposure: &Value, thickness: &Value) -> Result<Frame, ResultError> {
    match nesting(exposure) {
        3 => volume(obj, exposure, thickness).map(Frame::Volume),
        2 => plane(obj, exposure, thickness).map(Frame::Plane),
        _ if pick(obj, &["y_coords"]).is_some() => plane(obj, exposure, thickness).map(Frame::Plane),
        _ => {
            let x = pick(obj, &["x", "positions", "x_coords"]).ok_or(ResultError::Missing("x"))?;
            profile_from(ProfileAxis::Position, x, exposure, thickness).map(Frame::Profile)
        }
    }
}

fn animation(obj: &Map<String, Value>) -> Result<Animation, ResultError> {
    let exposure = obj
        .get("exposure_dose_frames")
        .and_then(Value::as_array)
        .ok_or(ResultError::Missing("exposure_dose_frames"))?;
    let thickness = obj
        .get("thickness_frames")
        .and_then(Value::as_array)
        .ok_or(ResultError::Missing("thickness_frames"))?;
    if exposure.len() != thickness.len() {
        return Err(shape(format!(
            "{} exposure frames but {} thickness frames",
            exposure.len(),
            thickness.len()
        )));
    }
    let times = match obj.get("time_array") {
        Some(value) => floats(value).ok_or_else(|| shape("time_array is not numeric"))?,
        None => (0..exposure.len()).map(|i| i as f64).collect(),
    };
    if times.len() != exposure.len() {
        return Err(shape(format!(
            "{} time points for {} frames",
            times.len(),
            exposure.len()
        )));
    }
    let frames = exposure
        .iter()
        .zip(thickness)
        .map(|(e, t)| frame(obj, e, t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Animation { times, frames })
}

/// Normalizes a `calculate_data` payload.
pub fn normalize(data: &Value) -> Result<ResultPayload, ResultError> {
    let obj = data
        .as_object()
        .ok_or_else(|| shape("result is not an object"))?;

    let animated = obj
        .get("exposure_dose_frames")
        .and_then(Value::as_array)
        .is_some_and(|frames| !frames.is_empty());
    if animated {
        return animation(obj).map(ResultPayload::Animated);
    }

    if has_volume(obj) {
        let exposure = pick(obj, EXPOSURE_KEYS).ok_or(ResultError::Missing("exposure_dose"))?;
        let thickness = pick(obj, THICKNESS_KEYS).ok_or(ResultError::Missing("thickness"))?;
        return volume(obj, exposure, thickness).map(ResultPayload::ThreeD);
    }

    if let (Some(exposure), Some(thickness)) =
        (pick(obj, EXPOSURE_XY_KEYS), pick(obj, THICKNESS_XY_KEYS))
    {
        return plane(obj, exposure, thickness).map(ResultPayload::TwoD);
    }
    if obj.get("is_2d").and_then(Value::as_bool) == Some(true)
        || pick(obj, EXPOSURE_KEYS).map(nesting) == Some(2)
    {
        let exposure = pick(obj, EXPOSURE_KEYS).ok_or(ResultError::Missing("exposure_dose"))?;
        let thickness = pick(obj, THICKNESS_KEYS).ok_or(ResultError::Missing("thickness"))?;
        return plane(obj, exposure, thickness).map(ResultPayload::TwoD);
    }

    profile(obj).map(ResultPayload::OneD)
}

/// Normalizes a `calculate` or `compare` image payload.
pub fn normalize_images(data: &Value) -> Result<PlotImages, ResultError> {
    let text = |keys: &[&str], name: &'static str| -> Result<String, ResultError> {
        keys.iter()
            .find_map(|key| data.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or(ResultError::Missing(name))
    };
    let colors = data
        .get("colors")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(PlotImages {
        exposure: text(&["exposure_plot", "exposure_comparison_plot"], "exposure_plot")?,
        thickness: text(&["thickness_plot", "thickness_comparison_plot"], "thickness_plot")?,
        colors,
    })
}

fn compare_series(items: &[Value], len: usize, name: &str) -> Result<Vec<CompareSeries>, ResultError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let set_id = match item.get("setId") {
                Some(Value::Number(n)) => n.as_u64().map(|v| v as u32),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            }
            .unwrap_or(i as u32 + 1);
            let data = item
                .get("data")
                .and_then(floats)
                .ok_or_else(|| shape(format!("{} entry {} has no numeric data", name, set_id)))?;
            if data.len() != len {
                return Err(shape(format!(
                    "{} entry {} has {} samples, expected {}",
                    name,
                    set_id,
                    data.len(),
                    len
                )));
            }
            Ok(CompareSeries { set_id, data })
        })
        .collect()
}

/// Normalizes a `compare_data` payload.
pub fn normalize_comparison(data: &Value) -> Result<Comparison, ResultError> {
    let x = data
        .get("x")
        .and_then(floats)
        .ok_or(ResultError::Missing("x"))?;
    let list = |key: &'static str| {
        data.get(key)
            .and_then(Value::as_array)
            .ok_or(ResultError::Missing(key))
    };
    let exposure = compare_series(list("exposure_doses")?, x.len(), "exposure_doses")?;
    let thickness = compare_series(list("thicknesses")?, x.len(), "thicknesses")?;
    if exposure.len() != thickness.len() {
        return Err(shape("exposure and thickness series counts differ"));
    }
    Ok(Comparison {
        x,
        exposure,
        thickness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_aliases() {
        let payload = normalize(&json!({
            "positions": [0.0, 1.0, 2.0],
            "acid_concentration": [1.0, 2.0, 3.0],
            "deprotection": [0.1, 0.2, 0.3],
        }))
        .unwrap();
        match payload {
            ResultPayload::OneD(p) => {
                assert_eq!(p.axis, ProfileAxis::Position);
                assert_eq!(p.exposure, vec![1.0, 2.0, 3.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_enhanced_depth_profile() {
        let payload = normalize(&json!({"z": [0, 1], "I": [1.0, 0.5], "M": [0.9, 0.95]})).unwrap();
        assert!(matches!(payload, ResultPayload::OneD(Profile { axis: ProfileAxis::Depth, .. })));
    }

    #[test]
    fn test_profile_length_mismatch() {
        let err = normalize(&json!({"x": [0, 1, 2], "exposure_dose": [1, 2], "thickness": [1, 1, 1]}))
            .unwrap_err();
        assert!(matches!(err, ResultError::Shape(_)));
    }

    #[test]
    fn test_plane_reshape_and_transpose() {
        let flat = normalize(&json!({
            "x_coords": [0, 1, 2],
            "y_coords": [0, 1],
            "z_exposure_dose": [1, 2, 3, 4, 5, 6],
            "z_thickness": [[1, 1], [1, 1], [1, 1]],
        }))
        .unwrap();
        match flat {
            ResultPayload::TwoD(p) => {
                assert_eq!(p.exposure, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
                assert_eq!(p.thickness.len(), 2);
                assert_eq!(p.thickness[0].len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = normalize(&json!({
            "x_coords": [0, 1, 2],
            "y_coords": [0, 1],
            "xy_exposure": [1, 2, 3, 4, 5],
            "xy_thickness": [1, 2, 3, 4, 5, 6],
        }))
        .unwrap_err();
        assert!(matches!(err, ResultError::Shape(_)));
    }

    #[test]
    fn test_grid_data_fallback() {
        let payload = normalize(&json!({
            "grid_data": {
                "x": [0, 1],
                "y": [0, 1],
                "acid_concentration": [[1, 2], [3, 4]],
                "deprotection": [[0, 0], [0, 0]],
            }
        }))
        .unwrap();
        assert!(matches!(payload, ResultPayload::TwoD(_)));
    }

    #[test]
    fn test_volume() {
        let payload = normalize(&json!({
            "is_3d": true,
            "x_coords": [0, 1],
            "y_coords": [0, 1],
            "z_coords": [0],
            "exposure_dose": [[[1], [2]], [[3], [4]]],
            "thickness": [0.1, 0.2, 0.3, 0.4],
        }))
        .unwrap();
        match payload {
            ResultPayload::ThreeD(v) => {
                assert_eq!(v.exposure, vec![1.0, 2.0, 3.0, 4.0]);
                let (xs, ys, _, vs) = v.points(&v.exposure);
                assert_eq!(xs, vec![0.0, 0.0, 1.0, 1.0]);
                assert_eq!(ys, vec![0.0, 1.0, 0.0, 1.0]);
                assert_eq!(vs[3], 4.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_animation_frames() {
        let payload = normalize(&json!({
            "x_coords": [0, 1],
            "y_coords": [0, 1],
            "time_array": [0.0, 0.5],
            "exposure_dose_frames": [[[1, 2], [3, 4]], [[2, 3], [4, 5]]],
            "thickness_frames": [[[1, 1], [1, 1]], [[0.9, 0.9], [0.9, 0.9]]],
        }))
        .unwrap();
        match payload {
            ResultPayload::Animated(a) => {
                assert_eq!(a.times, vec![0.0, 0.5]);
                assert_eq!(a.frames.len(), 2);
                assert!(matches!(a.frames[1], Frame::Plane(_)));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = normalize(&json!({
            "x": [0, 1],
            "time_array": [0.0],
            "exposure_dose_frames": [[1, 2], [3, 4]],
            "thickness_frames": [[1, 1], [1, 1]],
        }))
        .unwrap_err();
        assert!(matches!(err, ResultError::Shape(_)));
    }

    #[test]
    fn test_comparison() {
        let cmp = normalize_comparison(&json!({
            "x": [0, 1, 2],
            "exposure_doses": [
                {"setId": "1", "params": {}, "data": [1, 2, 3]},
                {"setId": 4, "params": {}, "data": [3, 2, 1]},
            ],
            "thicknesses": [
                {"setId": "1", "data": [1, 1, 1]},
                {"setId": 4, "data": [0, 0, 0]},
            ],
        }))
        .unwrap();
        assert_eq!(cmp.exposure[0].set_id, 1);
        assert_eq!(cmp.exposure[1].set_id, 4);
        assert_eq!(cmp.thickness[1].data, vec![0.0, 0.0, 0.0]);

        let err = normalize_comparison(&json!({
            "x": [0, 1],
            "exposure_doses": [{"data": [1]}],
            "thicknesses": [{"data": [1, 2]}],
        }))
        .unwrap_err();
        assert!(matches!(err, ResultError::Shape(_)));
    }

    #[test]
    fn test_png_decoding() {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        let encoded = STANDARD.encode(bytes.get_ref());

        let images = normalize_images(&json!({
            "exposure_comparison_plot": format!("data:image/png;base64,{}", encoded),
            "thickness_comparison_plot": encoded,
            "colors": ["#1f77b4"],
        }))
        .unwrap();
        let plot = images.decode_exposure().unwrap();
        assert_eq!((plot.width, plot.height), (3, 2));
        assert_eq!(images.colors, vec!["#1f77b4".to_string()]);

        assert!(matches!(decode_png("bm90IGEgcG5n"), Err(ResultError::Image(_))));
        assert!(matches!(decode_png("***"), Err(ResultError::Image(_))));
    }
}
