use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::chart::{Figure, Trace};
use crate::error::ExportError;

pub fn filename(plot: &str) -> String {
    format!("{}_data.csv", plot)
}

pub fn profile_csv(x: &[f64], y: &[f64]) -> Result<String, ExportError> {
    if x.is_empty() {
        return Err(ExportError::Empty);
    }
    if x.len() != y.len() {
        return Err(ExportError::LengthMismatch { axis: x.len(), data: y.len() });
    }
    let mut out = String::from("x,y\n");
    for (xi, yi) in x.iter().zip(y) {
        let _ = writeln!(out, "{},{}", xi, yi);
    }
    Ok(out)
}

/// `y/x,x0,x1,...` header, one row per y. `z` is indexed `[y][x]`.
pub fn plane_csv(x: &[f64], y: &[f64], z: &[Vec<f64>]) -> Result<String, ExportError> {
    if x.is_empty() || y.is_empty() {
        return Err(ExportError::Empty);
    }
    if z.len() != y.len() {
        return Err(ExportError::LengthMismatch { axis: y.len(), data: z.len() });
    }
    let mut out = String::from("y/x");
    for xi in x {
        let _ = write!(out, ",{}", xi);
    }
    out.push('\n');
    for (yi, row) in y.iter().zip(z) {
        if row.len() != x.len() {
            return Err(ExportError::LengthMismatch { axis: x.len(), data: row.len() });
        }
        let _ = write!(out, "{}", yi);
        for v in row {
            let _ = write!(out, ",{}", v);
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn figure_csv(fig: &Figure) -> Result<(String, String), ExportError> {
    let body = match fig.traces.first() {
        None => return Err(ExportError::Empty),
        Some(Trace::Scatter(s)) => profile_csv(&s.x, &s.y)?,
        Some(Trace::Heatmap(h)) => plane_csv(&h.x, &h.y, &h.z)?,
        Some(Trace::Volume(_)) => return Err(ExportError::Unsupported(fig.name.clone())),
    };
    Ok((filename(&fig.name), body))
}

pub fn write_figure(fig: &Figure, dir: &Path) -> Result<PathBuf, ExportError> {
    let (name, body) = figure_csv(fig)?;
    let path = dir.join(name);
    fs::write(&path, body)?;
    info!("exported {}", path.display());
    Ok(path)
}
