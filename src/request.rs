//! Request bodies for the calculation endpoints.
//!
//! Only fields that matter for the chosen dimensionality are written;
//! anything else is left out rather than sent as zero.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::PhaseError;
use crate::model::{FieldSpec, SineType, ANIMATION_FIELDS};
use crate::params::{DimensionSettings, ParameterPanel, ParameterSet};
use crate::phase::PhaseExpr;

pub type Body = Map<String, Value>;

fn number(spec: &FieldSpec, value: f64) -> Value {
    if spec.integer {
        Value::from(value.round() as i64)
    } else {
        Value::from(value)
    }
}

fn model_fields(set: &ParameterSet, sine: SineType) -> Body {
    let mut body = Body::new();
    body.insert("model_type".into(), Value::from(set.model.as_str()));
    for (key, value) in set.numbers_for(sine) {
        body.insert(key.into(), Value::from(value));
    }
    for (alias, source) in set.model.request_aliases() {
        if let Some(value) = set.number(source) {
            body.insert((*alias).into(), Value::from(value));
        }
    }
    body
}

fn grid_fields(body: &mut Body, sine: SineType, settings: &DimensionSettings) {
    for spec in sine.grid_fields() {
        if let Some(value) = settings.number(spec.key) {
            body.insert(spec.key.into(), number(spec, value));
        }
    }
}

/// Body for `/api/calculate` and `/api/calculate_data`.
pub fn single(panel: &ParameterPanel) -> Result<Body, PhaseError> {
    let sine = panel.sine_type();
    let mut body = model_fields(panel.set(), sine);
    body.insert("sine_type".into(), Value::from(sine.as_str()));

    let settings = match panel.dimension() {
        Some(settings) => settings,
        None => return Ok(body),
    };
    let phase = PhaseExpr::parse(settings.phi_expr())?;
    grid_fields(&mut body, sine, settings);
    body.insert("phi_expr".into(), Value::from(phase.as_str()));

    if sine == SineType::ThreeD && panel.model().supports_animation() {
        let animated = panel.animation_enabled();
        body.insert("enable_4d_animation".into(), Value::from(animated));
        if animated {
            for spec in ANIMATION_FIELDS {
                if let Some(value) = settings.number(spec.key) {
                    body.insert(spec.key.into(), number(spec, value));
                }
            }
            if !phase.depends_on_time() {
                warn!(
                    phi_expr = phase.as_str(),
                    "animation enabled but phase expression does not depend on t"
                );
            }
        }
    }
    Ok(body)
}

/// One comparison entry; comparisons always run in 1D.
pub fn compare_entry(set: &ParameterSet) -> Body {
    let mut body = model_fields(set, SineType::Single);
    body.insert("setId".into(), Value::from(set.id));
    if let Some(name) = set.custom_name.as_deref().map(str::trim) {
        if !name.is_empty() {
            body.insert("customName".into(), Value::from(name));
        }
    }
    body
}

/// Body for `/api/compare` and `/api/compare_data`, in collection order.
pub fn compare<'a>(sets: impl IntoIterator<Item = &'a ParameterSet>) -> Value {
    let entries: Vec<Value> = sets
        .into_iter()
        .map(|set| Value::Object(compare_entry(set)))
        .collect();
    json!({ "parameter_sets": entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelKind;

    #[test]
    fn test_single_1d_keeps_k() {
        let panel = ParameterPanel::new(ModelKind::Dill);
        let body = single(&panel).unwrap();
        assert_eq!(body["model_type"], "dill");
        assert_eq!(body["sine_type"], "single");
        assert_eq!(body["K"], 2.0);
        assert!(!body.contains_key("Kx"));
        assert!(!body.contains_key("phi_expr"));
    }

    #[test]
    fn test_multi_omits_k() {
        let mut panel = ParameterPanel::new(ModelKind::Dill);
        let _ = panel.set_sine_type(SineType::Multi);
        let _ = panel.set_phase("sin(t)");
        let body = single(&panel).unwrap();
        assert!(!body.contains_key("K"));
        assert_eq!(body["Kx"], 2.0);
        assert_eq!(body["y_points"], 100);
        assert_eq!(body["phi_expr"], "sin(t)");
        assert!(!body.contains_key("x_min"));
    }

    #[test]
    fn test_invalid_phase_blocks_request() {
        let mut panel = ParameterPanel::new(ModelKind::Car);
        let _ = panel.set_sine_type(SineType::ThreeD);
        let _ = panel.set_phase("sin(");
        assert!(single(&panel).is_err());
    }

    #[test]
    fn test_animation_fields() {
        let mut panel = ParameterPanel::new(ModelKind::EnhancedDill);
        let _ = panel.set_sine_type(SineType::ThreeD);
        let body = single(&panel).unwrap();
        assert_eq!(body["enable_4d_animation"], false);
        assert!(!body.contains_key("time_steps"));

        let _ = panel.set_animation(true);
        let body = single(&panel).unwrap();
        assert_eq!(body["enable_4d_animation"], true);
        assert_eq!(body["time_steps"], 20);
        assert_eq!(body["z_max"], 10.0);

        let mut car = ParameterPanel::new(ModelKind::Car);
        let _ = car.set_sine_type(SineType::ThreeD);
        assert!(!single(&car).unwrap().contains_key("enable_4d_animation"));
    }

    #[test]
    fn test_car_aliases() {
        let panel = ParameterPanel::new(ModelKind::Car);
        let body = single(&panel).unwrap();
        assert_eq!(body["initial_intensity"], body["I_avg"]);
        assert_eq!(body["visibility"], body["V"]);
    }

    #[test]
    fn test_compare_body_order_and_names() {
        let mut a = ParameterSet::new(1, ModelKind::Dill);
        a.custom_name = Some("A".into());
        let mut b = ParameterSet::new(2, ModelKind::Dill);
        b.custom_name = Some("B".into());
        let plain = ParameterSet::new(3, ModelKind::Dill);
        let body = compare([&a, &b, &plain]);
        let sets = body["parameter_sets"].as_array().unwrap();
        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0]["customName"], "A");
        assert_eq!(sets[1]["customName"], "B");
        assert_eq!(sets[1]["setId"], 2);
        assert!(sets[2].get("customName").is_none());
        assert_eq!(sets[2]["model_type"], "dill");
    }
}
