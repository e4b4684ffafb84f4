use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::i18n::Lang;
use crate::model::{FieldSpec, ModelKind, Preset, SineType, ANIMATION_FIELDS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

/// Returned by every accepted edit; whoever owns the charts must clear them.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub id: u32,
    pub model: ModelKind,
    pub fields: BTreeMap<String, FieldValue>,
    pub custom_name: Option<String>,
}

impl ParameterSet {
    /// A set holding the model's declared defaults.
    pub fn new(id: u32, model: ModelKind) -> Self {
        let fields = model
            .base_fields()
            .iter()
            .map(|spec| (spec.key.to_string(), FieldValue::Number(spec.default)))
            .collect();
        ParameterSet {
            id,
            model,
            fields,
            custom_name: None,
        }
    }

    pub fn from_preset(id: u32, model: ModelKind, preset: &Preset, lang: Lang) -> Self {
        let mut set = ParameterSet::new(id, model);
        set.apply_preset(preset);
        set.custom_name = preset.name_key.map(|key| lang.text(key).to_string());
        set
    }

    pub fn apply_preset(&mut self, preset: &Preset) {
        for (key, value) in preset.values {
            self.set_value(key, *value);
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(FieldValue::as_number)
    }

    /// Parses raw widget text into the field. Unparsable input resolves to
    /// the declared minimum, anything else is clamped into range.
    pub fn set_number(&mut self, key: &str, raw: &str) -> Option<f64> {
        let value = raw.trim().parse::<f64>().unwrap_or(f64::NAN);
        self.set_value(key, value)
    }

    pub fn set_value(&mut self, key: &str, value: f64) -> Option<f64> {
        let spec = self.model.field(key)?;
        let value = spec.coerce(value);
        self.fields
            .insert(spec.key.to_string(), FieldValue::Number(value));
        Some(value)
    }

    pub fn display_name(&self, lang: Lang) -> String {
        match &self.custom_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => lang.text("param_set_name").replace("{id}", &self.id.to_string()),
        }
    }

    /// Numeric values relevant to `sine`, in declaration order.
    pub fn numbers_for(&self, sine: SineType) -> Vec<(&'static str, f64)> {
        self.model
            .base_fields()
            .iter()
            .filter(|spec| spec.applies_to(sine))
            .filter_map(|spec| self.number(spec.key).map(|v| (spec.key, v)))
            .collect()
    }
}

/// Mirrored state of one input row: slider position, number box, echo text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Widget {
    pub slider: f64,
    pub input: String,
    pub echo: String,
}

impl Widget {
    fn show(spec: &FieldSpec, value: f64) -> Self {
        let text = format_value(spec, value);
        Widget {
            slider: value,
            input: text.clone(),
            echo: text,
        }
    }
}

pub fn format_value(spec: &FieldSpec, value: f64) -> String {
    if spec.integer {
        return format!("{:.0}", value);
    }
    let decimals = ((-spec.step.log10()) - 1e-9).ceil().max(0.0) as usize;
    format!("{:.*}", decimals, value)
}

/// Grid and phase settings kept separately for 2D and 3D, as each view has
/// its own inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSettings {
    pub fields: BTreeMap<String, FieldValue>,
}

impl DimensionSettings {
    fn new(sine: SineType) -> Self {
        let mut fields: BTreeMap<String, FieldValue> = sine
            .grid_fields()
            .iter()
            .map(|spec| (spec.key.to_string(), FieldValue::Number(spec.default)))
            .collect();
        if sine == SineType::ThreeD {
            for spec in ANIMATION_FIELDS {
                fields.insert(spec.key.to_string(), FieldValue::Number(spec.default));
            }
        }
        fields.insert("phi_expr".into(), FieldValue::Text("0".into()));
        DimensionSettings { fields }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(FieldValue::as_number)
    }

    pub fn phi_expr(&self) -> &str {
        self.fields
            .get("phi_expr")
            .and_then(FieldValue::as_text)
            .unwrap_or("0")
    }
}

fn dimension_spec(sine: SineType, key: &str) -> Option<&'static FieldSpec> {
    let animation: &'static [FieldSpec] = if sine == SineType::ThreeD {
        ANIMATION_FIELDS
    } else {
        &[]
    };
    sine.grid_fields()
        .iter()
        .chain(animation.iter())
        .find(|spec| spec.key == key)
}

/// Single-calculation input panel for one model.
#[derive(Debug, Clone)]
pub struct ParameterPanel {
    set: ParameterSet,
    sine: SineType,
    multi: DimensionSettings,
    three_d: DimensionSettings,
    animation: bool,
    widgets: BTreeMap<&'static str, Widget>,
}

impl ParameterPanel {
    pub fn new(model: ModelKind) -> Self {
        let mut panel = ParameterPanel {
            set: ParameterSet::new(1, model),
            sine: SineType::Single,
            multi: DimensionSettings::new(SineType::Multi),
            three_d: DimensionSettings::new(SineType::ThreeD),
            animation: false,
            widgets: BTreeMap::new(),
        };
        panel.sync_widgets();
        panel
    }

    pub fn model(&self) -> ModelKind {
        self.set.model
    }

    pub fn set(&self) -> &ParameterSet {
        &self.set
    }

    pub fn sine_type(&self) -> SineType {
        self.sine
    }

    pub fn dimension(&self) -> Option<&DimensionSettings> {
        match self.sine {
            SineType::Single => None,
            SineType::Multi => Some(&self.multi),
            SineType::ThreeD => Some(&self.three_d),
        }
    }

    fn dimension_mut(&mut self) -> Option<&mut DimensionSettings> {
        match self.sine {
            SineType::Single => None,
            SineType::Multi => Some(&mut self.multi),
            SineType::ThreeD => Some(&mut self.three_d),
        }
    }

    /// Animation only exists for 3D on models that support it.
    pub fn animation_enabled(&self) -> bool {
        self.animation && self.sine == SineType::ThreeD && self.model().supports_animation()
    }

    pub fn set_sine_type(&mut self, sine: SineType) -> Invalidate {
        self.sine = sine;
        self.sync_widgets();
        Invalidate
    }

    pub fn set_animation(&mut self, enabled: bool) -> Invalidate {
        self.animation = enabled;
        self.sync_widgets();
        Invalidate
    }

    /// Applies raw text from either the slider or the number box.
    pub fn edit(&mut self, key: &str, raw: &str) -> Option<(f64, Invalidate)> {
        let value = raw.trim().parse::<f64>().unwrap_or(f64::NAN);
        self.slide(key, value)
    }

    pub fn slide(&mut self, key: &str, value: f64) -> Option<(f64, Invalidate)> {
        let (spec, stored) = if let Some(spec) = self.model().field(key) {
            (spec, self.set.set_value(key, value)?)
        } else {
            let spec = dimension_spec(self.sine, key)?;
            let stored = spec.coerce(value);
            self.dimension_mut()?
                .fields
                .insert(spec.key.to_string(), FieldValue::Number(stored));
            (spec, stored)
        };
        if self.active_fields().iter().any(|active| active.key == spec.key) {
            self.widgets.insert(spec.key, Widget::show(spec, stored));
        }
        Some((stored, Invalidate))
    }

    pub fn set_phase(&mut self, expr: &str) -> Option<Invalidate> {
        let settings = self.dimension_mut()?;
        settings
            .fields
            .insert("phi_expr".into(), FieldValue::Text(expr.to_string()));
        Some(Invalidate)
    }

    pub fn apply_preset(&mut self, preset: &Preset) -> Invalidate {
        self.set.apply_preset(preset);
        self.sync_widgets();
        Invalidate
    }

    pub fn widget(&self, key: &str) -> Option<&Widget> {
        self.widgets.get(key)
    }

    /// Fields currently shown, model fields first.
    pub fn active_fields(&self) -> Vec<&'static FieldSpec> {
        let mut fields = self.model().fields(self.sine);
        if self.animation_enabled() {
            fields.extend(ANIMATION_FIELDS.iter());
        }
        fields
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.set
            .number(key)
            .or_else(|| self.dimension().and_then(|d| d.number(key)))
    }

    fn sync_widgets(&mut self) {
        let mut widgets = BTreeMap::new();
        for spec in self.active_fields() {
            if let Some(value) = self.value(spec.key) {
                widgets.insert(spec.key, Widget::show(spec, value));
            }
        }
        self.widgets = widgets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_to_declared_range() {
        let mut set = ParameterSet::new(1, ModelKind::Dill);
        assert_eq!(set.set_number("I_avg", "150"), Some(100.0));
        assert_eq!(set.set_number("V", "-5"), Some(0.0));
        assert_eq!(set.set_number("I_avg", "abc"), Some(1.0));
        assert_eq!(set.set_number("C", ""), Some(0.001));
        assert_eq!(set.set_number("nope", "1"), None);
        assert_eq!(set.number("I_avg"), Some(1.0));
    }

    #[test]
    fn test_display_name_fallback() {
        let mut set = ParameterSet::new(3, ModelKind::Car);
        assert_eq!(set.display_name(Lang::En), "Parameter Set 3");
        assert_eq!(set.display_name(Lang::Zh), "参数组 3");
        set.custom_name = Some("Reference".into());
        assert_eq!(set.display_name(Lang::Zh), "Reference");
        set.custom_name = Some("   ".into());
        assert_eq!(set.display_name(Lang::En), "Parameter Set 3");
    }

    #[test]
    fn test_panel_mirrors_widgets() {
        let mut panel = ParameterPanel::new(ModelKind::Dill);
        let (value, _) = panel.edit("I_avg", "150").unwrap();
        assert_eq!(value, 100.0);
        let widget = panel.widget("I_avg").unwrap();
        assert_eq!(widget.slider, 100.0);
        assert_eq!(widget.input, "100.0");
        assert_eq!(widget.echo, "100.0");

        let _ = panel.slide("C", 0.0254).unwrap();
        assert_eq!(panel.widget("C").unwrap().echo, "0.025");
    }

    #[test]
    fn test_dimension_fields_follow_sine_type() {
        let mut panel = ParameterPanel::new(ModelKind::Dill);
        assert!(panel.widget("Kx").is_none());
        assert!(panel.edit("Kx", "3").is_none());

        let _ = panel.set_sine_type(SineType::Multi);
        assert!(panel.widget("K").is_none());
        assert_eq!(panel.edit("y_points", "5000").map(|(v, _)| v), Some(1000.0));
        assert_eq!(panel.widget("y_points").unwrap().echo, "1000");

        let _ = panel.set_sine_type(SineType::ThreeD);
        assert_eq!(panel.value("Ky"), Some(2.0));
        assert!(panel.widget("time_steps").is_none());
        let _ = panel.set_animation(true);
        assert!(panel.animation_enabled());
        assert_eq!(panel.widget("time_steps").unwrap().echo, "20");

        let _ = panel.set_sine_type(SineType::Multi);
        assert_eq!(panel.value("Ky"), Some(0.0));
        assert_eq!(panel.value("y_points"), Some(1000.0));
    }

    #[test]
    fn test_car_never_animates() {
        let mut panel = ParameterPanel::new(ModelKind::Car);
        let _ = panel.set_sine_type(SineType::ThreeD);
        let _ = panel.set_animation(true);
        assert!(!panel.animation_enabled());
    }
}
