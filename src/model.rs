//! Photoresist model variants and their declared parameter schemas.
//!
//! Each model owns its field table (ranges, steps, defaults), the two
//! presets used to seed the comparison view, and the list of sine types
//! a field is meaningful for. Everything that used to branch on a model
//! string now asks the variant instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Dill,
    EnhancedDill,
    Car,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SineType {
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "multi")]
    Multi,
    #[serde(rename = "3d")]
    ThreeD,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    pub integer: bool,
    #[serde(skip)]
    pub dims: &'static [SineType],
}

impl FieldSpec {
    const fn new(key: &'static str, min: f64, max: f64, step: f64, default: f64) -> Self {
        FieldSpec {
            key,
            min,
            max,
            step,
            default,
            integer: false,
            dims: ALL_DIMS,
        }
    }

    const fn only(mut self, dims: &'static [SineType]) -> Self {
        self.dims = dims;
        self
    }

    const fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    pub fn applies_to(&self, sine: SineType) -> bool {
        self.dims.contains(&sine)
    }

    /// Coerces a candidate into `[min, max]`; NaN and infinities resolve to `min`.
    pub fn coerce(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.min;
        }
        let value = if self.integer { value.round() } else { value };
        value.clamp(self.min, self.max)
    }
}

/// A literal bundle of field values, optionally carrying a display name key.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name_key: Option<&'static str>,
    pub values: &'static [(&'static str, f64)],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyPreset {
    Baseline,
    Contrast,
    ExposureTime,
}

const ALL_DIMS: &[SineType] = &[SineType::Single, SineType::Multi, SineType::ThreeD];
const ONE_D: &[SineType] = &[SineType::Single];

const DILL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("I_avg", 1.0, 100.0, 0.1, 10.0),
    FieldSpec::new("V", 0.0, 1.0, 0.01, 0.8),
    FieldSpec::new("K", 0.1, 10.0, 0.1, 2.0).only(ONE_D),
    FieldSpec::new("t_exp", 0.1, 300.0, 0.1, 5.0),
    FieldSpec::new("C", 0.001, 0.1, 0.001, 0.02),
];

const ENHANCED_DILL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("z_h", 1.0, 100.0, 0.1, 10.0),
    FieldSpec::new("T", 60.0, 200.0, 1.0, 100.0),
    FieldSpec::new("t_B", 1.0, 120.0, 1.0, 10.0),
    FieldSpec::new("I0", 0.1, 10.0, 0.1, 1.0),
    FieldSpec::new("M0", 0.1, 10.0, 0.1, 1.0),
    FieldSpec::new("t_exp", 0.1, 100.0, 0.1, 5.0),
    FieldSpec::new("K", 0.1, 10.0, 0.1, 2.0).only(ONE_D),
    FieldSpec::new("V", 0.0, 1.0, 0.01, 0.8),
];

const CAR_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("I_avg", 1.0, 100.0, 0.1, 10.0),
    FieldSpec::new("V", 0.0, 1.0, 0.01, 0.8),
    FieldSpec::new("K", 0.1, 10.0, 0.1, 2.0).only(ONE_D),
    FieldSpec::new("t_exp", 0.1, 20.0, 0.1, 5.0),
    FieldSpec::new("acid_gen_efficiency", 0.01, 1.0, 0.01, 0.5),
    FieldSpec::new("diffusion_length", 0.0, 20.0, 0.1, 3.0),
    FieldSpec::new("reaction_rate", 0.01, 1.0, 0.01, 0.3),
    FieldSpec::new("amplification", 1.0, 50.0, 0.5, 10.0),
    FieldSpec::new("contrast", 0.1, 10.0, 0.1, 3.0),
];

const MULTI_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("Kx", 0.1, 10.0, 0.1, 2.0),
    FieldSpec::new("Ky", 0.0, 10.0, 0.1, 0.0),
    FieldSpec::new("y_min", -100.0, 100.0, 0.1, 0.0),
    FieldSpec::new("y_max", -100.0, 100.0, 0.1, 10.0),
    FieldSpec::new("y_points", 10.0, 1000.0, 1.0, 100.0).integer(),
];

const THREE_D_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("Kx", 0.1, 10.0, 0.1, 2.0),
    FieldSpec::new("Ky", 0.0, 10.0, 0.1, 2.0),
    FieldSpec::new("Kz", 0.0, 10.0, 0.1, 2.0),
    FieldSpec::new("x_min", -100.0, 100.0, 0.1, 0.0),
    FieldSpec::new("x_max", -100.0, 100.0, 0.1, 10.0),
    FieldSpec::new("y_min", -100.0, 100.0, 0.1, 0.0),
    FieldSpec::new("y_max", -100.0, 100.0, 0.1, 10.0),
    FieldSpec::new("z_min", -100.0, 100.0, 0.1, 0.0),
    FieldSpec::new("z_max", -100.0, 100.0, 0.1, 10.0),
];

pub const ANIMATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("t_start", 0.0, 100.0, 0.1, 0.0),
    FieldSpec::new("t_end", 0.1, 100.0, 0.1, 5.0),
    FieldSpec::new("time_steps", 2.0, 200.0, 1.0, 20.0).integer(),
];

const DILL_PRESETS: [Preset; 2] = [
    Preset {
        name_key: None,
        values: &[("I_avg", 10.0), ("V", 0.8), ("K", 2.0), ("t_exp", 5.0), ("C", 0.02)],
    },
    Preset {
        name_key: None,
        values: &[("I_avg", 20.0), ("V", 0.6), ("K", 3.0), ("t_exp", 5.0), ("C", 0.02)],
    },
];

const ENHANCED_DILL_PRESETS: [Preset; 2] = [
    Preset {
        name_key: None,
        values: &[
            ("z_h", 10.0),
            ("T", 100.0),
            ("t_B", 10.0),
            ("I0", 1.0),
            ("M0", 1.0),
            ("t_exp", 5.0),
            ("K", 2.0),
            ("V", 0.8),
        ],
    },
    Preset {
        name_key: None,
        values: &[
            ("z_h", 15.0),
            ("T", 110.0),
            ("t_B", 15.0),
            ("I0", 1.2),
            ("M0", 1.0),
            ("t_exp", 8.0),
            ("K", 2.5),
            ("V", 0.6),
        ],
    },
];

const CAR_PRESETS: [Preset; 2] = [
    Preset {
        name_key: None,
        values: &[
            ("I_avg", 10.0),
            ("V", 0.8),
            ("K", 2.0),
            ("t_exp", 5.0),
            ("acid_gen_efficiency", 0.5),
            ("diffusion_length", 3.0),
            ("reaction_rate", 0.3),
            ("amplification", 10.0),
            ("contrast", 3.0),
        ],
    },
    Preset {
        name_key: None,
        values: &[
            ("I_avg", 15.0),
            ("V", 0.6),
            ("K", 3.0),
            ("t_exp", 8.0),
            ("acid_gen_efficiency", 0.7),
            ("diffusion_length", 5.0),
            ("reaction_rate", 0.5),
            ("amplification", 15.0),
            ("contrast", 4.0),
        ],
    },
];

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Dill, ModelKind::EnhancedDill, ModelKind::Car];

    pub fn from_id(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "dill" => Some(ModelKind::Dill),
            "enhanced_dill" | "enhanced" => Some(ModelKind::EnhancedDill),
            "car" => Some(ModelKind::Car),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Dill => "dill",
            ModelKind::EnhancedDill => "enhanced_dill",
            ModelKind::Car => "car",
        }
    }

    pub fn title_key(self) -> &'static str {
        match self {
            ModelKind::Dill => "model_dill",
            ModelKind::EnhancedDill => "model_enhanced_dill",
            ModelKind::Car => "model_car",
        }
    }

    pub fn description_key(self) -> &'static str {
        match self {
            ModelKind::Dill => "dill_description",
            ModelKind::EnhancedDill => "enhanced_dill_description",
            ModelKind::Car => "car_description",
        }
    }

    /// Model-specific fields, before any dimensional filtering.
    pub fn base_fields(self) -> &'static [FieldSpec] {
        match self {
            ModelKind::Dill => DILL_FIELDS,
            ModelKind::EnhancedDill => ENHANCED_DILL_FIELDS,
            ModelKind::Car => CAR_FIELDS,
        }
    }

    /// Every numeric field relevant to `sine`, model fields first.
    pub fn fields(self, sine: SineType) -> Vec<&'static FieldSpec> {
        self.base_fields()
            .iter()
            .filter(|spec| spec.applies_to(sine))
            .chain(sine.grid_fields().iter())
            .collect()
    }

    pub fn field(self, key: &str) -> Option<&'static FieldSpec> {
        self.base_fields().iter().find(|spec| spec.key == key)
    }

    pub fn presets(self) -> &'static [Preset; 2] {
        match self {
            ModelKind::Dill => &DILL_PRESETS,
            ModelKind::EnhancedDill => &ENHANCED_DILL_PRESETS,
            ModelKind::Car => &CAR_PRESETS,
        }
    }

    pub fn supports_animation(self) -> bool {
        matches!(self, ModelKind::Dill | ModelKind::EnhancedDill)
    }

    /// Aliases the CAR backend also reads.
    pub fn request_aliases(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ModelKind::Car => &[("initial_intensity", "I_avg"), ("visibility", "V")],
            _ => &[],
        }
    }
}

impl SineType {
    pub const ALL: [SineType; 3] = [SineType::Single, SineType::Multi, SineType::ThreeD];

    pub fn from_id(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "single" | "1d" => Some(SineType::Single),
            "multi" | "2d" => Some(SineType::Multi),
            "3d" => Some(SineType::ThreeD),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SineType::Single => "single",
            SineType::Multi => "multi",
            SineType::ThreeD => "3d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SineType::Single => "1D",
            SineType::Multi => "2D",
            SineType::ThreeD => "3D",
        }
    }

    pub fn grid_fields(self) -> &'static [FieldSpec] {
        match self {
            SineType::Single => &[],
            SineType::Multi => MULTI_FIELDS,
            SineType::ThreeD => THREE_D_FIELDS,
        }
    }

    pub fn uses_phase(self) -> bool {
        !matches!(self, SineType::Single)
    }
}

/// Declared inputs of one model at one dimension.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub model: ModelKind,
    pub sine_type: SineType,
    pub fields: Vec<FieldSpec>,
    /// Time animation fields, empty when the pair has no animation.
    pub animation: Vec<FieldSpec>,
    pub presets: Vec<BTreeMap<&'static str, f64>>,
}

impl ModelKind {
    pub fn schema(self, sine: SineType) -> Schema {
        let animated = self.supports_animation() && sine == SineType::ThreeD;
        Schema {
            model: self,
            sine_type: sine,
            fields: self.fields(sine).into_iter().copied().collect(),
            animation: if animated { ANIMATION_FIELDS.to_vec() } else { Vec::new() },
            presets: self
                .presets()
                .iter()
                .map(|p| p.values.iter().copied().collect())
                .collect(),
        }
    }
}

impl StudyPreset {
    pub fn from_id(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "baseline" | "paper" => Some(StudyPreset::Baseline),
            "contrast" => Some(StudyPreset::Contrast),
            "exposure" | "exposure_time" => Some(StudyPreset::ExposureTime),
            _ => None,
        }
    }

    /// Studies are defined for the Dill model only.
    pub fn sets(self) -> [Preset; 2] {
        match self {
            StudyPreset::Baseline => [
                Preset {
                    name_key: Some("study_baseline_a"),
                    values: &[("I_avg", 10.0), ("V", 0.8), ("K", 2.0), ("t_exp", 5.0), ("C", 0.02)],
                },
                Preset {
                    name_key: Some("study_baseline_b"),
                    values: &[("I_avg", 20.0), ("V", 0.6), ("K", 3.0), ("t_exp", 8.0), ("C", 0.025)],
                },
            ],
            StudyPreset::Contrast => [
                Preset {
                    name_key: Some("study_contrast_high"),
                    values: &[("I_avg", 15.0), ("V", 1.0), ("K", 2.0), ("t_exp", 6.0), ("C", 0.02)],
                },
                Preset {
                    name_key: Some("study_contrast_low"),
                    values: &[("I_avg", 15.0), ("V", 0.6), ("K", 2.0), ("t_exp", 6.0), ("C", 0.02)],
                },
            ],
            StudyPreset::ExposureTime => [
                Preset {
                    name_key: Some("study_exposure_short"),
                    values: &[("I_avg", 15.0), ("V", 0.8), ("K", 2.5), ("t_exp", 3.0), ("C", 0.02)],
                },
                Preset {
                    name_key: Some("study_exposure_long"),
                    values: &[("I_avg", 15.0), ("V", 0.8), ("K", 2.5), ("t_exp", 12.0), ("C", 0.02)],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_round_trip() {
        for model in ModelKind::ALL {
            assert_eq!(ModelKind::from_id(model.as_str()), Some(model));
        }
        assert_eq!(ModelKind::from_id("Enhanced-Dill"), Some(ModelKind::EnhancedDill));
        assert_eq!(ModelKind::from_id("pinn"), None);
    }

    #[test]
    fn test_presets_lie_inside_declared_ranges() {
        for model in ModelKind::ALL {
            for preset in model.presets() {
                for (key, value) in preset.values {
                    let spec = model.field(key).expect("preset key declared");
                    assert!(*value >= spec.min && *value <= spec.max, "{key}={value}");
                }
            }
        }
    }

    #[test]
    fn test_k_is_single_only() {
        let keys: Vec<_> = ModelKind::Dill
            .fields(SineType::Multi)
            .iter()
            .map(|spec| spec.key)
            .collect();
        assert!(!keys.contains(&"K"));
        assert!(keys.contains(&"Kx"));
        assert!(keys.contains(&"y_points"));

        let single: Vec<_> = ModelKind::Dill
            .fields(SineType::Single)
            .iter()
            .map(|spec| spec.key)
            .collect();
        assert_eq!(single, vec!["I_avg", "V", "K", "t_exp", "C"]);
    }

    #[test]
    fn test_schema_lists_animation_for_3d_only() {
        let schema = ModelKind::Dill.schema(SineType::ThreeD);
        assert!(schema.fields.iter().any(|f| f.key == "Kz"));
        assert_eq!(schema.animation.len(), ANIMATION_FIELDS.len());
        assert_eq!(schema.presets[1]["I_avg"], 20.0);
        assert!(ModelKind::Car.schema(SineType::ThreeD).animation.is_empty());
        assert!(ModelKind::Dill.schema(SineType::Single).animation.is_empty());
    }

    #[test]
    fn test_coerce() {
        let spec = ModelKind::Dill.field("I_avg").unwrap();
        assert_eq!(spec.coerce(150.0), 100.0);
        assert_eq!(spec.coerce(f64::NAN), 1.0);
        assert_eq!(spec.coerce(f64::INFINITY), 1.0);
        let points = &MULTI_FIELDS[4];
        assert_eq!(points.coerce(99.6), 100.0);
    }
}
