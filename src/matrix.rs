use serde::Serialize;

use crate::i18n::Lang;
use crate::model::{ModelKind, SineType};

#[derive(Debug, Clone, Copy)]
pub struct FormulaBlock {
    pub title: &'static str,
    pub formula: &'static str,
    pub note: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamDoc {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct MatrixEntry {
    pub model: ModelKind,
    pub dimension: SineType,
    pub title: &'static str,
    pub formulas: &'static [FormulaBlock],
}

const fn block(title: &'static str, formula: &'static str) -> FormulaBlock {
    FormulaBlock { title, formula, note: None }
}

const fn noted(title: &'static str, formula: &'static str, note: &'static str) -> FormulaBlock {
    FormulaBlock { title, formula, note: Some(note) }
}

const fn param(name: &'static str, description: &'static str) -> ParamDoc {
    ParamDoc { name, description }
}

const DILL_PARAMS: &[ParamDoc] = &[
    param("I_avg", "param_i_avg"),
    param("V", "param_v"),
    param("K", "param_k"),
    param("t_exp", "param_t_exp"),
    param("C", "param_c"),
];

const ENHANCED_PARAMS: &[ParamDoc] = &[
    param("z_h", "param_zh"),
    param("T", "param_t"),
    param("t_B", "param_tb"),
    param("I0", "param_i0"),
    param("M0", "param_m0"),
    param("t_exp", "param_t_exp"),
];

const CAR_PARAMS: &[ParamDoc] = &[
    param("I_avg", "param_i_avg"),
    param("V", "param_v"),
    param("K", "param_k"),
    param("t_exp", "param_t_exp"),
    param("acid_gen_efficiency", "param_acid_gen"),
    param("diffusion_length", "param_diff_len"),
    param("reaction_rate", "param_reaction_rate"),
    param("amplification", "param_amplification"),
    param("contrast", "param_contrast"),
];

const DILL_DOSE: &str = r"D = I \cdot t_{exp}";
const DILL_THICKNESS: &str = r"M = e^{-C \cdot D}";
const FIT: &str = r"A, B, C = f(z_h, T, t_B)";
const CAR_DEPROTECT: &str = r"f = 1 - e^{-k \cdot [H^+] \cdot A}";
const CAR_DEVELOP: &str = r"T = 1 - f^{\gamma}";

pub const MATRIX: [MatrixEntry; 9] = [
    MatrixEntry {
        model: ModelKind::Dill,
        dimension: SineType::Single,
        title: "dill_1d",
        formulas: &[
            block("light_intensity", r"I(x) = I_{avg} (1 + V \cos(K x))"),
            block("exposure_dose", r"D(x) = I(x) \cdot t_{exp}"),
            noted("thickness_dist", r"M(x) = e^{-C \cdot D(x)}", "note_dill_dose"),
        ],
    },
    MatrixEntry {
        model: ModelKind::Dill,
        dimension: SineType::Multi,
        title: "dill_2d",
        formulas: &[
            block("light_intensity", r"I(x,y) = I_{avg} (1 + V \cos(K_x x + K_y y + \varphi))"),
            block("exposure_dose", DILL_DOSE),
            block("thickness_dist", DILL_THICKNESS),
        ],
    },
    MatrixEntry {
        model: ModelKind::Dill,
        dimension: SineType::ThreeD,
        title: "dill_3d",
        formulas: &[
            block(
                "three_dim_initial_intensity",
                r"I(x,y,z) = I_{avg} (1 + V \cos(K_x x + K_y y + K_z z + \varphi))",
            ),
            block("exposure_dose", DILL_DOSE),
            block("thickness_dist", DILL_THICKNESS),
        ],
    },
    MatrixEntry {
        model: ModelKind::EnhancedDill,
        dimension: SineType::Single,
        title: "enhanced_dill_1d",
        formulas: &[
            block("light_attenuation", r"\partial I / \partial z = -I (A M + B)"),
            block("photosensitizer_concentration", r"\partial M / \partial t = -I M C"),
            noted("parameter_fitting", FIT, "note_fit"),
        ],
    },
    MatrixEntry {
        model: ModelKind::EnhancedDill,
        dimension: SineType::Multi,
        title: "enhanced_dill_2d",
        formulas: &[
            block("initial_light_intensity", r"I_0(x) = I_0 (1 + V \cos(K x))"),
            block("depth_light_attenuation", r"\partial I(x,z) / \partial z = -I (A M + B)"),
            block("photosensitizer_concentration", r"\partial M(x,z) / \partial t = -I M C"),
        ],
    },
    MatrixEntry {
        model: ModelKind::EnhancedDill,
        dimension: SineType::ThreeD,
        title: "enhanced_dill_3d",
        formulas: &[
            block("three_dim_initial_intensity", r"I_0(x,y) = I_0 (1 + V \cos(K_x x + K_y y))"),
            block("three_dim_light_propagation", r"\partial I(x,y,z) / \partial z = -I (A M + B)"),
            block("three_dim_photosensitizer", r"\partial M(x,y,z) / \partial t = -I M C"),
        ],
    },
    MatrixEntry {
        model: ModelKind::Car,
        dimension: SineType::Single,
        title: "car_1d",
        formulas: &[
            block("acid_generation", r"[H^+]_0(x) = \eta \cdot D(x)"),
            noted("acid_diffusion", r"[H^+](x) = [H^+]_0 \otimes G(x, l_{diff})", "note_diffusion"),
            block("deprotection_reaction", CAR_DEPROTECT),
            block("development_thickness", CAR_DEVELOP),
        ],
    },
    MatrixEntry {
        model: ModelKind::Car,
        dimension: SineType::Multi,
        title: "car_2d",
        formulas: &[
            block("acid_generation", r"[H^+]_0(x,y) = \eta \cdot D(x,y)"),
            noted(
                "two_dim_acid_diffusion",
                r"[H^+](x,y) = [H^+]_0 \otimes G_2(x, y, l_{diff})",
                "note_diffusion_2d",
            ),
            block("deprotection_reaction", CAR_DEPROTECT),
            block("development_thickness", CAR_DEVELOP),
        ],
    },
    MatrixEntry {
        model: ModelKind::Car,
        dimension: SineType::ThreeD,
        title: "car_3d",
        formulas: &[
            block("acid_generation", r"[H^+]_0(x,y,z) = \eta \cdot D(x,y,z)"),
            noted(
                "three_dim_acid_diffusion",
                r"[H^+](x,y,z) = [H^+]_0 \otimes G_3(x, y, z, l_{diff})",
                "note_diffusion_3d",
            ),
            block("deprotection_reaction", CAR_DEPROTECT),
            block("development_thickness", CAR_DEVELOP),
        ],
    },
];

fn parameters(model: ModelKind) -> &'static [ParamDoc] {
    match model {
        ModelKind::Dill => DILL_PARAMS,
        ModelKind::EnhancedDill => ENHANCED_PARAMS,
        ModelKind::Car => CAR_PARAMS,
    }
}

fn reference(model: ModelKind) -> &'static str {
    match model {
        ModelKind::Dill => "Dill F H, Neureuther A R, Tuttle J A, et al. IEEE Trans Electron Devices, 1975.",
        ModelKind::EnhancedDill => "刘世杰等《厚层抗蚀剂曝光模型及其参数测量》, 2005.",
        ModelKind::Car => "Hinsberg et al., \"Chemical amplification mechanism\", Proc. SPIE, 1994.",
    }
}

fn dimension_key(dim: SineType) -> (&'static str, &'static str) {
    match dim {
        SineType::Single => ("dim_1d", "1d_description"),
        SineType::Multi => ("dim_2d", "2d_description"),
        SineType::ThreeD => ("dim_3d", "3d_description"),
    }
}

pub fn position(model: ModelKind, dimension: SineType) -> usize {
    MATRIX
        .iter()
        .position(|e| e.model == model && e.dimension == dimension)
        .unwrap_or(0)
}

pub fn next(index: usize) -> usize {
    (index + 1) % MATRIX.len()
}

pub fn prev(index: usize) -> usize {
    (index + MATRIX.len() - 1) % MATRIX.len()
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalizedFormula {
    pub title: String,
    pub formula: &'static str,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalizedParam {
    pub name: &'static str,
    pub description: String,
}

/// One cell with every key resolved, as served to the page.
#[derive(Debug, Clone, Serialize)]
pub struct Cell {
    pub index: usize,
    pub model: ModelKind,
    pub dimension: SineType,
    pub title: String,
    pub model_title: String,
    pub model_description: String,
    pub dimension_title: String,
    pub dimension_description: String,
    pub parameters: Vec<LocalizedParam>,
    pub reference: &'static str,
    pub formulas: Vec<LocalizedFormula>,
}

impl MatrixEntry {
    pub fn localize(&self, index: usize, lang: Lang) -> Cell {
        let (dim_title, dim_desc) = dimension_key(self.dimension);
        Cell {
            index,
            model: self.model,
            dimension: self.dimension,
            title: lang.text(self.title).to_string(),
            model_title: lang.text(self.model.title_key()).to_string(),
            model_description: lang.text(self.model.description_key()).to_string(),
            dimension_title: lang.text(dim_title).to_string(),
            dimension_description: lang.text(dim_desc).to_string(),
            parameters: parameters(self.model)
                .iter()
                .map(|p| LocalizedParam {
                    name: p.name,
                    description: lang.text(p.description).to_string(),
                })
                .collect(),
            reference: reference(self.model),
            formulas: self
                .formulas
                .iter()
                .map(|f| LocalizedFormula {
                    title: lang.text(f.title).to_string(),
                    formula: f.formula,
                    note: f.note.map(|n| lang.text(n).to_string()),
                })
                .collect(),
        }
    }
}

pub fn cells(lang: Lang) -> Vec<Cell> {
    MATRIX
        .iter()
        .enumerate()
        .map(|(i, e)| e.localize(i, lang))
        .collect()
}

/// Detail view over the matrix; closed until a cell is opened.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    current: Option<usize>,
}

impl Navigator {
    pub fn open(&mut self, model: ModelKind, dimension: SineType) -> usize {
        let index = position(model, dimension);
        self.current = Some(index);
        index
    }

    pub fn close(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&'static MatrixEntry> {
        self.current.map(|i| &MATRIX[i])
    }

    pub fn next(&mut self) -> Option<usize> {
        self.current = self.current.map(next);
        self.current
    }

    pub fn prev(&mut self) -> Option<usize> {
        self.current = self.current.map(prev);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        assert_eq!(position(ModelKind::Dill, SineType::Single), 0);
        assert_eq!(position(ModelKind::EnhancedDill, SineType::Multi), 4);
        assert_eq!(position(ModelKind::Car, SineType::ThreeD), 8);
        for model in ModelKind::ALL {
            for dim in SineType::ALL {
                let e = &MATRIX[position(model, dim)];
                assert_eq!((e.model, e.dimension), (model, dim));
                assert!(!e.formulas.is_empty());
            }
        }
    }

    #[test]
    fn test_navigation_wraps() {
        assert_eq!(next(8), 0);
        assert_eq!(prev(0), 8);

        let mut nav = Navigator::default();
        assert_eq!(nav.next(), None);
        assert_eq!(nav.open(ModelKind::Car, SineType::ThreeD), 8);
        assert_eq!(nav.next(), Some(0));
        assert_eq!(nav.current().map(|e| e.title), Some("dill_1d"));
        assert_eq!(nav.prev(), Some(8));
        nav.close();
        assert!(nav.current().is_none());
    }

    #[test]
    fn test_localized_cell() {
        let cell = MATRIX[position(ModelKind::Car, SineType::Single)].localize(6, Lang::En);
        assert_eq!(cell.title, "CAR Model - 1D");
        assert_eq!(cell.dimension_title, "1D Model");
        assert_eq!(cell.parameters.len(), 9);
        assert_eq!(cell.formulas[1].title, "Acid Diffusion:");
        assert!(cell.formulas[1].note.as_deref().unwrap().contains("Gaussian"));
        assert!(cell.model_description.starts_with("The CAR"));

        let zh = cells(Lang::Zh);
        assert_eq!(zh.len(), 9);
        assert_eq!(zh[3].title, "增强 Dill 模型 - 1D");
    }
}
