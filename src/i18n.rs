//! Bilingual text for every user-facing string.
//!
//! Lookups never fail: a key missing from the table renders as the key
//! itself. [`Document`] models the language-marked nodes of a page so a
//! language switch can be applied and checked without a browser.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

impl Lang {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().replace('_', "-").as_str() {
            "zh" | "zh-cn" => Some(Lang::Zh),
            "en" | "en-us" => Some(Lang::En),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Lang::Zh => "zh",
            Lang::En => "en",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Lang::Zh => Lang::En,
            Lang::En => Lang::Zh,
        }
    }

    pub fn text<'a>(self, key: &'a str) -> &'a str {
        match TABLE.get(key) {
            Some((zh, en)) => match self {
                Lang::Zh => *zh,
                Lang::En => *en,
            },
            None => key,
        }
    }

    /// Looks up `key` and substitutes `{name}` placeholders.
    pub fn format(self, key: &str, args: &[(&str, String)]) -> String {
        let mut out = self.text(key).to_string();
        for (name, value) in args {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }
}

const ENTRIES: &[(&str, &str, &str)] = &[
    ("page_title", "多模型光刻胶计算工具", "Multi-Model Photoresist Calculator"),
    ("matrix_title", "光刻胶模型矩阵可视化", "Photoresist Model Matrix Visualization"),
    ("matrix_subtitle", "探索三种光刻胶模型在不同维度下的实现方式", "Explore three photoresist models in different dimensions"),
    ("lang_btn", "English/中文", "English/中文"),
    ("nav_single", "单一计算", "Single Calculation"),
    ("nav_compare", "参数比较", "Parameter Comparison"),
    ("calculate", "计算", "Calculate"),
    ("compare", "比较", "Compare"),
    ("loading", "加载中...", "Loading..."),
    ("add_set", "新增参数组", "Add Parameter Set"),
    ("set_name_placeholder", "输入自定义名称", "Enter a custom name"),
    ("param_set_name", "参数组 {id}", "Parameter Set {id}"),
    ("select_model", "选择计算模型:", "Select Calculation Model:"),
    ("model_dill", "Dill模型", "Dill Model"),
    ("model_enhanced_dill", "增强Dill模型", "Enhanced Dill Model"),
    ("model_car", "CAR模型", "CAR Model"),
    ("sine_single", "一维正弦波", "1D Sine Wave"),
    ("sine_multi", "二维正弦波", "2D Sine Wave"),
    ("sine_3d", "三维正弦波", "3D Sine Wave"),
    ("dim_1d", "1D 模型", "1D Model"),
    ("dim_2d", "2D 模型", "2D Model"),
    ("dim_3d", "3D 模型", "3D Model"),
    // study presets
    ("study_baseline_a", "基础配置A", "Baseline A"),
    ("study_baseline_b", "基础配置B", "Baseline B"),
    ("study_contrast_high", "高对比度", "High Contrast"),
    ("study_contrast_low", "低对比度", "Low Contrast"),
    ("study_exposure_short", "短时间曝光", "Short Exposure"),
    ("study_exposure_long", "长时间曝光", "Long Exposure"),
    // charts
    ("chart_exposure", "曝光剂量分布", "Exposure Dose Distribution"),
    ("chart_thickness", "光刻胶厚度分布", "Photoresist Thickness Distribution"),
    ("chart_exposure_xy", "二维曝光剂量分布", "2D Exposure Dose Distribution"),
    ("chart_thickness_xy", "二维光刻胶厚度分布", "2D Photoresist Thickness Distribution"),
    ("chart_exposure_3d", "三维曝光剂量分布", "3D Exposure Dose Distribution"),
    ("chart_thickness_3d", "三维光刻胶厚度分布", "3D Photoresist Thickness Distribution"),
    ("chart_intensity", "初始光强分布", "Initial Intensity Distribution"),
    ("chart_compare_exposure", "曝光剂量分布比较", "Exposure Dose Comparison"),
    ("chart_compare_thickness", "光刻胶厚度分布比较", "Photoresist Thickness Comparison"),
    ("axis_position", "位置 (μm)", "Position (μm)"),
    ("axis_x", "X 位置 (μm)", "X Position (μm)"),
    ("axis_y", "Y 位置 (μm)", "Y Position (μm)"),
    ("axis_z", "Z 位置 (μm)", "Z Position (μm)"),
    ("axis_depth", "深度 (μm)", "Depth (μm)"),
    ("axis_exposure", "曝光剂量 (mJ/cm²)", "Exposure Dose (mJ/cm²)"),
    ("axis_thickness", "相对厚度", "Relative Thickness"),
    ("axis_intensity", "光强", "Intensity"),
    ("series_exposure", "曝光剂量", "Exposure Dose"),
    ("series_thickness", "光刻胶厚度", "Thickness"),
    ("time_label", "时间: {t} s", "Time: {t} s"),
    ("frame_label", "帧 {frame}/{total}", "Frame {frame}/{total}"),
    // thresholds and analysis
    ("threshold", "阈值", "Threshold"),
    ("threshold_title", "{name} 阈值: {value}", "{name} threshold: {value}"),
    ("analysis_crossings", "交点: {count}个", "Crossings: {count}"),
    ("analysis_no_crossings", "交点: 无", "Crossings: none"),
    ("analysis_line_width", "线宽: {width} μm", "Line width: {width} μm"),
    ("analysis_window", "工艺窗口: {percent}%", "Process window: {percent}%"),
    ("analysis_thickness_ok", "厚度达标区域: {percent}%", "Region meeting thickness: {percent}%"),
    ("analysis_above", "超阈值区域: {percent}%", "Above threshold: {percent}%"),
    ("analysis_below", "阈值以下: {percent}%", "Below threshold: {percent}%"),
    ("analysis_integral_diff", "积分差值: {value}", "Integral difference: {value}"),
    ("analysis_mean_excess", "平均超出: {value}", "Mean excess: {value}"),
    ("analysis_ratio", "阈值/峰值: {percent}%", "Threshold/peak: {percent}%"),
    ("analysis_process", "工艺分析:", "Process analysis:"),
    ("analysis_coverage_low", "覆盖率偏低，建议优化参数", "Coverage is low, consider tuning the parameters"),
    ("analysis_no_exposure", "无有效曝光区域", "No effective exposure region"),
    ("analysis_no_thickness", "厚度均不达标", "No region reaches the thickness threshold"),
    ("advice_low", "建议: 阈值偏低，可提高对比度", "Advice: threshold is low, contrast can be increased"),
    ("advice_high", "建议: 阈值偏高，可能欠曝光", "Advice: threshold is high, risk of underexposure"),
    ("advice_thickness_good", "厚度分布良好", "Thickness distribution is good"),
    ("advice_thickness_fair", "厚度分布一般，可优化", "Thickness distribution is fair, could be improved"),
    ("advice_thickness_poor", "厚度分布不佳，需要调整", "Thickness distribution is poor, adjust the parameters"),
    ("measure_result", "Δx: {dx}, Δy: {dy}, 距离: {distance}", "Δx: {dx}, Δy: {dy}, distance: {distance}"),
    ("measure_hint", "点击第二个点完成测量", "Click a second point to finish measuring"),
    ("point_position", "位置", "Position"),
    ("point_value", "数值", "Value"),
    ("point_dose", "曝光剂量 D", "Exposure dose D"),
    ("point_pac", "归一化光敏剂浓度 M", "Normalized PAC concentration M"),
    ("point_intensity", "初始光强 I", "Initial intensity I"),
    ("point_fit_a", "拟合参数 A", "Fitted parameter A"),
    ("point_fit_b", "拟合参数 B", "Fitted parameter B"),
    ("point_fit_c", "拟合参数 C", "Fitted parameter C"),
    ("point_acid", "光酸浓度 [H⁺]", "Acid concentration [H⁺]"),
    ("point_deprotection", "脱保护度", "Deprotection"),
    // errors and banners
    ("error_network", "网络请求失败，请检查后端服务", "Network request failed, please check the backend service"),
    ("error_status", "服务器返回错误状态 {status}", "Server returned status {status}"),
    ("error_decode", "无法解析服务器响应", "Could not decode the server response"),
    ("error_result", "计算结果数据格式错误", "Calculation result has an invalid format"),
    ("error_calculation", "计算出错", "Calculation failed"),
    ("fallback_images", "交互式数据不可用，已返回静态图像", "Interactive data unavailable, static images returned"),
    ("error_phase", "相位表达式格式无效，请检查语法。", "Invalid phase expression, please check the syntax."),
    ("error_remove_last", "至少需要保留一个参数组", "At least one parameter set is required"),
    ("warn_phase_static", "相位表达式不包含时间变量t，动画可能不会有变化", "The phase expression does not use t, the animation may not change"),
    // logs
    ("logs_title", "系统化日志", "System Logs"),
    ("logs_empty", "暂无日志", "No logs yet"),
    ("logs_clear", "清空日志", "Clear Logs"),
    ("logs_refresh", "刷新", "Refresh"),
    ("logs_cleared", "日志已清空", "Logs cleared"),
    ("log_tab_all", "全部", "All"),
    ("log_progress", "进度: {done}/{total}", "Progress: {done}/{total}"),
    // matrix
    ("dill_1d", "Dill 模型 - 1D", "Dill Model - 1D"),
    ("dill_2d", "Dill 模型 - 2D", "Dill Model - 2D"),
    ("dill_3d", "Dill 模型 - 3D", "Dill Model - 3D"),
    ("enhanced_dill_1d", "增强 Dill 模型 - 1D", "Enhanced Dill Model - 1D"),
    ("enhanced_dill_2d", "增强 Dill 模型 - 2D", "Enhanced Dill Model - 2D"),
    ("enhanced_dill_3d", "增强 Dill 模型 - 3D", "Enhanced Dill Model - 3D"),
    ("car_1d", "CAR 模型 - 1D", "CAR Model - 1D"),
    ("car_2d", "CAR 模型 - 2D", "CAR Model - 2D"),
    ("car_3d", "CAR 模型 - 3D", "CAR Model - 3D"),
    ("light_intensity", "光强分布:", "Light Intensity:"),
    ("exposure_dose", "曝光剂量:", "Exposure Dose:"),
    ("thickness_dist", "厚度分布:", "Thickness Distribution:"),
    ("light_attenuation", "光强衰减方程:", "Light Attenuation Equation:"),
    ("photosensitizer_concentration", "感光剂浓度方程:", "Photosensitizer Concentration Equation:"),
    ("parameter_fitting", "参数拟合:", "Parameter Fitting:"),
    ("initial_light_intensity", "初始光强分布:", "Initial Light Intensity:"),
    ("depth_light_attenuation", "深度方向光强衰减:", "Depth Light Attenuation:"),
    ("three_dim_initial_intensity", "三维初始光强分布:", "3D Initial Light Intensity:"),
    ("three_dim_light_propagation", "三维光强传播方程:", "3D Light Propagation Equation:"),
    ("three_dim_photosensitizer", "三维感光剂演化方程:", "3D Photosensitizer Evolution Equation:"),
    ("acid_generation", "光酸生成:", "Acid Generation:"),
    ("acid_diffusion", "光酸扩散:", "Acid Diffusion:"),
    ("deprotection_reaction", "脱保护反应:", "Deprotection Reaction:"),
    ("development_thickness", "显影厚度:", "Development Thickness:"),
    ("two_dim_acid_diffusion", "二维光酸扩散:", "2D Acid Diffusion:"),
    ("three_dim_acid_diffusion", "三维光酸扩散:", "3D Acid Diffusion:"),
    ("prev_model", "上一个模型", "Previous Model"),
    ("next_model", "下一个模型", "Next Model"),
    ("main_parameters", "主要参数", "Main Parameters"),
    ("reference", "参考文献:", "Reference:"),
    ("core_formulas", "核心公式", "Core Formulas"),
    ("dill_description", "Dill模型是一种简化的光刻胶曝光模型，主要用于薄层光刻胶的曝光过程模拟。该模型基于光敏剂浓度随曝光剂量的指数衰减关系，计算光刻胶的厚度分布。", "The Dill model is a simplified photoresist exposure model mainly used for thin photoresist exposure process simulation. The model calculates the photoresist thickness distribution based on the exponential decay relationship of photosensitizer concentration with exposure dose."),
    ("enhanced_dill_description", "增强Dill模型特别适用于厚层光刻胶的曝光模拟，考虑了光在深度方向上的衰减和光敏剂浓度随深度的变化。该模型通过联立偏微分方程组描述光强和光敏剂浓度的演化过程。", "The Enhanced Dill model is particularly suitable for thick photoresist exposure simulation, considering light attenuation in the depth direction and photosensitizer concentration variation with depth. This model describes the evolution of light intensity and photosensitizer concentration through coupled partial differential equations."),
    ("car_description", "CAR（化学放大型光刻胶）模型模拟了深紫外光刻胶的曝光和后处理过程。该模型描述了光酸的生成、扩散、催化反应和显影等关键步骤，能够更好地表征高分辨率图形的形成机制。", "The CAR (Chemically Amplified Resist) model simulates the exposure and post-processing of deep ultraviolet photoresists. The model describes key steps such as acid generation, diffusion, catalytic reaction, and development, better characterizing the formation mechanism of high-resolution patterns."),
    ("1d_description", "一维模型沿单一空间维度（通常是x轴）计算光强分布和光刻胶厚度，适用于简单的线条图形模拟。", "One-dimensional models calculate light intensity distribution and photoresist thickness along a single spatial dimension (usually the x-axis), suitable for simulating simple line patterns."),
    ("2d_description", "二维模型在平面(x-y)上计算光强分布和光刻胶厚度，能够模拟更复杂的平面图形，如点阵、网格等。", "Two-dimensional models calculate light intensity distribution and photoresist thickness on a plane (x-y), capable of simulating more complex planar patterns such as dot arrays and grids."),
    ("3d_description", "三维模型同时考虑横向(x-y)和纵向(z)维度，可以全面模拟光刻胶中的三维结构，包括侧壁轮廓和深度分布。", "Three-dimensional models consider both lateral (x-y) and longitudinal (z) dimensions, providing comprehensive simulation of three-dimensional structures in photoresists, including sidewall profiles and depth distributions."),
    ("param_i_avg", "平均入射光强度 (mW/cm²)", "Average incident light intensity (mW/cm²)"),
    ("param_v", "干涉条纹的可见度，控制空间调制的深度，取值范围0-1", "Visibility of interference fringes, controls depth of spatial modulation, range 0-1"),
    ("param_k", "干涉条纹的空间频率，决定条纹的密度", "Spatial frequency of interference fringes, determines fringe density"),
    ("param_t_exp", "曝光时间，单位为秒", "Exposure time in seconds"),
    ("param_c", "光敏速率常数，表示光刻胶对光的敏感程度", "Photosensitivity rate constant, indicates photoresist sensitivity to light"),
    ("param_zh", "光刻胶厚度，单位为μm", "Photoresist thickness in μm"),
    ("param_t", "前烘温度，单位为°C", "Pre-bake temperature in °C"),
    ("param_tb", "前烘时间，单位为秒", "Pre-bake time in seconds"),
    ("param_i0", "初始光强，单位为mW/cm²", "Initial light intensity in mW/cm²"),
    ("param_m0", "初始光敏剂浓度，归一化值", "Initial photosensitizer concentration, normalized value"),
    ("param_acid_gen", "光酸产生效率，表示光子到光酸的转化率", "Acid generation efficiency, represents photon to acid conversion rate"),
    ("param_diff_len", "光酸扩散长度，控制扩散程度", "Acid diffusion length, controls diffusion extent"),
    ("param_reaction_rate", "催化反应速率常数", "Catalytic reaction rate constant"),
    ("param_amplification", "放大因子，表示每个光酸分子可催化的反应数", "Amplification factor, indicates number of reactions catalyzed per acid molecule"),
    ("param_contrast", "对比度参数，控制显影过程的非线性程度", "Contrast parameter, controls non-linearity of development process"),
    ("note_dill_dose", "D 为曝光剂量，M 为归一化光敏剂浓度", "D is the exposure dose, M the normalized PAC concentration"),
    ("note_fit", "A、B、C 由 z_h、T、t_B 多项式拟合得到", "A, B and C are polynomial fits of z_h, T and t_B"),
    ("note_diffusion", "其中G表示高斯扩散函数，l_diff为扩散长度", "where G represents the Gaussian diffusion function, l_diff is the diffusion length"),
    ("note_diffusion_2d", "其中G₂表示二维高斯扩散函数", "where G₂ represents the two-dimensional Gaussian diffusion function"),
    ("note_diffusion_3d", "其中G₃表示三维高斯扩散函数", "where G₃ represents the three-dimensional Gaussian diffusion function"),
];

static TABLE: Lazy<HashMap<&'static str, (&'static str, &'static str)>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|(key, zh, en)| (*key, (*zh, *en)))
        .collect()
});

/// The whole table in one language, for clients that render on their own.
pub fn table(lang: Lang) -> BTreeMap<&'static str, &'static str> {
    TABLE.keys().map(|key| (*key, lang.text(*key))).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Text,
    Html,
    /// Input buttons carry their label in `value`.
    Button,
    Placeholder,
    OptionText,
    /// Bound numeric input; its content is user data and is never translated.
    Field,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub key: Option<String>,
    pub content: String,
}

/// The language-marked nodes of one page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, id: &str, kind: NodeKind, key: &str) -> &mut Self {
        self.nodes.push(Node {
            id: id.to_string(),
            kind,
            key: Some(key.to_string()),
            content: String::new(),
        });
        self
    }

    pub fn field(&mut self, id: &str, value: &str) -> &mut Self {
        self.nodes.push(Node {
            id: id.to_string(),
            kind: NodeKind::Field,
            key: None,
            content: value.to_string(),
        });
        self
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn set_content(&mut self, id: &str, content: &str) -> bool {
        match self.nodes.iter_mut().find(|node| node.id == id) {
            Some(node) => {
                node.content = content.to_string();
                true
            }
            None => false,
        }
    }

    /// Rewrites every marked node; returns how many were touched.
    pub fn apply(&mut self, lang: Lang) -> usize {
        let mut touched = 0;
        for node in &mut self.nodes {
            if node.kind == NodeKind::Field {
                continue;
            }
            if let Some(key) = &node.key {
                node.content = lang.text(key).to_string();
                touched += 1;
            }
        }
        debug!(lang = lang.code(), touched, "applied language");
        touched
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Stored {
    #[serde(rename = "userLanguage")]
    user_language: String,
}

/// Persists the chosen language across sessions.
#[derive(Debug, Clone)]
pub struct LangStore {
    path: PathBuf,
}

impl LangStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LangStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing, unreadable or unrecognised values all resolve to Chinese.
    pub fn load(&self) -> Lang {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Lang::default(),
        };
        match serde_json::from_str::<Stored>(&raw) {
            Ok(stored) => Lang::from_code(&stored.user_language).unwrap_or_else(|| {
                warn!(value = %stored.user_language, "ignoring stored language");
                Lang::default()
            }),
            Err(e) => {
                warn!("lang store at {} is corrupt: {}", self.path.display(), e);
                Lang::default()
            }
        }
    }

    pub fn save(&self, lang: Lang) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string(&Stored {
            user_language: lang.code().to_string(),
        })?;
        fs::write(&self.path, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_fallback() {
        assert_eq!(Lang::Zh.text("calculate"), "计算");
        assert_eq!(Lang::En.text("calculate"), "Calculate");
        assert_eq!(Lang::En.text("no_such_key"), "no_such_key");
        assert_eq!(
            Lang::En.format("param_set_name", &[("id", "4".into())]),
            "Parameter Set 4"
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(Lang::from_code("zh-CN"), Some(Lang::Zh));
        assert_eq!(Lang::from_code("EN"), Some(Lang::En));
        assert_eq!(Lang::from_code("fr"), None);
        assert_eq!(Lang::Zh.toggle().code(), "en");
    }

    #[test]
    fn test_keys_unique() {
        assert_eq!(TABLE.len(), ENTRIES.len());
    }

    #[test]
    fn test_language_round_trip_keeps_fields() {
        let mut doc = Document::new();
        doc.mark("calc-btn", NodeKind::Button, "calculate")
            .mark("name", NodeKind::Placeholder, "set_name_placeholder")
            .field("I_avg", "37.5");
        assert_eq!(doc.apply(Lang::En), 2);
        assert_eq!(doc.get("calc-btn").unwrap().content, "Calculate");
        doc.apply(Lang::Zh);
        doc.apply(Lang::En);
        assert_eq!(doc.get("name").unwrap().content, "Enter a custom name");
        assert_eq!(doc.get("I_avg").unwrap().content, "37.5");
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LangStore::new(dir.path().join("nested/lang.json"));
        assert_eq!(store.load(), Lang::Zh);
        store.save(Lang::En).unwrap();
        assert_eq!(store.load(), Lang::En);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"userLanguage":"en"}"#);
    }

    #[test]
    fn test_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lang.json");
        fs::write(&path, r#"{"userLanguage":"klingon"}"#).unwrap();
        assert_eq!(LangStore::new(&path).load(), Lang::Zh);
        fs::write(&path, "not json").unwrap();
        assert_eq!(LangStore::new(&path).load(), Lang::Zh);
    }
}
