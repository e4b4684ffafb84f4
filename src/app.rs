//! Root controller.
//!
//! [`App`] owns every piece of session state: language, parameter panel,
//! comparison sets, rendered figures, popups and the log panel. Each user
//! action is one method; nothing lives in module-level state.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::{self, ChartKind, Click, InteractionMode, Measurement, PointInfo};
use crate::animation::AnimationPlayer;
use crate::chart::{self, Figure};
use crate::client::{
    calculation_chain, comparison_chain, run_chain, ApiClient, Chain, CompareOutcome,
};
use crate::compare::{ComparisonCollection, ThresholdBoard};
use crate::config::Config;
use crate::error::{AppError, ClientError, CollectionError, StoreError};
use crate::i18n::{Document, Lang, LangStore, NodeKind};
use crate::logs::{LogCategory, LogPanel};
use crate::model::{ModelKind, SineType, StudyPreset};
use crate::params::{Invalidate, ParameterPanel};
use crate::request::{self, Body};
use crate::result::ResultPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Single,
    Compare,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub message: String,
    /// Set while the shake animation should play.
    pub shake: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupContent {
    Point(PointInfo),
    Measurement(Measurement),
}

impl PopupContent {
    pub fn lines(&self, lang: Lang) -> Vec<String> {
        match self {
            PopupContent::Point(info) => info.lines(lang),
            PopupContent::Measurement(m) => vec![m.describe(lang)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

pub const POPUP_SIZE: (f64, f64) = (320.0, 400.0);
const POPUP_EDGE: f64 = 10.0;
const POPUP_OFFSET: f64 = 20.0;

/// Top-left corner of a popup opened at `click`, kept inside `viewport`.
/// Without a click position the popup centres on the viewport.
pub fn place_popup(click: Option<(f64, f64)>, viewport: (f64, f64)) -> (f64, f64) {
    let (w, h) = POPUP_SIZE;
    let (vw, vh) = viewport;
    let (mx, my) = click.unwrap_or((vw / 2.0, vh / 2.0));
    let mut left = mx - w / 2.0;
    let mut top = my - h - POPUP_OFFSET;
    if left < POPUP_EDGE {
        left = POPUP_EDGE;
    }
    if left + w > vw - POPUP_EDGE {
        left = vw - w - POPUP_EDGE;
    }
    if top < POPUP_EDGE {
        top = my + POPUP_OFFSET;
    }
    if top + h > vh - POPUP_EDGE {
        top = vh - h - POPUP_EDGE;
    }
    (left, top)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub content: PopupContent,
    pub anchor: Option<(f64, f64)>,
}

/// At most one popup, with at most one click-outside listener.
#[derive(Debug, Default)]
pub struct PopupLayer {
    open: Option<Popup>,
    listener: Option<ListenerId>,
    next_id: u64,
}

impl PopupLayer {
    /// Replaces any open popup and returns the listener for the new one.
    pub fn open(&mut self, content: PopupContent, anchor: Option<(f64, f64)>) -> ListenerId {
        self.close();
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listener = Some(id);
        self.open = Some(Popup { content, anchor });
        id
    }

    pub fn close(&mut self) -> bool {
        self.listener = None;
        self.open.take().is_some()
    }

    /// Fired by a click outside the popup. Ids from earlier popups are stale.
    pub fn outside_click(&mut self, id: ListenerId) -> bool {
        if self.listener == Some(id) {
            self.close()
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&Popup> {
        self.open.as_ref()
    }

    pub fn listeners(&self) -> usize {
        usize::from(self.listener.is_some())
    }
}

#[derive(Debug, Clone)]
enum Shown {
    Single(ResultPayload),
    Compare(CompareOutcome),
}

struct ChartBoard {
    figures: Vec<Figure>,
    thresholds: ThresholdBoard,
    animation: AnimationPlayer,
    shown: Option<Shown>,
    rendered_frame: usize,
}

fn page_document() -> Document {
    let mut doc = Document::new();
    doc.mark("page-title", NodeKind::Text, "page_title")
        .mark("nav-single", NodeKind::Text, "nav_single")
        .mark("nav-compare", NodeKind::Text, "nav_compare")
        .mark("model-label", NodeKind::Text, "select_model")
        .mark("model-dill", NodeKind::OptionText, "model_dill")
        .mark("model-enhanced-dill", NodeKind::OptionText, "model_enhanced_dill")
        .mark("model-car", NodeKind::OptionText, "model_car")
        .mark("calc-btn", NodeKind::Button, "calculate")
        .mark("compare-btn", NodeKind::Button, "compare")
        .mark("add-set-btn", NodeKind::Button, "add_set")
        .mark("set-name", NodeKind::Placeholder, "set_name_placeholder")
        .mark("logs-title", NodeKind::Html, "logs_title");
    doc
}

pub struct App {
    client: ApiClient,
    lang: Lang,
    store: LangStore,
    document: Document,
    view: View,
    panel: ParameterPanel,
    collection: ComparisonCollection,
    board: ChartBoard,
    popups: PopupLayer,
    mode: InteractionMode,
    banner: Option<Banner>,
    loading: bool,
    logs: LogPanel,
    calculation: Chain<Body, ResultPayload>,
    comparison: Chain<Value, CompareOutcome>,
}

impl App {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let store = LangStore::new(&config.lang_store_path);
        let lang = store.load();
        let client = ApiClient::new(config)?.with_lang(lang);
        let model = ModelKind::Dill;
        let mut logs = LogPanel::new(client.clone(), LogCategory::Single, config);
        logs.set_model(model);
        let mut document = page_document();
        document.apply(lang);
        Ok(App {
            client,
            lang,
            store,
            document,
            view: View::Single,
            panel: ParameterPanel::new(model),
            collection: ComparisonCollection::new(model, lang),
            board: ChartBoard {
                figures: Vec::new(),
                thresholds: ThresholdBoard::new(),
                animation: AnimationPlayer::new(0),
                shown: None,
                rendered_frame: 0,
            },
            popups: PopupLayer::default(),
            mode: InteractionMode::default(),
            banner: None,
            loading: false,
            logs,
            calculation: calculation_chain(),
            comparison: comparison_chain(),
        })
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn model(&self) -> ModelKind {
        self.panel.model()
    }

    pub fn panel(&self) -> &ParameterPanel {
        &self.panel
    }

    pub fn collection(&self) -> &ComparisonCollection {
        &self.collection
    }

    pub fn figures(&self) -> &[Figure] {
        &self.board.figures
    }

    pub fn thresholds(&self) -> &ThresholdBoard {
        &self.board.thresholds
    }

    /// The payload behind the current figures, if a calculation succeeded.
    pub fn result(&self) -> Option<&ResultPayload> {
        match &self.board.shown {
            Some(Shown::Single(payload)) => Some(payload),
            _ => None,
        }
    }

    pub fn comparison(&self) -> Option<&CompareOutcome> {
        match &self.board.shown {
            Some(Shown::Compare(outcome)) => Some(outcome),
            _ => None,
        }
    }

    pub fn animation(&mut self) -> &mut AnimationPlayer {
        &mut self.board.animation
    }

    pub fn popups(&self) -> &PopupLayer {
        &self.popups
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn logs(&self) -> &LogPanel {
        &self.logs
    }

    pub fn logs_mut(&mut self) -> &mut LogPanel {
        &mut self.logs
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn show_error(&mut self, message: String) {
        self.banner = Some(Banner { message, shake: true });
    }

    /// The shake animation has played.
    pub fn settle_banner(&mut self) {
        if let Some(banner) = &mut self.banner {
            banner.shake = false;
        }
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    fn clear_charts(&mut self) {
        self.board.figures.clear();
        self.board.shown = None;
        self.board.animation.load(0);
        self.popups.close();
        if self.mode.is_measuring() {
            self.mode = InteractionMode::Measuring { first: None };
        }
    }

    fn invalidate(&mut self, _: Invalidate) {
        self.clear_charts();
    }

    fn render(&mut self) {
        let lang = self.lang;
        let frame = self.board.animation.frame();
        self.board.figures = match &self.board.shown {
            None => Vec::new(),
            Some(Shown::Single(ResultPayload::Animated(a))) => chart::render_frame(a, frame, lang),
            Some(Shown::Single(payload)) => chart::render(payload, lang),
            Some(Shown::Compare(CompareOutcome::Data(data))) => {
                let [mut exposure, mut thickness] = chart::comparison(data, self.collection.sets(), lang);
                for (fig, kind) in [
                    (&mut exposure, ChartKind::Exposure),
                    (&mut thickness, ChartKind::Thickness),
                ] {
                    chart::apply_thresholds(fig, kind, self.board.thresholds.controls(kind), lang);
                }
                vec![exposure, thickness]
            }
            Some(Shown::Compare(CompareOutcome::Images(_))) => Vec::new(),
        };
        self.board.rendered_frame = frame;
    }

    /// Re-renders when the animation has advanced since the last render.
    pub fn refresh_frame(&mut self) -> bool {
        let animated = matches!(self.board.shown, Some(Shown::Single(ResultPayload::Animated(_))));
        if animated && self.board.animation.frame() != self.board.rendered_frame {
            self.render();
            true
        } else {
            false
        }
    }

    fn figure_mut(&mut self, kind: ChartKind) -> Option<&mut Figure> {
        self.board
            .figures
            .iter_mut()
            .find(|fig| fig.name.starts_with(kind.as_str()))
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
        self.logs.set_category(match view {
            View::Single => LogCategory::Single,
            View::Compare => LogCategory::Compare,
        });
        self.board.thresholds.clear();
        self.clear_charts();
    }

    /// Swaps the panel and destructively reseeds the comparison sets.
    pub fn select_model(&mut self, model: ModelKind) {
        let sine = self.panel.sine_type();
        self.panel = ParameterPanel::new(model);
        let _ = self.panel.set_sine_type(sine);
        self.collection.reseed(model, self.lang);
        self.logs.set_model(model);
        self.mode = InteractionMode::Idle;
        self.board.thresholds.clear();
        self.clear_charts();
        info!(model = model.as_str(), "model selected");
    }

    pub fn set_sine_type(&mut self, sine: SineType) {
        let marker = self.panel.set_sine_type(sine);
        self.invalidate(marker);
    }

    pub fn set_animation(&mut self, enabled: bool) {
        let marker = self.panel.set_animation(enabled);
        self.invalidate(marker);
    }

    pub fn set_phase(&mut self, expr: &str) -> bool {
        match self.panel.set_phase(expr) {
            Some(marker) => {
                self.invalidate(marker);
                true
            }
            None => false,
        }
    }

    /// Returns the stored (coerced) value, or `None` for an unknown field.
    pub fn edit_field(&mut self, key: &str, raw: &str) -> Option<f64> {
        let (value, marker) = self.panel.edit(key, raw)?;
        self.invalidate(marker);
        Some(value)
    }

    pub fn edit_set_field(&mut self, id: u32, key: &str, raw: &str) -> Result<f64, CollectionError> {
        let value = self.collection.set_field(id, key, raw)?;
        self.clear_charts();
        Ok(value)
    }

    pub fn add_set(&mut self) -> u32 {
        self.collection.add()
    }

    pub fn duplicate_set(&mut self, id: u32) -> Result<u32, CollectionError> {
        self.collection.duplicate(id)
    }

    /// Drops the set together with its series and threshold overlays.
    pub fn remove_set(&mut self, id: u32) -> Result<(), CollectionError> {
        let index = match self.collection.remove(id) {
            Ok(index) => index,
            Err(e) => {
                if e == CollectionError::LastSet {
                    let message = self.lang.text("error_remove_last").to_string();
                    self.show_error(message);
                }
                return Err(e);
            }
        };
        self.board.thresholds.remove_series(index);
        if let Some(Shown::Compare(CompareOutcome::Data(data))) = &mut self.board.shown {
            for series in [&mut data.exposure, &mut data.thickness] {
                if index < series.len() {
                    series.remove(index);
                }
            }
        }
        self.render();
        Ok(())
    }

    pub fn move_set(&mut self, from: usize, to: usize) -> Result<(), CollectionError> {
        self.collection.move_set(from, to)?;
        self.board.thresholds.move_series(from, to);
        if let Some(Shown::Compare(CompareOutcome::Data(data))) = &mut self.board.shown {
            for series in [&mut data.exposure, &mut data.thickness] {
                if from < series.len() && to < series.len() {
                    let s = series.remove(from);
                    series.insert(to, s);
                }
            }
        }
        self.render();
        Ok(())
    }

    pub fn rename_set(&mut self, id: u32, name: &str) -> Result<(), CollectionError> {
        self.collection.rename(id, name)?;
        self.render();
        Ok(())
    }

    pub fn apply_study(&mut self, study: StudyPreset) {
        self.collection.apply_study(study, self.lang);
        if self.panel.model() != ModelKind::Dill {
            let sine = self.panel.sine_type();
            self.panel = ParameterPanel::new(ModelKind::Dill);
            let _ = self.panel.set_sine_type(sine);
            self.logs.set_model(ModelKind::Dill);
        }
        self.board.thresholds.clear();
        self.clear_charts();
    }

    fn begin(&mut self) {
        self.loading = true;
        self.banner = None;
        self.clear_charts();
    }

    fn finish(&mut self, result: &Result<(), AppError>) {
        self.loading = false;
        if let Err(e) = result {
            warn!(error = %e, "request failed");
            let message = match e {
                AppError::Phase(_) => self.lang.text("error_phase").to_string(),
                AppError::Client(e) => e.banner(self.lang),
            };
            self.show_error(message);
        }
    }

    /// Fetches logs once and keeps the background poll running.
    async fn refresh_logs(&mut self) {
        if let Err(e) = self.logs.refresh_now().await {
            debug!(error = %e, "log refresh failed");
        }
        if !self.logs.is_polling() {
            self.logs.start();
        }
    }

    /// Runs the single calculation. Loading is cleared whatever happens.
    pub async fn calculate(&mut self) -> Result<(), AppError> {
        self.begin();
        let result = self.run_calculation().await;
        self.finish(&result);
        result
    }

    async fn run_calculation(&mut self) -> Result<(), AppError> {
        let body = request::single(&self.panel)?;
        self.refresh_logs().await;
        let payload = run_chain(&self.client, &self.calculation, &body).await?;
        let frames = match &payload {
            ResultPayload::Animated(a) => a.frames.len(),
            _ => 0,
        };
        self.board.animation.load(frames);
        self.board.shown = Some(Shown::Single(payload));
        self.render();
        info!(figures = self.board.figures.len(), "calculation rendered");
        Ok(())
    }

    pub async fn compare(&mut self) -> Result<(), AppError> {
        self.begin();
        let result = self.run_comparison().await;
        self.finish(&result);
        result
    }

    async fn run_comparison(&mut self) -> Result<(), AppError> {
        let body = request::compare(self.collection.sets());
        self.refresh_logs().await;
        let outcome = run_chain(&self.client, &self.comparison, &body).await?;
        match &outcome {
            CompareOutcome::Data(data) => self.board.thresholds.rebuild(data),
            CompareOutcome::Images(_) => self.board.thresholds.clear(),
        }
        self.board.shown = Some(Shown::Compare(outcome));
        self.render();
        info!(sets = self.collection.len(), "comparison rendered");
        Ok(())
    }

    fn redraw_thresholds(&mut self, kind: ChartKind) {
        if !matches!(self.board.shown, Some(Shown::Compare(CompareOutcome::Data(_)))) {
            return;
        }
        let lang = self.lang;
        let controls = self.board.thresholds.controls(kind);
        if let Some(fig) = self
            .board
            .figures
            .iter_mut()
            .find(|fig| fig.name == kind.as_str())
        {
            chart::apply_thresholds(fig, kind, controls, lang);
        }
    }

    pub fn set_threshold(&mut self, kind: ChartKind, index: usize, value: f64) -> Option<f64> {
        let value = self.board.thresholds.set_value(kind, index, value)?;
        self.redraw_thresholds(kind);
        Some(value)
    }

    pub fn toggle_threshold(&mut self, kind: ChartKind, index: usize) -> Option<bool> {
        let visible = self.board.thresholds.toggle(kind, index)?;
        self.redraw_thresholds(kind);
        Some(visible)
    }

    pub fn toggle_threshold_details(&mut self, kind: ChartKind, index: usize) -> Option<bool> {
        let expanded = self.board.thresholds.toggle_details(kind, index)?;
        self.redraw_thresholds(kind);
        Some(expanded)
    }

    /// Flips the language, re-renders and persists the choice. The switch
    /// takes effect even when persisting fails.
    pub fn switch_language(&mut self) -> Result<Lang, StoreError> {
        self.lang = self.lang.toggle();
        self.client.set_lang(self.lang);
        self.logs.set_client(self.client.clone());
        self.document.apply(self.lang);
        self.render();
        info!(lang = self.lang.code(), "language switched");
        self.store.save(self.lang)?;
        Ok(self.lang)
    }

    fn clear_measurement_marks(&mut self) {
        for fig in &mut self.board.figures {
            chart::clear_measurement(fig);
        }
    }

    pub fn toggle_measurement(&mut self) -> bool {
        let on = self.mode.toggle_measurement();
        self.clear_measurement_marks();
        if on {
            self.popups.close();
        }
        on
    }

    pub fn toggle_point_info(&mut self) -> bool {
        let on = self.mode.toggle_point_info();
        self.clear_measurement_marks();
        if !on {
            self.popups.close();
        }
        on
    }

    /// A click at data coordinates `(x, y)` on series `series` of a chart.
    /// `anchor` is the screen position used to place a popup.
    pub fn click_point(
        &mut self,
        kind: ChartKind,
        series: usize,
        x: f64,
        y: f64,
        anchor: Option<(f64, f64)>,
    ) -> Click {
        let start = match self.mode {
            InteractionMode::Measuring { first } => first,
            _ => None,
        };
        let click = self.mode.click(x, y);
        let lang = self.lang;
        match click {
            Click::Ignored => {}
            Click::MeasureStarted => {
                if let Some(fig) = self.figure_mut(kind) {
                    chart::mark_measurement(fig, &[(x, y)], None);
                }
            }
            Click::Measured(m) => {
                if let (Some(a), Some(fig)) = (start, self.figure_mut(kind)) {
                    chart::mark_measurement(fig, &[a, (x, y)], Some(m.describe(lang)));
                }
            }
            Click::Inspect { x, y } => {
                let set = match self.view {
                    View::Single => Some(self.panel.set()),
                    View::Compare => match &self.board.shown {
                        Some(Shown::Compare(CompareOutcome::Data(data))) => data
                            .exposure
                            .get(series)
                            .and_then(|s| self.collection.get(s.set_id)),
                        _ => None,
                    },
                };
                if let Some(set) = set {
                    let info = analysis::point_info(set, kind, x, y, lang);
                    self.open_popup(PopupContent::Point(info), anchor);
                }
            }
        }
        click
    }

    pub fn open_popup(&mut self, content: PopupContent, anchor: Option<(f64, f64)>) -> ListenerId {
        self.popups.open(content, anchor)
    }

    pub fn close_popup(&mut self) -> bool {
        self.popups.close()
    }

    pub fn outside_click(&mut self, id: ListenerId) -> bool {
        self.popups.outside_click(id)
    }

    /// Text of the open popup in the current language.
    pub fn popup_lines(&self) -> Option<Vec<String>> {
        self.popups.current().map(|p| p.content.lines(self.lang))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn app(base: &str, dir: &TempDir) -> App {
        let config = Config::default()
            .with_api_base_url(base)
            .with_lang_store_path(dir.path().join("lang.json"));
        App::new(&config).unwrap()
    }

    fn backend(hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/api/logs",
                get(|| async {
                    Json(json!({"success": true, "data": {"logs": [
                        {"id": "b1", "message": "开始计算 dill 1D", "type": "progress"},
                    ]}}))
                }),
            )
            .route(
                "/api/calculate_data",
                post(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                    async {
                        Json(json!({"success": true, "data": {
                            "x": [0.0, 1.0, 2.0],
                            "exposure_dose": [10.0, 20.0, 10.0],
                            "thickness": [0.9, 0.5, 0.9],
                        }}))
                    }
                }),
            )
            .route(
                "/api/compare_data",
                post(|| async {
                    Json(json!({"success": true, "data": {
                        "x": [0, 1, 2, 3],
                        "exposure_doses": [
                            {"setId": 1, "data": [10, 40, 10, 40]},
                            {"setId": 2, "data": [20, 30, 20, 30]},
                            {"setId": 3, "data": [5, 50, 5, 50]},
                        ],
                        "thicknesses": [
                            {"setId": 1, "data": [1.0, 0.2, 1.0, 0.2]},
                            {"setId": 2, "data": [0.9, 0.5, 0.9, 0.5]},
                            {"setId": 3, "data": [0.8, 0.1, 0.8, 0.1]},
                        ],
                    }}))
                }),
            )
    }

    async fn running() -> (App, Arc<AtomicUsize>, TempDir) {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn(backend(hits.clone())).await;
        let dir = tempfile::tempdir().unwrap();
        (app(&base, &dir), hits, dir)
    }

    fn shape_names(fig: &Figure) -> Vec<&str> {
        fig.layout.shapes.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_popup_stays_on_screen() {
        assert_eq!(place_popup(Some((100.0, 50.0)), (1000.0, 800.0)), (10.0, 70.0));
        assert_eq!(place_popup(Some((500.0, 600.0)), (1000.0, 800.0)), (340.0, 180.0));
        assert_eq!(place_popup(None, (1000.0, 800.0)), (340.0, 390.0));
    }

    #[test]
    fn test_popup_layer_keeps_one_listener() {
        let mut layer = PopupLayer::default();
        let m = PopupContent::Measurement(Measurement::between((0.0, 0.0), (3.0, 4.0)));
        let first = layer.open(m.clone(), None);
        let second = layer.open(m, None);
        assert_eq!(layer.listeners(), 1);
        assert!(!layer.outside_click(first));
        assert!(layer.current().is_some());
        assert!(layer.outside_click(second));
        assert_eq!(layer.listeners(), 0);
        assert!(!layer.close());
    }

    #[tokio::test]
    async fn test_calculate_then_edit_clears() {
        let (mut app, hits, _dir) = running().await;
        app.calculate().await.unwrap();
        assert!(!app.is_loading());
        assert_eq!(app.figures().len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(app.edit_field("I_avg", "500"), Some(100.0));
        assert!(app.figures().is_empty());
        assert!(app.result().is_none());
        assert_eq!(app.edit_field("nope", "1"), None);
    }

    #[tokio::test]
    async fn test_invalid_phase_blocks_request() {
        let (mut app, hits, _dir) = running().await;
        app.set_sine_type(SineType::Multi);
        assert!(app.set_phase("sin("));
        let err = app.calculate().await.unwrap_err();
        assert!(matches!(err, AppError::Phase(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!app.is_loading());
        let banner = app.banner().unwrap();
        assert!(banner.shake);
        assert_eq!(banner.message, Lang::Zh.text("error_phase"));
        app.settle_banner();
        assert!(!app.banner().unwrap().shake);
    }

    #[tokio::test]
    async fn test_failed_tiers_show_banner() {
        let base = spawn(Router::new().route(
            "/api/calculate",
            post(|| async { (StatusCode::BAD_GATEWAY, "down") }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&base, &dir);
        let err = app.calculate().await.unwrap_err();
        assert!(matches!(err, AppError::Client(ClientError::Status { status: 502, .. })));
        assert!(!app.is_loading());
        assert!(app.banner().unwrap().message.contains("502"));
        assert!(app.figures().is_empty());
    }

    #[tokio::test]
    async fn test_thresholds_follow_set_removal() {
        let (mut app, _, _dir) = running().await;
        app.set_view(View::Compare);
        assert_eq!(app.add_set(), 3);
        app.compare().await.unwrap();
        assert_eq!(app.figures()[0].traces.len(), 3);

        assert_eq!(app.toggle_threshold(ChartKind::Exposure, 2), Some(true));
        assert!(shape_names(&app.figures()[0]).contains(&"threshold_line_exposure_2"));

        app.remove_set(2).unwrap();
        assert_eq!(app.figures()[0].traces.len(), 2);
        assert_eq!(app.thresholds().controls(ChartKind::Exposure).len(), 2);
        let names = shape_names(&app.figures()[0]);
        assert!(names.contains(&"threshold_line_exposure_1"));
        assert!(!names.contains(&"threshold_line_exposure_2"));

        app.move_set(0, 1).unwrap();
        assert!(shape_names(&app.figures()[0]).contains(&"threshold_line_exposure_0"));
        assert_eq!(app.collection().sets()[1].id, 1);
    }

    #[tokio::test]
    async fn test_last_set_cannot_be_removed() {
        let (mut app, _, _dir) = running().await;
        app.remove_set(1).unwrap();
        assert_eq!(app.remove_set(2), Err(CollectionError::LastSet));
        assert_eq!(app.collection().len(), 1);
        assert_eq!(app.banner().unwrap().message, "至少需要保留一个参数组");
    }

    #[tokio::test]
    async fn test_language_switch_rerenders_and_persists() {
        let (mut app, _, dir) = running().await;
        assert_eq!(app.lang(), Lang::Zh);
        app.calculate().await.unwrap();
        assert_eq!(app.figures()[0].layout.xaxis.title, "位置 (μm)");

        assert_eq!(app.switch_language().unwrap(), Lang::En);
        assert_eq!(app.figures()[0].layout.xaxis.title, "Position (μm)");
        assert_eq!(app.document().get("calc-btn").unwrap().content, "Calculate");
        assert_eq!(LangStore::new(dir.path().join("lang.json")).load(), Lang::En);
    }

    #[tokio::test]
    async fn test_modes_are_exclusive() {
        let (mut app, _, _dir) = running().await;
        app.calculate().await.unwrap();

        assert!(app.toggle_point_info());
        let click = app.click_point(ChartKind::Exposure, 0, 1.0, 20.0, Some((100.0, 50.0)));
        assert!(matches!(click, Click::Inspect { .. }));
        app.click_point(ChartKind::Exposure, 0, 2.0, 10.0, None);
        assert_eq!(app.popups().listeners(), 1);
        assert!(app.popup_lines().unwrap()[0].contains("2.000"));

        assert!(app.toggle_measurement());
        assert!(app.popups().current().is_none());
        assert_eq!(app.click_point(ChartKind::Exposure, 0, 0.0, 10.0, None), Click::MeasureStarted);
        let click = app.click_point(ChartKind::Exposure, 0, 1.0, 20.0, None);
        assert!(matches!(click, Click::Measured(m) if (m.distance - 101f64.sqrt()).abs() < 1e-9));
        assert!(shape_names(&app.figures()[0]).contains(&"measure_line"));

        assert!(app.toggle_point_info());
        assert!(!app.mode().is_measuring());
        assert!(app.figures()[0].layout.shapes.is_empty());
    }

    #[tokio::test]
    async fn test_model_switch_reseeds_and_drops_listener() {
        let (mut app, _, _dir) = running().await;
        app.open_popup(
            PopupContent::Measurement(Measurement::between((0.0, 0.0), (1.0, 1.0))),
            None,
        );
        app.add_set();
        app.select_model(ModelKind::Car);
        assert_eq!(app.popups().listeners(), 0);
        assert_eq!(app.model(), ModelKind::Car);
        assert_eq!(app.collection().model(), ModelKind::Car);
        assert_eq!(app.collection().len(), 2);

        app.apply_study(StudyPreset::Contrast);
        assert_eq!(app.model(), ModelKind::Dill);
        assert_eq!(app.collection().sets()[0].number("V"), Some(1.0));
    }

    #[tokio::test]
    async fn test_calculation_starts_log_poll() {
        let (mut app, _, _dir) = running().await;
        assert!(!app.logs().is_polling());
        app.calculate().await.unwrap();
        assert!(app.logs().is_polling());
        assert!(app.logs().entries().iter().any(|e| e.id == "b1"));

        app.compare().await.unwrap();
        assert!(app.logs().is_polling());
        assert!(app.logs_mut().stop());
    }

    #[tokio::test]
    async fn test_point_info_uses_clicked_series_set() {
        let base = spawn(Router::new().route(
            "/api/compare_data",
            post(|| async {
                Json(json!({"success": true, "data": {
                    "x": [0, 1, 2],
                    "exposure_doses": [
                        {"setId": 1, "data": [10, 40, 10]},
                        {"setId": 2, "data": [20, 30, 20]},
                    ],
                    "thicknesses": [
                        {"setId": 1, "data": [1.0, 0.2, 1.0]},
                        {"setId": 2, "data": [0.9, 0.5, 0.9]},
                    ],
                }}))
            }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&base, &dir);
        app.set_view(View::Compare);
        app.compare().await.unwrap();

        assert_eq!(app.add_set(), 3);
        app.move_set(2, 0).unwrap();
        assert_eq!(app.collection().sets()[0].id, 3);
        let drawn = app.figures()[0].trace_names()[0].to_string();

        assert!(app.toggle_point_info());
        let click = app.click_point(ChartKind::Exposure, 0, 1.0, 40.0, None);
        assert!(matches!(click, Click::Inspect { .. }));
        match &app.popups().current().unwrap().content {
            PopupContent::Point(info) => {
                assert_eq!(info.set_name, drawn);
                assert_eq!(info.set_name, app.collection().get(1).unwrap().display_name(Lang::Zh));
            }
            other => panic!("unexpected popup {:?}", other),
        }

        app.toggle_point_info();
        app.toggle_point_info();
        app.click_point(ChartKind::Thickness, 5, 1.0, 0.2, None);
        assert!(app.popups().current().is_none());
    }
}
