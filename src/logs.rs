//! Backend log panel: normalization, a bounded cache and the poll loop.
//!
//! Log items arrive in whatever shape the backend produced them; missing
//! fields are inferred from the message text. The cache keeps the newest
//! entries first and never grows past its cap.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::ClientError;
use crate::model::ModelKind;
use crate::task::IntervalTask;

pub const CACHE_CAP: usize = 1000;

static PROGRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:进度|progress):\s*(\d+)\s*/\s*(\d+)").expect("static regex"));

static LOCAL_IDS: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Progress,
    Success,
    Warning,
    Error,
}

impl LogKind {
    pub const ALL: [LogKind; 5] = [
        LogKind::Info,
        LogKind::Progress,
        LogKind::Success,
        LogKind::Warning,
        LogKind::Error,
    ];

    pub fn from_id(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "info" => Some(LogKind::Info),
            "progress" => Some(LogKind::Progress),
            "success" => Some(LogKind::Success),
            "warning" | "warn" => Some(LogKind::Warning),
            "error" => Some(LogKind::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Progress => "progress",
            LogKind::Success => "success",
            LogKind::Warning => "warning",
            LogKind::Error => "error",
        }
    }

    /// Keyword classification for items that arrive without a type.
    pub fn infer(message: &str) -> Self {
        let m = message.to_lowercase();
        if m.contains("error") || m.contains("失败") || m.contains("错误") {
            LogKind::Error
        } else if m.contains("warning") || m.contains("警告") {
            LogKind::Warning
        } else if m.contains("进度:")
            || m.contains("progress:")
            || m.contains("计算完成")
            || m.contains("开始计算")
        {
            LogKind::Progress
        } else if m.contains("完成") || m.contains("成功") || m.contains("success") {
            LogKind::Success
        } else {
            LogKind::Info
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Single,
    Compare,
}

impl LogCategory {
    /// The `page` query value the backend filters by.
    pub fn page(self) -> &'static str {
        match self {
            LogCategory::Single => "index",
            LogCategory::Compare => "compare",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub kind: LogKind,
    pub message: String,
    pub details: String,
    pub category: LogCategory,
    pub subcategory: String,
    /// `1D`, `2D` or `3D` when known.
    pub dimension: Option<String>,
}

fn now_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_default()
}

fn local_id() -> String {
    format!("local-{}", LOCAL_IDS.fetch_add(1, Ordering::Relaxed))
}

fn text(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn detect_subcategory(message: &str) -> Option<ModelKind> {
    let m = message.to_lowercase();
    if m.contains("enhanced") || m.contains("厚胶") {
        Some(ModelKind::EnhancedDill)
    } else if m.contains("dill") {
        Some(ModelKind::Dill)
    } else if m.contains("car") {
        Some(ModelKind::Car)
    } else {
        None
    }
}

fn detect_dimension(message: &str) -> Option<&'static str> {
    let m = message.to_lowercase();
    let any = |keys: &[&str]| keys.iter().any(|k| m.contains(k));
    if any(&["3d", "三维"]) {
        Some("3D")
    } else if any(&["2d", "二维", "多正弦", "multi"]) {
        Some("2D")
    } else if any(&["1d", "一维", "单正弦", "single"]) {
        Some("1D")
    } else {
        None
    }
}

impl LogEntry {
    /// Entry produced on this side, e.g. when polling itself fails.
    pub fn local(kind: LogKind, message: impl Into<String>, category: LogCategory) -> Self {
        LogEntry {
            id: local_id(),
            timestamp: now_millis(),
            kind,
            message: message.into(),
            details: String::new(),
            category,
            subcategory: "system".into(),
            dimension: None,
        }
    }

    /// Fills every missing field of a raw backend item. `model` is the
    /// subcategory used when the message names no model.
    pub fn normalize(item: &Value, category: LogCategory, model: Option<ModelKind>) -> Self {
        let message = text(item, "message").unwrap_or_default();
        let kind = text(item, "type")
            .and_then(|t| LogKind::from_id(&t))
            .unwrap_or_else(|| LogKind::infer(&message));
        let category = match text(item, "category").as_deref() {
            Some("compare") => LogCategory::Compare,
            Some("single") => LogCategory::Single,
            _ => category,
        };
        let subcategory = text(item, "subcategory")
            .or_else(|| detect_subcategory(&message).or(model).map(|m| m.as_str().to_string()))
            .unwrap_or_else(|| "unknown".into());
        let dimension = match text(item, "dimension") {
            Some(d) => Some(d.trim_start_matches('-').to_uppercase()),
            None => detect_dimension(&message).map(str::to_string),
        };
        LogEntry {
            id: text(item, "id").unwrap_or_else(local_id),
            timestamp: text(item, "timestamp").unwrap_or_else(now_millis),
            kind,
            message,
            details: text(item, "details").unwrap_or_default(),
            category,
            subcategory,
            dimension,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }
}

/// Latest `进度: a/b` (or `progress: a/b`) among newest-first entries.
pub fn progress<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Option<Progress> {
    entries.into_iter().find_map(|entry| {
        let caps = PROGRESS.captures(&entry.message)?;
        Some(Progress {
            done: caps[1].parse().ok()?,
            total: caps[2].parse().ok()?,
        })
    })
}

/// Newest-first, id-deduplicated, capped.
#[derive(Debug, Clone)]
pub struct LogCache {
    entries: VecDeque<LogEntry>,
    ids: HashSet<String>,
    cap: usize,
}

impl Default for LogCache {
    fn default() -> Self {
        Self::with_cap(CACHE_CAP)
    }
}

impl LogCache {
    pub fn with_cap(cap: usize) -> Self {
        LogCache {
            entries: VecDeque::new(),
            ids: HashSet::new(),
            cap: cap.max(1),
        }
    }

    /// Adds unseen entries in arrival order, each becoming the newest.
    /// Returns how many were added.
    pub fn ingest(&mut self, items: impl IntoIterator<Item = LogEntry>) -> usize {
        let mut added = 0;
        for entry in items {
            if !self.ids.insert(entry.id.clone()) {
                continue;
            }
            self.entries.push_front(entry);
            added += 1;
        }
        while self.entries.len() > self.cap {
            if let Some(old) = self.entries.pop_back() {
                self.ids.remove(&old.id);
            }
        }
        added
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        LogQuery {
            model_type: None,
            limit: 100,
            page: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTab {
    All,
    Model(ModelKind),
}

struct Shared {
    cache: Mutex<LogCache>,
}

impl Shared {
    fn cache(&self) -> MutexGuard<'_, LogCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn poll_once(
    client: &ApiClient,
    shared: &Shared,
    query: &LogQuery,
    category: LogCategory,
    model: Option<ModelKind>,
) -> Result<usize, ClientError> {
    let items = client.fetch_logs(query).await?;
    let entries: Vec<LogEntry> = items
        .iter()
        .map(|item| LogEntry::normalize(item, category, model))
        .collect();
    let added = shared.cache().ingest(entries);
    if added > 0 {
        debug!(added, "new log entries");
    }
    Ok(added)
}

/// The log side panel. Polling runs independently of visibility.
pub struct LogPanel {
    client: ApiClient,
    shared: Arc<Shared>,
    category: LogCategory,
    model: Option<ModelKind>,
    tab: LogTab,
    filters: BTreeSet<LogKind>,
    visible: bool,
    limit: usize,
    period: Duration,
    poll: IntervalTask,
}

impl LogPanel {
    pub fn new(client: ApiClient, category: LogCategory, config: &Config) -> Self {
        LogPanel {
            client,
            shared: Arc::new(Shared {
                cache: Mutex::new(LogCache::default()),
            }),
            category,
            model: None,
            tab: LogTab::All,
            filters: LogKind::ALL.into_iter().collect(),
            visible: false,
            limit: config.log_limit,
            period: config.log_poll_interval,
            poll: IntervalTask::new(),
        }
    }

    fn query(&self) -> LogQuery {
        LogQuery {
            model_type: self.model.map(|m| m.as_str().to_string()),
            limit: self.limit,
            page: Some(self.category.page().to_string()),
            category: match &self.tab {
                LogTab::All => None,
                LogTab::Model(m) => Some(m.as_str().to_string()),
            },
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle_visible(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn set_client(&mut self, client: ApiClient) {
        self.client = client;
        self.restart();
    }

    pub fn set_category(&mut self, category: LogCategory) {
        self.category = category;
        self.restart();
    }

    /// Model used for items whose message names none.
    pub fn set_model(&mut self, model: ModelKind) {
        self.model = Some(model);
        self.restart();
    }

    pub fn tab(&self) -> &LogTab {
        &self.tab
    }

    pub fn set_tab(&mut self, tab: LogTab) {
        self.tab = tab;
        self.restart();
    }

    pub fn toggle_filter(&mut self, kind: LogKind) -> bool {
        if !self.filters.remove(&kind) {
            self.filters.insert(kind);
        }
        self.filters.contains(&kind)
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    /// Starts (or restarts) the background poll.
    pub fn start(&mut self) {
        let client = self.client.clone();
        let shared = Arc::clone(&self.shared);
        let query = self.query();
        let category = self.category;
        let model = self.model;
        self.poll.start(self.period, move || {
            let client = client.clone();
            let shared = Arc::clone(&shared);
            let query = query.clone();
            async move {
                if let Err(e) = poll_once(&client, &shared, &query, category, model).await {
                    warn!(error = %e, "log poll failed");
                }
                ControlFlow::Continue(())
            }
        });
    }

    pub fn stop(&mut self) -> bool {
        self.poll.stop()
    }

    fn restart(&mut self) {
        if self.is_polling() {
            self.start();
        }
    }

    /// One immediate fetch outside the poll schedule. A failure is also
    /// recorded as a local error entry.
    pub async fn refresh_now(&self) -> Result<usize, ClientError> {
        let result = poll_once(&self.client, &self.shared, &self.query(), self.category, self.model).await;
        if let Err(e) = &result {
            self.shared.cache().ingest([LogEntry::local(
                LogKind::Error,
                format!("获取日志失败: {}", e),
                self.category,
            )]);
        }
        result
    }

    /// Clears the backend buffer, then the local cache.
    pub async fn clear(&self) -> Result<(), ClientError> {
        self.client.clear_logs().await?;
        self.shared.cache().clear();
        Ok(())
    }

    /// Entries passing the tab and severity filters, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let cache = self.shared.cache();
        cache
            .iter()
            .filter(|e| self.filters.contains(&e.kind))
            .filter(|e| match &self.tab {
                LogTab::All => true,
                LogTab::Model(m) => e.subcategory == m.as_str(),
            })
            .cloned()
            .collect()
    }

    /// Entry count per subcategory, for tab badges.
    pub fn badge(&self, model: ModelKind) -> usize {
        self.shared
            .cache()
            .iter()
            .filter(|e| e.subcategory == model.as_str())
            .count()
    }

    pub fn progress(&self) -> Option<Progress> {
        progress(self.shared.cache().iter())
    }

    pub fn len(&self) -> usize {
        self.shared.cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.cache().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, spawn};
    use axum::extract::Query;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    fn entry(id: &str, message: &str) -> LogEntry {
        LogEntry::normalize(&json!({"id": id, "message": message}), LogCategory::Single, None)
    }

    #[test]
    fn test_kind_inference() {
        assert_eq!(LogKind::infer("计算失败"), LogKind::Error);
        assert_eq!(LogKind::infer("Warning: slow"), LogKind::Warning);
        assert_eq!(LogKind::infer("进度: 3/10"), LogKind::Progress);
        assert_eq!(LogKind::infer("计算完成"), LogKind::Progress);
        assert_eq!(LogKind::infer("保存成功"), LogKind::Success);
        assert_eq!(LogKind::infer("hello"), LogKind::Info);
    }

    #[test]
    fn test_normalize_fills_missing_fields() {
        let e = LogEntry::normalize(
            &json!({"id": 7, "message": "Enhanced Dill 3D 开始计算"}),
            LogCategory::Compare,
            Some(ModelKind::Car),
        );
        assert_eq!(e.id, "7");
        assert_eq!(e.kind, LogKind::Progress);
        assert_eq!(e.subcategory, "enhanced_dill");
        assert_eq!(e.dimension.as_deref(), Some("3D"));
        assert_eq!(e.category, LogCategory::Compare);

        let e = LogEntry::normalize(
            &json!({"message": "plain", "type": "warning", "dimension": "2d"}),
            LogCategory::Single,
            Some(ModelKind::Car),
        );
        assert!(e.id.starts_with("local-"));
        assert_eq!(e.kind, LogKind::Warning);
        assert_eq!(e.subcategory, "car");
        assert_eq!(e.dimension.as_deref(), Some("2D"));
        assert!(!e.timestamp.is_empty());
    }

    #[test]
    fn test_cache_dedups_and_caps() {
        let mut cache = LogCache::with_cap(3);
        assert_eq!(cache.ingest([entry("a", "1"), entry("b", "2")]), 2);
        assert_eq!(cache.ingest([entry("b", "2"), entry("c", "3")]), 1);
        let ids: Vec<_> = cache.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        cache.ingest([entry("d", "4")]);
        let ids: Vec<_> = cache.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "b"]);
        assert_eq!(cache.ingest([entry("a", "again")]), 1);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_progress_takes_newest() {
        let mut cache = LogCache::default();
        cache.ingest([entry("1", "进度: 2/10"), entry("2", "Progress: 5 / 10"), entry("3", "other")]);
        let p = progress(cache.iter()).unwrap();
        assert_eq!(p, Progress { done: 5, total: 10 });
        assert_eq!(p.percent(), 50.0);
        assert!(progress([&entry("4", "none")]).is_none());
    }

    #[test]
    fn test_query_serializes_like_the_page() {
        let q = LogQuery {
            page: Some("compare".into()),
            category: Some("car".into()),
            ..LogQuery::default()
        };
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v, json!({"limit": 100, "page": "compare", "category": "car"}));
    }

    fn log_backend(hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/api/logs",
                get(move |Query(params): Query<HashMap<String, String>>| {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    async move {
                        let category = params.get("category").cloned().unwrap_or_default();
                        Json(json!({"success": true, "data": {"logs": [
                            {"id": format!("{}-{}", category, n), "message": "dill 1d ok", "type": "info"},
                            {"id": "fixed", "message": "car 计算完成"}
                        ]}}))
                    }
                }),
            )
            .route("/api/logs/clear", post(|| async { Json(json!({"success": true})) }))
    }

    #[tokio::test]
    async fn test_refresh_filter_and_clear() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn(log_backend(hits.clone())).await;
        let mut panel = LogPanel::new(client(&base), LogCategory::Single, &Config::default());

        assert_eq!(panel.refresh_now().await.unwrap(), 2);
        assert_eq!(panel.refresh_now().await.unwrap(), 1);
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.badge(ModelKind::Car), 1);

        panel.toggle_filter(LogKind::Info);
        assert_eq!(panel.entries().len(), 1);
        panel.toggle_filter(LogKind::Info);
        panel.set_tab(LogTab::Model(ModelKind::Dill));
        assert!(panel.entries().iter().all(|e| e.subcategory == "dill"));

        assert!(panel.toggle_visible());
        assert!(!panel.is_polling());
        panel.clear().await.unwrap();
        assert!(panel.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_is_logged_locally() {
        let panel = LogPanel::new(client("http://127.0.0.1:9"), LogCategory::Compare, &Config::default());
        assert!(panel.refresh_now().await.is_err());
        let entries = panel.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LogKind::Error);
    }

    #[tokio::test]
    async fn test_start_stop_twice_leaves_no_timer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn(log_backend(hits.clone())).await;
        let config = Config::default().with_log_poll_interval(Duration::from_millis(20));
        let mut panel = LogPanel::new(client(&base), LogCategory::Single, &config);

        panel.start();
        assert!(panel.stop());
        panel.start();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(panel.stop());
        assert!(!panel.stop());
        assert!(!panel.is_polling());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = hits.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), settled);
        assert!(settled >= 1);
    }
}
