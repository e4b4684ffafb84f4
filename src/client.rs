//! HTTP client for the calculation backend.
//!
//! Every endpoint answers with the same envelope. A calculation is run
//! through an ordered chain of [`Strategy`] tiers: the interactive data
//! endpoint first, then the static image endpoint. The first tier that
//! succeeds wins; if all fail the last error is reported.

use std::future::Future;
use std::pin::Pin;

use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::i18n::Lang;
use crate::logs::LogQuery;
use crate::request::Body;
use crate::result::{self, Comparison, PlotImages, ResultPayload};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_zh: Option<String>,
    #[serde(default)]
    pub message_en: Option<String>,
}

impl Envelope {
    /// Picks the localized message when both translations exist.
    pub fn message(&self, lang: Lang) -> Option<&str> {
        let localized = match (&self.message_zh, &self.message_en) {
            (Some(zh), Some(en)) => Some(match lang {
                Lang::Zh => zh.as_str(),
                Lang::En => en.as_str(),
            }),
            _ => None,
        };
        localized
            .or(self.message.as_deref())
            .or(self.message_zh.as_deref())
            .or(self.message_en.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompareOutcome {
    Data(Comparison),
    Images(PlotImages),
}

impl ClientError {
    /// Text for the error banner.
    pub fn banner(&self, lang: Lang) -> String {
        match self {
            ClientError::Http(e) => format!("{}: {}", lang.text("error_network"), e),
            ClientError::Status { status, .. } => {
                lang.format("error_status", &[("status", status.to_string())])
            }
            ClientError::Api(message) => message.clone(),
            ClientError::Decode(_) => lang.text("error_decode").to_string(),
            ClientError::Result(e) => format!("{}: {}", lang.text("error_result"), e),
            ClientError::NoStrategy => lang.text("error_calculation").to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    lang: Lang,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("litho/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            lang: Lang::default(),
        })
    }

    pub fn with_lang(mut self, lang: Lang) -> Self {
        self.lang = lang;
        self
    }

    pub fn set_lang(&mut self, lang: Lang) {
        self.lang = lang;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read(&self, resp: Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let text = resp.text().await?;
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(ClientError::Decode(e.to_string())),
        };
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let envelope = Envelope::deserialize(&value)
                .map_err(|e| ClientError::Decode(e.to_string()))?;
            let message = envelope
                .message(self.lang)
                .unwrap_or_else(|| self.lang.text("error_calculation"));
            return Err(ClientError::Api(message.to_string()));
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(value)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ClientError> {
        debug!("POST {}", path);
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        self.read(resp).await
    }

    fn data(mut value: Value) -> Result<Value, ClientError> {
        value
            .as_object_mut()
            .and_then(|obj| obj.remove("data"))
            .filter(|data| !data.is_null())
            .ok_or_else(|| ClientError::Decode("response has no data".to_string()))
    }

    pub async fn calculate_data(&self, body: &Body) -> Result<ResultPayload, ClientError> {
        let data = Self::data(self.post("/api/calculate_data", body).await?)?;
        Ok(result::normalize(&data)?)
    }

    pub async fn calculate_image(&self, body: &Body) -> Result<ResultPayload, ClientError> {
        let data = Self::data(self.post("/api/calculate", body).await?)?;
        Ok(ResultPayload::Images(result::normalize_images(&data)?))
    }

    pub async fn compare_data(&self, body: &Value) -> Result<CompareOutcome, ClientError> {
        let data = Self::data(self.post("/api/compare_data", body).await?)?;
        Ok(CompareOutcome::Data(result::normalize_comparison(&data)?))
    }

    pub async fn compare_image(&self, body: &Value) -> Result<CompareOutcome, ClientError> {
        let data = Self::data(self.post("/api/compare", body).await?)?;
        Ok(CompareOutcome::Images(result::normalize_images(&data)?))
    }

    /// Raw log items, found under `data.logs` or a top-level `logs`.
    pub async fn fetch_logs(&self, query: &LogQuery) -> Result<Vec<Value>, ClientError> {
        let resp = self
            .http
            .get(self.url("/api/logs"))
            .query(query)
            .send()
            .await?;
        let mut value = self.read(resp).await?;
        let logs = value
            .pointer_mut("/data/logs")
            .map(Value::take)
            .filter(Value::is_array)
            .or_else(|| value.get_mut("logs").map(Value::take))
            .unwrap_or(Value::Array(Vec::new()));
        match logs {
            Value::Array(items) => Ok(items),
            _ => Err(ClientError::Decode("logs is not an array".to_string())),
        }
    }

    pub async fn clear_logs(&self) -> Result<(), ClientError> {
        self.post("/api/logs/clear", &serde_json::json!({})).await?;
        info!("backend logs cleared");
        Ok(())
    }
}

/// One tier of a calculation chain.
pub trait Strategy<Req: ?Sized, Out>: Send + Sync {
    fn name(&self) -> &'static str;
    fn run<'a>(&'a self, client: &'a ApiClient, req: &'a Req) -> BoxFuture<'a, Result<Out, ClientError>>;
}

/// Interactive data endpoints (`calculate_data`, `compare_data`).
pub struct DataEndpoint;

/// Static image endpoints (`calculate`, `compare`).
pub struct ImageEndpoint;

impl Strategy<Body, ResultPayload> for DataEndpoint {
    fn name(&self) -> &'static str {
        "calculate_data"
    }

    fn run<'a>(&'a self, client: &'a ApiClient, req: &'a Body) -> BoxFuture<'a, Result<ResultPayload, ClientError>> {
        Box::pin(client.calculate_data(req))
    }
}

impl Strategy<Body, ResultPayload> for ImageEndpoint {
    fn name(&self) -> &'static str {
        "calculate"
    }

    fn run<'a>(&'a self, client: &'a ApiClient, req: &'a Body) -> BoxFuture<'a, Result<ResultPayload, ClientError>> {
        Box::pin(client.calculate_image(req))
    }
}

impl Strategy<Value, CompareOutcome> for DataEndpoint {
    fn name(&self) -> &'static str {
        "compare_data"
    }

    fn run<'a>(&'a self, client: &'a ApiClient, req: &'a Value) -> BoxFuture<'a, Result<CompareOutcome, ClientError>> {
        Box::pin(client.compare_data(req))
    }
}

impl Strategy<Value, CompareOutcome> for ImageEndpoint {
    fn name(&self) -> &'static str {
        "compare"
    }

    fn run<'a>(&'a self, client: &'a ApiClient, req: &'a Value) -> BoxFuture<'a, Result<CompareOutcome, ClientError>> {
        Box::pin(client.compare_image(req))
    }
}

pub type Chain<Req, Out> = Vec<Box<dyn Strategy<Req, Out>>>;

pub fn calculation_chain() -> Chain<Body, ResultPayload> {
    vec![Box::new(DataEndpoint), Box::new(ImageEndpoint)]
}

pub fn comparison_chain() -> Chain<Value, CompareOutcome> {
    vec![Box::new(DataEndpoint), Box::new(ImageEndpoint)]
}

/// Tries each tier once, in order. No retries.
pub async fn run_chain<Req: ?Sized + Sync, Out>(
    client: &ApiClient,
    chain: &[Box<dyn Strategy<Req, Out>>],
    req: &Req,
) -> Result<Out, ClientError> {
    let mut last = ClientError::NoStrategy;
    for strategy in chain {
        match strategy.run(client, req).await {
            Ok(out) => {
                debug!(strategy = strategy.name(), "strategy succeeded");
                return Ok(out);
            }
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "strategy failed");
                last = e;
            }
        }
    }
    Err(last)
}
