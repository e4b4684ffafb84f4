use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}")]
    Status { status: u16, body: String },
    /// Semantic failure reported by the backend; the message is shown verbatim.
    #[error("{0}")]
    Api(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error(transparent)]
    Result(#[from] ResultError),
    #[error("no calculation strategy configured")]
    NoStrategy,
}

#[derive(Debug, Error, PartialEq)]
pub enum ResultError {
    #[error("missing field: {0}")]
    Missing(&'static str),
    #[error("inconsistent result shape: {0}")]
    Shape(String),
    #[error("invalid plot image: {0}")]
    Image(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum PhaseError {
    #[error("phase expression is empty")]
    Empty,
    #[error("phase expression contains disallowed characters")]
    Disallowed,
    #[error("syntax error at {pos}: {reason}")]
    Syntax { pos: usize, reason: String },
    #[error("unknown identifier: {0}")]
    Unknown(String),
    #[error("phase expression does not evaluate to a finite number")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("axis has {axis} samples but data has {data}")]
    LengthMismatch { axis: usize, data: usize },
    #[error("nothing to export")]
    Empty,
    #[error("{0} figures cannot be exported as CSV")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum CollectionError {
    #[error("at least one parameter set must remain")]
    LastSet,
    #[error("no parameter set with id {0}")]
    UnknownSet(u32),
    #[error("index {0} is out of range")]
    OutOfRange(usize),
    #[error("field {0} is not declared for this model")]
    UnknownField(String),
}

/// Failures surfaced on the banner by the root controller.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    Client(#[from] ClientError),
}
