//! Client library for a photoresist lithography simulation API.
//!
//! Collects Dill, Enhanced Dill and CAR parameters, sends them to the remote
//! calculation service and turns the results into Plotly-shaped figures.

pub mod analysis;
pub mod animation;
pub mod app;
pub mod chart;
pub mod client;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod i18n;
pub mod logs;
pub mod matrix;
pub mod model;
pub mod params;
pub mod phase;
pub mod request;
pub mod result;
pub mod task;

#[cfg(test)]
mod testing;

pub use app::App;
pub use config::Config;
pub use i18n::Lang;
pub use model::{ModelKind, SineType};
