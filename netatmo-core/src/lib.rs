//! Core library for the `netatmo` collector.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - OAuth2 token lifecycle and station data retrieval for the Netatmo API
//! - Normalized weather readings and their OpenTelemetry export
//! - The single collection cycle tying those together
//!
//! It is used by `netatmo-cli`, but can also be driven from other binaries.

pub mod api;
pub mod collector;
pub mod config;
pub mod credentials;
pub mod error;
pub mod model;
pub mod report;
pub mod store;
pub mod telemetry;

pub use api::{AccessToken, AuthClient, AuthCodeSource, AuthState, StationClient, StationData};
pub use collector::{Collector, CycleReport};
pub use config::{Config, TelemetryConfig};
pub use credentials::Credentials;
pub use error::ApiError;
pub use model::{MetricKind, ModuleType, WeatherReading};
pub use store::{EnvFile, StateStore};
pub use telemetry::{TelemetryManager, TelemetryStatus};
