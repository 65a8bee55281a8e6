//! Core library for app longevity prediction
//!
//! This crate provides:
//! - Model artifact discovery and loading with fallback
//! - App Store and Play Store catalog adapters
//! - Feature reconciliation, scoring and report formatting
//! - Health checks and observability

pub mod artifacts;
pub mod error;
pub mod health;
pub mod manager;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod sources;

pub use error::PredictError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use manager::{ModelBundle, ModelManager, ModelManagerConfig, ModelRegistryEntry};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{PredictionConfig, PredictionService};
pub use sources::{AppSource, SourceConfig, SourceError};
