//! Advisory library for the AgriMind service
//!
//! This crate provides the core functionality for:
//! - Loading and serving the crop and disease ONNX models
//! - Request input normalization (tabular features and leaf images)
//! - Inference invocation with confidence gating
//! - Disease class label interpretation
//! - Advice composition (rule-based or generative with fallback)
//! - Best-effort interaction history
//! - Health checks and observability

pub mod advice;
pub mod diagnosis;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod registry;

pub use diagnosis::parse_class_label;
pub use error::ServiceError;
pub use health::{ComponentHealth, ComponentStatus, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::ServiceMetrics;
pub use pipeline::AdvisoryService;
pub use registry::ModelRegistry;
