//! Adaptive TDEE - On-device energy expenditure estimation and goal control
//!
//! The engine estimates a user's true daily energy expenditure from logged
//! body weight and calorie intake, and adapts their calorie goal as the
//! estimate converges. Computation is a deterministic pipeline:
//! formula seed → preprocessing → adaptive Kalman filter → goal controller.
//!
//! ## Modules
//!
//! - **Estimation**: seed formula, data quality scoring, log preprocessing, filter
//! - **Goal control**: gated goal adaptation, macro targets, audit history
//! - **Service**: validation and a pluggable user record store

pub mod config;
pub mod controller;
pub mod error;
pub mod formulas;
pub mod kalman;
pub mod nutrition;
pub mod pipeline;
pub mod preprocess;
pub mod quality;
pub mod store;
pub mod types;
pub mod validation;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngineConfig;
pub use error::{ComputeError, ValidationError};
pub use pipeline::{
    adapt_goal, adapt_goal_with, compute_quality, run_full_update, run_full_update_with,
    seed_estimate, AdaptiveService,
};
pub use store::{InMemoryUserStore, UserStore};
pub use types::{
    AdaptationOutcome, AdaptationRecord, AdaptationReport, DataQualityMetrics, FilterState,
    Gender, GoalType, LogEntry, MacroTargets, UserProfile, UserRecord,
};

/// Engine version reported by the CLI and FFI
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
