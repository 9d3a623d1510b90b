//! Infrastructure - configuration, regions, and metrics
//!
//! - `config` - Application configuration (TOML loading, defaults)
//! - `regions` - Monitor zone and parking slot loading
//! - `metrics` - Lock-free metrics collection

pub mod config;
pub mod metrics;
pub mod regions;

pub use config::{Config, InputMode, SinkMode};
pub use metrics::Metrics;
pub use regions::Regions;
