//! Logging and metrics for Enforcer.
//!
//! - [`logging`] - `tracing-subscriber` installation and standard field names
//! - [`metrics`] - Metric names and recording helpers on the `metrics` facade
//!
//! The mediation crates only emit events and record metrics. Installing a
//! subscriber or recorder is left to the host.

#![doc(html_root_url = "https://docs.rs/enforcer-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use self::metrics::{describe_metrics, init_metrics, render_metrics, Outcome};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
