//! Observability for the detector.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the application through [`init_logging`].

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
