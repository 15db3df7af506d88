pub mod adapters;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod sync;
