//! Logging and trace export for Parley binaries.

pub mod tracing_setup;
