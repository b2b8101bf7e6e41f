// Common library for the backup scheduler: recurrence rules, job models,
// configuration and telemetry shared by the binaries

pub mod config;
pub mod errors;
pub mod models;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
