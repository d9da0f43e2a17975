//! HTTP surface modules (router, handlers, problem responses).

/// Batch compression handler.
pub mod compress;
/// Shared constants and header names.
pub mod constants;
/// Word conversion handler.
pub mod convert;
/// Working-directory downloads.
pub mod download;
/// Problem response helpers and error types.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;

mod multipart;
