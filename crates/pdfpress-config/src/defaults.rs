//! Fallback values applied when an environment variable is absent.

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroUsize;
use std::time::Duration;

pub(crate) const HTTP_PORT: u16 = 8080;
pub(crate) const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub(crate) const MAX_UPLOAD_SIZE_MB: u64 = 50;
pub(crate) const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub(crate) const UPLOAD_DIR: &str = "./uploads";
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub(crate) const GHOSTSCRIPT_BINARY: &str = "gs";
pub(crate) const QPDF_BINARY: &str = "qpdf";
pub(crate) const PYTHON_BINARY: &str = "python3";
pub(crate) const LOG_LEVEL: &str = "info";

/// Worker permits default to the host's parallelism, or one when it cannot be queried.
pub(crate) fn max_concurrent_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
