use std::time::Duration;

/// Time given to VUs removed by a ramp-down to finish their current iteration.
pub const DEFAULT_GRACEFUL_RAMP_DOWN: Duration = Duration::from_secs(30);

/// Time given to all VUs to finish their current iteration once the last stage ends.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-request timeout for the built-in HTTP client.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// Built-in metric names
pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const CHECKS: &str = "checks";
pub const VUS: &str = "vus";
pub const VUS_MAX: &str = "vus_max";
