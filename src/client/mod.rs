//! Client Module
//!
//! Gateway dispatch client, rate limiting and retry.

pub mod http;
pub mod rate_limiter;
pub mod retry;
pub mod session;

pub use http::{WahaClient, CONNECTION_TEST_TIMEOUT, SEND_TIMEOUT};
pub use rate_limiter::{RateLimiter, RATE_WINDOW};
pub use retry::RetryPolicy;
pub use session::{SessionState, SessionStatus};
