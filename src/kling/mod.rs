//! KlingAI REST API integration.
//!
//! Submits image-to-video tasks signed with a short-lived JWT, polls them to
//! completion and downloads the result.

mod client;
mod driver;
mod retry;
mod token;

pub use client::{Image2VideoRequest, KlingClient, KlingError, TaskStatus};
pub use driver::KlingApiDriver;
pub use retry::{is_transient_network_error, parse_retry_after, RetryPolicy};
pub use token::{fresh_token, sign_token, Claims, NOT_BEFORE_SKEW_SECS, TOKEN_TTL_SECS};
