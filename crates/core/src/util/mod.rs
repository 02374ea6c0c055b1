pub mod poll;
pub mod retry;

pub use poll::{wait_until_done, PollError};
pub use retry::{is_http_retryable, retry_with_backoff, RetryConfig};
