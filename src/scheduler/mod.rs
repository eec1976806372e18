pub(crate) mod cycle;
pub mod retry;
pub mod timing;

pub use retry::{RetryPolicy, DEFAULT_BACKOFF};
pub use timing::{delay_until_next, next_fire};
