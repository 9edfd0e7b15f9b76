mod limiter;
mod pool;
mod rate;
mod source;

pub use limiter::RateLimiter;
pub use pool::RateLimiterPool;
pub use rate::{Rate, RateError};
pub use source::RateLimiterSource;
