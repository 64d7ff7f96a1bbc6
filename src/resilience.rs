//! Building blocks of the request-resilience layer: response cache, rate gate, retry policy.

pub mod cache;
pub mod rate_limit;
pub mod retry;

pub use cache::*;
pub use rate_limit::*;
pub use retry::*;
