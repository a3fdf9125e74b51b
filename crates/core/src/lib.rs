// Core types and functionality for routegate: the response cache and the
// upstream quoting/routing/balance client

pub mod cache;
pub mod error;
pub mod types;
pub mod upstream;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CacheKey, CachePolicy, TtlCache};
pub use error::{UpstreamError, UpstreamResult};
pub use types::*;
pub use upstream::{Endpoint, HttpUpstream, UpstreamApi, UpstreamConfig, DEFAULT_BASE_URL};
