pub mod http;
pub mod memory;
pub mod types;

pub use http::HttpPlatform;
pub use memory::MemoryPlatform;
pub use types::{JobCreateParams, JobCreateResponse, Platform, PlatformError};
