mod backend;
mod dataset;
mod http;

pub use backend::*;
pub use dataset::*;
pub use http::{HttpBackend, RetryPolicy};
