pub mod http;
pub mod sse;

pub use http::HttpBackendAdapter;
pub use sse::{Frame, FrameDecoder};
