//! Transport adapters.

mod http;

pub use http::ReqwestTransport;
