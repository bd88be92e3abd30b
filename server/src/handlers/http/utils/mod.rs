pub mod deliver_page;
pub mod headers;
pub mod json_response;
pub mod session_cookie;

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;

/// Requests reach the router with their body already collected.
pub type HttpRequest = hyper::Request<Bytes>;

pub type HttpResponse = hyper::Response<BoxBody<Bytes, Infallible>>;

// Re-export commonly used utilities
pub use deliver_page::*;
pub use headers::*;
pub use json_response::*;
pub use session_cookie::*;
