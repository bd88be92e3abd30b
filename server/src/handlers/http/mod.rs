pub mod api;
pub mod auth;
pub mod connection;
pub mod impersonation;
pub mod pages;
pub mod routes;
pub mod utils;

pub use connection::handle_request;
pub use routes::{Router, build_router};
