//! HTTP front end for the streamgate edge proxy

pub mod http;

pub use http::{create_router, AppState};
