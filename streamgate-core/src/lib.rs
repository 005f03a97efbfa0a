//! Core building blocks of the streamgate media edge proxy
//!
//! Configuration, logging, the shared error taxonomy, access tokens and the
//! read-through TTL cache used for third-party metadata.

pub mod cache;
pub mod config;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod models;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
