//! doclens: a terminal client for a document research service.
//!
//! Keeps a durable local cache of uploaded document bytes consistent with the
//! backend's document registry, mediates selection between views, and owns
//! the lifecycle of preview URIs.

pub mod config;
pub mod error;
pub mod file;
pub mod preview;
pub mod registry;
pub mod render;
pub mod session;
pub mod store;
pub mod workspace;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
