//! Async image loader.
//!
//! Loads remote images through an in-memory LRU tier and an on-disk JPEG
//! tier, fetching over HTTP on a bounded worker pool. Concurrent requests
//! for the same key share one fetch, and results reach callers through a
//! single serialised delivery task.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing cache, network and configuration adapters.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "async-image-loader";
