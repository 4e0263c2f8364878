//! Resilient Notion content pipeline: retrying fetch client, typed page and
//! block model, block rendering and page grouping, served over HTTP.
pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod grouping;
pub mod notion;
pub mod render;
pub mod view;

pub use error::{SourceError, TransientError};
