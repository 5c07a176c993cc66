//! Upstream API implementations.
//!
//! Each module provides a struct implementing [`crate::backend::VideoApi`].

pub mod youtube;

pub use youtube::{YouTubeApi, YouTubeConfig};
