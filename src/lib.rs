//! Audex - batch audio extraction from video files
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod config;
pub mod organizer;
pub mod quality;
pub mod store;
