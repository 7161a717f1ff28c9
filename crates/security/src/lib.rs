//! Security module for Sitewright — filesystem sandboxing.
//!
//! Provides:
//! - **Path validation**: keeps file tools inside the workspace and away
//!   from forbidden prefixes

pub mod path;

pub use path::{PathPolicy, PathValidationError, validate_path};
