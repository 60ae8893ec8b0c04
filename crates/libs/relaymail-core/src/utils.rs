//! Utility functions and helpers.
//!
//! This module provides common utility functions used throughout relaymail-core.
//!
//! # Functions
//!
//! - `slugify` - Convert text to URL-safe slugs

use slug;

pub mod image_processing;
pub mod mistake_detection;
pub mod pathspec;
pub mod project_identity;
pub mod validation;

/// Converts text to a URL-safe slug.
///
/// This function transforms arbitrary text into a lowercase, hyphenated
/// string suitable for use in URLs and identifiers. Non-ASCII characters
/// are transliterated or removed, and spaces are replaced with hyphens.
///
/// # Arguments
///
/// * `text` - The input text to convert
///
/// # Returns
///
/// A URL-safe slug string.
///
/// # Examples
///
/// ```
/// use relaymail_core::utils::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("My Project Name"), "my-project-name");
/// assert_eq!(slugify("CafÃ© & Restaurant"), "cafe-restaurant");
/// ```
pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}
