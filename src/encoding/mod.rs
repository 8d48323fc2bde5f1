//! # Encoding Module
//!
//! This module provides encoding utilities for okon:
//!
//! - **SHA-1 digests**: the fixed 20-byte key type and the hexadecimal
//!   text codec used by the preparer and the query surfaces.

pub mod sha1;

pub use sha1::{sha1_to_text, text_to_sha1, Sha1, SHA1_BINARY_LENGTH, SHA1_TEXT_LENGTH};
