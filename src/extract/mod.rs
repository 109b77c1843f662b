//! Document text extraction.
//!
//! For each PDF attachment the extractor walks a fallback chain: resolve the
//! path, check reachability, reject cloud placeholders, read the host's
//! full-text index (indexing once if needed), and finally read the file
//! directly. Metadata is collected regardless of how the chain ends.

pub mod cloud;
pub mod extractor;
pub mod text;
pub mod types;

pub use cloud::is_cloud_placeholder;
pub use extractor::{NO_ATTACHMENTS_WARNING, TextExtractor, classify_store_error};
pub use text::{MAX_FULL_TEXT_CHARS, clean_text, estimate_tokens, format_for_analysis};
pub use types::*;
