//! Epub cursor library
//!
//! A Rust library for reading EPUB eBook files and walking their table of contents.
//!
//! This library loads EPUB 2 and EPUB 3 publications, exposes their metadata,
//! manifest and reading order, opens content files by path or manifest id,
//! and provides cursors over the table of contents and the spine.
//!
//! ## Features
//!
//! - Resolve the container descriptor and parse the package document.
//! - Query metadata fields with every occurrence and its attributes.
//! - Parse NCX and XHTML navigation documents into a table-of-contents tree,
//!   and walk it with a resumable cursor whose failed moves never change its position.
//! - Stream content files, with transparent font deobfuscation.
//!
//! ## Quick Start
//!
//! ### Read EPUB Files
//!
//! ```rust, ignore
//! # use epub_cursor::epub::EpubDoc;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Open EPUB file
//! let mut doc = EpubDoc::new("path/to/epub/file.epub")?;
//!
//! // Get metadata
//! println!("Title: {:?}", doc.metadata("title")?);
//! println!("Creator: {:?}", doc.metadata("creator")?);
//!
//! // Walk the table of contents
//! let mut cursor = doc.navigation()?;
//! if cursor.has_children() {
//!     cursor.descend()?;
//! }
//! let target = cursor.url().to_string();
//!
//! // Read content
//! let _chapter = doc.read_by_path(&target)?;
//!
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `indexmap` (default): metadata fields iterate in the order they first
//!   appear in the package document. Without it, field order is unspecified.

pub(crate) mod utils;

pub mod epub;
pub mod error;
pub mod navigation;
pub mod package;
pub mod spine;
pub mod types;

pub use epub::{EpubDoc, EpubFile};
pub use error::{EpubError, NavigationError};
pub use navigation::NavigationCursor;
pub use spine::{SpineCursor, SpineEntry};
pub use utils::DecodeBytes;
