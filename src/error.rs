//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while loading
//! an EPUB container, querying it, and walking its table of contents.
//!
//! ## Main Error Types
//!
//! - [EpubError] - Enumeration of errors during EPUB loading and access
//! - [NavigationError] - Failed moves of a [NavigationCursor](crate::navigation::NavigationCursor)

use thiserror::Error;

/// Types of errors that can occur during EPUB processing
///
/// Structural failures (container descriptor, package document) abort loading.
/// Lookup failures (unknown field, unknown id, missing file) are local to a call
/// and leave the [EpubDoc](crate::epub::EpubDoc) usable.
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    ///
    /// Errors occur when processing the ZIP structure of EPUB files,
    /// such as file corruption, unreadability, etc.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    /// Archive read error
    ///
    /// This error occurs when the bytes of an entry cannot be read,
    /// for example when the archive is truncated or an entry is corrupted.
    #[error("Archive read error: Failed reading \"{path}\": {source}")]
    ArchiveReadError {
        path: String,
        source: std::io::Error,
    },

    /// Data Decoding Error - Null data
    ///
    /// This error occurs when trying to decode an empty stream.
    #[error("Decode error: The data is empty.")]
    EmptyDataError,

    /// XML parsing failure error
    ///
    /// The document ended while elements were still open, so no complete
    /// root element could be built.
    #[error("Failed parsing XML error: The document ended before all elements were closed.")]
    FailedParsingXml,

    /// Unable to find the file error
    ///
    /// The resolved path does not name an entry of the archive.
    #[error("File not found: There is no \"{path}\" entry in the container.")]
    FileNotFound { path: String },

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// Invalid navigation document error
    ///
    /// The declared navigation document exists but could not be parsed.
    #[error("Invalid navigation document: {reason}")]
    InvalidNavigationDocument { reason: String },

    /// Invalid package document error
    ///
    /// The package document is not well-formed XML, or lacks the
    /// `<manifest>` or `<spine>` sections.
    #[error("Invalid package document: {reason}")]
    InvalidPackageDocument { reason: String },

    /// Malformed container error
    ///
    /// `META-INF/container.xml` is absent, unparsable or lists no root file.
    #[error("Malformed container: {reason}")]
    MalformedContainer { reason: String },

    /// Missing navigation error
    ///
    /// A navigation document is declared in the package, but it could not be
    /// opened. `reference` is the resolved path, or the manifest id when the
    /// declared id has no manifest item.
    #[error("Missing navigation: The navigation document \"{reference}\" could not be opened.")]
    MissingNavigation { reference: String },

    /// Navigation cursor error
    #[error("Navigation error: {source}")]
    Navigation { source: NavigationError },

    /// No navigation available error
    ///
    /// The package does not declare any navigation document, or the
    /// declared table of contents has no entry.
    #[error("No navigation available: The publication has no table of contents.")]
    NoNavigationAvailable,

    /// No spine entry error
    ///
    /// A spine cursor was asked for its current entry while positioned before
    /// the first entry or past the last one.
    #[error("No spine entry: The spine cursor is not positioned on an entry.")]
    NoSpineEntry,

    /// QuickXml error
    ///
    /// This error occurs when parsing XML data using the QuickXml library.
    #[error("QuickXml error: {source}")]
    QuickXmlError { source: quick_xml::Error },

    /// Relative link leak error
    ///
    /// This error occurs when a relative path link is outside the scope
    /// of an EPUB container, which is a security protection mechanism.
    #[error("Relative link leakage: Path \"{path}\" is out of container range.")]
    RelativeLinkLeakage { path: String },

    /// Unknown manifest id error
    ///
    /// This error occurs when trying to open a resource by id but that id
    /// doesn't exist in the manifest.
    #[error("Unknown manifest id: There is no manifest item with id \"{id}\".")]
    UnknownManifestId { id: String },

    /// Unknown metadata field error
    #[error("Unknown metadata field: Metadata field \"{field}\" does not exist.")]
    UnknownMetadataField { field: String },

    /// Unsupported encryption method error
    ///
    /// This error is triggered when attempting to open a resource that uses
    /// an encryption method not supported by this library.
    ///
    /// Currently, this library only supports:
    /// - IDPF Font Obfuscation
    /// - Adobe Font Obfuscation
    #[error("Unsupported encryption method: The \"{method}\" encryption method is not supported.")]
    UnsupportedEncryptedMethod { method: String },

    /// Unusable compression method error
    ///
    /// This error occurs when an EPUB file uses an unsupported compression method.
    #[error(
        "Unusable compression method: The \"{file}\" file uses the unsupported \"{method}\" compression method."
    )]
    UnusableCompressionMethod { file: String, method: String },

    /// UTF-8 decoding error
    #[error("Decode error: {source}")]
    Utf8DecodeError { source: std::string::FromUtf8Error },

    /// UTF-16 decoding error
    #[error("Decode error: {source}")]
    Utf16DecodeError { source: std::string::FromUtf16Error },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<quick_xml::Error> for EpubError {
    fn from(value: quick_xml::Error) -> Self {
        EpubError::QuickXmlError { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<std::string::FromUtf8Error> for EpubError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        EpubError::Utf8DecodeError { source: value }
    }
}

impl From<std::string::FromUtf16Error> for EpubError {
    fn from(value: std::string::FromUtf16Error) -> Self {
        EpubError::Utf16DecodeError { source: value }
    }
}

impl From<NavigationError> for EpubError {
    fn from(value: NavigationError) -> Self {
        EpubError::Navigation { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::FileNotFound { path: l_path }, Self::FileNotFound { path: r_path }) => {
                l_path == r_path
            }
            (
                Self::MissingNavigation {
                    reference: l_reference,
                },
                Self::MissingNavigation {
                    reference: r_reference,
                },
            ) => l_reference == r_reference,
            (Self::Navigation { source: l_source }, Self::Navigation { source: r_source }) => {
                l_source == r_source
            }
            (
                Self::RelativeLinkLeakage { path: l_path },
                Self::RelativeLinkLeakage { path: r_path },
            ) => l_path == r_path,
            (Self::UnknownManifestId { id: l_id }, Self::UnknownManifestId { id: r_id }) => {
                l_id == r_id
            }
            (
                Self::UnknownMetadataField { field: l_field },
                Self::UnknownMetadataField { field: r_field },
            ) => l_field == r_field,
            (
                Self::UnsupportedEncryptedMethod { method: l_method },
                Self::UnsupportedEncryptedMethod { method: r_method },
            ) => l_method == r_method,
            (
                Self::UnusableCompressionMethod {
                    file: l_file,
                    method: l_method,
                },
                Self::UnusableCompressionMethod {
                    file: r_file,
                    method: r_method,
                },
            ) => l_file == r_file && l_method == r_method,
            (
                Self::Utf8DecodeError { source: l_source },
                Self::Utf8DecodeError { source: r_source },
            ) => l_source == r_source,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// Failed moves of a navigation cursor
///
/// A cursor that returns one of these errors is left exactly where it was
/// before the call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NavigationError {
    /// The cursor is on the last entry of its level
    #[error("It is the last entry.")]
    NoNextSibling,

    /// The cursor is on the first entry of its level
    #[error("It is the first entry.")]
    NoPreviousSibling,

    /// The current entry has no sub-entries to descend into
    #[error("It has no children.")]
    NoChildren,

    /// The cursor is already at the top level
    #[error("It has no parent.")]
    NoParent,
}
