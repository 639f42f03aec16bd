//! Reading order
//!
//! [SpineCursor] walks the spine of a publication entry by entry and opens
//! the content document of the current entry on demand.

use std::io::{Read, Seek};

use crate::{
    epub::{EpubDoc, EpubFile, read_whole},
    error::EpubError,
    types::ManifestItem,
};

/// One entry of the reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineEntry {
    /// The position of the entry in the spine, starting from 0
    pub index: usize,

    /// The manifest id the entry refers to
    pub idref: String,

    /// Whether the entry is part of the linear reading order
    pub linear: bool,

    pub properties: Option<String>,

    /// The manifest item for `idref`
    ///
    /// `None` when the spine refers to an id the manifest does not declare;
    /// opening such an entry fails with `UnknownManifestId`.
    pub manifest_item: Option<ManifestItem>,
}

/// Cursor over the spine of an [EpubDoc]
///
/// A new cursor is positioned before the first entry; the first call to
/// [SpineCursor::next_entry] moves it onto the first entry. Reaching either
/// end returns `None`, which is not an error.
///
/// The cursor holds the document mutably because opening an entry reads from
/// the archive.
///
/// ```rust, ignore
/// # use epub_cursor::epub::EpubDoc;
/// let mut doc = EpubDoc::new("path/to/book.epub")?;
/// let mut spine = doc.spine();
/// while let Some(entry) = spine.next_entry() {
///     let content = spine.read()?;
///     println!("{}: {} bytes", entry.idref, content.len());
/// }
/// ```
pub struct SpineCursor<'a, R: Read + Seek> {
    doc: &'a mut EpubDoc<R>,

    /// `None` before the first entry, `Some(len)` past the last one
    position: Option<usize>,
}

impl<'a, R: Read + Seek> SpineCursor<'a, R> {
    pub(crate) fn new(doc: &'a mut EpubDoc<R>) -> Self {
        Self {
            doc,
            position: None,
        }
    }

    /// The number of entries in the spine
    pub fn len(&self) -> usize {
        self.doc.spine_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The index of the current entry, `None` when not on an entry
    pub fn position(&self) -> Option<usize> {
        self.position.filter(|index| *index < self.len())
    }

    /// Advances to the next entry
    ///
    /// Returns `None` once the end of the spine is reached; further calls keep
    /// returning `None`.
    pub fn next_entry(&mut self) -> Option<SpineEntry> {
        let len = self.len();
        let next = match self.position {
            None => 0,
            Some(index) => (index + 1).min(len),
        };

        self.position = Some(next);
        self.entry(next)
    }

    /// Steps back to the previous entry
    ///
    /// Returns `None` once the cursor is before the first entry.
    pub fn previous_entry(&mut self) -> Option<SpineEntry> {
        match self.position {
            None | Some(0) => {
                self.position = None;
                None
            }
            Some(index) => {
                let previous = index.min(self.len()) - 1;
                self.position = Some(previous);
                self.entry(previous)
            }
        }
    }

    /// The entry under the cursor
    pub fn current(&self) -> Option<SpineEntry> {
        self.entry(self.position()?)
    }

    /// The manifest id of the entry under the cursor
    pub fn idref(&self) -> Option<&str> {
        let index = self.position()?;
        self.doc
            .spine_items()
            .get(index)
            .map(|item| item.idref.as_str())
    }

    /// Moves the cursor back before the first entry
    pub fn rewind(&mut self) {
        self.position = None;
    }

    /// Opens the content document of the entry under the cursor
    ///
    /// # Return
    /// - `Ok(EpubFile)`: A reader over the content document
    /// - `Err(EpubError)`: `NoSpineEntry` if the cursor is not on an entry,
    ///   `UnknownManifestId` if the entry refers to an undeclared id, or any
    ///   error of [EpubDoc::open_by_path]
    pub fn open(&mut self) -> Result<EpubFile<'_>, EpubError> {
        let idref = self.idref().ok_or(EpubError::NoSpineEntry)?.to_string();
        self.doc.open_by_manifest_id(&idref)
    }

    /// Reads the whole content document of the entry under the cursor
    pub fn read(&mut self) -> Result<Vec<u8>, EpubError> {
        let mut file = self.open()?;
        read_whole(&mut file)
    }

    fn entry(&self, index: usize) -> Option<SpineEntry> {
        let item = self.doc.spine_items().get(index)?;

        Some(SpineEntry {
            index,
            idref: item.idref.clone(),
            linear: item.linear,
            properties: item.properties.clone(),
            manifest_item: self.doc.manifest_item(&item.idref).cloned(),
        })
    }
}
