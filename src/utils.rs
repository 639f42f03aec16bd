use std::{
    cmp::min,
    collections::HashMap,
    io::{self, Read, Seek},
};

use percent_encoding::percent_decode_str;
use quick_xml::{NsReader, escape::unescape, events::Event};
use sha1::{Digest, Sha1};
use zip::{CompressionMethod, ZipArchive, read::ZipFile, result::ZipError};

use crate::error::EpubError;

/// Extracts the contents of a specified file from a ZIP archive
///
/// This function reads the raw byte data of a specified file from an EPUB file (which
/// is essentially a ZIP archive). It is used for the structural documents
/// (container, package, navigation, encryption) that are parsed eagerly at load.
///
/// ## Parameters
/// - `zip_file`: A mutable reference to a ZIP archive object
/// - `file_name`: The path to the file to extract (relative to the ZIP archive root directory)
///
/// ## Return
/// - `Ok(Vec<u8>)`: Returns a byte vector containing the file data
/// - `Err(EpubError)`: `FileNotFound` if the entry does not exist, or the error
///   that occurred during the read operation
pub fn get_file_in_zip_archive<R: Read + Seek>(
    zip_file: &mut ZipArchive<R>,
    file_name: &str,
) -> Result<Vec<u8>, EpubError> {
    let index = find_entry_index(zip_file, file_name).ok_or_else(|| EpubError::FileNotFound {
        path: file_name.to_string(),
    })?;

    let mut buffer = Vec::<u8>::new();
    let mut file = open_zip_entry(zip_file, index, file_name)?;
    file.read_to_end(&mut buffer)
        .map_err(|source| EpubError::ArchiveReadError {
            path: file_name.to_string(),
            source,
        })?;

    Ok(buffer)
}

/// Opens the archive entry at `index` for decompressed reading
///
/// The local header of an entry is only read here, so a damaged entry makes
/// this one read fail with `ArchiveReadError` and leaves the rest of the
/// archive usable.
///
/// ## Return
/// - `Ok(ZipFile)`: A reader over the decompressed entry
/// - `Err(EpubError)`: `UnusableCompressionMethod` if the entry is neither
///   stored nor deflated, `ArchiveReadError` if its header cannot be read
pub fn open_zip_entry<'a, R: Read + Seek>(
    zip_file: &'a mut ZipArchive<R>,
    index: usize,
    file_name: &str,
) -> Result<ZipFile<'a, R>, EpubError> {
    let read_error = |source: ZipError| EpubError::ArchiveReadError {
        path: file_name.to_string(),
        source: io::Error::other(source),
    };

    compression_method_check(&zip_file.by_index_raw(index).map_err(read_error)?)?;
    zip_file.by_index(index).map_err(read_error)
}

/// Looks up the index of an archive entry by name
///
/// Some publications write hrefs percent-encoded (`My%20Chapter.xhtml`) while
/// the archive stores the decoded name, so the decoded name is tried when
/// the exact name is absent.
pub fn find_entry_index<R: Read + Seek>(
    zip_file: &ZipArchive<R>,
    file_name: &str,
) -> Option<usize> {
    if let Some(index) = zip_file.index_for_name(file_name) {
        return Some(index);
    }

    let decoded = percent_decode_str(file_name).decode_utf8().ok()?;
    if decoded == file_name {
        return None;
    }

    zip_file.index_for_name(&decoded)
}

/// Checks if the compression method of an entry conforms to the
/// specification requirements.
///
/// According to the OCF (Open Container Format) specification, EPUB files
/// can only use either Stored (uncompressed) or Deflated (deflate compression).
/// If any other compression method is found, an error will be returned.
pub fn compression_method_check<R: Read + ?Sized>(
    file: &ZipFile<'_, R>,
) -> Result<(), EpubError> {
    match file.compression() {
        CompressionMethod::Stored | CompressionMethod::Deflated => Ok(()),
        method => Err(EpubError::UnusableCompressionMethod {
            file: file.name().to_string(),
            method: method.to_string(),
        }),
    }
}

/// Resolves a reference against a base directory inside the container
///
/// The base is a root prefix such as `OEBPS/` (or the empty string for the
/// container root). The reference may contain `./` and `../` segments and a
/// `#fragment`, which is dropped. A reference starting with `/` is taken
/// relative to the container root.
///
/// ## Return
/// - `Ok(String)`: The normalized entry name
/// - `Err(EpubError)`: `RelativeLinkLeakage` if the reference climbs above
///   the container root
pub fn resolve_container_path(base: &str, reference: &str) -> Result<String, EpubError> {
    let reference = match reference.split_once('#') {
        Some((path, _)) => path,
        None => reference,
    };

    let joined = match reference.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", base, reference),
    };

    let mut segments = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(EpubError::RelativeLinkLeakage {
                        path: reference.to_string(),
                    });
                }
            }
            _ => segments.push(segment),
        }
    }

    Ok(segments.join("/"))
}

/// Returns the directory part of a container path, including the trailing `/`
///
/// A top-level file has an empty root prefix.
pub fn root_prefix(path: &str) -> String {
    match path.rfind('/') {
        Some(index) => path[..=index].to_string(),
        None => String::new(),
    }
}

/// Builds the XOR mask of the IDPF font obfuscation algorithm
///
/// The key is the SHA-1 digest of the publication's unique identifier with
/// the XML whitespace characters (space, tab, line feed, carriage return)
/// removed, repeated over the first 1040 bytes of the font.
pub fn idpf_obfuscation_mask(unique_identifier: &str) -> Vec<u8> {
    let identifier = unique_identifier
        .chars()
        .filter(|c| !is_xml_whitespace(*c))
        .collect::<String>();

    let mut hasher = Sha1::new();
    hasher.update(identifier.as_bytes());
    let hash = hasher.finalize();

    (0..1040).map(|index| hash[index % hash.len()]).collect()
}

/// Builds the XOR mask of the Adobe font obfuscation algorithm
///
/// The key is the 16 bytes of the UUID found in the unique identifier
/// (`urn:uuid:` prefix and dashes stripped), repeated over the first 1024
/// bytes of the font. If the identifier is not a UUID, its raw bytes are
/// repeated instead.
pub fn adobe_obfuscation_mask(unique_identifier: &str) -> Vec<u8> {
    let hex = unique_identifier
        .trim()
        .trim_start_matches("urn:uuid:")
        .chars()
        .filter(|c| *c != '-')
        .collect::<String>();

    let key = if hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        (0..16)
            .filter_map(|index| u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).ok())
            .collect::<Vec<u8>>()
    } else {
        let mut key = unique_identifier.as_bytes().to_vec();
        while !key.is_empty() && key.len() < 16 {
            key.extend_from_slice(unique_identifier.as_bytes());
        }
        key.truncate(16);
        key
    };

    if key.is_empty() {
        return Vec::new();
    }

    (0..1024).map(|index| key[index % key.len()]).collect()
}

/// XORs `data`, which starts at byte `offset` of the resource, with `mask`
///
/// Bytes beyond the mask length are left unchanged, so the same function both
/// obfuscates and deobfuscates.
pub fn apply_obfuscation_mask(data: &mut [u8], offset: usize, mask: &[u8]) {
    if offset >= mask.len() {
        return;
    }

    let end = min(mask.len() - offset, data.len());
    for (byte, key) in data[..end].iter_mut().zip(&mask[offset..offset + end]) {
        *byte ^= key;
    }
}

/// Provides functionality to decode byte data into strings
///
/// This trait is primarily used to decode raw byte data (such as
/// text files read from EPUB files) into a suitable string representation.
/// It supports automatic detection of multiple encoding formats,
/// including UTF-8 (with or without BOM), UTF-16 BE, and UTF-16 LE.
///
/// ## Notes
/// - When attempting to parse a byte stream lacking a BOM (Byte Order Mark), the parsing
///   results may be unreadable; caution should be exercised when using such streams.
pub trait DecodeBytes {
    fn decode(&self) -> Result<String, EpubError>;
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> Result<String, EpubError> {
        if self.is_empty() || self.len() < 4 {
            return Err(EpubError::EmptyDataError);
        }

        match self[0..3] {
            // Check UTF-8 BOM (0xEF, 0xBB, 0xBF)
            [0xEF, 0xBB, 0xBF, ..] => {
                String::from_utf8(self[3..].to_vec()).map_err(EpubError::from)
            }

            // Check UTF-16 BE BOM (0xFE, 0xFF)
            [0xFE, 0xFF, ..] => {
                let utf16_units: Vec<u16> = self[2..]
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16(&utf16_units).map_err(EpubError::from)
            }

            // Check UTF-16 LE BOM (0xFF, 0xFE)
            [0xFF, 0xFE, ..] => {
                let utf16_units: Vec<u16> = self[2..]
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16(&utf16_units).map_err(EpubError::from)
            }

            // Try without BOM
            _ => {
                if let Ok(utf8_str) = String::from_utf8(self.to_vec()) {
                    return Ok(utf8_str);
                }

                if self.len() % 2 == 0 {
                    let utf16_units: Vec<u16> = self
                        .chunks_exact(2)
                        .map(|b| u16::from_be_bytes([b[0], b[1]]))
                        .collect();

                    if let Ok(utf16_str) = String::from_utf16(&utf16_units) {
                        return Ok(utf16_str);
                    }
                }

                // Final fallback
                Ok(String::from_utf8_lossy(self).to_string())
            }
        }
    }
}

/// Provides functionality for normalizing whitespace characters
///
/// Space, tab, line feed and carriage return, the whitespace of XML
pub fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// This trait normalizes various sequences of XML whitespace characters
/// (spaces, tabs, newlines) in a string into a single space, removing leading
/// and trailing whitespace. Other Unicode spaces such as U+00A0 are content.
pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split(is_xml_whitespace)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// Represents an element node in an XML document
#[derive(Debug)]
pub struct XmlElement {
    /// The local name of the element(excluding namespace prefix)
    pub name: String,

    /// The attributes of the element
    ///
    /// The key is the attribute name, the value is the unescaped attribute value
    pub attributes: HashMap<String, String>,

    /// The text content directly inside the element, entity references resolved
    pub text: Option<String>,

    /// The children of the element
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create a new element
    pub fn new(name: String) -> Self {
        Self {
            name,
            attributes: HashMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Gets the text content of the element and all its child elements
    ///
    /// Collects the text content of the current element and the text content of
    /// all its child elements, removing leading and trailing whitespace.
    pub fn text(&self) -> String {
        let mut result = String::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            if let Some(text_value) = &element.text {
                result.push_str(text_value);
            }
            stack.extend(element.children.iter().rev());
        }

        result.trim_matches(is_xml_whitespace).to_string()
    }

    /// Returns the value of the specified attribute
    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    /// Find all elements with the specified name, the current element included
    pub fn find_elements_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        SearchElementsByNameIter::new(self, name)
    }

    /// Find all elements with the specified name among the child elements of the current element
    pub fn find_children_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Find all elements with the specified name list among the child elements of the current element
    pub fn find_children_by_names(&self, names: &[&str]) -> impl Iterator<Item = &XmlElement> {
        self.children
            .iter()
            .filter(move |child| names.contains(&child.name.as_str()))
    }

    /// Get children elements
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    fn push_text(&mut self, text: &str) {
        match &mut self.text {
            Some(current) => current.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }
}

impl Drop for XmlElement {
    fn drop(&mut self) {
        // Flatten the subtree first so deep documents do not drop recursively
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut element) = stack.pop() {
            stack.append(&mut element.children);
        }
    }
}

struct SearchElementsByNameIter<'a> {
    stack: Vec<&'a XmlElement>,
    target_name: String,
}

impl<'a> SearchElementsByNameIter<'a> {
    fn new(root: &'a XmlElement, name: &str) -> Self {
        Self {
            stack: vec![root],
            target_name: name.to_string(),
        }
    }
}

impl<'a> Iterator for SearchElementsByNameIter<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(element) = self.stack.pop() {
            // Reversed so that children are visited in document order
            self.stack.extend(element.children.iter().rev());
            if element.name == self.target_name {
                return Some(element);
            }
        }
        None
    }
}

/// XML parser used to parse XML content and build an XML element tree
pub struct XmlReader {}

impl XmlReader {
    /// Parses an XML from string and builds the root element
    ///
    /// This function takes an XML string, parses its content using the `quick_xml` library,
    /// and builds an `XmlElement` tree representing the structure of the entire XML document.
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element of the XML element tree
    /// - `Err(EpubError)`: The document is empty, not well-formed, or truncated
    pub fn parse(content: &str) -> Result<XmlElement, EpubError> {
        if content.is_empty() {
            return Err(EpubError::EmptyDataError);
        }

        let mut reader = NsReader::from_str(content);

        let mut buf = Vec::new();
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,

                Ok(Event::Start(e)) => {
                    let element = Self::build_element(&e);
                    stack.push(element);
                }

                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        // If the stack is empty,
                        // the current element is the root element
                        if stack.is_empty() {
                            root = Some(element);
                        } else if let Some(parent) = stack.last_mut() {
                            parent.children.push(element);
                        }
                    }
                }

                // Self-closing element
                Ok(Event::Empty(e)) => {
                    let element = Self::build_element(&e);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }

                Ok(Event::Text(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    }
                }

                // Entity and character references between text chunks
                Ok(Event::GeneralRef(e)) => {
                    if let Some(element) = stack.last_mut() {
                        let entity = String::from_utf8_lossy(e.as_ref()).to_string();
                        match resolve_entity(&entity) {
                            Some(resolved) => element.push_text(&resolved),
                            None => element.push_text(&format!("&{};", entity)),
                        }
                    }
                }

                Ok(Event::CData(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    }
                }

                Err(err) => return Err(err.into()),

                // Ignore the following events (elements):
                // Comment, PI, Declaration, Doctype
                _ => {}
            }

            buf.clear();
        }

        if !stack.is_empty() {
            return Err(EpubError::FailedParsingXml);
        }

        root.ok_or(EpubError::EmptyDataError)
    }

    /// Builds an element from a start tag
    ///
    /// Namespace declarations (`xmlns`, `xmlns:*`) are not kept as attributes.
    fn build_element(e: &quick_xml::events::BytesStart) -> XmlElement {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut element = XmlElement::new(name);

        for attr in e.attributes().flatten() {
            let attr_key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            if attr_key == "xmlns" || attr_key.starts_with("xmlns:") {
                continue;
            }

            let raw_value = String::from_utf8_lossy(&attr.value).to_string();
            let attr_value = match unescape(&raw_value) {
                Ok(value) => value.into_owned(),
                Err(_) => raw_value.clone(),
            };

            element.attributes.insert(attr_key, attr_value);
        }

        element
    }
}

/// Resolves the name of an entity or character reference (`amp`, `#38`, `#x26`)
fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(code) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(code, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }

    if let Some(code) = entity.strip_prefix('#') {
        return code
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }

    let resolved = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        _ => return None,
    };
    Some(resolved.to_string())
}
