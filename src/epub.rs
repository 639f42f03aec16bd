use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, Read, Seek},
    path::Path,
};

use log::{debug, warn};
use zip::ZipArchive;

use crate::{
    error::EpubError,
    navigation::{NavigationCursor, parse_nav_document, parse_ncx},
    package::{NavigationFormat, PackageDocument},
    spine::SpineCursor,
    types::{
        EncryptionData, EpubVersion, ManifestItem, Metadata, MetadataElement, NavigationTree,
        SpineItem,
    },
    utils::{
        DecodeBytes, XmlReader, adobe_obfuscation_mask, apply_obfuscation_mask, find_entry_index,
        get_file_in_zip_archive, idpf_obfuscation_mask, open_zip_entry, resolve_container_path,
        root_prefix,
    },
};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";

const IDPF_OBFUSCATION: &str = "http://www.idpf.org/2008/embedding";
const ADOBE_OBFUSCATION: &str = "http://ns.adobe.com/pdf/enc#RC";

/// What became of the navigation document declared by the package
#[derive(Debug)]
enum NavigationState {
    Parsed(NavigationTree),
    NotDeclared,
    Missing { reference: String },
    Invalid { reason: String },
}

/// EPUB document reader, representing a loaded EPUB publication
///
/// The `EpubDoc` structure is the core of the library. Loading reads the
/// container descriptor, the package document and the navigation document
/// eagerly; content files are only read when they are opened.
///
/// Paths given to [EpubDoc::open_by_path] are relative to the directory of the
/// package document (the root path), like every path found inside the package.
///
/// # Notes
/// - The archive reader is stateful, so every open takes `&mut self`. The
///   document is not internally synchronized; sharing it between threads
///   requires an external lock.
/// - A book without a table of contents loads fine; the problem only surfaces
///   when [EpubDoc::navigation] is called.
pub struct EpubDoc<R: Read + Seek> {
    /// The structure of the epub file that actually holds it
    pub(crate) archive: ZipArchive<R>,

    /// The path to the package document inside the archive
    package_path: String,

    /// The directory of the package document, ending with `/`, or empty
    root_path: String,

    package: PackageDocument,

    /// The records of `META-INF/encryption.xml`, paths normalized
    encryption: Vec<EncryptionData>,

    navigation: NavigationState,
}

impl<R: Read + Seek> EpubDoc<R> {
    /// Creates a new EPUB document instance from a reader
    ///
    /// This function is responsible for the core logic of loading EPUB files:
    /// opening the archive, resolving the container descriptor, parsing the
    /// package document, the encryption records and the navigation document.
    /// Content entries are not touched, so a damaged chapter only fails when
    /// it is opened.
    ///
    /// # Parameters
    /// - `reader`: The data source that implements the `Read` and `Seek` traits,
    ///   usually a file or memory buffer
    ///
    /// # Return
    /// - `Ok(EpubDoc<R>)`: The successfully loaded EPUB document object
    /// - `Err(EpubError)`: `MalformedContainer` or `InvalidPackageDocument` when
    ///   the structure of the publication is unusable, or the archive error
    ///
    /// # Notes
    /// - Spine references are not checked against the manifest here; a dangling
    ///   reference fails only when that entry is opened.
    pub fn from_reader(reader: R) -> Result<Self, EpubError> {
        let mut archive = ZipArchive::new(reader).map_err(EpubError::from)?;

        let container = match get_file_in_zip_archive(&mut archive, CONTAINER_PATH) {
            Ok(bytes) => bytes,
            Err(EpubError::FileNotFound { .. }) => {
                return Err(EpubError::MalformedContainer {
                    reason: format!("\"{}\" is missing.", CONTAINER_PATH),
                });
            }
            Err(err) => return Err(err),
        };
        let container = container
            .decode()
            .map_err(|err| EpubError::MalformedContainer {
                reason: err.to_string(),
            })?;

        let package_path = Self::parse_container(&container)?;
        let root_path = root_prefix(&package_path);
        debug!("Package document is located at \"{}\".", package_path);

        let package = match get_file_in_zip_archive(&mut archive, &package_path) {
            Ok(bytes) => bytes,
            Err(EpubError::FileNotFound { path }) => {
                return Err(EpubError::InvalidPackageDocument {
                    reason: format!("The package document \"{}\" is missing.", path),
                });
            }
            Err(err) => return Err(err),
        };
        let package = package
            .decode()
            .map_err(|err| EpubError::InvalidPackageDocument {
                reason: err.to_string(),
            })?;
        let package = PackageDocument::parse(&package)?;
        debug!(
            "Parsed package document: {} manifest items, {} spine items.",
            package.manifest.len(),
            package.spine.len()
        );

        let encryption = Self::load_encryption(&mut archive);
        let navigation = Self::load_navigation(&mut archive, &root_path, &package);

        Ok(Self {
            archive,
            package_path,
            root_path,
            package,
            encryption,
            navigation,
        })
    }

    /// Parse the EPUB container file (META-INF/container.xml)
    ///
    /// The descriptor lists one or more `rootfile` elements; the first one
    /// carrying a `full-path` is the package document.
    ///
    /// # Parameters
    /// - `data`: The content string of the container.xml
    ///
    /// # Return
    /// - `Ok(String)`: The path to the package document inside the archive
    /// - `Err(EpubError)`: `MalformedContainer` if the descriptor is unparsable
    ///   or lists no root file
    fn parse_container(data: &str) -> Result<String, EpubError> {
        let root = XmlReader::parse(data).map_err(|err| EpubError::MalformedContainer {
            reason: err.to_string(),
        })?;

        root.find_elements_by_name("rootfile")
            .filter_map(|rootfile| rootfile.get_attr("full-path"))
            .find(|path| !path.trim().is_empty())
            .map(|path| path.trim().trim_start_matches('/').to_string())
            .ok_or_else(|| EpubError::MalformedContainer {
                reason: "No <rootfile> with a \"full-path\" attribute was found.".to_string(),
            })
    }

    /// Parse the encryption records of `META-INF/encryption.xml`
    ///
    /// Each `EncryptedData` contributes the `Algorithm` of its
    /// `EncryptionMethod` and the `URI` of its `CipherReference`. Records
    /// missing either part are skipped.
    fn parse_encryption(data: &str) -> Result<Vec<EncryptionData>, EpubError> {
        let root = XmlReader::parse(data)?;

        let mut encryption_data = Vec::new();
        for data in root.find_elements_by_name("EncryptedData") {
            let method = data
                .find_elements_by_name("EncryptionMethod")
                .next()
                .and_then(|element| element.get_attr("Algorithm"));
            let reference = data
                .find_elements_by_name("CipherReference")
                .next()
                .and_then(|element| element.get_attr("URI"));

            let (Some(method), Some(reference)) = (method, reference) else {
                warn!("Skipping an EncryptedData record without method or cipher reference.");
                continue;
            };

            let data = resolve_container_path("", &reference).unwrap_or(reference);
            encryption_data.push(EncryptionData { method, data });
        }

        Ok(encryption_data)
    }

    fn load_encryption(archive: &mut ZipArchive<R>) -> Vec<EncryptionData> {
        let content = match get_file_in_zip_archive(archive, ENCRYPTION_PATH) {
            Ok(bytes) => bytes,
            Err(EpubError::FileNotFound { .. }) => return vec![],
            Err(err) => {
                warn!("Ignoring unreadable \"{}\": {}", ENCRYPTION_PATH, err);
                return vec![];
            }
        };

        match content.decode().and_then(|data| Self::parse_encryption(&data)) {
            Ok(encryption) => {
                debug!("Found {} encrypted resources.", encryption.len());
                encryption
            }
            Err(err) => {
                warn!("Ignoring unparsable \"{}\": {}", ENCRYPTION_PATH, err);
                vec![]
            }
        }
    }

    /// Locate and parse the navigation document declared by the package
    ///
    /// Failures are recorded rather than returned, so that a book with a
    /// broken table of contents can still be read.
    fn load_navigation(
        archive: &mut ZipArchive<R>,
        root_path: &str,
        package: &PackageDocument,
    ) -> NavigationState {
        let Some(reference) = &package.navigation else {
            debug!("The package does not declare a navigation document.");
            return NavigationState::NotDeclared;
        };

        let Some(item) = package.manifest.get(&reference.id) else {
            warn!(
                "The navigation document \"{}\" has no manifest item.",
                reference.id
            );
            return NavigationState::Missing {
                reference: reference.id.clone(),
            };
        };

        let path = match resolve_container_path(root_path, &item.path) {
            Ok(path) => path,
            Err(err) => {
                warn!("Navigation document path is unusable: {}", err);
                return NavigationState::Missing {
                    reference: item.path.clone(),
                };
            }
        };

        let content = match get_file_in_zip_archive(archive, &path) {
            Ok(bytes) => bytes,
            Err(EpubError::FileNotFound { path }) => {
                warn!("The navigation document \"{}\" is not in the archive.", path);
                return NavigationState::Missing { reference: path };
            }
            Err(err) => {
                return NavigationState::Invalid {
                    reason: err.to_string(),
                };
            }
        };

        let parsed = content.decode().and_then(|content| match reference.format {
            NavigationFormat::Ncx => parse_ncx(&content),
            NavigationFormat::XhtmlNav => parse_nav_document(&content),
        });

        match parsed {
            Ok(tree) => {
                debug!("Parsed navigation document with {} entries.", tree.len());
                NavigationState::Parsed(tree)
            }
            Err(EpubError::InvalidNavigationDocument { reason }) => {
                warn!("The navigation document \"{}\" is invalid: {}", path, reason);
                NavigationState::Invalid { reason }
            }
            Err(err) => NavigationState::Invalid {
                reason: err.to_string(),
            },
        }
    }

    /// Opens a file of the publication for streaming
    ///
    /// The path is relative to the root path (the directory of the package
    /// document). `../` segments are resolved, a leading `/` refers to the
    /// container root, and a `#fragment` is ignored, so the targets of
    /// navigation entries can be passed as they are.
    ///
    /// # Return
    /// - `Ok(EpubFile)`: A reader over the file contents
    /// - `Err(EpubError)`: `FileNotFound` if there is no such entry,
    ///   `RelativeLinkLeakage` if the path leaves the container
    ///
    /// # Notes
    /// - Obfuscated fonts listed in `META-INF/encryption.xml` are deobfuscated
    ///   while reading. For any other encryption method the error is
    ///   `UnsupportedEncryptedMethod`.
    pub fn open_by_path(&mut self, path: &str) -> Result<EpubFile<'_>, EpubError> {
        let resolved = resolve_container_path(&self.root_path, path)?;
        self.open_entry(&resolved)
    }

    /// Opens a file of the publication from its manifest id
    ///
    /// # Return
    /// - `Ok(EpubFile)`: A reader over the file contents
    /// - `Err(EpubError)`: `UnknownManifestId` if the manifest has no such
    ///   item, otherwise the same errors as [EpubDoc::open_by_path]
    pub fn open_by_manifest_id(&mut self, id: &str) -> Result<EpubFile<'_>, EpubError> {
        let path = self
            .package
            .manifest
            .get(id)
            .map(|item| item.path.clone())
            .ok_or_else(|| EpubError::UnknownManifestId { id: id.to_string() })?;

        self.open_by_path(&path)
    }

    /// Reads a whole file of the publication
    ///
    /// See [EpubDoc::open_by_path]. A failure while reading the bytes is
    /// reported as `ArchiveReadError`.
    pub fn read_by_path(&mut self, path: &str) -> Result<Vec<u8>, EpubError> {
        let mut file = self.open_by_path(path)?;
        read_whole(&mut file)
    }

    /// Reads a whole file of the publication from its manifest id
    pub fn read_by_manifest_id(&mut self, id: &str) -> Result<Vec<u8>, EpubError> {
        let mut file = self.open_by_manifest_id(id)?;
        read_whole(&mut file)
    }

    fn open_entry(&mut self, name: &str) -> Result<EpubFile<'_>, EpubError> {
        let index = find_entry_index(&self.archive, name).ok_or_else(|| {
            EpubError::FileNotFound {
                path: name.to_string(),
            }
        })?;
        let entry_name = self
            .archive
            .name_for_index(index)
            .unwrap_or(name)
            .to_string();
        let mask = self.obfuscation_mask(name, &entry_name)?;

        let file = open_zip_entry(&mut self.archive, index, &entry_name)?;
        let size = file.size();

        Ok(EpubFile {
            inner: Box::new(file),
            path: entry_name,
            size,
            mask,
            position: 0,
        })
    }

    /// Returns the XOR mask to apply while reading an obfuscated resource
    ///
    /// # Return
    /// - `Ok(None)`: The resource is not encrypted
    /// - `Ok(Some(mask))`: The resource uses a supported font obfuscation
    /// - `Err(EpubError)`: The resource uses an unsupported encryption method
    fn obfuscation_mask(
        &self,
        name: &str,
        entry_name: &str,
    ) -> Result<Option<Vec<u8>>, EpubError> {
        let Some(encryption) = self
            .encryption
            .iter()
            .find(|encryption| encryption.data == name || encryption.data == entry_name)
        else {
            return Ok(None);
        };

        let unique_identifier = self.package.unique_identifier().unwrap_or_default();
        match encryption.method.as_str() {
            IDPF_OBFUSCATION => Ok(Some(idpf_obfuscation_mask(unique_identifier))),
            ADOBE_OBFUSCATION => Ok(Some(adobe_obfuscation_mask(unique_identifier))),
            _ => Err(EpubError::UnsupportedEncryptedMethod {
                method: encryption.method.clone(),
            }),
        }
    }

    /// Retrieves the contents of a metadata field
    ///
    /// The field is the local name of the metadata element: `title`,
    /// `language`, `identifier`, `creator`, `subject`, `description`,
    /// `publisher`, `contributor`, `date`, `type`, `format`, `source`,
    /// `relation`, `coverage`, `rights`, `meta`, ...
    ///
    /// # Return
    /// - `Ok(Vec<&str>)`: One value per occurrence of the field, in document order
    /// - `Err(EpubError)`: `UnknownMetadataField` if the field does not occur
    pub fn metadata(&self, field: &str) -> Result<Vec<&str>, EpubError> {
        Ok(self
            .metadata_elements(field)?
            .iter()
            .map(|element| element.content.as_str())
            .collect())
    }

    /// Retrieves the attributes of each occurrence of a metadata field
    ///
    /// The result is aligned with [EpubDoc::metadata]: the `i`-th map holds the
    /// attributes of the `i`-th value.
    pub fn metadata_attributes(
        &self,
        field: &str,
    ) -> Result<Vec<&HashMap<String, String>>, EpubError> {
        Ok(self
            .metadata_elements(field)?
            .iter()
            .map(|element| &element.attributes)
            .collect())
    }

    /// Retrieves every occurrence of a metadata field with contents and attributes
    pub fn metadata_elements(&self, field: &str) -> Result<&[MetadataElement], EpubError> {
        self.package
            .metadata
            .get(field)
            .map(Vec::as_slice)
            .ok_or_else(|| EpubError::UnknownMetadataField {
                field: field.to_string(),
            })
    }

    /// The names of the metadata fields present in the publication
    pub fn metadata_fields(&self) -> Vec<&str> {
        self.package.metadata.keys().map(String::as_str).collect()
    }

    /// The whole metadata map
    pub fn metadata_map(&self) -> &Metadata {
        &self.package.metadata
    }

    /// Returns a cursor on the first entry of the table of contents
    ///
    /// Every call returns a fresh cursor; cursors are independent of each
    /// other and only borrow the document.
    ///
    /// # Return
    /// - `Ok(NavigationCursor)`: A cursor on the first top-level entry
    /// - `Err(EpubError)`: `NoNavigationAvailable` if no navigation document is
    ///   declared (or it has no entry), `MissingNavigation` if it is declared
    ///   but not in the archive, `InvalidNavigationDocument` if it could not
    ///   be parsed
    pub fn navigation(&self) -> Result<NavigationCursor<'_>, EpubError> {
        match &self.navigation {
            NavigationState::Parsed(tree) => {
                NavigationCursor::new(tree).ok_or(EpubError::NoNavigationAvailable)
            }
            NavigationState::NotDeclared => Err(EpubError::NoNavigationAvailable),
            NavigationState::Missing { reference } => Err(EpubError::MissingNavigation {
                reference: reference.clone(),
            }),
            NavigationState::Invalid { reason } => Err(EpubError::InvalidNavigationDocument {
                reason: reason.clone(),
            }),
        }
    }

    /// The parsed table of contents, if there is one
    pub fn navigation_tree(&self) -> Option<&NavigationTree> {
        match &self.navigation {
            NavigationState::Parsed(tree) => Some(tree),
            _ => None,
        }
    }

    /// The title of the table of contents
    pub fn navigation_title(&self) -> Option<&str> {
        self.navigation_tree().and_then(NavigationTree::title)
    }

    /// Returns a cursor positioned before the first entry of the spine
    pub fn spine(&mut self) -> SpineCursor<'_, R> {
        SpineCursor::new(self)
    }

    /// The reading order, as declared by the package
    pub fn spine_items(&self) -> &[SpineItem] {
        &self.package.spine
    }

    pub fn manifest(&self) -> &HashMap<String, ManifestItem> {
        &self.package.manifest
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.package.manifest.get(id)
    }

    /// The path to the package document inside the archive
    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    /// The directory of the package document, which every relative path is
    /// resolved against
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn version(&self) -> EpubVersion {
        self.package.version
    }

    /// The unique identifier of the publication
    ///
    /// This is the value of the identifier referenced by the package's
    /// `unique-identifier` attribute, or the first identifier.
    pub fn unique_identifier(&self) -> Option<&str> {
        self.package.unique_identifier()
    }

    /// The encryption records of `META-INF/encryption.xml`
    pub fn encryption(&self) -> &[EncryptionData] {
        &self.encryption
    }

    /// Releases the archive and the underlying reader
    pub fn close(self) {}
}

impl EpubDoc<BufReader<File>> {
    /// Creates a new EPUB document instance
    ///
    /// This function is a convenience constructor for `EpubDoc`,
    /// used to open an EPUB file directly from a file path.
    /// The document owns the file until it is dropped or closed.
    ///
    /// # Parameters
    /// - `path`: The path to the EPUB file
    ///
    /// # Return
    /// - `Ok(EpubDoc)`: The created EPUB document instance
    /// - `Err(EpubError)`: An error occurred during initialization
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        let file = File::open(&path).map_err(EpubError::from)?;
        Self::from_reader(BufReader::new(file))
    }
}

/// A file of the publication opened for reading
///
/// Obfuscated fonts are deobfuscated while they are read.
pub struct EpubFile<'a> {
    inner: Box<dyn Read + 'a>,
    path: String,
    size: u64,
    mask: Option<Vec<u8>>,
    position: usize,
}

impl EpubFile<'_> {
    /// The name of the archive entry
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The uncompressed size of the file
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the file is deobfuscated while reading
    pub fn is_obfuscated(&self) -> bool {
        self.mask.is_some()
    }
}

impl Read for EpubFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        if let Some(mask) = &self.mask {
            apply_obfuscation_mask(&mut buf[..count], self.position, mask);
        }

        self.position = self.position.saturating_add(count);
        Ok(count)
    }
}

impl std::fmt::Debug for EpubFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpubFile")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("obfuscated", &self.mask.is_some())
            .finish()
    }
}

pub(crate) fn read_whole(file: &mut EpubFile<'_>) -> Result<Vec<u8>, EpubError> {
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)
        .map_err(|source| EpubError::ArchiveReadError {
            path: file.path.clone(),
            source,
        })?;

    Ok(buffer)
}
