//! Package document parsing
//!
//! The package document (the `.opf` file named by `META-INF/container.xml`)
//! describes the publication: its metadata, every resource it contains
//! (the manifest), and the reading order (the spine). [PackageDocument::parse]
//! turns the text of that document into the immutable model, without touching
//! the archive, so it can be exercised directly against literal XML.

use std::collections::{HashMap, hash_map::Entry};

use log::warn;

use crate::{
    error::EpubError,
    types::{EpubVersion, ManifestItem, Metadata, MetadataElement, SpineItem},
    utils::{NormalizeWhitespace, XmlElement, XmlReader},
};

/// Which kind of document the publication declares as its table of contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationFormat {
    /// EPUB 2 Navigation Control file, referenced by the spine `toc` attribute
    Ncx,

    /// EPUB 3 XHTML navigation document, the manifest item with the `nav` property
    XhtmlNav,
}

/// The declared table of contents of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationReference {
    /// Manifest id of the navigation document
    pub id: String,
    pub format: NavigationFormat,
}

/// The parsed contents of an OPF package document
#[derive(Debug, Clone)]
pub struct PackageDocument {
    pub version: EpubVersion,

    /// The `unique-identifier` attribute of `<package>`: the id of the
    /// `<dc:identifier>` element that identifies the publication
    pub unique_identifier_ref: Option<String>,

    /// Metadata fields keyed by local element name, in document order
    pub metadata: Metadata,

    /// Resources keyed by manifest id
    pub manifest: HashMap<String, ManifestItem>,

    /// Reading order
    pub spine: Vec<SpineItem>,

    /// The declared navigation document, if any
    ///
    /// The id is not checked against the manifest here.
    pub navigation: Option<NavigationReference>,
}

impl PackageDocument {
    /// Parses the text of a package document
    ///
    /// # Return
    /// - `Ok(PackageDocument)`: The parsed package
    /// - `Err(EpubError)`: `InvalidPackageDocument` if the document is not
    ///   well-formed, or has no `<manifest>` or no `<spine>`
    ///
    /// # Notes
    /// - A missing `<metadata>` section yields empty metadata.
    /// - Manifest items without `id` or `href`, and itemrefs without `idref`,
    ///   are skipped with a warning.
    /// - Spine entries are not checked against the manifest.
    pub fn parse(content: &str) -> Result<Self, EpubError> {
        let package =
            XmlReader::parse(content).map_err(|err| EpubError::InvalidPackageDocument {
                reason: err.to_string(),
            })?;

        let manifest_element = package
            .find_elements_by_name("manifest")
            .next()
            .ok_or_else(|| EpubError::InvalidPackageDocument {
                reason: "The <manifest> element was not found.".to_string(),
            })?;
        let spine_element = package
            .find_elements_by_name("spine")
            .next()
            .ok_or_else(|| EpubError::InvalidPackageDocument {
                reason: "The <spine> element was not found.".to_string(),
            })?;

        let metadata = match package.find_elements_by_name("metadata").next() {
            Some(element) => Self::parse_metadata(element),
            None => {
                warn!("The package document has no <metadata> element.");
                Metadata::default()
            }
        };
        let manifest = Self::parse_manifest(manifest_element);
        let spine = Self::parse_spine(spine_element);
        let navigation = Self::find_navigation(spine_element, &manifest);
        let version = Self::determine_epub_version(&package, navigation.as_ref());

        Ok(Self {
            version,
            unique_identifier_ref: package.get_attr("unique-identifier"),
            metadata,
            manifest,
            spine,
            navigation,
        })
    }

    /// The value of the identifier that uniquely identifies the publication
    ///
    /// This is the `<dc:identifier>` whose id is named by the package's
    /// `unique-identifier` attribute, or the first identifier when that
    /// attribute is absent or dangling.
    pub fn unique_identifier(&self) -> Option<&str> {
        let identifiers = self.metadata.get("identifier")?;

        self.unique_identifier_ref
            .as_ref()
            .and_then(|uid| {
                identifiers
                    .iter()
                    .find(|element| element.attributes.get("id") == Some(uid))
            })
            .or_else(|| identifiers.first())
            .map(|element| element.content.as_str())
    }

    /// Parse the `<metadata>` section
    ///
    /// Every child element becomes one [MetadataElement] keyed by its local
    /// name, whatever its namespace. The legacy OPF 2.0 `<dc-metadata>` and
    /// `<x-metadata>` wrappers are looked through.
    fn parse_metadata(metadata_element: &XmlElement) -> Metadata {
        let mut metadata = Metadata::default();
        Self::collect_metadata(metadata_element, &mut metadata);
        metadata
    }

    fn collect_metadata(parent: &XmlElement, metadata: &mut Metadata) {
        for element in parent.children() {
            if matches!(element.name.as_str(), "dc-metadata" | "x-metadata") {
                Self::collect_metadata(element, metadata);
                continue;
            }

            metadata
                .entry(element.name.clone())
                .or_default()
                .push(MetadataElement {
                    content: element.text().normalize_whitespace(),
                    attributes: element.attributes.clone(),
                });
        }
    }

    /// Parse the `<manifest>` section
    fn parse_manifest(manifest_element: &XmlElement) -> HashMap<String, ManifestItem> {
        let estimated_items = manifest_element.children().count();
        let mut resources = HashMap::with_capacity(estimated_items);

        for element in manifest_element.find_children_by_name("item") {
            let (Some(id), Some(path)) = (element.get_attr("id"), element.get_attr("href")) else {
                warn!(
                    "Skipping manifest item without \"id\" or \"href\": {:?}",
                    element.attributes
                );
                continue;
            };

            let item = ManifestItem {
                id: id.clone(),
                path,
                mime: element.get_attr("media-type").unwrap_or_default(),
                properties: element.get_attr("properties"),
                fallback: element.get_attr("fallback"),
            };

            match resources.entry(id) {
                Entry::Vacant(entry) => {
                    entry.insert(item);
                }
                Entry::Occupied(entry) => {
                    warn!(
                        "Duplicate manifest id \"{}\", keeping the first declaration.",
                        entry.key()
                    );
                }
            }
        }

        resources
    }

    /// Parse the `<spine>` section
    fn parse_spine(spine_element: &XmlElement) -> Vec<SpineItem> {
        let mut spine = Vec::new();
        for element in spine_element.find_children_by_name("itemref") {
            let Some(idref) = element.get_attr("idref") else {
                warn!("Skipping spine itemref without \"idref\".");
                continue;
            };

            spine.push(SpineItem {
                idref,
                id: element.get_attr("id"),
                linear: element
                    .get_attr("linear")
                    .is_none_or(|linear| linear.trim() != "no"),
                properties: element.get_attr("properties"),
            });
        }

        spine
    }

    /// Locate the declared navigation document
    ///
    /// The spine `toc` attribute (an NCX) takes precedence over a manifest
    /// item carrying the `nav` property.
    fn find_navigation(
        spine_element: &XmlElement,
        manifest: &HashMap<String, ManifestItem>,
    ) -> Option<NavigationReference> {
        if let Some(toc) = spine_element.get_attr("toc").filter(|toc| !toc.is_empty()) {
            return Some(NavigationReference {
                id: toc,
                format: NavigationFormat::Ncx,
            });
        }

        let mut nav_items = manifest
            .values()
            .filter(|item| item.has_property("nav"))
            .map(|item| item.id.clone())
            .collect::<Vec<String>>();
        if nav_items.len() > 1 {
            warn!("Several manifest items carry the \"nav\" property: {:?}", nav_items);
        }

        // The manifest is a hash map, so pick deterministically among duplicates
        nav_items.sort();
        nav_items.into_iter().next().map(|id| NavigationReference {
            id,
            format: NavigationFormat::XhtmlNav,
        })
    }

    /// Determine the EPUB version of the package
    ///
    /// The `version` attribute is used when it names a 2.x or 3.x version.
    /// Otherwise an XHTML navigation document indicates EPUB 3, and anything
    /// else is treated as EPUB 2.
    fn determine_epub_version(
        package: &XmlElement,
        navigation: Option<&NavigationReference>,
    ) -> EpubVersion {
        if let Some(version) = package.get_attr("version") {
            let version = version.trim();
            if version.starts_with('3') {
                return EpubVersion::Version3_0;
            }
            if version.starts_with('2') {
                return EpubVersion::Version2_0;
            }
        }

        match navigation {
            Some(reference) if reference.format == NavigationFormat::XhtmlNav => {
                EpubVersion::Version3_0
            }
            _ => EpubVersion::Version2_0,
        }
    }
}
