use std::{collections::HashMap, ops::Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpubVersion {
    Version2_0,
    Version3_0,
}

/// One occurrence of a metadata field in the package document
///
/// A publication may declare the same field several times (several
/// `<dc:creator>` entries, for example); each declaration becomes one
/// `MetadataElement`, and they are kept in the order of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataElement {
    /// The text content of the element, with whitespace normalized
    pub content: String,

    /// All attributes of the element
    ///
    /// The key is the attribute name as written in the document, so prefixed
    /// attributes such as `opf:role` keep their prefix. Namespace declarations
    /// are not included.
    pub attributes: HashMap<String, String>,
}

/// Metadata of a publication, keyed by local element name
///
/// A field that does not occur in the package document is an absent key,
/// never an empty sequence. With the `indexmap` feature the fields iterate
/// in the order of their first appearance.
#[cfg(feature = "indexmap")]
pub type Metadata = indexmap::IndexMap<String, Vec<MetadataElement>>;

#[cfg(not(feature = "indexmap"))]
pub type Metadata = HashMap<String, Vec<MetadataElement>>;

/// Represents a resource item declared in the EPUB manifest
///
/// Every resource that is part of the publication must be declared in the
/// manifest. The manifest is the only bridge between the identifiers used by
/// the spine and the navigation reference, and the files in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// The unique identifier of the item within the package
    pub id: String,

    /// The path of the resource, relative to the package document directory
    ///
    /// This is the `href` attribute as written in the manifest; it is resolved
    /// against the root path when the resource is opened.
    pub path: String,

    /// The media type of the resource
    pub mime: String,

    /// Optional properties associated with this resource
    ///
    /// This field contains a space-separated list of properties, for example
    /// `nav` for the EPUB 3 navigation document or `cover-image`.
    pub properties: Option<String>,

    /// Optional fallback resource identifier
    pub fallback: Option<String>,
}

impl ManifestItem {
    /// Whether the space-separated `properties` contain `property`
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|properties| properties.split_whitespace().any(|item| item == property))
    }
}

/// Represents an item in the EPUB spine
///
/// The sequence of `idref`s defines the linear reading order of the
/// publication. The `idref` is not checked against the manifest at load time;
/// a dangling reference only fails when that entry is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// The ID reference to a manifest item
    pub idref: String,

    /// Optional identifier for this spine item
    pub id: Option<String>,

    /// Optional properties associated with this spine item
    pub properties: Option<String>,

    /// Indicates whether this item is part of the linear reading order
    ///
    /// Non-linear items are typically footnotes or appendices that readers
    /// reach through hyperlinks rather than sequentially.
    pub linear: bool,
}

/// Represents encryption information for EPUB resources
///
/// This structure holds one `EncryptedData` record of `META-INF/encryption.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionData {
    /// The encryption algorithm URI
    ///
    /// Supported encryption methods:
    /// - IDPF font obfuscation: "http://www.idpf.org/2008/embedding"
    /// - Adobe font obfuscation: "http://ns.adobe.com/pdf/enc#RC"
    pub method: String,

    /// The URI of the encrypted resource, relative to the container root
    pub data: String,
}

/// Represents a navigation point in the table of contents
///
/// Nodes are stored in a [NavigationTree]; a node does not own its children,
/// it records where they live in the tree's node table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    /// The display label of this navigation point
    pub title: String,

    /// The referenced location: a path relative to the package document,
    /// optionally followed by `#fragment`
    pub target: String,

    pub(crate) children: Range<usize>,
}

impl NavPoint {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// The path part of the target, without any `#fragment`
    pub fn path(&self) -> &str {
        match self.target.split_once('#') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The fragment part of the target, if any
    pub fn fragment(&self) -> Option<&str> {
        self.target.split_once('#').map(|(_, fragment)| fragment)
    }
}

/// Table-of-contents entry, as produced by the navigation parsers before
/// being laid out into a [NavigationTree]
///
/// Entries are flat; `parent` is the index of an earlier entry, `None` at the
/// top level. Siblings keep their relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NavEntry {
    pub title: String,
    pub target: String,
    pub parent: Option<usize>,
}

/// The table of contents of a publication
///
/// The tree is an arena: all nodes live in one table, and every sibling list
/// (the top level included) is a contiguous range of that table. Cursors refer
/// to positions by index, so any number of them can walk the same tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationTree {
    nodes: Vec<NavPoint>,
    roots: Range<usize>,
    title: Option<String>,
}

impl NavigationTree {
    /// Lays out flat entries so that every sibling list is contiguous
    ///
    /// The layout works on an explicit list of pending sibling lists, so the
    /// depth of the tree is not limited by the call stack.
    pub(crate) fn from_entries(title: Option<String>, mut entries: Vec<NavEntry>) -> Self {
        let mut siblings = vec![Vec::new(); entries.len()];
        let mut top_level = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            match entry.parent {
                Some(parent) if parent < index => siblings[parent].push(index),
                _ => top_level.push(index),
            }
        }

        let mut nodes = Vec::with_capacity(entries.len());
        let mut roots = 0..0;
        let mut pending: Vec<(Option<usize>, Vec<usize>)> = vec![(None, top_level)];

        while let Some((owner, list)) = pending.pop() {
            let start = nodes.len();
            for &index in &list {
                let entry = &mut entries[index];
                nodes.push(NavPoint {
                    title: std::mem::take(&mut entry.title),
                    target: std::mem::take(&mut entry.target),
                    children: 0..0,
                });
            }

            let range = start..nodes.len();
            match owner {
                Some(node) => nodes[node].children = range,
                None => roots = range,
            }

            for (offset, index) in list.into_iter().enumerate() {
                let children = std::mem::take(&mut siblings[index]);
                if !children.is_empty() {
                    pending.push((Some(start + offset), children));
                }
            }
        }

        Self {
            nodes,
            roots,
            title,
        }
    }

    /// The top-level entries
    pub fn roots(&self) -> &[NavPoint] {
        &self.nodes[self.roots.clone()]
    }

    /// The direct sub-entries of `point`
    ///
    /// `point` must have been obtained from this tree.
    pub fn children(&self, point: &NavPoint) -> &[NavPoint] {
        &self.nodes[point.children.clone()]
    }

    /// The document title declared by the navigation document, if any
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The total number of entries at every depth
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over every entry in document order (depth first)
    pub fn iter(&self) -> impl Iterator<Item = (usize, &NavPoint)> {
        let mut stack = vec![(0usize, self.roots.clone())];

        std::iter::from_fn(move || {
            loop {
                let (depth, range) = stack.last_mut()?;
                let depth = *depth;
                match range.next() {
                    Some(index) => {
                        let point = &self.nodes[index];
                        if point.has_children() {
                            stack.push((depth + 1, point.children.clone()));
                        }
                        return Some((depth, point));
                    }
                    None => {
                        stack.pop();
                    }
                }
            }
        })
    }

    pub(crate) fn root_range(&self) -> Range<usize> {
        self.roots.clone()
    }

    pub(crate) fn node(&self, index: usize) -> &NavPoint {
        &self.nodes[index]
    }
}
