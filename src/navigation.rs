//! Table of contents
//!
//! This module parses the two navigation document formats into a
//! [NavigationTree], and provides [NavigationCursor], a resumable traversal
//! object over that tree.
//!
//! - EPUB 2.x: the NCX file (`<navMap>` of nested `<navPoint>` elements)
//! - EPUB 3.x: the XHTML navigation document (`<nav epub:type="toc">` holding
//!   nested `<ol>` lists)

use std::ops::Range;

use log::warn;

use crate::{
    error::{EpubError, NavigationError},
    types::{NavEntry, NavPoint, NavigationTree},
    utils::{NormalizeWhitespace, XmlElement, XmlReader},
};

const HEAD_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Parses an NCX document into a navigation tree
///
/// Navigation points keep their document order at every depth; `playOrder`
/// is not used for ordering. The label text becomes the title and the
/// `src` of the `<content>` element becomes the target.
///
/// # Return
/// - `Ok(NavigationTree)`: The parsed tree, possibly without any entry
/// - `Err(EpubError)`: `InvalidNavigationDocument` if the document is not
///   well-formed or has no `<navMap>`
pub fn parse_ncx(content: &str) -> Result<NavigationTree, EpubError> {
    let ncx = XmlReader::parse(content).map_err(|err| EpubError::InvalidNavigationDocument {
        reason: err.to_string(),
    })?;

    let title = match ncx.find_elements_by_name("docTitle").next() {
        Some(element) => Some(element.text().normalize_whitespace()),
        None => {
            warn!("Expecting to get docTitle information from the ncx file, but it's missing.");
            None
        }
    };

    let nav_map = ncx.find_elements_by_name("navMap").next().ok_or_else(|| {
        EpubError::InvalidNavigationDocument {
            reason: "The <navMap> element was not found.".to_string(),
        }
    })?;

    Ok(NavigationTree::from_entries(title, parse_nav_points(nav_map)))
}

/// Parse NCX navigation points from the navMap and nested navPoint elements
///
/// The walk keeps its own stack, so arbitrarily deep tables of contents are
/// parsed without growing the call stack.
fn parse_nav_points(nav_map: &XmlElement) -> Vec<NavEntry> {
    let mut entries = Vec::new();
    let mut stack = Vec::new();
    push_children(&mut stack, nav_map, "navPoint", None);

    while let Some((nav_point, parent)) = stack.pop() {
        let title = nav_point
            .find_children_by_name("navLabel")
            .next()
            .map(|element| element.text().normalize_whitespace())
            .unwrap_or_default();

        let target = nav_point
            .find_children_by_name("content")
            .next()
            .and_then(|element| element.get_attr("src"))
            .unwrap_or_default();

        let index = entries.len();
        entries.push(NavEntry {
            title,
            target,
            parent,
        });
        push_children(&mut stack, nav_point, "navPoint", Some(index));
    }

    entries
}

/// Queue the `name` children of `element` so that they pop in document order
fn push_children<'a>(
    stack: &mut Vec<(&'a XmlElement, Option<usize>)>,
    element: &'a XmlElement,
    name: &str,
    parent: Option<usize>,
) {
    let children = element.find_children_by_name(name).collect::<Vec<_>>();
    stack.extend(children.into_iter().rev().map(|child| (child, parent)));
}

/// Parses an EPUB 3 XHTML navigation document into a navigation tree
///
/// The `<nav>` whose `epub:type` contains `toc` is used, or the first `<nav>`
/// when none is marked. Each `<li>` contributes its first `<a>` (title and
/// `href`) or `<span>` (title only), and its nested `<ol>` as children.
///
/// # Return
/// - `Ok(NavigationTree)`: The parsed tree
/// - `Err(EpubError)`: `InvalidNavigationDocument` if the document is not
///   well-formed or has no `<nav>` with an `<ol>`
pub fn parse_nav_document(content: &str) -> Result<NavigationTree, EpubError> {
    let document =
        XmlReader::parse(content).map_err(|err| EpubError::InvalidNavigationDocument {
            reason: err.to_string(),
        })?;

    let nav = document
        .find_elements_by_name("nav")
        .find(|element| has_structural_type(element, "toc"))
        .or_else(|| document.find_elements_by_name("nav").next())
        .ok_or_else(|| EpubError::InvalidNavigationDocument {
            reason: "The <nav> element was not found.".to_string(),
        })?;

    let title = nav
        .find_children_by_names(&HEAD_TAGS)
        .next()
        .map(|heading| heading.text().normalize_whitespace());
    let list = nav.find_children_by_name("ol").next().ok_or_else(|| {
        EpubError::InvalidNavigationDocument {
            reason: "The <nav> element has no <ol> list.".to_string(),
        }
    })?;

    Ok(NavigationTree::from_entries(title, parse_catalog_list(list)))
}

/// Parses `<ol>`/`<li>` list structures
///
/// A `<li>` without a label is kept, untitled, only when one of its
/// descendants has a label.
fn parse_catalog_list(list: &XmlElement) -> Vec<NavEntry> {
    let mut entries = Vec::new();
    let mut labelled = Vec::new();
    let mut stack = Vec::new();
    push_children(&mut stack, list, "li", None);

    while let Some((item, parent)) = stack.pop() {
        let label = item.find_children_by_names(&["a", "span"]).next();

        let index = entries.len();
        entries.push(NavEntry {
            title: label
                .map(|label| label.text().normalize_whitespace())
                .unwrap_or_default(),
            target: label
                .and_then(|label| label.get_attr("href"))
                .unwrap_or_default(),
            parent,
        });
        labelled.push(label.is_some());

        if let Some(nested) = item.find_children_by_name("ol").next() {
            push_children(&mut stack, nested, "li", Some(index));
        }
    }

    prune_unlabelled(entries, labelled)
}

/// Drop the unlabelled entries that have no labelled descendant
fn prune_unlabelled(entries: Vec<NavEntry>, mut keep: Vec<bool>) -> Vec<NavEntry> {
    // Children always come after their parent
    for index in (0..entries.len()).rev() {
        if let (true, Some(parent)) = (keep[index], entries[index].parent) {
            keep[parent] = true;
        }
    }

    let mut remap = vec![None; entries.len()];
    let mut kept = Vec::with_capacity(entries.len());
    for (index, mut entry) in entries.into_iter().enumerate() {
        if !keep[index] {
            warn!("Skipping navigation list item without <a> or <span> label.");
            continue;
        }

        entry.parent = entry.parent.and_then(|parent| remap[parent]);
        remap[index] = Some(kept.len());
        kept.push(entry);
    }

    kept
}

/// Whether `element` carries an `epub:type` naming `kind`, whatever prefix
/// the document binds the ops namespace to
fn has_structural_type(element: &XmlElement, kind: &str) -> bool {
    element
        .attributes
        .iter()
        .filter(|(name, _)| {
            name.rsplit_once(':').map_or(name.as_str(), |(_, local)| local) == "type"
        })
        .any(|(_, value)| value.split_whitespace().any(|value| value == kind))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Position {
    siblings: Range<usize>,
    index: usize,
}

/// Cursor over a [NavigationTree]
///
/// The cursor stands on one entry at a time and moves between siblings
/// (`next_sibling`, `previous_sibling`), into the children of the current
/// entry (`descend`) and back to the entry it descended from (`ascend`).
///
/// A move that is not possible returns a [NavigationError] and leaves the
/// cursor exactly where it was, so a cursor can be reused indefinitely.
/// Cursors only borrow the tree; any number of independent cursors may walk
/// the same tree, and cloning one is cheap.
///
/// ```rust, ignore
/// # use epub_cursor::epub::EpubDoc;
/// let doc = EpubDoc::new("path/to/book.epub")?;
/// let mut cursor = doc.navigation()?;
/// loop {
///     println!("{} -> {}", cursor.title(), cursor.url());
///     if cursor.next_sibling().is_err() {
///         break;
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct NavigationCursor<'a> {
    tree: &'a NavigationTree,
    parents: Vec<Position>,
    current: Position,
}

impl<'a> NavigationCursor<'a> {
    /// Creates a cursor on the first top-level entry
    ///
    /// Returns `None` when the tree has no entry.
    pub fn new(tree: &'a NavigationTree) -> Option<Self> {
        let roots = tree.root_range();
        if roots.is_empty() {
            return None;
        }

        Some(Self {
            tree,
            parents: Vec::new(),
            current: Position {
                siblings: roots,
                index: 0,
            },
        })
    }

    /// The entry under the cursor
    pub fn current(&self) -> &'a NavPoint {
        self.tree
            .node(self.current.siblings.start + self.current.index)
    }

    /// Get the title of the item on the cursor
    pub fn title(&self) -> &'a str {
        &self.current().title
    }

    /// Get the url of the item on the cursor
    ///
    /// It usually contains a path and a section link after a '#'.
    /// The path is relative to the package document and can be opened with
    /// [EpubDoc::open_by_path](crate::epub::EpubDoc::open_by_path).
    pub fn url(&self) -> &'a str {
        &self.current().target
    }

    /// The sub-entries of the item on the cursor
    pub fn children(&self) -> &'a [NavPoint] {
        self.tree.children(self.current())
    }

    pub fn has_children(&self) -> bool {
        self.current().has_children()
    }

    pub fn has_parents(&self) -> bool {
        !self.parents.is_empty()
    }

    /// Is the item the first of the entries on the same depth level?
    pub fn is_first(&self) -> bool {
        self.current.index == 0
    }

    /// Is the item the last of the entries on the same depth level?
    pub fn is_last(&self) -> bool {
        self.current.index + 1 == self.current.siblings.len()
    }

    /// Index of the item among its siblings
    pub fn index(&self) -> usize {
        self.current.index
    }

    /// Number of levels below the top level, 0 for a top-level entry
    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    /// Advance the cursor to the next entry on the same depth level
    pub fn next_sibling(&mut self) -> Result<(), NavigationError> {
        if self.is_last() {
            return Err(NavigationError::NoNextSibling);
        }

        self.current.index += 1;
        Ok(())
    }

    /// Step back the cursor to the previous entry on the same depth level
    pub fn previous_sibling(&mut self) -> Result<(), NavigationError> {
        if self.is_first() {
            return Err(NavigationError::NoPreviousSibling);
        }

        self.current.index -= 1;
        Ok(())
    }

    /// Move the cursor one level in, onto the first child of the current entry
    pub fn descend(&mut self) -> Result<(), NavigationError> {
        if !self.has_children() {
            return Err(NavigationError::NoChildren);
        }

        let children = Position {
            siblings: self.current().children.clone(),
            index: 0,
        };
        let parent = std::mem::replace(&mut self.current, children);
        self.parents.push(parent);
        Ok(())
    }

    /// Move the cursor one level out, back onto the entry it descended from
    ///
    /// Whatever moves were made at the deeper level are discarded.
    pub fn ascend(&mut self) -> Result<(), NavigationError> {
        let parent = self.parents.pop().ok_or(NavigationError::NoParent)?;
        self.current = parent;
        Ok(())
    }
}
