mod common;

use epub_cursor::{EpubDoc, EpubError, NavigationError, types::EpubVersion};

use common::*;

const EPUB3_PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:isbn:9780000000000</dc:identifier>
    <dc:title>Modern Book</dc:title>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="chapter1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="chapter1"/>
  </spine>
</package>"#;

const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
  <body>
    <nav epub:type="toc">
      <h2>Contents</h2>
      <ol>
        <li><a href="text/chapter1.xhtml">Chapter One</a>
          <ol><li><a href="text/chapter1.xhtml#c">Section</a></li></ol>
        </li>
      </ol>
    </nav>
  </body>
</html>"#;

#[test]
fn test_navigation_scenario() {
    let doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let mut cursor = doc.navigation().unwrap();

    assert_eq!(cursor.title(), "A");
    assert!(cursor.is_first());
    assert!(!cursor.has_parents());

    cursor.descend().unwrap();
    cursor.next_sibling().unwrap();
    assert_eq!(cursor.title(), "C");
    assert_eq!(cursor.url(), "text/chapter1.xhtml#c");

    cursor.ascend().unwrap();
    cursor.next_sibling().unwrap();
    assert_eq!(cursor.title(), "D");
    assert!(cursor.is_last());
    assert!(!cursor.has_children());
}

#[test]
fn test_next_on_last_is_idempotent_failure() {
    let doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let mut cursor = doc.navigation().unwrap();
    cursor.next_sibling().unwrap();

    for _ in 0..3 {
        assert_eq!(cursor.next_sibling(), Err(NavigationError::NoNextSibling));
        assert_eq!(cursor.title(), "D");
        assert_eq!(cursor.url(), "text/chapter2.xhtml");
        assert_eq!(cursor.index(), 1);
    }
}

#[test]
fn test_first_and_last_flags() {
    let doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let tree = doc.navigation_tree().unwrap();
    let mut cursor = doc.navigation().unwrap();

    let len = tree.roots().len();
    for index in 0..len {
        assert_eq!(cursor.index(), index);
        assert_eq!(cursor.is_first(), index == 0);
        assert_eq!(cursor.is_last(), index == len - 1);
        if index + 1 < len {
            cursor.next_sibling().unwrap();
        }
    }
}

#[test]
fn test_cursor_target_opens_content() {
    let mut doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let target = {
        let mut cursor = doc.navigation().unwrap();
        cursor.descend().unwrap();
        cursor.url().to_string()
    };

    assert_eq!(doc.read_by_path(&target).unwrap(), CHAPTER1.as_bytes());
}

#[test]
fn test_no_declared_navigation() {
    let package = EPUB2_PACKAGE.replace("<spine toc=\"ncx\">", "<spine>");
    let mut doc = EpubDoc::from_reader(book_with_package(&package)).unwrap();

    assert!(matches!(
        doc.navigation(),
        Err(EpubError::NoNavigationAvailable)
    ));
    assert!(doc.navigation_tree().is_none());

    // Metadata and spine are unaffected
    assert_eq!(doc.metadata("title").unwrap(), vec!["Alice", "Bob"]);
    let mut spine = doc.spine();
    assert_eq!(spine.len(), 3);
    assert_eq!(spine.next_entry().unwrap().idref, "chapter1");
    assert_eq!(spine.read().unwrap(), CHAPTER1.as_bytes());
}

#[test]
fn test_declared_navigation_missing_from_archive() {
    let book = build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", EPUB2_PACKAGE.as_bytes()),
            ("OEBPS/text/chapter1.xhtml", CHAPTER1.as_bytes()),
        ],
        &[],
    );

    let doc = EpubDoc::from_reader(book).unwrap();
    assert!(matches!(
        doc.navigation(),
        Err(EpubError::MissingNavigation { reference }) if reference == "OEBPS/toc.ncx"
    ));
    assert_eq!(doc.metadata("language").unwrap(), vec!["en"]);
}

#[test]
fn test_navigation_id_without_manifest_item() {
    let package = EPUB2_PACKAGE.replace("<spine toc=\"ncx\">", "<spine toc=\"toc\">");
    let doc = EpubDoc::from_reader(book_with_package(&package)).unwrap();

    assert!(matches!(
        doc.navigation(),
        Err(EpubError::MissingNavigation { reference }) if reference == "toc"
    ));
}

#[test]
fn test_invalid_navigation_document() {
    let book = build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", EPUB2_PACKAGE.as_bytes()),
            ("OEBPS/toc.ncx", b"<ncx><navMap><navPoint></ncx>".as_slice()),
        ],
        &[],
    );

    let doc = EpubDoc::from_reader(book).unwrap();
    assert!(matches!(
        doc.navigation(),
        Err(EpubError::InvalidNavigationDocument { .. })
    ));
    assert_eq!(doc.metadata("title").unwrap(), vec!["Alice", "Bob"]);
}

#[test]
fn test_empty_navigation_map() {
    let book = build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", EPUB2_PACKAGE.as_bytes()),
            (
                "OEBPS/toc.ncx",
                b"<ncx><docTitle><text>T</text></docTitle><navMap/></ncx>".as_slice(),
            ),
        ],
        &[],
    );

    let doc = EpubDoc::from_reader(book).unwrap();
    assert!(matches!(
        doc.navigation(),
        Err(EpubError::NoNavigationAvailable)
    ));
    assert_eq!(doc.navigation_title(), Some("T"));
}

#[test]
fn test_epub3_navigation_document() {
    let book = build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", EPUB3_PACKAGE.as_bytes()),
            ("OEBPS/nav.xhtml", NAV.as_bytes()),
            ("OEBPS/text/chapter1.xhtml", CHAPTER1.as_bytes()),
        ],
        &[],
    );

    let doc = EpubDoc::from_reader(book).unwrap();
    assert_eq!(doc.version(), EpubVersion::Version3_0);
    assert_eq!(doc.unique_identifier(), Some("urn:isbn:9780000000000"));
    assert_eq!(doc.navigation_title(), Some("Contents"));

    let meta = doc.metadata_elements("meta").unwrap();
    assert_eq!(meta[0].content, "2024-01-01T00:00:00Z");
    assert_eq!(
        meta[0].attributes.get("property").map(String::as_str),
        Some("dcterms:modified")
    );

    let mut cursor = doc.navigation().unwrap();
    assert_eq!(cursor.title(), "Chapter One");
    assert!(cursor.is_first() && cursor.is_last());

    cursor.descend().unwrap();
    assert_eq!(cursor.title(), "Section");
    assert_eq!(cursor.depth(), 1);
    assert_eq!(cursor.descend(), Err(NavigationError::NoChildren));

    cursor.ascend().unwrap();
    assert_eq!(cursor.ascend(), Err(NavigationError::NoParent));
    assert_eq!(cursor.title(), "Chapter One");
}

#[test]
fn test_independent_cursors_over_one_document() {
    let doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let mut first = doc.navigation().unwrap();
    let mut second = doc.navigation().unwrap();

    first.next_sibling().unwrap();
    second.descend().unwrap();

    assert_eq!(first.title(), "D");
    assert_eq!(second.title(), "B");

    let resumed = first.clone();
    first.previous_sibling().unwrap();
    assert_eq!(resumed.title(), "D");
    assert_eq!(first.title(), "A");
}

#[test]
fn test_deeply_nested_table_of_contents() {
    let depth = 20_000;
    let mut ncx = String::from("<ncx><docTitle><text>Deep</text></docTitle><navMap>");
    for level in 0..depth {
        ncx.push_str(&format!(
            r#"<navPoint id="p{level}"><navLabel><text>Level {level}</text></navLabel><content src="text/chapter1.xhtml#l{level}"/>"#
        ));
    }
    ncx.push_str(&"</navPoint>".repeat(depth));
    ncx.push_str("</navMap></ncx>");

    let book = build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", EPUB2_PACKAGE.as_bytes()),
            ("OEBPS/toc.ncx", ncx.as_bytes()),
            ("OEBPS/text/chapter1.xhtml", CHAPTER1.as_bytes()),
        ],
        &[],
    );

    let doc = EpubDoc::from_reader(book).unwrap();
    assert_eq!(doc.navigation_tree().map(|tree| tree.len()), Some(depth));

    let mut cursor = doc.navigation().unwrap();
    let mut descended = 0;
    while cursor.descend().is_ok() {
        descended += 1;
    }
    assert_eq!(descended, depth - 1);
    assert_eq!(cursor.title(), format!("Level {}", depth - 1));
    assert!(cursor.is_first() && cursor.is_last());

    while cursor.ascend().is_ok() {}
    assert_eq!(cursor.title(), "Level 0");
    drop(cursor);
    drop(doc);
}
