mod common;

use std::io::Read;

use epub_cursor::{EpubDoc, EpubError};
use sha1::{Digest, Sha1};

use common::*;

#[test]
fn test_spine_walks_in_order() {
    let mut doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let mut spine = doc.spine();

    assert_eq!(spine.len(), 3);
    assert_eq!(spine.position(), None);
    assert!(spine.current().is_none());

    let mut visited = vec![];
    while let Some(entry) = spine.next_entry() {
        assert_eq!(spine.position(), Some(entry.index));
        assert_eq!(spine.idref(), Some(entry.idref.as_str()));
        visited.push((entry.idref, entry.linear));
    }

    assert_eq!(
        visited,
        vec![
            ("chapter1".to_string(), true),
            ("chapter2".to_string(), true),
            ("notes".to_string(), false),
        ]
    );

    // The end is sticky
    assert!(spine.next_entry().is_none());
    assert_eq!(spine.position(), None);
}

#[test]
fn test_spine_backwards_and_rewind() {
    let mut doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let mut spine = doc.spine();

    while spine.next_entry().is_some() {}
    assert_eq!(spine.previous_entry().unwrap().idref, "notes");
    assert_eq!(spine.previous_entry().unwrap().idref, "chapter2");
    assert_eq!(spine.previous_entry().unwrap().idref, "chapter1");
    assert!(spine.previous_entry().is_none());
    assert!(spine.previous_entry().is_none());

    assert_eq!(spine.next_entry().unwrap().idref, "chapter1");
    spine.next_entry().unwrap();
    spine.rewind();
    assert_eq!(spine.position(), None);
    assert_eq!(spine.next_entry().unwrap().idref, "chapter1");
}

#[test]
fn test_spine_open_current_entry() {
    let mut doc = EpubDoc::from_reader(epub2_book()).unwrap();
    let mut spine = doc.spine();

    assert!(matches!(spine.open(), Err(EpubError::NoSpineEntry)));

    let entry = spine.next_entry().unwrap();
    let item = entry.manifest_item.unwrap();
    assert_eq!(item.path, "text/chapter1.xhtml");
    assert_eq!(item.mime, "application/xhtml+xml");

    let mut content = String::new();
    spine.open().unwrap().read_to_string(&mut content).unwrap();
    assert_eq!(content, CHAPTER1);

    spine.next_entry().unwrap();
    assert_eq!(spine.read().unwrap(), CHAPTER2.as_bytes());
}

#[test]
fn test_dangling_spine_reference_fails_lazily() {
    let package = EPUB2_PACKAGE.replace(
        r#"<itemref idref="chapter2"/>"#,
        r#"<itemref idref="missing"/>"#,
    );

    // Loading succeeds, the reference is only resolved on open
    let mut doc = EpubDoc::from_reader(book_with_package(&package)).unwrap();
    let mut spine = doc.spine();

    spine.next_entry().unwrap();
    assert!(spine.read().is_ok());

    let entry = spine.next_entry().unwrap();
    assert_eq!(entry.idref, "missing");
    assert!(entry.manifest_item.is_none());
    assert!(matches!(
        spine.open(),
        Err(EpubError::UnknownManifestId { id }) if id == "missing"
    ));

    // The cursor keeps working after the failure
    assert_eq!(spine.next_entry().unwrap().idref, "notes");
    assert!(spine.read().is_ok());
}

#[test]
fn test_empty_spine() {
    let package = r#"<package version="2.0" unique-identifier="id">
        <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:identifier id="id">x</dc:identifier></metadata>
        <manifest/>
        <spine/>
    </package>"#;
    let mut doc = EpubDoc::from_reader(book_with_package(package)).unwrap();
    let mut spine = doc.spine();

    assert!(spine.is_empty());
    assert!(spine.next_entry().is_none());
    assert!(spine.previous_entry().is_none());
    assert!(matches!(spine.read(), Err(EpubError::NoSpineEntry)));
}

fn idpf_key(unique_identifier: &str) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(unique_identifier.as_bytes());
    let hash = hasher.finalize();
    (0..1040).map(|i| hash[i % hash.len()]).collect()
}

fn obfuscated_book(font: &[u8], algorithm: &str) -> std::io::Cursor<Vec<u8>> {
    let mut obfuscated = font.to_vec();
    let key = idpf_key(UNIQUE_ID);
    for (byte, key) in obfuscated.iter_mut().zip(key.iter()) {
        *byte ^= key;
    }

    let package = EPUB2_PACKAGE.replace(
        r#"<item id="cover-image""#,
        r#"<item id="font" href="fonts/font.otf" media-type="font/otf"/>
    <item id="cover-image""#,
    );
    let encryption = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<encryption xmlns="urn:oasis:names:tc:opendocument:xmlns:container"
            xmlns:enc="http://www.w3.org/2001/04/xmlenc#">
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="{algorithm}"/>
    <enc:CipherData><enc:CipherReference URI="OEBPS/fonts/font.otf"/></enc:CipherData>
  </enc:EncryptedData>
</encryption>"#
    );

    build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("META-INF/encryption.xml", encryption.as_bytes()),
            ("OEBPS/content.opf", package.as_bytes()),
            ("OEBPS/toc.ncx", NCX.as_bytes()),
            ("OEBPS/fonts/font.otf", obfuscated.as_slice()),
        ],
        &[],
    )
}

#[test]
fn test_obfuscated_font_is_streamed_in_clear() {
    let font = (0..3000).map(|i| (i * 7 % 256) as u8).collect::<Vec<u8>>();
    let mut doc =
        EpubDoc::from_reader(obfuscated_book(&font, "http://www.idpf.org/2008/embedding")).unwrap();
    assert_eq!(doc.encryption().len(), 1);

    // Small reads cross the end of the obfuscated header
    let mut file = doc.open_by_manifest_id("font").unwrap();
    assert!(file.is_obfuscated());
    let mut content = Vec::new();
    let mut chunk = [0u8; 97];
    loop {
        let count = file.read(&mut chunk).unwrap();
        if count == 0 {
            break;
        }
        content.extend_from_slice(&chunk[..count]);
    }
    drop(file);
    assert_eq!(content, font);

    assert_eq!(doc.read_by_path("fonts/font.otf").unwrap(), font);
    assert!(!doc.open_by_manifest_id("ncx").unwrap().is_obfuscated());
}

#[test]
fn test_unsupported_encryption_method() {
    let font = vec![1u8; 64];
    let method = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
    let mut doc = EpubDoc::from_reader(obfuscated_book(&font, method)).unwrap();

    assert!(matches!(
        doc.open_by_manifest_id("font"),
        Err(EpubError::UnsupportedEncryptedMethod { method: found }) if found == method
    ));
    assert!(doc.metadata("title").is_ok());
    assert!(doc.navigation().is_ok());
}

#[test]
fn test_unparsable_encryption_is_ignored() {
    let book = build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("META-INF/encryption.xml", b"<encryption><broken>".as_slice()),
            ("OEBPS/content.opf", EPUB2_PACKAGE.as_bytes()),
            ("OEBPS/toc.ncx", NCX.as_bytes()),
        ],
        &[],
    );

    let doc = EpubDoc::from_reader(book).unwrap();
    assert!(doc.encryption().is_empty());
    assert!(doc.navigation().is_ok());
}
