#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const UNIQUE_ID: &str = "urn:uuid:0bb8f3b9-2a3c-4e1a-9b1c-7e2d1f0a5c33";

pub const EPUB2_PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Alice</dc:title>
    <dc:title>Bob</dc:title>
    <dc:creator opf:role="aut" opf:file-as="Carroll, Lewis">Lewis Carroll</dc:creator>
    <dc:identifier id="BookId">urn:uuid:0bb8f3b9-2a3c-4e1a-9b1c-7e2d1f0a5c33</dc:identifier>
    <dc:language>en</dc:language>
    <meta name="cover" content="cover-image"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="chapter1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="chapter2" href="text/chapter2.xhtml" media-type="application/xhtml+xml"/>
    <item id="notes" href="text/notes.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover-image" href="images/cover.png" media-type="image/png"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="chapter1"/>
    <itemref idref="chapter2"/>
    <itemref idref="notes" linear="no"/>
  </spine>
</package>"#;

/// Table of contents `[A[B, C], D]`
pub const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <docTitle><text>Alice and Bob</text></docTitle>
  <navMap>
    <navPoint id="a" playOrder="1">
      <navLabel><text>A</text></navLabel>
      <content src="text/chapter1.xhtml"/>
      <navPoint id="b" playOrder="2">
        <navLabel><text>B</text></navLabel>
        <content src="text/chapter1.xhtml#b"/>
      </navPoint>
      <navPoint id="c" playOrder="3">
        <navLabel><text>C</text></navLabel>
        <content src="text/chapter1.xhtml#c"/>
      </navPoint>
    </navPoint>
    <navPoint id="d" playOrder="4">
      <navLabel><text>D</text></navLabel>
      <content src="text/chapter2.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub const CHAPTER1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><body><h1 id="b">B</h1><h1 id="c">C</h1></body></html>"#;

pub const CHAPTER2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><body><h1>D</h1></body></html>"#;

pub const NOTES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><body><p>Notes</p></body></html>"#;

pub const COVER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// Builds an EPUB archive in memory
///
/// `mimetype` is written first and stored; every other entry is deflated,
/// except those listed in `stored`.
pub fn build_epub(files: &[(&str, &[u8])], stored: &[&str]) -> Cursor<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored_options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated_options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored_options).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    for (name, content) in files {
        let options = if stored.contains(name) {
            stored_options
        } else {
            deflated_options
        };

        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }

    let mut cursor = zip.finish().unwrap();
    cursor.set_position(0);
    cursor
}

/// An EPUB 2 book with an NCX table of contents
pub fn epub2_book() -> Cursor<Vec<u8>> {
    build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", EPUB2_PACKAGE.as_bytes()),
            ("OEBPS/toc.ncx", NCX.as_bytes()),
            ("OEBPS/text/chapter1.xhtml", CHAPTER1.as_bytes()),
            ("OEBPS/text/chapter2.xhtml", CHAPTER2.as_bytes()),
            ("OEBPS/text/notes.xhtml", NOTES.as_bytes()),
            ("OEBPS/images/cover.png", COVER),
        ],
        &["OEBPS/images/cover.png"],
    )
}

/// An EPUB 2 book built from `package` with the files of [epub2_book]
pub fn book_with_package(package: &str) -> Cursor<Vec<u8>> {
    build_epub(
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", package.as_bytes()),
            ("OEBPS/toc.ncx", NCX.as_bytes()),
            ("OEBPS/text/chapter1.xhtml", CHAPTER1.as_bytes()),
            ("OEBPS/text/chapter2.xhtml", CHAPTER2.as_bytes()),
            ("OEBPS/text/notes.xhtml", NOTES.as_bytes()),
            ("OEBPS/images/cover.png", COVER),
        ],
        &[],
    )
}
