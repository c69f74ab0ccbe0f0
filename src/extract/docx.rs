//! DOCX extraction: body paragraphs of `word/document.xml`.
//!
//! Word documents carry no page structure in their XML (pagination is a
//! rendering decision), so the whole document becomes a single unpaginated
//! segment. Only paragraphs that are direct children of `w:body` count;
//! paragraphs inside tables and text boxes are not body paragraphs and are
//! left out.

use super::xml::{malformed, ElementStack};
use super::{open_package, read_part};
use crate::document::Document;
use crate::error::StudyError;
use crate::format::DocumentFormat;
use quick_xml::events::Event;
use quick_xml::Reader;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract a DOCX (or OOXML `.doc`) upload.
pub fn extract_docx(bytes: &[u8]) -> Result<Document, StudyError> {
    let mut archive = open_package(bytes, DocumentFormat::Docx)?;
    let xml = read_part(&mut archive, DOCUMENT_PART, DocumentFormat::Docx)?;
    let paragraphs = body_paragraphs(&xml)?;

    let text = paragraphs
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Document::unpaginated(&text))
}

/// Text of every body paragraph, in document order, empty ones included.
fn body_paragraphs(xml: &str) -> Result<Vec<String>, StudyError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = ElementStack::default();
    let mut paragraphs = Vec::new();
    // (depth of the open body paragraph, its text so far)
    let mut current: Option<(usize, String)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(DocumentFormat::Docx, DOCUMENT_PART, e))?;
        match event {
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"p" && stack.top_is(b"body") && current.is_none() {
                    current = Some((stack.depth() + 1, String::new()));
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"p" && stack.top_is(b"body") {
                    paragraphs.push(String::new());
                    continue;
                }
                if let Some((_, ref mut text)) = current {
                    if stack.top_is(b"r") && !in_nested_content(&stack) {
                        match name {
                            b"tab" => text.push('\t'),
                            b"br" | b"cr" => text.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, ref mut text)) = current {
                    if stack.top_is(b"t")
                        && stack.parent_is(b"r")
                        && !in_nested_content(&stack)
                    {
                        let chunk = t
                            .unescape()
                            .map_err(|e| malformed(DocumentFormat::Docx, DOCUMENT_PART, e))?;
                        text.push_str(&chunk);
                    }
                }
            }
            Event::CData(c) => {
                if let Some((_, ref mut text)) = current {
                    if stack.top_is(b"t") && !in_nested_content(&stack) {
                        text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
            }
            Event::End(_) => {
                if let Some((depth, _)) = current {
                    if stack.depth() == depth {
                        if let Some((_, text)) = current.take() {
                            paragraphs.push(text);
                        }
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Text boxes and alternate-content fallbacks repeat text that does not
/// belong to the enclosing paragraph.
fn in_nested_content(stack: &ElementStack) -> bool {
    stack.contains(b"txbxContent") || stack.contains(b"Fallback")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        );
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn para(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    #[test]
    fn paragraphs_join_into_one_unpaginated_segment() {
        let bytes = docx_with_body(&format!("{}{}", para("Chapitre 1"), para("La cellule")));
        let doc = extract_docx(&bytes).unwrap();
        assert_eq!(doc.segments.len(), 1);
        assert_eq!(doc.segments[0].page, None);
        assert_eq!(doc.segments[0].text, "Chapitre 1\nLa cellule");
    }

    #[test]
    fn whitespace_paragraphs_are_dropped() {
        let body = format!("{}{}<w:p/>{}", para("A"), para("   "), para("B"));
        let doc = extract_docx(&docx_with_body(&body)).unwrap();
        assert_eq!(doc.assemble(), "A\nB");
    }

    #[test]
    fn runs_tabs_and_breaks_are_concatenated() {
        let body = r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Mot</w:t></w:r><w:r><w:tab/><w:t>clé</w:t><w:br/><w:t>suite</w:t></w:r></w:p>"#;
        let doc = extract_docx(&docx_with_body(body)).unwrap();
        assert_eq!(doc.segments[0].text, "Mot\tclé\nsuite");
    }

    #[test]
    fn entities_are_unescaped() {
        let doc = extract_docx(&docx_with_body(&para("R&amp;D &lt;2024&gt;"))).unwrap();
        assert_eq!(doc.segments[0].text, "R&D <2024>");
    }

    #[test]
    fn table_paragraphs_are_not_body_paragraphs() {
        let body = format!(
            "{}<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>{}",
            para("Avant"),
            para("Cellule"),
            para("Après")
        );
        let doc = extract_docx(&docx_with_body(&body)).unwrap();
        assert_eq!(doc.segments[0].text, "Avant\nAprès");
    }

    #[test]
    fn text_box_content_is_ignored() {
        let body = r#"<w:p><w:r><w:t>Visible</w:t></w:r><w:r><w:drawing><wps:txbx xmlns:wps="urn:wps"><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></w:r></w:p>"#;
        let doc = extract_docx(&docx_with_body(body)).unwrap();
        assert_eq!(doc.segments[0].text, "Visible");
    }

    #[test]
    fn blank_document_yields_no_segment() {
        let doc = extract_docx(&docx_with_body(&para("  "))).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn missing_document_part_is_corrupt() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<w:styles/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let err = extract_docx(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"), "got: {err}");
    }
}
