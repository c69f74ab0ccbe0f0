//! PPTX extraction: one unit per slide, in presentation order.
//!
//! Slide order is *not* the order of the `ppt/slides/slideN.xml` file names
//! (reordering slides in PowerPoint does not rename parts). The authoritative
//! order is the `p:sldIdLst` of `ppt/presentation.xml`, whose relationship ids
//! resolve to slide parts through `ppt/_rels/presentation.xml.rels`.
//!
//! Within a slide only top-level shapes with a text body contribute text.
//! Pictures, graphic frames (tables, charts), connectors and group shapes are
//! skipped, as are shapes whose text is whitespace only.

use super::xml::{attr_value, malformed, ElementStack};
use super::{open_package, read_part};
use crate::document::Document;
use crate::error::StudyError;
use crate::format::DocumentFormat;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

/// Extract a PPTX (or OOXML `.ppt`) upload.
pub fn extract_pptx(bytes: &[u8]) -> Result<Document, StudyError> {
    let mut archive = open_package(bytes, DocumentFormat::Pptx)?;

    let presentation = read_part(&mut archive, PRESENTATION_PART, DocumentFormat::Pptx)?;
    let rels = read_part(&mut archive, PRESENTATION_RELS, DocumentFormat::Pptx)?;

    let slide_ids = slide_rel_ids(&presentation)?;
    let targets = relationship_targets(&rels)?;
    debug!("PPTX: {} slide(s) listed", slide_ids.len());

    let mut units = Vec::with_capacity(slide_ids.len());
    for rel_id in &slide_ids {
        let target = targets
            .get(rel_id)
            .ok_or_else(|| StudyError::CorruptDocument {
                format: DocumentFormat::Pptx,
                detail: format!("slide relationship '{}' has no target", rel_id),
            })?;
        let part = resolve_target(target);
        let xml = read_part(&mut archive, &part, DocumentFormat::Pptx)?;
        units.push(slide_text(&xml, &part)?);
    }

    Ok(Document::from_units(units))
}

/// Relationship ids of `p:sldId` entries, in presentation order.
fn slide_rel_ids(xml: &str) -> Result<Vec<String>, StudyError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader
            .read_event()
            .map_err(|e| malformed(DocumentFormat::Pptx, PRESENTATION_PART, e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldId" => {
                // `id` is the numeric slide id; the relationship id is the
                // namespaced `r:id`.
                if let Some(id) = attr_value(&e, |k| k.contains(&b':') && k.ends_with(b":id")) {
                    ids.push(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ids)
}

/// `Id → Target` for every relationship in a `.rels` part.
fn relationship_targets(xml: &str) -> Result<HashMap<String, String>, StudyError> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();

    loop {
        match reader
            .read_event()
            .map_err(|e| malformed(DocumentFormat::Pptx, PRESENTATION_RELS, e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, |k| k == b"Id");
                let target = attr_value(&e, |k| k == b"Target");
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(targets)
}

/// Resolve a relationship target against the `ppt/` directory.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = vec!["ppt"];
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Text of one slide: text-bearing top-level shapes joined by newlines.
fn slide_text(xml: &str, part: &str) -> Result<String, StudyError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = ElementStack::default();
    let mut shapes: Vec<String> = Vec::new();
    let mut shape: Option<ShapeText> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(DocumentFormat::Pptx, part, e))?;
        match event {
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"sp" && stack.top_is(b"spTree") && shape.is_none() {
                    shape = Some(ShapeText::new(stack.depth() + 1));
                } else if let Some(s) = shape.as_mut() {
                    if name == b"txBody" {
                        s.has_text_body = true;
                    } else if name == b"p" && stack.top_is(b"txBody") {
                        s.paragraphs.push(String::new());
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if let Some(s) = shape.as_mut() {
                    let name = e.local_name();
                    match name.as_ref() {
                        b"txBody" => s.has_text_body = true,
                        b"p" if stack.top_is(b"txBody") => s.paragraphs.push(String::new()),
                        b"br" if stack.top_is(b"p") => s.push_str("\n"),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if let Some(s) = shape.as_mut() {
                    if stack.top_is(b"t") && stack.contains(b"txBody") {
                        let chunk = t
                            .unescape()
                            .map_err(|e| malformed(DocumentFormat::Pptx, part, e))?;
                        s.push_str(&chunk);
                    }
                }
            }
            Event::End(_) => {
                if shape.as_ref().is_some_and(|s| s.depth == stack.depth()) {
                    if let Some(text) = shape.take().and_then(ShapeText::finish) {
                        shapes.push(text);
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes.join("\n"))
}

/// Text collected for the top-level shape currently open.
struct ShapeText {
    depth: usize,
    has_text_body: bool,
    paragraphs: Vec<String>,
}

impl ShapeText {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            has_text_body: false,
            paragraphs: Vec::new(),
        }
    }

    fn push_str(&mut self, s: &str) {
        match self.paragraphs.last_mut() {
            Some(p) => p.push_str(s),
            None => self.paragraphs.push(s.to_string()),
        }
    }

    /// Shape text, or `None` for shapes with no or whitespace-only text.
    fn finish(self) -> Option<String> {
        if !self.has_text_body {
            return None;
        }
        let text = self.paragraphs.join("\n");
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

    fn text_shape(paragraphs: &[&str]) -> String {
        let ps: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:rPr lang=\"fr-FR\"/><a:t>{p}</a:t></a:r></a:p>"))
            .collect();
        format!("<p:sp><p:nvSpPr><p:cNvPr id=\"2\" name=\"Title\"/></p:nvSpPr><p:txBody><a:bodyPr/>{ps}</p:txBody></p:sp>")
    }

    fn slide(shapes: &str) -> String {
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#)
    }

    /// Build a deck; `slides[i]` is stored as `slide{i+1}.xml` but listed in
    /// `order` (1-based file numbers).
    fn deck(slides: &[String], order: &[usize]) -> Vec<u8> {
        let ids: String = order
            .iter()
            .enumerate()
            .map(|(i, n)| format!(r#"<p:sldId id="{}" r:id="rId{n}"/>"#, 256 + i))
            .collect();
        let presentation = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>"#
        );
        let rels: String = (1..=slides.len())
            .map(|n| format!(r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{n}.xml"/>"#))
            .collect();
        let rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        );

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        zip.start_file(PRESENTATION_PART, opts).unwrap();
        zip.write_all(presentation.as_bytes()).unwrap();
        zip.start_file(PRESENTATION_RELS, opts).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
        for (i, s) in slides.iter().enumerate() {
            zip.start_file(format!("ppt/slides/slide{}.xml", i + 1), opts)
                .unwrap();
            zip.write_all(s.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn slides_become_numbered_segments() {
        let slides = vec![
            slide(&text_shape(&["Introduction"])),
            slide(&format!(
                "{}{}",
                text_shape(&["Photosynthèse"]),
                text_shape(&["Lumière", "Chlorophylle"])
            )),
        ];
        let doc = extract_pptx(&deck(&slides, &[1, 2])).unwrap();
        assert_eq!(
            doc.assemble(),
            "[PAGE 1]\nIntroduction\n\n[PAGE 2]\nPhotosynthèse\nLumière\nChlorophylle"
        );
        assert_eq!(doc.source_units, Some(2));
    }

    #[test]
    fn empty_slides_are_skipped_with_a_gap() {
        let slides = vec![
            slide(&text_shape(&["Un"])),
            slide(&text_shape(&["   "])),
            slide(&text_shape(&["Trois"])),
        ];
        let doc = extract_pptx(&deck(&slides, &[1, 2, 3])).unwrap();
        let pages: Vec<_> = doc.segments.iter().map(|s| s.page).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
        assert_eq!(doc.skipped_units, vec![2]);
    }

    #[test]
    fn presentation_order_wins_over_file_names() {
        let slides = vec![slide(&text_shape(&["Fichier 1"])), slide(&text_shape(&["Fichier 2"]))];
        let doc = extract_pptx(&deck(&slides, &[2, 1])).unwrap();
        assert_eq!(doc.segments[0].text, "Fichier 2");
        assert_eq!(doc.segments[0].page, Some(1));
        assert_eq!(doc.segments[1].text, "Fichier 1");
    }

    #[test]
    fn shapes_without_text_body_are_skipped() {
        let picture = r#"<p:pic><p:nvPicPr><p:cNvPr id="3" name="Image"/></p:nvPicPr></p:pic>"#;
        let table = r#"<p:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tr><a:tc><a:txBody><a:p><a:r><a:t>Cellule</a:t></a:r></a:p></a:txBody></a:tc></a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#;
        let group = format!("<p:grpSp>{}</p:grpSp>", text_shape(&["Groupé"]));
        let body = format!("{picture}{table}{group}{}", text_shape(&["Seul texte"]));
        let doc = extract_pptx(&deck(&[slide(&body)], &[1])).unwrap();
        assert_eq!(doc.assemble(), "[PAGE 1]\nSeul texte");
    }

    #[test]
    fn line_breaks_inside_paragraphs_are_kept() {
        let shape = r#"<p:sp><p:txBody><a:p><a:r><a:t>Ligne 1</a:t></a:r><a:br/><a:r><a:t>Ligne 2</a:t></a:r></a:p></p:txBody></p:sp>"#;
        let doc = extract_pptx(&deck(&[slide(shape)], &[1])).unwrap();
        assert_eq!(doc.segments[0].text, "Ligne 1\nLigne 2");
    }

    #[test]
    fn resolve_target_handles_relative_and_absolute_paths() {
        assert_eq!(resolve_target("slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_target("/ppt/slides/slide9.xml"), "ppt/slides/slide9.xml");
        assert_eq!(resolve_target("../ppt/slides/slide2.xml"), "ppt/slides/slide2.xml");
    }

    #[test]
    fn dangling_relationship_is_corrupt() {
        let slides = vec![slide(&text_shape(&["x"]))];
        let err = extract_pptx(&deck(&slides, &[1, 7])).unwrap_err();
        assert!(err.to_string().contains("rId7"), "got: {err}");
    }
}
