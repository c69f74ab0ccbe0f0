//! Shared fixtures: in-memory OOXML documents and a scripted model client.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_study::{Generation, ModelClient, StudyError};
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;

const PPTX_NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

fn package(parts: &[(String, String)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        zip.start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A DOCX whose body holds one paragraph per entry.
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    );
    package(&[("word/document.xml".to_string(), xml)])
}

/// A PPTX with one text shape per slide; an empty string makes a blank slide.
pub fn pptx(slides: &[&str]) -> Vec<u8> {
    let ids: String = (1..=slides.len())
        .map(|n| format!(r#"<p:sldId id="{}" r:id="rId{n}"/>"#, 255 + n))
        .collect();
    let rels: String = (1..=slides.len())
        .map(|n| format!(r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{n}.xml"/>"#))
        .collect();

    let mut parts = vec![
        (
            "ppt/presentation.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation {PPTX_NS}><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>"#
            ),
        ),
        (
            "ppt/_rels/presentation.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
            ),
        ),
    ];
    for (i, text) in slides.iter().enumerate() {
        parts.push((
            format!("ppt/slides/slide{}.xml", i + 1),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><p:sld {PPTX_NS}><p:cSld><p:spTree><p:nvGrpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Titre"/></p:nvSpPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
            ),
        ));
    }
    package(&parts)
}

/// Replies with queued responses (the last one repeats) and records prompts.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, StudyError>>>,
    last: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            last: text.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: StudyError) -> Self {
        let model = Self::replying("");
        model.replies.lock().unwrap().push_back(Err(err));
        model
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<Generation, StudyError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.last.clone()));
        reply.map(|text| Generation {
            text,
            input_tokens: prompt.len() / 4,
            output_tokens: 42,
            attempts: 1,
        })
    }
}

/// A well-formed graded quiz with `n` questions.
pub fn graded_quiz_json(n: usize) -> String {
    let questions: Vec<String> = (1..=n)
        .map(|i| {
            format!(
                r#"{{"question": "Question {i} ?", "reponses": [
                    {{"texte": "A", "correct": true, "explication": "Voir page {i}."}},
                    {{"texte": "B", "correct": false, "explication": "Contredit la page {i}."}},
                    {{"texte": "C", "correct": false, "explication": "Hors sujet selon la page {i}."}}
                ]}}"#
            )
        })
        .collect();
    format!(r#"{{"questions": [{}]}}"#, questions.join(","))
}
