//! Builders for résumé files and completion service replies.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use deeptalent::evaluation::{CompletionError, CompletionRequest, CompletionService};
use deeptalent::SubmittedFile;

/// A minimal `.docx` with one paragraph per entry.
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .expect("Failed to start docx entry");
    writer.write_all(xml.as_bytes()).expect("Failed to write docx entry");
    writer.finish().expect("Failed to finish docx").into_inner()
}

/// `count` résumés named `cv-{start}.docx` onwards.
pub fn resumes(start: usize, count: usize) -> Vec<SubmittedFile> {
    (start..start + count)
        .map(|i| {
            let name = format!("Candidato {}", i);
            let dni = format!("10{:08}", i);
            SubmittedFile::new(
                format!("cv-{}.docx", i),
                docx(&[&name, &format!("Cedula {}", dni), "Python, SQL"]),
            )
        })
        .collect()
}

/// A valid evaluation reply for candidates `start..start + count`.
pub fn evaluation_reply(start: usize, count: usize) -> String {
    let items: Vec<String> = (start..start + count)
        .map(|i| {
            format!(
                r#"{{"nombre": "Candidato {i}", "cedula": "10{i:08}", "tipo_documento": "CC", "ciudad": "Bogota", "movil": "30012345{i:02}", "correo": "candidato{i}@example.com", "score": {score}, "habilidades_encontradas": ["Python"]}}"#,
                i = i,
                score = 50 + i
            )
        })
        .collect();
    format!("```json\n{{\"candidatos\": [{}]}}\n```", items.join(","))
}

/// Completion service that replays a fixed script, one reply per call.
pub struct ScriptedCompletion {
    replies: Mutex<Vec<Result<String, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(mut replies: Vec<Result<String, CompletionError>>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(CompletionError::EmptyResponse))
    }
}
