use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::parser::ParseOutcome;

/// Word documents: concatenate all paragraph runs in document order, joined
/// by newlines. A `.docx` is a zip archive of XML parts; the document body
/// lives at `word/document.xml`.
pub fn parse(path: &Path) -> ParseOutcome {
    match parse_inner(path) {
        Ok(text) => ParseOutcome::Text(text),
        Err(e) => ParseOutcome::Failed(e),
    }
}

fn parse_inner(path: &Path) -> Result<String, String> {
    let file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut archive = ZipArchive::new(file).map_err(|e| e.to_string())?;
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?;

    let mut xml = String::new();
    document_xml.read_to_string(&mut xml).map_err(|e| e.to_string())?;
    drop(document_xml);

    Ok(extract_paragraphs(&xml))
}

/// Walks the document body XML, treating `<w:p>` as paragraph boundaries
/// and concatenating the text inside every `<w:t>` run within a paragraph.
fn extract_paragraphs(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => {
                in_text_run = true;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => {
                in_text_run = false;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"p" => {
                paragraphs.push(std::mem::take(&mut current));
            }
            Ok(Event::Text(t)) if in_text_run => {
                if let Ok(unescaped) = t.unescape() {
                    current.push_str(&unescaped);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paragraph_runs_with_newlines() {
        let xml = r#"<w:document xmlns:w="ns">
            <w:body>
                <w:p><w:r><w:t>Hello</w:t></w:r></w:p>
                <w:p><w:r><w:t>World</w:t></w:r></w:p>
            </w:body>
        </w:document>"#;
        assert_eq!(extract_paragraphs(xml), "Hello\nWorld");
    }

    #[test]
    fn concatenates_multiple_runs_within_one_paragraph() {
        let xml = r#"<w:document xmlns:w="ns">
            <w:body>
                <w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>World</w:t></w:r></w:p>
            </w:body>
        </w:document>"#;
        assert_eq!(extract_paragraphs(xml), "Hello World");
    }
}
