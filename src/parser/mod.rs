pub mod docx;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod text;

use std::path::Path;

use crate::config::{classify_extension, FileFamily};
use ocr::OcrEngine;

/// Sum type for a parse attempt, replacing exception-for-control-flow
/// around parse failures. The indexer branches on the variant instead of
/// catching.
pub enum ParseOutcome {
    Text(String),
    Unsupported,
    Failed(String),
}

/// Dispatches a file path to the parser for its family, by lower-cased
/// extension. The family set is closed and known at compile time, so
/// dispatch is a match rather than a plugin registry; the OCR engine alone
/// is behind a trait so tests can substitute a fake.
pub struct ParserRegistry<O: OcrEngine> {
    ocr: O,
    ocr_psm: u32,
}

impl<O: OcrEngine> ParserRegistry<O> {
    pub fn new(ocr: O, ocr_psm: u32) -> Self {
        Self { ocr, ocr_psm }
    }

    pub fn parse(&self, path: &Path) -> ParseOutcome {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match classify_extension(&ext) {
            None => ParseOutcome::Unsupported,
            Some(FileFamily::Text) => text::parse(path),
            Some(FileFamily::Docx) => docx::parse(path),
            Some(FileFamily::Pdf) => pdf::parse(path, &self.ocr, self.ocr_psm),
            Some(FileFamily::Image) => image::parse(path, &self.ocr, self.ocr_psm),
        }
    }
}

/// Collapse runs of whitespace and blank lines, then trim. Shared by every
/// OCR call site.
pub fn normalize_ocr_text(raw: &str) -> String {
    let collapsed = raw
        .lines()
        .map(|line| {
            line.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_is_unsupported() {
        let registry = ParserRegistry::new(ocr::FakeOcr::new(""), 3);
        let outcome = registry.parse(Path::new("/tmp/file.unknownext"));
        assert!(matches!(outcome, ParseOutcome::Unsupported));
    }

    #[test]
    fn normalizes_whitespace_and_blank_lines() {
        let raw = "  hello    world  \n\n\n   again  ";
        assert_eq!(normalize_ocr_text(raw), "hello world\nagain");
    }
}
