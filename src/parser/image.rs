use std::path::Path;

use crate::parser::ocr::OcrEngine;
use crate::parser::ParseOutcome;

/// Images: OCR only, no text layer to fall back from.
/// An empty OCR result is success with empty text, never a failure.
pub fn parse<O: OcrEngine>(path: &Path, ocr: &O, psm: u32) -> ParseOutcome {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => return ParseOutcome::Failed(e.to_string()),
    };

    let image = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => return ParseOutcome::Failed(e.to_string()),
    };

    match ocr.recognize(&image, psm) {
        Ok(text) => ParseOutcome::Text(text),
        Err(e) => ParseOutcome::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ocr::FakeOcr;

    fn scratch_png(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("lucidfiles-image-test-{}-{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn runs_ocr_on_decodable_image() {
        let path = scratch_png("blank.png");
        let img = image::DynamicImage::new_rgb8(2, 2);
        img.save(&path).unwrap();

        let outcome = parse(&path, &FakeOcr::new("scanned text"), 3);
        std::fs::remove_file(&path).ok();

        match outcome {
            ParseOutcome::Text(t) => assert_eq!(t, "scanned text"),
            _ => panic!("expected Text"),
        }
    }

    #[test]
    fn undecodable_bytes_are_a_failure() {
        let path = scratch_png("not-an-image.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let outcome = parse(&path, &FakeOcr::new("unused"), 3);
        std::fs::remove_file(&path).ok();

        assert!(matches!(outcome, ParseOutcome::Failed(_)));
    }
}
