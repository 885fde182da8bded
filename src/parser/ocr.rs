use image::DynamicImage;
use leptess::{LepTess, Variable};

use crate::parser::normalize_ocr_text;

/// Single-function OCR interface: `image → text`.
/// Treated as an injected interface so tests can substitute a fake that
/// returns a canned string instead of shelling out to Tesseract.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage, psm: u32) -> Result<String, String>;
}

/// Tesseract-backed OCR via `leptess`.
pub struct TesseractOcr;

impl TesseractOcr {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &DynamicImage, psm: u32) -> Result<String, String> {
        let rgb = image.to_rgb8();
        let mut png_bytes = Vec::new();
        image::DynamicImage::ImageRgb8(rgb)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| e.to_string())?;

        let mut lt = LepTess::new(None, "eng").map_err(|e| e.to_string())?;
        lt.set_variable(Variable::TesseditPagesegMode, &psm.to_string())
            .map_err(|e| e.to_string())?;
        lt.set_image_from_mem(&png_bytes).map_err(|e| e.to_string())?;

        let text = lt.get_utf8_text().map_err(|e| e.to_string())?;
        Ok(normalize_ocr_text(&text))
    }
}

/// Canned OCR result for tests, so parser tests never shell out to
/// Tesseract.
pub struct FakeOcr {
    canned: String,
}

impl FakeOcr {
    pub fn new(canned: &str) -> Self {
        Self { canned: canned.to_string() }
    }
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, _image: &DynamicImage, _psm: u32) -> Result<String, String> {
        Ok(normalize_ocr_text(&self.canned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_ocr_returns_canned_text() {
        let ocr = FakeOcr::new("MEETING 2024 BUDGET");
        let img = DynamicImage::new_rgb8(1, 1);
        assert_eq!(ocr.recognize(&img, 3).unwrap(), "MEETING 2024 BUDGET");
    }

    #[test]
    fn empty_ocr_result_is_not_an_error() {
        let ocr = FakeOcr::new("");
        let img = DynamicImage::new_rgb8(1, 1);
        assert_eq!(ocr.recognize(&img, 3).unwrap(), "");
    }
}
