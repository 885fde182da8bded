use std::path::Path;

use oxidize_pdf::parser::{PdfDocument, PdfReader};

use crate::parser::ocr::OcrEngine;
use crate::parser::ParseOutcome;

/// PDFs: per-page text-layer extraction, OCR fallback for pages whose text
/// layer is empty (image-only pages). The fallback OCRs the image XObjects
/// already embedded on the page rather than rasterizing the full page at a
/// controlled resolution, since the page's embedded images are already the
/// scan; a page without a text layer and without an image XObject yields no
/// text for that page. Pages are independent: a failure on one page does not
/// fail the whole document.
pub fn parse<O: OcrEngine>(path: &Path, ocr: &O, ocr_psm: u32) -> ParseOutcome {
    let reader = match PdfReader::open(path) {
        Ok(r) => r,
        Err(e) => return ParseOutcome::Failed(e.to_string()),
    };
    let document = PdfDocument::new(reader);

    let pages = match document.extract_text() {
        Ok(pages) => pages,
        Err(e) => return ParseOutcome::Failed(e.to_string()),
    };

    let fallback_images = extract_page_images(path);

    let mut page_texts = Vec::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        let text = page.text.trim();
        if !text.is_empty() {
            page_texts.push(text.to_string());
            continue;
        }

        let ocr_text = fallback_images
            .get(index)
            .and_then(|images| ocr_page_images(images, ocr, ocr_psm));
        page_texts.push(ocr_text.unwrap_or_default());
    }

    ParseOutcome::Text(page_texts.join("\n"))
}

/// Runs every rasterized image on a page through OCR and concatenates the
/// results; a page can carry more than one image XObject.
fn ocr_page_images<O: OcrEngine>(images: &[Vec<u8>], ocr: &O, psm: u32) -> Option<String> {
    let mut texts = Vec::new();
    for bytes in images {
        if let Ok(decoded) = image::load_from_memory(bytes) {
            if let Ok(text) = ocr.recognize(&decoded, psm) {
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        }
    }
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

/// Pulls raw image XObject data out of each page via `lopdf`, for pages
/// whose text layer came back empty. Returns one entry per page, in order,
/// each holding the raw bytes of every image XObject referenced by that
/// page (still encoded, e.g. as JPEG for DCTDecode streams).
fn extract_page_images(path: &Path) -> Vec<Vec<Vec<u8>>> {
    let document = match lopdf::Document::load(path) {
        Ok(doc) => doc,
        Err(_) => return Vec::new(),
    };

    document
        .get_pages()
        .values()
        .map(|page_id| page_image_streams(&document, *page_id))
        .collect()
}

fn page_image_streams(document: &lopdf::Document, page_id: (u32, u16)) -> Vec<Vec<u8>> {
    let resources = match document.get_page_resources(page_id) {
        (Some(dict), _) => dict.clone(),
        _ => return Vec::new(),
    };

    let xobjects = match resources.get(b"XObject").and_then(|o| o.as_dict()) {
        Ok(dict) => dict.clone(),
        Err(_) => return Vec::new(),
    };

    let mut streams = Vec::new();
    for (_, object_ref) in xobjects.iter() {
        let object_id = match object_ref.as_reference() {
            Ok(id) => id,
            Err(_) => continue,
        };
        let object = match document.get_object(object_id) {
            Ok(obj) => obj,
            Err(_) => continue,
        };
        let stream = match object.as_stream() {
            Ok(s) => s,
            Err(_) => continue,
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .map(|name| name == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        if let Ok(bytes) = stream.decompressed_content() {
            streams.push(bytes);
        }
    }
    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ocr::FakeOcr;

    #[test]
    fn missing_file_is_a_failure() {
        let path = Path::new("/tmp/lucidfiles-does-not-exist.pdf");
        let outcome = parse(path, &FakeOcr::new("unused"), 3);
        assert!(matches!(outcome, ParseOutcome::Failed(_)));
    }
}
