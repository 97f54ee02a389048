// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open and inspect existing PDF documents using the `lopdf`
// crate. Text extraction here feeds content fingerprinting, so it must be
// cheap: no rendering, no font shaping, just the text operators.

use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use sortierwerk_core::error::{Result, SortierwerkError};
use tracing::{debug, instrument, warn};

/// Reads and manipulates existing PDF files.
///
/// Wraps `lopdf::Document` and provides the operations the pipeline needs:
/// page counting and leading-page text extraction for fingerprinting, and
/// page-level merging for reassembling per-page render output.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::PdfError` if the file cannot be parsed as
    /// a PDF, including encrypted or truncated files.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();

        let document = Document::load(path_ref).map_err(|err| {
            SortierwerkError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            SortierwerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract the text of the first `max_pages` pages (or all of them,
    /// whichever is fewer) as a single string.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::PdfError` when the content streams cannot
    /// be decoded. Image-only pages decode successfully to empty text, which
    /// callers must treat as "no usable text", not as an error.
    #[instrument(skip(self), fields(max_pages))]
    pub fn text_of_first_pages(&self, max_pages: usize) -> Result<String> {
        let total = self.page_count();
        let limit = max_pages.min(total);
        // lopdf pages are keyed by 1-indexed page number.
        let pages: Vec<u32> = (1..=limit as u32).collect();

        let text = self.document.extract_text(&pages).map_err(|err| {
            SortierwerkError::PdfError(format!("text extraction failed: {}", err))
        })?;

        debug!(
            pages = limit,
            chars = text.len(),
            "Extracted leading-page text"
        );
        Ok(text)
    }

    // -- Merging --------------------------------------------------------------

    /// Merge this document with one or more other PDF byte-slices, producing
    /// a combined PDF. Pages appear in the order: self, then each supplied
    /// document in order.
    #[instrument(skip_all, fields(additional_count = others.len()))]
    pub fn merge(&self, others: &[&[u8]]) -> Result<Vec<u8>> {
        debug!(
            base_pages = self.page_count(),
            additional_documents = others.len(),
            "Merging PDFs"
        );

        let mut merged = self.document.clone();

        for (index, other_bytes) in others.iter().enumerate() {
            let other_doc = Document::load_mem(other_bytes).map_err(|err| {
                SortierwerkError::PdfError(format!(
                    "failed to load additional PDF #{}: {}",
                    index + 1,
                    err
                ))
            })?;

            let other_pages = other_doc.get_pages();
            let mut page_numbers: Vec<u32> = other_pages.keys().copied().collect();
            page_numbers.sort();

            for page_num in page_numbers {
                let page_id = other_pages[&page_num];
                clone_page_into(&other_doc, &mut merged, page_id)?;
            }
        }

        let mut output = Vec::new();
        merged.save_to(&mut output).map_err(|err| {
            SortierwerkError::PdfError(format!("failed to serialise merged PDF: {}", err))
        })?;

        debug!(output_bytes = output.len(), "Merge complete");
        Ok(output)
    }
}

// -- Page cloning helpers -----------------------------------------------------

/// Clone a single page object (and its referenced resources) from `source`
/// into `target`, appending it as the last page.
///
/// Stream data, fonts, and images referenced by the page dictionary are
/// copied as new objects in the target document.
fn clone_page_into(source: &Document, target: &mut Document, page_id: ObjectId) -> Result<()> {
    let page_object = source.get_object(page_id).map_err(|err| {
        SortierwerkError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
    })?;

    // Deep-clone the page object and all objects it transitively references.
    let cloned = deep_clone_object(source, target, page_object)?;
    let cloned_id = target.add_object(cloned);

    // Retrieve the document's page tree root (/Pages) and append the new page.
    let pages_id = target
        .catalog()
        .map_err(|err| SortierwerkError::PdfError(format!("no catalog: {}", err)))
        .and_then(|catalog| {
            catalog
                .get(b"Pages")
                .map_err(|err| SortierwerkError::PdfError(format!("no /Pages: {}", err)))
                .and_then(|pages_ref| match pages_ref {
                    Object::Reference(id) => Ok(*id),
                    _ => Err(SortierwerkError::PdfError(
                        "/Pages is not a reference".to_string(),
                    )),
                })
        })?;

    // Add page reference to the /Kids array.
    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        // Increment /Count.
        if let Ok(count_obj) = pages_dict.get_mut(b"Count")
            && let Object::Integer(count) = count_obj
        {
            *count += 1;
        }
    }

    // Set the cloned page's /Parent to point at the target's /Pages node.
    if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
        page_dict.set("Parent", Object::Reference(pages_id));
    }

    Ok(())
}

/// Deep-clone a single lopdf Object, recursively resolving references
/// (except /Parent which is deliberately skipped to avoid circular cloning).
fn deep_clone_object(source: &Document, target: &mut Document, object: &Object) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in dict.iter() {
                // Skip /Parent to avoid circular references; the caller patches it.
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = deep_clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(arr) => {
            let mut new_arr = Vec::with_capacity(arr.len());
            for item in arr {
                new_arr.push(deep_clone_object(source, target, item)?);
            }
            Ok(Object::Array(new_arr))
        }
        Object::Reference(ref_id) => {
            // Resolve the reference in the source, clone it, and return a new
            // reference in the target.
            match source.get_object(*ref_id) {
                Ok(referenced) => {
                    let cloned = deep_clone_object(source, target, referenced)?;
                    let new_id = target.add_object(cloned);
                    Ok(Object::Reference(new_id))
                }
                Err(err) => {
                    warn!(?ref_id, %err, "Cannot resolve reference, using Null");
                    Ok(Object::Null)
                }
            }
        }
        Object::Stream(stream) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = deep_clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Stream(lopdf::Stream::new(
                new_dict,
                stream.content.clone(),
            )))
        }
        // All other object types (Boolean, Integer, Real, String, Name, Null)
        // are trivially cloneable.
        other => Ok(other.clone()),
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::writer::image_to_pdf;

    fn one_page_pdf() -> Vec<u8> {
        let img = ::image::RgbImage::from_pixel(36, 36, ::image::Rgb([10u8, 20, 30]));
        let mut jpeg = Vec::new();
        let encoder = ::image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 85);
        img.write_with_encoder(encoder).expect("encode page image");
        image_to_pdf("page", &jpeg).expect("wrap page image")
    }

    #[test]
    fn reads_page_count_from_bytes() {
        let pdf = one_page_pdf();
        let reader = PdfReader::from_bytes(&pdf).expect("parse generated PDF");
        assert_eq!(reader.page_count(), 1);
        assert!(reader.source_path().is_none());
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        assert!(PdfReader::from_bytes(b"not a pdf at all").is_err());
    }

    #[test]
    fn merge_concatenates_pages_in_order() {
        let first = one_page_pdf();
        let second = one_page_pdf();
        let third = one_page_pdf();

        let base = PdfReader::from_bytes(&first).expect("parse base");
        let merged = base
            .merge(&[second.as_slice(), third.as_slice()])
            .expect("merge PDFs");

        let combined = PdfReader::from_bytes(&merged).expect("parse merged");
        assert_eq!(combined.page_count(), 3);
    }

    #[test]
    fn merge_with_no_additions_round_trips() {
        let only = one_page_pdf();
        let base = PdfReader::from_bytes(&only).expect("parse base");
        let merged = base.merge(&[]).expect("merge nothing");
        let round = PdfReader::from_bytes(&merged).expect("parse round trip");
        assert_eq!(round.page_count(), 1);
    }

    #[test]
    fn image_only_page_yields_empty_text() {
        let pdf = one_page_pdf();
        let reader = PdfReader::from_bytes(&pdf).expect("parse generated PDF");
        let text = reader.text_of_first_pages(3).expect("extract text");
        assert!(text.trim().is_empty());
    }
}

