// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content fingerprinting with tiered trust levels.
//
// A fingerprint is the manifest's dedup key.  PDFs are hashed over their
// extracted text where possible, so re-saved or re-compressed copies of the
// same document collapse into one duplicate group; everything else (and any
// PDF that resists text extraction) gets a whole-file binary digest.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use sortierwerk_core::types::{Fingerprint, HashVerdict, IngestMode, TrustTag};
use sortierwerk_document::PdfReader;

/// Read size for the chunked binary hash.
const HASH_CHUNK_SIZE: usize = 65536;

/// Pages sampled for the Standard smart hash.
const STANDARD_SAMPLE_PAGES: usize = 3;

/// Minimum stripped text length before a smart hash is trusted.
const SMART_TEXT_THRESHOLD: usize = 10;

/// Fingerprint one file.
///
/// Total over its input: a file that cannot be hashed comes back as a
/// [`HashVerdict::Quarantined`] with an operator-readable reason, never an
/// error. Zero-byte files quarantine under every mode; a PDF that parses but
/// has no pages quarantines under Standard/Deep; unreadable files quarantine
/// with a truncated "Read-Error".
pub fn fingerprint(path: &Path, mode: IngestMode) -> HashVerdict {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) => return read_error(&err),
    };
    if size == 0 {
        return HashVerdict::Quarantined {
            reason: "Zero-Byte File".into(),
        };
    }

    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf && mode != IngestMode::Lightning {
        match smart_pdf_hash(path, mode) {
            SmartOutcome::Hashed(fingerprint) => return HashVerdict::Hashed(fingerprint),
            SmartOutcome::Quarantine(reason) => return HashVerdict::Quarantined { reason },
            SmartOutcome::Fallback => {}
        }
    }

    match binary_digest(path) {
        Ok(digest) => HashVerdict::Hashed(Fingerprint {
            digest,
            trust: TrustTag::Binary,
        }),
        Err(err) => read_error(&err),
    }
}

enum SmartOutcome {
    Hashed(Fingerprint),
    Quarantine(String),
    Fallback,
}

/// Text-hash a PDF: digest of extracted page text plus page count.
///
/// Any parse or extraction failure falls back to binary hashing rather than
/// quarantining; only a well-formed PDF with zero pages is rejected outright.
fn smart_pdf_hash(path: &Path, mode: IngestMode) -> SmartOutcome {
    let reader = match PdfReader::open(path) {
        Ok(reader) => reader,
        Err(err) => {
            debug!(path = %path.display(), %err, "PDF parse failed, using binary hash");
            return SmartOutcome::Fallback;
        }
    };

    let page_count = reader.page_count();
    if page_count == 0 {
        return SmartOutcome::Quarantine("PDF has 0 Pages".into());
    }

    let (sample, trust) = match mode {
        IngestMode::Standard => (STANDARD_SAMPLE_PAGES.min(page_count), TrustTag::SmartStandard),
        IngestMode::Deep => (page_count, TrustTag::SmartDeep),
        IngestMode::Lightning => return SmartOutcome::Fallback,
    };

    let text = match reader.text_of_first_pages(sample) {
        Ok(text) => text,
        Err(err) => {
            debug!(path = %path.display(), %err, "text extraction failed, using binary hash");
            return SmartOutcome::Fallback;
        }
    };
    if text.trim().chars().count() <= SMART_TEXT_THRESHOLD {
        return SmartOutcome::Fallback;
    }

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(page_count.to_string().as_bytes());
    SmartOutcome::Hashed(Fingerprint {
        digest: hex::encode(hasher.finalize()),
        trust,
    })
}

/// Whole-file SHA-256 over fixed-size read chunks, hex-encoded.
fn binary_digest(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// Reasons land in filenames and CSV cells, so keep them short.
fn read_error(err: &std::io::Error) -> HashVerdict {
    let brief: String = err.to_string().chars().take(20).collect();
    HashVerdict::Quarantined {
        reason: format!("Read-Error: {brief}"),
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build a one-page PDF with extractable text. `variant` adds an unused
    /// object so two builds of the same text differ at the byte level.
    fn text_pdf(text: &str, variant: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content stream"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        if variant {
            doc.add_object(dictionary! { "Fixture" => "variant" });
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize PDF");
        bytes
    }

    /// A structurally valid PDF whose page tree is empty.
    fn zero_page_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize PDF");
        bytes
    }

    fn write(dir: &std::path::Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("write fixture");
        path
    }

    fn digest_of(verdict: HashVerdict) -> Fingerprint {
        match verdict {
            HashVerdict::Hashed(fp) => fp,
            HashVerdict::Quarantined { reason } => panic!("unexpected quarantine: {reason}"),
        }
    }

    #[test]
    fn zero_byte_file_quarantines_in_every_mode() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(dir.path(), "empty.pdf", b"");
        for mode in [IngestMode::Lightning, IngestMode::Standard, IngestMode::Deep] {
            match fingerprint(&path, mode) {
                HashVerdict::Quarantined { reason } => assert_eq!(reason, "Zero-Byte File"),
                HashVerdict::Hashed(_) => panic!("zero-byte file hashed under {mode}"),
            }
        }
    }

    #[test]
    fn missing_file_reports_truncated_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gone.pdf");
        match fingerprint(&path, IngestMode::Standard) {
            HashVerdict::Quarantined { reason } => {
                assert!(reason.starts_with("Read-Error: "), "got: {reason}");
                assert!(reason.len() <= "Read-Error: ".len() + 20);
            }
            HashVerdict::Hashed(_) => panic!("missing file produced a hash"),
        }
    }

    #[test]
    fn unparsable_pdf_falls_back_to_binary() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(dir.path(), "junk.pdf", b"this is not a pdf at all");
        let fp = digest_of(fingerprint(&path, IngestMode::Standard));
        assert_eq!(fp.trust, TrustTag::Binary);

        let copy = write(dir.path(), "junk_copy.pdf", b"this is not a pdf at all");
        let fp2 = digest_of(fingerprint(&copy, IngestMode::Standard));
        assert_eq!(fp.digest, fp2.digest);
    }

    #[test]
    fn zero_page_pdf_quarantines_under_smart_modes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(dir.path(), "hollow.pdf", &zero_page_pdf());
        match fingerprint(&path, IngestMode::Standard) {
            HashVerdict::Quarantined { reason } => assert_eq!(reason, "PDF has 0 Pages"),
            HashVerdict::Hashed(_) => panic!("zero-page PDF produced a hash"),
        }
    }

    #[test]
    fn text_identical_pdfs_share_a_smart_hash() {
        let dir = tempfile::tempdir().expect("temp dir");
        let a = write(dir.path(), "a.pdf", &text_pdf("Quarterly report for review", false));
        let b = write(dir.path(), "b.pdf", &text_pdf("Quarterly report for review", true));
        assert_ne!(
            std::fs::read(&a).expect("read a"),
            std::fs::read(&b).expect("read b"),
            "fixtures must differ at the byte level"
        );

        let fp_a = digest_of(fingerprint(&a, IngestMode::Standard));
        let fp_b = digest_of(fingerprint(&b, IngestMode::Standard));
        assert_eq!(fp_a.trust, TrustTag::SmartStandard);
        assert_eq!(fp_a.digest, fp_b.digest);
    }

    #[test]
    fn deep_mode_tags_smart_deep() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(dir.path(), "deep.pdf", &text_pdf("Deep mode extraction sample", false));
        let fp = digest_of(fingerprint(&path, IngestMode::Deep));
        assert_eq!(fp.trust, TrustTag::SmartDeep);
    }

    #[test]
    fn short_text_falls_back_to_binary() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(dir.path(), "terse.pdf", &text_pdf("hi", false));
        let fp = digest_of(fingerprint(&path, IngestMode::Standard));
        assert_eq!(fp.trust, TrustTag::Binary);
    }

    #[test]
    fn lightning_never_parses_pdfs() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(
            dir.path(),
            "light.pdf",
            &text_pdf("Lightning mode should skip this text", false),
        );
        let fp = digest_of(fingerprint(&path, IngestMode::Lightning));
        assert_eq!(fp.trust, TrustTag::Binary);
    }

    #[test]
    fn non_pdf_files_hash_binary_regardless_of_mode() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(dir.path(), "photo.jpg", &[0xFFu8, 0xD8, 0xFF, 0xE0, 1, 2, 3]);
        let standard = digest_of(fingerprint(&path, IngestMode::Standard));
        let deep = digest_of(fingerprint(&path, IngestMode::Deep));
        assert_eq!(standard.trust, TrustTag::Binary);
        assert_eq!(standard.digest, deep.digest);
    }
}
