// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF assembly — build page-image PDFs from rendered or scanned pages using
// `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, TextRenderingMode, XObjectTransform,
};
use sortierwerk_core::error::{Result, SortierwerkError};
use tracing::{debug, info, instrument};

/// Millimetres per inch, for page sizing from pixel dimensions.
const MM_PER_INCH: f32 = 25.4;

/// Font size of the invisible OCR text layer, in points.
const TEXT_LAYER_FONT_PT: f32 = 10.0;

/// Builds a PDF where every page is a single full-bleed raster image,
/// optionally carrying an invisible text layer for searchability.
///
/// Pages are sized from the image pixel dimensions at the assembler's DPI,
/// so a page rendered at 300 DPI reproduces its original physical size.
pub struct PdfAssembler {
    document: PdfDocument,
    pages: Vec<PdfPage>,
    dpi: u32,
}

impl PdfAssembler {
    /// Create an assembler producing pages at the given render DPI.
    pub fn new(title: impl AsRef<str>, dpi: u32) -> Self {
        Self {
            document: PdfDocument::new(title.as_ref()),
            pages: Vec::new(),
            dpi,
        }
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    // -- Page construction ----------------------------------------------------

    /// Append a page consisting of the given encoded image (JPEG, PNG, ...)
    /// placed edge to edge.
    #[instrument(skip_all, fields(bytes_len = image_bytes.len()))]
    pub fn add_image_page(&mut self, image_bytes: &[u8]) -> Result<()> {
        self.add_page(image_bytes, &[])
    }

    /// Append a full-bleed image page with an invisible text layer.
    ///
    /// The recognised lines are distributed top to bottom over the page
    /// height in invisible render mode, which makes the page searchable and
    /// copyable without altering its appearance. Placement is approximate;
    /// the visual truth stays in the image.
    #[instrument(skip_all, fields(bytes_len = image_bytes.len(), lines = text_lines.len()))]
    pub fn add_searchable_page(&mut self, image_bytes: &[u8], text_lines: &[String]) -> Result<()> {
        self.add_page(image_bytes, text_lines)
    }

    fn add_page(&mut self, image_bytes: &[u8], text_lines: &[String]) -> Result<()> {
        // Decode to get dimensions and pixel data.
        let dynamic_image = ::image::load_from_memory(image_bytes).map_err(|err| {
            SortierwerkError::ImageError(format!("failed to decode page image: {}", err))
        })?;

        let img_width = dynamic_image.width() as usize;
        let img_height = dynamic_image.height() as usize;

        // Convert to RGB8 for printpdf.
        let rgb_image = dynamic_image.to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: img_width,
            height: img_height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let xobject_id = self.document.add_image(&raw);

        // Page size: image pixels at the assembler DPI.
        let dpi = self.dpi as f32;
        let page_w = Mm(img_width as f32 * MM_PER_INCH / dpi);
        let page_h = Mm(img_height as f32 * MM_PER_INCH / dpi);

        let mut ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some(1.0),
                scale_y: Some(1.0),
                dpi: Some(dpi),
                rotate: None,
            },
        }];

        if !text_lines.is_empty() {
            let page_h_pt = img_height as f32 / dpi * 72.0;
            let line_step = page_h_pt / (text_lines.len() + 1) as f32;

            for (index, line) in text_lines.iter().enumerate() {
                let y_pt = page_h_pt - (index + 1) as f32 * line_step;

                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextRenderingMode {
                    mode: TextRenderingMode::Invisible,
                });
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(0.0),
                        y: Pt(y_pt),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(TEXT_LAYER_FONT_PT),
                    font: BuiltinFont::Helvetica,
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(line.clone())],
                    font: BuiltinFont::Helvetica,
                });
                ops.push(Op::EndTextSection);
            }
        }

        self.pages.push(PdfPage::new(page_w, page_h, ops));

        debug!(
            img_width,
            img_height,
            page = self.pages.len(),
            "Page appended"
        );
        Ok(())
    }

    // -- Output ---------------------------------------------------------------

    /// Serialise the assembled document.
    pub fn finish(mut self) -> Vec<u8> {
        let page_count = self.pages.len();
        self.document.with_pages(self.pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = self.document.save(&PdfSaveOptions::default(), &mut warnings);

        debug!(
            page_count,
            warnings = warnings.len(),
            output_bytes = output.len(),
            "PDF assembled"
        );
        output
    }

    /// Serialise the assembled document and write it to a file.
    pub fn write_to_file(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.finish();
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote assembled PDF to {}", path.as_ref().display());
        Ok(())
    }
}

/// Wrap a single encoded image into a one-page PDF at its native size.
///
/// Pages are sized at 72 DPI, so one image pixel maps to one PDF point.
/// Used to turn standalone photos and scans into distributable PDFs.
#[instrument(skip_all, fields(bytes_len = image_bytes.len()))]
pub fn image_to_pdf(title: impl AsRef<str>, image_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut assembler = PdfAssembler::new(title, 72);
    assembler.add_image_page(image_bytes)?;
    Ok(assembler.finish())
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
