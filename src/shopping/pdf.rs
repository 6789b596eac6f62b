//! Minimal PDF 1.4 writer for text-only reports.
//!
//! Uses the standard Courier fonts, so no font program is embedded. Text is
//! encoded as WinAnsi; characters outside it are replaced with `?`.

use std::borrow::Cow;
use std::io::{self, Write};

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 56;
const TITLE_SIZE: u32 = 16;
const BODY_SIZE: u32 = 11;
const FOOTER_SIZE: u32 = 9;
const LINE_HEIGHT: u32 = 16;
/// Vertical space the title takes on the first page, including the gap below it.
const TITLE_BLOCK: u32 = 2 * LINE_HEIGHT;
/// Courier glyphs are 0.6 em wide; this many body glyphs fit between the margins.
const MAX_ROW_CHARS: usize = ((PAGE_WIDTH - 2 * MARGIN) * 10 / (6 * BODY_SIZE)) as usize;

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const FONT_ID: usize = 3;
const BOLD_FONT_ID: usize = 4;
const FIRST_PAGE_ID: usize = 5;

/// Rows that fit on one page, the first page losing room to the title.
fn rows_per_page(first: bool) -> usize {
    // bottom margin keeps two lines free for the footer
    let usable = PAGE_HEIGHT - 2 * MARGIN - 2 * LINE_HEIGHT;
    let usable = if first { usable - TITLE_BLOCK } else { usable };
    (usable / LINE_HEIGHT) as usize
}

/// Splits rows into pages. Always yields at least one (possibly empty) page.
pub(crate) fn paginate<T>(rows: &[T]) -> Vec<&[T]> {
    let mut pages = Vec::new();
    let mut rest = rows;
    let mut capacity = rows_per_page(true);
    loop {
        let take = capacity.min(rest.len());
        let (page, tail) = rest.split_at(take);
        pages.push(page);
        rest = tail;
        if rest.is_empty() {
            break;
        }
        capacity = rows_per_page(false);
    }
    pages
}

/// Renders `title` and `rows` into a complete PDF file.
pub fn render_document(title: &str, rows: &[String]) -> io::Result<Vec<u8>> {
    let pages = paginate(rows);
    let page_count = pages.len();
    let mut pdf = PdfWriter::new(FIRST_PAGE_ID - 1 + 2 * page_count);

    pdf.buf.write_all(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n")?;

    pdf.begin_object(CATALOG_ID)?;
    write!(pdf.buf, "<< /Type /Catalog /Pages {PAGES_ID} 0 R >>\n")?;
    pdf.end_object()?;

    pdf.begin_object(PAGES_ID)?;
    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", page_object_id(i)))
        .collect();
    write!(
        pdf.buf,
        "<< /Type /Pages /Kids [{}] /Count {page_count} >>\n",
        kids.join(" ")
    )?;
    pdf.end_object()?;

    for (id, base_font) in [(FONT_ID, "Courier"), (BOLD_FONT_ID, "Courier-Bold")] {
        pdf.begin_object(id)?;
        write!(
            pdf.buf,
            "<< /Type /Font /Subtype /Type1 /BaseFont /{base_font} /Encoding /WinAnsiEncoding >>\n"
        )?;
        pdf.end_object()?;
    }

    for (index, page_rows) in pages.iter().enumerate() {
        let content = page_content(title, page_rows, index, page_count)?;

        pdf.begin_object(page_object_id(index))?;
        write!(
            pdf.buf,
            "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 {FONT_ID} 0 R /F2 {BOLD_FONT_ID} 0 R >> >> \
             /Contents {} 0 R >>\n",
            page_object_id(index) + 1
        )?;
        pdf.end_object()?;

        pdf.begin_object(page_object_id(index) + 1)?;
        write!(pdf.buf, "<< /Length {} >>\nstream\n", content.len())?;
        pdf.buf.write_all(&content)?;
        pdf.buf.write_all(b"\nendstream\n")?;
        pdf.end_object()?;
    }

    pdf.finish(CATALOG_ID)
}

fn page_object_id(index: usize) -> usize {
    FIRST_PAGE_ID + 2 * index
}

fn page_content(
    title: &str,
    rows: &[String],
    index: usize,
    page_count: usize,
) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    if index == 0 {
        text_op(&mut out, "F2", TITLE_SIZE, MARGIN, y, title)?;
        y -= TITLE_BLOCK;
    }
    for row in rows {
        text_op(&mut out, "F1", BODY_SIZE, MARGIN, y, &fit_row(row))?;
        y -= LINE_HEIGHT;
    }

    let footer = format!("Page {} of {}", index + 1, page_count);
    text_op(&mut out, "F1", FOOTER_SIZE, MARGIN, MARGIN - LINE_HEIGHT, &footer)?;
    Ok(out)
}

fn text_op(out: &mut Vec<u8>, font: &str, size: u32, x: u32, y: u32, text: &str) -> io::Result<()> {
    write!(out, "BT /{font} {size} Tf {x} {y} Td (")?;
    out.extend(escape_text(text));
    out.write_all(b") Tj ET\n")
}

/// Cuts rows wider than the text column, marking the cut with an ellipsis.
fn fit_row(row: &str) -> Cow<'_, str> {
    if row.chars().count() <= MAX_ROW_CHARS {
        return Cow::Borrowed(row);
    }
    let mut cut: String = row.chars().take(MAX_ROW_CHARS - 1).collect();
    cut.push('\u{2026}');
    Cow::Owned(cut)
}

/// Encodes `text` as a WinAnsi PDF string literal body.
pub(crate) fn escape_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            '\n' | '\r' | '\t' => out.push(b' '),
            '\u{2026}' => out.push(0x85),
            '\u{2014}' => out.push(0x97),
            '\u{2013}' => out.push(0x96),
            ' '..='~' | '\u{A0}'..='\u{FF}' => out.push(ch as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

/// Tracks object byte offsets for the cross-reference table.
struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new(object_count: usize) -> Self {
        Self {
            buf: Vec::new(),
            offsets: vec![0; object_count],
        }
    }

    fn begin_object(&mut self, id: usize) -> io::Result<()> {
        self.offsets[id - 1] = self.buf.len();
        write!(self.buf, "{id} 0 obj\n")
    }

    fn end_object(&mut self) -> io::Result<()> {
        self.buf.write_all(b"endobj\n")
    }

    fn finish(mut self, root: usize) -> io::Result<Vec<u8>> {
        let xref_at = self.buf.len();
        let size = self.offsets.len() + 1;
        write!(self.buf, "xref\n0 {size}\n0000000000 65535 f \n")?;
        for offset in &self.offsets {
            write!(self.buf, "{offset:010} 00000 n \n")?;
        }
        write!(
            self.buf,
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        )?;
        Ok(self.buf)
    }
}
