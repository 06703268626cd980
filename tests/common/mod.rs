//! Synthetic PDF fixtures for integration tests.
//!
//! Offsets are computed while the file is assembled, so every fixture has a
//! correct cross-reference section unless a test breaks it on purpose.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_minimizer::object::{Object, ObjectRef};
use pdf_minimizer::page_tree::flatten_pages;
use pdf_minimizer::PdfDocument;
use std::collections::BTreeMap;
use std::io::Write;

/// Builds a PDF from numbered object bodies. Object 1 is the root.
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    version: String,
    objects: BTreeMap<u32, Vec<u8>>,
    trailer_extra: String,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.4".to_string(),
            objects: BTreeMap::new(),
            trailer_extra: String::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Add an object given as PDF source text.
    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.objects.insert(id, body.as_bytes().to_vec());
        self
    }

    /// Add a stream object with an inline `/Length`.
    pub fn stream(mut self, id: u32, dict_entries: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict_entries, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.insert(id, body);
        self
    }

    /// Extra trailer entries, e.g. `/Info 9 0 R`.
    pub fn trailer(mut self, extra: &str) -> Self {
        self.trailer_extra = extra.to_string();
        self
    }

    fn header(&self) -> Vec<u8> {
        let mut pdf = format!("%PDF-{}\n", self.version).into_bytes();
        pdf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        pdf
    }

    fn max_id(&self) -> u32 {
        self.objects.keys().next_back().copied().unwrap_or(0)
    }

    /// Classic `xref` table layout.
    pub fn build(&self) -> Vec<u8> {
        let mut pdf = self.header();
        let mut offsets = BTreeMap::new();
        for (id, body) in &self.objects {
            offsets.insert(*id, pdf.len());
            write_object(&mut pdf, *id, body);
        }

        let size = self.max_id() + 1;
        let xref = pdf.len();
        writeln!(pdf, "xref\n0 {}", size).unwrap();
        for id in 0..size {
            match offsets.get(&id) {
                Some(off) => writeln!(pdf, "{:010} 00000 n ", off).unwrap(),
                None => writeln!(pdf, "0000000000 65535 f ").unwrap(),
            }
        }
        write!(
            pdf,
            "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
            size, self.trailer_extra, xref
        )
        .unwrap();
        pdf
    }

    /// Cross-reference stream layout. Objects named in `compressed` are
    /// packed into one FlateDecode object stream; the rest stay top-level.
    pub fn build_with_object_stream(&self, compressed: &[u32]) -> Vec<u8> {
        let mut pdf = self.header();
        let objstm_id = self.max_id() + 1;
        let xref_id = objstm_id + 1;

        // (type, field2, field3) per object number
        let mut entries: BTreeMap<u32, (u8, u32, u16)> = BTreeMap::new();
        for (id, body) in &self.objects {
            if compressed.contains(id) {
                continue;
            }
            entries.insert(*id, (1, pdf.len() as u32, 0));
            write_object(&mut pdf, *id, body);
        }

        let mut header = String::new();
        let mut payload = Vec::new();
        for (index, id) in compressed.iter().enumerate() {
            header.push_str(&format!("{} {} ", id, payload.len()));
            payload.extend_from_slice(&self.objects[id]);
            payload.push(b'\n');
            entries.insert(*id, (2, objstm_id, index as u16));
        }
        let mut decoded = header.clone().into_bytes();
        decoded.extend_from_slice(&payload);
        let packed = deflate(&decoded);

        entries.insert(objstm_id, (1, pdf.len() as u32, 0));
        let mut body = format!(
            "<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            compressed.len(),
            header.len(),
            packed.len()
        )
        .into_bytes();
        body.extend_from_slice(&packed);
        body.extend_from_slice(b"\nendstream");
        write_object(&mut pdf, objstm_id, &body);

        let xref_offset = pdf.len();
        entries.insert(xref_id, (1, xref_offset as u32, 0));
        let mut rows = Vec::new();
        for id in 0..=xref_id {
            let (kind, f2, f3) = entries.get(&id).copied().unwrap_or((0, 0, 0));
            rows.push(kind);
            rows.extend_from_slice(&f2.to_be_bytes());
            rows.extend_from_slice(&f3.to_be_bytes());
        }
        let rows = deflate(&rows);
        let mut body = format!(
            "<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R {} /Filter /FlateDecode /Length {} >>\nstream\n",
            xref_id + 1,
            self.trailer_extra,
            rows.len()
        )
        .into_bytes();
        body.extend_from_slice(&rows);
        body.extend_from_slice(b"\nendstream");
        write_object(&mut pdf, xref_id, &body);

        write!(pdf, "startxref\n{}\n%%EOF\n", xref_offset).unwrap();
        pdf
    }
}

fn write_object(pdf: &mut Vec<u8>, id: u32, body: &[u8]) {
    writeln!(pdf, "{} 0 obj", id).unwrap();
    pdf.extend_from_slice(body);
    pdf.extend_from_slice(b"\nendobj\n");
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Append an incremental update replacing or adding `objects`.
pub fn append_update(mut base: Vec<u8>, objects: &[(u32, &str)]) -> Vec<u8> {
    let prev = last_startxref(&base);
    let previous = previous_size(&base);
    let mut offsets = Vec::new();
    for (id, body) in objects {
        offsets.push((*id, base.len()));
        write_object(&mut base, *id, body.as_bytes());
    }
    let size = objects.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;
    let size = size.max(previous);

    let xref = base.len();
    writeln!(base, "xref").unwrap();
    for (id, off) in &offsets {
        writeln!(base, "{} 1\n{:010} 00000 n ", id, off).unwrap();
    }
    write!(
        base,
        "trailer\n<< /Size {} /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
        size, prev, xref
    )
    .unwrap();
    base
}

fn last_startxref(pdf: &[u8]) -> usize {
    let text = String::from_utf8_lossy(pdf);
    let at = text.rfind("startxref").unwrap();
    text[at + 9..].split_whitespace().next().unwrap().parse().unwrap()
}

fn previous_size(pdf: &[u8]) -> u32 {
    let text = String::from_utf8_lossy(pdf);
    let at = text.rfind("/Size ").unwrap();
    text[at + 6..].split_whitespace().next().unwrap().parse().unwrap()
}

/// Catalog + flat Pages node for `n` pages numbered from `first_page`.
/// Pages get `/MediaBox`, shared `/Resources` object `res` and content
/// `first_page + n + i`.
pub fn flat_document(n: u32, res_body: &str) -> PdfBuilder {
    let first_page = 10;
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", first_page + i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, &format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), n))
        .object(3, res_body);
    for i in 0..n {
        let page = first_page + i;
        let content = first_page + n + i;
        builder = builder
            .object(
                page,
                &format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} 792] /Resources 3 0 R /Contents {} 0 R >>",
                    600 + i,
                    content
                ),
            )
            .stream(content, "", format!("BT /F1 12 Tf (page {}) Tj ET", i + 1).as_bytes());
    }
    builder
}

/// A parsed output document's pages, resolved, in order.
pub fn pages_of(pdf: &[u8]) -> (PdfDocument, Vec<(ObjectRef, Object)>) {
    let mut doc = PdfDocument::from_bytes(pdf.to_vec()).unwrap();
    let catalog = doc.catalog().unwrap();
    let entries = flatten_pages(&mut doc, &catalog, 64).unwrap();
    let pages = entries
        .into_iter()
        .map(|e| {
            let page = doc.load_object(e.reference).unwrap();
            (e.reference, page)
        })
        .collect();
    (doc, pages)
}

/// Content stream payloads of each page.
pub fn contents_of(pdf: &[u8]) -> Vec<Vec<u8>> {
    let (mut doc, pages) = pages_of(pdf);
    pages
        .iter()
        .map(|(_, page)| {
            let contents = page.as_dict().unwrap()["Contents"].as_reference().unwrap();
            doc.load_object(contents).unwrap().stream_data().unwrap().to_vec()
        })
        .collect()
}

/// `/MediaBox` of a page as numbers.
pub fn media_box(page: &Object) -> Vec<f64> {
    page.as_dict().unwrap()["MediaBox"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_number().unwrap())
        .collect()
}
