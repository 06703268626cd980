//! The minimization driver.
//!
//! Parse the source, copy the selected pages (and only what they reach) into
//! an empty [`ObjectStore`], give them a fresh single-level page tree, and
//! serialize. Objects no page reaches, such as stale revisions, unused
//! resources and orphaned metadata, are never copied and so never written.
//!
//! The output is not guaranteed to be smaller: a document with nothing
//! unreachable comes out about the same size.

use crate::config::MinimizeOptions;
use crate::copier::PageCopier;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::page_tree::{flatten_pages, PageEntry};
use crate::store::ObjectStore;
use crate::writer::{PdfWriter, PdfWriterConfig, MIN_VERSION};
use bytes::Bytes;
use serde::Serialize;

/// Statistics of one minimization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MinimizeReport {
    /// Pages written.
    pub page_count: usize,
    /// Live objects in the source cross-reference data.
    pub source_objects: usize,
    /// Objects written.
    pub output_objects: usize,
    /// Input size.
    pub input_bytes: usize,
    /// Output size.
    pub output_bytes: usize,
    /// Dangling optional references dropped while copying.
    pub dropped_references: usize,
}

impl MinimizeReport {
    /// Bytes saved; negative when the output grew.
    pub fn bytes_saved(&self) -> i64 {
        self.input_bytes as i64 - self.output_bytes as i64
    }
}

/// Runs minimization with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Minimizer {
    options: MinimizeOptions,
}

impl Minimizer {
    /// Create a minimizer.
    pub fn new(options: MinimizeOptions) -> Self {
        Self { options }
    }

    /// Options in use.
    pub fn options(&self) -> &MinimizeOptions {
        &self.options
    }

    /// Minimize `input`, returning the new file and a report.
    ///
    /// Either a complete document is produced or an error is returned;
    /// there is no partial output.
    ///
    /// # Errors
    ///
    /// * [`Error::UnsupportedFeature`] for encrypted input.
    /// * [`Error::MalformedDocument`] for structural damage, a page
    ///   reference that is not a page, or a page index out of range.
    /// * [`Error::DanglingReference`] when a page's `/Resources` or
    ///   `/MediaBox` points nowhere.
    /// * [`Error::EmptyDocument`] when the page tree has no pages.
    pub fn run(&self, input: &[u8]) -> Result<(Vec<u8>, MinimizeReport)> {
        let mut doc = PdfDocument::from_bytes_with_options(Bytes::copy_from_slice(input), self.options.parser)?;
        let source_objects = doc.object_count();

        let catalog = doc.catalog()?;
        let pages = flatten_pages(&mut doc, &catalog, self.options.parser.max_nesting)?;
        if pages.is_empty() {
            return Err(Error::EmptyDocument);
        }
        let selected: Vec<PageEntry> = self
            .options
            .pages
            .resolve(pages.len())?
            .into_iter()
            .map(|i| pages[i].clone())
            .collect();

        let version = match self.options.version {
            Some(forced) => forced,
            None => doc.effective_version()?.max(MIN_VERSION),
        };
        let source_info = doc.trailer().info.filter(|_| self.options.keep_info);

        let mut dest = ObjectStore::new();
        let mut copier = PageCopier::new(&mut doc);
        let page_refs = copier.copy_page_entries(&mut dest, &selected)?;
        let info = match source_info {
            Some(info) => copier.copy_object(&mut dest, info)?,
            None => None,
        };
        let dropped_references = copier.dropped_references();

        let root = build_page_tree(&mut dest, &page_refs)?;
        dest.trailer_mut().root = Some(root);
        dest.trailer_mut().info = self.attach_info(&mut dest, info);

        let output = PdfWriter::with_config(PdfWriterConfig::default().with_version(version)).write(&dest)?;

        let report = MinimizeReport {
            page_count: page_refs.len(),
            source_objects,
            output_objects: dest.len(),
            input_bytes: input.len(),
            output_bytes: output.len(),
            dropped_references,
        };
        log::info!(
            "Minimized {} pages: {} -> {} objects, {} -> {} bytes",
            report.page_count,
            report.source_objects,
            report.output_objects,
            report.input_bytes,
            report.output_bytes
        );
        Ok((output, report))
    }

    /// Merge `/Producer` into the copied info dictionary, creating one if
    /// needed.
    fn attach_info(&self, dest: &mut ObjectStore, copied: Option<ObjectRef>) -> Option<ObjectRef> {
        let Some(producer) = &self.options.producer else {
            return copied;
        };
        let producer = Object::String(producer.as_bytes().to_vec());

        if let Some(info) = copied {
            if let Ok(Object::Dictionary(dict)) = dest.get_mut(info) {
                dict.insert("Producer".to_string(), producer);
                return Some(info);
            }
            log::warn!("Source /Info is not a dictionary, replacing it");
        }
        let mut dict = Dictionary::new();
        dict.insert("Producer".to_string(), producer);
        Some(dest.insert(Object::Dictionary(dict)))
    }
}

/// Give the copied pages a single `/Pages` parent and a catalog. Returns
/// the catalog reference.
fn build_page_tree(dest: &mut ObjectStore, page_refs: &[ObjectRef]) -> Result<ObjectRef> {
    let pages_ref = dest.insert(Object::Null);

    for page in page_refs {
        if let Some(dict) = dest.get_mut(*page)?.as_dict_mut() {
            dict.insert("Parent".to_string(), Object::Reference(pages_ref));
        }
    }

    let mut pages = Dictionary::new();
    pages.insert("Type".to_string(), Object::Name("Pages".to_string()));
    pages.insert(
        "Kids".to_string(),
        Object::Array(page_refs.iter().map(|r| Object::Reference(*r)).collect()),
    );
    pages.insert("Count".to_string(), Object::Integer(page_refs.len() as i64));
    dest.replace(pages_ref, Object::Dictionary(pages))?;

    let mut catalog = Dictionary::new();
    catalog.insert("Type".to_string(), Object::Name("Catalog".to_string()));
    catalog.insert("Pages".to_string(), Object::Reference(pages_ref));
    Ok(dest.insert(Object::Dictionary(catalog)))
}

/// Minimize a PDF with default options.
///
/// # Example
///
/// ```no_run
/// let input = std::fs::read("input.pdf")?;
/// let output = pdf_minimizer::minimize(&input)?;
/// std::fs::write("output.pdf", output)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn minimize(input: &[u8]) -> Result<Vec<u8>> {
    Minimizer::default().run(input).map(|(output, _)| output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(bodies: &[&str]) -> Vec<u8> {
        let mut pdf = b"%PDF-1.3\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
        for off in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
                bodies.len() + 1,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    fn two_pages() -> Vec<u8> {
        build(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] /Resources << >> >>",
            "<< /Type /Page /Parent 2 0 R >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] >>",
            "<< /Title (Orphaned title) >>",
            "(unreferenced)",
        ])
    }

    #[test]
    fn test_minimize_drops_unreachable() {
        let (output, report) = Minimizer::default().run(&two_pages()).unwrap();
        let text = String::from_utf8_lossy(&output);

        assert_eq!(report.page_count, 2);
        assert_eq!(report.source_objects, 6);
        // 2 pages, Pages, Catalog.
        assert_eq!(report.output_objects, 4);
        assert!(!text.contains("unreferenced"));
        assert!(!text.contains("Orphaned"));
        assert!(text.starts_with("%PDF-1.4"));
    }

    #[test]
    fn test_keep_info_and_producer() {
        let options = MinimizeOptions::new().with_keep_info(true).with_producer("tests");
        let (output, _) = Minimizer::new(options).run(&two_pages()).unwrap();
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("/Title (Orphaned title)"));
        assert!(text.contains("/Producer (tests)"));
        assert!(text.contains("/Info "));
    }

    #[test]
    fn test_producer_without_source_info() {
        let options = MinimizeOptions::new().with_producer("tests");
        let (output, report) = Minimizer::new(options).run(&two_pages()).unwrap();
        let text = String::from_utf8_lossy(&output);
        assert!(!text.contains("Orphaned"));
        assert!(text.contains("/Producer (tests)"));
        assert_eq!(report.output_objects, 5);
    }

    #[test]
    fn test_empty_document() {
        let pdf = build(&["<< /Type /Catalog /Pages 2 0 R >>", "<< /Type /Pages /Kids [] /Count 0 >>"]);
        assert!(matches!(minimize(&pdf), Err(Error::EmptyDocument)));
    }

    #[test]
    fn test_forced_version() {
        let options = MinimizeOptions::new().with_version(1, 6);
        let (output, _) = Minimizer::new(options).run(&two_pages()).unwrap();
        assert!(output.starts_with(b"%PDF-1.6"));
    }

    #[test]
    fn test_report_serializes() {
        let (_, report) = Minimizer::default().run(&two_pages()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["page_count"], 2);
        assert!(json.get("dropped_references").is_some());
    }
}
