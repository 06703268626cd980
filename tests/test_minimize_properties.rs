//! End-to-end properties of `minimize`.

mod common;

use common::{append_update, contents_of, flat_document, media_box, pages_of, PdfBuilder};
use pdf_minimizer::object::{Object, ObjectRef};
use pdf_minimizer::{minimize, Error, Minimizer, PdfDocument};

fn output_objects(pdf: &[u8]) -> Vec<(ObjectRef, Object)> {
    let store = PdfDocument::from_bytes(pdf.to_vec()).unwrap().into_store().unwrap();
    store.iter().map(|(r, o)| (r, o.clone())).collect()
}

fn count_subtype(pdf: &[u8], subtype: &str) -> usize {
    output_objects(pdf)
        .iter()
        .filter(|(_, o)| {
            o.as_dict()
                .and_then(|d| d.get("Subtype"))
                .and_then(|s| s.as_name())
                == Some(subtype)
        })
        .count()
}

#[test]
fn test_page_count_and_media_box_preserved() {
    let input = flat_document(3, "<< >>").build();
    let output = minimize(&input).unwrap();

    let (_, source_pages) = pages_of(&input);
    let (_, output_pages) = pages_of(&output);
    assert_eq!(output_pages.len(), 3);
    for (src, out) in source_pages.iter().zip(output_pages.iter()) {
        assert_eq!(media_box(&src.1), media_box(&out.1));
    }
    assert_eq!(media_box(&output_pages[2].1), vec![0.0, 0.0, 602.0, 792.0]);
}

#[test]
fn test_inherited_attributes_written_on_pages() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 300 400] /Rotate 90 \
             /Resources << /ProcSet [/PDF] >> >>",
        )
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [5 0 R] /Count 1 /MediaBox [0 0 50 60] >>")
        .object(4, "<< /Type /Page /Parent 2 0 R >>")
        .object(5, "<< /Type /Page /Parent 3 0 R /Rotate 0 >>")
        .build();
    let output = minimize(&input).unwrap();
    let (_, pages) = pages_of(&output);

    // Document order: the nested page comes first.
    assert_eq!(pages.len(), 2);
    assert_eq!(media_box(&pages[0].1), vec![0.0, 0.0, 50.0, 60.0]);
    assert_eq!(media_box(&pages[1].1), vec![0.0, 0.0, 300.0, 400.0]);

    let first = pages[0].1.as_dict().unwrap();
    let second = pages[1].1.as_dict().unwrap();
    assert_eq!(first.get("Rotate"), Some(&Object::Integer(0)));
    assert_eq!(second.get("Rotate"), Some(&Object::Integer(90)));
    assert!(first.contains_key("Resources"));
    assert!(second.contains_key("Resources"));
}

#[test]
fn test_second_pass_changes_nothing() {
    let input = flat_document(4, "<< /Font << /F1 << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> >> >>")
        .object(40, "(orphan)")
        .build();
    let once = minimize(&input).unwrap();
    let twice = minimize(&once).unwrap();

    assert_eq!(pages_of(&once).1.len(), pages_of(&twice).1.len());
    assert_eq!(contents_of(&once), contents_of(&twice));
    assert_eq!(output_objects(&once).len(), output_objects(&twice).len());
    assert_eq!(once, twice);
}

#[test]
fn test_shared_font_copied_once() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 5 0 R >> >> >>",
        )
        .object(
            4,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F9 5 0 R >> >> >>",
        )
        .object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman >>")
        .build();
    let output = minimize(&input).unwrap();

    assert_eq!(count_subtype(&output, "Type1"), 1);

    let (_, pages) = pages_of(&output);
    let font_of = |page: &Object, key: &str| {
        page.as_dict().unwrap()["Resources"].as_dict().unwrap()["Font"]
            .as_dict()
            .unwrap()[key]
            .as_reference()
            .unwrap()
    };
    assert_eq!(font_of(&pages[0].1, "F1"), font_of(&pages[1].1, "F9"));
}

#[test]
fn test_page_parent_cycle_terminates() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /Extra 3 0 R >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Resources << >> /Me 3 0 R /Annots [4 0 R] >>",
        )
        .object(4, "<< /Type /Annot /Subtype /Text /P 3 0 R /Popup 5 0 R >>")
        .object(5, "<< /Type /Annot /Subtype /Popup /Parent 4 0 R >>")
        .build();
    let output = minimize(&input).unwrap();
    let (_, pages) = pages_of(&output);

    assert_eq!(pages.len(), 1);
    let page = pages[0].1.as_dict().unwrap();
    assert_eq!(page["Me"].as_reference(), Some(pages[0].0));
    assert_eq!(count_subtype(&output, "Popup"), 1);
    assert_eq!(count_subtype(&output, "Text"), 1);
}

#[test]
fn test_dangling_optional_field_dropped() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Resources << >> /Annots 50 0 R >>")
        .build();
    let (output, report) = Minimizer::default().run(&input).unwrap();
    let (_, pages) = pages_of(&output);

    assert_eq!(pages.len(), 1);
    assert!(!pages[0].1.as_dict().unwrap().contains_key("Annots"));
    assert_eq!(report.dropped_references, 1);
}

#[test]
fn test_dangling_resources_fails() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Resources 50 0 R >>")
        .build();
    let err = minimize(&input).unwrap_err();
    assert!(matches!(err, Error::DanglingReference(r) if r == ObjectRef::new(50, 0)));
}

#[test]
fn test_dangling_inherited_media_box_fails() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox 60 0 R >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /Resources << >> >>")
        .build();
    assert!(matches!(minimize(&input), Err(Error::DanglingReference(_))));
}

#[test]
fn test_encrypted_rejected_before_parsing_objects() {
    // Object 3 is garbage; rejection must happen before anything reads it.
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page ((( >>")
        .object(4, "<< /Filter /Standard /V 2 /R 3 >>")
        .trailer("/Encrypt 4 0 R")
        .build();
    assert!(matches!(minimize(&input), Err(Error::UnsupportedFeature(_))));
}

#[test]
fn test_shared_image_example() {
    let input = flat_document(3, "<< /XObject << /Im1 4 0 R >> >>")
        .stream(4, "/Type /XObject /Subtype /Image /Width 2 /Height 1 /ColorSpace /DeviceGray /BitsPerComponent 8", b"\x00\xff")
        .build();
    let source_count = PdfDocument::from_bytes(input.clone()).unwrap().object_count();
    let output = minimize(&input).unwrap();

    assert_eq!(pages_of(&output).1.len(), 3);
    assert_eq!(count_subtype(&output, "Image"), 1);
    assert!(output_objects(&output).len() <= source_count);
}

#[test]
fn test_old_revision_and_orphans_dropped() {
    let base = flat_document(2, "<< >>").object(30, "(stale metadata)").build();
    let updated = append_update(base, &[(12, "<< /Length 9 >>\nstream\nnew page1\nendstream")]);

    let output = minimize(&updated).unwrap();
    let text = String::from_utf8_lossy(&output);

    assert_eq!(contents_of(&output)[0], b"new page1");
    assert!(!text.contains("(page 1)"));
    assert!(!text.contains("stale metadata"));
    assert!(output.len() < updated.len());
}

#[test]
fn test_garbage_is_malformed() {
    assert!(matches!(
        minimize(b"this is not a pdf at all"),
        Err(Error::MalformedDocument { .. })
    ));
    assert!(minimize(b"").is_err());
}

#[test]
fn test_object_with_wrong_header_is_malformed() {
    let mut input = flat_document(1, "<< >>").build();
    // Renumber the page's header without touching its xref entry.
    let at = input.windows(8).position(|w| w == b"10 0 obj").unwrap();
    input[at..at + 2].copy_from_slice(b"19");
    assert!(matches!(minimize(&input), Err(Error::MalformedDocument { .. })));
}

#[test]
fn test_fractional_media_box_kept_exactly() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612.1234567 792.0000049] /Resources << >> \
             /UserUnit 0.000001 >>",
        )
        .build();
    let output = minimize(&input).unwrap();
    let (_, pages) = pages_of(&output);

    assert_eq!(media_box(&pages[0].1), vec![0.0, 0.0, 612.1234567, 792.0000049]);
    assert_eq!(
        pages[0].1.as_dict().unwrap()["UserUnit"].as_number(),
        Some(0.000001)
    );
}

#[test]
fn test_prev_outside_file_is_malformed() {
    let input = flat_document(1, "<< >>").trailer("/Prev 999999").build();
    assert!(matches!(minimize(&input), Err(Error::MalformedDocument { .. })));
}

#[test]
fn test_overflowing_xref_subsection_is_malformed() {
    let mut input = flat_document(1, "<< >>").build();
    // The first subsection now starts at u32::MAX; the xref offset is unchanged.
    let at = input.windows(7).rposition(|w| w == b"xref\n0 ").unwrap() + 5;
    input.splice(at..at + 1, b"4294967295".iter().copied());
    assert!(matches!(minimize(&input), Err(Error::MalformedDocument { .. })));
}
