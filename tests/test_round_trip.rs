//! Documents produced by the writer, read back and merged.

use chrono::{TimeZone, Utc};
use pdf_forge::document::PdfReader;
use pdf_forge::object::Token;
use pdf_forge::parser_config::ReaderOptions;
use pdf_forge::writer::{Page, PdfWriter, RelocationWriter, WriterConfig};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const FIRST: &str = "BT /F1 24 Tf 72 700 Td (First page) Tj ET";
const SECOND: &str = "BT /F1 24 Tf 72 700 Td (Second page) Tj ET";

fn two_page_document(compress: bool) -> Vec<u8> {
    let config = WriterConfig::default()
        .with_title("Round trip")
        .with_compress(compress)
        .with_creation_date(Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap());
    let mut writer = PdfWriter::new(config);
    let font = writer.add_font("Helvetica").unwrap();
    assert_eq!(font, "F1");
    writer.add_page(Page::letter().with_content(FIRST)).unwrap();
    writer.add_page(Page::a4().with_content(SECOND)).unwrap();
    writer.finish(Vec::new()).unwrap()
}

#[test]
fn test_written_document_reads_back() {
    init();
    for compress in [true, false] {
        let pdf = two_page_document(compress);
        // Strict reading fails on any offset mismatch
        let registry = PdfReader::new(ReaderOptions::strict()).read(&pdf).unwrap();

        let pages = registry.pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(registry.page_content(pages[0]).unwrap(), FIRST.as_bytes());
        assert_eq!(registry.page_content(pages[1]).unwrap(), SECOND.as_bytes());

        // The shared resource dictionary and the font
        let resources = registry.page_resource_objects(pages[0]);
        assert_eq!(resources.len(), 2);
        let font = resources
            .iter()
            .filter_map(|id| registry.get(*id))
            .find(|record| record.dict.is_type("Font"))
            .unwrap();
        assert_eq!(font.dict.get_name("BaseFont"), Some("Helvetica"));

        let info = registry.info().and_then(|r| registry.get(r.id)).unwrap();
        assert_eq!(
            info.dict.get_token("Title"),
            Some(&Token::LiteralString(b"Round trip".to_vec()))
        );
        let media_box = registry.inherited(pages[1], "MediaBox").unwrap();
        assert_eq!(media_box.len(), 6);
    }
}

#[test]
fn test_merge_appends_content() {
    init();
    let pdf = two_page_document(true);
    let mut registry = PdfReader::from_bytes(&pdf).unwrap();
    let original_len = registry.len();
    let first = registry.pages()[0];

    let overlay = b"q 1 0 0 RG 10 10 50 50 re S Q";
    let added = registry.append_page_content(first, overlay, true).unwrap();
    assert_eq!(added as usize, original_len + 1);

    let merged = RelocationWriter::default().write(&registry, Vec::new()).unwrap();
    let reread = PdfReader::new(ReaderOptions::strict()).read(&merged).unwrap();
    let pages = reread.pages();
    assert_eq!(pages.len(), 2);

    let mut expected = FIRST.as_bytes().to_vec();
    expected.push(b'\n');
    expected.extend_from_slice(overlay);
    assert_eq!(reread.page_content(pages[0]).unwrap(), expected);
    assert_eq!(reread.page_content(pages[1]).unwrap(), SECOND.as_bytes());
    assert_eq!(reread.content_refs(pages[0]).len(), 2);
}

#[test]
fn test_merge_preserves_literal_bytes() {
    init();
    let title = br"(Nested (balanced) parens \) and \n escapes)";
    let mut data = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    let objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >>".to_vec(),
        [b"<< /Title ".as_slice(), title.as_slice(), b" >>".as_slice()].concat(),
    ];
    for (index, body) in objects.iter().enumerate() {
        offsets.push(data.len());
        data.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        data.extend_from_slice(body);
        data.extend_from_slice(b"\nendobj\n");
    }
    let xref = data.len();
    data.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
    for offset in &offsets {
        data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    data.extend_from_slice(
        format!("trailer\n<< /Size 5 /Root 1 0 R /Info 4 0 R >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes(),
    );

    let registry = PdfReader::from_bytes(&data).unwrap();
    let merged = RelocationWriter::default().write(&registry, Vec::new()).unwrap();
    assert!(merged.windows(title.len()).any(|w| w == title.as_slice()));

    // Existing info dictionary is reused, not duplicated
    let text = String::from_utf8_lossy(&merged);
    assert!(text.contains("/Size 5 "));
    assert!(text.contains("/Info 4 0 R /Root 1 0 R"));
}

#[test]
fn test_merge_keeps_recovered_numbers_and_names() {
    init();
    let matrix = b"/FontMatrix [0.00048828125 0 0 0.00048828125 0 0]";
    // Shift_JIS font name, escaped byte by byte
    let base_font = b"/BaseFont /#82l#82r#83S#83V#83b#83N";
    let mut data = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    let objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595.276 841.89] /Resources << /Font << /F1 4 0 R >> >> >>"
            .to_vec(),
        [
            b"<< /Type /Font /Subtype /Type3 ".as_slice(),
            matrix.as_slice(),
            b" ".as_slice(),
            base_font.as_slice(),
            b" /Id 98765432109876543210 >>".as_slice(),
        ]
        .concat(),
    ];
    for (index, body) in objects.iter().enumerate() {
        offsets.push(data.len());
        data.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        data.extend_from_slice(body);
        data.extend_from_slice(b"\nendobj\n");
    }
    let xref = data.len();
    data.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
    for offset in &offsets {
        data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    data.extend_from_slice(format!("trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes());

    let mut registry = PdfReader::from_bytes(&data).unwrap();
    let page = registry.pages()[0];
    // Editing the page re-serializes its dictionary too
    registry.append_page_content(page, b"q Q", false).unwrap();
    let merged = RelocationWriter::default().write(&registry, Vec::new()).unwrap();

    let contains = |needle: &[u8]| merged.windows(needle.len()).any(|w| w == needle);
    assert!(contains(matrix.as_slice()));
    assert!(contains(base_font.as_slice()));
    assert!(contains(b"/Id 98765432109876543210".as_slice()));
    assert!(contains(b"/MediaBox [0 0 595.276 841.89]".as_slice()));

    let reread = PdfReader::new(ReaderOptions::strict()).read(&merged).unwrap();
    let font = reread.get(4).unwrap();
    assert_eq!(
        font.dict.get_token("BaseFont"),
        Some(&Token::RawName(b"\x82l\x82r\x83S\x83V\x83b\x83N".to_vec()))
    );
    let matrix: Vec<f64> = font.dict.get_array("FontMatrix").unwrap().iter().filter_map(Token::as_number).collect();
    assert_eq!(matrix, [0.00048828125, 0.0, 0.0, 0.00048828125, 0.0, 0.0]);
}
