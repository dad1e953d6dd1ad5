//! Opening documents: table and stream indexes, hybrid files, damaged
//! files that need recovery, and progressive sources.

use pdf_strata::{ByteSource, Document, Error, Object, ObjectRef};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a PDF incrementally while recording object offsets.
struct Fixture {
    buf: Vec<u8>,
}

impl Fixture {
    fn new() -> Self {
        Self { buf: b"%PDF-1.4\n".to_vec() }
    }

    fn add_object(&mut self, num: u32, gen: u16, body: &str) -> usize {
        let offset = self.buf.len();
        self.buf
            .extend_from_slice(format!("{} {} obj\n{}\nendobj\n", num, gen, body).as_bytes());
        offset
    }

    fn offset(&self) -> usize {
        self.buf.len()
    }

    fn push(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
    }

    fn push_entry(&mut self, offset: usize, gen: u32, flag: char) {
        self.buf
            .extend_from_slice(format!("{:010} {:05} {} \n", offset, gen, flag).as_bytes());
    }

    fn finish(mut self, xref_offset: usize) -> Vec<u8> {
        self.push(&format!("startxref\n{}\n%%EOF\n", xref_offset));
        self.buf
    }
}

fn two_object_pdf() -> Vec<u8> {
    let mut f = Fixture::new();
    let o1 = f.add_object(1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let o2 = f.add_object(2, 0, "<< /Type /Pages /Count 0 >>");
    let xref = f.offset();
    f.push("xref\n0 3\n");
    f.push_entry(0, 65535, 'f');
    f.push_entry(o1, 0, 'n');
    f.push_entry(o2, 0, 'n');
    f.push("trailer\n<< /Size 3 /Root 1 0 R >>\n");
    f.finish(xref)
}

#[test]
fn test_open_table_indexed_document() {
    let doc = Document::from_bytes(two_object_pdf()).unwrap();
    assert_eq!(doc.version(), (1, 4));
    assert!(!doc.xref().is_stream_based());

    let catalog = doc.catalog().unwrap();
    let pages = doc.resolve(catalog.get_raw("Pages").unwrap()).unwrap();
    assert_eq!(pages.as_dict().unwrap().get_raw("Count").unwrap().as_integer(), Some(0));
}

#[test]
fn test_open_stream_indexed_document() {
    let mut f = Fixture::new();
    let o1 = f.add_object(1, 0, "<< /Type /Catalog >>");
    let xref = f.offset();
    // W = [1, 2, 1]: rows for objects 0 (free) and 1, plus the index stream
    // itself as object 2.
    let rows = format!("000000FF\n01{:04X}00\n01{:04X}00\n>", o1, xref);
    let body = format!(
        "<< /Type /XRef /Size 3 /W [1 2 1] /Index [0 3] /Filter /ASCIIHexDecode /Length {} /Root 1 0 R >>\nstream\n{}\nendstream",
        rows.len(),
        rows
    );
    f.add_object(2, 0, &body);

    let doc = Document::from_bytes(f.finish(xref)).unwrap();
    assert!(doc.xref().is_stream_based());
    assert!(doc.catalog().is_ok());
}

#[test]
fn test_free_reference_resolves_to_null() {
    let doc = Document::from_bytes(two_object_pdf()).unwrap();
    assert!(doc.get_object(ObjectRef::new(0, 65535)).unwrap().is_null());
    assert!(doc.get_object(ObjectRef::new(42, 0)).unwrap().is_null());
}

#[test]
fn test_recovery_from_garbage_start_xref() {
    init_logs();
    // Objects 1..5 are intact; the startxref value is nonsense. The document
    // must open via scanning and every object must resolve.
    let mut f = Fixture::new();
    f.add_object(1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    f.add_object(2, 0, "<< /Type /Pages /Count 3 >>");
    f.add_object(3, 0, "(three)");
    f.add_object(4, 0, "[1 2 3]");
    f.add_object(5, 0, "<< /Kind (five) >>");
    let xref = f.offset();
    f.push("xref\n0 6\n");
    f.push_entry(0, 65535, 'f');
    for n in 1..=5u32 {
        // Deliberately wrong offsets; recovery must ignore them anyway
        f.push_entry(7 * n as usize, 0, 'n');
    }
    f.push("trailer\n<< /Size 6 /Root 1 0 R /ID [<DEADBEEF> <DEADBEEF>] >>\n");
    let _ = xref;
    let data = f.finish(987654321);

    let doc = Document::from_bytes(data).unwrap();
    assert!(doc.trailer().contains_key("ID"));
    for n in 1..=5u32 {
        let obj = doc.get_object(ObjectRef::new(n, 0)).unwrap();
        assert!(!obj.is_null(), "object {} did not resolve", n);
    }
    assert_eq!(doc.get_object(ObjectRef::new(3, 0)).unwrap(), Object::String(b"three".to_vec()));
}

#[test]
fn test_recovery_prefers_newest_duplicate_object() {
    // Two physical copies of object 2; no usable index. The later copy wins.
    let mut f = Fixture::new();
    f.add_object(1, 0, "<< /Type /Catalog >>");
    f.add_object(2, 0, "(old)");
    f.add_object(2, 0, "(new)");
    let xref = f.offset();
    f.push("xref\n0 1\n");
    f.push_entry(0, 65535, 'f');
    f.push("trailer\n<< /Size 3 /Root 1 0 R >>\n");
    let _ = xref;
    let data = f.finish(999999999);

    let doc = Document::from_bytes(data).unwrap();
    assert_eq!(doc.get_object(ObjectRef::new(2, 0)).unwrap(), Object::String(b"new".to_vec()));
}

#[test]
fn test_hybrid_document_uses_table_and_stream_entries() {
    let mut f = Fixture::new();
    let o1 = f.add_object(1, 0, "<< /Type /Catalog /Extra 3 0 R >>");
    let o3 = f.add_object(3, 0, "(stream only)");

    let stm = f.offset();
    let rows = format!("01{:04X}00\n>", o3);
    let body = format!(
        "<< /Type /XRef /Size 4 /W [1 2 1] /Index [3 1] /Filter /ASCIIHexDecode /Length {} >>\nstream\n{}\nendstream",
        rows.len(),
        rows
    );
    f.add_object(4, 0, &body);

    let xref = f.offset();
    f.push("xref\n0 2\n");
    f.push_entry(0, 65535, 'f');
    f.push_entry(o1, 0, 'n');
    f.push(&format!("trailer\n<< /Size 4 /Root 1 0 R /XRefStm {} >>\n", stm));

    let doc = Document::from_bytes(f.finish(xref)).unwrap();
    let catalog = doc.catalog().unwrap();
    let extra = doc.resolve(catalog.get_raw("Extra").unwrap()).unwrap();
    assert_eq!(extra, Object::String(b"stream only".to_vec()));
}

#[test]
fn test_progressive_source_reports_and_resumes() {
    init_logs();
    // Pad the fixture so the header window, the missing object, and the
    // trailer tail land in three distinct regions of the file.
    let mut f = Fixture::new();
    f.push(&format!("%{}\n", "x".repeat(1100)));
    let o1 = f.add_object(1, 0, "<< /Type /Catalog >>");
    f.push(&format!("%{}\n", "y".repeat(1100)));
    let xref = f.offset();
    f.push("xref\n0 2\n");
    f.push_entry(0, 65535, 'f');
    f.push_entry(o1, 0, 'n');
    f.push("trailer\n<< /Size 2 /Root 1 0 R >>\n");
    let data = f.finish(xref);
    let total = data.len();

    let body_end = o1 + 36; // "1 0 obj\n<< /Type /Catalog >>\nendobj\n"
    let mut source = ByteSource::growing(total);
    source.supply(0, &data[..o1]);
    source.supply(body_end, &data[body_end..]);

    let mut doc = Document::from_source(source, None).unwrap();
    let err = doc.get_object(ObjectRef::new(1, 0)).unwrap_err();
    let (begin, end) = match err {
        Error::MissingData { begin, end } => (begin, end),
        other => panic!("expected MissingData, got {:?}", other),
    };
    assert_eq!((begin, end), (o1, body_end));

    doc.supply(begin, &data[begin..end]);
    let catalog = doc.get_object(ObjectRef::new(1, 0)).unwrap();
    assert_eq!(catalog.as_dict().unwrap().get_raw("Type").unwrap().as_name(), Some("Catalog"));
}

#[test]
fn test_reference_chains_resolve_and_cycles_are_rejected() {
    // /Pages points at object 2, which is merely a reference to object 3;
    // /Loop enters a two-object reference cycle.
    let mut f = Fixture::new();
    let o1 = f.add_object(1, 0, "<< /Type /Catalog /Pages 2 0 R /Loop 4 0 R >>");
    let o2 = f.add_object(2, 0, "3 0 R");
    let o3 = f.add_object(3, 0, "<< /Type /Pages /Count 7 >>");
    let o4 = f.add_object(4, 0, "5 0 R");
    let o5 = f.add_object(5, 0, "4 0 R");
    let xref = f.offset();
    f.push("xref\n0 6\n");
    f.push_entry(0, 65535, 'f');
    for off in [o1, o2, o3, o4, o5] {
        f.push_entry(off, 0, 'n');
    }
    f.push("trailer\n<< /Size 6 /Root 1 0 R >>\n");

    let doc = Document::from_bytes(f.finish(xref)).unwrap();
    let catalog = doc.catalog().unwrap();
    let pages = catalog.get("Pages", doc.xref()).unwrap().unwrap();
    assert_eq!(pages.as_dict().unwrap().get_raw("Count").unwrap().as_integer(), Some(7));

    let err = catalog.get("Loop", doc.xref()).unwrap_err();
    assert!(matches!(err, Error::InvalidStructure(_)));
}

#[test]
fn test_unopenable_document_is_an_error() {
    // A header and nothing else: recovery finds no objects and no trailer.
    let err = Document::from_bytes(b"%PDF-1.4\nnothing to see here".to_vec()).unwrap_err();
    assert!(matches!(err, Error::InvalidStructure(_)));
}
