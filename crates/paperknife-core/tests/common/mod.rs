//! Shared helpers for paperknife-core integration tests

#![allow(dead_code)]

use lopdf::{content::Content, content::Operation, dictionary, Dictionary, Document, Object, Stream};

/// Install a fmt subscriber once; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A PDF whose pages read "{label}-{n}", each with the given /Rotate
pub fn labelled_pdf(num_pages: u32, label: &str, rotation: Option<i64>) -> Vec<u8> {
    build(num_pages, label, rotation, false)
}

/// A PDF carrying an encryption dictionary that no password opens
pub fn locked_pdf(num_pages: u32) -> Vec<u8> {
    build(num_pages, "Locked", None, true)
}

fn build(num_pages: u32, label: &str, rotation: Option<i64>, encrypted: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("{}-{}", label, i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
            "Contents" => Object::Reference(content_id),
        };
        if let Some(rotation) = rotation {
            page.set("Rotate", Object::Integer(rotation));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => Object::Integer(num_pages as i64),
            "Kids" => Object::Array(kids),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    if encrypted {
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => Object::Integer(1),
            "R" => Object::Integer(2),
            "O" => Object::String(vec![0x11; 32], lopdf::StringFormat::Hexadecimal),
            "U" => Object::String(vec![0x22; 32], lopdf::StringFormat::Hexadecimal),
            "P" => Object::Integer(-4),
        });
        doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Page labels in page order
pub fn labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content_id = doc
                .get_dictionary(page_id)
                .unwrap()
                .get(b"Contents")
                .and_then(Object::as_reference)
                .unwrap();
            let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
            let content = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let start = content.iter().position(|b| *b == b'(').unwrap() + 1;
            let end = content.iter().position(|b| *b == b')').unwrap();
            String::from_utf8_lossy(&content[start..end]).into_owned()
        })
        .collect()
}

/// /Rotate of every page in page order
pub fn rotations(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            doc.get_dictionary(page_id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}
