//! Shared helpers for session tests

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use lopdf::{content::Content, content::Operation, dictionary, Dictionary, Document, Object, Stream};
use md5::{Digest, Md5};
use paperknife_core::SourceFile;

const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];
const FILE_ID: &[u8; 16] = b"paperknife-tests";
const PERMISSIONS: i32 = -4;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A PDF whose pages read "{label}-{n}"
pub fn labelled_pdf(num_pages: u32, label: &str) -> Vec<u8> {
    build(num_pages, label, false)
}

/// A PDF with an encryption dictionary that no password opens
pub fn locked_pdf(num_pages: u32) -> Vec<u8> {
    build(num_pages, "Locked", true)
}

pub fn source(name: &str, num_pages: u32) -> SourceFile {
    SourceFile::from_bytes(name, labelled_pdf(num_pages, name.trim_end_matches(".pdf"))).unwrap()
}

pub fn locked_source(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, locked_pdf(1)).unwrap()
}

/// A labelled PDF encrypted with 40-bit RC4 under `user_password`
pub fn encrypted_source(name: &str, num_pages: u32, user_password: &str) -> SourceFile {
    let label = name.trim_end_matches(".pdf");
    SourceFile::from_bytes(name, encrypted_pdf(num_pages, label, user_password, "owner")).unwrap()
}

/// Standard security handler, revision 2. An empty `user_password` gives an
/// owner-password-only file.
pub fn encrypted_pdf(num_pages: u32, label: &str, user_password: &str, owner_password: &str) -> Vec<u8> {
    let mut doc = document(num_pages, label);

    let source = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let owner_digest = Md5::digest(pad_password(source));
    let owner_entry = rc4(&owner_digest[..5], &pad_password(user_password));

    let mut hasher = Md5::new();
    hasher.update(pad_password(user_password));
    hasher.update(&owner_entry);
    hasher.update(PERMISSIONS.to_le_bytes());
    hasher.update(FILE_ID);
    let key = hasher.finalize()[..5].to_vec();

    for (&(number, generation), object) in doc.objects.iter_mut() {
        let mut hasher = Md5::new();
        hasher.update(&key);
        hasher.update(&number.to_le_bytes()[..3]);
        hasher.update(generation.to_le_bytes());
        let object_key = hasher.finalize()[..10].to_vec();
        encrypt_object(object, &object_key);
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => Object::Integer(1),
        "R" => Object::Integer(2),
        "Length" => Object::Integer(40),
        "O" => Object::String(owner_entry, lopdf::StringFormat::Hexadecimal),
        "U" => Object::String(rc4(&key, &PASSWORD_PADDING), lopdf::StringFormat::Hexadecimal),
        "P" => Object::Integer(i64::from(PERMISSIONS)),
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(FILE_ID.to_vec(), lopdf::StringFormat::Hexadecimal),
            Object::String(FILE_ID.to_vec(), lopdf::StringFormat::Hexadecimal),
        ]),
    );
    save(doc)
}

fn pad_password(password: &str) -> Vec<u8> {
    let bytes = password.as_bytes();
    let len = bytes.len().min(32);
    let mut padded = bytes[..len].to_vec();
    padded.extend_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

fn encrypt_object(object: &mut Object, key: &[u8]) {
    match object {
        Object::String(bytes, _) => *bytes = rc4(key, bytes),
        Object::Array(items) => items.iter_mut().for_each(|item| encrypt_object(item, key)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, value)| encrypt_object(value, key)),
        Object::Stream(stream) => stream.content = rc4(key, &stream.content),
        _ => {}
    }
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255).collect();
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            let k = state[i as usize].wrapping_add(state[j as usize]);
            byte ^ state[k as usize]
        })
        .collect()
}

fn build(num_pages: u32, label: &str, encrypted: bool) -> Vec<u8> {
    let mut doc = document(num_pages, label);

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

    save(doc)
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn document(num_pages: u32, label: &str) -> Document {
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
        kids.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
            "Contents" => Object::Reference(content_id),
        })));
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
    doc
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

/// Page labels in page order
pub fn labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).unwrap();
            let start = content.iter().position(|b| *b == b'(').unwrap() + 1;
            let end = content.iter().position(|b| *b == b')').unwrap();
            String::from_utf8_lossy(&content[start..end]).into_owned()
        })
        .collect()
}

/// Encode a solid RGB PNG
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    let data = vec![0x40; (width * height * 3) as usize];
    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&data).unwrap();
    }
    buffer
}

/// Encode a solid greyscale JPEG
pub fn grey_jpeg(width: u32, height: u32) -> Vec<u8> {
    let data = vec![0x90; (width * height) as usize];
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 80)
        .encode(&data, width, height, ColorType::L8)
        .unwrap();
    buffer
}
