//! Synthetic PDFs and images for unit tests

use lopdf::{content::Content, content::Operation, dictionary, Dictionary, Document, Object, Stream};
use md5::{Digest, Md5};

/// Password padding string of the standard security handler
const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];
const FILE_ID: &[u8; 16] = b"paperknife-tests";
const PERMISSIONS: i32 = -4;

/// Create a simple PDF with N pages whose text reads "{label}-{page}"
pub(crate) fn sample_pdf(num_pages: u32, label: &str) -> Vec<u8> {
    build_pdf(num_pages, label, None, None, false)
}

pub(crate) fn sample_pdf_with_rotation(num_pages: u32, label: &str, rotation: i64) -> Vec<u8> {
    build_pdf(num_pages, label, Some(rotation), None, false)
}

/// Rotation lives on the Pages node, not on the pages themselves
pub(crate) fn sample_pdf_with_inherited_rotation(num_pages: u32, rotation: i64) -> Vec<u8> {
    build_pdf(num_pages, "Inherited", None, Some(rotation), false)
}

/// A PDF whose trailer carries an encryption dictionary no password can open
pub(crate) fn locked_pdf(num_pages: u32) -> Vec<u8> {
    build_pdf(num_pages, "Locked", None, None, true)
}

fn build_pdf(
    num_pages: u32,
    label: &str,
    page_rotation: Option<i64>,
    tree_rotation: Option<i64>,
    encrypted: bool,
) -> Vec<u8> {
    let mut doc = build_document(num_pages, label, page_rotation, tree_rotation);

    if encrypted {
        // No /ID in the trailer, so key derivation fails for every password
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

/// A PDF really encrypted with 40-bit RC4 (standard security handler, revision 2).
///
/// An empty `user_password` gives an owner-password-only file that opens
/// without prompting.
pub(crate) fn encrypted_pdf(
    num_pages: u32,
    label: &str,
    user_password: &str,
    owner_password: &str,
) -> Vec<u8> {
    let mut doc = build_document(num_pages, label, None, None);

    let owner_entry = owner_entry(owner_password, user_password);
    let key = file_key(user_password, &owner_entry);

    for (&(number, generation), object) in doc.objects.iter_mut() {
        encrypt_object(object, &object_key(&key, number, generation));
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

fn build_document(
    num_pages: u32,
    label: &str,
    page_rotation: Option<i64>,
    tree_rotation: Option<i64>,
) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();

    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
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

        let mut page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
        ]);
        if let Some(rotation) = page_rotation {
            page.set("Rotate", Object::Integer(rotation));
        }
        page_ids.push(doc.add_object(page));
    }

    let mut pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    if let Some(rotation) = tree_rotation {
        pages.set("Rotate", Object::Integer(rotation));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn pad_password(password: &str) -> Vec<u8> {
    let bytes = password.as_bytes();
    let len = bytes.len().min(32);
    let mut padded = bytes[..len].to_vec();
    padded.extend_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

/// /O entry, algorithm 3 at revision 2
fn owner_entry(owner_password: &str, user_password: &str) -> Vec<u8> {
    let source = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let digest = Md5::digest(pad_password(source));
    rc4(&digest[..5], &pad_password(user_password))
}

/// 40-bit file key, algorithm 2 at revision 2
fn file_key(user_password: &str, owner_entry: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(user_password));
    hasher.update(owner_entry);
    hasher.update(PERMISSIONS.to_le_bytes());
    hasher.update(FILE_ID);
    hasher.finalize()[..5].to_vec()
}

fn object_key(key: &[u8], number: u32, generation: u16) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(&number.to_le_bytes()[..3]);
    hasher.update(generation.to_le_bytes());
    hasher.finalize()[..key.len() + 5].to_vec()
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

/// Text label of every page, in page order
pub(crate) fn page_labels(bytes: &[u8]) -> Vec<String> {
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

/// /Rotate of every page, in page order (0 when absent)
pub(crate) fn page_rotations(bytes: &[u8]) -> Vec<i64> {
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

/// Encode a small solid-colour PNG
pub(crate) fn sample_png(width: u32, height: u32, with_alpha: bool) -> Vec<u8> {
    let channels = if with_alpha { 4 } else { 3 };
    let data = vec![0x80; (width * height) as usize * channels];

    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, width, height);
        encoder.set_color(if with_alpha {
            png::ColorType::Rgba
        } else {
            png::ColorType::Rgb
        });
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&data).unwrap();
    }
    buffer
}

/// Minimal JPEG: SOI, optional Adobe APP14, baseline frame header, EOI.
///
/// Only the headers are real; the codec embeds JPEG data without decoding it.
pub(crate) fn jpeg_header(width: u16, height: u16, components: u8, adobe: bool) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    if adobe {
        bytes.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
        bytes.extend_from_slice(b"Adobe");
        bytes.extend_from_slice(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
    }

    let frame_length = 8 + 3 * u16::from(components);
    bytes.extend_from_slice(&[0xFF, 0xC0]);
    bytes.extend_from_slice(&frame_length.to_be_bytes());
    bytes.push(8);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.push(components);
    for id in 1..=components {
        bytes.extend_from_slice(&[id, 0x11, 0x00]);
    }
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}
