//! Document codec adapter
//!
//! Thin arena over lopdf. Every parsed or created document lives in the
//! [`Codec`] and is addressed through typed handles ([`DocumentId`],
//! [`PageRef`], [`ImageRef`]); nothing outside this module touches a
//! `lopdf::Document` directly.
//!
//! Page indices are 0-based at this boundary.

use crate::error::CodecError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `/Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

const ENCRYPT_KEY: &[u8] = b"/Encrypt";

/// Opaque handle to a document owned by a [`Codec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(usize);

/// A page that belongs to a specific document in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    doc: DocumentId,
    object: ObjectId,
}

impl PageRef {
    pub fn document(&self) -> DocumentId {
        self.doc
    }
}

/// An embedded image XObject inside a specific document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef {
    doc: DocumentId,
    object: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Jpeg,
    Png,
}

/// Page or image size. One pixel maps to one PDF point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where an image lands on a page, in PDF points from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ImagePlacement {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Cover the whole of a page of the given size
    pub fn full_page(size: PageSize) -> Self {
        Self::new(0.0, 0.0, f64::from(size.width), f64::from(size.height))
    }
}

#[derive(Default)]
pub struct Codec {
    slots: Vec<Option<Document>>,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from bytes.
    ///
    /// Encrypted documents are decrypted with `password`, or with the empty
    /// user password when none is given (owner-password-only files open
    /// that way).
    pub fn load_document(
        &mut self,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<DocumentId, CodecError> {
        let mut document = Document::load_mem(bytes).map_err(|e| {
            if looks_encrypted(bytes) {
                CodecError::Decryption(e.to_string())
            } else {
                CodecError::Parse(e.to_string())
            }
        })?;

        if document.is_encrypted() {
            document
                .decrypt(password.unwrap_or(""))
                .map_err(|e| CodecError::Decryption(e.to_string()))?;
            if let Ok(encrypt_id) = document.trailer.get(b"Encrypt").and_then(Object::as_reference) {
                document.objects.remove(&encrypt_id);
            }
            document.trailer.remove(b"Encrypt");
        }

        Ok(self.insert(document))
    }

    /// Create an empty document with a catalog and an empty page tree.
    pub fn create_document(&mut self) -> DocumentId {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();

        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Object::Array(Vec::new()),
                "Count" => Object::Integer(0),
            }),
        );

        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        document.trailer.set("Root", Object::Reference(catalog_id));

        self.insert(document)
    }

    pub fn page_count(&self, doc: DocumentId) -> Result<usize, CodecError> {
        Ok(self.document(doc)?.get_pages().len())
    }

    /// Pages of a document in reading order.
    pub fn pages(&self, doc: DocumentId) -> Result<Vec<PageRef>, CodecError> {
        Ok(self
            .document(doc)?
            .get_pages()
            .into_values()
            .map(|object| PageRef { doc, object })
            .collect())
    }

    /// Copy pages of `src` into `dst` without adding them to its page tree.
    ///
    /// Each returned page carries its content and every object it references.
    /// Inherited attributes are flattened onto the copy, since the copy gets a
    /// new parent. Repeated indices yield distinct page objects that share
    /// their copied resources. The source document is left untouched.
    pub fn copy_pages(
        &mut self,
        src: DocumentId,
        dst: DocumentId,
        indices: &[usize],
    ) -> Result<Vec<PageRef>, CodecError> {
        if src == dst {
            return Err(CodecError::Operation(
                "Cannot copy pages into their own document".into(),
            ));
        }

        let source = self.take(src)?;
        let outcome = match self.document_mut(dst) {
            Ok(target) => copy_into(&source, target, indices),
            Err(e) => Err(e),
        };
        self.slots[src.0] = Some(source);

        outcome.map(|ids| {
            ids.into_iter()
                .map(|object| PageRef { doc: dst, object })
                .collect()
        })
    }

    /// Append a page to the end of the document's page tree.
    pub fn add_page(&mut self, doc: DocumentId, page: PageRef) -> Result<(), CodecError> {
        if page.doc != doc {
            return Err(CodecError::ForeignHandle);
        }

        let document = self.document_mut(doc)?;
        let pages_id = pages_root(document)?;

        let pages = document
            .get_object_mut(pages_id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| CodecError::Operation("Invalid pages dictionary".into()))?;

        let mut kids = pages
            .get(b"Kids")
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default();
        kids.push(Object::Reference(page.object));
        let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0) + 1;

        pages.set("Kids", Object::Array(kids));
        pages.set("Count", Object::Integer(count));

        page_dictionary_mut(document, page.object)?.set("Parent", Object::Reference(pages_id));
        Ok(())
    }

    /// Append a new blank page of the given size.
    pub fn add_sized_page(&mut self, doc: DocumentId, size: PageSize) -> Result<PageRef, CodecError> {
        let document = self.document_mut(doc)?;
        let object = document.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => media_box(size),
            "Resources" => Dictionary::new(),
        });

        let page = PageRef { doc, object };
        self.add_page(doc, page)?;
        Ok(page)
    }

    /// Effective rotation of a page in degrees, following inheritance.
    pub fn page_rotation(&self, page: PageRef) -> Result<i64, CodecError> {
        let document = self.document(page.doc)?;
        let dict = page_dictionary(document, page.object)?;

        match dict.get(b"Rotate") {
            Ok(value) => value
                .as_i64()
                .map_err(|e| CodecError::Operation(format!("Rotate is not an integer: {}", e))),
            Err(_) => Ok(inherited_attribute(document, dict, b"Rotate")
                .and_then(|value| value.as_i64().ok())
                .unwrap_or(0)),
        }
    }

    pub fn set_page_rotation(&mut self, page: PageRef, degrees: i64) -> Result<(), CodecError> {
        let document = self.document_mut(page.doc)?;
        page_dictionary_mut(document, page.object)?.set("Rotate", Object::Integer(degrees));
        Ok(())
    }

    /// Page MediaBox as `[x0, y0, x1, y1]`, following inheritance.
    pub fn page_media_box(&self, page: PageRef) -> Result<[f64; 4], CodecError> {
        let document = self.document(page.doc)?;
        let dict = page_dictionary(document, page.object)?;

        let value = match dict.get(b"MediaBox") {
            Ok(value) => value.clone(),
            Err(_) => inherited_attribute(document, dict, b"MediaBox")
                .ok_or_else(|| CodecError::Operation("Page has no MediaBox".into()))?,
        };

        let resolved = match value {
            Object::Reference(id) => document
                .get_object(id)
                .map_err(|e| CodecError::Operation(e.to_string()))?
                .clone(),
            other => other,
        };

        let items = resolved
            .as_array()
            .map_err(|_| CodecError::Operation("MediaBox is not an array".into()))?;
        if items.len() != 4 {
            return Err(CodecError::Operation("MediaBox must have 4 entries".into()));
        }

        let mut rect = [0.0; 4];
        for (slot, item) in rect.iter_mut().zip(items) {
            *slot = number(item)
                .ok_or_else(|| CodecError::Operation("MediaBox entry is not a number".into()))?;
        }
        Ok(rect)
    }

    /// Embed a raster image as an image XObject.
    ///
    /// JPEG data is embedded untouched (`DCTDecode`); its frame header gives
    /// the dimensions and colour space. PNG data is decoded and re-encoded
    /// with `FlateDecode`.
    pub fn embed_raster_image(
        &mut self,
        doc: DocumentId,
        bytes: &[u8],
        format: RasterFormat,
    ) -> Result<ImageRef, CodecError> {
        let document = self.document_mut(doc)?;

        let stream = match format {
            RasterFormat::Jpeg => {
                let header = read_jpeg_header(bytes)?;
                let mut dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(i64::from(header.width)),
                    "Height" => Object::Integer(i64::from(header.height)),
                    "ColorSpace" => header.color_space(),
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "DCTDecode",
                };
                // Adobe writes CMYK JPEGs with inverted components
                if header.components == 4 && header.adobe {
                    dict.set(
                        "Decode",
                        Object::Array([1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec()),
                    );
                }
                Stream::new(dict, bytes.to_vec()).with_compression(false)
            }
            RasterFormat::Png => {
                let decoded = decode_png(bytes)?;
                let mut dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(i64::from(decoded.width)),
                    "Height" => Object::Integer(i64::from(decoded.height)),
                    "ColorSpace" => decoded.color_space,
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "FlateDecode",
                };

                if let Some(alpha) = decoded.alpha {
                    let smask = Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => Object::Integer(i64::from(decoded.width)),
                            "Height" => Object::Integer(i64::from(decoded.height)),
                            "ColorSpace" => "DeviceGray",
                            "BitsPerComponent" => Object::Integer(8),
                            "Filter" => "FlateDecode",
                        },
                        deflate(&alpha)?,
                    )
                    .with_compression(false);
                    let smask_id = document.add_object(smask);
                    dict.set("SMask", Object::Reference(smask_id));
                }

                Stream::new(dict, deflate(&decoded.color)?).with_compression(false)
            }
        };

        let object = document.add_object(stream);
        Ok(ImageRef { doc, object })
    }

    /// Pixel dimensions of an embedded image
    pub fn image_size(&self, image: ImageRef) -> Result<PageSize, CodecError> {
        let document = self.document(image.doc)?;
        let stream = document
            .get_object(image.object)
            .and_then(Object::as_stream)
            .map_err(|e| CodecError::Image(e.to_string()))?;

        let dimension = |key: &[u8]| {
            stream
                .dict
                .get(key)
                .and_then(Object::as_i64)
                .ok()
                .and_then(|value| u32::try_from(value).ok())
                .ok_or_else(|| CodecError::Image("Image has no valid dimensions".into()))
        };
        Ok(PageSize::new(dimension(b"Width")?, dimension(b"Height")?))
    }

    /// Paint `image` over the whole page area `size`, replacing the page content.
    ///
    /// Meant for pages created with [`Codec::add_sized_page`].
    pub fn draw_image(
        &mut self,
        page: PageRef,
        image: ImageRef,
        size: PageSize,
    ) -> Result<(), CodecError> {
        if page.doc != image.doc {
            return Err(CodecError::ForeignHandle);
        }

        let document = self.document_mut(page.doc)?;
        let name = image_name(image);

        let content = placement_content(&name, ImagePlacement::full_page(size), false)?;
        let content_id = document.add_object(Stream::new(Dictionary::new(), content));

        let mut xobjects = Dictionary::new();
        xobjects.set(name, Object::Reference(image.object));

        let page_dict = page_dictionary_mut(document, page.object)?;
        page_dict.set("Resources", dictionary! { "XObject" => xobjects });
        page_dict.set("Contents", Object::Reference(content_id));
        Ok(())
    }

    /// Paint `image` on top of the existing page content.
    ///
    /// The existing content is wrapped in `q`/`Q` so its graphics state
    /// cannot leak into the placement. Inherited resources are copied onto
    /// the page before the image is registered.
    pub fn overlay_image(
        &mut self,
        page: PageRef,
        image: ImageRef,
        placement: ImagePlacement,
    ) -> Result<(), CodecError> {
        if page.doc != image.doc {
            return Err(CodecError::ForeignHandle);
        }

        let document = self.document_mut(page.doc)?;
        let name = image_name(image);

        let (mut resources, existing) = {
            let dict = page_dictionary(document, page.object)?;
            let resources = match dict.get(b"Resources") {
                Ok(value) => resolved_dictionary(document, value),
                Err(_) => inherited_attribute(document, dict, b"Resources")
                    .map(|value| resolved_dictionary(document, &value))
                    .unwrap_or_else(Dictionary::new),
            };
            let existing = match dict.get(b"Contents") {
                Ok(Object::Array(items)) => items.clone(),
                Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
                _ => Vec::new(),
            };
            (resources, existing)
        };

        let mut xobjects = resources
            .get(b"XObject")
            .map(|value| resolved_dictionary(document, value))
            .unwrap_or_else(|_| Dictionary::new());
        xobjects.set(name.clone(), Object::Reference(image.object));
        resources.set("XObject", xobjects);

        let open_id = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let content = placement_content(&name, placement, true)?;
        let overlay_id = document.add_object(Stream::new(Dictionary::new(), content));

        let mut contents = vec![Object::Reference(open_id)];
        contents.extend(existing);
        contents.push(Object::Reference(overlay_id));

        let page_dict = page_dictionary_mut(document, page.object)?;
        page_dict.set("Resources", resources);
        page_dict.set("Contents", Object::Array(contents));
        Ok(())
    }

    /// Serialize a document. The handle is consumed and must not be reused.
    pub fn serialize(&mut self, doc: DocumentId) -> Result<Vec<u8>, CodecError> {
        let mut document = self.take(doc)?;
        document.compress();

        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .map_err(|e| CodecError::Save(e.to_string()))?;
        Ok(buffer)
    }

    /// Drop a document without serializing it.
    pub fn close(&mut self, doc: DocumentId) -> Result<(), CodecError> {
        self.take(doc).map(drop)
    }

    /// Number of documents currently held by the arena.
    pub fn live_documents(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn insert(&mut self, document: Document) -> DocumentId {
        self.slots.push(Some(document));
        DocumentId(self.slots.len() - 1)
    }

    fn take(&mut self, doc: DocumentId) -> Result<Document, CodecError> {
        self.slots
            .get_mut(doc.0)
            .and_then(Option::take)
            .ok_or(CodecError::StaleHandle(doc.0))
    }

    fn document(&self, doc: DocumentId) -> Result<&Document, CodecError> {
        self.slots
            .get(doc.0)
            .and_then(Option::as_ref)
            .ok_or(CodecError::StaleHandle(doc.0))
    }

    fn document_mut(&mut self, doc: DocumentId) -> Result<&mut Document, CodecError> {
        self.slots
            .get_mut(doc.0)
            .and_then(Option::as_mut)
            .ok_or(CodecError::StaleHandle(doc.0))
    }
}

/// Cheap check for an encryption dictionary, used when parsing fails outright.
pub(crate) fn looks_encrypted(bytes: &[u8]) -> bool {
    bytes
        .windows(ENCRYPT_KEY.len())
        .any(|window| window == ENCRYPT_KEY)
}

fn image_name(image: ImageRef) -> String {
    format!("Im{}", image.object.0)
}

/// `cm`/`Do` content drawing `name` at `placement`. With `restore_first` the
/// stream starts by closing a `q` opened in front of the existing content.
fn placement_content(
    name: &str,
    placement: ImagePlacement,
    restore_first: bool,
) -> Result<Vec<u8>, CodecError> {
    let mut operations = Vec::with_capacity(5);
    if restore_first {
        operations.push(Operation::new("Q", vec![]));
    }
    operations.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            [placement.width, 0.0, 0.0, placement.height, placement.x, placement.y]
                .into_iter()
                .map(|value| Object::Real(value as f32))
                .collect(),
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]);

    Content { operations }
        .encode()
        .map_err(|e| CodecError::Operation(format!("Failed to encode content: {}", e)))
}

fn resolved_dictionary(document: &Document, value: &Object) -> Dictionary {
    match value {
        Object::Dictionary(dict) => dict.clone(),
        Object::Reference(id) => document
            .get_dictionary(*id)
            .map(|dict| dict.clone())
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

/// Frame header fields of a JPEG stream
#[derive(Debug, PartialEq, Eq)]
struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
    /// Carries an Adobe APP14 segment
    adobe: bool,
}

impl JpegHeader {
    fn color_space(&self) -> &'static str {
        match self.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        }
    }
}

fn read_jpeg_header(data: &[u8]) -> Result<JpegHeader, CodecError> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(CodecError::Image("Not a valid JPEG".into()));
    }

    let mut adobe = false;
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;

        if marker == 0xFF || marker == 0x00 || (0xD0..=0xD9).contains(&marker) {
            continue;
        }
        if pos + 2 > data.len() {
            break;
        }
        let length = usize::from(u16::from_be_bytes([data[pos], data[pos + 1]]));
        let segment = data.get(pos + 2..pos + length).unwrap_or_default();

        match marker {
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if segment.len() < 6 {
                    return Err(CodecError::Image("Truncated JPEG frame header".into()));
                }
                let height = u32::from(u16::from_be_bytes([segment[1], segment[2]]));
                let width = u32::from(u16::from_be_bytes([segment[3], segment[4]]));
                if width == 0 || height == 0 {
                    return Err(CodecError::Image("JPEG dimensions must be non-zero".into()));
                }
                return Ok(JpegHeader {
                    width,
                    height,
                    components: segment[5],
                    adobe,
                });
            }
            _ => {}
        }
        pos += length.max(2);
    }

    Err(CodecError::Image("JPEG has no frame header".into()))
}

fn copy_into(
    source: &Document,
    target: &mut Document,
    indices: &[usize],
) -> Result<Vec<ObjectId>, CodecError> {
    let pages: Vec<ObjectId> = source.get_pages().into_values().collect();
    let mut importer = PageImporter {
        source,
        target,
        remapped: BTreeMap::new(),
    };

    indices
        .iter()
        .map(|&index| {
            let page_id = *pages.get(index).ok_or(CodecError::PageOutOfRange {
                index,
                count: pages.len(),
            })?;
            importer.import_page(page_id)
        })
        .collect()
}

/// Deep-copies objects from one document into another, remapping ids.
struct PageImporter<'a> {
    source: &'a Document,
    target: &'a mut Document,
    /// Source id -> target id for everything imported so far in this call
    remapped: BTreeMap<ObjectId, ObjectId>,
}

impl PageImporter<'_> {
    fn import_page(&mut self, page_id: ObjectId) -> Result<ObjectId, CodecError> {
        let source = self.source;
        let original = page_dictionary(source, page_id)?;

        let mut page = original.clone();
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Some(value) = inherited_attribute(source, original, key) {
                    page.set(key, value);
                }
            }
        }
        page.remove(b"Parent");

        // Back-references from annotations (/P) resolve to this copy.
        let new_id = self.target.new_object_id();
        self.remapped.insert(page_id, new_id);
        let copied = self.import_dictionary(&page);
        self.remapped.remove(&page_id);

        self.target.objects.insert(new_id, Object::Dictionary(copied));
        Ok(new_id)
    }

    fn import_reference(&mut self, id: ObjectId) -> Object {
        if let Some(new_id) = self.remapped.get(&id) {
            return Object::Reference(*new_id);
        }

        let source = self.source;
        let Ok(object) = source.get_object(id) else {
            return Object::Null;
        };
        // Links into pages that are not being copied would drag in the whole tree.
        if is_page_tree_node(object) {
            return Object::Null;
        }

        let new_id = self.target.new_object_id();
        self.remapped.insert(id, new_id);
        let copied = self.import_value(object);
        self.target.objects.insert(new_id, copied);
        Object::Reference(new_id)
    }

    fn import_value(&mut self, value: &Object) -> Object {
        match value {
            Object::Reference(id) => self.import_reference(*id),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.import_value(item)).collect())
            }
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.import_dictionary(&stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn import_dictionary(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.import_value(value));
        }
        copied
    }
}

fn is_page_tree_node(object: &Object) -> bool {
    match object
        .as_dict()
        .and_then(|dict| dict.get(b"Type"))
        .and_then(Object::as_name)
    {
        Ok(name) => name == b"Page" || name == b"Pages",
        Err(_) => false,
    }
}

fn inherited_attribute(document: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn pages_root(document: &Document) -> Result<ObjectId, CodecError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| CodecError::Operation("No Root in trailer".into()))?;

    document
        .get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| CodecError::Operation("No Pages in catalog".into()))
}

fn page_dictionary(document: &Document, page: ObjectId) -> Result<&Dictionary, CodecError> {
    document
        .get_dictionary(page)
        .map_err(|_| CodecError::Operation(format!("Page {:?} is not a dictionary", page)))
}

fn page_dictionary_mut(
    document: &mut Document,
    page: ObjectId,
) -> Result<&mut Dictionary, CodecError> {
    document
        .get_object_mut(page)
        .and_then(Object::as_dict_mut)
        .map_err(|_| CodecError::Operation(format!("Page {:?} is not a dictionary", page)))
}

fn media_box(size: PageSize) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(i64::from(size.width)),
        Object::Integer(i64::from(size.height)),
    ])
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some((*value).into()),
        _ => None,
    }
}

struct DecodedPng {
    width: u32,
    height: u32,
    color: Vec<u8>,
    color_space: &'static str,
    alpha: Option<Vec<u8>>,
}

fn decode_png(bytes: &[u8]) -> Result<DecodedPng, CodecError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

    let mut reader = decoder
        .read_info()
        .map_err(|e| CodecError::Image(e.to_string()))?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buffer)
        .map_err(|e| CodecError::Image(e.to_string()))?;
    buffer.truncate(frame.buffer_size());

    let (color, color_space, alpha) = match frame.color_type {
        png::ColorType::Rgb => (buffer, "DeviceRGB", None),
        png::ColorType::Grayscale => (buffer, "DeviceGray", None),
        png::ColorType::Rgba => {
            let (color, alpha) = split_alpha(&buffer, 3);
            (color, "DeviceRGB", Some(alpha))
        }
        png::ColorType::GrayscaleAlpha => {
            let (color, alpha) = split_alpha(&buffer, 1);
            (color, "DeviceGray", Some(alpha))
        }
        png::ColorType::Indexed => {
            return Err(CodecError::Image("Palette image was not expanded".into()))
        }
    };

    Ok(DecodedPng {
        width: frame.width,
        height: frame.height,
        color,
        color_space,
        alpha,
    })
}

fn split_alpha(pixels: &[u8], color_channels: usize) -> (Vec<u8>, Vec<u8>) {
    let pixel_count = pixels.len() / (color_channels + 1);
    let mut color = Vec::with_capacity(pixel_count * color_channels);
    let mut alpha = Vec::with_capacity(pixel_count);

    for pixel in pixels.chunks_exact(color_channels + 1) {
        color.extend_from_slice(&pixel[..color_channels]);
        alpha.push(pixel[color_channels]);
    }
    (color, alpha)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| CodecError::Image(format!("Failed to compress image data: {}", e)))
}
