//! HEIF/HEIC single-image container decoding.
//!
//! The file is an ISO base media file: a flat sequence of boxes (`ftyp`,
//! `meta`, `mdat`, ...). Items are described inside `meta`:
//! - `pitm` names the primary item
//! - `iinf` lists items and their four-character types
//! - `iloc` maps each item to extents in the file or in `idat`
//! - `iprp` associates properties such as `ispe` (image size) with items
//! - `iref` links metadata items to the image they describe (`cdsc`)
//!
//! The `Exif` item is returned verbatim. The primary item's coded bytes are
//! handed to the [`ItemDecoder`] registered for its item type. With the
//! `heif` feature, primary items without a registered decoder (HEVC, AV1,
//! `grid`) are decoded by libheif instead, and files this parser rejects get
//! their Exif block from libheif.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::decode::{decode_raster, ContainerDecoder, DecodedImage, PixelBuffer};
use crate::error::{PipelineError, PipelineResult};

/// Four-character code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const JPEG: FourCc = FourCc(*b"jpeg");
    pub const EXIF: FourCc = FourCc(*b"Exif");
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Decodes the coded bytes of one image item into pixels.
pub trait ItemDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> PipelineResult<PixelBuffer>;
}

/// Built-in decoder for JPEG-coded items.
pub struct JpegItemDecoder;

impl ItemDecoder for JpegItemDecoder {
    fn decode(&self, data: &[u8]) -> PipelineResult<PixelBuffer> {
        Ok(PixelBuffer::from_dynamic(decode_raster(data)?))
    }
}

/// HEIF container decoder with a registry of item decoders.
#[derive(Clone)]
pub struct HeifDecoder {
    decoders: HashMap<FourCc, Arc<dyn ItemDecoder>>,
}

impl Default for HeifDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeifDecoder {
    /// Decoder with the built-in `jpeg` item codec registered.
    pub fn new() -> Self {
        let mut decoders: HashMap<FourCc, Arc<dyn ItemDecoder>> = HashMap::new();
        decoders.insert(FourCc::JPEG, Arc::new(JpegItemDecoder));
        Self { decoders }
    }

    /// Register (or replace) the decoder for an item type.
    pub fn with_decoder(mut self, item_type: FourCc, decoder: Arc<dyn ItemDecoder>) -> Self {
        self.decoders.insert(item_type, decoder);
        self
    }
}

impl ContainerDecoder for HeifDecoder {
    fn decode(&self, bytes: &[u8]) -> PipelineResult<DecodedImage> {
        let container = match HeifContainer::parse(bytes) {
            Ok(container) => container,
            Err(err) => {
                return Ok(DecodedImage {
                    pixels: fallback_pixels(bytes, err)?,
                    metadata: fallback_exif(bytes, None)?,
                })
            }
        };
        let primary = container.primary_item()?;

        let pixels = match self.decoders.get(&primary.item_type) {
            Some(decoder) => decoder.decode(&container.item_data(primary.id)?)?,
            None => fallback_pixels(
                bytes,
                PipelineError::container(format!(
                    "no decoder registered for primary item type '{}'",
                    primary.item_type
                )),
            )?,
        };
        pixels.check().map_err(PipelineError::container)?;

        if let Some((w, h)) = primary.size {
            if (w, h) != (pixels.width, pixels.height) {
                tracing::debug!(
                    "Primary item declares {}x{}, decoded {}x{}",
                    w,
                    h,
                    pixels.width,
                    pixels.height
                );
            }
        }

        Ok(DecodedImage {
            pixels,
            metadata: container.exif_blob()?,
        })
    }

    fn read_metadata(&self, bytes: &[u8]) -> PipelineResult<Option<Vec<u8>>> {
        match HeifContainer::parse(bytes).and_then(|c| c.exif_blob()) {
            Ok(blob) => Ok(blob),
            Err(err) => fallback_exif(bytes, Some(err)),
        }
    }
}

#[cfg(feature = "heif")]
fn fallback_pixels(bytes: &[u8], err: PipelineError) -> PipelineResult<PixelBuffer> {
    tracing::debug!("Decoding with libheif: {}", err);
    super::libheif::decode_primary(bytes)
}

#[cfg(not(feature = "heif"))]
fn fallback_pixels(_bytes: &[u8], err: PipelineError) -> PipelineResult<PixelBuffer> {
    match err {
        PipelineError::Format { path, message } if message.starts_with("no decoder") => {
            Err(PipelineError::Format {
                path,
                message: format!("{message} (build with the `heif` feature for HEVC/AV1)"),
            })
        }
        other => Err(other),
    }
}

/// Exif block for a file the box parser could not handle. `None` for `err`
/// means the caller only wants metadata if libheif can supply it.
#[cfg(feature = "heif")]
fn fallback_exif(bytes: &[u8], err: Option<PipelineError>) -> PipelineResult<Option<Vec<u8>>> {
    if let Some(err) = &err {
        tracing::debug!("Reading Exif with libheif: {}", err);
    }
    super::libheif::exif_blob(bytes)
}

#[cfg(not(feature = "heif"))]
fn fallback_exif(_bytes: &[u8], err: Option<PipelineError>) -> PipelineResult<Option<Vec<u8>>> {
    match err {
        Some(err) => Err(err),
        None => Ok(None),
    }
}

/// One entry of `iinf`, joined with its `ispe` size.
#[derive(Debug, Clone)]
pub struct ItemInfo {
    pub id: u32,
    pub item_type: FourCc,
    pub size: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: u64,
    length: u64,
}

#[derive(Debug, Clone)]
struct ItemLocation {
    construction_method: u8,
    base_offset: u64,
    extents: Vec<Extent>,
}

/// Parsed item table of a HEIF file, borrowing the file bytes.
#[derive(Debug)]
pub struct HeifContainer<'a> {
    file: &'a [u8],
    primary_id: Option<u32>,
    items: Vec<ItemInfo>,
    locations: HashMap<u32, ItemLocation>,
    idat: Option<&'a [u8]>,
    /// `cdsc` references: metadata item id -> described item ids
    described: HashMap<u32, Vec<u32>>,
}

impl<'a> HeifContainer<'a> {
    /// Parse the top-level box sequence and the `meta` box.
    pub fn parse(file: &'a [u8]) -> PipelineResult<Self> {
        let top = read_boxes(file)?;
        match top.first() {
            Some(b) if b.kind == *b"ftyp" => {}
            _ => return Err(PipelineError::container("missing leading 'ftyp' box")),
        }
        let meta = top
            .iter()
            .find(|b| b.kind == *b"meta")
            .ok_or_else(|| PipelineError::container("missing 'meta' box"))?;

        let mut container = Self {
            file,
            primary_id: None,
            items: Vec::new(),
            locations: HashMap::new(),
            idat: None,
            described: HashMap::new(),
        };

        let mut sizes: HashMap<u32, (u32, u32)> = HashMap::new();
        for child in read_boxes(full_box_body(meta.body)?.1)? {
            match &child.kind {
                b"hdlr" => {
                    let mut r = ByteReader::new(full_box_body(child.body)?.1, "hdlr");
                    r.skip(4)?;
                    let handler = r.fourcc()?;
                    if handler != FourCc(*b"pict") {
                        return Err(PipelineError::container(format!(
                            "unsupported meta handler '{handler}'"
                        )));
                    }
                }
                b"pitm" => {
                    let (version, body) = full_box_body(child.body)?;
                    let mut r = ByteReader::new(body, "pitm");
                    container.primary_id = Some(r.item_id(version == 0)?);
                }
                b"iinf" => container.items = parse_iinf(child.body)?,
                b"iloc" => container.locations = parse_iloc(child.body)?,
                b"iprp" => sizes = parse_iprp(child.body)?,
                b"iref" => container.described = parse_iref(child.body)?,
                b"idat" => container.idat = Some(child.body),
                _ => {}
            }
        }

        for item in &mut container.items {
            item.size = sizes.get(&item.id).copied();
        }
        Ok(container)
    }

    pub fn items(&self) -> &[ItemInfo] {
        &self.items
    }

    /// The item `pitm` names.
    pub fn primary_item(&self) -> PipelineResult<&ItemInfo> {
        let id = self
            .primary_id
            .ok_or_else(|| PipelineError::container("no primary item ('pitm' missing)"))?;
        self.items
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| PipelineError::container(format!("primary item {id} not in 'iinf'")))
    }

    /// Raw bytes of the Exif item describing the primary image, falling back
    /// to the first Exif item.
    pub fn exif_blob(&self) -> PipelineResult<Option<Vec<u8>>> {
        let mut exif_items = self.items.iter().filter(|i| i.item_type == FourCc::EXIF);
        let linked = self.primary_id.and_then(|primary| {
            exif_items.clone().find(|item| {
                self.described
                    .get(&item.id)
                    .is_some_and(|targets| targets.contains(&primary))
            })
        });
        match linked.or_else(|| exif_items.next()) {
            Some(item) => self.item_data(item.id).map(Some),
            None => Ok(None),
        }
    }

    /// Concatenated extents of an item. An item never holds more bytes than
    /// the source it is stored in.
    pub fn item_data(&self, id: u32) -> PipelineResult<Vec<u8>> {
        let location = self
            .locations
            .get(&id)
            .ok_or_else(|| PipelineError::container(format!("item {id} has no 'iloc' entry")))?;
        let source = match location.construction_method {
            0 => self.file,
            1 => self
                .idat
                .ok_or_else(|| PipelineError::container(format!("item {id} refers to missing 'idat'")))?,
            m => {
                return Err(PipelineError::container(format!(
                    "item {id} uses unsupported construction method {m}"
                )))
            }
        };

        let mut data = Vec::new();
        for extent in &location.extents {
            let start = location
                .base_offset
                .checked_add(extent.offset)
                .and_then(|s| usize::try_from(s).ok())
                .filter(|&s| s <= source.len());
            let Some(start) = start else {
                return Err(PipelineError::container(format!(
                    "item {id} extent starts outside the file"
                )));
            };
            // Length zero means "to the end of the source".
            let end = if extent.length == 0 {
                Some(source.len())
            } else {
                usize::try_from(extent.length)
                    .ok()
                    .and_then(|len| start.checked_add(len))
                    .filter(|&end| end <= source.len())
            };
            let Some(end) = end else {
                return Err(PipelineError::container(format!(
                    "item {id} extent overruns the file"
                )));
            };
            if end - start > source.len() - data.len() {
                return Err(PipelineError::container(format!(
                    "item {id} extents add up to more than its {} byte source",
                    source.len()
                )));
            }
            data.extend_from_slice(&source[start..end]);
        }
        Ok(data)
    }
}

struct BmffBox<'a> {
    kind: [u8; 4],
    body: &'a [u8],
}

/// Split a byte range into boxes. A box whose size overruns its parent is a
/// format error.
fn read_boxes(data: &[u8]) -> PipelineResult<Vec<BmffBox<'_>>> {
    let mut boxes = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let mut r = ByteReader::new(&data[pos..], "box header");
        let size32 = r.u32()?;
        let kind = r.fourcc()?.0;
        let (size, header) = match size32 {
            0 => (data.len() - pos, 8),
            1 => {
                let large = usize::try_from(r.u64()?).map_err(|_| {
                    PipelineError::container("box size exceeds addressable memory")
                })?;
                (large, 16)
            }
            n => (n as usize, 8),
        };
        if size < header || size > data.len() - pos {
            return Err(PipelineError::container(format!(
                "box '{}' of {} bytes overruns its parent",
                FourCc(kind),
                size
            )));
        }
        boxes.push(BmffBox {
            kind,
            body: &data[pos + header..pos + size],
        });
        pos += size;
    }
    Ok(boxes)
}

/// Split a FullBox body into its version and the remaining payload.
fn full_box_body(body: &[u8]) -> PipelineResult<(u8, &[u8])> {
    if body.len() < 4 {
        return Err(PipelineError::container("truncated full box header"));
    }
    Ok((body[0], &body[4..]))
}

fn full_box_flags(body: &[u8]) -> u32 {
    u32::from_be_bytes([0, body[1], body[2], body[3]])
}

fn parse_iinf(body: &[u8]) -> PipelineResult<Vec<ItemInfo>> {
    let (version, payload) = full_box_body(body)?;
    let mut r = ByteReader::new(payload, "iinf");
    let declared = if version == 0 { u32::from(r.u16()?) } else { r.u32()? };

    let mut items = Vec::new();
    for infe in read_boxes(r.rest())? {
        if infe.kind != *b"infe" {
            continue;
        }
        let (version, payload) = full_box_body(infe.body)?;
        if version < 2 {
            tracing::debug!("Skipping item info entry version {}", version);
            continue;
        }
        let mut r = ByteReader::new(payload, "infe");
        let id = r.item_id(version == 2)?;
        r.skip(2)?; // item_protection_index
        items.push(ItemInfo {
            id,
            item_type: r.fourcc()?,
            size: None,
        });
    }
    if items.len() as u32 != declared {
        tracing::debug!("iinf declares {} items, {} readable", declared, items.len());
    }
    Ok(items)
}

fn parse_iloc(body: &[u8]) -> PipelineResult<HashMap<u32, ItemLocation>> {
    let (version, payload) = full_box_body(body)?;
    if version > 2 {
        return Err(PipelineError::container(format!(
            "unsupported 'iloc' version {version}"
        )));
    }
    let mut r = ByteReader::new(payload, "iloc");
    let sizes = r.u8()?;
    let (offset_size, length_size) = (sizes >> 4, sizes & 0x0f);
    let sizes = r.u8()?;
    let base_offset_size = sizes >> 4;
    let index_size = if version >= 1 { sizes & 0x0f } else { 0 };
    let count = if version < 2 { u32::from(r.u16()?) } else { r.u32()? };

    let mut locations = HashMap::new();
    for _ in 0..count {
        let id = r.item_id(version < 2)?;
        let construction_method = if version >= 1 {
            (r.u16()? & 0x000f) as u8
        } else {
            0
        };
        r.skip(2)?; // data_reference_index
        let base_offset = r.sized(base_offset_size)?;
        let extent_count = r.u16()?;
        let mut extents = Vec::with_capacity(usize::from(extent_count));
        for _ in 0..extent_count {
            if index_size > 0 {
                r.sized(index_size)?;
            }
            extents.push(Extent {
                offset: r.sized(offset_size)?,
                length: r.sized(length_size)?,
            });
        }
        locations.insert(
            id,
            ItemLocation {
                construction_method,
                base_offset,
                extents,
            },
        );
    }
    Ok(locations)
}

/// Item sizes from `ispe` properties associated through `ipma`.
fn parse_iprp(body: &[u8]) -> PipelineResult<HashMap<u32, (u32, u32)>> {
    let children = read_boxes(body)?;
    let properties: Vec<BmffBox<'_>> = match children.iter().find(|b| b.kind == *b"ipco") {
        Some(ipco) => read_boxes(ipco.body)?,
        None => return Ok(HashMap::new()),
    };

    let mut sizes = HashMap::new();
    for ipma in children.iter().filter(|b| b.kind == *b"ipma") {
        let (version, payload) = full_box_body(ipma.body)?;
        let wide_index = full_box_flags(ipma.body) & 1 == 1;
        let mut r = ByteReader::new(payload, "ipma");
        for _ in 0..r.u32()? {
            let id = r.item_id(version < 1)?;
            for _ in 0..r.u8()? {
                let index = if wide_index {
                    usize::from(r.u16()? & 0x7fff)
                } else {
                    usize::from(r.u8()? & 0x7f)
                };
                // Property indices are 1-based; 0 means "none".
                let Some(prop) = index.checked_sub(1).and_then(|i| properties.get(i)) else {
                    continue;
                };
                if prop.kind == *b"ispe" {
                    let mut p = ByteReader::new(full_box_body(prop.body)?.1, "ispe");
                    sizes.insert(id, (p.u32()?, p.u32()?));
                }
            }
        }
    }
    Ok(sizes)
}

fn parse_iref(body: &[u8]) -> PipelineResult<HashMap<u32, Vec<u32>>> {
    let (version, payload) = full_box_body(body)?;
    let mut described = HashMap::new();
    for reference in read_boxes(payload)? {
        if reference.kind != *b"cdsc" {
            continue;
        }
        let mut r = ByteReader::new(reference.body, "iref");
        let from = r.item_id(version == 0)?;
        let count = r.u16()?;
        let targets = (0..count)
            .map(|_| r.item_id(version == 0))
            .collect::<PipelineResult<Vec<_>>>()?;
        described.entry(from).or_insert_with(Vec::new).extend(targets);
    }
    Ok(described)
}

/// Big-endian reader over a box payload.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    fn take(&mut self, n: usize) -> PipelineResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| PipelineError::container(format!("truncated '{}'", self.context)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> PipelineResult<()> {
        self.take(n).map(|_| ())
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn u8(&mut self) -> PipelineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> PipelineResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> PipelineResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> PipelineResult<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    fn fourcc(&mut self) -> PipelineResult<FourCc> {
        let b = self.take(4)?;
        Ok(FourCc([b[0], b[1], b[2], b[3]]))
    }

    /// Item ids are 16 bits in early box versions, 32 bits later.
    fn item_id(&mut self, short: bool) -> PipelineResult<u32> {
        if short {
            self.u16().map(u32::from)
        } else {
            self.u32()
        }
    }

    /// Unsigned integer of 0, 4 or 8 bytes, as sized by `iloc`.
    fn sized(&mut self, size: u8) -> PipelineResult<u64> {
        match size {
            0 => Ok(0),
            4 => self.u32().map(u64::from),
            8 => self.u64(),
            n => Err(PipelineError::container(format!(
                "invalid field size {n} in '{}'",
                self.context
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::PixelLayout;
    use crate::testutil::{self, HeifBuilder};

    #[test]
    fn test_decode_jpeg_coded_primary_with_exif() {
        let tiff = testutil::tiff_blob();
        let file = HeifBuilder::new(testutil::jpeg_bytes(6, 4))
            .exif(&tiff)
            .build();

        let decoded = HeifDecoder::new().decode(&file).unwrap();
        assert_eq!((decoded.pixels.width, decoded.pixels.height), (6, 4));

        let blob = decoded.metadata.unwrap();
        assert_eq!(&blob[..4], &0u32.to_be_bytes());
        assert_eq!(&blob[4..], tiff.as_slice());
    }

    #[test]
    fn test_container_reports_items() {
        let file = HeifBuilder::new(testutil::jpeg_bytes(6, 4))
            .exif(&testutil::tiff_blob())
            .build();
        let container = HeifContainer::parse(&file).unwrap();

        let primary = container.primary_item().unwrap();
        assert_eq!(primary.item_type, FourCc::JPEG);
        assert_eq!(primary.size, Some((6, 4)));
        assert_eq!(container.items().len(), 2);
    }

    #[test]
    fn test_read_metadata_without_exif_item() {
        let file = HeifBuilder::new(testutil::jpeg_bytes(2, 2)).build();
        assert!(HeifDecoder::new().read_metadata(&file).unwrap().is_none());
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_unregistered_item_type_is_format_error() {
        let file = HeifBuilder::new(vec![0u8; 32]).item_type(*b"hvc1").build();
        let err = HeifDecoder::new().decode(&file).unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
        assert!(err.to_string().contains("hvc1"));
        assert!(err.to_string().contains("`heif` feature"));

        // Metadata is still readable without a pixel codec.
        assert!(HeifDecoder::new().read_metadata(&file).is_ok());
    }

    #[cfg(feature = "heif")]
    #[test]
    fn test_undecodable_hevc_item_is_format_error() {
        let file = HeifBuilder::new(vec![0u8; 32]).item_type(*b"hvc1").build();
        let err = HeifDecoder::new().decode(&file).unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
        assert!(err.to_string().contains("libheif"));
    }

    #[test]
    fn test_registered_decoder_is_used() {
        struct Gray;
        impl ItemDecoder for Gray {
            fn decode(&self, _data: &[u8]) -> PipelineResult<PixelBuffer> {
                PixelBuffer::new(PixelLayout::Luma8, 3, 1, 3, vec![7; 3])
            }
        }
        let file = HeifBuilder::new(vec![0u8; 8]).item_type(*b"hvc1").build();
        let decoder = HeifDecoder::new().with_decoder(FourCc(*b"hvc1"), Arc::new(Gray));
        let decoded = decoder.decode(&file).unwrap();
        assert_eq!(decoded.pixels.data, vec![7; 3]);
    }

    #[test]
    fn test_missing_primary_is_format_error() {
        let file = HeifBuilder::new(testutil::jpeg_bytes(2, 2))
            .without_pitm()
            .build();
        let err = HeifDecoder::new().decode(&file).unwrap_err();
        assert!(err.to_string().contains("no primary item"));
    }

    #[test]
    fn test_overrunning_box_is_format_error() {
        let mut file = HeifBuilder::new(testutil::jpeg_bytes(2, 2)).build();
        // Inflate the ftyp size past the end of the file.
        file[..4].copy_from_slice(&u32::MAX.to_be_bytes());
        let err = HeifContainer::parse(&file).unwrap_err();
        assert!(err.to_string().contains("overruns"));
    }

    #[test]
    fn test_repeated_whole_file_extents_are_capped() {
        let file = HeifBuilder::new(testutil::jpeg_bytes(2, 2))
            .whole_file_extents(u16::MAX)
            .build();
        let container = HeifContainer::parse(&file).unwrap();
        let err = container.item_data(1).unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
        assert!(err.to_string().contains("more than its"));

        // A single whole-file extent is still allowed.
        let file = HeifBuilder::new(testutil::jpeg_bytes(2, 2))
            .whole_file_extents(1)
            .build();
        let data = HeifContainer::parse(&file).unwrap().item_data(1).unwrap();
        assert_eq!(data, file);
    }

    #[test]
    fn test_truncated_extent_is_format_error() {
        let mut file = HeifBuilder::new(testutil::jpeg_bytes(2, 2)).build();
        let len = file.len();
        // Drop the tail of mdat and fix up its box size so only the extent
        // check can fail.
        file.truncate(len - 10);
        testutil::patch_last_box_size(&mut file);
        let err = HeifDecoder::new().decode(&file).unwrap_err();
        assert!(err.to_string().contains("overruns the file"));
    }
}
