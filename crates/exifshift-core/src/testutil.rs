//! In-memory fixtures shared by unit tests.

use exif::Tag;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use img_parts::{jpeg::Jpeg, Bytes, ImageEXIF};

use crate::metadata::{self, MetadataSegment, Rational, TagValue};

/// Timestamp carried by [`sample_segment`].
pub const SAMPLE_STAMP: &str = "2023:05:01 14:22:09";

/// RGB gradient encoded as a baseline JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height)
        .flat_map(|i| {
            let v = (i * 255 / (width * height).max(1)) as u8;
            [v, 255 - v, 128]
        })
        .collect();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// JPEG with `tiff` attached as its APP1 Exif segment.
pub fn jpeg_with_exif(width: u32, height: u32, tiff: &[u8]) -> Vec<u8> {
    let mut jpeg = Jpeg::from_bytes(jpeg_bytes(width, height).into()).unwrap();
    jpeg.set_exif(Some(Bytes::copy_from_slice(tiff)));
    jpeg.encoder().bytes().to_vec()
}

/// Phone-like metadata without GPS.
pub fn sample_segment() -> MetadataSegment {
    let mut seg = MetadataSegment::empty();
    seg.set(Tag::Make, TagValue::ascii("Apple")).unwrap();
    seg.set(Tag::Model, TagValue::ascii("iPhone 12")).unwrap();
    seg.set(Tag::Orientation, TagValue::Short(vec![6])).unwrap();
    seg.set(Tag::DateTime, TagValue::ascii(SAMPLE_STAMP)).unwrap();
    seg.set(Tag::DateTimeOriginal, TagValue::ascii(SAMPLE_STAMP))
        .unwrap();
    seg
}

/// Add whole-number DMS latitude/longitude to a segment.
pub fn with_gps(
    mut seg: MetadataSegment,
    lat: [u32; 3],
    lat_ref: &str,
    lon: [u32; 3],
    lon_ref: &str,
) -> MetadataSegment {
    let dms = |v: [u32; 3]| TagValue::Rational(v.iter().map(|&n| Rational::new(n, 1)).collect());
    seg.set(Tag::GPSLatitudeRef, TagValue::ascii(lat_ref)).unwrap();
    seg.set(Tag::GPSLatitude, dms(lat)).unwrap();
    seg.set(Tag::GPSLongitudeRef, TagValue::ascii(lon_ref)).unwrap();
    seg.set(Tag::GPSLongitude, dms(lon)).unwrap();
    seg
}

/// [`sample_segment`] serialized as a bare TIFF structure.
pub fn tiff_blob() -> Vec<u8> {
    metadata::serialize(&sample_segment()).unwrap().unwrap()
}

/// Little-endian TIFF whose only IFD entry points far past the buffer.
pub fn tiff_with_dangling_entry() -> Vec<u8> {
    let mut blob = b"II*\0".to_vec();
    blob.extend_from_slice(&8u32.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes());
    blob.extend_from_slice(&0x010fu16.to_le_bytes()); // Make
    blob.extend_from_slice(&2u16.to_le_bytes()); // ASCII
    blob.extend_from_slice(&20u32.to_le_bytes());
    blob.extend_from_slice(&0x1000u32.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob
}

fn bmff_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn full_box(kind: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut payload = flags.to_be_bytes().to_vec();
    payload[0] = version;
    payload.extend_from_slice(body);
    bmff_box(kind, &payload)
}

/// Rewrite the size of the last top-level box so it ends at end of file.
pub fn patch_last_box_size(file: &mut [u8]) {
    let mut pos = 0usize;
    let mut last = 0usize;
    while pos + 8 <= file.len() {
        last = pos;
        let size = u32::from_be_bytes([file[pos], file[pos + 1], file[pos + 2], file[pos + 3]]);
        pos += size as usize;
    }
    let size = (file.len() - last) as u32;
    file[last..last + 4].copy_from_slice(&size.to_be_bytes());
}

/// Builds minimal single-image HEIF files.
///
/// The primary item (id 1) lives in `mdat`; an optional Exif item (id 2) is
/// stored in `idat` and linked to the primary with a `cdsc` reference.
pub struct HeifBuilder {
    primary: Vec<u8>,
    item_type: [u8; 4],
    size: Option<(u32, u32)>,
    exif: Option<Vec<u8>>,
    pitm: bool,
    whole_file_extents: Option<u16>,
}

impl HeifBuilder {
    pub fn new(primary: Vec<u8>) -> Self {
        let size = image::load_from_memory(&primary)
            .ok()
            .map(|img| (img.width(), img.height()));
        Self {
            primary,
            item_type: *b"jpeg",
            size,
            exif: None,
            pitm: true,
            whole_file_extents: None,
        }
    }

    pub fn item_type(mut self, item_type: [u8; 4]) -> Self {
        self.item_type = item_type;
        self
    }

    /// Attach a TIFF blob as the Exif item (offset header is added here).
    pub fn exif(mut self, tiff: &[u8]) -> Self {
        let mut item = 0u32.to_be_bytes().to_vec();
        item.extend_from_slice(tiff);
        self.exif = Some(item);
        self
    }

    pub fn without_pitm(mut self) -> Self {
        self.pitm = false;
        self
    }

    /// Locate the primary item as `count` extents that each span the whole
    /// file (offset 0, length 0).
    pub fn whole_file_extents(mut self, count: u16) -> Self {
        self.whole_file_extents = Some(count);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let ftyp = bmff_box(b"ftyp", b"heic\0\0\0\0mif1heic");
        // Primary data offset is patched in after the meta box size is known.
        let meta = self.meta(0);
        let mdat_data_offset = (ftyp.len() + meta.len() + 8) as u32;
        let meta = self.meta(mdat_data_offset);

        let mut file = ftyp;
        file.extend_from_slice(&meta);
        file.extend_from_slice(&bmff_box(b"mdat", &self.primary));
        file
    }

    fn meta(&self, primary_offset: u32) -> Vec<u8> {
        let mut hdlr = 0u32.to_be_bytes().to_vec();
        hdlr.extend_from_slice(b"pict");
        hdlr.extend_from_slice(&[0u8; 12]);
        hdlr.push(0);

        let mut children = full_box(b"hdlr", 0, 0, &hdlr);
        if self.pitm {
            children.extend(full_box(b"pitm", 0, 0, &1u16.to_be_bytes()));
        }

        let mut entries = vec![(1u16, self.item_type)];
        if self.exif.is_some() {
            entries.push((2, *b"Exif"));
        }
        let mut iinf = (entries.len() as u16).to_be_bytes().to_vec();
        for (id, kind) in &entries {
            let mut infe = id.to_be_bytes().to_vec();
            infe.extend_from_slice(&0u16.to_be_bytes());
            infe.extend_from_slice(kind);
            infe.push(0); // empty item name
            iinf.extend(full_box(b"infe", 2, 0, &infe));
        }
        children.extend(full_box(b"iinf", 0, 0, &iinf));

        // iloc v1: 4-byte offsets and lengths, no base offset, no index.
        let mut iloc = vec![0x44, 0x00];
        iloc.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        let mut push_loc = |id: u16, method: u16, extents: &[(u32, u32)]| {
            iloc.extend_from_slice(&id.to_be_bytes());
            iloc.extend_from_slice(&method.to_be_bytes());
            iloc.extend_from_slice(&0u16.to_be_bytes());
            iloc.extend_from_slice(&(extents.len() as u16).to_be_bytes());
            for (offset, length) in extents {
                iloc.extend_from_slice(&offset.to_be_bytes());
                iloc.extend_from_slice(&length.to_be_bytes());
            }
        };
        match self.whole_file_extents {
            Some(count) => push_loc(1, 0, &vec![(0, 0); usize::from(count)]),
            None => push_loc(1, 0, &[(primary_offset, self.primary.len() as u32)]),
        }
        if let Some(exif) = &self.exif {
            push_loc(2, 1, &[(0, exif.len() as u32)]);
        }
        children.extend(full_box(b"iloc", 1, 0, &iloc));

        if let Some((w, h)) = self.size {
            let mut ispe = w.to_be_bytes().to_vec();
            ispe.extend_from_slice(&h.to_be_bytes());
            let ipco = bmff_box(b"ipco", &full_box(b"ispe", 0, 0, &ispe));
            let mut ipma = 1u32.to_be_bytes().to_vec();
            ipma.extend_from_slice(&1u16.to_be_bytes());
            ipma.push(1);
            ipma.push(0x81); // essential, property 1
            let mut iprp = ipco;
            iprp.extend(full_box(b"ipma", 0, 0, &ipma));
            children.extend(bmff_box(b"iprp", &iprp));
        }

        if let Some(exif) = &self.exif {
            let mut cdsc = 2u16.to_be_bytes().to_vec();
            cdsc.extend_from_slice(&1u16.to_be_bytes());
            cdsc.extend_from_slice(&1u16.to_be_bytes());
            children.extend(full_box(b"iref", 0, 0, &bmff_box(b"cdsc", &cdsc)));
            children.extend(bmff_box(b"idat", exif));
        }

        full_box(b"meta", 0, 0, &children)
    }
}
