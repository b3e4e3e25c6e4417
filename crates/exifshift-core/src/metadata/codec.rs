//! Binary codec between Exif (TIFF IFD) blobs and [`MetadataSegment`].
//!
//! Reading and writing of the IFD structure is delegated to `kamadak-exif`;
//! this module maps its fields onto the fixed group layout and back.

use exif::{experimental::Writer, Field, In, Reader, Tag, Value};
use std::io::Cursor;

use super::tags::is_structural;
use super::{
    ByteOrder, Group, MetadataSegment, Rational, SignedRational, TagGroup, TagValue,
    ThumbnailGroup,
};
use crate::error::{PipelineError, PipelineResult};

const TIFF_LE: &[u8] = b"II*\0";
const TIFF_BE: &[u8] = b"MM\0*";
const EXIF_PREFIX: &[u8] = b"Exif\0\0";

/// Parse a raw metadata blob into a segment.
///
/// `None` yields a segment with every group absent. A group is present only
/// when the blob stores at least one attribute in it. Any directory entry
/// pointing outside the blob is a [`PipelineError::Parse`].
pub fn parse(blob: Option<&[u8]>) -> PipelineResult<MetadataSegment> {
    let Some(blob) = blob else {
        return Ok(MetadataSegment::empty());
    };

    let tiff = tiff_payload(blob)?;
    let exif = Reader::new()
        .read_raw(tiff.to_vec())
        .map_err(|e| PipelineError::parse(e.to_string()))?;

    let mut segment = MetadataSegment {
        byte_order: if exif.little_endian() {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        },
        ..MetadataSegment::default()
    };
    let mut thumb_offset = None;
    let mut thumb_length = None;

    for field in exif.fields() {
        if field.ifd_num == In::THUMBNAIL {
            match field.tag {
                Tag::JPEGInterchangeFormat => thumb_offset = field.value.get_uint(0),
                Tag::JPEGInterchangeFormatLength => thumb_length = field.value.get_uint(0),
                tag if is_structural(tag) || Group::of(tag) != Some(Group::Primary) => {
                    tracing::debug!("Dropping thumbnail field {}", tag);
                }
                tag => {
                    if let Some(value) = from_exif_value(&field.value) {
                        segment
                            .group_mut(Group::Thumbnail)
                            .insert(tag.number(), value);
                    }
                }
            }
            continue;
        }
        if field.ifd_num != In::PRIMARY {
            tracing::debug!("Dropping {} from IFD {}", field.tag, field.ifd_num);
            continue;
        }
        if is_structural(field.tag) {
            continue;
        }

        let Some(group) = Group::of(field.tag) else {
            tracing::debug!("Dropping {} (no metadata group)", field.tag);
            continue;
        };
        match from_exif_value(&field.value) {
            Some(value) => {
                segment.group_mut(group).insert(field.tag.number(), value);
            }
            None => tracing::debug!("Dropping {} (unknown field type)", field.tag),
        }
    }

    if let (Some(offset), Some(length)) = (thumb_offset, thumb_length) {
        let (start, len) = (offset as usize, length as usize);
        let jpeg = start
            .checked_add(len)
            .and_then(|end| exif.buf().get(start..end))
            .ok_or_else(|| {
                PipelineError::parse(format!(
                    "thumbnail at {start}+{len} exceeds {} byte segment",
                    exif.buf().len()
                ))
            })?;
        segment
            .thumbnail
            .get_or_insert_with(ThumbnailGroup::default)
            .jpeg = Some(jpeg.to_vec());
    }

    Ok(segment)
}

/// Serialize a segment to a bare TIFF blob (no `Exif\0\0` prefix).
///
/// Empty groups are written as absent (see [`MetadataSegment::compact`]).
/// Returns `None` when the segment has nothing to write.
pub fn serialize(segment: &MetadataSegment) -> Result<Option<Vec<u8>>, exif::Error> {
    if segment.is_empty() {
        return Ok(None);
    }

    let mut fields = Vec::new();
    for group in [Group::Primary, Group::Capture, Group::Gps] {
        if let Some(tags) = segment.group(group) {
            push_fields(&mut fields, group, tags, In::PRIMARY);
        }
    }
    if let Some(thumbnail) = &segment.thumbnail {
        push_fields(&mut fields, Group::Thumbnail, &thumbnail.tags, In::THUMBNAIL);
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    if let Some(jpeg) = segment.thumbnail.as_ref().and_then(|t| t.jpeg.as_deref()) {
        writer.set_jpeg(jpeg, In::THUMBNAIL);
    }

    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, segment.byte_order == ByteOrder::LittleEndian)?;
    Ok(Some(buf.into_inner()))
}

/// Locate the TIFF header inside a metadata blob.
///
/// Accepts a bare TIFF structure, a JPEG-style `Exif\0\0` block, or a HEIF
/// Exif item (big-endian offset to the TIFF header, then payload).
pub(crate) fn tiff_payload(blob: &[u8]) -> PipelineResult<&[u8]> {
    let is_tiff = |b: &[u8]| b.starts_with(TIFF_LE) || b.starts_with(TIFF_BE);

    if is_tiff(blob) {
        return Ok(blob);
    }
    if let Some(rest) = blob.strip_prefix(EXIF_PREFIX) {
        return Ok(rest);
    }
    if let Some(header) = blob.get(..4) {
        let offset = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if let Some(rest) = offset.checked_add(4).and_then(|start| blob.get(start..)) {
            if is_tiff(rest) {
                return Ok(rest);
            }
        }
    }
    Err(PipelineError::parse("no TIFF header in metadata block"))
}

fn push_fields(fields: &mut Vec<Field>, group: Group, tags: &TagGroup, ifd_num: In) {
    for (number, value) in tags.iter() {
        fields.push(Field {
            tag: Tag(group.context(), number),
            ifd_num,
            value: to_exif_value(value),
        });
    }
}

/// Map a decoded field value. Only values of an unknown TIFF field type
/// have no mapping; their element size is unknown, so they cannot be copied.
fn from_exif_value(value: &Value) -> Option<TagValue> {
    let converted = match value {
        Value::Ascii(parts) => TagValue::Ascii(parts.join(&0u8)),
        Value::Byte(v) => TagValue::Byte(v.clone()),
        Value::Short(v) => TagValue::Short(v.clone()),
        Value::Long(v) => TagValue::Long(v.clone()),
        Value::Rational(v) => {
            TagValue::Rational(v.iter().map(|r| Rational::new(r.num, r.denom)).collect())
        }
        Value::SByte(v) => TagValue::SByte(v.clone()),
        Value::Undefined(v, _) => TagValue::Undefined(v.clone()),
        Value::SShort(v) => TagValue::SShort(v.clone()),
        Value::SLong(v) => TagValue::SLong(v.clone()),
        Value::SRational(v) => TagValue::SRational(
            v.iter()
                .map(|r| SignedRational {
                    num: r.num,
                    denom: r.denom,
                })
                .collect(),
        ),
        Value::Float(v) => TagValue::Float(v.clone()),
        Value::Double(v) => TagValue::Double(v.clone()),
        // Value::Unknown
        _ => return None,
    };
    Some(converted)
}

fn to_exif_value(value: &TagValue) -> Value {
    match value {
        TagValue::Ascii(v) => Value::Ascii(v.split(|&b| b == 0).map(<[u8]>::to_vec).collect()),
        TagValue::Byte(v) => Value::Byte(v.clone()),
        TagValue::Short(v) => Value::Short(v.clone()),
        TagValue::Long(v) => Value::Long(v.clone()),
        TagValue::Rational(v) => Value::Rational(
            v.iter()
                .map(|r| exif::Rational {
                    num: r.num,
                    denom: r.denom,
                })
                .collect(),
        ),
        TagValue::SByte(v) => Value::SByte(v.clone()),
        TagValue::Undefined(v) => Value::Undefined(v.clone(), 0),
        TagValue::SShort(v) => Value::SShort(v.clone()),
        TagValue::SLong(v) => Value::SLong(v.clone()),
        TagValue::SRational(v) => Value::SRational(
            v.iter()
                .map(|r| exif::SRational {
                    num: r.num,
                    denom: r.denom,
                })
                .collect(),
        ),
        TagValue::Float(v) => Value::Float(v.clone()),
        TagValue::Double(v) => Value::Double(v.clone()),
    }
}
