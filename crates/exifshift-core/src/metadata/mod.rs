//! Structured, in-memory form of an Exif metadata segment.
//!
//! A segment is split into four independent groups that mirror the IFDs of
//! the TIFF structure it was read from:
//! - **primary** (IFD0): make, model, orientation, timestamps, comments
//! - **capture** (Exif sub-IFD): original/digitized timestamps, user comment
//! - **gps** (GPS sub-IFD): coordinates and altitude
//! - **thumbnail** (IFD1): thumbnail attributes plus an opaque JPEG payload
//!
//! A group that is `None` carries no attributes of that kind; this is distinct
//! from a group that is present but empty.

pub mod codec;
pub mod tags;

pub use codec::{parse, serialize};

use exif::{Context, Tag};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::{PipelineError, PipelineResult};

/// Logical group a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Primary,
    Capture,
    Gps,
    Thumbnail,
}

impl Group {
    /// Designated group of a primary-image tag, fixed by the IFD the tag is
    /// defined in. Interoperability tags have no group.
    pub fn of(tag: Tag) -> Option<Group> {
        match tag.context() {
            Context::Tiff => Some(Group::Primary),
            Context::Exif => Some(Group::Capture),
            Context::Gps => Some(Group::Gps),
            _ => None,
        }
    }

    /// IFD context tags of this group are written with.
    pub(crate) fn context(self) -> Context {
        match self {
            Group::Primary | Group::Thumbnail => Context::Tiff,
            Group::Capture => Context::Exif,
            Group::Gps => Context::Gps,
        }
    }
}

/// Unsigned rational (`RATIONAL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub denom: u32,
}

impl Rational {
    pub fn new(num: u32, denom: u32) -> Self {
        Self { num, denom }
    }

    /// Evaluate as `num / denom`. A zero denominator is a numeric error,
    /// never an infinity or NaN.
    pub fn to_f64(self) -> PipelineResult<f64> {
        if self.denom == 0 {
            return Err(PipelineError::numeric(format!(
                "zero denominator in rational {}/0",
                self.num
            )));
        }
        Ok(f64::from(self.num) / f64::from(self.denom))
    }
}

/// Signed rational (`SRATIONAL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedRational {
    pub num: i32,
    pub denom: i32,
}

/// A typed tag value, one variant per TIFF field type.
///
/// ASCII values keep their raw bytes; several NUL-separated strings keep the
/// separators. Nothing is transcoded, so vendor strings that are not UTF-8
/// are written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Ascii(Vec<u8>),
    Byte(Vec<u8>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<Rational>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<SignedRational>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl TagValue {
    /// Build an ASCII value.
    pub fn ascii(s: impl Into<String>) -> Self {
        TagValue::Ascii(s.into().into_bytes())
    }

    /// The string content of an ASCII value, if it is valid UTF-8.
    pub fn as_ascii(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Display form of an ASCII value; invalid UTF-8 is replaced.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            TagValue::Ascii(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }

    /// First element of an integer value, widened to `u32`.
    pub fn first_uint(&self) -> Option<u32> {
        match self {
            TagValue::Byte(v) => v.first().map(|&x| u32::from(x)),
            TagValue::Short(v) => v.first().map(|&x| u32::from(x)),
            TagValue::Long(v) => v.first().copied(),
            _ => None,
        }
    }

    /// Rational elements of a `RATIONAL` value.
    pub fn as_rationals(&self) -> Option<&[Rational]> {
        match self {
            TagValue::Rational(v) => Some(v),
            _ => None,
        }
    }

    /// Raw byte view of byte-like values (ASCII, BYTE, UNDEFINED).
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match self {
            TagValue::Ascii(v) | TagValue::Byte(v) | TagValue::Undefined(v) => Some(v),
            _ => None,
        }
    }

    /// True when the value has no content: zero elements, or byte-like
    /// content made only of NUL terminators. Whitespace is content.
    pub fn is_empty(&self) -> bool {
        match self {
            TagValue::Ascii(v) | TagValue::Byte(v) | TagValue::Undefined(v) => {
                v.iter().all(|&b| b == 0)
            }
            TagValue::Short(v) => v.is_empty(),
            TagValue::Long(v) => v.is_empty(),
            TagValue::Rational(v) => v.is_empty(),
            TagValue::SByte(v) => v.is_empty(),
            TagValue::SShort(v) => v.is_empty(),
            TagValue::SLong(v) => v.is_empty(),
            TagValue::SRational(v) => v.is_empty(),
            TagValue::Float(v) => v.is_empty(),
            TagValue::Double(v) => v.is_empty(),
        }
    }
}

/// Tag-number keyed values of one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagGroup {
    entries: BTreeMap<u16, TagValue>,
}

impl TagGroup {
    pub fn get(&self, number: u16) -> Option<&TagValue> {
        self.entries.get(&number)
    }

    pub fn insert(&mut self, number: u16, value: TagValue) -> Option<TagValue> {
        self.entries.insert(number, value)
    }

    pub fn remove(&mut self, number: u16) -> Option<TagValue> {
        self.entries.remove(&number)
    }

    pub fn contains(&self, number: u16) -> bool {
        self.entries.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.entries.iter().map(|(&k, v)| (k, v))
    }
}

impl FromIterator<(u16, TagValue)> for TagGroup {
    fn from_iter<I: IntoIterator<Item = (u16, TagValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Thumbnail IFD attributes and the embedded JPEG, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThumbnailGroup {
    pub tags: TagGroup,
    pub jpeg: Option<Vec<u8>>,
}

/// Byte order of the TIFF structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Parsed metadata segment for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataSegment {
    /// Byte order the segment was read in and will be written in
    pub byte_order: ByteOrder,
    pub primary: Option<TagGroup>,
    pub capture: Option<TagGroup>,
    pub gps: Option<TagGroup>,
    pub thumbnail: Option<ThumbnailGroup>,
}

impl MetadataSegment {
    /// A segment with every group absent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when every group is absent.
    pub fn has_no_groups(&self) -> bool {
        self.primary.is_none()
            && self.capture.is_none()
            && self.gps.is_none()
            && self.thumbnail.is_none()
    }

    /// True when there is nothing to serialize.
    pub fn is_empty(&self) -> bool {
        let tags_empty = |g: &Option<TagGroup>| g.as_ref().is_none_or(TagGroup::is_empty);
        tags_empty(&self.primary)
            && tags_empty(&self.capture)
            && tags_empty(&self.gps)
            && self
                .thumbnail
                .as_ref()
                .is_none_or(|t| t.tags.is_empty() && t.jpeg.is_none())
    }

    /// Drop groups that carry nothing. An empty sub-IFD has no encoding, so
    /// this is the form a segment takes after a serialize/parse cycle.
    pub fn compact(mut self) -> Self {
        let drop_empty = |g: &mut Option<TagGroup>| {
            if g.as_ref().is_some_and(TagGroup::is_empty) {
                *g = None;
            }
        };
        drop_empty(&mut self.primary);
        drop_empty(&mut self.capture);
        drop_empty(&mut self.gps);
        if self
            .thumbnail
            .as_ref()
            .is_some_and(|t| t.tags.is_empty() && t.jpeg.is_none())
        {
            self.thumbnail = None;
        }
        self
    }

    /// Borrow a group, if present.
    pub fn group(&self, group: Group) -> Option<&TagGroup> {
        match group {
            Group::Primary => self.primary.as_ref(),
            Group::Capture => self.capture.as_ref(),
            Group::Gps => self.gps.as_ref(),
            Group::Thumbnail => self.thumbnail.as_ref().map(|t| &t.tags),
        }
    }

    /// Borrow a group mutably, creating it empty if absent.
    pub fn group_mut(&mut self, group: Group) -> &mut TagGroup {
        match group {
            Group::Primary => self.primary.get_or_insert_with(TagGroup::default),
            Group::Capture => self.capture.get_or_insert_with(TagGroup::default),
            Group::Gps => self.gps.get_or_insert_with(TagGroup::default),
            Group::Thumbnail => &mut self.thumbnail.get_or_insert_with(ThumbnailGroup::default).tags,
        }
    }

    /// Look up a primary-image tag in its designated group.
    pub fn get(&self, tag: Tag) -> Option<&TagValue> {
        Group::of(tag)
            .and_then(|g| self.group(g))
            .and_then(|g| g.get(tag.number()))
    }

    /// Set a primary-image tag in its designated group, creating the group
    /// if needed. Returns the previous value.
    pub fn set(&mut self, tag: Tag, value: TagValue) -> PipelineResult<Option<TagValue>> {
        let group = Group::of(tag).ok_or_else(|| {
            PipelineError::validation(format!("tag {tag} has no metadata group"))
        })?;
        Ok(self.group_mut(group).insert(tag.number(), value))
    }

    /// Remove a primary-image tag from its designated group. Absent groups
    /// are left absent.
    pub fn remove(&mut self, tag: Tag) -> Option<TagValue> {
        let number = tag.number();
        match Group::of(tag)? {
            Group::Primary => self.primary.as_mut()?.remove(number),
            Group::Capture => self.capture.as_mut()?.remove(number),
            Group::Gps => self.gps.as_mut()?.remove(number),
            Group::Thumbnail => None,
        }
    }

    /// ASCII content of a primary-image tag, if it is valid UTF-8.
    pub fn get_ascii(&self, tag: Tag) -> Option<&str> {
        self.get(tag).and_then(TagValue::as_ascii)
    }

    /// Display form of an ASCII primary-image tag.
    pub fn get_text(&self, tag: Tag) -> Option<Cow<'_, str>> {
        self.get(tag).and_then(TagValue::text)
    }
}
