//! Tags the pipeline reads or rewrites, beyond the ones `exif::Tag` names.

use exif::{Context, Tag};

/// Windows Explorer comment (UTF-16LE bytes in IFD0).
pub const XP_COMMENT: Tag = Tag(Context::Tiff, 0x9c9c);

/// Pointer and offset tags the codec regenerates on write; never stored in a
/// group.
pub(crate) fn is_structural(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::ExifIFDPointer
            | Tag::GPSInfoIFDPointer
            | Tag::InteropIFDPointer
            | Tag::JPEGInterchangeFormat
            | Tag::JPEGInterchangeFormatLength
            | Tag::StripOffsets
            | Tag::StripByteCounts
            | Tag::TileOffsets
            | Tag::TileByteCounts
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_tags() {
        assert!(is_structural(Tag::ExifIFDPointer));
        assert!(is_structural(Tag::JPEGInterchangeFormatLength));
        assert!(!is_structural(Tag::Model));
        assert!(!is_structural(XP_COMMENT));
    }
}
