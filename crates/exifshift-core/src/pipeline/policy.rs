//! Content policy: reject images whose metadata carries unwanted markers.

use exif::Tag;
use serde::{Deserialize, Serialize};

use crate::metadata::{tags::XP_COMMENT, MetadataSegment};

/// Byte signatures in UserComment written by disallowed editing apps.
const APP_SIGNATURES: &[&[u8]] = &[b"Douyin", b"douyin_beauty_me"];

/// Why an image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    DescriptionPresent,
    CommentPresent,
    DisallowedAppSignature,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RejectReason::DescriptionPresent => "description-present",
            RejectReason::CommentPresent => "comment-present",
            RejectReason::DisallowedAppSignature => "disallowed-app-signature",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    Reject(RejectReason),
    Continue,
}

/// Evaluate the policy. Checks run in a fixed order and the first match wins.
pub fn evaluate(segment: &MetadataSegment) -> PolicyVerdict {
    let present = |tag: Tag| segment.get(tag).is_some_and(|v| !v.is_empty());

    if present(Tag::ImageDescription) {
        return PolicyVerdict::Reject(RejectReason::DescriptionPresent);
    }
    if present(XP_COMMENT) {
        return PolicyVerdict::Reject(RejectReason::CommentPresent);
    }
    let signed = segment
        .get(Tag::UserComment)
        .and_then(|v| v.raw_bytes())
        .is_some_and(|bytes| APP_SIGNATURES.iter().any(|sig| contains(bytes, sig)));
    if signed {
        return PolicyVerdict::Reject(RejectReason::DisallowedAppSignature);
    }
    PolicyVerdict::Continue
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TagValue;

    fn user_comment(payload: &[u8]) -> TagValue {
        let mut bytes = b"ASCII\0\0\0".to_vec();
        bytes.extend_from_slice(payload);
        TagValue::Undefined(bytes)
    }

    #[test]
    fn test_clean_segment_continues() {
        let mut seg = MetadataSegment::empty();
        seg.set(Tag::Model, TagValue::ascii("Pixel 7")).unwrap();
        seg.set(Tag::UserComment, user_comment(b"holiday")).unwrap();
        assert_eq!(evaluate(&seg), PolicyVerdict::Continue);
        assert_eq!(evaluate(&MetadataSegment::empty()), PolicyVerdict::Continue);
    }

    #[test]
    fn test_description_wins_over_comment() {
        let mut seg = MetadataSegment::empty();
        seg.set(Tag::ImageDescription, TagValue::ascii("sunset")).unwrap();
        seg.set(XP_COMMENT, TagValue::Byte(vec![b'h', 0, b'i', 0, 0, 0]))
            .unwrap();
        assert_eq!(
            evaluate(&seg),
            PolicyVerdict::Reject(RejectReason::DescriptionPresent)
        );
    }

    #[test]
    fn test_whitespace_description_is_present() {
        let mut seg = MetadataSegment::empty();
        seg.set(Tag::ImageDescription, TagValue::ascii("   ")).unwrap();
        assert_eq!(
            evaluate(&seg),
            PolicyVerdict::Reject(RejectReason::DescriptionPresent)
        );

        let mut seg = MetadataSegment::empty();
        seg.set(XP_COMMENT, TagValue::Byte(vec![b' ', 0, 0, 0])).unwrap();
        assert_eq!(
            evaluate(&seg),
            PolicyVerdict::Reject(RejectReason::CommentPresent)
        );
    }

    #[test]
    fn test_empty_description_is_ignored() {
        let mut seg = MetadataSegment::empty();
        seg.set(Tag::ImageDescription, TagValue::ascii("")).unwrap();
        seg.set(XP_COMMENT, TagValue::Byte(vec![b'h', 0, 0, 0])).unwrap();
        assert_eq!(
            evaluate(&seg),
            PolicyVerdict::Reject(RejectReason::CommentPresent)
        );

        seg.set(Tag::ImageDescription, TagValue::ascii("\0")).unwrap();
        seg.set(XP_COMMENT, TagValue::Byte(vec![0, 0])).unwrap();
        assert_eq!(evaluate(&seg), PolicyVerdict::Continue);
    }

    #[test]
    fn test_app_signature_is_case_sensitive() {
        let mut seg = MetadataSegment::empty();
        seg.set(Tag::UserComment, user_comment(b"{\"app\":\"Douyin\"}"))
            .unwrap();
        assert_eq!(
            evaluate(&seg),
            PolicyVerdict::Reject(RejectReason::DisallowedAppSignature)
        );

        seg.set(Tag::UserComment, user_comment(b"douyin_beauty_me:1"))
            .unwrap();
        assert_eq!(
            evaluate(&seg),
            PolicyVerdict::Reject(RejectReason::DisallowedAppSignature)
        );

        seg.set(Tag::UserComment, user_comment(b"DOUYIN")).unwrap();
        assert_eq!(evaluate(&seg), PolicyVerdict::Continue);
    }

    #[test]
    fn test_reason_serializes_kebab_case() {
        let json = serde_json::to_string(&RejectReason::DisallowedAppSignature).unwrap();
        assert_eq!(json, "\"disallowed-app-signature\"");
        assert_eq!(RejectReason::CommentPresent.to_string(), "comment-present");
    }
}
