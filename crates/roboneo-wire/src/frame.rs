//! Wire frame layout
//!
//! Frame = Header Marker + Payload + Tag
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬──────────┐
//! │ MARKER       │ PAYLOAD                      │ TAG      │
//! │ 8B           │ 768B (16×16 RGB, row-major)  │ 4B       │
//! └──────────────┴──────────────────────────────┴──────────┘
//! ```

use roboneo_core::HALF_IMAGE_BYTES;

/// Resynchronisation marker.
/// No proper prefix equals a proper suffix, so a partial match can
/// never overlap the start of a real marker.
pub const LINK_HEADER: [u8; 8] = [0xA5, 0x5A, 0xC3, 0x3C, b'R', b'N', b'E', b'O'];

/// Default payload size (one half-image)
pub const LINK_PAYLOAD_SIZE: usize = HALF_IMAGE_BYTES;

/// Default tag size (truncated SHA-256)
pub const LINK_TAG_SIZE: usize = 4;

/// SHA-256 digest length, the upper bound for a tag
pub const DIGEST_SIZE: usize = 32;

/// Complete default frame size
pub const LINK_FRAME_SIZE: usize = LINK_HEADER.len() + LINK_PAYLOAD_SIZE + LINK_TAG_SIZE;

/// Frame slice for zero-copy inspection of one complete frame
#[derive(Debug)]
pub struct FrameSlice<'a> {
    pub header: &'a [u8],
    pub payload: &'a [u8],
    pub tag: &'a [u8],
}

impl<'a> FrameSlice<'a> {
    /// Split a buffer holding exactly one frame of the given layout.
    /// Returns `None` if the length does not match.
    pub fn split(
        buf: &'a [u8],
        header_len: usize,
        payload_len: usize,
        tag_len: usize,
    ) -> Option<Self> {
        if buf.len() != header_len + payload_len + tag_len {
            return None;
        }

        let (header, rest) = buf.split_at(header_len);
        let (payload, tag) = rest.split_at(payload_len);
        Some(FrameSlice {
            header,
            payload,
            tag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_size() {
        assert_eq!(LINK_FRAME_SIZE, 780);
    }

    #[test]
    fn test_marker_has_no_self_overlap() {
        let h = &LINK_HEADER;
        for k in 1..h.len() {
            assert_ne!(h[..k], h[h.len() - k..], "border of length {}", k);
        }
    }

    #[test]
    fn test_frame_slice_split() {
        let buf: Vec<u8> = (0..10).collect();
        let slice = FrameSlice::split(&buf, 2, 5, 3).unwrap();

        assert_eq!(slice.header, &[0, 1]);
        assert_eq!(slice.payload, &[2, 3, 4, 5, 6]);
        assert_eq!(slice.tag, &[7, 8, 9]);
        assert!(FrameSlice::split(&buf, 2, 5, 4).is_none());
    }
}
