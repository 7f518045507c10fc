//! Link codec - frame encoding and integrity tags
//!
//! The tag is an error-detection code against line noise, not an
//! authenticator: it is the first `tag_len` bytes of SHA-256(payload).

use sha2::{Digest, Sha256};

use roboneo_core::{FaceError, FaceResult, HalfImage};

use crate::{FrameSlice, DIGEST_SIZE, LINK_HEADER, LINK_PAYLOAD_SIZE, LINK_TAG_SIZE};

/// Encoder/validator for one fixed frame layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkCodec {
    header: Vec<u8>,
    payload_len: usize,
    tag_len: usize,
}

impl LinkCodec {
    /// Create a codec for a custom layout.
    ///
    /// Fails if the header is empty, the payload is empty, or the tag is
    /// empty or longer than the digest it is truncated from.
    pub fn new(header: &[u8], payload_len: usize, tag_len: usize) -> FaceResult<Self> {
        if header.is_empty() {
            return Err(FaceError::InvalidCodec("header marker is empty".into()));
        }
        if payload_len == 0 {
            return Err(FaceError::InvalidCodec("payload length is zero".into()));
        }
        if tag_len == 0 || tag_len > DIGEST_SIZE {
            return Err(FaceError::InvalidCodec(format!(
                "tag length {} outside 1..={}",
                tag_len, DIGEST_SIZE
            )));
        }

        Ok(LinkCodec {
            header: header.to_vec(),
            payload_len,
            tag_len,
        })
    }

    /// Codec for the half-image link
    pub fn half_image() -> Self {
        LinkCodec {
            header: LINK_HEADER.to_vec(),
            payload_len: LINK_PAYLOAD_SIZE,
            tag_len: LINK_TAG_SIZE,
        }
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    pub fn tag_len(&self) -> usize {
        self.tag_len
    }

    /// Total encoded frame size
    pub fn frame_len(&self) -> usize {
        self.header.len() + self.payload_len + self.tag_len
    }

    /// Compute the truncated tag for a payload
    pub fn tag(&self, payload: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(payload);
        digest[..self.tag_len].to_vec()
    }

    /// Check a received tag against the payload
    pub fn verify(&self, payload: &[u8], tag: &[u8]) -> bool {
        tag.len() == self.tag_len && Sha256::digest(payload)[..self.tag_len] == *tag
    }

    /// Encode a payload into a complete frame
    pub fn encode(&self, payload: &[u8]) -> FaceResult<Vec<u8>> {
        if payload.len() != self.payload_len {
            return Err(FaceError::PayloadSize {
                expected: self.payload_len,
                actual: payload.len(),
            });
        }

        let mut buf = Vec::with_capacity(self.frame_len());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&self.tag(payload));
        Ok(buf)
    }

    /// Encode a half-image (row-major RGB payload)
    pub fn encode_half(&self, half: &HalfImage) -> FaceResult<Vec<u8>> {
        self.encode(&half.as_rgb_bytes())
    }

    /// Validate a buffer holding exactly one frame and return its payload
    pub fn decode<'a>(&self, frame: &'a [u8]) -> Option<&'a [u8]> {
        let slice = FrameSlice::split(frame, self.header.len(), self.payload_len, self.tag_len)?;
        if slice.header != self.header.as_slice() {
            return None;
        }
        self.verify(slice.payload, slice.tag).then_some(slice.payload)
    }
}

impl Default for LinkCodec {
    fn default() -> Self {
        Self::half_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LINK_FRAME_SIZE;
    use proptest::prelude::*;

    #[test]
    fn test_encode_layout() {
        let codec = LinkCodec::half_image();
        let payload = vec![7u8; LINK_PAYLOAD_SIZE];
        let frame = codec.encode(&payload).unwrap();

        assert_eq!(frame.len(), LINK_FRAME_SIZE);
        assert_eq!(&frame[..8], &LINK_HEADER);
        assert_eq!(&frame[8..8 + LINK_PAYLOAD_SIZE], payload.as_slice());
        assert_eq!(&frame[8 + LINK_PAYLOAD_SIZE..], codec.tag(&payload).as_slice());
    }

    #[test]
    fn test_tag_is_truncated_sha256() {
        let codec = LinkCodec::half_image();
        let payload = vec![0u8; LINK_PAYLOAD_SIZE];
        let full = Sha256::digest(&payload);
        assert_eq!(codec.tag(&payload), full[..4].to_vec());
    }

    #[test]
    fn test_wrong_payload_size_rejected() {
        let codec = LinkCodec::half_image();
        let result = codec.encode(&[1, 2, 3]);
        assert!(matches!(
            result,
            Err(FaceError::PayloadSize {
                expected: 768,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(LinkCodec::new(&LINK_HEADER, 768, 33).is_err());
        assert!(LinkCodec::new(&LINK_HEADER, 768, 0).is_err());
        assert!(LinkCodec::new(&[], 768, 4).is_err());
        assert!(LinkCodec::new(&LINK_HEADER, 0, 4).is_err());
        assert!(LinkCodec::new(&LINK_HEADER, 768, 32).is_ok());
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let codec = LinkCodec::half_image();
        let mut frame = codec.encode(&vec![42u8; LINK_PAYLOAD_SIZE]).unwrap();
        frame[100] ^= 0x01;
        assert!(codec.decode(&frame).is_none());
    }

    #[test]
    fn test_encode_half_image() {
        let codec = LinkCodec::half_image();
        let half = HalfImage::filled(roboneo_core::Rgb::new(1, 2, 3));
        let frame = codec.encode_half(&half).unwrap();
        let payload = codec.decode(&frame).unwrap();
        assert_eq!(HalfImage::from_rgb_bytes(payload), Some(half));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(payload in proptest::collection::vec(any::<u8>(), LINK_PAYLOAD_SIZE)) {
            let codec = LinkCodec::half_image();
            let frame = codec.encode(&payload).unwrap();
            prop_assert_eq!(codec.decode(&frame), Some(payload.as_slice()));
        }
    }
}
