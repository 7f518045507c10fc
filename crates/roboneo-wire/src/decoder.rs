//! Resynchronising frame decoder
//!
//! Accumulates raw serial bytes and extracts validated payloads:
//! 1. Scan for the header marker, discarding everything before it
//! 2. Wait until a whole frame is buffered (partial frame, not an error)
//! 3. Verify the tag; on success consume the frame, on mismatch drop only
//!    the marker and scan again
//!
//! Desynchronisation never surfaces as an error. It is counted in
//! [`DecoderStats`] and the stream heals itself at the next good marker.

use bytes::{Buf, Bytes, BytesMut};

use crate::LinkCodec;

/// Decoder statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Validated payloads emitted
    pub frames_decoded: u64,
    /// Bytes thrown away while searching for a marker
    pub bytes_discarded: u64,
    /// Markers whose frame failed the tag check
    pub tag_mismatches: u64,
}

/// Receive buffer plus the resync algorithm
pub struct FrameDecoder {
    codec: LinkCodec,
    buffer: BytesMut,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new(codec: LinkCodec) -> Self {
        let capacity = codec.frame_len() * 2;
        FrameDecoder {
            codec,
            buffer: BytesMut::with_capacity(capacity),
            stats: DecoderStats::default(),
        }
    }

    /// Append raw bytes from the channel
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Append raw bytes and extract every complete validated payload
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.extend(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.next_payload() {
            payloads.push(payload);
        }
        payloads
    }

    /// Try to extract one validated payload from the buffered bytes.
    ///
    /// Returns `None` when more data is needed.
    pub fn next_payload(&mut self) -> Option<Bytes> {
        let header_len = self.codec.header().len();
        let payload_len = self.codec.payload_len();
        let frame_len = self.codec.frame_len();

        loop {
            let Some(pos) = self.find_header() else {
                // Keep a tail that could be the start of a split marker
                let keep = (header_len - 1).min(self.buffer.len());
                self.discard(self.buffer.len() - keep);
                return None;
            };
            self.discard(pos);

            if self.buffer.len() < frame_len {
                return None;
            }

            let payload = &self.buffer[header_len..header_len + payload_len];
            let tag = &self.buffer[header_len + payload_len..frame_len];

            if self.codec.verify(payload, tag) {
                let mut frame = self.buffer.split_to(frame_len);
                frame.advance(header_len);
                frame.truncate(payload_len);
                self.stats.frames_decoded += 1;
                tracing::trace!("Link frame decoded ({} bytes buffered)", self.buffer.len());
                return Some(frame.freeze());
            }

            // False-positive marker or corrupted payload
            self.stats.tag_mismatches += 1;
            tracing::debug!("Link tag mismatch, skipping marker");
            self.discard(header_len);
        }
    }

    /// Drop all buffered bytes (after a channel fault)
    pub fn reset(&mut self) {
        self.discard(self.buffer.len());
    }

    /// Number of buffered bytes
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    fn find_header(&self) -> Option<usize> {
        let header = self.codec.header();
        self.buffer
            .windows(header.len())
            .position(|window| window == header)
    }

    fn discard(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.buffer.advance(n);
        self.stats.bytes_discarded += n as u64;
        tracing::debug!("Link resync: discarded {} bytes", n);
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(LinkCodec::half_image())
    }
}
