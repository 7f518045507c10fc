//! Frame sources
//!
//! A [`FrameSource`] is a re-openable asset. Each [`FrameReader`] it opens
//! is an independent sequential cursor over the decoded frames.

use std::path::Path;
use std::time::Duration;

use roboneo_core::{FaceResult, FrameBuffer};

use crate::{GifSource, PpmSource, GIF_EXTENSION, PPM_EXTENSION};

/// Delay used when a source carries no timing metadata
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(1);

/// Largest decoded image accepted from an asset file, in RGB bytes.
/// Anything bigger is rejected before its pixel buffer is allocated.
pub const MAX_FRAME_BYTES: usize = FrameBuffer::BYTE_LEN * 256;

/// Timing metadata reported by a source
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum FrameTiming {
    /// Explicit frame rate
    Fps(f64),
    /// Explicit per-frame duration in milliseconds
    DurationMs(f64),
    /// No metadata
    #[default]
    Unspecified,
}

impl FrameTiming {
    /// Per-frame delay: rate first, then duration, then the 1ms default
    pub fn frame_delay(&self) -> Duration {
        match *self {
            FrameTiming::Fps(fps) if fps.is_finite() && fps > 0.0 => micros(1_000_000.0 / fps),
            FrameTiming::DurationMs(ms) if ms.is_finite() && ms > 0.0 => micros(ms * 1000.0),
            _ => DEFAULT_FRAME_DELAY,
        }
    }
}

// Rounded to whole microseconds, never zero
fn micros(us: f64) -> Duration {
    Duration::from_micros((us.round() as u64).max(1))
}

/// One decoded frame at the source's native size
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub width: usize,
    pub height: usize,
    /// Row-major RGB
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        RawFrame {
            width,
            height,
            data,
        }
    }

    /// Crop to the face. `None` if the pixel data is truncated.
    pub fn to_frame_buffer(&self) -> Option<FrameBuffer> {
        FrameBuffer::from_rgb_cropped(self.width, self.height, &self.data)
    }
}

impl From<&FrameBuffer> for RawFrame {
    fn from(frame: &FrameBuffer) -> Self {
        RawFrame::new(FrameBuffer::WIDTH, FrameBuffer::HEIGHT, frame.as_rgb_bytes())
    }
}

/// Sequential cursor over a source's frames
pub trait FrameReader: Send {
    /// Frame count if the container reports one. May be approximate.
    fn frame_count(&self) -> Option<usize>;

    /// Timing metadata
    fn timing(&self) -> FrameTiming;

    /// Decode the next frame. `Ok(None)` once the cursor is past the end.
    fn next_frame(&mut self) -> FaceResult<Option<RawFrame>>;

    /// Skip `n` frames without keeping them. Stops quietly at the end.
    fn skip(&mut self, n: usize) -> FaceResult<()> {
        for _ in 0..n {
            if self.next_frame()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Move the cursor back to the first frame
    fn rewind(&mut self) -> FaceResult<()>;
}

/// Re-openable animation asset
pub trait FrameSource: Send + Sync {
    /// Human-readable asset name for logs and errors
    fn name(&self) -> &str;

    /// Open a fresh cursor positioned at the first frame
    fn open(&self) -> FaceResult<Box<dyn FrameReader>>;
}

/// Pick the file source for an asset by its extension (case-insensitive).
/// `None` for formats with no decoder.
pub fn source_for_path(path: &Path) -> Option<Box<dyn FrameSource>> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        GIF_EXTENSION => Some(Box::new(GifSource::new(path))),
        PPM_EXTENSION => Some(Box::new(PpmSource::new(path))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_delay_precedence() {
        assert_eq!(FrameTiming::Fps(10.0).frame_delay(), Duration::from_millis(100));
        assert_eq!(
            FrameTiming::DurationMs(40.0).frame_delay(),
            Duration::from_millis(40)
        );
        assert_eq!(FrameTiming::Unspecified.frame_delay(), DEFAULT_FRAME_DELAY);
    }

    #[test]
    fn test_invalid_timing_falls_back() {
        assert_eq!(FrameTiming::Fps(0.0).frame_delay(), DEFAULT_FRAME_DELAY);
        assert_eq!(FrameTiming::DurationMs(-5.0).frame_delay(), DEFAULT_FRAME_DELAY);
    }

    #[test]
    fn test_source_for_path_by_extension() {
        let gif = source_for_path(Path::new("faces/happy.GIF")).unwrap();
        assert_eq!(gif.name(), "faces/happy.GIF");
        assert!(source_for_path(Path::new("faces/sad.ppm")).is_some());
        assert!(source_for_path(Path::new("faces/notes.txt")).is_none());
        assert!(source_for_path(Path::new("faces/README")).is_none());
    }

    #[test]
    fn test_raw_frame_truncated() {
        let raw = RawFrame::new(32, 16, vec![0; 10]);
        assert!(raw.to_frame_buffer().is_none());
    }
}
