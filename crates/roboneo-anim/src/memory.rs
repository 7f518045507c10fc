//! In-memory frame source

use std::sync::Arc;

use roboneo_core::{FaceResult, FrameBuffer};

use crate::{FrameReader, FrameSource, FrameTiming, RawFrame};

/// Frame source backed by decoded frames held in memory
#[derive(Clone, Debug)]
pub struct MemorySource {
    name: String,
    frames: Arc<Vec<RawFrame>>,
    timing: FrameTiming,
    /// Count the reader reports, `None` to leave it unknown
    reported_count: Option<usize>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: Vec<RawFrame>, timing: FrameTiming) -> Self {
        let count = frames.len();
        MemorySource {
            name: name.into(),
            frames: Arc::new(frames),
            timing,
            reported_count: Some(count),
        }
    }

    /// Source from already-composed face frames
    pub fn from_frames(name: impl Into<String>, frames: &[FrameBuffer], timing: FrameTiming) -> Self {
        Self::new(name, frames.iter().map(RawFrame::from).collect(), timing)
    }

    /// Override the frame count the reader reports (approximate metadata)
    pub fn with_reported_count(mut self, count: Option<usize>) -> Self {
        self.reported_count = count;
        self
    }
}

impl FrameSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> FaceResult<Box<dyn FrameReader>> {
        Ok(Box::new(MemoryReader {
            frames: Arc::clone(&self.frames),
            timing: self.timing,
            reported_count: self.reported_count,
            position: 0,
        }))
    }
}

struct MemoryReader {
    frames: Arc<Vec<RawFrame>>,
    timing: FrameTiming,
    reported_count: Option<usize>,
    position: usize,
}

impl FrameReader for MemoryReader {
    fn frame_count(&self) -> Option<usize> {
        self.reported_count
    }

    fn timing(&self) -> FrameTiming {
        self.timing
    }

    fn next_frame(&mut self) -> FaceResult<Option<RawFrame>> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn skip(&mut self, n: usize) -> FaceResult<()> {
        self.position = (self.position + n).min(self.frames.len());
        Ok(())
    }

    fn rewind(&mut self) -> FaceResult<()> {
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<RawFrame> {
        (0..n).map(|i| RawFrame::new(1, 1, vec![i as u8, 0, 0])).collect()
    }

    #[test]
    fn test_readers_are_independent() {
        let source = MemorySource::new("blink", frames(3), FrameTiming::Unspecified);
        let mut a = source.open().unwrap();
        let mut b = source.open().unwrap();

        a.next_frame().unwrap();
        a.next_frame().unwrap();
        assert_eq!(b.next_frame().unwrap().unwrap().data[0], 0);
        assert_eq!(a.next_frame().unwrap().unwrap().data[0], 2);
        assert!(a.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_skip_and_rewind() {
        let source = MemorySource::new("blink", frames(5), FrameTiming::Fps(10.0));
        let mut reader = source.open().unwrap();

        reader.skip(3).unwrap();
        assert_eq!(reader.next_frame().unwrap().unwrap().data[0], 3);
        reader.skip(10).unwrap();
        assert!(reader.next_frame().unwrap().is_none());
        reader.rewind().unwrap();
        assert_eq!(reader.next_frame().unwrap().unwrap().data[0], 0);
    }

    #[test]
    fn test_reported_count_override() {
        let source = MemorySource::new("blink", frames(2), FrameTiming::Unspecified)
            .with_reported_count(None);
        assert_eq!(source.open().unwrap().frame_count(), None);
    }
}
