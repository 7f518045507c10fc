//! Animation player
//!
//! INVARIANT: frame_count > 0 and the current index is in [0, frame_count)
//! INVARIANT: the due time only ever advances by whole frame delays from
//! the start instant, so polling jitter never accumulates as drift

use std::time::Duration;

use roboneo_core::{FaceError, FaceResult, FrameBuffer, Timestamp};

use crate::{FrameReader, FrameSource, RawFrame};

/// Shown before the first frame has been decoded
static BLACK_FRAME: FrameBuffer = FrameBuffer::black();

/// Frame storage
enum Frames {
    /// Every frame decoded up front
    Cached(Vec<FrameBuffer>),
    /// Frames decoded on demand
    Streaming {
        source: Box<dyn FrameSource>,
        reader: Option<Box<dyn FrameReader>>,
        /// Index of the frame the reader yields next
        cursor: usize,
    },
}

/// Playback position of one animation
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaybackState {
    /// Index of the displayed frame, `None` until the first advance
    pub index: Option<usize>,
    pub playing: bool,
    /// When the next advance is due
    pub next_due: Timestamp,
}

/// A loaded expression animation
pub struct Animation {
    name: String,
    frames: Frames,
    frame_count: usize,
    frame_delay: Duration,
    playback: PlaybackState,
    current: Option<FrameBuffer>,
}

impl Animation {
    /// Load an animation from a source.
    ///
    /// Sources with fewer than `cache_limit` frames are decoded entirely into
    /// memory. Longer ones keep the source and decode frames while playing.
    pub fn load(source: Box<dyn FrameSource>, cache_limit: usize) -> FaceResult<Self> {
        let name = source.name().to_string();
        tracing::debug!("Reading expression asset {}", name);

        let mut reader = source.open().map_err(|e| as_asset_error(&name, e))?;
        let frame_delay = reader.timing().frame_delay();

        let reported = match reader.frame_count() {
            Some(count) => count,
            None => count_frames(reader.as_mut()).map_err(|e| as_asset_error(&name, e))?,
        };
        if reported == 0 {
            return Err(FaceError::asset(&name, "animation has no frames"));
        }

        tracing::debug!(
            "Asset {} has {} frames, {:?} per frame",
            name,
            reported,
            frame_delay
        );

        let (frames, frame_count) = if reported < cache_limit {
            tracing::info!("Caching {} frames of {}", reported, name);
            let cache = decode_all(reader.as_mut(), reported).map_err(|e| as_asset_error(&name, e))?;
            if cache.is_empty() {
                return Err(FaceError::asset(&name, "animation has no frames"));
            }
            let count = cache.len();
            (Frames::Cached(cache), count)
        } else {
            tracing::debug!("Asset {} is over the cache limit, streaming", name);
            (
                Frames::Streaming {
                    source,
                    reader: None,
                    cursor: 0,
                },
                reported,
            )
        };

        Ok(Animation {
            name,
            frames,
            frame_count,
            frame_delay,
            playback: PlaybackState::default(),
            current: None,
        })
    }

    /// Start from the beginning. The first `get_frame` at or after `now`
    /// shows frame 0.
    pub fn start(&mut self, now: Timestamp) {
        self.playback = PlaybackState {
            index: None,
            playing: true,
            next_due: now,
        };
        self.current = None;

        if let Frames::Streaming {
            source,
            reader,
            cursor,
        } = &mut self.frames
        {
            *cursor = 0;
            *reader = match source.open() {
                Ok(r) => Some(r),
                Err(e) => {
                    // Retried on the next get_frame
                    tracing::warn!("Could not open {} for playback: {}", self.name, e);
                    None
                }
            };
        }
    }

    /// Stop playback and release the streaming reader
    pub fn stop(&mut self) {
        self.playback.playing = false;
        self.current = None;
        if let Frames::Streaming { reader, cursor, .. } = &mut self.frames {
            *reader = None;
            *cursor = 0;
        }
    }

    /// The frame to display at `now`.
    ///
    /// Advances one frame per elapsed delay, decoding only the frame that
    /// ends up displayed. On a decode failure the playback position is left
    /// untouched and the error is returned.
    pub fn get_frame(&mut self, now: Timestamp) -> FaceResult<&FrameBuffer> {
        if self.playback.playing && now >= self.playback.next_due {
            let delay_us = (self.frame_delay.as_micros() as u64).max(1);
            let behind = (now - self.playback.next_due).as_micros() as u64;
            let steps = behind / delay_us + 1;

            let n = self.frame_count as u64;
            let target = match self.playback.index {
                None => (steps - 1) % n,
                Some(i) => (i as u64 + steps % n) % n,
            } as usize;

            let (frame, landed) = self.fetch(target)?;

            tracing::trace!("{} advanced {} frame(s) to {}", self.name, steps, landed);
            self.current = Some(frame);
            self.playback.index = Some(landed);
            self.playback.next_due = self
                .playback
                .next_due
                .saturating_add(Duration::from_micros(delay_us.saturating_mul(steps)));
        }

        Ok(self.current.as_ref().unwrap_or(&BLACK_FRAME))
    }

    fn fetch(&mut self, target: usize) -> FaceResult<(FrameBuffer, usize)> {
        match &mut self.frames {
            Frames::Cached(cache) => Ok((cache[target].clone(), target)),
            Frames::Streaming {
                source,
                reader,
                cursor,
            } => {
                let result = fetch_streaming(source.as_ref(), reader, cursor, target);
                if result.is_err() {
                    // Cursor position is unknown after a failure, reopen next time
                    *reader = None;
                    *cursor = 0;
                }
                result.map_err(|e| as_playback_error(&self.name, e))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_playing(&self) -> bool {
        self.playback.playing
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.frames, Frames::Cached(_))
    }

    /// Index of the frame currently displayed
    pub fn current_index(&self) -> Option<usize> {
        self.playback.index
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }
}

impl std::fmt::Debug for Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animation")
            .field("name", &self.name)
            .field("frame_count", &self.frame_count)
            .field("frame_delay", &self.frame_delay)
            .field("cached", &self.is_cached())
            .field("playback", &self.playback)
            .finish()
    }
}

/// Position the streaming reader on `target` and decode it.
/// A read past the end rewinds to frame 0 and retries once.
fn fetch_streaming(
    source: &dyn FrameSource,
    reader: &mut Option<Box<dyn FrameReader>>,
    cursor: &mut usize,
    target: usize,
) -> FaceResult<(FrameBuffer, usize)> {
    let r = match reader {
        Some(r) => r,
        slot => {
            *cursor = 0;
            slot.insert(source.open()?)
        }
    };

    if target < *cursor {
        r.rewind()?;
        *cursor = 0;
    }
    r.skip(target - *cursor)?;
    *cursor = target;

    if let Some(raw) = r.next_frame()? {
        *cursor += 1;
        return Ok((crop(&raw)?, target));
    }

    tracing::debug!("Read past the end of {} at frame {}, rewinding", source.name(), target);
    r.rewind()?;
    *cursor = 0;
    match r.next_frame()? {
        Some(raw) => {
            *cursor = 1;
            Ok((crop(&raw)?, 0))
        }
        None => Err(FaceError::Playback("no frames after rewind".into())),
    }
}

fn crop(raw: &RawFrame) -> FaceResult<FrameBuffer> {
    raw.to_frame_buffer()
        .ok_or_else(|| FaceError::Playback("truncated frame data".into()))
}

fn count_frames(reader: &mut dyn FrameReader) -> FaceResult<usize> {
    let mut count = 0;
    while reader.next_frame()?.is_some() {
        count += 1;
    }
    reader.rewind()?;
    Ok(count)
}

fn decode_all(reader: &mut dyn FrameReader, count: usize) -> FaceResult<Vec<FrameBuffer>> {
    let mut cache = Vec::with_capacity(count);
    for _ in 0..count {
        match reader.next_frame()? {
            Some(raw) => cache.push(
                raw.to_frame_buffer()
                    .ok_or_else(|| FaceError::Playback("truncated frame data".into()))?,
            ),
            None => break,
        }
    }
    Ok(cache)
}

fn as_asset_error(name: &str, err: FaceError) -> FaceError {
    match err {
        FaceError::Asset { .. } => err,
        other => FaceError::asset(name, other),
    }
}

fn as_playback_error(name: &str, err: FaceError) -> FaceError {
    match err {
        FaceError::Playback(_) => err,
        other => FaceError::Playback(format!("{}: {}", name, other)),
    }
}
