//! Animated GIF assets
//!
//! Frames are composited onto the GIF's logical screen (sub-frame offsets,
//! transparency and disposal applied) so each decoded frame is a complete
//! image. Timing comes from the first frame's delay. The container carries
//! no frame count, so readers report it as unknown.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use gif::{ColorOutput, DecodeOptions, Decoder, DisposalMethod};

use roboneo_core::{FaceError, FaceResult};

use crate::{FrameReader, FrameSource, FrameTiming, RawFrame, MAX_FRAME_BYTES};

/// File extension of GIF assets
pub const GIF_EXTENSION: &str = "gif";

/// Frame source reading an animated GIF
#[derive(Clone, Debug)]
pub struct GifSource {
    path: PathBuf,
    name: String,
}

impl GifSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        GifSource { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for GifSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> FaceResult<Box<dyn FrameReader>> {
        let mut reader = GifReader::open(&self.path, &self.name)?;
        // Decode the first frame now: it carries the timing
        reader.pending = reader.decode_next()?;
        reader.timing = reader.first_timing;
        Ok(Box::new(reader))
    }
}

struct GifReader {
    path: PathBuf,
    name: String,
    decoder: Decoder<BufReader<File>>,
    width: usize,
    height: usize,
    /// RGBA composite of everything shown so far
    canvas: Vec<u8>,
    /// Canvas to restore after a frame disposed with `Previous`
    saved: Option<Vec<u8>>,
    /// Disposal of the last composited frame, applied before the next one
    dispose: Option<(DisposalMethod, Rect)>,
    pending: Option<RawFrame>,
    first_timing: FrameTiming,
    timing: FrameTiming,
}

#[derive(Clone, Copy, Debug)]
struct Rect {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

impl GifReader {
    fn open(path: &Path, name: &str) -> FaceResult<Self> {
        let file = File::open(path).map_err(|e| FaceError::asset(name, e))?;

        let mut options = DecodeOptions::new();
        options.set_color_output(ColorOutput::RGBA);
        let decoder = options
            .read_info(BufReader::new(file))
            .map_err(|e| FaceError::asset(name, e))?;

        let width = decoder.width() as usize;
        let height = decoder.height() as usize;
        if width * height * 3 > MAX_FRAME_BYTES {
            return Err(FaceError::asset(name, "GIF image too large"));
        }

        Ok(GifReader {
            path: path.to_path_buf(),
            name: name.to_string(),
            decoder,
            width,
            height,
            canvas: vec![0; width * height * 4],
            saved: None,
            dispose: None,
            pending: None,
            first_timing: FrameTiming::Unspecified,
            timing: FrameTiming::Unspecified,
        })
    }

    /// Decode and composite the next frame
    fn decode_next(&mut self) -> FaceResult<Option<RawFrame>> {
        let frame = match self.decoder.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(e) => return Err(FaceError::asset(&self.name, e)),
        };

        if let Some((method, rect)) = self.dispose.take() {
            match method {
                DisposalMethod::Background => clear(&mut self.canvas, self.width, rect),
                DisposalMethod::Previous => {
                    if let Some(saved) = self.saved.take() {
                        self.canvas = saved;
                    }
                }
                _ => {}
            }
        }

        let rect = Rect {
            left: frame.left as usize,
            top: frame.top as usize,
            width: frame.width as usize,
            height: frame.height as usize,
        };
        if frame.dispose == DisposalMethod::Previous {
            self.saved = Some(self.canvas.clone());
        }
        if self.first_timing == FrameTiming::Unspecified && frame.delay > 0 {
            // GIF delays are in hundredths of a second
            self.first_timing = FrameTiming::DurationMs(frame.delay as f64 * 10.0);
        }
        let dispose = frame.dispose;

        for y in 0..rect.height {
            let cy = rect.top + y;
            if cy >= self.height {
                break;
            }
            for x in 0..rect.width {
                let cx = rect.left + x;
                if cx >= self.width {
                    break;
                }
                let src = (y * rect.width + x) * 4;
                let Some(px) = frame.buffer.get(src..src + 4) else {
                    return Err(FaceError::asset(&self.name, "truncated GIF frame"));
                };
                if px[3] != 0 {
                    let dst = (cy * self.width + cx) * 4;
                    self.canvas[dst..dst + 4].copy_from_slice(px);
                }
            }
        }
        self.dispose = Some((dispose, rect));

        let rgb = self
            .canvas
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Ok(Some(RawFrame::new(self.width, self.height, rgb)))
    }
}

fn clear(canvas: &mut [u8], width: usize, rect: Rect) {
    let height = canvas.len() / (width * 4).max(1);
    for y in rect.top..(rect.top + rect.height).min(height) {
        for x in rect.left..(rect.left + rect.width).min(width) {
            let i = (y * width + x) * 4;
            canvas[i..i + 4].fill(0);
        }
    }
}

impl FrameReader for GifReader {
    fn frame_count(&self) -> Option<usize> {
        None
    }

    fn timing(&self) -> FrameTiming {
        self.timing
    }

    fn next_frame(&mut self) -> FaceResult<Option<RawFrame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.decode_next()
    }

    fn rewind(&mut self) -> FaceResult<()> {
        // The decoder only reads forward; start over on a fresh file handle
        let timing = self.timing;
        *self = GifReader::open(&self.path, &self.name)?;
        self.timing = timing;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Animation;
    use gif::{Encoder, Frame, Repeat};
    use roboneo_core::{FrameBuffer, Rgb, Timestamp};
    use std::time::Duration;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("roboneo-gif-{}-{}.gif", tag, std::process::id()))
    }

    fn solid(width: u16, height: u16, color: [u8; 3]) -> Vec<u8> {
        color.repeat(width as usize * height as usize)
    }

    /// Three full 32x16 frames in red, green, blue at 100ms each
    fn write_rgb_cycle(path: &Path) {
        let mut file = File::create(path).unwrap();
        let mut encoder = Encoder::new(&mut file, 32, 16, &[]).unwrap();
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for color in [[255, 0, 0], [0, 255, 0], [0, 0, 255]] {
            let mut frame = Frame::from_rgb(32, 16, &solid(32, 16, color));
            frame.delay = 10;
            encoder.write_frame(&frame).unwrap();
        }
    }

    #[test]
    fn test_reads_frames_and_timing() {
        let path = temp_path("cycle");
        write_rgb_cycle(&path);

        let mut reader = GifSource::new(&path).open().unwrap();
        assert_eq!(reader.frame_count(), None);
        assert_eq!(reader.timing(), FrameTiming::DurationMs(100.0));
        assert_eq!(reader.timing().frame_delay(), Duration::from_millis(100));

        let first = reader.next_frame().unwrap().unwrap();
        assert_eq!((first.width, first.height), (32, 16));
        assert_eq!(&first.data[..3], &[255, 0, 0]);
        reader.skip(1).unwrap();
        assert_eq!(&reader.next_frame().unwrap().unwrap().data[..3], &[0, 0, 255]);
        assert!(reader.next_frame().unwrap().is_none());

        reader.rewind().unwrap();
        assert_eq!(&reader.next_frame().unwrap().unwrap().data[..3], &[255, 0, 0]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_sub_frames_are_composited() {
        let path = temp_path("composite");
        {
            let mut file = File::create(&path).unwrap();
            let mut encoder = Encoder::new(&mut file, 32, 16, &[]).unwrap();

            let mut base = Frame::from_rgb(32, 16, &solid(32, 16, [255, 0, 0]));
            base.dispose = DisposalMethod::Keep;
            encoder.write_frame(&base).unwrap();

            let mut patch = Frame::from_rgb(2, 2, &solid(2, 2, [0, 255, 0]));
            patch.left = 4;
            patch.top = 4;
            patch.dispose = DisposalMethod::Background;
            encoder.write_frame(&patch).unwrap();

            let mut next = Frame::from_rgb(1, 1, &solid(1, 1, [0, 0, 255]));
            next.left = 0;
            next.top = 0;
            encoder.write_frame(&next).unwrap();
        }

        let mut reader = GifSource::new(&path).open().unwrap();
        // No delay in the file
        assert_eq!(reader.timing(), FrameTiming::Unspecified);
        reader.next_frame().unwrap();

        let patched = reader.next_frame().unwrap().unwrap().to_frame_buffer().unwrap();
        assert_eq!(patched.get(4, 4), Some(Rgb::new(0, 255, 0)));
        assert_eq!(patched.get(5, 5), Some(Rgb::new(0, 255, 0)));
        assert_eq!(patched.get(0, 0), Some(Rgb::new(255, 0, 0)));

        // The patch was disposed to background before the third frame
        let third = reader.next_frame().unwrap().unwrap().to_frame_buffer().unwrap();
        assert_eq!(third.get(4, 4), Some(Rgb::BLACK));
        assert_eq!(third.get(0, 0), Some(Rgb::new(0, 0, 255)));
        assert_eq!(third.get(10, 10), Some(Rgb::new(255, 0, 0)));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_gif_animation_plays() {
        let path = temp_path("plays");
        write_rgb_cycle(&path);

        // Unknown length is counted; 3 frames stay under the cache limit
        let mut anim = Animation::load(Box::new(GifSource::new(&path)), 10).unwrap();
        assert_eq!(anim.frame_count(), 3);
        assert!(anim.is_cached());

        anim.start(Timestamp::ZERO);
        let at = |anim: &mut Animation, ms: u64| anim.get_frame(Timestamp::from_millis(ms)).unwrap().clone();
        assert_eq!(at(&mut anim, 0), FrameBuffer::filled(Rgb::new(255, 0, 0)));
        assert_eq!(at(&mut anim, 150), FrameBuffer::filled(Rgb::new(0, 255, 0)));
        assert_eq!(at(&mut anim, 300), FrameBuffer::filled(Rgb::new(255, 0, 0)));

        // Streaming from the same file agrees
        let mut streamed = Animation::load(Box::new(GifSource::new(&path)), 2).unwrap();
        assert!(!streamed.is_cached());
        streamed.start(Timestamp::ZERO);
        assert_eq!(at(&mut streamed, 250), FrameBuffer::filled(Rgb::new(0, 0, 255)));
        assert_eq!(at(&mut streamed, 310), FrameBuffer::filled(Rgb::new(255, 0, 0)));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_not_a_gif_is_asset_error() {
        let path = temp_path("garbage");
        std::fs::write(&path, b"P6\n1 1\n255\n\x00\x00\x00").unwrap();
        assert!(matches!(GifSource::new(&path).open(), Err(FaceError::Asset { .. })));
        std::fs::remove_file(path).ok();
    }
}
