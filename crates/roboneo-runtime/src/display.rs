//! Display adapters
//!
//! One [`Display`] is picked at startup; the render loop never knows which.

use std::fs::{File, OpenOptions};
use std::io::{self, Stdout, Write};
use std::path::Path;
use std::sync::Arc;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use parking_lot::Mutex;

use roboneo_core::{FaceError, FaceResult, FrameBuffer, HalfImage, PixelGrid, Rgb};

/// Pixel output for one board
pub trait Display: Send {
    /// Show a composed face
    fn show(&mut self, frame: &FrameBuffer) -> FaceResult<()>;

    /// Show a half-image received over the link
    fn show_half(&mut self, half: &HalfImage) -> FaceResult<()>;

    /// Blank the output and release it
    fn teardown(&mut self) -> FaceResult<()>;
}

fn display_error(e: io::Error) -> FaceError {
    FaceError::Display(e.to_string())
}

fn color(px: Rgb) -> Color {
    Color::Rgb {
        r: px.r,
        g: px.g,
        b: px.b,
    }
}

/// Simulator display: the face as true-colour half blocks, two pixel rows
/// per terminal line
pub struct TerminalDisplay<W: Write + Send = Stdout> {
    out: W,
    started: bool,
}

impl TerminalDisplay<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out, started: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw<const WIDTH: usize, const HEIGHT: usize>(
        &mut self,
        grid: &PixelGrid<WIDTH, HEIGHT>,
    ) -> io::Result<()> {
        if !self.started {
            queue!(self.out, Hide, Clear(ClearType::All))?;
            self.started = true;
        }

        let rows: Vec<_> = grid.rows().collect();
        for (line, pair) in rows.chunks(2).enumerate() {
            queue!(self.out, MoveTo(0, line as u16))?;
            for x in 0..WIDTH {
                let top = pair[0][x];
                let bottom = pair.get(1).map(|row| row[x]).unwrap_or(Rgb::BLACK);
                queue!(
                    self.out,
                    SetForegroundColor(color(top)),
                    SetBackgroundColor(color(bottom)),
                    Print('▀')
                )?;
            }
            queue!(self.out, ResetColor)?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Display for TerminalDisplay<W> {
    fn show(&mut self, frame: &FrameBuffer) -> FaceResult<()> {
        self.draw(frame).map_err(display_error)
    }

    fn show_half(&mut self, half: &HalfImage) -> FaceResult<()> {
        self.draw(half).map_err(display_error)
    }

    fn teardown(&mut self) -> FaceResult<()> {
        let lines = (FrameBuffer::HEIGHT / 2) as u16;
        queue!(self.out, ResetColor, MoveTo(0, lines), Show, Print('\n')).map_err(display_error)?;
        self.out.flush().map_err(display_error)
    }
}

/// Orientation of the physical panel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelOrientation {
    /// Clockwise, a multiple of 90 degrees
    pub rotation: u16,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl PanelOrientation {
    /// Flips first, then rotation
    pub fn apply(&self, half: &HalfImage) -> HalfImage {
        let mut out = half.clone();
        if self.flip_horizontal {
            out = out.mirrored();
        }
        if self.flip_vertical {
            out = out.flipped();
        }
        if self.rotation % 360 != 0 {
            out = out.rotated(self.rotation);
        }
        out
    }
}

/// Start-of-frame command of the Unicorn HAT HD
pub const UNICORN_SOF: u8 = 0x72;

/// Unicorn HAT HD panel driven through its SPI device node.
///
/// Each board owns one 16×16 panel; on the primary `show` displays the
/// left half of the face.
pub struct UnicornHatDisplay<W: Write + Send = File> {
    spi: W,
    orientation: PanelOrientation,
    packet: Vec<u8>,
}

impl UnicornHatDisplay<File> {
    pub fn open(device: &Path, orientation: PanelOrientation) -> FaceResult<Self> {
        let spi = OpenOptions::new()
            .write(true)
            .open(device)
            .map_err(|e| FaceError::Display(format!("{}: {}", device.display(), e)))?;
        tracing::info!("Opened Unicorn HAT on {} ({:?})", device.display(), orientation);
        Ok(Self::new(spi, orientation))
    }
}

impl<W: Write + Send> UnicornHatDisplay<W> {
    pub fn new(spi: W, orientation: PanelOrientation) -> Self {
        Self {
            spi,
            orientation,
            packet: Vec::with_capacity(1 + HalfImage::BYTE_LEN),
        }
    }

    pub fn into_inner(self) -> W {
        self.spi
    }

    fn write_panel(&mut self, half: &HalfImage) -> FaceResult<()> {
        let oriented = self.orientation.apply(half);
        self.packet.clear();
        self.packet.push(UNICORN_SOF);
        self.packet.extend_from_slice(&oriented.as_rgb_bytes());

        self.spi.write_all(&self.packet).map_err(display_error)?;
        self.spi.flush().map_err(display_error)
    }
}

impl<W: Write + Send> Display for UnicornHatDisplay<W> {
    fn show(&mut self, frame: &FrameBuffer) -> FaceResult<()> {
        let (left, _) = frame.split_halves();
        self.write_panel(&left)
    }

    fn show_half(&mut self, half: &HalfImage) -> FaceResult<()> {
        self.write_panel(half)
    }

    fn teardown(&mut self) -> FaceResult<()> {
        self.write_panel(&HalfImage::black())
    }
}

/// What a [`RecordingDisplay`] has been shown
#[derive(Clone, Debug, Default)]
pub struct Recording {
    pub frames: Vec<FrameBuffer>,
    pub halves: Vec<HalfImage>,
    pub torn_down: bool,
}

/// In-memory display. Clones share one recording.
#[derive(Clone, Debug, Default)]
pub struct RecordingDisplay {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording(&self) -> Recording {
        self.inner.lock().clone()
    }
}

impl Display for RecordingDisplay {
    fn show(&mut self, frame: &FrameBuffer) -> FaceResult<()> {
        self.inner.lock().frames.push(frame.clone());
        Ok(())
    }

    fn show_half(&mut self, half: &HalfImage) -> FaceResult<()> {
        self.inner.lock().halves.push(half.clone());
        Ok(())
    }

    fn teardown(&mut self) -> FaceResult<()> {
        self.inner.lock().torn_down = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roboneo_core::HALF_IMAGE_BYTES;

    fn marked_face() -> FrameBuffer {
        let mut frame = FrameBuffer::black();
        frame.set(0, 0, Rgb::new(1, 2, 3));
        frame.set(16, 0, Rgb::new(4, 5, 6));
        frame
    }

    #[test]
    fn test_unicorn_writes_left_half() {
        let mut display = UnicornHatDisplay::new(Vec::new(), PanelOrientation::default());
        display.show(&marked_face()).unwrap();

        let written = display.into_inner();
        assert_eq!(written.len(), 1 + HALF_IMAGE_BYTES);
        assert_eq!(written[0], UNICORN_SOF);
        assert_eq!(&written[1..4], &[1, 2, 3]);
        assert!(!written.windows(3).any(|w| w == [4, 5, 6]));
    }

    #[test]
    fn test_unicorn_orientation() {
        let mut half = HalfImage::black();
        half.set(0, 0, Rgb::WHITE);

        let mirrored = PanelOrientation {
            flip_horizontal: true,
            ..Default::default()
        };
        assert_eq!(mirrored.apply(&half).get(15, 0), Some(Rgb::WHITE));

        let flipped = PanelOrientation {
            flip_vertical: true,
            ..Default::default()
        };
        assert_eq!(flipped.apply(&half).get(0, 15), Some(Rgb::WHITE));

        let rotated = PanelOrientation {
            rotation: 90,
            ..Default::default()
        };
        assert_eq!(rotated.apply(&half).get(15, 0), Some(Rgb::WHITE));
    }

    #[test]
    fn test_unicorn_teardown_blanks() {
        let mut display = UnicornHatDisplay::new(Vec::new(), PanelOrientation::default());
        display.teardown().unwrap();
        let written = display.into_inner();
        assert!(written[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_terminal_draws_half_blocks() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.show(&marked_face()).unwrap();
        display.show_half(&HalfImage::black()).unwrap();
        display.teardown().unwrap();

        let text = String::from_utf8(display.into_inner()).unwrap();
        // 32 columns by 8 lines, then 16 by 8
        assert_eq!(text.matches('▀').count(), 32 * 8 + 16 * 8);
    }

    #[test]
    fn test_recording_shared_between_clones() {
        let display = RecordingDisplay::new();
        let mut boxed: Box<dyn Display> = Box::new(display.clone());
        boxed.show(&marked_face()).unwrap();
        boxed.show_half(&HalfImage::black()).unwrap();
        boxed.teardown().unwrap();

        let recording = display.recording();
        assert_eq!(recording.frames, vec![marked_face()]);
        assert_eq!(recording.halves.len(), 1);
        assert!(recording.torn_down);
    }
}
