//! PPM sequence files
//!
//! An expression asset is a file of concatenated binary PPM (`P6`) images,
//! one image per frame, as the netpbm format allows. Timing comes from a
//! comment in the first image header:
//!
//! ```text
//! P6
//! # fps=12
//! 32 16
//! 255
//! <32*16*3 bytes>
//! P6
//! 32 16
//! 255
//! ...
//! ```
//!
//! `# delay_ms=N` gives an explicit per-frame duration instead.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use roboneo_core::{FaceError, FaceResult};

use crate::{FrameReader, FrameSource, FrameTiming, RawFrame, MAX_FRAME_BYTES};

/// File extension of expression assets
pub const PPM_EXTENSION: &str = "ppm";

/// Frame source reading a PPM sequence file
#[derive(Clone, Debug)]
pub struct PpmSource {
    path: PathBuf,
    name: String,
}

impl PpmSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        PpmSource { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for PpmSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> FaceResult<Box<dyn FrameReader>> {
        let file = File::open(&self.path).map_err(|e| FaceError::asset(&self.name, e))?;
        let mut reader = PpmReader {
            name: self.name.clone(),
            inner: BufReader::new(file),
            count: 0,
            timing: FrameTiming::Unspecified,
        };
        reader.scan().map_err(|e| FaceError::asset(&self.name, e))?;
        Ok(Box::new(reader))
    }
}

#[derive(Clone, Copy, Debug)]
struct PpmHeader {
    width: usize,
    height: usize,
    /// Pixel bytes following the header, bounded by [`MAX_FRAME_BYTES`]
    data_len: usize,
}

struct PpmReader {
    name: String,
    inner: BufReader<File>,
    count: usize,
    timing: FrameTiming,
}

impl PpmReader {
    /// Walk every header once to learn the frame count and timing
    fn scan(&mut self) -> io::Result<()> {
        let mut comments = Vec::new();
        let mut count = 0;
        while let Some(header) = read_header(&mut self.inner, &mut comments)? {
            if count == 0 {
                self.timing = parse_timing(&comments);
            }
            self.inner.seek_relative(header.data_len as i64)?;
            count += 1;
        }
        self.count = count;
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn io_error(&self, e: io::Error) -> FaceError {
        FaceError::asset(&self.name, e)
    }
}

impl FrameReader for PpmReader {
    fn frame_count(&self) -> Option<usize> {
        Some(self.count)
    }

    fn timing(&self) -> FrameTiming {
        self.timing
    }

    fn next_frame(&mut self) -> FaceResult<Option<RawFrame>> {
        let header = match read_header(&mut self.inner, &mut Vec::new()) {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut data = vec![0u8; header.data_len];
        if let Err(e) = self.inner.read_exact(&mut data) {
            return Err(self.io_error(e));
        }
        Ok(Some(RawFrame::new(header.width, header.height, data)))
    }

    fn skip(&mut self, n: usize) -> FaceResult<()> {
        for _ in 0..n {
            let header = match read_header(&mut self.inner, &mut Vec::new()) {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => return Err(self.io_error(e)),
            };
            if let Err(e) = self.inner.seek_relative(header.data_len as i64) {
                return Err(self.io_error(e));
            }
        }
        Ok(())
    }

    fn rewind(&mut self) -> FaceResult<()> {
        self.inner
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| self.io_error(e))
    }
}

/// Encode frames as a PPM sequence
pub fn write_ppm_sequence<W: Write>(
    out: &mut W,
    frames: &[RawFrame],
    timing: FrameTiming,
) -> io::Result<()> {
    for (i, frame) in frames.iter().enumerate() {
        writeln!(out, "P6")?;
        if i == 0 {
            match timing {
                FrameTiming::Fps(fps) => writeln!(out, "# fps={}", fps)?,
                FrameTiming::DurationMs(ms) => writeln!(out, "# delay_ms={}", ms)?,
                FrameTiming::Unspecified => {}
            }
        }
        writeln!(out, "{} {}", frame.width, frame.height)?;
        writeln!(out, "255")?;
        out.write_all(&frame.data)?;
    }
    Ok(())
}

fn next_byte<R: BufRead>(r: &mut R) -> io::Result<Option<u8>> {
    let byte = r.fill_buf()?.first().copied();
    if byte.is_some() {
        r.consume(1);
    }
    Ok(byte)
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn read_comment<R: BufRead>(r: &mut R, comments: &mut Vec<String>) -> io::Result<()> {
    let mut line = Vec::new();
    r.read_until(b'\n', &mut line)?;
    comments.push(String::from_utf8_lossy(&line).trim().to_string());
    Ok(())
}

/// Read a decimal header field, consuming the single whitespace after it
fn read_number<R: BufRead>(r: &mut R, comments: &mut Vec<String>) -> io::Result<usize> {
    let mut value: Option<usize> = None;
    loop {
        let byte = next_byte(r)?.ok_or_else(|| invalid("truncated PPM header"))?;
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as usize;
                let acc = value.unwrap_or(0);
                value = Some(
                    acc.checked_mul(10)
                        .and_then(|v| v.checked_add(digit))
                        .ok_or_else(|| invalid("PPM header field overflow"))?,
                );
            }
            b'#' if value.is_none() => read_comment(r, comments)?,
            b if b.is_ascii_whitespace() => {
                if let Some(v) = value {
                    return Ok(v);
                }
            }
            _ => return Err(invalid("unexpected byte in PPM header")),
        }
    }
}

/// Read the next image header. `Ok(None)` at a clean end of file.
fn read_header<R: BufRead>(r: &mut R, comments: &mut Vec<String>) -> io::Result<Option<PpmHeader>> {
    let first = loop {
        match next_byte(r)? {
            None => return Ok(None),
            Some(b) if b.is_ascii_whitespace() => continue,
            Some(b) => break b,
        }
    };
    let second = next_byte(r)?;
    if first != b'P' || second != Some(b'6') {
        return Err(invalid("not a binary PPM (P6) image"));
    }

    let width = read_number(r, comments)?;
    let height = read_number(r, comments)?;
    let maxval = read_number(r, comments)?;
    if maxval == 0 || maxval > 255 {
        return Err(invalid("only 8-bit PPM images are supported"));
    }
    if width == 0 || height == 0 {
        return Err(invalid("PPM image has no pixels"));
    }
    let data_len = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(3))
        .filter(|&len| len <= MAX_FRAME_BYTES)
        .ok_or_else(|| invalid("PPM image too large"))?;

    Ok(Some(PpmHeader {
        width,
        height,
        data_len,
    }))
}

fn parse_timing(comments: &[String]) -> FrameTiming {
    for comment in comments {
        let text = comment.trim_start_matches('#').trim();
        if let Some(fps) = text.strip_prefix("fps=").and_then(|v| v.trim().parse().ok()) {
            return FrameTiming::Fps(fps);
        }
        if let Some(ms) = text
            .strip_prefix("delay_ms=")
            .and_then(|v| v.trim().parse().ok())
        {
            return FrameTiming::DurationMs(ms);
        }
    }
    FrameTiming::Unspecified
}
