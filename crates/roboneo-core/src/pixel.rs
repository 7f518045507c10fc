//! Pixel grids
//!
//! The face is a fixed 32×16 RGB image. Each board physically owns one
//! 16×16 half. Dimensions are const generics, so a grid can never change
//! size after construction.

/// Full face width in pixels
pub const FACE_WIDTH: usize = 32;

/// Face height in pixels
pub const FACE_HEIGHT: usize = 16;

/// Width of the half owned by one board
pub const HALF_WIDTH: usize = FACE_WIDTH / 2;

/// Serialized size of one half-image (row-major RGB)
pub const HALF_IMAGE_BYTES: usize = HALF_WIDTH * FACE_HEIGHT * 3;

/// One RGB pixel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

/// Fixed-size RGB pixel grid, stored row-major
#[derive(Clone, PartialEq, Eq)]
pub struct PixelGrid<const W: usize, const H: usize> {
    rows: [[Rgb; W]; H],
}

/// The whole composed face
pub type FrameBuffer = PixelGrid<FACE_WIDTH, FACE_HEIGHT>;

/// The half of the face one board displays
pub type HalfImage = PixelGrid<HALF_WIDTH, FACE_HEIGHT>;

impl<const W: usize, const H: usize> PixelGrid<W, H> {
    pub const WIDTH: usize = W;
    pub const HEIGHT: usize = H;
    /// Serialized length in bytes
    pub const BYTE_LEN: usize = W * H * 3;

    /// Solid black grid
    pub const fn black() -> Self {
        Self::filled(Rgb::BLACK)
    }

    /// Grid filled with a single colour
    pub const fn filled(color: Rgb) -> Self {
        PixelGrid {
            rows: [[color; W]; H],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Set a pixel. Out-of-range coordinates are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: Rgb) {
        if let Some(px) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *px = color;
        }
    }

    pub fn fill(&mut self, color: Rgb) {
        for row in self.rows.iter_mut() {
            row.fill(color);
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Rgb; W]> {
        self.rows.iter()
    }

    /// Row-major RGB bytes
    pub fn as_rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::BYTE_LEN);
        for row in &self.rows {
            for px in row {
                out.extend_from_slice(&[px.r, px.g, px.b]);
            }
        }
        out
    }

    /// Parse row-major RGB bytes. The slice must be exactly `BYTE_LEN` long.
    pub fn from_rgb_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != Self::BYTE_LEN {
            return None;
        }
        Self::from_rgb_cropped(W, H, data)
    }

    /// Crop a decoded `width`×`height` RGB image to this grid, anchored at
    /// the top-left corner. Area the source does not cover stays black.
    pub fn from_rgb_cropped(width: usize, height: usize, data: &[u8]) -> Option<Self> {
        if data.len() < width * height * 3 {
            return None;
        }

        let mut grid = Self::black();
        for y in 0..height.min(H) {
            for x in 0..width.min(W) {
                let i = (y * width + x) * 3;
                grid.rows[y][x] = Rgb::new(data[i], data[i + 1], data[i + 2]);
            }
        }
        Some(grid)
    }

    /// Copy of this grid reflected left-to-right
    pub fn mirrored(&self) -> Self {
        let mut out = self.clone();
        for row in out.rows.iter_mut() {
            row.reverse();
        }
        out
    }

    /// Copy of this grid reflected top-to-bottom
    pub fn flipped(&self) -> Self {
        let mut out = self.clone();
        out.rows.reverse();
        out
    }

    /// Draw a line between two points (inclusive), clipped to the grid
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), color: Rgb) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            if x >= 0 && y >= 0 {
                self.set(x as usize, y as usize, color);
            }
            if x == to.0 && y == to.1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

impl<const N: usize> PixelGrid<N, N> {
    /// Copy of this square grid rotated clockwise by `degrees`
    /// (rounded down to a multiple of 90).
    pub fn rotated(&self, degrees: u16) -> Self {
        let mut out = self.clone();
        for _ in 0..(degrees / 90) % 4 {
            let src = out.clone();
            for y in 0..N {
                for x in 0..N {
                    out.rows[y][x] = src.rows[N - 1 - x][y];
                }
            }
        }
        out
    }
}

impl FrameBuffer {
    /// Split the face into (left, right) halves
    pub fn split_halves(&self) -> (HalfImage, HalfImage) {
        let mut left = HalfImage::black();
        let mut right = HalfImage::black();
        for (y, row) in self.rows.iter().enumerate() {
            left.rows[y].copy_from_slice(&row[..HALF_WIDTH]);
            right.rows[y].copy_from_slice(&row[HALF_WIDTH..]);
        }
        (left, right)
    }
}

impl<const W: usize, const H: usize> Default for PixelGrid<W, H> {
    fn default() -> Self {
        Self::black()
    }
}

impl<const W: usize, const H: usize> std::fmt::Debug for PixelGrid<W, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self
            .rows
            .iter()
            .flatten()
            .filter(|px| **px != Rgb::BLACK)
            .count();
        write!(f, "PixelGrid<{}x{}>({} lit)", W, H, lit)
    }
}
