/// Borrowed single-channel 8-bit image.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Borrowed interleaved RGB image.
#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h*3
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wrap a raw buffer; `None` when the length does not match the size.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width.checked_mul(height)?).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    /// Replicate the single channel into an RGB image.
    pub fn to_rgb(&self) -> RgbImage {
        let mut data = Vec::with_capacity(self.data.len() * 3);
        for &v in &self.data {
            data.extend_from_slice(&[v, v, v]);
        }
        RgbImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn to_owned(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Image filled with a single colour.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap a raw interleaved buffer; `None` when the length does not match.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width.checked_mul(height)?.checked_mul(3)?).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> RgbImageView<'_> {
        RgbImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Bounds-checked `set` taking signed coordinates; out-of-frame writes are dropped.
    #[inline]
    pub fn put(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.set(x as usize, y as usize, rgb);
        }
    }

    /// `self = self * alpha + other * beta`, saturating per channel.
    ///
    /// Panics if the sizes differ.
    pub fn blend(&mut self, other: &RgbImage, alpha: f32, beta: f32) {
        assert_eq!(
            (self.width, self.height),
            (other.width, other.height),
            "blend requires equally sized images"
        );
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            let v = *a as f32 * alpha + b as f32 * beta;
            *a = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    /// Scale every channel of the axis-aligned box `[x0, x1) × [y0, y1)`.
    pub fn shade_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, factor: f32) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        for y in y0.min(y1)..y1 {
            for x in x0.min(x1)..x1 {
                let i = (y * self.width + x) * 3;
                for c in &mut self.data[i..i + 3] {
                    *c = (*c as f32 * factor).round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    /// Outline of a rectangle with the given stroke thickness (inclusive corners).
    pub fn draw_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, rgb: [u8; 3], thickness: i64) {
        for t in 0..thickness.max(1) {
            for x in x0..=x1 {
                self.put(x, y0 + t, rgb);
                self.put(x, y1 - t, rgb);
            }
            for y in y0..=y1 {
                self.put(x0 + t, y, rgb);
                self.put(x1 - t, y, rgb);
            }
        }
    }

    /// Copy `src` with its top-left corner at `(x0, y0)`, clipping to the frame.
    pub fn paste(&mut self, src: &RgbImage, x0: usize, y0: usize) {
        for y in 0..src.height {
            if y0 + y >= self.height {
                break;
            }
            for x in 0..src.width {
                if x0 + x >= self.width {
                    break;
                }
                self.set(x0 + x, y0 + y, src.get(x, y));
            }
        }
    }
}

impl RgbImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn to_owned(&self) -> RgbImage {
        RgbImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
fn get_rgb(src: &RgbImageView<'_>, x: i32, y: i32) -> [f32; 3] {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return [0.0; 3];
    }
    let i = (y as usize * src.width + x as usize) * 3;
    [
        src.data[i] as f32,
        src.data[i + 1] as f32,
        src.data[i + 2] as f32,
    ]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}

/// Per-channel bilinear sample; out-of-frame neighbours read as black.
#[inline]
pub fn sample_bilinear_rgb(src: &RgbImageView<'_>, x: f32, y: f32) -> [u8; 3] {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_rgb(src, x0, y0);
    let p10 = get_rgb(src, x0 + 1, y0);
    let p01 = get_rgb(src, x0, y0 + 1);
    let p11 = get_rgb(src, x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Bilinear resize of an RGB image (used for diagnostic thumbnails).
pub fn resize_rgb(src: &RgbImageView<'_>, out_w: usize, out_h: usize) -> RgbImage {
    let mut out = RgbImage::new(out_w, out_h);
    if out_w == 0 || out_h == 0 || src.width == 0 || src.height == 0 {
        return out;
    }
    let sx = src.width as f32 / out_w as f32;
    let sy = src.height as f32 / out_h as f32;
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;
    for y in 0..out_h {
        let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        for x in 0..out_w {
            let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            out.set(x, y, sample_bilinear_rgb(src, fx, fy));
        }
    }
    out
}
