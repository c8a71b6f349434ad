//! Plain row-major image containers and sub-pixel samplers.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image buffer length (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
    #[error("invalid image dimensions (width={width}, height={height})")]
    Dimensions { width: usize, height: usize },
}

fn checked_len(width: usize, height: usize, channels: usize) -> Result<usize, ImageError> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(ImageError::Dimensions { width, height })
}

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

impl GrayImage {
    /// All-zero image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 1)?;
        if data.len() != expected {
            return Err(ImageError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of non-zero pixels.
    pub fn count_nonzero(&self) -> usize {
        self.view().count_nonzero()
    }
}

impl GrayImageView<'_> {
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn to_owned_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Borrowed 3-channel interleaved image (channel order is up to the producer).
#[derive(Clone, Copy, Debug)]
pub struct ColorImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h*3
}

/// Owned 3-channel interleaved image.
///
/// Frames enter the pipeline as RGB. After color conversion the same
/// container carries HLS samples, so the struct itself is channel-agnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ColorImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height * 3],
        }
    }

    /// Image filled with one color.
    pub fn filled(width: usize, height: usize, px: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&px);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 3)?;
        if data.len() != expected {
            return Err(ImageError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> ColorImageView<'_> {
        ColorImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, px: [u8; 3]) {
        if x < self.width && y < self.height {
            let i = (y * self.width + x) * 3;
            self.data[i..i + 3].copy_from_slice(&px);
        }
    }

    /// Zero-sized frames count as empty (a stalled capture device yields these).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    /// Replicate a gray image into three equal channels.
    pub fn from_gray(gray: &GrayImageView<'_>) -> Self {
        let mut data = Vec::with_capacity(gray.data.len() * 3);
        for &v in gray.data {
            data.extend_from_slice(&[v, v, v]);
        }
        Self {
            width: gray.width,
            height: gray.height,
            data,
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
    sample_bilinear(src, x, y).clamp(0.0, 255.0) as u8
}

// Keys cubic convolution with a = -0.75, the same kernel OpenCV uses for INTER_CUBIC.
const CUBIC_A: f32 = -0.75;

#[inline]
fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let s = 1.0 - t;
    let w2 = ((a + 2.0) * s - (a + 3.0)) * s * s + 1.0;
    let w3 = 1.0 - w0 - w1 - w2;
    [w0, w1, w2, w3]
}

/// Bicubic sample with zero padding outside the image.
#[inline]
pub fn sample_bicubic(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let wx = cubic_weights(x - x0 as f32);
    let wy = cubic_weights(y - y0 as f32);

    let mut acc = 0.0f32;
    for (j, wyj) in wy.iter().enumerate() {
        let yy = y0 - 1 + j as i32;
        let mut row = 0.0f32;
        for (i, wxi) in wx.iter().enumerate() {
            row += wxi * get_gray(src, x0 - 1 + i as i32, yy) as f32;
        }
        acc += wyj * row;
    }
    acc
}

#[inline]
pub fn sample_bicubic_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bicubic(src, x, y).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(w: usize, h: usize) -> GrayImage {
        let data = (0..h)
            .flat_map(|_| (0..w).map(|x| (x * 10) as u8))
            .collect();
        GrayImage::from_raw(w, h, data).expect("ramp")
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        let err = GrayImage::from_raw(4, 4, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            ImageError::BufferLength {
                expected: 16,
                got: 15
            }
        );
        assert!(ColorImage::from_raw(2, 2, vec![0; 12]).is_ok());
    }

    #[test]
    fn cubic_weights_sum_to_one() {
        for t in [0.0f32, 0.25, 0.5, 0.9] {
            let w = cubic_weights(t);
            assert_abs_diff_eq!(w.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn bicubic_reproduces_integer_samples() {
        let img = ramp(8, 6);
        let v = img.view();
        assert_abs_diff_eq!(sample_bicubic(&v, 3.0, 2.0), 30.0, epsilon = 1e-3);
        assert_eq!(sample_bicubic_u8(&v, 5.0, 4.0), 50);
    }

    #[test]
    fn bicubic_interpolates_linear_ramp_interior() {
        let img = ramp(10, 6);
        let v = img.view();
        assert_abs_diff_eq!(sample_bicubic(&v, 4.5, 3.0), 45.0, epsilon = 1e-2);
        assert_abs_diff_eq!(sample_bilinear(&v, 4.5, 3.0), 45.0, epsilon = 1e-4);
    }

    #[test]
    fn samples_far_outside_are_zero() {
        let img = GrayImage {
            width: 4,
            height: 4,
            data: vec![255; 16],
        };
        assert_eq!(sample_bicubic_u8(&img.view(), -10.0, 2.0), 0);
        assert_eq!(sample_bilinear_u8(&img.view(), 2.0, 40.0), 0);
    }

    #[test]
    fn color_image_helpers() {
        let mut img = ColorImage::filled(3, 2, [1, 2, 3]);
        img.put_pixel(2, 1, [9, 8, 7]);
        assert_eq!(img.pixel(2, 1), [9, 8, 7]);
        assert_eq!(img.pixels().count(), 6);
        assert!(!img.is_empty());
        assert!(ColorImage::new(0, 0).is_empty());
    }
}
