//! Gray-level morphology with arbitrary flat structuring elements.
//!
//! Samples outside the image are ignored, so borders neither grow nor erode
//! the foreground.

use lane_scan_core::{ColorImage, GrayImage};

/// Flat structuring element anchored at its center.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuringElement {
    pub width: usize,
    pub height: usize,
    data: Vec<bool>,
}

impl StructuringElement {
    pub fn rect(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![true; width * height],
        }
    }

    /// Ellipse inscribed in a `width x height` box.
    pub fn ellipse(width: usize, height: usize) -> Self {
        let mut data = vec![false; width * height];
        let r = (height / 2) as i64;
        let c = (width / 2) as i64;
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };
        for i in 0..height {
            let dy = i as i64 - r;
            if dy.abs() > r {
                continue;
            }
            let dx = (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as i64;
            let j1 = (c - dx).max(0) as usize;
            let j2 = ((c + dx + 1) as usize).min(width);
            data[i * width + j1..i * width + j2].fill(true);
        }
        Self {
            width,
            height,
            data,
        }
    }

    fn offsets(&self) -> Vec<(isize, isize)> {
        let ax = (self.width / 2) as isize;
        let ay = (self.height / 2) as isize;
        (0..self.height)
            .flat_map(|j| (0..self.width).map(move |i| (i, j)))
            .filter(|&(i, j)| self.data[j * self.width + i])
            .map(|(i, j)| (i as isize - ax, j as isize - ay))
            .collect()
    }
}

fn rank_filter(src: &GrayImage, se: &StructuringElement, take_max: bool) -> GrayImage {
    let offsets = se.offsets();
    let (w, h) = (src.width as isize, src.height as isize);
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..h {
        for x in 0..w {
            let mut acc: Option<u8> = None;
            for &(dx, dy) in &offsets {
                let (xx, yy) = (x + dx, y + dy);
                if xx < 0 || yy < 0 || xx >= w || yy >= h {
                    continue;
                }
                let v = src.data[(yy * w + xx) as usize];
                acc = Some(match acc {
                    None => v,
                    Some(a) if take_max => a.max(v),
                    Some(a) => a.min(v),
                });
            }
            out.data[(y * w + x) as usize] = acc.unwrap_or(src.data[(y * w + x) as usize]);
        }
    }
    out
}

pub fn dilate(src: &GrayImage, se: &StructuringElement) -> GrayImage {
    rank_filter(src, se, true)
}

pub fn erode(src: &GrayImage, se: &StructuringElement) -> GrayImage {
    rank_filter(src, se, false)
}

/// Dilation followed by erosion: fills gaps narrower than the element.
pub fn close(src: &GrayImage, se: &StructuringElement) -> GrayImage {
    erode(&dilate(src, se), se)
}

/// Erosion followed by dilation: removes specks smaller than the element.
pub fn open(src: &GrayImage, se: &StructuringElement) -> GrayImage {
    dilate(&erode(src, se), se)
}

fn split_channels(img: &ColorImage) -> [GrayImage; 3] {
    let mut planes = [
        GrayImage::new(img.width, img.height),
        GrayImage::new(img.width, img.height),
        GrayImage::new(img.width, img.height),
    ];
    for (i, px) in img.data.chunks_exact(3).enumerate() {
        for (c, plane) in planes.iter_mut().enumerate() {
            plane.data[i] = px[c];
        }
    }
    planes
}

fn merge_channels(planes: &[GrayImage; 3]) -> ColorImage {
    let mut out = ColorImage::new(planes[0].width, planes[0].height);
    for (i, px) in out.data.chunks_exact_mut(3).enumerate() {
        for (c, plane) in planes.iter().enumerate() {
            px[c] = plane.data[i];
        }
    }
    out
}

/// Alternate closing and opening with growing elliptical elements (3x3, 5x5).
///
/// Flattens texture inside painted regions while keeping their outlines;
/// applied per channel.
pub fn smooth_close_open(img: &ColorImage) -> ColorImage {
    let mut planes = split_channels(img);
    for r in 1..3 {
        let se = StructuringElement::ellipse(2 * r + 1, 2 * r + 1);
        for plane in planes.iter_mut() {
            *plane = open(&close(plane, &se), &se);
        }
    }
    merge_channels(&planes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel(w: usize, h: usize, x: usize, y: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        img.set(x, y, 255);
        img
    }

    #[test]
    fn rect_dilation_grows_a_pixel_into_a_block() {
        let img = single_pixel(11, 11, 5, 5);
        let out = dilate(&img, &StructuringElement::rect(5, 5));
        assert_eq!(out.count_nonzero(), 25);
        assert_eq!(out.get(3, 3), Some(255));
        assert_eq!(out.get(2, 5), Some(0));
    }

    #[test]
    fn ellipse_5x5_has_rounded_corners() {
        let se = StructuringElement::ellipse(5, 5);
        assert_eq!(se.offsets().len(), 17);
        assert!(!se.data[0]);
        assert!(se.data[2]);
    }

    #[test]
    fn open_removes_single_pixel_speck() {
        let img = single_pixel(7, 7, 3, 3);
        let out = open(&img, &StructuringElement::rect(3, 3));
        assert_eq!(out.count_nonzero(), 0);
    }

    #[test]
    fn close_fills_one_pixel_gap() {
        let mut img = GrayImage::new(9, 5);
        for x in 0..9 {
            if x != 4 {
                img.set(x, 2, 255);
            }
        }
        let out = close(&img, &StructuringElement::rect(3, 1));
        assert_eq!(out.get(4, 2), Some(255));
    }

    #[test]
    fn smoothing_keeps_constant_color() {
        let img = ColorImage::filled(6, 6, [30, 60, 90]);
        assert_eq!(smooth_close_open(&img), img);
    }
}
