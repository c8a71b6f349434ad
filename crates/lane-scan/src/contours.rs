//! External contour extraction, area filtering and re-rendering.
//!
//! Foreground is 8-connected, background 4-connected. Only the outer boundary
//! of components that touch the outside background is traced; components
//! sitting inside another component's hole are skipped.

use crate::morphology::{dilate, StructuringElement};
use crate::ContourParams;
use lane_scan_core::GrayImage;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

// Clockwise in image coordinates (y down), starting east.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Closed boundary of one connected foreground region.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    /// Boundary pixels in tracing order, every pair 8-adjacent.
    pub points: Vec<Point2<i32>>,
    /// Polygon area enclosed by the boundary pixel centers.
    pub area: f64,
}

impl Contour {
    fn new(points: Vec<Point2<i32>>) -> Self {
        let area = polygon_area(&points);
        Self { points, area }
    }
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point2<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        acc += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (acc as f64 / 2.0).abs()
}

const UNLABELED: u32 = u32::MAX;

fn label_components(mask: &GrayImage) -> (Vec<u32>, Vec<usize>) {
    let (w, h) = (mask.width, mask.height);
    let mut labels = vec![UNLABELED; w * h];
    let mut starts = Vec::new();
    let mut stack = Vec::new();

    for idx in 0..w * h {
        if mask.data[idx] == 0 || labels[idx] != UNLABELED {
            continue;
        }
        let id = starts.len() as u32;
        starts.push(idx);
        labels[idx] = id;
        stack.push(idx);
        while let Some(i) = stack.pop() {
            let (x, y) = ((i % w) as i32, (i / w) as i32);
            for (dx, dy) in DIRS {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if mask.data[j] != 0 && labels[j] == UNLABELED {
                    labels[j] = id;
                    stack.push(j);
                }
            }
        }
    }
    (labels, starts)
}

/// Background pixels 4-connected to the image border.
fn outside_background(mask: &GrayImage) -> Vec<bool> {
    let (w, h) = (mask.width, mask.height);
    let mut outside = vec![false; w * h];
    let mut stack = Vec::new();
    let seed = |x: usize, y: usize, outside: &mut [bool], stack: &mut Vec<usize>| {
        let i = y * w + x;
        if mask.data[i] == 0 && !outside[i] {
            outside[i] = true;
            stack.push(i);
        }
    };
    for x in 0..w {
        seed(x, 0, &mut outside, &mut stack);
        seed(x, h - 1, &mut outside, &mut stack);
    }
    for y in 0..h {
        seed(0, y, &mut outside, &mut stack);
        seed(w - 1, y, &mut outside, &mut stack);
    }
    while let Some(i) = stack.pop() {
        let (x, y) = (i % w, i / w);
        let mut visit = |j: usize| {
            if mask.data[j] == 0 && !outside[j] {
                outside[j] = true;
                stack.push(j);
            }
        };
        if x > 0 {
            visit(i - 1);
        }
        if x + 1 < w {
            visit(i + 1);
        }
        if y > 0 {
            visit(i - w);
        }
        if y + 1 < h {
            visit(i + w);
        }
    }
    outside
}

fn is_external(idx: usize, w: usize, h: usize, outside: &[bool]) -> bool {
    let (x, y) = (idx % w, idx / w);
    if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
        return true;
    }
    outside[idx - 1] || outside[idx + 1] || outside[idx - w] || outside[idx + w]
}

fn trace_boundary(labels: &[u32], w: usize, h: usize, start: usize) -> Vec<Point2<i32>> {
    let id = labels[start];
    let inside = |x: i32, y: i32| {
        x >= 0
            && y >= 0
            && x < w as i32
            && y < h as i32
            && labels[y as usize * w + x as usize] == id
    };
    let next_from = |p: Point2<i32>, search: usize| -> Option<(Point2<i32>, usize)> {
        (0..8).map(|k| (search + k) % 8).find_map(|d| {
            let (dx, dy) = DIRS[d];
            inside(p.x + dx, p.y + dy).then(|| (Point2::new(p.x + dx, p.y + dy), d))
        })
    };
    // The first search starts from the west neighbour, after each move from
    // the last background pixel examined.
    let search_after = |d: usize| (d + 6 - (d % 2)) % 8;

    let p0 = Point2::new((start % w) as i32, (start / w) as i32);
    let Some((p1, d1)) = next_from(p0, 4) else {
        return vec![p0];
    };

    let mut points = vec![p0];
    let (mut cur, mut dir) = (p1, d1);
    // Bounded by the number of pixel edges a boundary can visit.
    for _ in 0..4 * w * h + 8 {
        if let Some((next, d)) = next_from(cur, search_after(dir)) {
            if cur == p0 && next == p1 {
                break;
            }
            points.push(cur);
            cur = next;
            dir = d;
        } else {
            break;
        }
    }
    points
}

/// All external contours of the foreground of `mask`, in raster order of
/// their top-left pixel.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    if mask.width == 0 || mask.height == 0 {
        return Vec::new();
    }
    let (labels, starts) = label_components(mask);
    if starts.is_empty() {
        return Vec::new();
    }
    let outside = outside_background(mask);
    let (w, h) = (mask.width, mask.height);

    let mut external = vec![false; starts.len()];
    for (i, &l) in labels.iter().enumerate() {
        if l != UNLABELED && !external[l as usize] && is_external(i, w, h, &outside) {
            external[l as usize] = true;
        }
    }

    starts
        .iter()
        .enumerate()
        .filter(|&(id, _)| external[id])
        .map(|(_, &s)| Contour::new(trace_boundary(&labels, w, h, s)))
        .collect()
}

/// Stamp each contour point as a `stroke x stroke` square onto `canvas`.
pub fn draw_contours(canvas: &mut GrayImage, contours: &[Contour], stroke: usize, value: u8) {
    let stroke = stroke.max(1) as i32;
    let lo = -(stroke - 1) / 2;
    let hi = stroke / 2;
    for c in contours {
        for p in &c.points {
            for dy in lo..=hi {
                for dx in lo..=hi {
                    let (x, y) = (p.x + dx, p.y + dy);
                    if x >= 0 && y >= 0 {
                        canvas.set(x as usize, y as usize, value);
                    }
                }
            }
        }
    }
}

/// Cleaned mask together with the contours that produced it.
#[derive(Clone, Debug)]
pub struct LaneContours {
    pub mask: GrayImage,
    pub contours: Vec<Contour>,
    pub rejected: usize,
}

/// Dilate, extract external contours, keep those within the area bounds, and
/// redraw them as outlines on a blank mask.
///
/// An empty result is a valid all-zero mask.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn filter_lane_contours(mask: &GrayImage, params: &ContourParams) -> LaneContours {
    let dilated = if params.dilation_kernel > 1 {
        let se = StructuringElement::rect(params.dilation_kernel, params.dilation_kernel);
        dilate(mask, &se)
    } else {
        mask.clone()
    };

    let all = find_external_contours(&dilated);
    let total = all.len();
    let contours: Vec<Contour> = all.into_iter().filter(|c| params.accepts(c.area)).collect();
    let rejected = total - contours.len();

    let mut out = GrayImage::new(mask.width, mask.height);
    draw_contours(&mut out, &contours, params.stroke_width, 255);
    log::debug!("kept {} of {total} contours", contours.len());

    LaneContours {
        mask: out,
        contours,
        rejected,
    }
}

/// Mask-only form of [`filter_lane_contours`].
pub fn extract_lane_contours(mask: &GrayImage, params: &ContourParams) -> GrayImage {
    filter_lane_contours(mask, params).mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_rect(img: &mut GrayImage, x0: usize, y0: usize, w: usize, h: usize) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.set(x, y, 255);
            }
        }
    }

    #[test]
    fn rectangle_area_is_exact() {
        let mut mask = GrayImage::new(60, 50);
        fill_rect(&mut mask, 10, 5, 21, 11);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area, 20.0 * 10.0);
        // Perimeter pixels of a 21x11 block.
        assert_eq!(contours[0].points.len(), 2 * 21 + 2 * 11 - 4);
    }

    #[test]
    fn boundary_points_are_eight_connected_and_closed() {
        let mut mask = GrayImage::new(40, 40);
        fill_rect(&mut mask, 5, 5, 10, 10);
        fill_rect(&mut mask, 14, 14, 10, 3);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let pts = &contours[0].points;
        for i in 0..pts.len() {
            let (a, b) = (pts[i], pts[(i + 1) % pts.len()]);
            assert!((a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1);
        }
    }

    #[test]
    fn nested_component_is_not_external() {
        let mut mask = GrayImage::new(50, 50);
        fill_rect(&mut mask, 5, 5, 40, 40);
        // Carve a hole and put an island inside it.
        for y in 10..40 {
            for x in 10..40 {
                mask.set(x, y, 0);
            }
        }
        fill_rect(&mut mask, 20, 20, 5, 5);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area, 39.0 * 39.0);
    }

    #[test]
    fn single_pixel_and_line_have_zero_area() {
        let mut mask = GrayImage::new(10, 10);
        mask.set(2, 2, 255);
        fill_rect(&mut mask, 5, 7, 4, 1);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|c| c.area == 0.0));
        assert_eq!(contours[0].points, vec![Point2::new(2, 2)]);
    }

    #[test]
    fn area_filter_rejects_small_and_large_blobs() {
        let params = ContourParams {
            dilation_kernel: 1,
            ..ContourParams::default()
        };
        let mut mask = GrayImage::new(640, 480);
        fill_rect(&mut mask, 10, 10, 30, 30); // area 841: noise
        fill_rect(&mut mask, 100, 10, 41, 41); // area 1600: kept
        fill_rect(&mut mask, 200, 60, 400, 400); // area 399*399: too large
        let out = filter_lane_contours(&mask, &params);
        assert_eq!(out.contours.len(), 1);
        assert_eq!(out.rejected, 2);
        assert_eq!(out.contours[0].area, 1600.0);
        for c in &out.contours {
            assert!(c.area >= params.min_area && c.area <= params.max_area);
        }
        assert_eq!(out.mask.get(100, 30), Some(255));
        assert_eq!(out.mask.get(120, 30), Some(0));
        assert_eq!(out.mask.get(25, 25), Some(0));
    }

    #[test]
    fn dilation_bridges_small_gaps() {
        let params = ContourParams::default();
        let mut mask = GrayImage::new(200, 200);
        // Two 20x50 halves separated by a 3 px gap merge into one region.
        fill_rect(&mut mask, 50, 50, 20, 50);
        fill_rect(&mut mask, 73, 50, 20, 50);
        let out = filter_lane_contours(&mask, &params);
        assert_eq!(out.contours.len(), 1);
        // 43x50 block dilated by 2 px on every side.
        assert_eq!(out.contours[0].area, 46.0 * 53.0);
    }

    #[test]
    fn empty_mask_yields_empty_output() {
        let mask = GrayImage::new(32, 32);
        let out = filter_lane_contours(&mask, &ContourParams::default());
        assert!(out.contours.is_empty());
        assert_eq!(out.mask.count_nonzero(), 0);
        assert_eq!(extract_lane_contours(&mask, &ContourParams::default()), mask);
    }

    #[test]
    fn stroke_width_three_draws_band() {
        let mut canvas = GrayImage::new(10, 10);
        let c = Contour::new(vec![Point2::new(5, 5)]);
        draw_contours(&mut canvas, &[c], 3, 255);
        assert_eq!(canvas.count_nonzero(), 9);
        assert_eq!(canvas.get(4, 4), Some(255));
        assert_eq!(canvas.get(3, 5), Some(0));
    }
}
