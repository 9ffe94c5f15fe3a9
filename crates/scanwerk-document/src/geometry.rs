// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Planar geometry for document rectification: corner ordering, output
// extent, homography solving, resampling, and closed-polygon simplification.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use scanwerk_core::Point;
use scanwerk_core::error::{Result, ScanwerkError};

/// Points closer than this are treated as the same point.
const COINCIDENT_EPSILON: f32 = 0.5;

/// Minimum |cross product| for three consecutive corners to count as a turn.
const COLLINEAR_EPSILON: f32 = 1e-3;

/// Fill used for output pixels whose source lies outside the frame.
const OUT_OF_BOUNDS_FILL: Rgb<u8> = Rgb([0, 0, 0]);

/// Four document corners in canonical order.
///
/// Only [`order_quadrilateral`] constructs one, so every `Quadrilateral` is
/// strictly convex and ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    top_left: Point,
    top_right: Point,
    bottom_right: Point,
    bottom_left: Point,
}

impl Quadrilateral {
    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn top_right(&self) -> Point {
        self.top_right
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    pub fn bottom_left(&self) -> Point {
        self.bottom_left
    }

    /// Corners as `[top_left, top_right, bottom_right, bottom_left]`.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Enclosed area in square pixels.
    pub fn area(&self) -> f64 {
        shoelace_area(&self.corners())
    }

    /// The same quadrilateral shifted by `(dx, dy)`. Translation keeps order.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        let shift = |p: Point| Point::new(p.x + dx, p.y + dy);
        Self {
            top_left: shift(self.top_left),
            top_right: shift(self.top_right),
            bottom_right: shift(self.bottom_right),
            bottom_left: shift(self.bottom_left),
        }
    }
}

/// Sort four points into (top-left, top-right, bottom-right, bottom-left).
///
/// `x + y` is smallest at the top-left and largest at the bottom-right;
/// `x - y` is largest at the top-right and smallest at the bottom-left. Ties
/// are broken on `y` then `x` so the result does not depend on input order.
///
/// Fails with `GeometryDegenerate` for duplicated, collinear, or non-convex
/// point sets.
pub fn order_quadrilateral(points: [Point; 4]) -> Result<Quadrilateral> {
    for i in 0..4 {
        if !points[i].x.is_finite() || !points[i].y.is_finite() {
            return Err(ScanwerkError::GeometryDegenerate(
                "non-finite corner coordinate".into(),
            ));
        }
        for j in (i + 1)..4 {
            if points[i].distance(&points[j]) < COINCIDENT_EPSILON {
                return Err(ScanwerkError::GeometryDegenerate(format!(
                    "duplicate corner at ({}, {})",
                    points[i].x, points[i].y
                )));
            }
        }
    }

    let sum = |p: &Point| p.x + p.y;
    let diff = |p: &Point| p.x - p.y;
    let key = |primary: f32, p: &Point| (primary, p.y, p.x);
    let cmp = |a: (f32, f32, f32), b: (f32, f32, f32)| {
        a.0.total_cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.total_cmp(&b.2))
    };

    let pick = |metric: &dyn Fn(&Point) -> f32, largest: bool| -> usize {
        let mut best = 0;
        for i in 1..4 {
            let ordering = cmp(key(metric(&points[i]), &points[i]), key(metric(&points[best]), &points[best]));
            let better = if largest {
                ordering.is_gt()
            } else {
                ordering.is_lt()
            };
            if better {
                best = i;
            }
        }
        best
    };

    let tl = pick(&sum, false);
    let br = pick(&sum, true);
    let tr = pick(&diff, true);
    let bl = pick(&diff, false);

    let mut seen = [false; 4];
    for idx in [tl, tr, br, bl] {
        if seen[idx] {
            return Err(ScanwerkError::GeometryDegenerate(
                "corners do not resolve to four distinct positions".into(),
            ));
        }
        seen[idx] = true;
    }

    let quad = Quadrilateral {
        top_left: points[tl],
        top_right: points[tr],
        bottom_right: points[br],
        bottom_left: points[bl],
    };
    ensure_convex(&quad)?;
    Ok(quad)
}

/// Every turn along the ordered outline must bend the same way.
fn ensure_convex(quad: &Quadrilateral) -> Result<()> {
    let corners = quad.corners();
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < COLLINEAR_EPSILON {
            return Err(ScanwerkError::GeometryDegenerate(
                "three corners are collinear".into(),
            ));
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return Err(ScanwerkError::GeometryDegenerate(
                "quadrilateral is not convex".into(),
            ));
        }
    }
    Ok(())
}

/// Size of the flattened page: the longer of each pair of opposite edges,
/// rounded, and never smaller than one pixel.
pub fn destination_extent(quad: &Quadrilateral) -> (u32, u32) {
    let top = quad.top_left.distance(&quad.top_right);
    let bottom = quad.bottom_left.distance(&quad.bottom_right);
    let left = quad.top_left.distance(&quad.bottom_left);
    let right = quad.top_right.distance(&quad.bottom_right);

    let width = top.max(bottom).round().max(1.0) as u32;
    let height = left.max(right).round().max(1.0) as u32;
    (width, height)
}

/// Homography taking the quad corners to `(0,0) (w,0) (w,h) (0,h)`.
pub fn rectification_transform(quad: &Quadrilateral, width: u32, height: u32) -> Result<Projection> {
    let (w, h) = (width as f32, height as f32);
    let src = quad.corners().map(|p| p.as_tuple());
    let dest = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    Projection::from_control_points(src, dest).ok_or_else(|| {
        ScanwerkError::GeometryDegenerate("perspective transform is singular".into())
    })
}

/// Warp the quad region of `source` into an axis-aligned image sized by
/// [`destination_extent`]. Samples outside `source` are black.
pub fn perspective_rectify(source: &RgbImage, quad: &Quadrilateral) -> Result<RgbImage> {
    let (width, height) = destination_extent(quad);
    let projection = rectification_transform(quad, width, height)?;

    let mut output = RgbImage::new(width, height);
    warp_into(
        source,
        &projection,
        Interpolation::Bilinear,
        OUT_OF_BOUNDS_FILL,
        &mut output,
    );
    Ok(output)
}

// -- Polygons ------------------------------------------------------------------

/// Area of a closed polygon via the shoelace formula. Vertex order may be CW
/// or CCW.
pub fn shoelace_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += points[i].x as f64 * points[j].y as f64;
        twice_area -= points[j].x as f64 * points[i].y as f64;
    }
    twice_area.abs() / 2.0
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at its first point and the point farthest from it,
/// each half is simplified independently, and finally any vertex lying within
/// `epsilon` of the chord between its neighbours (including across the seam)
/// is dropped.
pub fn approximate_closed_polygon(contour: &[Point], epsilon: f64) -> Vec<Point> {
    if contour.len() < 3 {
        return contour.to_vec();
    }
    let epsilon = epsilon as f32;

    let start = contour[0];
    let far = contour
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| start.distance(a).total_cmp(&start.distance(b)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut second_half: Vec<Point> = contour[far..].to_vec();
    second_half.push(start);

    let mut polygon = simplify_open(&contour[..=far], epsilon);
    polygon.pop();
    let mut tail = simplify_open(&second_half, epsilon);
    tail.pop();
    polygon.extend(tail);

    polygon.dedup_by(|a, b| a.distance(b) < COINCIDENT_EPSILON);
    prune_flat_vertices(&mut polygon, epsilon);
    polygon
}

/// Open-curve Douglas-Peucker; keeps both endpoints.
fn simplify_open(curve: &[Point], epsilon: f32) -> Vec<Point> {
    let last = curve.len() - 1;
    if last < 2 {
        return curve.to_vec();
    }

    let (mut index, mut dmax) = (0, 0.0f32);
    for (i, point) in curve.iter().enumerate().take(last).skip(1) {
        let d = distance_to_line(point, &curve[0], &curve[last]);
        if d > dmax {
            index = i;
            dmax = d;
        }
    }

    if dmax > epsilon {
        let mut left = simplify_open(&curve[..=index], epsilon);
        left.pop();
        left.extend(simplify_open(&curve[index..], epsilon));
        left
    } else {
        vec![curve[0], curve[last]]
    }
}

fn prune_flat_vertices(polygon: &mut Vec<Point>, epsilon: f32) {
    let mut i = 0;
    let mut stable = 0;
    while polygon.len() > 3 && stable < polygon.len() {
        let n = polygon.len();
        let idx = i % n;
        let prev = polygon[(idx + n - 1) % n];
        let next = polygon[(idx + 1) % n];
        if distance_to_line(&polygon[idx], &prev, &next) <= epsilon {
            polygon.remove(idx);
            stable = 0;
        } else {
            i = idx + 1;
            stable += 1;
        }
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`; falls back
/// to the point distance when `a == b`.
fn distance_to_line(p: &Point, a: &Point, b: &Point) -> f32 {
    let length = a.distance(b);
    if length < f32::EPSILON {
        return p.distance(a);
    }
    ((b.x - a.x) * (a.y - p.y) - (a.x - p.x) * (b.y - a.y)).abs() / length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    fn sample_quad() -> [Point; 4] {
        [p(102.0, 48.0), p(498.0, 71.0), p(470.0, 640.0), p(88.0, 610.0)]
    }

    fn permutations(items: [Point; 4]) -> Vec<[Point; 4]> {
        let mut out = Vec::new();
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        let idx = [a, b, c, d];
                        let mut used = [false; 4];
                        if idx.iter().all(|&i| !std::mem::replace(&mut used[i], true)) {
                            out.push(idx.map(|i| items[i]));
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn orders_canonically() {
        let quad = order_quadrilateral([p(470.0, 640.0), p(102.0, 48.0), p(88.0, 610.0), p(498.0, 71.0)])
            .expect("valid quad");
        assert_eq!(quad.top_left(), p(102.0, 48.0));
        assert_eq!(quad.top_right(), p(498.0, 71.0));
        assert_eq!(quad.bottom_right(), p(470.0, 640.0));
        assert_eq!(quad.bottom_left(), p(88.0, 610.0));
    }

    #[test]
    fn ordering_is_idempotent_for_every_permutation() {
        let perms = permutations(sample_quad());
        assert_eq!(perms.len(), 24);

        let reference = order_quadrilateral(sample_quad()).expect("valid quad");
        for perm in perms {
            let once = order_quadrilateral(perm).expect("valid quad");
            let twice = order_quadrilateral(once.corners()).expect("valid quad");
            assert_eq!(once, reference);
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn diamond_orders_without_ties_colliding() {
        let quad = order_quadrilateral([p(50.0, 0.0), p(100.0, 50.0), p(50.0, 100.0), p(0.0, 50.0)])
            .expect("diamond is a valid quad");
        assert!((quad.area() - 5000.0).abs() < 1e-3);
    }

    #[test]
    fn duplicate_points_are_degenerate() {
        let err = order_quadrilateral([p(0.0, 0.0), p(0.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);
        assert!(matches!(err, Err(ScanwerkError::GeometryDegenerate(_))));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let err = order_quadrilateral([p(0.0, 0.0), p(10.0, 10.0), p(20.0, 20.0), p(30.0, 30.0)]);
        assert!(matches!(err, Err(ScanwerkError::GeometryDegenerate(_))));
    }

    #[test]
    fn extent_uses_longest_edges() {
        let quad = order_quadrilateral([p(0.0, 0.0), p(100.0, 0.0), p(90.0, 50.0), p(10.0, 60.0)])
            .expect("valid quad");
        let (w, h) = destination_extent(&quad);
        assert_eq!(w, 100);
        // left edge is sqrt(10^2 + 60^2) ~= 60.8
        assert_eq!(h, 61);
    }

    #[test]
    fn rectification_round_trips_corners() {
        let quad = order_quadrilateral(sample_quad()).expect("valid quad");
        let (w, h) = destination_extent(&quad);
        let projection = rectification_transform(&quad, w, h).expect("solvable");
        let inverse = projection.invert();

        let targets = [(0.0, 0.0), (w as f32, 0.0), (w as f32, h as f32), (0.0, h as f32)];
        for (corner, target) in quad.corners().iter().zip(targets) {
            let (fx, fy) = projection * corner.as_tuple();
            assert!((fx - target.0).abs() < 0.5 && (fy - target.1).abs() < 0.5);

            let (bx, by) = inverse * target;
            assert!((bx - corner.x).abs() < 0.5 && (by - corner.y).abs() < 0.5);
        }
    }

    #[test]
    fn rectify_axis_aligned_region_copies_pixels() {
        let mut source = RgbImage::from_pixel(60, 40, Rgb([10, 10, 10]));
        for y in 10..30 {
            for x in 20..50 {
                source.put_pixel(x, y, Rgb([200, 200, 200]));
            }
        }
        let quad = order_quadrilateral([p(20.0, 10.0), p(50.0, 10.0), p(50.0, 30.0), p(20.0, 30.0)])
            .expect("valid quad");
        let out = perspective_rectify(&source, &quad).expect("rectify");
        assert_eq!(out.dimensions(), (30, 20));
        assert_eq!(out.get_pixel(15, 10), &Rgb([200, 200, 200]));
    }

    #[test]
    fn rectify_outside_source_is_black_not_garbage() {
        let source = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        let quad = order_quadrilateral([p(-40.0, -40.0), p(60.0, -40.0), p(60.0, 60.0), p(-40.0, 60.0)])
            .expect("valid quad");
        let out = perspective_rectify(&source, &quad).expect("rectify");
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(50, 50), &Rgb([255, 255, 255]));
    }

    #[test]
    fn shoelace_area_rectangle() {
        let corners = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 5.0), p(0.0, 5.0)];
        let area = shoelace_area(&corners);
        assert!((area - 50.0).abs() < 1e-6, "Expected 50.0, got {}", area);
    }

    #[test]
    fn approximates_dense_rectangle_outline_to_four_corners() {
        let mut outline = Vec::new();
        for x in 0..100 {
            outline.push(p(x as f32, 0.0));
        }
        for y in 0..60 {
            outline.push(p(99.0, y as f32));
        }
        for x in (0..100).rev() {
            outline.push(p(x as f32, 59.0));
        }
        for y in (1..60).rev() {
            outline.push(p(0.0, y as f32));
        }
        outline.dedup();

        let polygon = approximate_closed_polygon(&outline, 0.015 * 316.0);
        assert_eq!(polygon.len(), 4, "got {:?}", polygon);
    }

    #[test]
    fn approximation_starting_mid_edge_drops_seam_vertex() {
        let mut outline = Vec::new();
        for x in 50..100 {
            outline.push(p(x as f32, 0.0));
        }
        for y in 1..60 {
            outline.push(p(99.0, y as f32));
        }
        for x in (0..99).rev() {
            outline.push(p(x as f32, 59.0));
        }
        for y in (0..59).rev() {
            outline.push(p(0.0, y as f32));
        }
        for x in 1..50 {
            outline.push(p(x as f32, 0.0));
        }

        let polygon = approximate_closed_polygon(&outline, 4.0);
        assert_eq!(polygon.len(), 4, "got {:?}", polygon);
    }
}
