//! Ray intersection with chains of bezier segments
//!
//! Control points are moved into the ray space where the ray is the positive
//! half of the x axis. Number of sign changes of y coordinates of the control
//! polygon bounds the number of crossings (variation diminishing property),
//! arcs with a single crossing are refined with Brent's method and others are
//! subdivided.
use crate::{
    BezierCurve, Curve, Domain, EPSILON, MAX_RECURSION_DEPTH, Point, Ray, Scalar, Transform,
    bezier::{bernstein, de_casteljau},
    numeric::brent_root,
};

/// Ray intersections `(curve parameter, ray parameter)` sorted by curve parameter
pub(crate) fn intersect_ray_segments(
    segments: &[BezierCurve],
    ray: Ray,
    precision: Scalar,
    max_iter: usize,
) -> Vec<(Scalar, Scalar)> {
    let tr = Transform::make_horizontal(ray);
    let mut result = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        let points: Vec<_> = segment.points().iter().map(|p| tr.apply(*p)).collect();
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => continue,
        };
        let mut hits = RayHits {
            domain: segment.domain(),
            precision,
            max_iter,
            out: &mut result,
        };
        // joints are reported once as ends of the preceding segment
        if index == 0 {
            hits.contact(0.0, first);
        }
        hits.search(&points, 0.0, 1.0, 0);
        hits.contact(1.0, last);
    }
    result.dedup_by(|a, b| (a.0 - b.0).abs() <= precision);
    result
}

#[inline]
fn is_zero(value: Scalar) -> bool {
    value.abs() <= EPSILON
}

/// Number of sign changes of y coordinates, zeros are skipped
fn sign_changes(points: &[Point]) -> usize {
    let mut changes = 0;
    let mut prev: Option<bool> = None;
    for point in points {
        let y = point.y();
        if is_zero(y) {
            continue;
        }
        let positive = y > 0.0;
        if prev.is_some_and(|prev| prev != positive) {
            changes += 1;
        }
        prev = Some(positive);
    }
    changes
}

struct RayHits<'a> {
    domain: Domain,
    precision: Scalar,
    max_iter: usize,
    out: &'a mut Vec<(Scalar, Scalar)>,
}

impl RayHits<'_> {
    /// Record point in the ray space at segment local parameter `t` if it is on the ray
    fn contact(&mut self, t: Scalar, point: Point) {
        if is_zero(point.y()) && point.x() >= 0.0 {
            self.out.push((self.domain.global(t), point.x()));
        }
    }

    /// Find crossings of the arc defined by ray space control `points` spanning `[t0, t1]`
    ///
    /// End points of the arc are not reported.
    fn search(&mut self, points: &[Point], t0: Scalar, t1: Scalar, depth: usize) {
        let changes = sign_changes(points);
        if changes == 0 {
            return;
        }
        let first = points[0].y();
        let last = points[points.len() - 1].y();
        if changes == 1 && !is_zero(first) && !is_zero(last) {
            let span = (t1 - t0) * self.domain.length();
            let precision = self.precision / span.max(EPSILON);
            let (t, converged) = brent_root(
                |t| bernstein(points, t).y(),
                0.0,
                1.0,
                precision,
                self.max_iter,
            );
            if !converged {
                tracing::debug!(?t0, ?t1, ?t, "ray intersection refinement did not converge");
            }
            let x = bernstein(points, t).x();
            if x >= 0.0 {
                self.out.push((self.domain.global(t0 + t * (t1 - t0)), x));
            }
            return;
        }
        if depth >= MAX_RECURSION_DEPTH {
            tracing::debug!(?t0, ?t1, "ray intersection reached maximum recursion depth");
            return;
        }
        let tm = 0.5 * (t0 + t1);
        let (left, right) = de_casteljau(points, 0.5);
        self.search(&left, t0, tm, depth + 1);
        self.contact(tm, right[0]);
        self.search(&right, tm, t1, depth + 1);
    }
}
