//! Flattening of quadratic and cubic arcs
//!
//! Arcs here are bezier curves over unit parameter interval given by a fixed
//! number of control points.
use crate::{
    ArrayIter, EPSILON, EPSILON_SQRT, MAX_RECURSION_DEPTH, Point, Scalar, curve::chord_distance_sq,
    utils::{M4x4, quadratic_solve},
};

/// Variation checks leave this relative margin below requested deviation
const VARIATION_MARGIN: Scalar = 1.0 - 1e-9;
/// Fraction by which a coincident control point is moved toward its neighbour
const NUDGE: Scalar = 1e-6;
/// Relative size of the inflection equation discriminant treated as zero (cusp)
const CUSP_TOLERANCE: Scalar = 1e-10;

/// Quadratic bezier arc
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct QuadArc(pub [Point; 3]);

impl QuadArc {
    pub fn split_at(&self, t: Scalar) -> (Self, Self) {
        let Self([p0, p1, p2]) = *self;
        let (t1, t_1) = (t, 1.0 - t);
        let (t2, t_2) = (t1 * t1, t_1 * t_1);
        let mid = t_2 * p0 + 2.0 * t1 * t_1 * p1 + t2 * p2;
        (
            Self([p0, t_1 * p0 + t * p1, mid]),
            Self([mid, t_1 * p1 + t * p2, p2]),
        )
    }
}

/// Flatten quadratic arc
///
/// Deviation of the arc over parameter span `t` from its chord is `|k| t^2` where
/// `k = -p0 / 4 + p1 / 2 - p2 / 4`, so the step is chosen as `max_deviation^(1/4) / sqrt(|k|)`.
pub(crate) fn flatten_quad(
    arc: QuadArc,
    max_deviation: Scalar,
    include_last: bool,
    out: &mut Vec<Point>,
) {
    let eps = max_deviation.powf(0.25);
    let mut cur = arc;
    loop {
        let QuadArc([p0, p1, p2]) = cur;
        out.push(p0);
        let k = (-0.25 * p0 + 0.5 * p1 - 0.25 * p2).length();
        if k < EPSILON {
            break;
        }
        let t = eps / k.sqrt();
        if t >= 1.0 {
            break;
        }
        cur = cur.split_at(t).1;
    }
    if include_last {
        out.push(arc.0[2]);
    }
}

/// Matrix form for cubic bezier curve
#[rustfmt::skip]
const C: M4x4 = M4x4([
    1.0,  0.0,  0.0, 0.0,
   -3.0,  3.0,  0.0, 0.0,
    3.0, -6.0,  3.0, 0.0,
   -1.0,  3.0, -3.0, 1.0,
]);

/// Inverted matrix form for cubic bezier curve
#[rustfmt::skip]
const CI: M4x4 = M4x4([
    1.0, 0.0      , 0.0      , 0.0,
    1.0, 1.0 / 3.0, 0.0      , 0.0,
    1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0,
    1.0, 1.0      , 1.0      , 1.0,
]);

/// Cubic bezier arc
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CubicArc(pub [Point; 4]);

impl CubicArc {
    pub fn at(&self, t: Scalar) -> Point {
        let Self([p0, p1, p2, p3]) = *self;
        let (t1, t_1) = (t, 1.0 - t);
        let (t2, t_2) = (t1 * t1, t_1 * t_1);
        let (t3, t_3) = (t2 * t1, t_2 * t_1);
        t_3 * p0 + 3.0 * t1 * t_2 * p1 + 3.0 * t2 * t_1 * p2 + t3 * p3
    }

    pub fn split_at(&self, t: Scalar) -> (Self, Self) {
        let Self([p0, p1, p2, p3]) = *self;
        let (t1, t_1) = (t, 1.0 - t);
        let (t2, t_2) = (t1 * t1, t_1 * t_1);
        let mid = self.at(t);
        let c0 = Self([
            p0,
            t_1 * p0 + t * p1,
            t_2 * p0 + 2.0 * t * t_1 * p1 + t2 * p2,
            mid,
        ]);
        let c1 = Self([
            mid,
            t_2 * p1 + 2.0 * t * t_1 * p2 + t2 * p3,
            t_1 * p2 + t * p3,
            p3,
        ]);
        (c0, c1)
    }

    /// Arc over parameter interval `[a, b]`, interval may extend outside of `[0, 1]`
    pub fn cut(&self, a: Scalar, b: Scalar) -> Self {
        // C[a, b](t) = [1 t t^2 t^3] C (CI T C) P, where T is a matrix of
        // substitution t -> a + (b - a) * t in the power basis
        let Self([p0, p1, p2, p3]) = *self;
        let ba = b - a;
        #[rustfmt::skip]
        let t = M4x4([
            1.0, a  , a * a       , a * a * a        ,
            0.0, ba , 2.0 * a * ba, 3.0 * a * a * ba ,
            0.0, 0.0, ba * ba     , 3.0 * a * ba * ba,
            0.0, 0.0, 0.0         , ba * ba * ba     ,
        ]);
        #[rustfmt::skip]
        let M4x4([
            m00, m01, m02, m03,
            m10, m11, m12, m13,
            m20, m21, m22, m23,
            m30, m31, m32, m33,
        ]) = CI * t * C;
        let c0 = m00 * p0 + m01 * p1 + m02 * p2 + m03 * p3;
        let c1 = m10 * p0 + m11 * p1 + m12 * p2 + m13 * p3;
        let c2 = m20 * p0 + m21 * p1 + m22 * p2 + m23 * p3;
        let c3 = m30 * p0 + m31 * p1 + m32 * p2 + m33 * p3;
        Self([c0, c1, c2, c3])
    }

    /// Squared deviation of the arc over `[0, t]` from its chord
    fn variation(&self, t: Scalar) -> Scalar {
        // same sampling as `Curve::variation_between` for degree 3
        const SAMPLES: usize = 8;
        let p0 = self.0[0];
        let p1 = if t >= 1.0 { self.0[3] } else { self.at(t) };
        (1..=SAMPLES)
            .map(|index| {
                let u = t * index as Scalar / (SAMPLES + 1) as Scalar;
                chord_distance_sq(self.at(u), p0, p1)
            })
            .fold(0.0, Scalar::max)
    }

    /// Direction of the curve at its start, `None` if all control points coincide
    fn start_direction(&self) -> Option<Point> {
        let Self([p0, p1, p2, _]) = *self;
        if p1.dist(p0) > EPSILON_SQRT {
            (p1 - p0).normalize()
        } else {
            (p2 - p0).normalize()
        }
    }
}

/// Part of the cubic arc processed by a single approximation method
#[derive(Debug, Clone, Copy, PartialEq)]
enum Piece {
    /// Sequence of parabolic approximations
    Parabolic(Scalar, Scalar),
    /// Neighbourhood of an inflection point approximated by a single line
    Inflection(Scalar, Scalar),
}

/// Parameters of inflection points, single value is returned for a cusp
///
/// Inflections are roots of `cross(B'(t), B''(t)) = 0` which for the power basis
/// `B(t) = a t^3 + b t^2 + c t + d` is `3 (a x b) t^2 + 3 (a x c) t + (b x c) = 0`.
/// Control points are moved to the origin and scaled to unit extent first, so cusp
/// detection does not depend on the position, size or orientation of the arc.
fn cubic_inflections(arc: &CubicArc) -> (ArrayIter<[Option<Scalar>; 2]>, Option<Scalar>) {
    let CubicArc([p0, p1, p2, p3]) = *arc;
    let extent = [p1, p2, p3]
        .iter()
        .map(|p| p.dist(p0))
        .fold(0.0, Scalar::max);
    if extent < EPSILON {
        return (ArrayIter::new(), None);
    }
    let [q1, q2, q3] = [p1, p2, p3].map(|p| (p - p0) / extent);
    let a = 3.0 * q1 - 3.0 * q2 + q3;
    let b = -6.0 * q1 + 3.0 * q2;
    let c = 3.0 * q1;
    let (qa, qb, qc) = (3.0 * a.cross(b), 3.0 * a.cross(c), b.cross(c));
    let disc = qb * qb - 4.0 * qa * qc;
    let scale = (qb * qb).max((4.0 * qa * qc).abs());
    if qa.abs() > EPSILON && disc.abs() <= CUSP_TOLERANCE * scale {
        let tc = -qb / (2.0 * qa);
        let mut roots = ArrayIter::new();
        roots.push(tc);
        return (roots, Some(tc));
    }
    (quadratic_solve(qa, qb, qc), None)
}

/// Parameter interval around inflection point `t` which is flat enough to be replaced by a line
fn inflection_range(arc: &CubicArc, t: Scalar, tolerance: Scalar) -> Option<(Scalar, Scalar)> {
    let sub = arc.cut(t, 1.0);
    let dir = sub.start_direction()?;
    let s3 = (sub.0[3] - sub.0[0]).cross(dir).abs();
    let width = if s3 < EPSILON {
        Scalar::INFINITY
    } else {
        (tolerance / s3).cbrt() * (1.0 - t).abs()
    };
    let (lo, hi) = (t - width, t + width);
    if hi < 0.0 || lo > 1.0 {
        None
    } else {
        Some((lo.max(0.0), hi.min(1.0)))
    }
}

/// Flatten cubic arc with parabolic approximation
///
/// Based on "Fast, precise flattening of cubic Bezier path and offset curves"
/// by T. F. Hain, A. L. Ahmad, D. D. Langan. Each step is additionally halved
/// until arc variation fits into `max_deviation`.
pub(crate) fn flatten_cubic(
    arc: CubicArc,
    max_deviation: Scalar,
    include_last: bool,
    out: &mut Vec<Point>,
) {
    let tolerance = max_deviation.sqrt();
    let limit = max_deviation * VARIATION_MARGIN;

    let CubicArc([p0, mut p1, mut p2, p3]) = arc;
    if p1.dist(p0) < EPSILON_SQRT {
        p1 = p0.lerp(p2, NUDGE);
    }
    if p2.dist(p3) < EPSILON_SQRT {
        p2 = p3.lerp(p1, NUDGE);
    }
    let arc = CubicArc([p0, p1, p2, p3]);

    let (roots, cusp) = cubic_inflections(&arc);
    let mut ranges: ArrayIter<[Option<(Scalar, Scalar)>; 2]> = roots
        .filter_map(|t| inflection_range(&arc, t, tolerance))
        .collect();

    let mut pieces = ArrayIter::<[Option<Piece>; 5]>::new();
    match (ranges.next(), ranges.next()) {
        (None, _) => pieces.push(Piece::Parabolic(0.0, 1.0)),
        (Some((lo0, hi0)), Some((lo1, hi1))) if hi0 < lo1 && cusp.is_none() => {
            // disjoint inflection neighbourhoods
            pieces.push(Piece::Parabolic(0.0, lo0));
            pieces.push(Piece::Inflection(lo0, hi0));
            pieces.push(Piece::Parabolic(hi0, lo1));
            pieces.push(Piece::Inflection(lo1, hi1));
            pieces.push(Piece::Parabolic(hi1, 1.0));
        }
        (Some((lo0, hi0)), other) => {
            // single, overlapping or cusp neighbourhood
            let (lo, hi) = match other {
                Some((lo1, hi1)) => (lo0.min(lo1), hi0.max(hi1)),
                None => (lo0, hi0),
            };
            pieces.push(Piece::Parabolic(0.0, lo));
            match cusp {
                Some(tc) if lo < tc && tc < hi => {
                    pieces.push(Piece::Inflection(lo, tc));
                    pieces.push(Piece::Inflection(tc, hi));
                }
                _ => pieces.push(Piece::Inflection(lo, hi)),
            }
            pieces.push(Piece::Parabolic(hi, 1.0));
        }
    }

    for piece in pieces {
        match piece {
            Piece::Parabolic(a, b) if a < b => {
                flatten_parabolic(arc.cut(a, b), tolerance, limit, MAX_RECURSION_DEPTH, out);
            }
            Piece::Inflection(a, b) if a < b => flatten_line(arc.cut(a, b), limit, out, 0),
            _ => {}
        }
    }

    if include_last {
        out.push(p3);
    }
}

/// Parabolic approximation of an arc without inflection points, emits all points
/// except the last one
///
/// A step is halved at most `max_halvings` times, if it is still too coarse the rest
/// of the arc is bisected and `false` is returned.
fn flatten_parabolic(
    arc: CubicArc,
    tolerance: Scalar,
    limit: Scalar,
    max_halvings: usize,
    out: &mut Vec<Point>,
) -> bool {
    let mut cur = arc;
    loop {
        let mut t: Scalar = match cur.start_direction() {
            Some(dir) => {
                let s2 = (cur.0[2] - cur.0[0]).cross(dir).abs();
                if s2 < EPSILON {
                    1.0
                } else {
                    (2.0 * (tolerance / (3.0 * s2)).sqrt()).min(1.0)
                }
            }
            None => 1.0,
        };
        let mut halvings = 0;
        while cur.variation(t) > limit {
            if halvings >= max_halvings {
                tracing::debug!(?t, "parabolic step reached minimal size, bisecting the rest");
                flatten_line(cur, limit, out, 0);
                return false;
            }
            t *= 0.5;
            halvings += 1;
        }
        out.push(cur.0[0]);
        if t >= 1.0 {
            return true;
        }
        cur = cur.split_at(t).1;
    }
}

/// Bisect arc until every part is close to its chord, used for neighbourhoods of
/// inflection points. Emits all points except the last one.
fn flatten_line(arc: CubicArc, limit: Scalar, out: &mut Vec<Point>, depth: usize) {
    if arc.variation(1.0) <= limit {
        out.push(arc.0[0]);
        return;
    }
    if depth >= MAX_RECURSION_DEPTH {
        tracing::debug!("cubic flatten reached maximum recursion depth");
        out.push(arc.0[0]);
        return;
    }
    let (left, right) = arc.split_at(0.5);
    flatten_line(left, limit, out, depth + 1);
    flatten_line(right, limit, out, depth + 1);
}
