//! Operations common to all curve kinds
use crate::{
    BBox, BSplineCurve, BezierCurve, Domain, EPSILON, Error, HermiteCurve, Point, Ray, Scalar,
    Transform, numeric::romberg,
};
use std::fmt;

/// Default squared chordal deviation used to flatten curves
pub const DEFAULT_FLATNESS: Scalar = 1e-4;
/// Default precision of the root refinement
pub const DEFAULT_PRECISION: Scalar = 1e-9;
/// Default maximum number of iterations of numerical methods
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
/// Maximum depth of recursive subdivision in flatten and ray intersection
pub const MAX_RECURSION_DEPTH: usize = 50;

/// Set of operations common to all parametric curves.
///
/// Curve is defined over its domain, a closed interval of parameter values. Points
/// are evaluated with the parameter clamped to the domain.
pub trait Curve: Sized + Clone {
    /// Interval of the parameter values over which curve is defined
    fn domain(&self) -> Domain;

    /// Reparametrize curve to a new domain without changing its shape
    fn set_domain(&mut self, domain: Domain) -> Result<(), Error>;

    /// Polynomial degree of the curve (of each piece for piecewise curves)
    fn degree(&self) -> usize;

    /// Number of control points (keys for Hermite curves)
    fn points_count(&self) -> usize;

    /// Control point at specified index
    fn point(&self, index: usize) -> Result<Point, Error>;

    /// Replace control point at specified index
    fn set_point(&mut self, index: usize, point: Point) -> Result<(), Error>;

    /// Apply function to every control point
    fn map_points(&mut self, f: impl FnMut(Point) -> Point);

    /// Evaluate curve at parameter `u`, parameter is clamped to the domain
    fn evaluate(&self, u: Scalar) -> Point;

    /// Derivative of order `order` with respect to the parameter at `u`
    ///
    /// Orders greater than the degree yield zero vector.
    fn derivative(&self, order: usize, u: Scalar) -> Point;

    /// Split curve at parameter `u` into `(left, right)` independent curves
    ///
    /// Cutting at the domain start yields an empty left curve, cutting at the
    /// domain end yields an empty right curve.
    fn cut(&self, u: Scalar) -> Result<(Self, Self), Error>;

    /// Remove all control data, curve becomes empty with degenerate domain
    fn clear(&mut self);

    /// Find intersections with the ray
    ///
    /// Returns `(curve_parameter, ray_parameter)` pairs ordered by curve parameter.
    fn intersect_ray(&self, ray: Ray, precision: Scalar, max_iter: usize) -> Vec<(Scalar, Scalar)>;

    /// Check if curve does not have any control data
    fn is_empty(&self) -> bool {
        self.points_count() == 0
    }

    /// Point at which curve starts
    fn start_point(&self) -> Point {
        self.evaluate(self.domain().start())
    }

    /// Point at which curve ends
    fn end_point(&self) -> Point {
        self.evaluate(self.domain().end())
    }

    /// Curve starts and ends at the same point
    fn is_closed(&self) -> bool {
        !self.is_empty() && self.start_point().is_close_to(self.end_point())
    }

    /// Unit tangent vector, zero if curve is stationary at `u`
    fn tangent(&self, u: Scalar) -> Point {
        self.derivative(1, u).normalize().unwrap_or(Point::ZERO)
    }

    /// Unit normal vector (tangent rotated counter clockwise)
    fn normal(&self, u: Scalar) -> Point {
        let Point([x, y]) = self.tangent(u);
        Point([-y, x])
    }

    /// Length of the first derivative
    fn speed(&self, u: Scalar) -> Scalar {
        self.derivative(1, u).length()
    }

    /// Signed curvature, positive when curve turns counter clockwise
    fn curvature(&self, u: Scalar) -> Scalar {
        let d1 = self.derivative(1, u);
        let d2 = self.derivative(2, u);
        let speed = d1.length();
        if speed < EPSILON {
            return 0.0;
        }
        d1.cross(d2) / (speed * speed * speed)
    }

    /// Upper estimate of squared deviation of the curve from the chord
    /// connecting its end points.
    fn variation(&self) -> Scalar {
        let domain = self.domain();
        self.variation_between(
            domain.start(),
            domain.end(),
            self.start_point(),
            self.end_point(),
        )
    }

    /// Squared deviation of the curve over `[u0, u1]` from the chord `p0 - p1`
    ///
    /// Curve is sampled at `2 * (degree + 1)` interior parameter values.
    fn variation_between(&self, u0: Scalar, u1: Scalar, p0: Point, p1: Point) -> Scalar {
        let count = 2 * (self.degree() + 1);
        let step = (u1 - u0) / (count + 1) as Scalar;
        (1..=count)
            .map(|index| chord_distance_sq(self.evaluate(u0 + index as Scalar * step), p0, p1))
            .fold(0.0, Scalar::max)
    }

    /// Append polyline approximating the curve to `out`
    ///
    /// Squared chordal deviation between consecutive points does not exceed `max_deviation`.
    fn flatten_into(
        &self,
        max_deviation: Scalar,
        include_last: bool,
        out: &mut Vec<Point>,
    ) -> Result<(), Error> {
        flatten_check(self, max_deviation)?;
        flatten_generic(self, max_deviation, include_last, out);
        Ok(())
    }

    /// Convert curve to an iterator over points of the approximating polyline
    fn flatten(&self, max_deviation: Scalar, include_last: bool) -> Result<CurveFlattenIter, Error> {
        let mut points = Vec::new();
        self.flatten_into(max_deviation, include_last, &mut points)?;
        Ok(CurveFlattenIter::new(points))
    }

    /// Arc length of the curve between parameters `u0` and `u1`
    fn length(&self, u0: Scalar, u1: Scalar, max_error: Scalar) -> Scalar {
        if self.is_empty() {
            return 0.0;
        }
        let domain = self.domain();
        let (u0, u1) = (domain.clamp(u0), domain.clamp(u1));
        romberg(|u| self.speed(u), u0, u1, max_error)
    }

    /// Arc length of the whole curve
    fn total_length(&self, max_error: Scalar) -> Scalar {
        let domain = self.domain();
        self.length(domain.start(), domain.end(), max_error)
    }

    /// Find parameter at which arc length measured from the curve start equals `length`
    ///
    /// Uses Newton iterations guarded by bisection. Lengths outside of the curve
    /// are clamped to the domain ends. Second value is `false` if the iterations
    /// did not converge, first value is the best estimate in that case.
    fn global_parameter(
        &self,
        length: Scalar,
        max_error: Scalar,
        max_iter: usize,
    ) -> (Scalar, bool) {
        let domain = self.domain();
        if self.is_empty() {
            return (domain.start(), false);
        }
        if length <= 0.0 {
            return (domain.start(), true);
        }
        let total = self.total_length(max_error);
        if length >= total {
            return (domain.end(), true);
        }

        let (mut lo, mut hi) = (domain.start(), domain.end());
        let mut u = domain.global(length / total);
        for _ in 0..max_iter {
            let error = self.length(domain.start(), u, max_error) - length;
            if error.abs() <= max_error {
                return (u, true);
            }
            if error > 0.0 {
                hi = u;
            } else {
                lo = u;
            }
            let speed = self.speed(u);
            let next = u - error / speed;
            u = if speed > EPSILON && lo < next && next < hi {
                next
            } else {
                0.5 * (lo + hi)
            };
        }
        tracing::debug!(?length, ?u, ?max_iter, "inverse arc length did not converge");
        (u, false)
    }

    /// Apply affine transformation to the curve
    fn xform(&mut self, tr: Transform) {
        self.map_points(|point| tr.apply(point))
    }

    /// Move curve by `[tx, ty]`
    fn translate(&mut self, tx: Scalar, ty: Scalar) {
        self.xform(Transform::default().translate(tx, ty))
    }

    /// Rotate curve by angle `a` around point `center`
    fn rotate(&mut self, a: Scalar, center: Point) {
        self.xform(Transform::default().rotate_around(a, center))
    }

    /// Scale curve by `[sx, sy]` relative to point `center`
    fn scale(&mut self, sx: Scalar, sy: Scalar, center: Point) {
        self.xform(Transform::default().scale_around(sx, sy, center))
    }

    /// Bounding box of control points, `None` for empty curve
    fn control_bbox(&self) -> Option<BBox> {
        BBox::from_points((0..self.points_count()).filter_map(|index| self.point(index).ok()))
    }
}

/// Squared distance from point `q` to the segment `p0 - p1`
pub(crate) fn chord_distance_sq(q: Point, p0: Point, p1: Point) -> Scalar {
    let chord = p1 - p0;
    let offset = q - p0;
    let chord_sq = chord.length_sq();
    if chord_sq < EPSILON {
        return offset.length_sq();
    }
    let t = offset.dot(chord) / chord_sq;
    if t < 0.0 {
        offset.length_sq()
    } else if t > 1.0 {
        (q - p1).length_sq()
    } else {
        let cross = chord.cross(offset);
        cross * cross / chord_sq
    }
}

/// Validate flatten arguments
pub(crate) fn flatten_check(curve: &impl Curve, max_deviation: Scalar) -> Result<(), Error> {
    if !(max_deviation > 0.0) {
        return Err(Error::invalid_parameter(format!(
            "flatten deviation must be positive: {}",
            max_deviation
        )));
    }
    if curve.is_empty() {
        return Err(Error::invalid_operation("flatten of an empty curve"));
    }
    Ok(())
}

/// Recursive midpoint bisection until variation of every piece is small enough
pub(crate) fn flatten_generic(
    curve: &impl Curve,
    max_deviation: Scalar,
    include_last: bool,
    out: &mut Vec<Point>,
) {
    fn flatten_rec(
        curve: &impl Curve,
        max_deviation: Scalar,
        (u0, p0): (Scalar, Point),
        (u1, p1): (Scalar, Point),
        out: &mut Vec<Point>,
        depth: usize,
    ) {
        if u1 - u0 < 2.0 * EPSILON
            || curve.variation_between(u0, u1, p0, p1) <= max_deviation
        {
            out.push(p1);
            return;
        }
        if depth >= MAX_RECURSION_DEPTH {
            tracing::debug!(?u0, ?u1, "flatten reached maximum recursion depth");
            out.push(p1);
            return;
        }
        let um = 0.5 * (u0 + u1);
        let pm = curve.evaluate(um);
        flatten_rec(curve, max_deviation, (u0, p0), (um, pm), out, depth + 1);
        flatten_rec(curve, max_deviation, (um, pm), (u1, p1), out, depth + 1);
    }

    let domain = curve.domain();
    let start = (domain.start(), curve.start_point());
    let end = (domain.end(), curve.end_point());
    out.push(start.1);
    flatten_rec(curve, max_deviation, start, end, out, 0);
    if !include_last {
        out.pop();
    }
}

/// Iterator over points of a flattened curve
///
/// Points are computed eagerly, iterator can only be consumed once.
pub struct CurveFlattenIter {
    points: std::vec::IntoIter<Point>,
}

impl CurveFlattenIter {
    pub(crate) fn new(points: Vec<Point>) -> Self {
        Self {
            points: points.into_iter(),
        }
    }
}

impl fmt::Debug for CurveFlattenIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.points.as_slice()).finish()
    }
}

impl Iterator for CurveFlattenIter {
    type Item = Point;

    fn next(&mut self) -> Option<Self::Item> {
        self.points.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.points.size_hint()
    }
}

impl ExactSizeIterator for CurveFlattenIter {}

/// Curve of any supported kind
#[derive(Clone, PartialEq)]
pub enum AnyCurve {
    Bezier(BezierCurve),
    BSpline(BSplineCurve),
    Hermite(HermiteCurve),
}

impl fmt::Debug for AnyCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyCurve::Bezier(curve) => curve.fmt(f),
            AnyCurve::BSpline(curve) => curve.fmt(f),
            AnyCurve::Hermite(curve) => curve.fmt(f),
        }
    }
}

impl AnyCurve {
    pub fn to_bezier(&self) -> Option<&BezierCurve> {
        match self {
            AnyCurve::Bezier(curve) => Some(curve),
            _ => None,
        }
    }

    pub fn to_bspline(&self) -> Option<&BSplineCurve> {
        match self {
            AnyCurve::BSpline(curve) => Some(curve),
            _ => None,
        }
    }

    pub fn to_hermite(&self) -> Option<&HermiteCurve> {
        match self {
            AnyCurve::Hermite(curve) => Some(curve),
            _ => None,
        }
    }
}

impl Curve for AnyCurve {
    fn domain(&self) -> Domain {
        match self {
            AnyCurve::Bezier(curve) => curve.domain(),
            AnyCurve::BSpline(curve) => curve.domain(),
            AnyCurve::Hermite(curve) => curve.domain(),
        }
    }

    fn set_domain(&mut self, domain: Domain) -> Result<(), Error> {
        match self {
            AnyCurve::Bezier(curve) => curve.set_domain(domain),
            AnyCurve::BSpline(curve) => curve.set_domain(domain),
            AnyCurve::Hermite(curve) => curve.set_domain(domain),
        }
    }

    fn degree(&self) -> usize {
        match self {
            AnyCurve::Bezier(curve) => curve.degree(),
            AnyCurve::BSpline(curve) => curve.degree(),
            AnyCurve::Hermite(curve) => curve.degree(),
        }
    }

    fn points_count(&self) -> usize {
        match self {
            AnyCurve::Bezier(curve) => curve.points_count(),
            AnyCurve::BSpline(curve) => curve.points_count(),
            AnyCurve::Hermite(curve) => curve.points_count(),
        }
    }

    fn point(&self, index: usize) -> Result<Point, Error> {
        match self {
            AnyCurve::Bezier(curve) => curve.point(index),
            AnyCurve::BSpline(curve) => curve.point(index),
            AnyCurve::Hermite(curve) => curve.point(index),
        }
    }

    fn set_point(&mut self, index: usize, point: Point) -> Result<(), Error> {
        match self {
            AnyCurve::Bezier(curve) => curve.set_point(index, point),
            AnyCurve::BSpline(curve) => curve.set_point(index, point),
            AnyCurve::Hermite(curve) => curve.set_point(index, point),
        }
    }

    fn map_points(&mut self, f: impl FnMut(Point) -> Point) {
        match self {
            AnyCurve::Bezier(curve) => curve.map_points(f),
            AnyCurve::BSpline(curve) => curve.map_points(f),
            AnyCurve::Hermite(curve) => curve.map_points(f),
        }
    }

    fn evaluate(&self, u: Scalar) -> Point {
        match self {
            AnyCurve::Bezier(curve) => curve.evaluate(u),
            AnyCurve::BSpline(curve) => curve.evaluate(u),
            AnyCurve::Hermite(curve) => curve.evaluate(u),
        }
    }

    fn derivative(&self, order: usize, u: Scalar) -> Point {
        match self {
            AnyCurve::Bezier(curve) => curve.derivative(order, u),
            AnyCurve::BSpline(curve) => curve.derivative(order, u),
            AnyCurve::Hermite(curve) => curve.derivative(order, u),
        }
    }

    fn cut(&self, u: Scalar) -> Result<(Self, Self), Error> {
        Ok(match self {
            AnyCurve::Bezier(curve) => {
                let (left, right) = curve.cut(u)?;
                (left.into(), right.into())
            }
            AnyCurve::BSpline(curve) => {
                let (left, right) = curve.cut(u)?;
                (left.into(), right.into())
            }
            AnyCurve::Hermite(curve) => {
                let (left, right) = curve.cut(u)?;
                (left.into(), right.into())
            }
        })
    }

    fn clear(&mut self) {
        match self {
            AnyCurve::Bezier(curve) => curve.clear(),
            AnyCurve::BSpline(curve) => curve.clear(),
            AnyCurve::Hermite(curve) => curve.clear(),
        }
    }

    fn intersect_ray(&self, ray: Ray, precision: Scalar, max_iter: usize) -> Vec<(Scalar, Scalar)> {
        match self {
            AnyCurve::Bezier(curve) => curve.intersect_ray(ray, precision, max_iter),
            AnyCurve::BSpline(curve) => curve.intersect_ray(ray, precision, max_iter),
            AnyCurve::Hermite(curve) => curve.intersect_ray(ray, precision, max_iter),
        }
    }

    fn flatten_into(
        &self,
        max_deviation: Scalar,
        include_last: bool,
        out: &mut Vec<Point>,
    ) -> Result<(), Error> {
        match self {
            AnyCurve::Bezier(curve) => curve.flatten_into(max_deviation, include_last, out),
            AnyCurve::BSpline(curve) => curve.flatten_into(max_deviation, include_last, out),
            AnyCurve::Hermite(curve) => curve.flatten_into(max_deviation, include_last, out),
        }
    }

    fn length(&self, u0: Scalar, u1: Scalar, max_error: Scalar) -> Scalar {
        match self {
            AnyCurve::Bezier(curve) => curve.length(u0, u1, max_error),
            AnyCurve::BSpline(curve) => curve.length(u0, u1, max_error),
            AnyCurve::Hermite(curve) => curve.length(u0, u1, max_error),
        }
    }

    fn xform(&mut self, tr: Transform) {
        match self {
            AnyCurve::Bezier(curve) => curve.xform(tr),
            AnyCurve::BSpline(curve) => curve.xform(tr),
            AnyCurve::Hermite(curve) => curve.xform(tr),
        }
    }
}

impl From<BezierCurve> for AnyCurve {
    fn from(curve: BezierCurve) -> Self {
        Self::Bezier(curve)
    }
}

impl From<BSplineCurve> for AnyCurve {
    fn from(curve: BSplineCurve) -> Self {
        Self::BSpline(curve)
    }
}

impl From<HermiteCurve> for AnyCurve {
    fn from(curve: HermiteCurve) -> Self {
        Self::Hermite(curve)
    }
}
