//! Bezier curve of arbitrary degree
use crate::{
    Curve, Domain, Error, Point, Ray, Scalar,
    curve::{flatten_check, flatten_generic},
    flatten::{CubicArc, QuadArc, flatten_cubic, flatten_quad},
    intersect::intersect_ray_segments,
    utils::binomial,
};
use std::fmt;

/// Evaluate bezier curve with control points `points` at local parameter `t`
///
/// Horner like accumulation of Bernstein polynomials, binomial coefficients are
/// updated incrementally.
pub(crate) fn bernstein(points: &[Point], t: Scalar) -> Point {
    let n = match points.len() {
        0 => return Point::ZERO,
        1 => return points[0],
        len => len - 1,
    };
    let s = 1.0 - t;
    let mut fact = 1.0;
    let mut nci = 1.0;
    let mut tmp = s * points[0];
    for (i, point) in points.iter().enumerate().take(n).skip(1) {
        fact *= t;
        nci *= (n - i + 1) as Scalar / i as Scalar;
        tmp = s * (tmp + (fact * nci) * *point);
    }
    tmp + (fact * t) * points[n]
}

/// Split control polygon at local parameter `t` with de Casteljau algorithm
pub(crate) fn de_casteljau(points: &[Point], t: Scalar) -> (Vec<Point>, Vec<Point>) {
    let mut left = Vec::with_capacity(points.len());
    let mut right = Vec::with_capacity(points.len());
    let mut work = points.to_vec();
    for level in (0..points.len()).rev() {
        left.push(work[0]);
        right.push(work[level]);
        for i in 0..level {
            work[i] = work[i].lerp(work[i + 1], t);
        }
    }
    right.reverse();
    (left, right)
}

/// Forward differences `scale * (p[i + 1] - p[i])`
fn differences(points: &[Point], scale: Scalar) -> Vec<Point> {
    points
        .windows(2)
        .map(|pair| scale * (pair[1] - pair[0]))
        .collect()
}

/// Bezier curve defined by `degree + 1` control points over its domain
#[derive(Clone, PartialEq, Default)]
pub struct BezierCurve {
    points: Vec<Point>,
    domain: Domain,
    // control points of the first and second derivatives
    diff1: Vec<Point>,
    diff2: Vec<Point>,
}

impl fmt::Debug for BezierCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bezier {:?}", self.domain)?;
        for point in self.points.iter() {
            write!(f, " {:?}", point)?;
        }
        Ok(())
    }
}

impl BezierCurve {
    /// Create curve over `[0, 1]` domain
    pub fn new(points: Vec<Point>) -> Result<Self, Error> {
        Self::with_domain(points, Domain::unit())
    }

    /// Create curve over specified domain
    pub fn with_domain(points: Vec<Point>, domain: Domain) -> Result<Self, Error> {
        let mut curve = Self {
            domain,
            ..Self::default()
        };
        curve.set_points(points)?;
        Ok(curve)
    }

    /// Create cubic curve from end points and tangents
    ///
    /// Tangents are derivatives with respect to the local parameter in `[0, 1]`.
    pub fn from_hermite(p0: Point, t0: Point, p1: Point, t1: Point, domain: Domain) -> Self {
        let mut curve = Self {
            points: vec![p0, p0 + t0 / 3.0, p1 - t1 / 3.0, p1],
            domain,
            ..Self::default()
        };
        curve.update();
        curve
    }

    /// Replace all control points, domain is kept unless it is degenerate
    pub fn set_points(&mut self, points: Vec<Point>) -> Result<(), Error> {
        if points.len() < 2 {
            return Err(Error::invalid_parameter(format!(
                "bezier curve requires at least 2 control points, given {}",
                points.len()
            )));
        }
        self.points = points;
        if self.domain.is_degenerate() {
            self.domain = Domain::unit();
        }
        self.update();
        Ok(())
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Tangents at the ends of a cubic curve with respect to the local parameter
    pub fn hermite_tangents(&self) -> Result<(Point, Point), Error> {
        match self.points.as_slice() {
            [p0, p1, p2, p3] => Ok((3.0 * (*p1 - *p0), 3.0 * (*p3 - *p2))),
            _ => Err(Error::invalid_operation(format!(
                "hermite tangents require cubic curve, degree is {}",
                self.degree()
            ))),
        }
    }

    /// Elevate degree by `times` without changing the shape of the curve
    pub fn elevate_degree(&mut self, times: usize) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("elevate degree of an empty curve"));
        }
        if times == 0 {
            return Ok(());
        }
        let n = self.degree();
        let m = n + times;
        let points = (0..=m)
            .map(|i| {
                let lo = i.saturating_sub(times);
                let hi = i.min(n);
                let scale = binomial(m, i);
                (lo..=hi).fold(Point::ZERO, |acc, j| {
                    acc + (binomial(n, j) * binomial(times, i - j) / scale) * self.points[j]
                })
            })
            .collect();
        self.points = points;
        self.update();
        Ok(())
    }

    /// Reduce degree by `times`
    ///
    /// Reduction is approximate, each step blends extrapolations obtained by inverting
    /// degree elevation from the start and from the end of the control polygon. End
    /// points are always preserved and curves obtained by elevation are restored exactly.
    pub fn reduce_degree(&mut self, times: usize) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("reduce degree of an empty curve"));
        }
        if self.degree() < times + 1 {
            return Err(Error::invalid_parameter(format!(
                "can not reduce degree {} by {}",
                self.degree(),
                times
            )));
        }
        for _ in 0..times {
            self.points = reduce_once(&self.points);
        }
        self.update();
        Ok(())
    }

    /// Recompute derivative control points
    fn update(&mut self) {
        let n = self.degree() as Scalar;
        let length = self.domain.length();
        if self.points.len() < 2 || length <= 0.0 {
            self.diff1.clear();
            self.diff2.clear();
            return;
        }
        self.diff1 = differences(&self.points, n / length);
        self.diff2 = differences(&self.diff1, (n - 1.0) / length);
    }
}

/// Single step of degree reduction
fn reduce_once(points: &[Point]) -> Vec<Point> {
    let n = points.len() - 1;
    let nf = n as Scalar;
    // extrapolation from the start
    let mut right = vec![Point::ZERO; n];
    right[0] = points[0];
    for i in 1..n {
        let fi = i as Scalar;
        right[i] = (nf * points[i] - fi * right[i - 1]) / (nf - fi);
    }
    // extrapolation from the end
    let mut left = vec![Point::ZERO; n];
    left[n - 1] = points[n];
    for i in (1..n).rev() {
        let fi = i as Scalar;
        left[i - 1] = (nf * points[i] - (nf - fi) * left[i]) / fi;
    }
    if n == 1 {
        return right;
    }
    (0..n)
        .map(|i| {
            let lambda = i as Scalar / (n - 1) as Scalar;
            right[i].lerp(left[i], lambda)
        })
        .collect()
}

impl Curve for BezierCurve {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn set_domain(&mut self, domain: Domain) -> Result<(), Error> {
        if domain.is_degenerate() && !self.is_empty() {
            return Err(Error::invalid_parameter(format!(
                "degenerate domain {:?}",
                domain
            )));
        }
        self.domain = domain;
        self.update();
        Ok(())
    }

    fn degree(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    fn points_count(&self) -> usize {
        self.points.len()
    }

    fn point(&self, index: usize) -> Result<Point, Error> {
        self.points.get(index).copied().ok_or_else(|| {
            Error::out_of_range(format!(
                "point index {} >= {}",
                index,
                self.points.len()
            ))
        })
    }

    fn set_point(&mut self, index: usize, point: Point) -> Result<(), Error> {
        let count = self.points.len();
        let slot = self.points.get_mut(index).ok_or_else(|| {
            Error::out_of_range(format!("point index {} >= {}", index, count))
        })?;
        *slot = point;
        self.update();
        Ok(())
    }

    fn map_points(&mut self, mut f: impl FnMut(Point) -> Point) {
        for point in self.points.iter_mut() {
            *point = f(*point);
        }
        self.update();
    }

    fn evaluate(&self, u: Scalar) -> Point {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Point::ZERO,
        };
        if u <= self.domain.start() {
            first
        } else if u >= self.domain.end() {
            last
        } else {
            bernstein(&self.points, self.domain.local(u))
        }
    }

    fn derivative(&self, order: usize, u: Scalar) -> Point {
        if order == 0 {
            return self.evaluate(u);
        }
        if order > self.degree() || self.is_empty() {
            return Point::ZERO;
        }
        let t = self.domain.local(self.domain.clamp(u));
        match order {
            1 => bernstein(&self.diff1, t),
            2 => bernstein(&self.diff2, t),
            _ => {
                let length = self.domain.length();
                let mut diff = self.diff2.clone();
                for k in 2..order {
                    let scale = (self.degree() - k) as Scalar / length;
                    diff = differences(&diff, scale);
                }
                bernstein(&diff, t)
            }
        }
    }

    fn cut(&self, u: Scalar) -> Result<(Self, Self), Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("cut of an empty curve"));
        }
        if !self.domain.contains(u) {
            return Err(Error::out_of_range(format!(
                "cut parameter {} is outside of {:?}",
                u, self.domain
            )));
        }
        if u == self.domain.start() {
            return Ok((Self::default(), self.clone()));
        }
        if u == self.domain.end() {
            return Ok((self.clone(), Self::default()));
        }
        let (left, right) = de_casteljau(&self.points, self.domain.local(u));
        Ok((
            Self::with_domain(left, Domain::new(self.domain.start(), u))?,
            Self::with_domain(right, Domain::new(u, self.domain.end()))?,
        ))
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn intersect_ray(&self, ray: Ray, precision: Scalar, max_iter: usize) -> Vec<(Scalar, Scalar)> {
        intersect_ray_segments(std::slice::from_ref(self), ray, precision, max_iter)
    }

    fn flatten_into(
        &self,
        max_deviation: Scalar,
        include_last: bool,
        out: &mut Vec<Point>,
    ) -> Result<(), Error> {
        flatten_check(self, max_deviation)?;
        match *self.points.as_slice() {
            [p0, p1, p2] => flatten_quad(QuadArc([p0, p1, p2]), max_deviation, include_last, out),
            [p0, p1, p2, p3] => flatten_cubic(
                CubicArc([p0, p1, p2, p3]),
                max_deviation,
                include_last,
                out,
            ),
            _ => flatten_generic(self, max_deviation, include_last, out),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_MAX_ITERATIONS, DEFAULT_PRECISION, assert_approx_eq};

    fn bezier(points: &[(Scalar, Scalar)]) -> BezierCurve {
        BezierCurve::new(points.iter().copied().map(Point::from).collect()).unwrap()
    }

    fn assert_close(p0: Point, p1: Point, tolerance: Scalar) {
        assert!(p0.dist(p1) < tolerance, "{:?} != {:?}", p0, p1);
    }

    #[test]
    fn test_evaluate() {
        let curve = bezier(&[(0.0, 0.0), (1.0, 3.0), (3.0, 3.0), (4.0, 0.0), (5.0, 2.0)]);
        for index in 0..=20 {
            let t = index as Scalar / 20.0;
            let (left, _) = de_casteljau(curve.points(), t);
            assert_close(curve.evaluate(t), *left.last().unwrap(), 1e-12);
        }
        assert_eq!(curve.evaluate(0.0), curve.points()[0]);
        assert_eq!(curve.evaluate(1.0), curve.points()[4]);
        assert_eq!(curve.evaluate(-1.0), curve.points()[0]);
        assert_eq!(curve.evaluate(2.0), curve.points()[4]);
        assert_eq!(BezierCurve::default().evaluate(0.5), Point::ZERO);
    }

    #[test]
    fn test_construction() {
        assert!(matches!(
            BezierCurve::new(vec![Point::new(1.0, 1.0)]),
            Err(Error::InvalidParameter { .. })
        ));
        let mut curve = BezierCurve::with_domain(
            vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            Domain::new(2.0, 4.0),
        )
        .unwrap();
        curve
            .set_points(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(2.0, 0.0),
            ])
            .unwrap();
        assert_eq!(curve.domain(), Domain::new(2.0, 4.0));
        assert_eq!(curve.degree(), 2);
        assert!(matches!(curve.point(3), Err(Error::OutOfRange { .. })));
        assert!(matches!(
            curve.set_point(3, Point::ZERO),
            Err(Error::OutOfRange { .. })
        ));
        curve.set_point(1, Point::new(1.0, 2.0)).unwrap();
        assert_eq!(curve.point(1).unwrap(), Point::new(1.0, 2.0));
        curve.clear();
        assert!(curve.is_empty());
        assert_eq!(curve.domain(), Domain::default());
    }

    #[test]
    fn test_derivative() {
        let curve = BezierCurve::with_domain(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 3.0),
                Point::new(3.0, 3.0),
                Point::new(4.0, 0.0),
            ],
            Domain::new(1.0, 3.0),
        )
        .unwrap();
        let h = 1e-6;
        for index in 1..10 {
            let u = 1.0 + 2.0 * index as Scalar / 10.0;
            let d1 = (curve.evaluate(u + h) - curve.evaluate(u - h)) / (2.0 * h);
            assert_close(curve.derivative(1, u), d1, 1e-6);
            let d2 = (curve.derivative(1, u + h) - curve.derivative(1, u - h)) / (2.0 * h);
            assert_close(curve.derivative(2, u), d2, 1e-6);
            let d3 = (curve.derivative(2, u + h) - curve.derivative(2, u - h)) / (2.0 * h);
            assert_close(curve.derivative(3, u), d3, 1e-5);
        }
        assert_eq!(curve.derivative(4, 2.0), Point::ZERO);
        assert_eq!(curve.derivative(0, 2.0), curve.evaluate(2.0));

        // derivative control points follow domain changes
        let mut scaled = curve.clone();
        scaled.set_domain(Domain::new(0.0, 1.0)).unwrap();
        assert_close(scaled.derivative(1, 0.5), 2.0 * curve.derivative(1, 2.0), 1e-12);
        assert!(scaled.set_domain(Domain::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_cut() {
        let curve = BezierCurve::with_domain(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 3.0),
                Point::new(3.0, 3.0),
                Point::new(4.0, 0.0),
            ],
            Domain::new(0.0, 2.0),
        )
        .unwrap();
        let (left, right) = curve.cut(0.5).unwrap();
        assert_eq!(left.domain(), Domain::new(0.0, 0.5));
        assert_eq!(right.domain(), Domain::new(0.5, 2.0));
        assert_close(left.evaluate(0.5), right.evaluate(0.5), 1e-12);
        assert_close(left.evaluate(0.5), curve.evaluate(0.5), 1e-12);
        for index in 0..=10 {
            let u = 0.5 + 1.5 * index as Scalar / 10.0;
            assert_close(right.evaluate(u), curve.evaluate(u), 1e-12);
        }

        let (left, right) = curve.cut(0.0).unwrap();
        assert!(left.is_empty());
        assert_eq!(right, curve);
        let (left, right) = curve.cut(2.0).unwrap();
        assert_eq!(left, curve);
        assert!(right.is_empty());

        assert!(matches!(curve.cut(2.5), Err(Error::OutOfRange { .. })));
        assert!(matches!(
            BezierCurve::default().cut(0.0),
            Err(Error::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_elevate_reduce() {
        let curve = bezier(&[(0.0, 0.0), (1.0, 3.0), (3.0, 3.0), (4.0, 0.0)]);
        let mut elevated = curve.clone();
        elevated.elevate_degree(3).unwrap();
        assert_eq!(elevated.degree(), 6);
        for index in 0..=50 {
            let t = index as Scalar / 50.0;
            assert_close(elevated.evaluate(t), curve.evaluate(t), 1e-12);
        }

        let mut reduced = elevated.clone();
        reduced.reduce_degree(3).unwrap();
        assert_eq!(reduced.degree(), 3);
        for index in 0..=50 {
            let t = index as Scalar / 50.0;
            assert_close(reduced.evaluate(t), curve.evaluate(t), 1e-6);
        }

        // general reduction keeps the end points
        let mut quartic = bezier(&[(0.0, 0.0), (1.0, 3.0), (2.0, -3.0), (3.0, 3.0), (4.0, 0.0)]);
        quartic.reduce_degree(1).unwrap();
        assert_eq!(quartic.degree(), 3);
        assert_eq!(quartic.start_point(), Point::new(0.0, 0.0));
        assert_eq!(quartic.end_point(), Point::new(4.0, 0.0));

        let mut line = bezier(&[(0.0, 0.0), (1.0, 1.0)]);
        assert!(matches!(
            line.reduce_degree(1),
            Err(Error::InvalidParameter { .. })
        ));
        line.elevate_degree(0).unwrap();
        assert_eq!(line.degree(), 1);
    }

    #[test]
    fn test_hermite() {
        let p0 = Point::new(0.0, 0.0);
        let p1 = Point::new(4.0, 0.0);
        let t0 = Point::new(3.0, 9.0);
        let t1 = Point::new(3.0, -9.0);
        let curve = BezierCurve::from_hermite(p0, t0, p1, t1, Domain::unit());
        assert_eq!(curve.points()[1], Point::new(1.0, 3.0));
        assert_eq!(curve.points()[2], Point::new(3.0, 3.0));
        let (s0, s1) = curve.hermite_tangents().unwrap();
        assert_close(s0, t0, 1e-12);
        assert_close(s1, t1, 1e-12);
        assert_close(curve.derivative(1, 0.0), t0, 1e-12);

        let quad = bezier(&[(0.0, 0.0), (1.0, 2.0), (2.0, 0.0)]);
        assert!(matches!(
            quad.hermite_tangents(),
            Err(Error::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_flatten_quad() {
        let curve = bezier(&[(0.0, 0.0), (1.0, 2.0), (2.0, 0.0)]);
        let max_deviation = 0.01;
        let points: Vec<_> = curve.flatten(max_deviation, true).unwrap().collect();
        assert_eq!(points[0], Point::new(0.0, 0.0));
        assert_eq!(*points.last().unwrap(), Point::new(2.0, 0.0));
        // x(t) = 2 t
        for pair in points.windows(2) {
            let (u0, u1) = (pair[0].x() / 2.0, pair[1].x() / 2.0);
            assert!(u0 < u1);
            assert!(curve.variation_between(u0, u1, pair[0], pair[1]) <= max_deviation);
        }
        let again: Vec<_> = curve.flatten(max_deviation, true).unwrap().collect();
        assert_eq!(points, again);
    }

    #[test]
    fn test_flatten_cubic() {
        let curve = bezier(&[(0.0, 0.0), (1.0, 3.0), (2.0, -3.0), (3.0, 0.0)]);
        for max_deviation in [1e-2, 1e-3] {
            let points: Vec<_> = curve.flatten(max_deviation, false).unwrap().collect();
            assert_eq!(points[0], curve.start_point());
            assert!(!points.contains(&curve.end_point()));
            let mut points = points;
            points.push(curve.end_point());
            // x(t) = 3 t
            for pair in points.windows(2) {
                let (u0, u1) = (pair[0].x() / 3.0, pair[1].x() / 3.0);
                assert!(curve.variation_between(u0, u1, pair[0], pair[1]) <= max_deviation);
            }
        }
    }

    #[test]
    fn test_intersect_ray() {
        let curve = bezier(&[(0.0, 0.0), (1.0, 3.0), (3.0, 3.0), (4.0, 0.0)]);

        // ray along x axis touches the curve only at its end points
        let ray = Ray::new((0.0, 0.0), (1.0, 0.0)).unwrap();
        let hits = curve.intersect_ray(ray, DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], (0.0, 0.0));
        assert_eq!(hits[1], (1.0, 4.0));
        let interior: Vec<_> = hits
            .iter()
            .filter(|(u, _)| *u > 0.0 && *u < 1.0)
            .collect();
        assert!(interior.is_empty());

        // vertical ray through the apex
        let ray = Ray::new((2.0, 0.0), (0.0, 1.0)).unwrap();
        let hits = curve.intersect_ray(ray, DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS);
        assert_eq!(hits.len(), 1);
        assert_approx_eq!(hits[0].0, 0.5, 1e-8);
        assert_approx_eq!(hits[0].1, 2.25, 1e-8);

        // pointing away from the curve
        let ray = Ray::new((2.0, 0.0), (0.0, -1.0)).unwrap();
        assert!(curve.intersect_ray(ray, DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS).is_empty());

        // horizontal line crosses the arch twice
        let ray = Ray::new((-1.0, 1.0), (1.0, 0.0)).unwrap();
        let hits = curve.intersect_ray(ray, DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].0 < hits[1].0);
        for (u, s) in hits {
            assert_close(curve.evaluate(u), ray.at(s), 1e-7);
        }
    }

    #[test]
    fn test_intersect_ray_wiggle() {
        // s-curve crosses x axis three times
        let curve = bezier(&[(0.0, -1.0), (1.0, 3.0), (2.0, -3.0), (3.0, 1.0)]);
        let ray = Ray::new((-1.0, 0.0), (1.0, 0.0)).unwrap();
        let hits = curve.intersect_ray(ray, DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS);
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|pair| pair[0].0 <= pair[1].0));
        assert_approx_eq!(hits[1].0, 0.5, 1e-8);
        for (u, s) in hits {
            assert_close(curve.evaluate(u), ray.at(s), 1e-7);
        }
    }
}
