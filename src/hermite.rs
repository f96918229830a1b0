//! Piecewise cubic Hermite curve
use crate::{
    BezierCurve, Curve, Domain, Error, Point, Ray, Scalar, Transform,
    curve::flatten_check,
    intersect::intersect_ray_segments,
};
use std::fmt;

/// Key of a hermite curve
///
/// Tangents are derivatives with respect to the local parameter of the adjacent
/// segment: `in_tangent` for the segment ending at this key and `out_tangent` for
/// the segment starting at it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HermiteKey {
    pub parameter: Scalar,
    pub value: Point,
    pub in_tangent: Point,
    pub out_tangent: Point,
}

impl HermiteKey {
    pub fn new(parameter: Scalar, value: Point, in_tangent: Point, out_tangent: Point) -> Self {
        Self {
            parameter,
            value,
            in_tangent,
            out_tangent,
        }
    }
}

/// Sequence of cubic segments interpolating keys with strictly increasing parameters
#[derive(Clone, PartialEq, Default)]
pub struct HermiteCurve {
    keys: Vec<HermiteKey>,
}

impl fmt::Debug for HermiteCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys.iter()).finish()
    }
}

fn check_order(keys: &[HermiteKey]) -> Result<(), Error> {
    if keys.is_empty() {
        return Err(Error::invalid_parameter("hermite curve requires at least one key"));
    }
    match keys
        .windows(2)
        .position(|pair| !(pair[0].parameter < pair[1].parameter))
    {
        Some(index) => Err(Error::invalid_parameter(format!(
            "key parameters must strictly increase: {} >= {}",
            keys[index].parameter,
            keys[index + 1].parameter
        ))),
        None => Ok(()),
    }
}

impl HermiteCurve {
    pub fn new(keys: Vec<HermiteKey>) -> Result<Self, Error> {
        check_order(&keys)?;
        Ok(Self { keys })
    }

    /// Interpolate points at equally spaced parameters with Catmull-Rom tangents
    pub fn from_points(points: &[Point], domain: Domain) -> Result<Self, Error> {
        if points.len() < 2 {
            return Err(Error::invalid_parameter(format!(
                "hermite curve requires at least 2 points, given {}",
                points.len()
            )));
        }
        if domain.is_degenerate() {
            return Err(Error::invalid_parameter(format!(
                "degenerate domain {:?}",
                domain
            )));
        }
        let last = (points.len() - 1) as Scalar;
        let keys = points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let parameter = if index + 1 == points.len() {
                    domain.end()
                } else {
                    domain.global(index as Scalar / last)
                };
                HermiteKey::new(parameter, *point, Point::ZERO, Point::ZERO)
            })
            .collect();
        let mut curve = Self { keys };
        curve.calc_catmull_rom_tangents();
        Ok(curve)
    }

    pub fn keys(&self) -> &[HermiteKey] {
        &self.keys
    }

    pub fn key(&self, index: usize) -> Result<HermiteKey, Error> {
        self.keys.get(index).copied().ok_or_else(|| self.index_error(index))
    }

    /// Replace key, its parameter must stay between parameters of the neighbours
    pub fn set_key(&mut self, index: usize, key: HermiteKey) -> Result<(), Error> {
        if index >= self.keys.len() {
            return Err(self.index_error(index));
        }
        self.check_parameter(index, key.parameter)?;
        self.keys[index] = key;
        Ok(())
    }

    /// Insert key at parameter `u` without changing the shape of the curve
    ///
    /// Returns index of the key, existing key is reused if `u` matches its parameter.
    pub fn insert_key(&mut self, u: Scalar) -> Result<usize, Error> {
        if self.keys.len() < 2 {
            return Err(Error::invalid_operation(
                "key insertion requires at least 2 keys",
            ));
        }
        let domain = self.domain();
        if !domain.contains(u) {
            return Err(Error::out_of_range(format!(
                "parameter {} is outside of {:?}",
                u, domain
            )));
        }
        if let Some(index) = self.keys.iter().position(|key| key.parameter == u) {
            return Ok(index);
        }
        let index = self.segment_index(u);
        let key = self.split_key(index, u)?;
        self.keys.insert(index + 1, key);
        Ok(index + 1)
    }

    /// Remove key at `index`, tangents of the neighbours are rescaled to the merged span
    pub fn remove_key(&mut self, index: usize) -> Result<HermiteKey, Error> {
        if index >= self.keys.len() {
            return Err(self.index_error(index));
        }
        if self.keys.len() < 2 {
            return Err(Error::invalid_operation("can not remove the last key"));
        }
        if index > 0 && index + 1 < self.keys.len() {
            let prev = self.keys[index - 1].parameter;
            let this = self.keys[index].parameter;
            let next = self.keys[index + 1].parameter;
            let span = next - prev;
            self.keys[index - 1].out_tangent = (span / (this - prev)) * self.keys[index - 1].out_tangent;
            self.keys[index + 1].in_tangent = (span / (next - this)) * self.keys[index + 1].in_tangent;
        }
        Ok(self.keys.remove(index))
    }

    /// Move key to parameter `u`, it must stay between parameters of the neighbours
    pub fn set_key_parameter(&mut self, index: usize, u: Scalar) -> Result<(), Error> {
        if index >= self.keys.len() {
            return Err(self.index_error(index));
        }
        self.check_parameter(index, u)?;
        let old = self.keys[index].parameter;
        if index > 0 {
            let prev = self.keys[index - 1].parameter;
            let ratio = (u - prev) / (old - prev);
            self.keys[index - 1].out_tangent = ratio * self.keys[index - 1].out_tangent;
            self.keys[index].in_tangent = ratio * self.keys[index].in_tangent;
        }
        if index + 1 < self.keys.len() {
            let next = self.keys[index + 1].parameter;
            let ratio = (next - u) / (next - old);
            self.keys[index].out_tangent = ratio * self.keys[index].out_tangent;
            self.keys[index + 1].in_tangent = ratio * self.keys[index + 1].in_tangent;
        }
        self.keys[index].parameter = u;
        Ok(())
    }

    /// Replace all tangents with Catmull-Rom tangents
    ///
    /// Interior tangents are central differences, end tangents are derivatives of
    /// the parabola through the three closest keys.
    pub fn calc_catmull_rom_tangents(&mut self) {
        let count = self.keys.len();
        if count < 2 {
            return;
        }
        let derivatives: Vec<Point> = (0..count)
            .map(|index| self.catmull_rom_derivative(index))
            .collect();
        for (index, derivative) in derivatives.into_iter().enumerate() {
            let this = self.keys[index].parameter;
            let span_in = if index > 0 {
                this - self.keys[index - 1].parameter
            } else {
                self.keys[1].parameter - this
            };
            let span_out = if index + 1 < count {
                self.keys[index + 1].parameter - this
            } else {
                span_in
            };
            let key = &mut self.keys[index];
            key.in_tangent = span_in * derivative;
            key.out_tangent = span_out * derivative;
        }
    }

    /// Derivative with respect to the curve parameter used by Catmull-Rom tangents
    fn catmull_rom_derivative(&self, index: usize) -> Point {
        let keys = &self.keys;
        let count = keys.len();
        let at = |i: usize| (keys[i].parameter, keys[i].value);
        if count == 2 {
            let ((t0, p0), (t1, p1)) = (at(0), at(1));
            return (p1 - p0) / (t1 - t0);
        }
        if index > 0 && index + 1 < count {
            let ((t0, p0), (t1, p1)) = (at(index - 1), at(index + 1));
            return (p1 - p0) / (t1 - t0);
        }
        if index == 0 {
            let ((t0, p0), (t1, p1), (t2, p2)) = (at(0), at(1), at(2));
            let (h0, h1) = (t1 - t0, t2 - t1);
            -((2.0 * h0 + h1) / (h0 * (h0 + h1))) * p0 + ((h0 + h1) / (h0 * h1)) * p1
                - (h0 / (h1 * (h0 + h1))) * p2
        } else {
            let ((t0, p0), (t1, p1), (t2, p2)) = (at(count - 3), at(count - 2), at(count - 1));
            let (h0, h1) = (t1 - t0, t2 - t1);
            (h1 / (h0 * (h0 + h1))) * p0 - ((h0 + h1) / (h0 * h1)) * p1
                + ((2.0 * h1 + h0) / (h1 * (h0 + h1))) * p2
        }
    }

    /// Exact bezier form of the segment between keys `index` and `index + 1`
    pub fn segment(&self, index: usize) -> Result<BezierCurve, Error> {
        match (self.keys.get(index), self.keys.get(index + 1)) {
            (Some(k0), Some(k1)) => Ok(BezierCurve::from_hermite(
                k0.value,
                k0.out_tangent,
                k1.value,
                k1.in_tangent,
                Domain::new(k0.parameter, k1.parameter),
            )),
            _ => Err(Error::out_of_range(format!(
                "segment index {} >= {}",
                index,
                self.keys.len().saturating_sub(1)
            ))),
        }
    }

    /// All segments in bezier form
    pub fn segments(&self) -> Vec<BezierCurve> {
        (0..self.keys.len().saturating_sub(1))
            .filter_map(|index| self.segment(index).ok())
            .collect()
    }

    /// Index of the segment containing parameter `u`, requires at least 2 keys
    fn segment_index(&self, u: Scalar) -> usize {
        let index = self.keys.partition_point(|key| key.parameter <= u);
        index.saturating_sub(1).min(self.keys.len() - 2)
    }

    /// Key at parameter `u` strictly inside of the segment `index`
    ///
    /// Tangents of the segment ends are rescaled to the new spans.
    fn split_key(&mut self, index: usize, u: Scalar) -> Result<HermiteKey, Error> {
        let segment = self.segment(index)?;
        let value = segment.evaluate(u);
        let derivative = segment.derivative(1, u);
        let start = self.keys[index].parameter;
        let end = self.keys[index + 1].parameter;
        let (left, right) = (u - start, end - u);
        let span = end - start;
        self.keys[index].out_tangent = (left / span) * self.keys[index].out_tangent;
        self.keys[index + 1].in_tangent = (right / span) * self.keys[index + 1].in_tangent;
        Ok(HermiteKey::new(u, value, left * derivative, right * derivative))
    }

    fn check_parameter(&self, index: usize, u: Scalar) -> Result<(), Error> {
        let after_prev = index == 0 || self.keys[index - 1].parameter < u;
        let before_next = index + 1 >= self.keys.len() || u < self.keys[index + 1].parameter;
        if after_prev && before_next {
            Ok(())
        } else {
            Err(Error::invalid_parameter(format!(
                "parameter {} breaks order of keys at {}",
                u, index
            )))
        }
    }

    fn index_error(&self, index: usize) -> Error {
        Error::out_of_range(format!("key index {} >= {}", index, self.keys.len()))
    }
}

impl Curve for HermiteCurve {
    fn domain(&self) -> Domain {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => Domain::new(first.parameter, last.parameter),
            _ => Domain::default(),
        }
    }

    /// Parameters are remapped affinely, local tangents do not depend on them
    fn set_domain(&mut self, domain: Domain) -> Result<(), Error> {
        if self.keys.len() < 2 {
            return Err(Error::invalid_operation(
                "set domain requires at least 2 keys",
            ));
        }
        if domain.is_degenerate() {
            return Err(Error::invalid_parameter(format!(
                "degenerate domain {:?}",
                domain
            )));
        }
        let old = self.domain();
        let last = self.keys.len() - 1;
        for (index, key) in self.keys.iter_mut().enumerate() {
            key.parameter = if index == last {
                domain.end()
            } else {
                domain.global(old.local(key.parameter))
            };
        }
        Ok(())
    }

    fn degree(&self) -> usize {
        if self.keys.is_empty() { 0 } else { 3 }
    }

    fn points_count(&self) -> usize {
        self.keys.len()
    }

    fn point(&self, index: usize) -> Result<Point, Error> {
        Ok(self.key(index)?.value)
    }

    fn set_point(&mut self, index: usize, point: Point) -> Result<(), Error> {
        let count = self.keys.len();
        let key = self.keys.get_mut(index).ok_or_else(|| {
            Error::out_of_range(format!("key index {} >= {}", index, count))
        })?;
        key.value = point;
        Ok(())
    }

    fn map_points(&mut self, mut f: impl FnMut(Point) -> Point) {
        for key in self.keys.iter_mut() {
            key.value = f(key.value);
        }
    }

    fn evaluate(&self, u: Scalar) -> Point {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Point::ZERO,
        };
        if u <= first.parameter {
            return first.value;
        }
        if u >= last.parameter {
            return last.value;
        }
        self.segment(self.segment_index(u))
            .map_or(first.value, |segment| segment.evaluate(u))
    }

    fn derivative(&self, order: usize, u: Scalar) -> Point {
        if order == 0 {
            return self.evaluate(u);
        }
        if self.keys.len() < 2 {
            return Point::ZERO;
        }
        let u = self.domain().clamp(u);
        self.segment(self.segment_index(u))
            .map_or(Point::ZERO, |segment| segment.derivative(order, u))
    }

    /// Boundary key is synthesized at `u` unless it matches an existing key
    fn cut(&self, u: Scalar) -> Result<(Self, Self), Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("cut of an empty curve"));
        }
        let domain = self.domain();
        if !domain.contains(u) {
            return Err(Error::out_of_range(format!(
                "cut parameter {} is outside of {:?}",
                u, domain
            )));
        }
        if u == domain.start() {
            return Ok((Self::default(), self.clone()));
        }
        if u == domain.end() {
            return Ok((self.clone(), Self::default()));
        }
        let mut curve = self.clone();
        let index = curve.insert_key(u)?;
        let right = Self {
            keys: curve.keys.split_off(index),
        };
        curve.keys.push(right.keys[0]);
        Ok((curve, right))
    }

    fn clear(&mut self) {
        self.keys.clear();
    }

    fn intersect_ray(&self, ray: Ray, precision: Scalar, max_iter: usize) -> Vec<(Scalar, Scalar)> {
        intersect_ray_segments(&self.segments(), ray, precision, max_iter)
    }

    fn flatten_into(
        &self,
        max_deviation: Scalar,
        include_last: bool,
        out: &mut Vec<Point>,
    ) -> Result<(), Error> {
        flatten_check(self, max_deviation)?;
        let segments = self.segments();
        if segments.is_empty() {
            if include_last {
                out.extend(self.keys.first().map(|key| key.value));
            }
            return Ok(());
        }
        let count = segments.len();
        for (index, segment) in segments.iter().enumerate() {
            segment.flatten_into(max_deviation, include_last && index + 1 == count, out)?;
        }
        Ok(())
    }

    fn length(&self, u0: Scalar, u1: Scalar, max_error: Scalar) -> Scalar {
        let (lo, hi, sign) = if u0 <= u1 {
            (u0, u1, 1.0)
        } else {
            (u1, u0, -1.0)
        };
        let length: Scalar = self
            .segments()
            .iter()
            .filter_map(|segment| {
                let overlap = segment.domain().intersect(Domain::new(lo, hi))?;
                Some(segment.length(overlap.start(), overlap.end(), max_error))
            })
            .sum();
        sign * length
    }

    /// Values are transformed as points and tangents as vectors
    fn xform(&mut self, tr: Transform) {
        for key in self.keys.iter_mut() {
            key.value = tr.apply(key.value);
            key.in_tangent = tr.apply_vector(key.in_tangent);
            key.out_tangent = tr.apply_vector(key.out_tangent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_MAX_ITERATIONS, DEFAULT_PRECISION, PI, assert_approx_eq};

    fn sample() -> HermiteCurve {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(3.0, 3.0),
            Point::new(4.0, 0.0),
            Point::new(6.0, 1.0),
        ];
        HermiteCurve::from_points(&points, Domain::new(0.0, 4.0)).unwrap()
    }

    fn max_distance(c0: &HermiteCurve, c1: &HermiteCurve) -> Scalar {
        let domain = c0.domain();
        (0..=64)
            .map(|index| {
                let u = domain.global(index as Scalar / 64.0);
                c0.evaluate(u).dist(c1.evaluate(u))
            })
            .fold(0.0, Scalar::max)
    }

    #[test]
    fn test_zero_tangents() {
        let p0 = Point::new(0.0, 0.0);
        let p1 = Point::new(2.0, 4.0);
        let p2 = Point::new(4.0, 0.0);
        let curve = HermiteCurve::new(vec![
            HermiteKey::new(0.0, p0, Point::ZERO, Point::ZERO),
            HermiteKey::new(1.0, p1, Point::ZERO, Point::ZERO),
            HermiteKey::new(2.0, p2, Point::ZERO, Point::ZERO),
        ])
        .unwrap();
        // h1(0.5) = h2(0.5) = 0.5, tangent terms vanish
        let t: Scalar = 0.5;
        let h1 = 2.0 * t * t * t - 3.0 * t * t + 1.0;
        let h2 = -2.0 * t * t * t + 3.0 * t * t;
        assert_eq!(curve.evaluate(0.5), h1 * p0 + h2 * p1);
        assert_eq!(curve.evaluate(0.5), Point::new(1.0, 2.0));
        assert_eq!(curve.evaluate(1.0), p1);
        assert_eq!(curve.evaluate(2.0), p2);
        assert_eq!(curve.derivative(1, 0.0), Point::ZERO);
        assert_eq!(curve.domain(), Domain::new(0.0, 2.0));
        assert_eq!(curve.degree(), 3);
    }

    #[test]
    fn test_construction() {
        let key = |u: Scalar| HermiteKey::new(u, Point::new(u, 0.0), Point::ZERO, Point::ZERO);
        assert!(matches!(
            HermiteCurve::new(vec![key(0.0), key(0.0)]),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            HermiteCurve::new(vec![key(1.0), key(0.0)]),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(HermiteCurve::new(Vec::new()).is_err());
        let single = HermiteCurve::new(vec![key(1.0)]).unwrap();
        assert_eq!(single.evaluate(5.0), Point::new(1.0, 0.0));
        assert!(single.segment(0).is_err());
        assert!(HermiteCurve::from_points(&[Point::ZERO], Domain::unit()).is_err());

        let mut curve = sample();
        assert_eq!(curve.points_count(), 5);
        assert_eq!(curve.key(4).unwrap().parameter, 4.0);
        assert!(matches!(curve.key(5), Err(Error::OutOfRange { .. })));
        let mut key = curve.key(2).unwrap();
        key.parameter = 3.5;
        assert!(curve.set_key(2, key).is_err());
        key.parameter = 2.5;
        curve.set_key(2, key).unwrap();
        assert_eq!(curve.key(2).unwrap().parameter, 2.5);
        curve.set_point(0, Point::new(-1.0, 0.0)).unwrap();
        assert_eq!(curve.start_point(), Point::new(-1.0, 0.0));
    }

    #[test]
    fn test_catmull_rom() {
        // parabola is reproduced exactly
        let points: Vec<_> = (0..5)
            .map(|i| {
                let x = i as Scalar;
                Point::new(x, x * x)
            })
            .collect();
        let curve = HermiteCurve::from_points(&points, Domain::new(0.0, 4.0)).unwrap();
        for index in 0..=40 {
            let u = index as Scalar / 10.0;
            assert!(curve.evaluate(u).dist(Point::new(u, u * u)) < 1e-12);
            assert!(curve.derivative(1, u).dist(Point::new(1.0, 2.0 * u)) < 1e-9);
        }
        // first derivative is continuous at the keys
        let curve = sample();
        for u in [1.0, 2.0, 3.0] {
            let d0 = curve.segment(u as usize - 1).unwrap().derivative(1, u);
            let d1 = curve.segment(u as usize).unwrap().derivative(1, u);
            assert!(d0.dist(d1) < 1e-12);
        }
    }

    #[test]
    fn test_cut() {
        let curve = sample();
        for u in [0.5, 2.0, 3.75] {
            let (left, right) = curve.cut(u).unwrap();
            assert_eq!(left.domain(), Domain::new(0.0, u));
            assert_eq!(right.domain(), Domain::new(u, 4.0));
            assert_eq!(left.evaluate(u), right.evaluate(u));
            assert!(left.evaluate(u).dist(curve.evaluate(u)) < 1e-12);
            for index in 0..=10 {
                let v = Domain::new(0.0, u).global(index as Scalar / 10.0);
                assert!(left.evaluate(v).dist(curve.evaluate(v)) < 1e-9);
                let v = Domain::new(u, 4.0).global(index as Scalar / 10.0);
                assert!(right.evaluate(v).dist(curve.evaluate(v)) < 1e-9);
            }
        }
        let (left, right) = curve.cut(0.0).unwrap();
        assert!(left.is_empty());
        assert_eq!(right, curve);
        assert!(matches!(curve.cut(-0.5), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_insert_remove_key() {
        let curve = sample();
        let mut modified = curve.clone();
        assert_eq!(modified.insert_key(1.25).unwrap(), 2);
        assert_eq!(modified.points_count(), 6);
        assert!(max_distance(&curve, &modified) < 1e-9);
        assert_eq!(modified.insert_key(3.0).unwrap(), 4);
        assert!(matches!(
            modified.insert_key(5.0),
            Err(Error::OutOfRange { .. })
        ));

        let removed = modified.remove_key(2).unwrap();
        assert_eq!(removed.parameter, 1.25);
        assert!(max_distance(&curve, &modified) < 1e-9);
        for (k0, k1) in modified.keys().iter().zip(curve.keys()) {
            assert!(k0.out_tangent.dist(k1.out_tangent) < 1e-12);
            assert!(k0.in_tangent.dist(k1.in_tangent) < 1e-12);
        }
        assert!(matches!(
            modified.remove_key(10),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_set_key_parameter() {
        let curve = sample();
        let mut moved = curve.clone();
        moved.set_key_parameter(2, 2.5).unwrap();
        assert_eq!(moved.key(2).unwrap().parameter, 2.5);
        assert_eq!(moved.evaluate(2.5), curve.evaluate(2.0));
        // global derivative at the moved key stays continuous
        let d0 = moved.segment(1).unwrap().derivative(1, 2.5);
        let d1 = moved.segment(2).unwrap().derivative(1, 2.5);
        assert!(d0.dist(d1) < 1e-12);

        moved.set_key_parameter(2, 2.0).unwrap();
        assert!(max_distance(&curve, &moved) < 1e-12);
        assert!(matches!(
            moved.set_key_parameter(2, 3.0),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_domain_and_xform() {
        let curve = sample();
        let mut scaled = curve.clone();
        scaled.set_domain(Domain::new(10.0, 12.0)).unwrap();
        assert_eq!(scaled.domain(), Domain::new(10.0, 12.0));
        assert!(scaled.evaluate(11.0).dist(curve.evaluate(2.0)) < 1e-12);
        assert!(scaled.evaluate(10.3).dist(curve.evaluate(0.6)) < 1e-12);

        let mut rotated = curve.clone();
        rotated.rotate(PI / 2.0, Point::ZERO);
        for u in [0.5, 1.5, 3.2] {
            let p = curve.evaluate(u);
            let d = curve.derivative(1, u);
            assert!(rotated.evaluate(u).dist(Point::new(-p.y(), p.x())) < 1e-9);
            assert!(rotated.derivative(1, u).dist(Point::new(-d.y(), d.x())) < 1e-9);
        }
    }

    #[test]
    fn test_flatten_and_intersect() {
        let curve = sample();
        let flat: Vec<_> = curve.flatten(1e-3, true).unwrap().collect();
        assert_eq!(flat[0], curve.start_point());
        assert_eq!(*flat.last().unwrap(), curve.end_point());
        for key in curve.keys() {
            assert!(flat.contains(&key.value));
        }

        let ray = Ray::new((-1.0, 1.0), (1.0, 0.0)).unwrap();
        let hits = curve.intersect_ray(ray, DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS);
        assert!(!hits.is_empty());
        assert!(hits.windows(2).all(|pair| pair[0].0 <= pair[1].0));
        for (u, s) in hits {
            assert!(curve.evaluate(u).dist(ray.at(s)) < 1e-6);
        }
    }

    #[test]
    fn test_flatten_deviation() {
        // equally spaced x makes catmull-rom x(u) = u, so parameters are recovered from x
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(2.0, -1.0),
            Point::new(3.0, 3.0),
            Point::new(4.0, 0.0),
        ];
        let curve = HermiteCurve::from_points(&points, Domain::new(0.0, 4.0)).unwrap();
        for u in [0.25, 1.5, 3.75] {
            assert_approx_eq!(curve.evaluate(u).x(), u, 1e-12);
        }
        for max_deviation in [1e-2, 1e-4] {
            let flat: Vec<_> = curve.flatten(max_deviation, true).unwrap().collect();
            assert!(flat.len() > points.len());
            for point in points.iter() {
                assert!(flat.contains(point));
            }
            for pair in flat.windows(2) {
                let (u0, u1) = (pair[0].x(), pair[1].x());
                assert!(u0 < u1);
                let deviation = curve.variation_between(u0, u1, pair[0], pair[1]);
                assert!(
                    deviation <= max_deviation * (1.0 + 1e-9),
                    "deviation {} on [{}, {}]",
                    deviation,
                    u0,
                    u1
                );
            }
        }
    }

    #[test]
    fn test_length() {
        let points: Vec<_> = (0..4).map(|i| Point::new(i as Scalar, 0.0)).collect();
        let curve = HermiteCurve::from_points(&points, Domain::new(0.0, 3.0)).unwrap();
        assert_approx_eq!(curve.total_length(1e-10), 3.0, 1e-8);
        assert_approx_eq!(curve.length(0.5, 2.5, 1e-10), 2.0, 1e-8);
        let (u, converged) = curve.global_parameter(1.5, 1e-10, DEFAULT_MAX_ITERATIONS);
        assert!(converged);
        assert_approx_eq!(u, 1.5, 1e-8);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde() -> Result<(), Box<dyn std::error::Error>> {
        let curve = sample();
        let json = serde_json::to_string(curve.keys())?;
        let keys: Vec<HermiteKey> = serde_json::from_str(&json)?;
        assert_eq!(HermiteCurve::new(keys)?, curve);
        Ok(())
    }
}
