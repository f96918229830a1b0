//! B-spline curve
use crate::{
    BezierCurve, Curve, Domain, EPSILON_SQRT, Error, KnotPolicy, Point, Ray, Scalar,
    curve::flatten_check,
    intersect::intersect_ray_segments,
    knots::{basis_derivatives, basis_functions, find_span, is_uniform, make_knots, multiplicity},
    numeric::romberg,
};
use std::fmt;

/// B-spline curve defined by control points, degree and non-decreasing knot vector
///
/// Knot vector has `points.len() + degree + 1` values, curve domain is
/// `[knots[degree], knots[points.len()]]`.
#[derive(Clone, PartialEq, Default)]
pub struct BSplineCurve {
    points: Vec<Point>,
    knots: Vec<Scalar>,
    degree: usize,
    clamped: bool,
    uniform: bool,
}

impl fmt::Debug for BSplineCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BSpline")
            .field("degree", &self.degree)
            .field("domain", &self.domain())
            .field("knots", &self.knots)
            .field("points", &self.points)
            .finish()
    }
}

/// Both end knots are repeated `degree + 1` times
fn knots_clamped(knots: &[Scalar], degree: usize) -> bool {
    let count = knots.len() - degree - 1;
    knots[..=degree].iter().all(|knot| *knot == knots[degree])
        && knots[count..].iter().all(|knot| *knot == knots[count])
}

impl BSplineCurve {
    /// Create spline with knots constructed according to `policy` over `domain`
    pub fn new(
        points: Vec<Point>,
        degree: usize,
        policy: KnotPolicy,
        domain: Domain,
    ) -> Result<Self, Error> {
        let knots = make_knots(policy, &points, degree, domain)?;
        let uniform = policy != KnotPolicy::NonUniform;
        Ok(Self::from_parts(points, knots, degree, uniform))
    }

    /// Create spline from explicit knot vector
    pub fn with_knots(points: Vec<Point>, degree: usize, knots: Vec<Scalar>) -> Result<Self, Error> {
        let count = points.len();
        if degree == 0 || count < degree + 1 {
            return Err(Error::invalid_parameter(format!(
                "spline of degree {} with {} control points",
                degree, count
            )));
        }
        if knots.len() != count + degree + 1 {
            return Err(Error::invalid_parameter(format!(
                "expected {} knots, given {}",
                count + degree + 1,
                knots.len()
            )));
        }
        if knots.windows(2).any(|pair| !(pair[0] <= pair[1])) {
            return Err(Error::invalid_parameter("knots must be non-decreasing"));
        }
        let domain = Domain::new(knots[degree], knots[count]);
        if domain.is_degenerate() {
            return Err(Error::invalid_parameter(format!(
                "degenerate spline domain {:?}",
                domain
            )));
        }
        let interior = knots
            .iter()
            .filter(|knot| domain.start() < **knot && **knot < domain.end());
        for knot in interior {
            let mult = multiplicity(&knots, *knot);
            if mult > degree {
                return Err(Error::invalid_parameter(format!(
                    "interior knot {} multiplicity {} exceeds degree {}",
                    knot, mult, degree
                )));
            }
        }
        let clamped = knots_clamped(&knots, degree);
        let uniform = is_uniform(&knots, degree, clamped);
        Ok(Self::from_parts(points, knots, degree, uniform))
    }

    /// Assemble spline from already validated parts
    pub(crate) fn from_parts(
        points: Vec<Point>,
        knots: Vec<Scalar>,
        degree: usize,
        uniform: bool,
    ) -> Self {
        let clamped = knots_clamped(&knots, degree);
        Self {
            points,
            knots,
            degree,
            clamped,
            uniform,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn knots(&self) -> &[Scalar] {
        &self.knots
    }

    /// First and last control points are interpolated
    pub fn is_clamped(&self) -> bool {
        self.clamped
    }

    /// Knot values are equally spaced
    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    /// Index of the knot span containing parameter `u`
    pub fn find_span(&self, u: Scalar) -> Result<usize, Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("span lookup on an empty spline"));
        }
        Ok(find_span(self.degree, &self.knots, self.points.len(), u))
    }

    /// Knot span containing `u` and multiplicity of `u` in the knot vector
    pub fn span_multiplicity(&self, u: Scalar) -> Result<(usize, usize), Error> {
        Ok((self.find_span(u)?, multiplicity(&self.knots, u)))
    }

    /// Insert knot `u` up to `times` times without changing the shape of the curve
    ///
    /// Multiplicity of the knot never exceeds the degree, insertion beyond it is
    /// silently skipped. Returns the number of inserted knots.
    pub fn insert_knot(&mut self, u: Scalar, times: usize) -> Result<usize, Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("knot insertion into an empty spline"));
        }
        let domain = self.domain();
        if !domain.contains(u) {
            return Err(Error::out_of_range(format!(
                "knot {} is outside of {:?}",
                u, domain
            )));
        }
        let p = self.degree;
        let s = multiplicity(&self.knots, u);
        if s >= p {
            tracing::debug!(?u, multiplicity = s, "knot insertion refused");
            return Ok(0);
        }
        let r = times.min(p - s);
        if r == 0 {
            return Ok(0);
        }

        let count = self.points.len();
        let k = if s > 0 {
            self.knots.iter().rposition(|knot| *knot == u).unwrap_or(p)
        } else {
            find_span(p, &self.knots, count, u)
        };
        let knots = &self.knots;
        let points = &self.points;

        let mut result = vec![Point::ZERO; count + r];
        result[..=k - p].copy_from_slice(&points[..=k - p]);
        for i in k - s..count {
            result[i + r] = points[i];
        }
        let mut work: Vec<Point> = points[k - p..=k - s].to_vec();
        for j in 1..=r {
            let l = k - p + j;
            for i in 0..=p - j - s {
                let alpha = (u - knots[l + i]) / (knots[i + k + 1] - knots[l + i]);
                work[i] = work[i].lerp(work[i + 1], alpha);
            }
            result[l] = work[0];
            result[k + r - j - s] = work[p - j - s];
        }
        let l = k - p + r;
        for i in l + 1..k - s {
            result[i] = work[i - l];
        }

        let mut knots_new = Vec::with_capacity(knots.len() + r);
        knots_new.extend_from_slice(&knots[..=k]);
        knots_new.extend(std::iter::repeat_n(u, r));
        knots_new.extend_from_slice(&knots[k + 1..]);

        self.points = result;
        self.knots = knots_new;
        if s == 0 {
            self.uniform = false;
        }
        Ok(r)
    }

    /// Remove interior knot `u` up to `times` times
    ///
    /// Knot is only removed while the curve moves by no more than `tolerance`.
    /// Returns the number of removed knots.
    pub fn remove_knot(&mut self, u: Scalar, times: usize, tolerance: Scalar) -> Result<usize, Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("knot removal from an empty spline"));
        }
        let domain = self.domain();
        if !(domain.start() < u && u < domain.end()) {
            return Err(Error::out_of_range(format!(
                "knot {} is not interior to {:?}",
                u, domain
            )));
        }
        let s = multiplicity(&self.knots, u);
        let r = match self.knots.iter().rposition(|knot| *knot == u) {
            Some(r) => r,
            None => {
                return Err(Error::invalid_parameter(format!("{} is not a knot", u)));
            }
        };
        let num = times.min(s);
        let p = self.degree;
        let order = p + 1;
        let count = self.points.len();
        let knots = &self.knots;
        let points = &mut self.points;

        let out = (2 * r - s - p) / 2;
        let mut first = r - p;
        let mut last = r - s;
        let mut temp = vec![Point::ZERO; 2 * p + 1];
        let mut t = 0;
        while t < num {
            let off = first - 1;
            temp[0] = points[off];
            temp[last + 1 - off] = points[last + 1];
            let (mut i, mut j) = (first, last);
            let (mut ii, mut jj) = (1, last - off);
            while j > i + t {
                let alpha_i = (u - knots[i]) / (knots[i + order + t] - knots[i]);
                let alpha_j = (u - knots[j - t]) / (knots[j + order] - knots[j - t]);
                temp[ii] = (points[i] - (1.0 - alpha_i) * temp[ii - 1]) / alpha_i;
                temp[jj] = (points[j] - alpha_j * temp[jj + 1]) / (1.0 - alpha_j);
                i += 1;
                ii += 1;
                j -= 1;
                jj -= 1;
            }
            let removable = if j < i + t {
                temp[ii - 1].dist(temp[jj + 1]) <= tolerance
            } else {
                let alpha_i = (u - knots[i]) / (knots[i + order + t] - knots[i]);
                let q = alpha_i * temp[ii + t + 1] + (1.0 - alpha_i) * temp[ii - 1];
                points[i].dist(q) <= tolerance
            };
            if !removable {
                break;
            }
            let (mut i, mut j) = (first, last);
            while j > i + t {
                points[i] = temp[i - off];
                points[j] = temp[j - off];
                i += 1;
                j -= 1;
            }
            first -= 1;
            last += 1;
            t += 1;
        }
        if t < times {
            tracing::debug!(?u, removed = t, requested = times, "knot removal stopped");
        }
        if t == 0 {
            return Ok(0);
        }

        self.knots.drain(r + 1 - t..=r);
        let (mut i, mut j) = (out, out);
        for k in 1..t {
            if k % 2 == 1 {
                i += 1;
            } else {
                j -= 1;
            }
        }
        for k in i + 1..count {
            points[j] = points[k];
            j += 1;
        }
        points.truncate(count - t);
        Ok(t)
    }

    /// Distinct knot values inside of the domain including its ends
    fn breakpoints(&self) -> Vec<Scalar> {
        let domain = self.domain();
        let mut values: Vec<Scalar> = self
            .knots
            .iter()
            .copied()
            .filter(|knot| domain.contains(*knot))
            .collect();
        values.dedup();
        values
    }

    /// Split spline into bezier curves, one per non-empty knot span
    pub fn to_bezier_segments(&self) -> Result<Vec<BezierCurve>, Error> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let p = self.degree;
        let breakpoints = self.breakpoints();
        let mut spline = self.clone();
        for value in breakpoints.iter() {
            let times = p.saturating_sub(multiplicity(&spline.knots, *value));
            if times > 0 {
                spline.insert_knot(*value, times)?;
            }
        }
        breakpoints
            .windows(2)
            .map(|pair| {
                let k = spline
                    .knots
                    .iter()
                    .rposition(|knot| *knot == pair[0])
                    .unwrap_or(p);
                BezierCurve::with_domain(
                    spline.points[k - p..=k].to_vec(),
                    Domain::new(pair[0], pair[1]),
                )
            })
            .collect()
    }

    /// Join bezier segments of degree `degree` into a spline with multiplicity
    /// `degree` at every joint, then reduce multiplicities to `targets`
    ///
    /// Flag is `false` if some joint could not be reduced to its target without
    /// moving the curve, such joint keeps the remaining extra knots.
    fn stitch(
        segments: &[BezierCurve],
        degree: usize,
        targets: &[usize],
        uniform: bool,
    ) -> Result<(Self, bool), Error> {
        let (first, last) = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::invalid_operation("stitch of an empty segment list")),
        };
        let mut points = Vec::with_capacity(segments.len() * degree + 1);
        let mut knots = Vec::with_capacity(segments.len() * degree + degree + 2);
        knots.extend(std::iter::repeat_n(first.domain().start(), degree + 1));
        for (index, segment) in segments.iter().enumerate() {
            if index == 0 {
                points.extend_from_slice(segment.points());
            } else {
                points.extend_from_slice(&segment.points()[1..]);
                knots.extend(std::iter::repeat_n(segment.domain().start(), degree));
            }
        }
        knots.extend(std::iter::repeat_n(last.domain().end(), degree + 1));
        let mut spline = Self::from_parts(points, knots, degree, uniform);

        let scale = spline
            .control_bbox()
            .map_or(1.0, |bbox| bbox.width().max(bbox.height()).max(1.0));
        let tolerance = EPSILON_SQRT * scale;
        let mut exact = true;
        for (segment, target) in segments[1..].iter().zip(targets) {
            let extra = degree.saturating_sub(*target);
            if extra > 0 {
                let removed = spline.remove_knot(segment.domain().start(), extra, tolerance)?;
                exact &= removed == extra;
            }
        }
        Ok((spline, exact))
    }

    /// Multiplicities of interior breakpoints
    fn interior_multiplicities(&self) -> Vec<usize> {
        let breakpoints = self.breakpoints();
        let end = breakpoints.len().saturating_sub(1);
        breakpoints
            .get(1..end)
            .unwrap_or_default()
            .iter()
            .map(|value| multiplicity(&self.knots, *value))
            .collect()
    }

    /// Elevate degree by `times` without changing the shape of the curve
    ///
    /// Returns `true` when every interior knot ends up with its multiplicity
    /// raised exactly by `times`.
    pub fn elevate_degree(&mut self, times: usize) -> Result<bool, Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("elevate degree of an empty spline"));
        }
        if !self.clamped {
            return Err(Error::missed_feature(
                "degree elevation of an unclamped spline",
            ));
        }
        if times == 0 {
            return Ok(true);
        }
        let _span = tracing::trace_span!("bspline_elevate_degree", degree = self.degree, times)
            .entered();
        let degree = self.degree + times;
        let targets: Vec<_> = self
            .interior_multiplicities()
            .into_iter()
            .map(|mult| mult + times)
            .collect();
        let mut segments = self.to_bezier_segments()?;
        for segment in segments.iter_mut() {
            segment.elevate_degree(times)?;
        }
        let (spline, exact) = Self::stitch(&segments, degree, &targets, self.uniform)?;
        if !exact {
            tracing::debug!(degree, ?targets, "elevated spline keeps extra knots");
        }
        *self = spline;
        Ok(exact)
    }

    /// Reduce degree by `times`, approximation is done per knot span
    ///
    /// Joints are kept as smooth as the reduced segments allow, multiplicity of
    /// an interior knot is lowered by `times` only when it does not move the curve.
    /// Returns `false` if some interior knot kept a higher multiplicity than the
    /// original one lowered by `times`, the curve is still updated in this case.
    pub fn reduce_degree(&mut self, times: usize) -> Result<bool, Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("reduce degree of an empty spline"));
        }
        if !self.clamped {
            return Err(Error::missed_feature(
                "degree reduction of an unclamped spline",
            ));
        }
        if times >= self.degree {
            return Err(Error::out_of_range(format!(
                "can not reduce degree {} by {}",
                self.degree, times
            )));
        }
        if times == 0 {
            return Ok(true);
        }
        let _span = tracing::trace_span!("bspline_reduce_degree", degree = self.degree, times)
            .entered();
        let degree = self.degree - times;
        let targets: Vec<_> = self
            .interior_multiplicities()
            .into_iter()
            .map(|mult| mult.saturating_sub(times).max(1))
            .collect();
        let mut segments = self.to_bezier_segments()?;
        for segment in segments.iter_mut() {
            segment.reduce_degree(times)?;
        }
        let (spline, exact) = Self::stitch(&segments, degree, &targets, self.uniform)?;
        if !exact {
            tracing::debug!(degree, ?targets, "reduced spline keeps extra knots");
        }
        *self = spline;
        Ok(exact)
    }
}

impl Curve for BSplineCurve {
    fn domain(&self) -> Domain {
        if self.points.is_empty() {
            return Domain::default();
        }
        Domain::new(self.knots[self.degree], self.knots[self.points.len()])
    }

    /// Translate knots if length of the domain is unchanged, otherwise rescale them
    fn set_domain(&mut self, domain: Domain) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("set domain of an empty spline"));
        }
        if domain.is_degenerate() {
            return Err(Error::invalid_parameter(format!(
                "degenerate domain {:?}",
                domain
            )));
        }
        let old = self.domain();
        if old.length() == domain.length() {
            let offset = domain.start() - old.start();
            for knot in self.knots.iter_mut() {
                *knot += offset;
            }
        } else {
            for knot in self.knots.iter_mut() {
                *knot = if *knot == old.start() {
                    domain.start()
                } else if *knot == old.end() {
                    domain.end()
                } else {
                    domain.global(old.local(*knot))
                };
            }
        }
        Ok(())
    }

    fn degree(&self) -> usize {
        self.degree
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
        Ok(())
    }

    fn map_points(&mut self, mut f: impl FnMut(Point) -> Point) {
        for point in self.points.iter_mut() {
            *point = f(*point);
        }
    }

    fn evaluate(&self, u: Scalar) -> Point {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Point::ZERO,
        };
        let domain = self.domain();
        if self.clamped && u <= domain.start() {
            return first;
        }
        if self.clamped && u >= domain.end() {
            return last;
        }
        let u = domain.clamp(u);
        let p = self.degree;
        let span = find_span(p, &self.knots, self.points.len(), u);
        let basis = basis_functions(p, &self.knots, span, u);
        basis
            .iter()
            .zip(&self.points[span - p..=span])
            .fold(Point::ZERO, |acc, (b, point)| acc + *b * *point)
    }

    fn derivative(&self, order: usize, u: Scalar) -> Point {
        if order == 0 {
            return self.evaluate(u);
        }
        if order > self.degree || self.is_empty() {
            return Point::ZERO;
        }
        let u = self.domain().clamp(u);
        let p = self.degree;
        let span = find_span(p, &self.knots, self.points.len(), u);
        let ders = basis_derivatives(p, &self.knots, span, u, order);
        ders[order]
            .iter()
            .zip(&self.points[span - p..=span])
            .fold(Point::ZERO, |acc, (b, point)| acc + *b * *point)
    }

    fn cut(&self, u: Scalar) -> Result<(Self, Self), Error> {
        if self.is_empty() {
            return Err(Error::invalid_operation("cut of an empty spline"));
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

        let p = self.degree;
        let existing = multiplicity(&self.knots, u) > 0;
        let mut spline = self.clone();
        spline.insert_knot(u, p)?;
        let k = spline
            .knots
            .iter()
            .rposition(|knot| *knot == u)
            .unwrap_or(p);
        let uniform = self.uniform && existing;

        let mut left_knots = spline.knots[..=k].to_vec();
        left_knots.push(u);
        let left = Self::from_parts(spline.points[..=k - p].to_vec(), left_knots, p, uniform);

        let mut right_knots = Vec::with_capacity(spline.knots.len() - k + p);
        right_knots.push(u);
        right_knots.extend_from_slice(&spline.knots[k - p + 1..]);
        let right = Self::from_parts(spline.points[k - p..].to_vec(), right_knots, p, uniform);
        Ok((left, right))
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn intersect_ray(&self, ray: Ray, precision: Scalar, max_iter: usize) -> Vec<(Scalar, Scalar)> {
        match self.to_bezier_segments() {
            Ok(segments) => intersect_ray_segments(&segments, ray, precision, max_iter),
            Err(error) => {
                tracing::debug!(?error, "ray intersection failed to split spline");
                Vec::new()
            }
        }
    }

    fn flatten_into(
        &self,
        max_deviation: Scalar,
        include_last: bool,
        out: &mut Vec<Point>,
    ) -> Result<(), Error> {
        flatten_check(self, max_deviation)?;
        let segments = self.to_bezier_segments()?;
        let count = segments.len();
        for (index, segment) in segments.iter().enumerate() {
            let last = index + 1 == count;
            segment.flatten_into(max_deviation, include_last && last, out)?;
        }
        Ok(())
    }

    /// Integrated separately over every knot span, speed is smooth inside of them
    fn length(&self, u0: Scalar, u1: Scalar, max_error: Scalar) -> Scalar {
        if self.is_empty() {
            return 0.0;
        }
        let domain = self.domain();
        let (u0, u1) = (domain.clamp(u0), domain.clamp(u1));
        let (lo, hi, sign) = if u0 <= u1 {
            (u0, u1, 1.0)
        } else {
            (u1, u0, -1.0)
        };
        let mut bounds = vec![lo];
        bounds.extend(self.breakpoints().into_iter().filter(|u| lo < *u && *u < hi));
        bounds.push(hi);
        let length: Scalar = bounds
            .windows(2)
            .map(|pair| romberg(|u| self.speed(u), pair[0], pair[1], max_error))
            .sum();
        sign * length
    }
}
