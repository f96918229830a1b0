//! Knot vector utilities
use crate::{Domain, EPSILON, Error, Point, Scalar};

/// Knot vector construction policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KnotPolicy {
    /// Equally spaced interior knots, end knots repeated `degree + 1` times so that
    /// the curve passes through its first and last control points.
    UniformClamped,
    /// Equally spaced knots, domain lies strictly inside of the knot span.
    UniformUnclamped,
    /// Clamped knots averaged from centripetal parametrization of control points.
    NonUniform,
}

/// Index of the knot span `[knots[i], knots[i + 1])` containing `u`
///
/// `count` is the number of control points. Values outside of the domain
/// `[knots[degree], knots[count]]` are mapped to the first or the last non-empty span.
pub(crate) fn find_span(degree: usize, knots: &[Scalar], count: usize, u: Scalar) -> usize {
    if u >= knots[count] {
        let mut span = count - 1;
        while span > degree && knots[span] >= knots[span + 1] {
            span -= 1;
        }
        return span;
    }
    if u <= knots[degree] {
        let mut span = degree;
        while span + 1 < count && knots[span + 1] <= knots[span] {
            span += 1;
        }
        return span;
    }
    let mut low = degree;
    let mut high = count;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Number of knots equal to `u`
pub(crate) fn multiplicity(knots: &[Scalar], u: Scalar) -> usize {
    knots.iter().filter(|knot| **knot == u).count()
}

/// Values of the `degree + 1` non-vanishing basis functions at `u`
///
/// Triangular Cox-de Boor recurrence, first value corresponds to the control
/// point `span - degree`.
pub(crate) fn basis_functions(degree: usize, knots: &[Scalar], span: usize, u: Scalar) -> Vec<Scalar> {
    let mut basis = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    basis[0] = 1.0;
    for j in 1..=degree {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = basis[r] / (right[r + 1] + left[j - r]);
            basis[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        basis[j] = saved;
    }
    basis
}

/// Non-vanishing basis functions and their derivatives up to `order` at `u`
///
/// Row `k` of the result holds `k`-th derivatives, rows above `degree` are zero.
pub(crate) fn basis_derivatives(
    degree: usize,
    knots: &[Scalar],
    span: usize,
    u: Scalar,
    order: usize,
) -> Vec<Vec<Scalar>> {
    let p = degree;
    let mut ders = vec![vec![0.0; p + 1]; order + 1];

    // basis functions in the upper triangle, knot differences in the lower one
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let top = order.min(p);
    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let (mut s1, mut s2) = (0, 1);
        a[0][0] = 1.0;
        for k in 1..=top {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if rk >= 0 {
                let rk = rk as usize;
                a[s2][0] = a[s1][0] / ndu[pk + 1][rk];
                d = a[s2][0] * ndu[rk][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r <= pk + 1 { k - 1 } else { p - r };
            for j in j1..=j2 {
                let index = (rk + j as isize) as usize;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][index];
                d += a[s2][j] * ndu[index][pk];
            }
            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    // falling factorial p! / (p - k)!
    let mut factor = p as Scalar;
    for k in 1..=top {
        for value in ders[k].iter_mut() {
            *value *= factor;
        }
        factor *= (p - k) as Scalar;
    }
    ders
}

/// Normalized centripetal parameters of a point sequence in `[0, 1]`
///
/// Falls back to uniform parameters when all points coincide.
pub(crate) fn centripetal_parameters(points: &[Point]) -> Vec<Scalar> {
    parameters(points, |p0, p1| p0.dist(p1).sqrt())
}

/// Normalized chord length parameters of a point sequence in `[0, 1]`
pub(crate) fn chord_parameters(points: &[Point]) -> Vec<Scalar> {
    parameters(points, |p0, p1| p0.dist(p1))
}

fn parameters(points: &[Point], dist: impl Fn(Point, Point) -> Scalar) -> Vec<Scalar> {
    let count = points.len();
    if count < 2 {
        return vec![0.0; count];
    }
    let mut params = Vec::with_capacity(count);
    let mut total = 0.0;
    params.push(0.0);
    for pair in points.windows(2) {
        total += dist(pair[0], pair[1]);
        params.push(total);
    }
    if total < EPSILON {
        let last = (count - 1) as Scalar;
        return (0..count).map(|index| index as Scalar / last).collect();
    }
    for param in params.iter_mut() {
        *param /= total;
    }
    params[count - 1] = 1.0;
    params
}

/// Clamped knot vector with interior knots averaged from `params` mapped into `domain`
pub(crate) fn averaged_knots(params: &[Scalar], degree: usize, domain: Domain) -> Vec<Scalar> {
    let count = params.len();
    let mut knots = Vec::with_capacity(count + degree + 1);
    knots.extend(std::iter::repeat_n(domain.start(), degree + 1));
    for j in 1..count - degree {
        let average = params[j..j + degree].iter().sum::<Scalar>() / degree as Scalar;
        knots.push(domain.global(average));
    }
    knots.extend(std::iter::repeat_n(domain.end(), degree + 1));
    knots
}

/// Build knot vector for control `points` of a spline with specified `degree`
pub(crate) fn make_knots(
    policy: KnotPolicy,
    points: &[Point],
    degree: usize,
    domain: Domain,
) -> Result<Vec<Scalar>, Error> {
    let count = points.len();
    if degree == 0 {
        return Err(Error::invalid_parameter("spline degree must be at least 1"));
    }
    if count < degree + 1 {
        return Err(Error::invalid_parameter(format!(
            "spline of degree {} requires at least {} control points, given {}",
            degree,
            degree + 1,
            count
        )));
    }
    if domain.is_degenerate() {
        return Err(Error::invalid_parameter(format!(
            "degenerate spline domain {:?}",
            domain
        )));
    }
    let spans = count - degree;
    let step = domain.length() / spans as Scalar;
    let knots = match policy {
        KnotPolicy::UniformClamped => {
            let mut knots = Vec::with_capacity(count + degree + 1);
            knots.extend(std::iter::repeat_n(domain.start(), degree));
            knots.extend((0..spans).map(|index| domain.start() + index as Scalar * step));
            knots.extend(std::iter::repeat_n(domain.end(), degree + 1));
            knots
        }
        KnotPolicy::UniformUnclamped => (0..count + degree + 1)
            .map(|index| {
                if index == count {
                    domain.end()
                } else {
                    domain.start() + (index as Scalar - degree as Scalar) * step
                }
            })
            .collect(),
        KnotPolicy::NonUniform => averaged_knots(&centripetal_parameters(points), degree, domain),
    };
    Ok(knots)
}

/// Knots are equally spaced apart from the repeated end knots
pub(crate) fn is_uniform(knots: &[Scalar], degree: usize, clamped: bool) -> bool {
    let inner = if clamped {
        &knots[degree..knots.len() - degree]
    } else {
        knots
    };
    if inner.len() < 3 {
        return true;
    }
    let step = inner[1] - inner[0];
    let tolerance = 1e-9 * (inner[inner.len() - 1] - inner[0]).abs().max(1.0);
    inner
        .windows(2)
        .all(|pair| ((pair[1] - pair[0]) - step).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    #[test]
    fn test_find_span() {
        let knots = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0];
        let degree = 2;
        let count = 5;
        assert_eq!(find_span(degree, &knots, count, 0.0), 2);
        assert_eq!(find_span(degree, &knots, count, 0.5), 2);
        assert_eq!(find_span(degree, &knots, count, 1.0), 3);
        assert_eq!(find_span(degree, &knots, count, 1.5), 3);
        assert_eq!(find_span(degree, &knots, count, 2.5), 4);
        assert_eq!(find_span(degree, &knots, count, 3.0), 4);
        assert_eq!(find_span(degree, &knots, count, 7.0), 4);
        assert_eq!(multiplicity(&knots, 3.0), 3);
        assert_eq!(multiplicity(&knots, 1.0), 1);
        assert_eq!(multiplicity(&knots, 1.5), 0);
    }

    #[test]
    fn test_basis_partition_of_unity() {
        let knots = [0.0, 0.0, 0.0, 0.0, 0.5, 1.5, 2.0, 3.0, 3.0, 3.0, 3.0];
        let degree = 3;
        let count = 7;
        for index in 0..=30 {
            let u = 3.0 * index as Scalar / 30.0;
            let span = find_span(degree, &knots, count, u);
            let basis = basis_functions(degree, &knots, span, u);
            assert!(basis.iter().all(|value| *value >= -1e-15));
            assert_approx_eq!(basis.iter().sum::<Scalar>(), 1.0, 1e-12);

            let ders = basis_derivatives(degree, &knots, span, u, 2);
            for (b0, b1) in basis.iter().zip(ders[0].iter()) {
                assert_approx_eq!(*b0, *b1, 1e-12);
            }
            // derivatives of a partition of unity sum to zero
            assert_approx_eq!(ders[1].iter().sum::<Scalar>(), 0.0, 1e-9);
            assert_approx_eq!(ders[2].iter().sum::<Scalar>(), 0.0, 1e-9);
        }
    }

    #[test]
    fn test_basis_derivatives() {
        let knots = [0.0, 0.0, 0.0, 1.0, 2.0, 4.0, 4.0, 4.0];
        let degree = 2;
        let count = 5;
        let h = 1e-6;
        for u in [0.3, 1.2, 2.5, 3.7] {
            let span = find_span(degree, &knots, count, u);
            let ders = basis_derivatives(degree, &knots, span, u, 3);
            let b0 = basis_functions(degree, &knots, span, u - h);
            let b1 = basis_functions(degree, &knots, span, u + h);
            for j in 0..=degree {
                assert_approx_eq!(ders[1][j], (b1[j] - b0[j]) / (2.0 * h), 1e-6);
            }
            assert!(ders[3].iter().all(|value| *value == 0.0));
        }
    }

    #[test]
    fn test_make_knots() {
        let points: Vec<_> = (0..6).map(|i| Point::new(i as Scalar, 0.0)).collect();
        let domain = Domain::new(0.0, 3.0);

        let knots = make_knots(KnotPolicy::UniformClamped, &points, 3, domain).unwrap();
        assert_eq!(
            knots,
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0, 3.0]
        );
        assert!(is_uniform(&knots, 3, true));

        let knots = make_knots(KnotPolicy::UniformUnclamped, &points, 3, domain).unwrap();
        assert_eq!(knots.len(), 10);
        assert_eq!(knots[3], 0.0);
        assert_eq!(knots[6], 3.0);
        assert_eq!(knots[0], -3.0);
        assert!(is_uniform(&knots, 3, false));

        // equally spaced points give averaged knots with equal steps
        let knots = make_knots(KnotPolicy::NonUniform, &points, 2, domain).unwrap();
        assert_eq!(knots.len(), 9);
        assert_eq!(&knots[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&knots[6..], &[3.0, 3.0, 3.0]);
        assert!(knots.windows(2).all(|pair| pair[0] <= pair[1]));

        assert!(matches!(
            make_knots(KnotPolicy::UniformClamped, &points[..3], 3, domain),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            make_knots(KnotPolicy::UniformClamped, &points, 0, domain),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            make_knots(KnotPolicy::UniformClamped, &points, 3, Domain::new(1.0, 1.0)),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_parameters() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 3.0),
        ];
        assert_eq!(chord_parameters(&points), vec![0.0, 0.25, 1.0]);
        let params = centripetal_parameters(&points);
        assert_approx_eq!(params[1], 1.0 / (1.0 + 3.0f64.sqrt()), 1e-12);
        assert_eq!(chord_parameters(&[Point::ZERO, Point::ZERO]), vec![0.0, 1.0]);
    }
}
