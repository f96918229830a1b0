//! Global B-spline interpolation
use crate::{
    BSplineCurve, Domain, Error, Point, Scalar,
    knots::{averaged_knots, basis_derivatives, chord_parameters, find_span},
    numeric::BandedMatrix,
};

/// End conditions of an interpolating spline
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FitBoundary {
    /// Only the points are interpolated
    Free,
    /// First derivatives at the start and at the end of the domain
    Tangents(Point, Point),
    /// Second derivatives vanish at both ends
    Natural,
}

/// Row of the interpolation system, values start at column `start`
struct Row {
    start: usize,
    values: Vec<Scalar>,
    rhs: Point,
}

impl Row {
    fn end(&self) -> usize {
        self.start + self.values.len() - 1
    }
}

/// Row of basis function derivatives of `order` at `u`
fn basis_row(degree: usize, knots: &[Scalar], count: usize, u: Scalar, order: usize, rhs: Point) -> Row {
    let span = find_span(degree, knots, count, u);
    let mut ders = basis_derivatives(degree, knots, span, u, order);
    Row {
        start: span - degree,
        values: ders.swap_remove(order),
        rhs,
    }
}

/// Knots for interpolation with two extra boundary equations
fn boundary_knots(params: &[Scalar], degree: usize, domain: Domain) -> Vec<Scalar> {
    let count = params.len();
    let mut knots = Vec::with_capacity(count + 2 * degree + 3);
    knots.extend(std::iter::repeat_n(domain.start(), degree + 1));
    for j in 0..(count + 1).saturating_sub(degree) {
        let average = params[j..j + degree].iter().sum::<Scalar>() / degree as Scalar;
        knots.push(domain.global(average));
    }
    knots.extend(std::iter::repeat_n(domain.end(), degree + 1));
    knots
}

impl BSplineCurve {
    /// Clamped spline of specified degree passing through all `points`
    ///
    /// Points are parametrized by chord length over `domain`. Tangents of
    /// [`FitBoundary::Tangents`] are derivatives with respect to the curve parameter.
    pub fn fit(
        points: &[Point],
        degree: usize,
        boundary: FitBoundary,
        domain: Domain,
    ) -> Result<Self, Error> {
        let _span = tracing::trace_span!("bspline_fit", points = points.len(), degree).entered();
        let size = points.len();
        if size < 2 || degree == 0 {
            return Err(Error::invalid_parameter(format!(
                "fit of {} points with degree {}",
                size, degree
            )));
        }
        if domain.is_degenerate() {
            return Err(Error::invalid_parameter(format!(
                "degenerate fit domain {:?}",
                domain
            )));
        }
        let params = chord_parameters(points);
        if params.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::invalid_parameter(
                "fit points must not contain consecutive duplicates",
            ));
        }

        let p = degree;
        let (count, knots) = match boundary {
            FitBoundary::Free => {
                if size < p + 1 {
                    return Err(Error::invalid_parameter(format!(
                        "fit with degree {} requires at least {} points",
                        p,
                        p + 1
                    )));
                }
                (size, averaged_knots(&params, p, domain))
            }
            FitBoundary::Tangents(..) | FitBoundary::Natural => {
                if p < 2 || size + 2 < p + 1 {
                    return Err(Error::invalid_parameter(format!(
                        "boundary conditions can not be satisfied with degree {} and {} points",
                        p, size
                    )));
                }
                (size + 2, boundary_knots(&params, p, domain))
            }
        };

        let at = |t: Scalar| domain.global(t);
        let mut rows = Vec::with_capacity(count);
        match boundary {
            FitBoundary::Free => {
                for (t, point) in params.iter().zip(points) {
                    rows.push(basis_row(p, &knots, count, at(*t), 0, *point));
                }
            }
            FitBoundary::Tangents(..) | FitBoundary::Natural => {
                let (start_row, end_row) = match boundary {
                    FitBoundary::Tangents(d0, d1) => {
                        let s0 = (knots[p + 1] - domain.start()) / p as Scalar;
                        let s1 = (domain.end() - knots[count - 1]) / p as Scalar;
                        (
                            Row {
                                start: 0,
                                values: vec![-1.0, 1.0],
                                rhs: s0 * d0,
                            },
                            Row {
                                start: count - 2,
                                values: vec![-1.0, 1.0],
                                rhs: s1 * d1,
                            },
                        )
                    }
                    _ => (
                        basis_row(p, &knots, count, domain.start(), 2, Point::ZERO),
                        basis_row(p, &knots, count, domain.end(), 2, Point::ZERO),
                    ),
                };
                rows.push(basis_row(p, &knots, count, domain.start(), 0, points[0]));
                rows.push(start_row);
                for index in 1..size - 1 {
                    rows.push(basis_row(p, &knots, count, at(params[index]), 0, points[index]));
                }
                rows.push(end_row);
                rows.push(basis_row(p, &knots, count, domain.end(), 0, points[size - 1]));
            }
        }

        let kl = rows
            .iter()
            .enumerate()
            .map(|(index, row)| index.saturating_sub(row.start))
            .max()
            .unwrap_or(0);
        let ku = rows
            .iter()
            .enumerate()
            .map(|(index, row)| row.end().saturating_sub(index))
            .max()
            .unwrap_or(0);
        let mut matrix = BandedMatrix::new(count, kl, ku);
        let mut solution = Vec::with_capacity(count);
        for (index, row) in rows.iter().enumerate() {
            for (offset, value) in row.values.iter().enumerate() {
                matrix.set(index, row.start + offset, *value)?;
            }
            solution.push(row.rhs);
        }
        matrix.decompose()?;
        matrix.solve(&mut solution)?;
        Ok(BSplineCurve::from_parts(solution, knots, p, false))
    }
}
