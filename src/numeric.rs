//! Numerical routines: integration, root refinement and banded linear systems
use crate::{EPSILON, Error, Point, Scalar};

/// Romberg integration never stops before this many trapezoid refinements
const ROMBERG_MIN_LEVELS: usize = 4;
/// Maximum number of trapezoid refinements (`2^(levels - 1) + 1` evaluations)
const ROMBERG_MAX_LEVELS: usize = 20;

/// Integrate `f` over `[a, b]` with Romberg method
///
/// Stops once two successive diagonal extrapolations differ by less than
/// `max_error`. Integral over reversed interval is negated.
pub fn romberg(f: impl Fn(Scalar) -> Scalar, a: Scalar, b: Scalar, max_error: Scalar) -> Scalar {
    if a == b {
        return 0.0;
    }
    let mut h = b - a;
    let mut prev = Vec::with_capacity(ROMBERG_MAX_LEVELS);
    let mut cur = Vec::with_capacity(ROMBERG_MAX_LEVELS);
    prev.push(0.5 * h * (f(a) + f(b)));
    for level in 1..ROMBERG_MAX_LEVELS {
        h *= 0.5;
        let sum: Scalar = (0..1usize << (level - 1))
            .map(|k| f(a + (2 * k + 1) as Scalar * h))
            .sum();
        cur.clear();
        cur.push(0.5 * prev[0] + h * sum);
        let mut factor = 1.0;
        for j in 1..=level {
            factor *= 4.0;
            let value = cur[j - 1] + (cur[j - 1] - prev[j - 1]) / (factor - 1.0);
            cur.push(value);
        }
        if level >= ROMBERG_MIN_LEVELS && (cur[level] - prev[level - 1]).abs() <= max_error {
            return cur[level];
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    tracing::debug!(?a, ?b, ?max_error, "romberg integration reached maximum level");
    prev[ROMBERG_MAX_LEVELS - 1]
}

/// Find root of `f` inside of the bracket `[a, b]` with Brent's method
///
/// Returns best estimate of the root and a flag which is `true` if it has
/// converged to the `precision` within `max_iter` iterations. Bracket that
/// does not change sign yields the endpoint closest to zero and `false`.
pub fn brent_root(
    f: impl Fn(Scalar) -> Scalar,
    a: Scalar,
    b: Scalar,
    precision: Scalar,
    max_iter: usize,
) -> (Scalar, bool) {
    let (mut a, mut b) = (a, b);
    let (mut fa, mut fb) = (f(a), f(b));
    if fa == 0.0 {
        return (a, true);
    }
    if fb == 0.0 {
        return (b, true);
    }
    if fa * fb > 0.0 {
        return (if fa.abs() < fb.abs() { a } else { b }, false);
    }

    let (mut c, mut fc) = (a, fa);
    let mut d = b - a;
    let mut e = d;
    for _ in 0..max_iter {
        if fb * fc > 0.0 {
            // root is between `a` and `b`
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            // `b` must be the best estimate
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }
        let tol = 2.0 * EPSILON * b.abs() + 0.5 * precision;
        let m = 0.5 * (c - b);
        if m.abs() <= tol || fb == 0.0 {
            return (b, true);
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // secant
                (2.0 * m * s, 1.0 - s)
            } else {
                // inverse quadratic interpolation
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * m * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            if 2.0 * p < (3.0 * m * q - (tol * q).abs()).min((e * q).abs()) {
                e = d;
                d = p / q;
            } else {
                d = m;
                e = m;
            }
        } else {
            d = m;
            e = m;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(m) };
        fb = f(b);
    }
    tracing::debug!(?b, ?precision, ?max_iter, "brent root refinement did not converge");
    (b, false)
}

/// Square banded matrix with `kl` sub-diagonals and `ku` super-diagonals
///
/// Storage reserves extra `kl` super-diagonals for fill-in produced by
/// row interchanges during LU decomposition.
#[derive(Debug, Clone)]
pub struct BandedMatrix {
    size: usize,
    kl: usize,
    ku: usize,
    data: Vec<Scalar>,
    pivots: Vec<usize>,
}

impl BandedMatrix {
    pub fn new(size: usize, kl: usize, ku: usize) -> Self {
        let width = 2 * kl + ku + 1;
        Self {
            size,
            kl,
            ku,
            data: vec![0.0; size * width],
            pivots: Vec::new(),
        }
    }

    fn width(&self) -> usize {
        2 * self.kl + self.ku + 1
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.size || col >= self.size {
            return None;
        }
        if col + self.kl < row || col > row + self.ku + self.kl {
            return None;
        }
        Some(row * self.width() + col + self.kl - row)
    }

    /// Get matrix element, elements outside of the band are zero
    pub fn get(&self, row: usize, col: usize) -> Scalar {
        self.offset(row, col).map_or(0.0, |index| self.data[index])
    }

    /// Set matrix element
    ///
    /// Fails if element is outside of the band specified on construction.
    pub fn set(&mut self, row: usize, col: usize, value: Scalar) -> Result<(), Error> {
        if row >= self.size || col >= self.size || col + self.kl < row || col > row + self.ku {
            return Err(Error::out_of_range(format!(
                "element ({}, {}) is outside of the band kl={} ku={}",
                row, col, self.kl, self.ku
            )));
        }
        let index = row * self.width() + col + self.kl - row;
        self.data[index] = value;
        Ok(())
    }

    /// In place LU decomposition with partial pivoting
    pub fn decompose(&mut self) -> Result<(), Error> {
        let n = self.size;
        let reach = self.ku + self.kl;
        self.pivots.clear();
        for k in 0..n {
            let last_row = (k + self.kl).min(n - 1);
            let mut pivot = k;
            for row in k + 1..=last_row {
                if self.get(row, k).abs() > self.get(pivot, k).abs() {
                    pivot = row;
                }
            }
            if self.get(pivot, k).abs() <= EPSILON {
                return Err(Error::invalid_operation(format!(
                    "banded matrix is singular at column {}",
                    k
                )));
            }
            self.pivots.push(pivot);

            let last_col = (k + reach).min(n - 1);
            if pivot != k {
                for col in k..=last_col {
                    let (Some(i0), Some(i1)) = (self.offset(k, col), self.offset(pivot, col))
                    else {
                        continue;
                    };
                    self.data.swap(i0, i1);
                }
            }

            let diag = self.get(k, k);
            for row in k + 1..=last_row {
                let Some(index) = self.offset(row, k) else {
                    continue;
                };
                let factor = self.data[index] / diag;
                self.data[index] = factor;
                if factor == 0.0 {
                    continue;
                }
                for col in k + 1..=last_col {
                    let value = self.get(k, col);
                    if let Some(index) = self.offset(row, col) {
                        self.data[index] -= factor * value;
                    }
                }
            }
        }
        Ok(())
    }

    /// Solve `A x = rhs` in place, matrix must be decomposed first
    pub fn solve(&self, rhs: &mut [Point]) -> Result<(), Error> {
        let n = self.size;
        if rhs.len() != n {
            return Err(Error::invalid_parameter(format!(
                "right hand side has {} rows, expected {}",
                rhs.len(),
                n
            )));
        }
        if self.pivots.len() != n {
            return Err(Error::invalid_operation(
                "banded matrix is not decomposed",
            ));
        }
        // forward substitution with unit lower triangular factor
        for k in 0..n {
            rhs.swap(k, self.pivots[k]);
            let value = rhs[k];
            for row in k + 1..=(k + self.kl).min(n - 1) {
                let factor = self.get(row, k);
                rhs[row] -= factor * value;
            }
        }
        // back substitution
        let reach = self.ku + self.kl;
        for k in (0..n).rev() {
            let mut value = rhs[k];
            for col in k + 1..=(k + reach).min(n - 1) {
                value -= self.get(k, col) * rhs[col];
            }
            rhs[k] = value / self.get(k, k);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    #[test]
    fn test_romberg() {
        let value = romberg(|x| x * x, 0.0, 3.0, 1e-10);
        assert_approx_eq!(value, 9.0, 1e-9);

        let value = romberg(|x| x.sin(), 0.0, crate::PI, 1e-10);
        assert_approx_eq!(value, 2.0, 1e-9);

        let value = romberg(|x| x.exp(), 1.0, 0.0, 1e-10);
        assert_approx_eq!(value, 1.0 - std::f64::consts::E, 1e-9);

        assert_eq!(romberg(|x| x, 2.0, 2.0, 1e-6), 0.0);
    }

    #[test]
    fn test_brent_root() {
        let (root, converged) = brent_root(|x| x * x - 2.0, 0.0, 2.0, 1e-12, 100);
        assert!(converged);
        assert_approx_eq!(root, 2.0f64.sqrt(), 1e-10);

        let (root, converged) = brent_root(|x| x.cos() - x, 0.0, 1.0, 1e-12, 100);
        assert!(converged);
        assert_approx_eq!(root, 0.739085133215, 1e-10);

        // exact hit at the end of the bracket
        let (root, converged) = brent_root(|x| x - 1.0, 0.0, 1.0, 1e-12, 100);
        assert!(converged);
        assert_eq!(root, 1.0);

        // no sign change
        let (_, converged) = brent_root(|x| x * x + 1.0, -1.0, 1.0, 1e-12, 100);
        assert!(!converged);

        // iteration budget exhausted
        let (_, converged) = brent_root(|x| x.powi(3) - 0.3, 0.0, 1.0, 1e-15, 1);
        assert!(!converged);
    }

    #[test]
    fn test_banded_solve() {
        // tridiagonal system with known solution
        let n = 6;
        let mut m = BandedMatrix::new(n, 1, 1);
        for i in 0..n {
            m.set(i, i, 4.0).unwrap();
            if i > 0 {
                m.set(i, i - 1, 1.0).unwrap();
            }
            if i + 1 < n {
                m.set(i, i + 1, 1.0).unwrap();
            }
        }
        assert!(m.set(0, 3, 1.0).is_err());
        let x: Vec<Point> = (0..n)
            .map(|i| Point::new(i as Scalar, (i * i) as Scalar))
            .collect();
        let mut rhs: Vec<Point> = (0..n)
            .map(|i| {
                let mut value = Point::ZERO;
                for j in 0..n {
                    value += m.get(i, j) * x[j];
                }
                value
            })
            .collect();
        m.decompose().unwrap();
        m.solve(&mut rhs).unwrap();
        for (r, e) in rhs.iter().zip(&x) {
            assert_approx_eq!(r.x(), e.x(), 1e-10);
            assert_approx_eq!(r.y(), e.y(), 1e-10);
        }
    }

    #[test]
    fn test_banded_pivoting() {
        // zero on the diagonal requires row interchange
        let mut m = BandedMatrix::new(3, 1, 1);
        m.set(0, 0, 0.0).unwrap();
        m.set(0, 1, 2.0).unwrap();
        m.set(1, 0, 1.0).unwrap();
        m.set(1, 1, 1.0).unwrap();
        m.set(1, 2, 1.0).unwrap();
        m.set(2, 1, 3.0).unwrap();
        m.set(2, 2, 1.0).unwrap();
        // x = [(1, 0), (2, 1), (3, -1)]
        let mut rhs = vec![
            Point::new(4.0, 2.0),
            Point::new(6.0, 0.0),
            Point::new(9.0, 2.0),
        ];
        m.decompose().unwrap();
        m.solve(&mut rhs).unwrap();
        assert_approx_eq!(rhs[0].x(), 1.0, 1e-12);
        assert_approx_eq!(rhs[0].y(), 0.0, 1e-12);
        assert_approx_eq!(rhs[1].x(), 2.0, 1e-12);
        assert_approx_eq!(rhs[1].y(), 1.0, 1e-12);
        assert_approx_eq!(rhs[2].x(), 3.0, 1e-12);
        assert_approx_eq!(rhs[2].y(), -1.0, 1e-12);

        let mut singular = BandedMatrix::new(2, 1, 1);
        singular.set(0, 0, 1.0).unwrap();
        singular.set(1, 0, 1.0).unwrap();
        assert!(singular.decompose().is_err());
    }
}
