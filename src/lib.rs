//! Parametric 2D curves: bezier, b-spline and hermite.
//!
//! Main features:
//!  - Evaluation and derivatives of any order
//!  - Cutting, flattening, ray intersection and arc length
//!  - Degree elevation and reduction, knot insertion and removal
//!  - Global b-spline interpolation
//!
mod bezier;
mod bspline;
mod curve;
mod error;
mod fit;
mod flatten;
mod geometry;
mod hermite;
mod interval;
mod intersect;
mod knots;
mod numeric;
mod utils;

pub use bezier::BezierCurve;
pub use bspline::BSplineCurve;
pub use curve::{
    AnyCurve, Curve, CurveFlattenIter, DEFAULT_FLATNESS, DEFAULT_MAX_ITERATIONS,
    DEFAULT_PRECISION, MAX_RECURSION_DEPTH,
};
pub use error::Error;
pub use fit::FitBoundary;
pub use geometry::{
    BBox, CLOSE_TOLERANCE, EPSILON, EPSILON_SQRT, PI, Point, Ray, Scalar, Transform, scalar_fmt,
};
pub use hermite::{HermiteCurve, HermiteKey};
pub use interval::Domain;
pub use knots::KnotPolicy;
pub use numeric::{BandedMatrix, brent_root, romberg};
pub use utils::{Array, ArrayIter, binomial, clamp};
