//! Flatten a curve given by its control points and print resulting polyline as SVG path
#![deny(warnings)]

use curvekit::*;
use std::{env, io::Write};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

type Error = Box<dyn std::error::Error>;

#[derive(Debug, Clone, Copy)]
enum CurveType {
    Bezier,
    BSpline,
    Hermite,
}

#[derive(Debug)]
struct Args {
    curve_type: CurveType,
    degree: usize,
    flatness: Scalar,
    ray: Option<Ray>,
    points: Vec<Point>,
}

fn parse_point(value: &str) -> Result<Point, Error> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("point must be formatted as x,y: {}", value))?;
    Ok(Point::new(x.trim().parse()?, y.trim().parse()?))
}

impl Args {
    fn parse() -> Result<Args, Error> {
        let mut result = Args {
            curve_type: CurveType::Bezier,
            degree: 3,
            flatness: DEFAULT_FLATNESS,
            ray: None,
            points: Vec::new(),
        };
        let mut args = env::args();
        let cmd = args.next().unwrap_or_else(|| "flatten".to_owned());
        let mut help = false;
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "-h" => {
                    help = true;
                    break;
                }
                "-k" => {
                    result.curve_type = match args.next().ok_or("-k requires argument")?.as_ref() {
                        "bezier" => CurveType::Bezier,
                        "bspline" => CurveType::BSpline,
                        "hermite" => CurveType::Hermite,
                        kind => return Err(format!("unknown curve kind: {}", kind).into()),
                    };
                }
                "-d" => {
                    result.degree = args.next().ok_or("-d requires argument")?.parse()?;
                }
                "-f" => {
                    result.flatness = args.next().ok_or("-f requires argument")?.parse()?;
                }
                "-r" => {
                    let origin = parse_point(&args.next().ok_or("-r requires origin")?)?;
                    let direction = parse_point(&args.next().ok_or("-r requires direction")?)?;
                    result.ray =
                        Some(Ray::new(origin, direction).ok_or("ray direction must not be zero")?);
                }
                _ => result.points.push(parse_point(&arg)?),
            }
        }
        if help || result.points.len() < 2 {
            eprintln!("Flatten curve and print it as SVG path");
            eprintln!(
                "\nUSAGE:\n    {} [-k bezier|bspline|hermite] [-d <degree>] [-f <flatness>] [-r <origin> <direction>] <x,y>...",
                cmd
            );
            eprintln!("\nARGS:");
            eprintln!("    -k <kind>          curve kind (default: bezier)");
            eprintln!("    -d <degree>        b-spline degree (default: 3)");
            eprintln!(
                "    -f <flatness>      squared flattening deviation (default: {})",
                DEFAULT_FLATNESS
            );
            eprintln!("    -r <x,y> <dx,dy>   report intersections with the ray");
            eprintln!("    <x,y>              control points");
            std::process::exit(1);
        }
        Ok(result)
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse()?;
    let curve: AnyCurve = match args.curve_type {
        CurveType::Bezier => BezierCurve::new(args.points)?.into(),
        CurveType::BSpline => BSplineCurve::new(
            args.points,
            args.degree,
            KnotPolicy::UniformClamped,
            Domain::unit(),
        )?
        .into(),
        CurveType::Hermite => HermiteCurve::from_points(&args.points, Domain::unit())?.into(),
    };
    tracing::debug!("[curve] {:?}", curve);

    let points: Vec<_> = tracing::debug_span!("[flatten]", flatness = args.flatness)
        .in_scope(|| curve.flatten(args.flatness, true))?
        .collect();
    tracing::debug!("[flatten:points_count] {}", points.len());
    tracing::debug!(
        "[length] {}",
        curve.total_length(DEFAULT_PRECISION)
    );

    if let Some(ray) = args.ray {
        let hits = tracing::debug_span!("[intersect]").in_scope(|| {
            curve.intersect_ray(ray, DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS)
        });
        for (u, t) in hits {
            eprintln!("hit u={} t={} {:?}", u, t, ray.at(t));
        }
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (index, point) in points.iter().enumerate() {
        let cmd = if index == 0 { "M" } else { "L" };
        write!(out, "{}{:?} ", cmd, point)?;
    }
    writeln!(out)?;
    Ok(())
}
