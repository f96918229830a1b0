#![deny(warnings)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use curvekit::*;
use std::{hint::black_box, time::Duration};

fn control_points() -> Vec<Point> {
    (0..16)
        .map(|i| {
            let t = i as Scalar / 15.0;
            Point::new(100.0 * t, 40.0 * (3.0 * PI * t).sin())
        })
        .collect()
}

fn curves() -> Vec<(&'static str, AnyCurve)> {
    let points = control_points();
    let cubic = BezierCurve::new(vec![
        Point::new(158.0, 70.0),
        Point::new(210.0, 250.0),
        Point::new(25.0, 190.0),
        Point::new(219.0, 89.0),
    ])
    .expect("valid cubic");
    let bspline = BSplineCurve::new(points.clone(), 3, KnotPolicy::UniformClamped, Domain::unit())
        .expect("valid b-spline");
    let hermite = HermiteCurve::from_points(&points, Domain::unit()).expect("valid hermite");
    vec![
        ("bezier", cubic.into()),
        ("bspline", bspline.into()),
        ("hermite", hermite.into()),
    ]
}

fn curve_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("curve");
    group.throughput(Throughput::Elements(1));
    for (name, curve) in curves() {
        let length = curve.total_length(DEFAULT_PRECISION) / 2.0;
        let ray = Ray::new((0.0, 120.0), (1.0, -0.2)).expect("valid ray");
        group
            .bench_with_input(BenchmarkId::new("evaluate", name), &curve, |b, c| {
                b.iter(|| c.evaluate(black_box(0.3)))
            })
            .bench_with_input(BenchmarkId::new("derivative", name), &curve, |b, c| {
                b.iter(|| c.derivative(2, black_box(0.3)))
            })
            .bench_with_input(BenchmarkId::new("flatten", name), &curve, |b, c| {
                b.iter_with_large_drop(|| {
                    c.flatten(DEFAULT_FLATNESS, true)
                        .map(|iter| iter.collect::<Vec<_>>())
                })
            })
            .bench_with_input(BenchmarkId::new("intersect", name), &curve, |b, c| {
                b.iter(|| c.intersect_ray(black_box(ray), DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS))
            })
            .bench_with_input(BenchmarkId::new("length", name), &curve, |b, c| {
                b.iter(|| c.total_length(DEFAULT_PRECISION))
            })
            .bench_with_input(BenchmarkId::new("from length", name), &curve, |b, c| {
                b.iter(|| c.global_parameter(black_box(length), DEFAULT_PRECISION, DEFAULT_MAX_ITERATIONS))
            });
    }
    group.finish();
}

fn bspline_benchmark(c: &mut Criterion) {
    let points = control_points();
    let spline = BSplineCurve::new(points.clone(), 3, KnotPolicy::UniformClamped, Domain::unit())
        .expect("valid b-spline");
    let mut group = c.benchmark_group("bspline");
    group
        .throughput(Throughput::Elements(points.len() as u64))
        .bench_function("fit free", |b| {
            b.iter(|| BSplineCurve::fit(black_box(&points), 3, FitBoundary::Free, Domain::unit()))
        })
        .bench_function("fit natural", |b| {
            b.iter(|| BSplineCurve::fit(black_box(&points), 3, FitBoundary::Natural, Domain::unit()))
        })
        .bench_function("insert knot", |b| {
            b.iter_with_large_drop(|| {
                let mut spline = spline.clone();
                spline.insert_knot(black_box(0.37), 2).map(|_| spline)
            })
        })
        .bench_function("bezier segments", |b| {
            b.iter_with_large_drop(|| spline.to_bezier_segments())
        })
        .bench_function("elevate degree", |b| {
            b.iter_with_large_drop(|| {
                let mut spline = spline.clone();
                spline.elevate_degree(1).map(|_| spline)
            })
        });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10).warm_up_time(Duration::new(1, 0));
    targets = curve_benchmark, bspline_benchmark
);
criterion_main!(benches);
