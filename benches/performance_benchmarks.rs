use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use coursepace::{
    CourseAnalyzer, CourseInput, CourseMetricsAggregator, ElevationSmoother, PacingEngine, PacingStrategy, Plan,
    PlacementTarget, SmoothingConfig, TrackNormalizer, TrackSample, WaypointDetails,
};

/// Performance benchmarks for the course analysis pipeline
///
/// Track sizes range from a short loop to an ultra-distance course so the
/// linear-time stages stay linear.

/// Rolling course heading north-east with ~5 m sample spacing
fn create_track(points: usize) -> Vec<TrackSample> {
    (0..points)
        .map(|i| {
            let t = i as f64;
            let elevation = 800.0 + 120.0 * (t / 400.0).sin() + 15.0 * (t / 37.0).cos();
            TrackSample::new(i as u64, 45.0 + t * 0.00003, 6.0 + t * 0.00003, Some(elevation))
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Track Normalization");
    let normalizer = TrackNormalizer::default();

    for &size in &[1_000, 10_000, 100_000] {
        let samples = create_track(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("normalize", size), &samples, |b, samples| {
            b.iter(|| normalizer.normalize(black_box(samples)));
        });
    }

    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Elevation Smoothing");
    let normalizer = TrackNormalizer::default();

    for &window in &[25.0, 100.0, 1000.0] {
        let smoother = ElevationSmoother::new(SmoothingConfig {
            grade_window_meters: window,
            ..SmoothingConfig::default()
        })
        .unwrap();
        let points = normalizer.normalize(&create_track(50_000)).unwrap();

        group.bench_with_input(BenchmarkId::new("smooth", window as u64), &points, |b, points| {
            b.iter(|| smoother.smooth(black_box(points)));
        });
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let points = TrackNormalizer::default().normalize(&create_track(50_000)).unwrap();
    let profile = ElevationSmoother::new(SmoothingConfig::default()).unwrap().smooth(&points);
    let aggregator = CourseMetricsAggregator::default();

    c.bench_function("aggregate_metrics_50k", |b| {
        b.iter(|| aggregator.aggregate(black_box(&profile)));
    });
}

fn bench_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pacing Schedule");
    let analyzer = CourseAnalyzer::default();
    let engine = PacingEngine::default();

    for &waypoint_count in &[2usize, 20, 200] {
        let (course, mut waypoints) = analyzer
            .analyze(&CourseInput::new("bench", "Bench", "", create_track(20_000)))
            .unwrap();
        let locator = course.locator().unwrap();
        let total = course.total_distance_meters();
        for i in 1..waypoint_count.saturating_sub(1) {
            let distance = total * i as f64 / (waypoint_count - 1) as f64;
            waypoints
                .insert(&locator, PlacementTarget::Distance(distance), WaypointDetails::named(format!("Aid {}", i)))
                .unwrap();
        }

        let mut plan = Plan::with_pace("bench", 330.0);
        plan.use_grade_adjustment = true;
        plan.pacing_strategy = PacingStrategy::Linear;
        plan.pacing_linear_percent = -8;

        group.throughput(Throughput::Elements(waypoints.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("schedule", waypoint_count),
            &waypoints,
            |b, waypoints| {
                b.iter(|| engine.schedule(&plan, black_box(waypoints.waypoints()), course.profile()));
            },
        );
    }

    group.finish();
}

fn bench_batch_analysis(c: &mut Criterion) {
    let analyzer = CourseAnalyzer::default();
    let inputs: Vec<CourseInput> = (0..16)
        .map(|i| CourseInput::new(format!("c{}", i), "Batch", "", create_track(10_000)))
        .collect();

    c.bench_function("analyze_batch_16x10k", |b| {
        b.iter(|| analyzer.analyze_batch(black_box(&inputs)));
    });
}

criterion_group!(
    benches,
    bench_normalize,
    bench_smoothing,
    bench_metrics,
    bench_schedule,
    bench_batch_analysis
);
criterion_main!(benches);
