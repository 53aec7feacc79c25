use coursepace::export::{self, ExportFormat};
use coursepace::{
    AppConfig, CourseAnalyzer, CourseInput, ImportManager, PaceMode, PacingEngine, PacingStrategy, PlacementTarget,
    Plan, ProfilePoint, SmoothingOverride, TrackSample, WaypointDetails,
};
use std::fs;
use tempfile::tempdir;

/// Integration tests that exercise import -> analysis -> pacing -> export

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Straight track heading north from (45, 6) with `count + 1` samples over `length` meters
fn straight_track(length: f64, count: usize, elevation: impl Fn(f64) -> f64) -> Vec<TrackSample> {
    let total_degrees = (length / EARTH_RADIUS_METERS).to_degrees();
    (0..=count)
        .map(|i| {
            let fraction = i as f64 / count as f64;
            TrackSample::new(
                i as u64,
                45.0 + total_degrees * fraction,
                6.0,
                Some(elevation(fraction * length)),
            )
        })
        .collect()
}

#[test]
fn test_flat_ten_km_at_five_minutes() {
    let analyzer = CourseAnalyzer::default();
    let (course, waypoints) = analyzer
        .analyze(&CourseInput::new("flat", "Flat 10k", "", straight_track(10_000.0, 200, |_| 100.0)))
        .unwrap();
    assert!((course.total_distance_meters() - 10_000.0).abs() < 1.0);

    let plan = Plan::with_pace("flat", 300.0);
    let schedule = PacingEngine::default()
        .schedule(&plan, waypoints.waypoints(), course.profile())
        .unwrap();

    let expected = 300.0 * course.total_distance_meters() / 1000.0;
    assert!((schedule.total_elapsed_seconds - expected).abs() < 1e-6);
    assert!((schedule.total_elapsed_seconds - 3000.0).abs() < 0.5);
    assert_eq!(schedule.arrivals.len(), 2);
    assert_eq!(schedule.arrivals[0].arrival_seconds, 0.0);
}

#[test]
fn test_flat_ten_km_linear_split() {
    let analyzer = CourseAnalyzer::default();
    let (course, waypoints) = analyzer
        .analyze(&CourseInput::new("flat", "Flat 10k", "", straight_track(10_000.0, 200, |_| 100.0)))
        .unwrap();

    let mut plan = Plan::with_pace("flat", 300.0);
    plan.pacing_strategy = PacingStrategy::Linear;
    plan.pacing_linear_percent = 20;
    let engine = PacingEngine::default();
    let schedule = engine.schedule(&plan, waypoints.waypoints(), course.profile()).unwrap();
    assert!((schedule.total_elapsed_seconds - 300.0 * course.total_distance_meters() / 1000.0).abs() < 1e-6);

    let smoother = coursepace::ElevationSmoother::new(*course.smoothing()).unwrap();
    let series = engine
        .pace_series(&plan, waypoints.waypoints(), course.profile(), &smoother)
        .unwrap();
    let first = series.first().unwrap().pace_seconds_per_unit;
    let last = series.last().unwrap().pace_seconds_per_unit;
    assert!((first - 330.0).abs() < 1e-6, "start pace {}", first);
    assert!((last - 270.0).abs() < 1e-6, "finish pace {}", last);
}

#[test]
fn test_density_invariance() {
    let hill = |d: f64| 500.0 + 100.0 * (std::f64::consts::PI * d / 4_000.0).sin();
    let analyzer = CourseAnalyzer::default();

    let (sparse, _) = analyzer
        .analyze(&CourseInput::new("sparse", "Hill", "", straight_track(4_000.0, 200, hill)))
        .unwrap();
    let (dense, _) = analyzer
        .analyze(&CourseInput::new("dense", "Hill", "", straight_track(4_000.0, 400, hill)))
        .unwrap();

    assert!((sparse.total_distance_meters() - dense.total_distance_meters()).abs() < 1e-3);

    let floor = AppConfig::default().metrics.elevation_noise_floor_meters;
    let sparse_gain = sparse.metrics().elevation_gain_meters.unwrap();
    let dense_gain = dense.metrics().elevation_gain_meters.unwrap();
    assert!(
        (sparse_gain - dense_gain).abs() <= 2.0 * floor,
        "gain {} vs {}",
        sparse_gain,
        dense_gain
    );
    let sparse_loss = sparse.metrics().elevation_loss_meters.unwrap();
    let dense_loss = dense.metrics().elevation_loss_meters.unwrap();
    assert!((sparse_loss - dense_loss).abs() <= 2.0 * floor);
}

#[test]
fn test_far_click_snaps_to_nearest_point() {
    let (course, mut waypoints) = CourseAnalyzer::default()
        .analyze(&CourseInput::new(
            "hill",
            "Hill",
            "",
            straight_track(2_000.0, 100, |d| 300.0 + d * 0.05),
        ))
        .unwrap();
    let locator = course.locator().unwrap();

    // Far to the south: nearest is the first point; far to the north: the last
    let south = locator
        .snap(PlacementTarget::Position { lat: 40.0, lng: 6.0 })
        .unwrap();
    assert_eq!(south.index, 0);
    let north = locator
        .snap(PlacementTarget::Position { lat: 50.0, lng: 6.3 })
        .unwrap();
    let last = course.profile().last().unwrap();
    assert_eq!(north.distance_meters, last.distance_meters());
    assert_eq!(north.elevation_meters, last.elevation_meters());

    // A click off to the side of the middle of the track
    let middle = &course.profile()[50];
    let id = waypoints
        .insert(
            &locator,
            PlacementTarget::Position {
                lat: middle.lat(),
                lng: middle.lng() + 0.05,
            },
            WaypointDetails::named("Viewpoint"),
        )
        .unwrap();
    let placed = waypoints.get(&id).unwrap();
    assert_eq!(placed.distance_meters, middle.distance_meters());
    assert_eq!(placed.elevation_meters, middle.elevation_meters());
    assert_eq!(placed.order, 1);
}

#[test]
fn test_csv_import_plan_and_export() {
    let dir = tempdir().unwrap();
    let track_path = dir.path().join("valley.csv");

    let mut content = String::from("lat,lon,ele,marker,tags\n");
    for sample in straight_track(6_000.0, 300, |d| 200.0 + 150.0 * (d / 6_000.0)) {
        let marker = if sample.sequence_index == 150 { "Aid,aid;water" } else { "," };
        content.push_str(&format!(
            "{},{},{},{}\n",
            sample.lat,
            sample.lng,
            sample.elevation_meters.unwrap(),
            marker
        ));
    }
    fs::write(&track_path, &content).unwrap();

    let import = ImportManager::new().import_file(&track_path).unwrap();
    assert_eq!(import.markers.len(), 1);
    let input = import.into_course_input("valley");

    let analyzer = CourseAnalyzer::from_config(&AppConfig::default());
    let (course, waypoints) = analyzer.analyze(&input).unwrap();
    assert_eq!(course.original_track_content(), content);
    assert_eq!(waypoints.len(), 3);
    let aid = &waypoints.waypoints()[1];
    assert_eq!(aid.name, "Aid");
    assert!(aid.tags.contains("water"));
    assert!((aid.distance_meters - 3_000.0).abs() < 25.0);

    let mut plan = Plan::with_target_time("valley", 3_600.0, PaceMode::Normalized);
    plan.use_grade_adjustment = true;
    plan.default_stoppage_seconds = 90.0;
    let schedule = analyzer
        .pacing_engine()
        .unwrap()
        .schedule(&plan, waypoints.waypoints(), course.profile())
        .unwrap();
    assert!((schedule.total_elapsed_seconds - 3_600.0).abs() < 1e-6);
    assert_eq!(schedule.total_stoppage_seconds, 180.0);
    // Uniform climb: both halves take about the same time
    assert!((schedule.segments[0].elapsed_seconds - schedule.segments[1].elapsed_seconds).abs() < 30.0);

    let csv_path = dir.path().join("schedule.csv");
    export::export_schedule_to_path(&schedule, waypoints.waypoints(), ExportFormat::Csv, &csv_path).unwrap();
    let csv = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().nth(1).unwrap().starts_with("Start,Aid,"));

    let json_path = dir.path().join("schedule.json");
    export::export_schedule_to_path(&schedule, waypoints.waypoints(), ExportFormat::Json, &json_path).unwrap();
    let parsed: coursepace::PacingSchedule = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed.segments.len(), 2);

    let geojson_path = dir.path().join("valley.geojson");
    export::export_course_to_path(&course, waypoints.waypoints(), ExportFormat::GeoJson, &geojson_path).unwrap();
    let reimported = ImportManager::new().import_file(&geojson_path).unwrap();
    assert_eq!(reimported.samples.len(), course.profile().len());
    assert_eq!(reimported.markers.len(), 3);
}

#[test]
fn test_course_override_from_config_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config
        .set_course_override(
            "ridge",
            SmoothingOverride {
                grade_window_meters: Some(250.0),
                ..SmoothingOverride::default()
            },
        )
        .unwrap();
    config.save_to_file(&config_path).unwrap();

    let loaded = AppConfig::load_from_file(&config_path).unwrap();
    let analyzer = CourseAnalyzer::from_config(&loaded);
    let (ridge, _) = analyzer
        .analyze(&CourseInput::new("ridge", "Ridge", "", straight_track(3_000.0, 150, |d| 100.0 + d * 0.02)))
        .unwrap();
    let (other, _) = analyzer
        .analyze(&CourseInput::new("other", "Other", "", straight_track(3_000.0, 150, |d| 100.0 + d * 0.02)))
        .unwrap();

    assert_eq!(ridge.smoothing().grade_window_meters, 250.0);
    assert_eq!(other.smoothing(), &loaded.smoothing);
}
