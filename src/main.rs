use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use coursepace::export::{self, format_duration, ExportFormat};
use coursepace::logging::init_logging;
use coursepace::{
    AppConfig, CourseAnalyzer, CourseInput, DistanceUnit, ImportManager, PaceMode, PacingStrategy,
    PlacementTarget, Plan, WaypointDetails,
};

/// coursepace - Course Analysis & Pace Planning CLI
///
/// Turns a GPS track into a distance-indexed elevation profile with
/// waypoints, and plans arrival times at every waypoint for a target pace
/// or finish time.
#[derive(Parser)]
#[command(name = "coursepace")]
#[command(author = "coursepace Contributors")]
#[command(version)]
#[command(about = "Course Analysis & Pace Planning CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a track: distance, elevation and waypoints
    Analyze {
        /// Track file (GeoJSON or CSV)
        file: PathBuf,

        /// Write the analyzed course to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (geojson, json, csv, text)
        #[arg(short = 'f', long, default_value = "geojson")]
        format: String,
    },

    /// Compute a pacing schedule for a track
    Plan {
        /// Track file (GeoJSON or CSV)
        file: PathBuf,

        /// Plan file (TOML)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Base pace as m:ss per distance unit
        #[arg(long, conflicts_with = "target")]
        pace: Option<String>,

        /// Target finish time as h:mm:ss
        #[arg(long)]
        target: Option<String>,

        /// Reach the target time with grade-adjusted effort
        #[arg(long, requires = "target")]
        normalized: bool,

        /// Linear split percentage (negative for a negative split)
        #[arg(long, allow_hyphen_values = true)]
        split: Option<i32>,

        /// Adjust pace for grade
        #[arg(short, long)]
        grade: bool,

        /// Stoppage at each waypoint in seconds
        #[arg(long)]
        stoppage: Option<f64>,

        /// Distance unit (km, mi)
        #[arg(short, long)]
        unit: Option<String>,

        /// Start time (YYYY-MM-DDTHH:MM:SS) for arrival times of day
        #[arg(long)]
        start: Option<String>,

        /// Extra waypoint as NAME@DISTANCE in the plan's unit (repeatable)
        #[arg(short, long = "waypoint")]
        waypoints: Vec<String>,

        /// Output format (table, csv, json)
        #[arg(short = 'f', long, default_value = "table")]
        format: String,

        /// Write the schedule to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze every track in a directory
    Batch {
        /// Directory containing track files
        dir: PathBuf,
    },

    /// Configure application settings
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

/// Plan file: a [`Plan`] plus waypoints to place before scheduling
#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(flatten)]
    plan: Plan,

    #[serde(default)]
    waypoints: Vec<PlannedWaypoint>,
}

#[derive(Debug, Deserialize)]
struct PlannedWaypoint {
    name: String,
    /// Distance in the plan's unit
    distance: Option<f64>,
    lat: Option<f64>,
    lng: Option<f64>,
    #[serde(default)]
    tags: Vec<String>,
    stoppage_seconds: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
    let config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    init_logging(&config.logging.clone().with_verbosity(cli.verbose))?;
    debug!(path = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Analyze { file, output, format } => analyze(&config, &file, output.as_deref(), &format),
        Commands::Plan {
            file,
            plan,
            pace,
            target,
            normalized,
            split,
            grade,
            stoppage,
            unit,
            start,
            waypoints,
            format,
            output,
        } => {
            let mut plan_file = match plan {
                Some(path) => load_plan_file(&path)?,
                None if pace.is_some() || target.is_some() => {
                    let mut plan = Plan::with_pace("", 0.0);
                    plan.distance_unit = config.display.distance_unit;
                    PlanFile {
                        plan,
                        waypoints: Vec::new(),
                    }
                }
                None => bail!("Provide a plan file, --pace or --target"),
            };
            let plan = &mut plan_file.plan;
            if let Some(unit) = unit {
                plan.distance_unit = unit.parse::<DistanceUnit>().map_err(anyhow::Error::msg)?;
            }
            if let Some(pace) = pace {
                plan.pace_mode = PaceMode::Pace;
                plan.pace_seconds_per_unit = Some(parse_clock(&pace)?);
            }
            if let Some(target) = target {
                plan.pace_mode = if normalized { PaceMode::Normalized } else { PaceMode::Time };
                plan.target_time_seconds = Some(parse_clock(&target)?);
            }
            if let Some(split) = split {
                plan.pacing_strategy = PacingStrategy::Linear;
                plan.pacing_linear_percent = split;
            }
            plan.use_grade_adjustment |= grade;
            if let Some(stoppage) = stoppage {
                plan.default_stoppage_seconds = stoppage;
            }
            if let Some(start) = start {
                plan.start_time = Some(
                    NaiveDateTime::parse_from_str(&start, "%Y-%m-%dT%H:%M:%S")
                        .with_context(|| format!("Invalid start time: {}", start))?,
                );
            }
            for arg in &waypoints {
                plan_file.waypoints.push(parse_waypoint_arg(arg)?);
            }

            plan_schedule(&config, &file, plan_file, &format, output.as_deref())
        }
        Commands::Batch { dir } => batch(&config, &dir),
        Commands::Config { init } => {
            if init {
                let mut fresh = AppConfig::default();
                fresh.save_to_file(&config_path)?;
                println!(
                    "{}",
                    format!("✓ Wrote default configuration to {}", config_path.display()).green()
                );
            } else {
                println!("{}", format!("# {}", config_path.display()).dimmed());
                println!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

fn load_plan_file(path: &Path) -> Result<PlanFile> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read plan file: {}", path.display()))?;
    let mut plan_file: PlanFile =
        toml::from_str(&content).with_context(|| format!("Failed to parse plan file: {}", path.display()))?;
    if plan_file.plan.id.is_empty() {
        plan_file.plan.id = uuid::Uuid::new_v4().to_string();
    }
    Ok(plan_file)
}

/// `h:mm:ss`, `m:ss` or plain seconds
fn parse_clock(value: &str) -> Result<f64> {
    let mut seconds = 0.0;
    for part in value.split(':') {
        let part: f64 = part
            .trim()
            .parse()
            .with_context(|| format!("Invalid time value: {}", value))?;
        seconds = seconds * 60.0 + part;
    }
    Ok(seconds)
}

/// `NAME@DISTANCE`
fn parse_waypoint_arg(arg: &str) -> Result<PlannedWaypoint> {
    let Some((name, distance)) = arg.rsplit_once('@') else {
        bail!("Waypoint must look like NAME@DISTANCE, got {}", arg);
    };
    let distance: f64 = distance
        .trim()
        .parse()
        .with_context(|| format!("Invalid waypoint distance: {}", arg))?;
    Ok(PlannedWaypoint {
        name: name.trim().to_string(),
        distance: Some(distance),
        lat: None,
        lng: None,
        tags: Vec::new(),
        stoppage_seconds: None,
    })
}

fn load_course_input(path: &Path) -> Result<CourseInput> {
    let import = ImportManager::new()
        .import_file(path)
        .with_context(|| format!("Failed to import {}", path.display()))?;
    let course_id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "course".to_string());
    Ok(import.into_course_input(course_id))
}

fn analyze(config: &AppConfig, file: &Path, output: Option<&Path>, format: &str) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    println!("{}", "Analyzing course...".cyan().bold());

    let analyzer = CourseAnalyzer::from_config(config);
    let (course, waypoints) = analyzer.analyze(&load_course_input(file)?)?;

    export::export_course(&course, waypoints.waypoints(), ExportFormat::Text, std::io::stdout().lock())?;

    if let Some(output) = output {
        export::export_course_to_path(&course, waypoints.waypoints(), format, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("{}", format!("✓ Course written to {}", output.display()).green());
    }
    Ok(())
}

fn plan_schedule(
    config: &AppConfig,
    file: &Path,
    plan_file: PlanFile,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let analyzer = CourseAnalyzer::from_config(config);
    let input = load_course_input(file)?;
    let (course, mut waypoints) = analyzer.analyze(&input)?;

    let PlanFile { mut plan, waypoints: planned } = plan_file;
    plan.course_id = course.id.clone();
    let meters_per_unit = plan.distance_unit.meters_per_unit();

    let locator = course.locator()?;
    for planned in planned {
        let target = match (planned.distance, planned.lat, planned.lng) {
            (Some(distance), _, _) => PlacementTarget::Distance(distance * meters_per_unit),
            (None, Some(lat), Some(lng)) => PlacementTarget::Position { lat, lng },
            _ => bail!("Waypoint {} needs a distance or a lat/lng position", planned.name),
        };
        let mut details = WaypointDetails::named(&planned.name);
        for tag in planned.tags {
            details = details.with_tag(tag);
        }
        let id = waypoints
            .insert(&locator, target, details)
            .with_context(|| format!("Failed to place waypoint {}", planned.name))?;
        if let Some(stoppage) = planned.stoppage_seconds {
            plan.stoppage_overrides.insert(id, stoppage);
        }
    }

    let schedule = analyzer
        .pacing_engine()?
        .schedule(&plan, waypoints.waypoints(), course.profile())?;

    match output {
        Some(path) => {
            export::export_schedule_to_path(&schedule, waypoints.waypoints(), format, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", format!("✓ Schedule written to {}", path.display()).green());
        }
        None => {
            if format == ExportFormat::Text {
                println!("{}", format!("Pacing plan for {}", course.name).blue().bold());
            }
            export::export_schedule(&schedule, waypoints.waypoints(), format, std::io::stdout().lock())?;
        }
    }

    if format == ExportFormat::Text || output.is_some() {
        println!(
            "{}",
            format!("✓ Finish in {}", format_duration(schedule.total_elapsed_seconds)).blue()
        );
    }
    Ok(())
}

fn batch(config: &AppConfig, dir: &Path) -> Result<()> {
    let manager = ImportManager::new();
    let files = manager
        .collect_importable_files(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    if files.is_empty() {
        println!("{}", "No track files found".yellow());
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut inputs = Vec::with_capacity(files.len());
    let mut failures = Vec::new();
    for path in &files {
        pb.set_message(path.display().to_string());
        match load_course_input(path) {
            Ok(input) => inputs.push(input),
            Err(e) => failures.push((path.clone(), e)),
        }
        pb.inc(1);
    }
    pb.finish_with_message("imported");

    let analyzer = CourseAnalyzer::from_config(config);
    let unit = config.display.distance_unit;
    println!("{}", format!("Analyzing {} courses...", inputs.len()).cyan().bold());

    for (input, result) in inputs.iter().zip(analyzer.analyze_batch(&inputs)) {
        match result {
            Ok((course, waypoints)) => {
                let metrics = course.metrics();
                println!(
                    "  {} {:>8.2} {}  {}  {} waypoints",
                    course.name.bold(),
                    metrics.total_distance_meters / unit.meters_per_unit(),
                    unit.abbreviation(),
                    match (metrics.elevation_gain_meters, metrics.elevation_loss_meters) {
                        (Some(gain), Some(loss)) => format!("+{:.0} m / -{:.0} m", gain, loss),
                        _ => "no elevation".to_string(),
                    },
                    waypoints.len()
                );
            }
            Err(e) => println!("  {} {}", input.name.red(), e.user_message()),
        }
    }
    for (path, error) in &failures {
        println!("  {} {:#}", path.display().to_string().red(), error);
    }

    println!("{}", "✓ Batch analysis completed".green());
    Ok(())
}
