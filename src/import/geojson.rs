use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::error::{ImportExportError, Result};
use crate::import::{has_extension, ImportFormat, TrackImport};
use crate::models::{TrackMarker, TrackSample};

const FORMAT: &str = "GeoJSON";

/// GeoJSON importer
///
/// LineString and MultiLineString geometries become samples in document
/// order (positions are `[lng, lat, ele?]`); Point features become markers
/// named by their `name` property.
#[derive(Debug, Default)]
pub struct GeoJsonImporter;

impl GeoJsonImporter {
    pub fn new() -> Self {
        Self
    }

    fn parse_error(reason: impl Into<String>) -> ImportExportError {
        ImportExportError::ParseError {
            format: FORMAT.to_string(),
            reason: reason.into(),
        }
    }

    fn visit(&self, value: &Value, properties: Option<&Map<String, Value>>, import: &mut TrackImport) -> Result<()> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Self::parse_error("object without a \"type\""))?;

        match kind {
            "FeatureCollection" => {
                let features = value
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Self::parse_error("FeatureCollection without \"features\""))?;
                for feature in features {
                    self.visit(feature, None, import)?;
                }
            }
            "Feature" => {
                let properties = value.get("properties").and_then(Value::as_object);
                if let Some(geometry) = value.get("geometry").filter(|g| !g.is_null()) {
                    self.visit(geometry, properties, import)?;
                }
            }
            "GeometryCollection" => {
                let geometries = value
                    .get("geometries")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Self::parse_error("GeometryCollection without \"geometries\""))?;
                for geometry in geometries {
                    self.visit(geometry, properties, import)?;
                }
            }
            "LineString" => {
                self.take_name(properties, import);
                self.push_line(coordinates(value)?, import)?;
            }
            "MultiLineString" => {
                self.take_name(properties, import);
                let lines = coordinates(value)?
                    .as_array()
                    .ok_or_else(|| Self::parse_error("MultiLineString coordinates must be an array"))?;
                for line in lines {
                    self.push_line(line, import)?;
                }
            }
            "Point" => {
                let (lat, lng, _) = position(coordinates(value)?)?;
                import.markers.push(marker_from(properties, lat, lng));
            }
            other => debug!(geometry = other, "Ignoring GeoJSON geometry"),
        }
        Ok(())
    }

    fn take_name(&self, properties: Option<&Map<String, Value>>, import: &mut TrackImport) {
        if import.name.is_none() {
            import.name = string_property(properties, "name");
        }
    }

    fn push_line(&self, line: &Value, import: &mut TrackImport) -> Result<()> {
        let positions = line
            .as_array()
            .ok_or_else(|| Self::parse_error("LineString coordinates must be an array"))?;
        for coordinate in positions {
            let (lat, lng, elevation) = position(coordinate)?;
            let sequence_index = import.samples.len() as u64;
            import
                .samples
                .push(TrackSample::new(sequence_index, lat, lng, elevation));
        }
        Ok(())
    }
}

fn coordinates(geometry: &Value) -> Result<&Value> {
    geometry
        .get("coordinates")
        .ok_or_else(|| GeoJsonImporter::parse_error("geometry without \"coordinates\"").into())
}

/// `[lng, lat, ele?]` to `(lat, lng, ele)`
fn position(value: &Value) -> Result<(f64, f64, Option<f64>)> {
    let numbers = value
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| GeoJsonImporter::parse_error(format!("invalid position: {}", value)))?;
    let number = |i: usize| numbers.get(i).and_then(Value::as_f64);

    match (number(0), number(1)) {
        (Some(lng), Some(lat)) => Ok((lat, lng, number(2))),
        _ => Err(GeoJsonImporter::parse_error(format!("invalid position: {}", value)).into()),
    }
}

fn string_property(properties: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    properties?
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn marker_from(properties: Option<&Map<String, Value>>, lat: f64, lng: f64) -> TrackMarker {
    let tags: BTreeSet<String> = match properties.and_then(|p| p.get("tags")) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_lowercase).collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect(),
        _ => BTreeSet::new(),
    };

    TrackMarker {
        name: string_property(properties, "name").unwrap_or_else(|| "Marker".to_string()),
        lat,
        lng,
        distance_meters: properties
            .and_then(|p| p.get("distance_meters"))
            .and_then(Value::as_f64),
        tags,
        icon: string_property(properties, "icon"),
        description: string_property(properties, "description"),
    }
}

impl ImportFormat for GeoJsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, &["geojson", "json"])
    }

    fn parse(&self, content: &str) -> Result<TrackImport> {
        let value: Value = serde_json::from_str(content).map_err(|e| Self::parse_error(e.to_string()))?;

        let mut import = TrackImport::default();
        self.visit(&value, None, &mut import)?;

        if import.samples.is_empty() {
            return Err(ImportExportError::MissingData {
                field: "LineString geometry".to_string(),
            }
            .into());
        }
        Ok(import)
    }

    fn get_format_name(&self) -> &'static str {
        FORMAT
    }
}
