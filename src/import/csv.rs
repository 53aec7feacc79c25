use csv::{ReaderBuilder, Trim};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::warn;

use crate::error::{ImportExportError, Result};
use crate::import::{has_extension, ImportFormat, TrackImport};
use crate::models::{TrackMarker, TrackSample};

const FORMAT: &str = "CSV";

/// CSV importer with flexible column mapping
///
/// Rows are samples; a non-empty `marker` column additionally places a
/// marker at that row's position.
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        // Common column name variations
        Self::add_mapping(&mut column_mapping, "latitude", &["latitude", "lat", "position_lat"]);
        Self::add_mapping(
            &mut column_mapping,
            "longitude",
            &["longitude", "lng", "lon", "long", "position_long"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "elevation",
            &["elevation", "ele", "altitude", "alt", "elev", "height"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sequence",
            &["sequence", "seq", "index", "point", "sequence_index"],
        );
        Self::add_mapping(&mut column_mapping, "marker", &["marker", "waypoint", "poi"]);
        Self::add_mapping(&mut column_mapping, "tags", &["tags", "marker_tags"]);

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_number(value: &str, column: &str, row: usize) -> Result<f64> {
        value.parse::<f64>().map_err(|_| {
            ImportExportError::ParseError {
                format: FORMAT.to_string(),
                reason: format!("row {}: '{}' is not a number in column {}", row, value, column),
            }
            .into()
        })
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, &["csv"])
    }

    fn parse(&self, content: &str) -> Result<TrackImport> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let parse_error = |e: csv::Error| ImportExportError::ParseError {
            format: FORMAT.to_string(),
            reason: e.to_string(),
        };

        // Map headers to standard names
        let columns: HashMap<String, usize> = reader
            .headers()
            .map_err(parse_error)?
            .iter()
            .enumerate()
            .map(|(i, header)| (self.normalize_column_name(header), i))
            .collect();

        let column = |name: &str| -> Result<usize> {
            columns.get(name).copied().ok_or_else(|| {
                ImportExportError::MissingData {
                    field: name.to_string(),
                }
                .into()
            })
        };
        let lat_column = column("latitude")?;
        let lng_column = column("longitude")?;
        let elevation_column = columns.get("elevation").copied();
        let sequence_column = columns.get("sequence").copied();
        let marker_column = columns.get("marker").copied();
        let tags_column = columns.get("tags").copied();

        let mut import = TrackImport::default();
        let mut skipped = 0usize;

        for (row_index, record) in reader.records().enumerate() {
            let record = record.map_err(parse_error)?;
            // Header is line 1
            let row = row_index + 2;
            let field = |index: Option<usize>| index.and_then(|i| record.get(i)).filter(|v| !v.is_empty());

            let (Some(lat), Some(lng)) = (field(Some(lat_column)), field(Some(lng_column))) else {
                skipped += 1;
                continue;
            };
            let lat = Self::parse_number(lat, "latitude", row)?;
            let lng = Self::parse_number(lng, "longitude", row)?;
            let elevation = field(elevation_column)
                .map(|v| Self::parse_number(v, "elevation", row))
                .transpose()?;
            let sequence_index = match field(sequence_column) {
                Some(v) => v.parse::<u64>().map_err(|_| ImportExportError::ParseError {
                    format: FORMAT.to_string(),
                    reason: format!("row {}: '{}' is not a sequence index", row, v),
                })?,
                None => row_index as u64,
            };

            import
                .samples
                .push(TrackSample::new(sequence_index, lat, lng, elevation));

            if let Some(name) = field(marker_column) {
                let tags: BTreeSet<String> = field(tags_column)
                    .map(|v| {
                        v.split([';', '|'])
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_lowercase)
                            .collect()
                    })
                    .unwrap_or_default();
                import.markers.push(TrackMarker {
                    name: name.to_string(),
                    lat,
                    lng,
                    distance_meters: None,
                    tags,
                    icon: None,
                    description: None,
                });
            }
        }

        if skipped > 0 {
            warn!(skipped, "Skipped CSV rows without a position");
        }
        if import.samples.is_empty() {
            return Err(ImportExportError::MissingData {
                field: "track samples".to_string(),
            }
            .into());
        }

        Ok(import)
    }

    fn get_format_name(&self) -> &'static str {
        FORMAT
    }
}
