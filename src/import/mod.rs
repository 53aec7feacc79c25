//! Loading raw track samples from files
//!
//! Importers only turn already-extracted positions into [`TrackSample`]s and
//! [`TrackMarker`]s; everything else happens in the analysis pipeline.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::course::CourseInput;
use crate::error::{ImportExportError, Result};
use crate::models::{TrackMarker, TrackSample};

pub mod csv;
pub mod geojson;

/// Parsed content of one track file
#[derive(Debug, Clone, Default)]
pub struct TrackImport {
    /// Track name from the file, if it carries one
    pub name: Option<String>,
    pub samples: Vec<TrackSample>,
    pub markers: Vec<TrackMarker>,
    /// The file content exactly as read
    pub original_content: String,
}

impl TrackImport {
    /// Turn the import into pipeline input for a course.
    pub fn into_course_input(self, course_id: impl Into<String>) -> CourseInput {
        let course_id = course_id.into();
        let name = self.name.unwrap_or_else(|| course_id.clone());
        CourseInput::new(course_id, name, self.original_content, self.samples).with_markers(self.markers)
    }
}

/// Trait for importing track data from different file formats
pub trait ImportFormat: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Parse file content
    fn parse(&self, content: &str) -> Result<TrackImport>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;

    /// Read and parse a file; the file stem names the track when the content doesn't
    fn import_file(&self, file_path: &Path) -> Result<TrackImport> {
        let content = std::fs::read_to_string(file_path)?;
        let mut import = self.parse(&content)?;
        import.original_content = content;
        if import.name.is_none() {
            import.name = file_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok(import)
    }
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(geojson::GeoJsonImporter::new()),
            Box::new(csv::CsvImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, picking the importer by extension
    pub fn import_file(&self, file_path: &Path) -> Result<TrackImport> {
        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportExportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file_path.display().to_string()),
            })?;

        debug!(
            path = %file_path.display(),
            format = importer.get_format_name(),
            "Importing track"
        );
        importer.import_file(file_path)
    }

    /// All files in `dir_path` that some importer accepts, sorted by path
    pub fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir_path)? {
            let path = entry?.path();
            if path.is_file() && self.can_import_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|importer| importer.can_import(file_path))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn has_extension(file_path: &Path, extensions: &[&str]) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoursePaceError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_manager_dispatches_by_extension() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("loop.csv");
        fs::write(&csv_path, "lat,lon,ele\n45.0,6.0,100\n45.001,6.0,101\n").unwrap();
        let json_path = dir.path().join("ridge.geojson");
        fs::write(
            &json_path,
            r#"{"type":"LineString","coordinates":[[6.0,45.0,10],[6.0,45.001,12]]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let manager = ImportManager::new();
        let files = manager.collect_importable_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let csv_import = manager.import_file(&csv_path).unwrap();
        assert_eq!(csv_import.samples.len(), 2);
        assert_eq!(csv_import.name.as_deref(), Some("loop"));
        assert!(csv_import.original_content.starts_with("lat,lon,ele"));

        let json_import = manager.import_file(&json_path).unwrap();
        assert_eq!(json_import.samples[1].elevation_meters, Some(12.0));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = ImportManager::new().import_file(Path::new("track.fit"));
        assert!(matches!(
            result,
            Err(CoursePaceError::ImportExport(ImportExportError::UnsupportedFormat { .. }))
        ));
    }

    #[test]
    fn test_into_course_input_defaults_name() {
        let import = TrackImport {
            samples: vec![TrackSample::new(0, 45.0, 6.0, None)],
            ..TrackImport::default()
        };
        let input = import.into_course_input("c-1");
        assert_eq!(input.name, "c-1");
        assert_eq!(input.samples.len(), 1);
    }
}
