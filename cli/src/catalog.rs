use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use vsegment_engine::Segment;

/// Persists the segment list of one track.
pub trait CatalogWriter: Send + Sync {
    /// Write the catalog and return where it went.
    fn write(
        &self,
        source: &Path,
        duration_secs: u32,
        segments: &[Segment],
    ) -> Result<PathBuf, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Catalog {
    pub source: String,
    pub duration_ms: i64,
    /// RFC 3339, UTC.
    pub created_at: String,
    pub segments: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub index: u32,
    pub start_ms: i64,
    pub duration_ms: i64,
}

impl From<&Segment> for CatalogEntry {
    fn from(s: &Segment) -> Self {
        Self {
            id: format!("segment-{}", s.index),
            index: s.index,
            start_ms: s.start_ms,
            duration_ms: s.duration_ms,
        }
    }
}

/// Writes `<dir>/<track-stem>.segments.json`.
pub struct JsonCatalogWriter {
    dir: PathBuf,
}

impl JsonCatalogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        self.dir.join(format!("{stem}.segments.json"))
    }
}

impl CatalogWriter for JsonCatalogWriter {
    fn write(
        &self,
        source: &Path,
        duration_secs: u32,
        segments: &[Segment],
    ) -> Result<PathBuf, CatalogError> {
        let catalog = Catalog {
            source: source.display().to_string(),
            duration_ms: i64::from(duration_secs) * 1000,
            created_at: chrono::Utc::now().to_rfc3339(),
            segments: segments.iter().map(CatalogEntry::from).collect(),
        };

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(source);
        std::fs::write(&path, serde_json::to_vec_pretty(&catalog)?)?;

        info!(
            path = path.display().to_string(),
            segments = catalog.segments.len(),
            "catalog written"
        );
        Ok(path)
    }
}
