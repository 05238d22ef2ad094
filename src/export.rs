//! PNG export of the mounted flowchart.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::flowchart::VectorDocument;
use crate::raster::{RasterError, RasterSize, Rasterizer, encode_png};

/// Name every export is written under.
pub const EXPORT_FILE_NAME: &str = "flowchart.png";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No flowchart to download. Please render a flowchart first.")]
    NothingToExport,
    #[error("{0}")]
    Rasterize(RasterError),
    #[error("{0}")]
    Encode(RasterError),
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    /// Text for the blocking alert shown to the user.
    pub fn alert_message(&self) -> String {
        match self {
            Self::NothingToExport => self.to_string(),
            other => format!("Failed to download PNG: {other}"),
        }
    }
}

/// Where exported files end up.
pub trait ExportSink {
    /// Persist `bytes` under `file_name`, returning where they went.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Writes exports into a directory, replacing any earlier file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for DirectorySink {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ExportSink for DirectorySink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Rasterize the mounted document and hand it to `sink` as `flowchart.png`.
///
/// # Errors
///
/// [`ExportError::NothingToExport`] when no diagram is mounted (the sink is
/// not called); otherwise the failing stage.
pub fn export_png(
    document: Option<&VectorDocument>,
    rasterizer: &dyn Rasterizer,
    sink: &mut dyn ExportSink,
    scale: f32,
) -> Result<PathBuf, ExportError> {
    let Some(document) = document else {
        return Err(ExportError::NothingToExport);
    };
    let _scope = crate::perf::scope("export.png");

    let image = rasterizer
        .rasterize(&document.svg, RasterSize::Scale(scale))
        .map_err(ExportError::Rasterize)?;
    let bytes = encode_png(&image).map_err(ExportError::Encode)?;
    let path = sink
        .save(EXPORT_FILE_NAME, &bytes)
        .map_err(|source| ExportError::Write {
            path: PathBuf::from(EXPORT_FILE_NAME),
            source,
        })?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "exported flowchart");
    crate::perf::log_event(
        "export.png",
        format!("path={} bytes={}", path.display(), bytes.len()),
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::flowchart::{StyleConfig, render_to_svg};
    use crate::raster::ResvgRasterizer;

    #[derive(Default)]
    struct RecordingSink {
        saved: Vec<(String, usize)>,
    }

    impl ExportSink for RecordingSink {
        fn save(&mut self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
            self.saved.push((file_name.to_string(), bytes.len()));
            Ok(PathBuf::from(file_name))
        }
    }

    struct FailingSink;

    impl ExportSink for FailingSink {
        fn save(&mut self, _file_name: &str, _bytes: &[u8]) -> io::Result<PathBuf> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    fn document() -> VectorDocument {
        render_to_svg("st=>start: Start\ne=>end: End\nst->e", &StyleConfig::default()).unwrap()
    }

    #[test]
    fn test_nothing_mounted_does_not_touch_sink() {
        let mut sink = RecordingSink::default();
        let err = export_png(None, &ResvgRasterizer::without_fonts(), &mut sink, 1.0).unwrap_err();
        assert!(matches!(err, ExportError::NothingToExport));
        assert_eq!(
            err.alert_message(),
            "No flowchart to download. Please render a flowchart first."
        );
        assert!(sink.saved.is_empty());
    }

    #[test]
    fn test_export_saves_once_as_flowchart_png() {
        let mut sink = RecordingSink::default();
        let doc = document();
        export_png(Some(&doc), &ResvgRasterizer::without_fonts(), &mut sink, 1.0).unwrap();
        assert_eq!(sink.saved.len(), 1);
        assert_eq!(sink.saved[0].0, EXPORT_FILE_NAME);
        assert!(sink.saved[0].1 > 0);
    }

    #[test]
    fn test_invalid_svg_reports_failure() {
        let mut sink = RecordingSink::default();
        let mut doc = document();
        doc.svg = "<not-svg".to_string();
        let err =
            export_png(Some(&doc), &ResvgRasterizer::without_fonts(), &mut sink, 1.0).unwrap_err();
        assert!(err.alert_message().starts_with("Failed to download PNG: "));
        assert!(sink.saved.is_empty());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let doc = document();
        let err = export_png(Some(&doc), &ResvgRasterizer::without_fonts(), &mut FailingSink, 1.0)
            .unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
        assert!(err.alert_message().contains("read-only"));
    }

    #[test]
    fn test_directory_sink_overwrites() {
        let dir = tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("out"));
        sink.save(EXPORT_FILE_NAME, b"first").unwrap();
        let path = sink.save(EXPORT_FILE_NAME, b"second").unwrap();
        assert_eq!(path, dir.path().join("out").join(EXPORT_FILE_NAME));
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }
}
