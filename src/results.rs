//! # Results
//!
//! View model for the results screen: what to show while the store is loading, the "nothing
//! here" state, per-file and total savings, and the two download paths (one file, or every
//! file in a single zip archive).

use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::{ReduceError, ReduceResult};
use crate::format::{format_bytes, format_size};
use crate::model::CompressedResult;
use crate::store::StoreView;

/// File name of the archive produced by "download all".
pub const ARCHIVE_NAME: &str = "Reduced-Images.zip";

pub const EMPTY_TITLE: &str = "No Compressed Images Found";
pub const EMPTY_MESSAGE: &str = "Your session has expired or no images were compressed.";

/// Totals over a result collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub count: usize,
    pub total_original: u64,
    pub total_new: u64,
}

impl ResultSummary {
    pub fn of(results: &[CompressedResult]) -> Self {
        results.iter().fold(Self::default(), |acc, r| Self {
            count: acc.count + 1,
            total_original: acc.total_original + r.original_size,
            total_new: acc.total_new + r.new_size,
        })
    }

    /// Bytes saved overall; negative when the batch grew.
    pub fn saved(&self) -> i64 {
        self.total_original as i64 - self.total_new as i64
    }

    /// Saving as a share of the original total, 0 when nothing was saved.
    pub fn percent_saved(&self) -> f64 {
        if self.total_original == 0 || self.saved() <= 0 {
            return 0.0;
        }
        self.saved() as f64 * 100.0 / self.total_original as f64
    }

    /// Human-readable saving, `0 Bytes` when the batch did not shrink.
    pub fn savings_text(&self) -> String {
        format_bytes(self.saved(), 2)
    }
}

/// What the results screen shows.
#[derive(Debug, PartialEq)]
pub enum ResultsView<'a> {
    /// Stored results have not been checked yet.
    Loading,
    /// Checked, and there is nothing to show.
    Empty,
    Ready {
        results: &'a [CompressedResult],
        summary: ResultSummary,
    },
}

impl<'a> ResultsView<'a> {
    pub fn from_store(view: StoreView<'a>) -> Self {
        match view {
            StoreView::Loading => ResultsView::Loading,
            StoreView::Loaded([]) => ResultsView::Empty,
            StoreView::Loaded(results) => ResultsView::Ready {
                results,
                summary: ResultSummary::of(results),
            },
        }
    }
}

/// One line per result: `name: original -> new`.
pub fn describe(result: &CompressedResult) -> String {
    format!(
        "{}: {} -> {}",
        result.name,
        format_size(result.original_size),
        format_size(result.new_size)
    )
}

/// Look up a result by its position in the collection.
pub fn get(results: &[CompressedResult], index: usize) -> ReduceResult<&CompressedResult> {
    results.get(index).ok_or_else(|| {
        ReduceError::validation(
            "index",
            format!("must be below {}", results.len()),
            index.to_string(),
        )
    })
}

/// Write one result's bytes into `dir` under its stored name.
///
/// Only the final path component of the stored name is used, so a result can never write
/// outside `dir`.
pub fn save_one(result: &CompressedResult, dir: &Path) -> ReduceResult<PathBuf> {
    let file_name = Path::new(&result.name)
        .file_name()
        .ok_or_else(|| ReduceError::validation("name", "must name a file", result.name.clone()))?;
    let bytes = result.bytes()?;
    fs::create_dir_all(dir).map_err(|e| ReduceError::io_at("create output dir", dir, e))?;
    let path = dir.join(file_name);
    fs::write(&path, &bytes).map_err(|e| ReduceError::io_at("write result", &path, e))?;
    info!(path = %path.display(), size = bytes.len(), "saved result");
    Ok(path)
}

/// Deflate every result into a zip archive written to `writer`, one entry per result named by
/// its stored file name. Names are used as-is; duplicates are not renamed.
pub fn write_archive<W: Write + Seek>(results: &[CompressedResult], writer: W) -> ReduceResult<W> {
    let mut zip = zip::ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for result in results {
        let bytes = result.bytes()?;
        zip.start_file(result.name.as_str(), options)
            .map_err(|e| ReduceError::archive(Some(result.name.clone()), e.to_string()))?;
        zip.write_all(&bytes)
            .map_err(|e| ReduceError::archive(Some(result.name.clone()), e.to_string()))?;
        debug!(entry = %result.name, size = bytes.len(), "added archive entry");
    }
    Ok(zip.finish()?)
}

/// Write the archive to `out`. A directory (existing, or `out` ending in a separator) receives
/// [`ARCHIVE_NAME`]; anything else is taken as the archive path.
pub fn export_archive(results: &[CompressedResult], out: &Path) -> ReduceResult<PathBuf> {
    if results.is_empty() {
        return Err(ReduceError::archive(None, "no results to export")
            .with_recovery_suggestion("Run `reduce compress` first"));
    }
    let path = if out.is_dir() || out.as_os_str().to_string_lossy().ends_with(std::path::MAIN_SEPARATOR) {
        out.join(ARCHIVE_NAME)
    } else {
        out.to_path_buf()
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ReduceError::io_at("create output dir", parent, e))?;
    }
    let file = File::create(&path).map_err(|e| ReduceError::io_at("create archive", &path, e))?;
    let file = write_archive(results, file)?;
    file.sync_all()
        .map_err(|e| ReduceError::io_at("flush archive", &path, e))?;
    info!(path = %path.display(), entries = results.len(), "exported archive");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, original: u64, bytes: &[u8]) -> CompressedResult {
        CompressedResult::new(name, "image/jpeg", original, bytes)
    }

    #[test]
    fn test_view_states() {
        assert_eq!(ResultsView::from_store(StoreView::Loading), ResultsView::Loading);
        assert_eq!(ResultsView::from_store(StoreView::Loaded(&[])), ResultsView::Empty);

        let results = vec![result("a.jpg", 4096, &[0; 1024]), result("b.jpg", 2048, &[0; 1024])];
        match ResultsView::from_store(StoreView::Loaded(&results)) {
            ResultsView::Ready { results, summary } => {
                assert_eq!(results.len(), 2);
                assert_eq!(summary.count, 2);
                assert_eq!(summary.total_original, 6144);
                assert_eq!(summary.total_new, 2048);
                assert_eq!(summary.savings_text(), "4 KB");
            }
            other => panic!("expected ready view, got {:?}", other),
        }
    }

    #[test]
    fn test_growth_shows_zero_savings() {
        let summary = ResultSummary::of(&[result("a.jpg", 10, &[0; 20])]);
        assert_eq!(summary.saved(), -10);
        assert_eq!(summary.savings_text(), "0 Bytes");
        assert_eq!(summary.percent_saved(), 0.0);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&result("a.jpg", 2048, &[0; 512])), "a.jpg: 2 KB -> 512 Bytes");
    }

    #[test]
    fn test_get_out_of_range() {
        let results = vec![result("a.jpg", 1, b"x")];
        assert!(get(&results, 0).is_ok());
        assert!(get(&results, 1).is_err());
    }

    #[test]
    fn test_save_one_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_one(&result("../../escape.jpg", 10, b"data"), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("escape.jpg"));
        assert_eq!(fs::read(path).unwrap(), b"data");
    }
}
