// src/document/source.rs
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::model::ReportType;
use crate::utils::error::DocumentError;

static FILE_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})").expect("Failed to compile FILE_YEAR_RE"));

/// A report file delivered by the retrieval step, before it is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub path: PathBuf,
    pub year: Option<u32>,
    pub report_type: ReportType,
}

impl DocumentFile {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            year: year_from_file_name(&name),
            report_type: ReportType::from_file_name(&name),
            path,
        }
    }
}

/// Lists the PDF files in `dir`, sorted by file name.
pub fn discover(dir: &Path) -> Result<Vec<DocumentFile>, DocumentError> {
    let mut paths = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect::<Vec<_>>();
    paths.sort();

    tracing::info!("Found {} PDF file(s) in {}", paths.len(), dir.display());
    Ok(paths.into_iter().map(DocumentFile::from_path).collect())
}

/// First four-digit run in 2000..=2030, e.g. `AP2_2024_half_year.pdf` -> 2024.
pub fn year_from_file_name(name: &str) -> Option<u32> {
    FILE_YEAR_RE
        .captures_iter(name)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .find(|year| (2000..=2030).contains(year))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_from_common_file_names() {
        assert_eq!(year_from_file_name("AP2_2024_half_year.pdf"), Some(2024));
        assert_eq!(year_from_file_name("Half-year-Report-2019.pdf"), Some(2019));
        assert_eq!(year_from_file_name("report_1999_9999_2021.pdf"), Some(2021));
        assert_eq!(year_from_file_name("report.pdf"), None);
    }

    #[test]
    fn discovers_only_pdf_files_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        fs::write(dir.path().join("AP2_2024_half_year.pdf"), b"%PDF").expect("write");
        fs::write(dir.path().join("AP2_2023_half_year.PDF"), b"%PDF").expect("write");
        fs::write(dir.path().join("notes.txt"), b"skip").expect("write");

        let files = discover(dir.path()).expect("discovery should succeed");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].year, Some(2023));
        assert_eq!(files[1].year, Some(2024));
        assert!(files.iter().all(|file| file.report_type == ReportType::HalfYear));
    }
}
