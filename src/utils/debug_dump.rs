// src/utils/debug_dump.rs
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::document::Page;
use crate::extractors::ScoredGrid;
use crate::utils::error::AppError;

fn year_dir(debug_dir: &Path, year: u32) -> Result<PathBuf, AppError> {
    let dir = debug_dir.join(year.to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Saves a page's text lines with their positions, one line per row: `y<TAB>x<TAB>text`.
pub fn save_page_lines(debug_dir: &Path, year: u32, label: &str, page: &Page) -> Result<PathBuf, AppError> {
    let path = year_dir(debug_dir, year)?.join(format!("{}_page{}_lines.txt", label, page.number));
    let mut file = File::create(&path)?;
    for line in &page.lines {
        writeln!(file, "{:.1}\t{:.1}\t{}", line.y, line.x, line.text)?;
    }
    tracing::info!("Saved debug page lines to {}", path.display());
    Ok(path)
}

/// Saves the selected grid as tab-separated rows under a `# origin=... score=...` header.
pub fn save_grid(
    debug_dir: &Path,
    year: u32,
    label: &str,
    page_number: u32,
    selected: &ScoredGrid,
) -> Result<PathBuf, AppError> {
    let path = year_dir(debug_dir, year)?.join(format!("{}_page{}_grid.tsv", label, page_number));
    let mut file = File::create(&path)?;
    writeln!(file, "# origin={} score={}", selected.grid.origin, selected.score)?;
    file.write_all(selected.grid.to_tsv().as_bytes())?;
    file.write_all(b"\n")?;
    tracing::info!("Saved debug grid to {}", path.display());
    Ok(path)
}
