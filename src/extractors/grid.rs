// src/extractors/grid.rs
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::document::{Page, Rule};
use crate::utils::error::ExtractError;

/// Minimum score a candidate grid needs before the resolver trusts it.
pub const GRID_FLOOR: i32 = 30;
/// Statements are long; shorter candidates earn no row-count credit.
pub const MIN_ROWS: usize = 10;

const EDGE_TOLERANCE: f32 = 2.5;
const MAX_WORDS_PER_ROW: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GridOrigin {
    /// Cells bounded by drawn rulings.
    Lattice,
    /// Columns aligned by whitespace only.
    Stream,
}

impl fmt::Display for GridOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridOrigin::Lattice => f.write_str("lattice"),
            GridOrigin::Stream => f.write_str("stream"),
        }
    }
}

/// Rows of cell strings produced by exactly one detection strategy. Rows may be ragged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub origin: GridOrigin,
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn column_count(&self) -> usize {
        modal_width(&self.rows)
    }

    pub fn to_tsv(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredGrid {
    pub grid: Grid,
    pub score: i32,
}

/// Content-shape score: long tables, a label column plus at least two periods,
/// and balance-sheet vocabulary in the cells.
pub fn score_grid(grid: &Grid) -> i32 {
    let mut score = 0;
    if grid.rows.len() > MIN_ROWS {
        score += 10;
    }
    if grid.column_count() >= 3 {
        score += 10;
    }

    let text = grid
        .rows
        .iter()
        .flatten()
        .map(|cell| cell.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    for (keyword, weight) in [("listed", 15), ("assets", 10), ("liabilities", 10), ("fund capital", 10)] {
        if text.contains(keyword) {
            score += weight;
        }
    }
    score
}

/// Candidate grids for a page. Ruled detection runs first; whitespace detection only
/// runs when it finds nothing, so the two are never mixed.
pub fn candidate_grids(page: &Page) -> Vec<Grid> {
    let lattice = detect_lattice(page);
    if !lattice.is_empty() {
        tracing::debug!("Page {}: {} ruled table(s)", page.number, lattice.len());
        return lattice;
    }
    let stream = detect_stream(page);
    tracing::debug!("Page {}: {} whitespace table(s)", page.number, stream.len());
    stream
}

/// Picks the highest-scoring candidate; the earliest wins a tie.
pub fn select_grid(page: &Page) -> Result<ScoredGrid, ExtractError> {
    let mut best: Option<ScoredGrid> = None;
    for grid in candidate_grids(page) {
        let score = score_grid(&grid);
        tracing::debug!(
            "{} grid with {} rows x {} cols scored {}",
            grid.origin,
            grid.rows.len(),
            grid.column_count(),
            score
        );
        if best.as_ref().map_or(true, |current| score > current.score) {
            best = Some(ScoredGrid { grid, score });
        }
    }

    match best {
        Some(found) if found.score >= GRID_FLOOR => Ok(found),
        other => Err(ExtractError::NoGrid {
            page: page.number,
            best_score: other.map_or(0, |found| found.score),
        }),
    }
}

/// Tables bounded by rulings: connected sets of horizontal and vertical rules define
/// row and column bands, and each text fragment lands in the cell holding its centre.
pub fn detect_lattice(page: &Page) -> Vec<Grid> {
    let mut grids = Vec::new();
    for region in rule_regions(&page.rules) {
        let row_edges = merge_edges(region.iter().filter(|r| r.is_horizontal()).map(|r| r.y1));
        let col_edges = merge_edges(region.iter().filter(|r| r.is_vertical()).map(|r| r.x1));
        if row_edges.len() < 3 || col_edges.len() < 3 {
            continue;
        }

        let mut cells = vec![vec![String::new(); col_edges.len() - 1]; row_edges.len() - 1];
        for fragment in page.fragments() {
            let centre_y = fragment.y - fragment.font_size * 0.35;
            let centre_x = fragment.x + (fragment.font_size * 0.25).min(fragment.width / 2.0);
            let (Some(row), Some(col)) = (band(&row_edges, centre_y), band(&col_edges, centre_x)) else {
                continue;
            };
            let cell = &mut cells[row][col];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(fragment.text.trim());
        }

        let rows = cells
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect::<Vec<_>>();
        if rows.len() >= 2 {
            grids.push(Grid {
                origin: GridOrigin::Lattice,
                rows,
            });
        }
    }
    grids
}

/// Tables without rulings: consecutive lines that split into two or more cells on
/// double-space gaps. Single-cell label lines ("Liabilities") may sit inside a table;
/// sentence-like lines end it.
pub fn detect_stream(page: &Page) -> Vec<Grid> {
    let mut grids = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();
    let mut pending: Vec<Vec<String>> = Vec::new();

    let flush = |current: &mut Vec<Vec<String>>, grids: &mut Vec<Grid>| {
        while current.last().is_some_and(|row| row.len() < 2) {
            current.pop();
        }
        if current.iter().filter(|row| row.len() >= 2).count() >= 2 {
            grids.push(Grid {
                origin: GridOrigin::Stream,
                rows: std::mem::take(current),
            });
        } else {
            current.clear();
        }
    };

    for line in &page.lines {
        let cells = split_line_into_cells(&line.text);
        if cells.is_empty() {
            continue;
        }
        if looks_like_sentence(&line.text) {
            flush(&mut current, &mut grids);
            pending.clear();
            continue;
        }

        if cells.len() >= 2 {
            if current.is_empty() {
                current.append(&mut pending);
            }
            current.push(cells);
        } else if current.is_empty() {
            pending.push(cells);
        } else {
            current.push(cells);
        }
    }

    flush(&mut current, &mut grids);
    grids
}

/// Splits on tabs and runs of two or more spaces.
pub fn split_line_into_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut whitespace_run = 0_usize;

    for ch in trimmed.chars() {
        if ch == '\t' {
            if !current.trim().is_empty() {
                cells.push(current.trim().to_string());
                current.clear();
            }
            whitespace_run = 0;
            continue;
        }

        if ch.is_whitespace() {
            whitespace_run += 1;
            if whitespace_run >= 2 {
                if !current.trim().is_empty() {
                    cells.push(current.trim().to_string());
                    current.clear();
                }
                continue;
            }
            current.push(' ');
            continue;
        }

        whitespace_run = 0;
        current.push(ch);
    }

    if !current.trim().is_empty() {
        cells.push(current.trim().to_string());
    }

    cells
}

pub fn modal_width(rows: &[Vec<String>]) -> usize {
    let mut freq = HashMap::new();
    for width in rows.iter().map(Vec::len) {
        *freq.entry(width).or_insert(0_usize) += 1;
    }

    freq.into_iter()
        .max_by_key(|(width, count)| (*count, *width))
        .map_or(0, |(width, _)| width)
}

fn looks_like_sentence(line: &str) -> bool {
    let trimmed = line.trim_end();
    ['.', '!', '?'].iter().any(|punctuation| trimmed.ends_with(*punctuation))
        || trimmed.split_whitespace().count() > MAX_WORDS_PER_ROW
}

fn band(edges: &[f32], value: f32) -> Option<usize> {
    edges.windows(2).position(|pair| value >= pair[0] && value < pair[1])
}

fn merge_edges(values: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut values = values.collect::<Vec<_>>();
    values.sort_by(f32::total_cmp);
    let mut merged: Vec<f32> = Vec::new();
    for value in values {
        match merged.last() {
            Some(last) if value - last <= EDGE_TOLERANCE => {}
            _ => merged.push(value),
        }
    }
    merged
}

fn touches(a: &Rule, b: &Rule) -> bool {
    let (horizontal, vertical) = match (a.is_horizontal(), b.is_horizontal()) {
        (true, false) => (a, b),
        (false, true) => (b, a),
        _ => return false,
    };
    vertical.x1 >= horizontal.x1 - EDGE_TOLERANCE
        && vertical.x1 <= horizontal.x2 + EDGE_TOLERANCE
        && horizontal.y1 >= vertical.y1 - EDGE_TOLERANCE
        && horizontal.y1 <= vertical.y2 + EDGE_TOLERANCE
}

/// Groups rules into connected regions (a horizontal and a vertical rule connect when they cross or meet).
fn rule_regions(rules: &[Rule]) -> Vec<Vec<Rule>> {
    let mut parent = (0..rules.len()).collect::<Vec<_>>();
    fn root(parent: &mut [usize], mut index: usize) -> usize {
        while parent[index] != index {
            parent[index] = parent[parent[index]];
            index = parent[index];
        }
        index
    }

    for i in 0..rules.len() {
        for j in (i + 1)..rules.len() {
            if touches(&rules[i], &rules[j]) {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut regions: Vec<(usize, Vec<Rule>)> = Vec::new();
    for (index, rule) in rules.iter().enumerate() {
        let key = root(&mut parent, index);
        match regions.iter_mut().find(|(region, _)| *region == key) {
            Some((_, members)) => members.push(*rule),
            None => regions.push((key, vec![*rule])),
        }
    }
    regions.into_iter().map(|(_, members)| members).collect()
}
