// src/document/model.rs
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Average glyph advance as a fraction of the font size, used when no font metrics are read.
pub const AVERAGE_GLYPH_WIDTH: f32 = 0.5;

/// Statement-type tag of a report release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ReportType {
    Annual,
    HalfYear,
    YearEnd,
}

impl ReportType {
    /// Derives the tag from a file name; anything without a half-year or year-end marker is annual.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("half") || lower.contains("interim") {
            ReportType::HalfYear
        } else if ["year_end", "year-end", "yearend", "year end"]
            .iter()
            .any(|marker| lower.contains(marker))
        {
            ReportType::YearEnd
        } else {
            ReportType::Annual
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportType::Annual => "annual",
            ReportType::HalfYear => "half-year",
            ReportType::YearEnd => "year-end",
        };
        f.write_str(name)
    }
}

/// A run of text drawn at one position. Coordinates are top-down page units.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub text: String,
}

impl TextFragment {
    pub fn new(x: f32, y: f32, font_size: f32, text: impl Into<String>) -> Self {
        let text = text.into();
        let width = estimate_width(&text, font_size);
        Self {
            x,
            y,
            width,
            font_size,
            text,
        }
    }

    /// Horizontal position of the character at `char_index`, interpolated across the fragment.
    pub fn x_at(&self, char_index: usize) -> f32 {
        let chars = self.text.chars().count();
        if chars == 0 {
            return self.x;
        }
        self.x + self.width * (char_index as f32 / chars as f32)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

pub fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVERAGE_GLYPH_WIDTH
}

/// A straight ruling segment drawn on the page (table border candidate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rule {
    /// Builds a rule with ordered endpoints (left to right, top to bottom).
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn is_horizontal(&self) -> bool {
        (self.y2 - self.y1).abs() <= RULE_THICKNESS && (self.x2 - self.x1) > RULE_THICKNESS
    }

    pub fn is_vertical(&self) -> bool {
        (self.x2 - self.x1).abs() <= RULE_THICKNESS && (self.y2 - self.y1) > RULE_THICKNESS
    }
}

/// Segments thinner than this are treated as lines rather than filled areas.
pub const RULE_THICKNESS: f32 = 2.0;

/// Fragments sharing a baseline, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub fragments: Vec<TextFragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-indexed position in the document.
    pub number: u32,
    pub lines: Vec<TextLine>,
    pub rules: Vec<Rule>,
}

impl Page {
    pub fn from_fragments(number: u32, fragments: Vec<TextFragment>, rules: Vec<Rule>) -> Self {
        Self {
            number,
            lines: group_into_lines(fragments),
            rules,
        }
    }

    /// Builds a page from plain text, one fragment per line, without rules.
    pub fn from_text(number: u32, text: &str) -> Self {
        let fragments = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                TextFragment::new(0.0, index as f32 * PLAIN_LINE_HEIGHT, PLAIN_FONT_SIZE, line.trim_end())
            })
            .collect();
        Self::from_fragments(number, fragments, Vec::new())
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn fragments(&self) -> impl Iterator<Item = &TextFragment> {
        self.lines.iter().flat_map(|line| line.fragments.iter())
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|line| line.text.trim().is_empty())
    }
}

const PLAIN_LINE_HEIGHT: f32 = 14.0;
const PLAIN_FONT_SIZE: f32 = 10.0;

/// One ingested report file. Immutable once read.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub year: u32,
    pub report_type: ReportType,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.iter().find(|page| page.number == number)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Groups fragments into lines by baseline proximity and joins their text.
/// Gaps of at least one em become a double space so column boundaries stay visible.
pub fn group_into_lines(mut fragments: Vec<TextFragment>) -> Vec<TextLine> {
    fragments.retain(|fragment| !fragment.text.trim().is_empty());
    fragments.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut groups: Vec<Vec<TextFragment>> = Vec::new();
    for fragment in fragments {
        let joins_last = groups.last().is_some_and(|group| {
            let anchor = &group[0];
            let tolerance = (anchor.font_size.max(fragment.font_size) * 0.4).max(2.0);
            (fragment.y - anchor.y).abs() <= tolerance
        });
        match groups.last_mut() {
            Some(group) if joins_last => group.push(fragment),
            _ => groups.push(vec![fragment]),
        }
    }

    groups
        .into_iter()
        .map(|mut group| {
            group.sort_by(|a, b| a.x.total_cmp(&b.x));
            let mut text = String::new();
            for (index, fragment) in group.iter().enumerate() {
                if index > 0 {
                    let previous = &group[index - 1];
                    let gap = fragment.x - previous.right();
                    if gap >= previous.font_size {
                        text.push_str("  ");
                    } else if gap > previous.font_size * 0.1
                        && !text.ends_with(' ')
                        && !fragment.text.starts_with(' ')
                    {
                        text.push(' ');
                    }
                }
                text.push_str(&fragment.text);
            }
            TextLine {
                x: group[0].x,
                y: group[0].y,
                text: text.trim().to_string(),
                fragments: group,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_type_from_file_name() {
        assert_eq!(ReportType::from_file_name("AP2_2024_half_year.pdf"), ReportType::HalfYear);
        assert_eq!(ReportType::from_file_name("AP2_2019_year_end.pdf"), ReportType::YearEnd);
        assert_eq!(ReportType::from_file_name("AP2-Annual-Report-2022.pdf"), ReportType::Annual);
    }

    #[test]
    fn groups_fragments_on_shared_baseline() {
        let lines = group_into_lines(vec![
            TextFragment::new(300.0, 100.5, 10.0, "184 676"),
            TextFragment::new(50.0, 100.0, 10.0, "Listed"),
            TextFragment::new(50.0, 120.0, 10.0, "Unlisted"),
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Listed  184 676");
        assert_eq!(lines[1].text, "Unlisted");
    }

    #[test]
    fn adjacent_fragments_join_without_column_gap() {
        let first = TextFragment::new(50.0, 10.0, 10.0, "Fund");
        let second = TextFragment::new(first.right() + 3.0, 10.0, 10.0, "capital");
        let lines = group_into_lines(vec![first, second]);
        assert_eq!(lines[0].text, "Fund capital");
    }

    #[test]
    fn page_from_text_keeps_line_order() {
        let page = Page::from_text(3, "Balance sheet\n\nAssets\nListed  10");
        assert_eq!(page.number, 3);
        assert_eq!(page.text(), "Balance sheet\nAssets\nListed  10");
        assert!(!page.is_blank());
    }

    #[test]
    fn rule_orientation() {
        assert!(Rule::new(10.0, 50.0, 200.0, 50.5).is_horizontal());
        assert!(Rule::new(10.0, 50.0, 10.0, 300.0).is_vertical());
        assert!(!Rule::new(10.0, 50.0, 200.0, 300.0).is_horizontal());
    }
}
