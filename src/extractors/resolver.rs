// src/extractors/resolver.rs
use serde::Serialize;
use std::fmt;

use crate::catalogue::{Catalogue, Field, SectionAffinity, Statement};
use crate::document::TextLine;
use crate::extractors::number::{find_numbers, parse_number, NumberMatch, Value};
use crate::extractors::FieldValues;

/// Balance-sheet section the resolver is currently reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Section {
    #[default]
    Assets,
    Liabilities,
    FundCapital,
}

impl Section {
    /// Maps a row label that is exactly a section header to its section.
    pub fn from_header(label: &str) -> Option<Section> {
        let normalized = label.trim().trim_end_matches(':').trim().to_lowercase();
        match normalized.as_str() {
            "assets" => Some(Section::Assets),
            "liabilities" | "fund capital and liabilities" => Some(Section::Liabilities),
            "fund capital" => Some(Section::FundCapital),
            _ => None,
        }
    }

    /// Asset-side fields are only read under ASSETS; liability-side fields anywhere but ASSETS.
    pub fn accepts(self, affinity: SectionAffinity) -> bool {
        match affinity {
            SectionAffinity::Any => true,
            SectionAffinity::AssetSide => self == Section::Assets,
            SectionAffinity::LiabilitySide => self != Section::Assets,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Assets => f.write_str("ASSETS"),
            Section::Liabilities => f.write_str("LIABILITIES"),
            Section::FundCapital => f.write_str("FUND_CAPITAL"),
        }
    }
}

/// Three-state section machine, starting in ASSETS.
#[derive(Debug, Default)]
pub struct SectionTracker {
    current: Section,
}

impl SectionTracker {
    pub fn current(&self) -> Section {
        self.current
    }

    pub fn enter(&mut self, next: Section) {
        if next == self.current {
            return;
        }
        if next == Section::Assets {
            // Statements list assets first; a second assets header usually means a second table.
            tracing::warn!("Section header moves back from {} to {}", self.current, next);
        } else {
            tracing::debug!("Section {} -> {}", self.current, next);
        }
        self.current = next;
    }
}

/// Maps rows (label in the first cell, current-period value in the second) onto catalogue fields.
///
/// Only `wanted` fields are considered and each is populated at most once. The first field whose
/// pattern matches, whose section affinity holds, and whose value cell parses takes the row.
pub fn resolve_rows(rows: &[Vec<String>], statement: Statement, wanted: &[Field]) -> FieldValues {
    let entries = Catalogue::standard().for_statement(statement);
    let mut tracker = SectionTracker::default();
    let mut values = FieldValues::new();

    for row in rows {
        let Some(label) = row.first().map(|cell| cell.trim()) else {
            continue;
        };
        if label.is_empty() {
            continue;
        }
        if let Some(section) = Section::from_header(label) {
            tracker.enter(section);
            continue;
        }

        for entry in &entries {
            if !wanted.contains(&entry.field) || values.contains_key(&entry.field) {
                continue;
            }
            if !entry.matches(label) {
                continue;
            }
            if !tracker.current().accepts(entry.affinity) {
                tracing::trace!("'{}' skipped for {} while in {}", label, entry.field, tracker.current());
                continue;
            }
            let Some(value) = row
                .get(1)
                .and_then(|cell| parse_number(cell, statement.allows_decimal()))
            else {
                tracing::debug!("'{}' matched {} but has no numeric value", label, entry.field);
                continue;
            };
            tracing::debug!("{} = {} (from '{}')", entry.field, value, label);
            values.insert(entry.field, value);
            break;
        }
    }

    values
}

/// Turns raw text lines into two-cell rows: the text before the first number, and that number.
/// Lines without a number become single-cell rows so section headers still register.
pub fn rows_from_lines(lines: &[TextLine]) -> Vec<Vec<String>> {
    lines
        .iter()
        .filter_map(|line| {
            let text = line.text.trim();
            if text.is_empty() {
                return None;
            }
            let numbers = find_numbers(text, true);
            // A year inside the label ("January-June 2024") is not the value.
            let first = numbers
                .iter()
                .enumerate()
                .find(|(index, found)| !(*index + 1 < numbers.len() && is_label_year(text, found)))
                .map(|(_, found)| *found);
            Some(match first {
                Some(found) => {
                    let label = text[..found.start].trim().trim_end_matches(&[',', ':'][..]).trim();
                    vec![label.to_string(), text[found.start..found.end].to_string()]
                }
                None => vec![text.to_string()],
            })
        })
        .collect()
}

/// An ungrouped four-digit year that is part of the label text. Grouped figures ("2 025") and
/// numbers after a column gap are values.
fn is_label_year(text: &str, found: &NumberMatch) -> bool {
    let digits = &text[found.start..found.end];
    let is_year = matches!(found.value, Value::Integer(year) if (2000..=2030).contains(&year));
    is_year
        && digits.len() == 4
        && digits.bytes().all(|byte| byte.is_ascii_digit())
        && !text[..found.start].ends_with("  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    fn balance_fields() -> Vec<Field> {
        Statement::BalanceSheet.fields()
    }

    #[test]
    fn derivative_instruments_split_by_section() {
        let grid = rows(&[
            &["Assets", "", ""],
            &["Derivative instruments", "1 200", "900"],
            &["Liabilities", "", ""],
            &["Derivative instruments", "2 410", "1 900"],
        ]);
        let values = resolve_rows(&grid, Statement::BalanceSheet, &balance_fields());
        assert_eq!(values.get(&Field::DerivativeAssets), Some(&Value::Integer(1_200)));
        assert_eq!(values.get(&Field::DerivativeLiabilities), Some(&Value::Integer(2_410)));
    }

    #[test]
    fn liability_derivatives_are_never_read_under_assets() {
        let grid = rows(&[
            &["Derivative instruments", "1 200"],
            &["Derivative instruments", "1 300"],
        ]);
        let values = resolve_rows(&grid, Statement::BalanceSheet, &balance_fields());
        assert_eq!(values.get(&Field::DerivativeAssets), Some(&Value::Integer(1_200)));
        assert_eq!(values.get(&Field::DerivativeLiabilities), None);
    }

    #[test]
    fn first_match_wins_and_is_never_overwritten() {
        let grid = rows(&[
            &["Total assets", "362 451", "350 000"],
            &["Total assets", "1", "2"],
        ]);
        let values = resolve_rows(&grid, Statement::BalanceSheet, &balance_fields());
        assert_eq!(values.len(), 1);
        assert_eq!(values.get(&Field::TotalAssets), Some(&Value::Integer(362_451)));
    }

    #[test]
    fn header_rows_carry_no_value_and_combined_total_is_distinct() {
        let grid = rows(&[
            &["Fund capital and liabilities", "999"],
            &["Other liabilities", "300"],
            &["Total liabilities", "2 710"],
            &["Fund capital", ""],
            &["Fund capital carried forward", "340 000"],
            &["Total fund capital", "359 741"],
            &["Total fund capital and liabilities", "362 451"],
        ]);
        let values = resolve_rows(&grid, Statement::BalanceSheet, &balance_fields());
        assert_eq!(values.len(), 5);
        assert_eq!(values.get(&Field::TotalLiabilities), Some(&Value::Integer(2_710)));
        assert_eq!(values.get(&Field::TotalFundCapital), Some(&Value::Integer(359_741)));
        assert_eq!(
            values.get(&Field::TotalFundCapitalAndLiabilities),
            Some(&Value::Integer(362_451))
        );
    }

    #[test]
    fn unparseable_value_leaves_field_absent() {
        let grid = rows(&[&["Cash and bank balances", "n/a"], &["Other assets", "12"]]);
        let values = resolve_rows(&grid, Statement::BalanceSheet, &balance_fields());
        assert_eq!(values.get(&Field::CashAndBankBalances), None);
        assert_eq!(values.get(&Field::OtherAssets), Some(&Value::Integer(12)));
    }

    #[test]
    fn fields_outside_the_wanted_set_are_left_alone() {
        let grid = rows(&[&["Listed", "184 676"], &["Unlisted", "80 112"]]);
        let values = resolve_rows(&grid, Statement::BalanceSheet, &[Field::UnlistedEquities]);
        assert_eq!(values.len(), 1);
        assert_eq!(values.get(&Field::UnlistedEquities), Some(&Value::Integer(80_112)));
    }

    #[test]
    fn text_lines_fall_back_to_first_value() {
        let page = Page::from_text(
            5,
            "Key ratios\nFund capital carried forward, SEK bn  357.9  367.4  381.3\n\
             Net outflows to the national pension system, SEK bn  -3.4  -2.9",
        );
        let rows = rows_from_lines(&page.lines);
        assert_eq!(rows[0], vec!["Key ratios"]);
        assert_eq!(rows[1], vec!["Fund capital carried forward, SEK bn", "357.9"]);

        let values = resolve_rows(&rows, Statement::KeyRatios, &Statement::KeyRatios.fields());
        assert_eq!(values.get(&Field::FundCapitalLevel), Some(&Value::Decimal(357.9)));
        assert_eq!(values.get(&Field::NetOutflowsToPensionSystem), Some(&Value::Decimal(-3.4)));
    }

    #[test]
    fn year_in_label_is_not_taken_as_value() {
        let page = Page::from_text(1, "Net result for the period January-June 2024, SEK bn  12.3");
        let rows = rows_from_lines(&page.lines);
        assert_eq!(rows[0][1], "12.3");
    }

    #[test]
    fn year_sized_amounts_are_values() {
        let page = Page::from_text(
            4,
            "Assets\nCash and bank balances  2 025  1 800\nOther assets  2010  950",
        );
        let rows = rows_from_lines(&page.lines);
        assert_eq!(rows[1], vec!["Cash and bank balances", "2 025"]);
        assert_eq!(rows[2], vec!["Other assets", "2010"]);

        let values = resolve_rows(&rows, Statement::BalanceSheet, &balance_fields());
        assert_eq!(values.get(&Field::CashAndBankBalances), Some(&Value::Integer(2_025)));
        assert_eq!(values.get(&Field::OtherAssets), Some(&Value::Integer(2_010)));
    }
}
