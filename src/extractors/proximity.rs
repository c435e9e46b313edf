// src/extractors/proximity.rs
use std::collections::BTreeMap;

use crate::catalogue::{Catalogue, CatalogueEntry, Field, Statement};
use crate::document::Page;
use crate::extractors::number::{find_numbers, Value};
use crate::extractors::FieldValues;

/// Pairs further apart than this are discarded.
pub const MAX_DISTANCE: f32 = 500.0;

// Ratio figures are small (SEK billion); page numbers, years and counts fall outside.
const MIN_MAGNITUDE: f64 = 0.01;
const MAX_MAGNITUDE: f64 = 10_000.0;

const IN_RANGE_POINTS: i32 = 40;
const NEAR_RANGE_POINTS: i32 = 15;
const OUT_OF_RANGE_PENALTY: i32 = -50;
/// Share of the expected range's span accepted on either side for partial credit.
const RANGE_MARGIN: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberToken {
    pub value: Value,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub field: Field,
    pub phrase: &'static str,
    pub specificity: i32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProximityMatch {
    pub field: Field,
    pub value: Value,
    pub score: i32,
    pub phrase: &'static str,
    pub distance: f32,
}

/// Every plausible ratio figure on the page with its position, in reading order.
pub fn number_tokens(page: &Page) -> Vec<NumberToken> {
    page.fragments()
        .flat_map(|fragment| {
            find_numbers(&fragment.text, true)
                .into_iter()
                .filter(|found| {
                    let magnitude = found.value.as_f64().abs();
                    magnitude > MIN_MAGNITUDE && magnitude < MAX_MAGNITUDE
                })
                .map(move |found| NumberToken {
                    value: found.value,
                    x: fragment.x_at(fragment.text[..found.start].chars().count()),
                    y: fragment.y,
                })
        })
        .collect()
}

/// Occurrences of each entry's synonyms. A phrase found inside a single fragment is placed
/// at its own offset; a phrase spanning fragments is placed at the start of its line.
pub fn keyword_hits(page: &Page, entries: &[&CatalogueEntry]) -> Vec<KeywordHit> {
    let mut hits = Vec::new();
    for line in &page.lines {
        let lowered = line.text.to_lowercase();
        for entry in entries {
            for synonym in entry.synonyms {
                if !lowered.contains(synonym.phrase) {
                    continue;
                }
                let (x, y) = line
                    .fragments
                    .iter()
                    .find_map(|fragment| {
                        let text = fragment.text.to_lowercase();
                        let offset = text.find(synonym.phrase)?;
                        Some((fragment.x_at(text[..offset].chars().count()), fragment.y))
                    })
                    .unwrap_or((line.x, line.y));
                hits.push(KeywordHit {
                    field: entry.field,
                    phrase: synonym.phrase,
                    specificity: synonym.specificity,
                    x,
                    y,
                });
            }
        }
    }
    hits
}

/// Distance bands: closer pairs earn more, nothing beyond [`MAX_DISTANCE`].
pub fn proximity_points(distance: f32) -> Option<i32> {
    match distance {
        d if d < 50.0 => Some(50),
        d if d < 100.0 => Some(40),
        d if d < 200.0 => Some(30),
        d if d < 300.0 => Some(20),
        d if d < MAX_DISTANCE => Some(10),
        _ => None,
    }
}

pub fn range_points(value: f64, range: Option<(f64, f64)>) -> i32 {
    let Some((low, high)) = range else {
        return 0;
    };
    if value >= low && value <= high {
        return IN_RANGE_POINTS;
    }
    let margin = (high - low) * RANGE_MARGIN;
    if value >= low - margin && value <= high + margin {
        NEAR_RANGE_POINTS
    } else {
        OUT_OF_RANGE_PENALTY
    }
}

/// Best-scoring candidate per wanted field. Only positive totals count; an equal score goes to
/// the nearer number, and the first candidate in reading order keeps an exact tie.
pub fn score_page(page: &Page, wanted: &[Field]) -> Vec<ProximityMatch> {
    let catalogue = Catalogue::standard();
    let entries = catalogue
        .for_statement(Statement::KeyRatios)
        .into_iter()
        .filter(|entry| wanted.contains(&entry.field))
        .collect::<Vec<_>>();
    let tokens = number_tokens(page);
    let hits = keyword_hits(page, &entries);
    tracing::debug!(
        "Page {}: {} numeric token(s), {} keyword hit(s)",
        page.number,
        tokens.len(),
        hits.len()
    );

    let mut best: BTreeMap<Field, ProximityMatch> = BTreeMap::new();
    for hit in &hits {
        let range = catalogue.entry(hit.field).and_then(|entry| entry.expected_range);
        for token in &tokens {
            let distance = ((token.x - hit.x).powi(2) + (token.y - hit.y).powi(2)).sqrt();
            let Some(closeness) = proximity_points(distance) else {
                continue;
            };
            let score = (closeness + range_points(token.value.as_f64(), range) + hit.specificity).max(0);
            tracing::trace!(
                "{}: '{}' -> {} at {:.0} scores {}",
                hit.field,
                hit.phrase,
                token.value,
                distance,
                score
            );
            if score == 0 {
                continue;
            }
            let improves = best.get(&hit.field).map_or(true, |current| {
                score > current.score || (score == current.score && distance < current.distance)
            });
            if improves {
                best.insert(
                    hit.field,
                    ProximityMatch {
                        field: hit.field,
                        value: token.value,
                        score,
                        phrase: hit.phrase,
                        distance,
                    },
                );
            }
        }
    }

    best.into_values().collect()
}

pub fn resolve_by_proximity(page: &Page, wanted: &[Field]) -> FieldValues {
    score_page(page, wanted)
        .into_iter()
        .map(|found| (found.field, found.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextFragment;

    fn ratio_fields() -> Vec<Field> {
        Statement::KeyRatios.fields()
    }

    #[test]
    fn first_value_of_a_comparison_row_wins() {
        let page = Page::from_text(
            2,
            "Key ratios\nFund capital carried forward, SEK bn  357.9  367.4  381.3",
        );
        let values = resolve_by_proximity(&page, &ratio_fields());
        assert_eq!(values.get(&Field::FundCapitalLevel), Some(&Value::Decimal(357.9)));
    }

    #[test]
    fn expected_range_vetoes_far_off_values() {
        // The nearest number is a page reference far outside the expected range.
        let page = Page::from_fragments(
            3,
            vec![
                TextFragment::new(50.0, 100.0, 10.0, "Net outflows to the national pension system"),
                TextFragment::new(300.0, 100.0, 10.0, "120"),
                TextFragment::new(420.0, 100.0, 10.0, "-3.4"),
            ],
            Vec::new(),
        );
        let found = score_page(&page, &[Field::NetOutflowsToPensionSystem]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, Value::Decimal(-3.4));
    }

    #[test]
    fn distant_numbers_are_discarded() {
        let page = Page::from_fragments(
            1,
            vec![
                TextFragment::new(50.0, 50.0, 10.0, "Result for the period"),
                TextFragment::new(50.0, 700.0, 10.0, "12.5"),
            ],
            Vec::new(),
        );
        assert!(score_page(&page, &[Field::NetResultTotal]).is_empty());
    }

    #[test]
    fn equal_scores_go_to_the_nearer_row() {
        // Labels on the left, period columns on the right, rows 14 units apart.
        let rows = [
            ("Fund capital carried forward, SEK bn", ["357.9", "367.4", "381.3"]),
            ("Net outflows to the national pension system, SEK bn", ["-3.4", "-6.1", "-2.9"]),
            ("Net result for the period, SEK bn", ["21.5", "30.2", "-12.1"]),
        ];
        let mut fragments = vec![TextFragment::new(50.0, 86.0, 10.0, "Key ratios")];
        for (index, (label, values)) in rows.iter().enumerate() {
            let y = 100.0 + 14.0 * index as f32;
            fragments.push(TextFragment::new(50.0, y, 10.0, *label));
            for (col, value) in values.iter().enumerate() {
                fragments.push(TextFragment::new(330.0 + 60.0 * col as f32, y, 10.0, *value));
            }
        }
        let page = Page::from_fragments(2, fragments, Vec::new());

        let values = resolve_by_proximity(&page, &ratio_fields());
        assert_eq!(values.get(&Field::FundCapitalLevel), Some(&Value::Decimal(357.9)));
        assert_eq!(values.get(&Field::NetOutflowsToPensionSystem), Some(&Value::Decimal(-3.4)));
        assert_eq!(values.get(&Field::NetResultTotal), Some(&Value::Decimal(21.5)));
    }

    #[test]
    fn scoring_bands() {
        assert_eq!(proximity_points(10.0), Some(50));
        assert_eq!(proximity_points(150.0), Some(30));
        assert_eq!(proximity_points(499.0), Some(10));
        assert_eq!(proximity_points(500.0), None);
        assert_eq!(range_points(450.0, Some((300.0, 600.0))), 40);
        assert_eq!(range_points(700.0, Some((300.0, 600.0))), 15);
        assert_eq!(range_points(2024.0, Some((300.0, 600.0))), -50);
        assert_eq!(range_points(1.0, None), 0);
    }
}
