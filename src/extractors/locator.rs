// src/extractors/locator.rs
use crate::catalogue::Statement;
use crate::document::Page;
use crate::utils::error::ExtractError;

/// One additive scoring rule. Every group in `require` must have at least one phrase present,
/// and no phrase in `exclude` may be present, for `weight` to apply.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub require: &'static [&'static [&'static str]],
    pub exclude: &'static [&'static str],
    pub weight: i32,
}

impl KeywordRule {
    fn applies(&self, lowered: &str) -> bool {
        self.require
            .iter()
            .all(|group| group.iter().any(|phrase| lowered.contains(phrase)))
            && !self.exclude.iter().any(|phrase| lowered.contains(phrase))
    }
}

const fn rule(
    require: &'static [&'static [&'static str]],
    exclude: &'static [&'static str],
    weight: i32,
) -> KeywordRule {
    KeywordRule {
        require,
        exclude,
        weight,
    }
}

/// Weighted keyword rubric with a confidence floor.
#[derive(Debug, Clone, Copy)]
pub struct Rubric {
    pub statement: Statement,
    pub rules: &'static [KeywordRule],
    pub floor: i32,
}

pub const BALANCE_SHEET_RUBRIC: Rubric = Rubric {
    statement: Statement::BalanceSheet,
    rules: &[
        rule(&[&["balance sheet"]], &[], 30),
        rule(&[&["sek million", "sek m "]], &[], 15),
        rule(&[&["total assets"], &["liabilities"]], &[], 20),
        rule(&[&["fund capital"]], &[], 15),
        rule(&[&["listed"], &["unlisted"]], &[], 10),
        // Summary pages share the vocabulary
        rule(&[&["key ratios"]], &[], -15),
        rule(&[&["ten-year performance", "ten-year overview"]], &[], -15),
        rule(&[&["income statement"]], &["balance sheet"], -10),
    ],
    floor: 30,
};

pub const KEY_RATIOS_RUBRIC: Rubric = Rubric {
    statement: Statement::KeyRatios,
    rules: &[
        rule(&[&["key ratio"]], &[], 30),
        rule(&[&["sek billion", "sek bn"]], &[], 15),
        rule(&[&["fund capital"]], &[], 10),
        rule(&[&["net outflow", "pension system"]], &[], 10),
        rule(&[&["net result", "result for the"]], &[], 5),
        rule(&[&["balance sheet"]], &[], -20),
        rule(&[&["ten-year performance", "ten-year overview"]], &[], -15),
    ],
    floor: 30,
};

impl Rubric {
    pub fn for_statement(statement: Statement) -> Self {
        match statement {
            Statement::BalanceSheet => BALANCE_SHEET_RUBRIC,
            Statement::KeyRatios => KEY_RATIOS_RUBRIC,
        }
    }

    pub fn score(&self, text: &str) -> i32 {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.applies(&lowered))
            .map(|rule| rule.weight)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMatch {
    pub page: u32,
    pub score: i32,
}

/// Returns the best-scoring page, or an error when even the best page stays below the floor.
/// Only a strictly higher score displaces the current best, so ties go to the earlier page.
pub fn locate(pages: &[Page], rubric: &Rubric) -> Result<PageMatch, ExtractError> {
    let mut best: Option<PageMatch> = None;
    for page in pages {
        let score = rubric.score(&page.text());
        tracing::trace!("{} score for page {}: {}", rubric.statement.name(), page.number, score);
        if best.map_or(true, |current| score > current.score) {
            best = Some(PageMatch {
                page: page.number,
                score,
            });
        }
    }

    match best {
        Some(found) if found.score >= rubric.floor => {
            tracing::info!(
                "Found {} on page {} (score {})",
                rubric.statement.name(),
                found.page,
                found.score
            );
            Ok(found)
        }
        other => Err(ExtractError::PageNotFound {
            statement: rubric.statement.name(),
            best_score: other.map_or(0, |found| found.score),
        }),
    }
}
