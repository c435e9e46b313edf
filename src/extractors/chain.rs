// src/extractors/chain.rs
use async_trait::async_trait;
use std::sync::Arc;

use crate::catalogue::{Field, Statement};
use crate::document::Page;
use crate::extractors::grid::{select_grid, ScoredGrid, GRID_FLOOR};
use crate::extractors::number::Value;
use crate::extractors::proximity::score_page;
use crate::extractors::resolver::{resolve_rows, rows_from_lines};
use crate::extractors::secondary::SecondaryExtractor;
use crate::extractors::FieldValues;
use crate::output::{ExtractionResult, Provenance};
use crate::utils::error::ExtractError;

/// Proximity matches below this score are left for the next strategy.
pub const PROXIMITY_FLOOR: i32 = 50;

/// One field value proposed by a strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub field: Field,
    pub value: Value,
    pub confidence: i32,
}

/// Values produced by one strategy, each with how much the strategy trusts it.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub candidates: Vec<Candidate>,
    /// The grid the values were read from, when the strategy used one.
    pub grid: Option<ScoredGrid>,
}

impl Attempt {
    fn non_empty(candidates: Vec<Candidate>, strategy: &str) -> Result<Self, ExtractError> {
        if candidates.is_empty() {
            return Err(ExtractError::Empty(strategy.to_string()));
        }
        Ok(Self {
            candidates,
            grid: None,
        })
    }

    /// Every value at the same confidence.
    fn uniform(values: FieldValues, confidence: i32, strategy: &str) -> Result<Self, ExtractError> {
        let candidates = values
            .into_iter()
            .map(|(field, value)| Candidate {
                field,
                value,
                confidence,
            })
            .collect();
        Self::non_empty(candidates, strategy)
    }
}

/// One interchangeable way of pulling statement fields off a page.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidates below this confidence are not recorded.
    fn min_confidence(&self) -> i32 {
        0
    }

    async fn attempt(&self, page: &Page, wanted: &[Field]) -> Result<Attempt, ExtractError>;
}

/// Best ruled or whitespace grid, read by the section-aware resolver.
pub struct StructuralGridStrategy;

#[async_trait]
impl ExtractionStrategy for StructuralGridStrategy {
    fn name(&self) -> &'static str {
        "structural-grid"
    }

    fn min_confidence(&self) -> i32 {
        GRID_FLOOR
    }

    async fn attempt(&self, page: &Page, wanted: &[Field]) -> Result<Attempt, ExtractError> {
        let selected = select_grid(page)?;
        tracing::info!(
            "Using {} grid on page {} ({} rows, score {})",
            selected.grid.origin,
            page.number,
            selected.grid.rows.len(),
            selected.score
        );
        let values = resolve_rows(&selected.grid.rows, Statement::BalanceSheet, wanted);
        let mut attempt = Attempt::uniform(values, selected.score, self.name())?;
        attempt.grid = Some(selected);
        Ok(attempt)
    }
}

/// Raw text lines split into label and first number, read by the same resolver.
/// Serves as the grid fallback on the balance sheet and the labelled-line rule on key ratios.
pub struct TextLinesStrategy {
    pub statement: Statement,
}

#[async_trait]
impl ExtractionStrategy for TextLinesStrategy {
    fn name(&self) -> &'static str {
        match self.statement {
            Statement::BalanceSheet => "text-lines",
            Statement::KeyRatios => "labelled-lines",
        }
    }

    async fn attempt(&self, page: &Page, wanted: &[Field]) -> Result<Attempt, ExtractError> {
        let rows = rows_from_lines(&page.lines);
        let values = resolve_rows(&rows, self.statement, wanted);
        let confidence = (values.len() * 100 / wanted.len().max(1)) as i32;
        Attempt::uniform(values, confidence, self.name())
    }
}

/// Coordinate proximity between ratio labels and numbers.
pub struct ProximityStrategy;

#[async_trait]
impl ExtractionStrategy for ProximityStrategy {
    fn name(&self) -> &'static str {
        "proximity"
    }

    fn min_confidence(&self) -> i32 {
        PROXIMITY_FLOOR
    }

    async fn attempt(&self, page: &Page, wanted: &[Field]) -> Result<Attempt, ExtractError> {
        let candidates = score_page(page, wanted)
            .into_iter()
            .map(|found| {
                tracing::debug!(
                    "{} = {} via '{}' ({:.0} away, score {})",
                    found.field,
                    found.value,
                    found.phrase,
                    found.distance,
                    found.score
                );
                Candidate {
                    field: found.field,
                    value: found.value,
                    confidence: found.score,
                }
            })
            .collect();
        Attempt::non_empty(candidates, self.name())
    }
}

/// Hosted-model second opinion for whatever the local strategies left open.
pub struct SecondaryStrategy {
    pub extractor: Arc<SecondaryExtractor>,
    pub statement: Statement,
}

#[async_trait]
impl ExtractionStrategy for SecondaryStrategy {
    fn name(&self) -> &'static str {
        "secondary-service"
    }

    async fn attempt(&self, page: &Page, wanted: &[Field]) -> Result<Attempt, ExtractError> {
        let values = self.extractor.extract(page, self.statement, wanted).await?;
        Attempt::uniform(values, 0, self.name())
    }
}

/// Ordered strategies for one statement. Each later strategy only sees the fields the
/// earlier ones left unpopulated.
pub struct ExtractionChain {
    statement: Statement,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractionChain {
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Grid, then raw text lines, then the secondary service when configured.
    pub fn balance_sheet(secondary: Option<Arc<SecondaryExtractor>>) -> Self {
        let chain = Self::new(Statement::BalanceSheet)
            .with_strategy(StructuralGridStrategy)
            .with_strategy(TextLinesStrategy {
                statement: Statement::BalanceSheet,
            });
        match secondary {
            Some(extractor) => chain.with_strategy(SecondaryStrategy {
                extractor,
                statement: Statement::BalanceSheet,
            }),
            None => chain,
        }
    }

    /// Proximity, then the labelled-line rule, then the secondary service when configured.
    pub fn key_ratios(secondary: Option<Arc<SecondaryExtractor>>) -> Self {
        let chain = Self::new(Statement::KeyRatios)
            .with_strategy(ProximityStrategy)
            .with_strategy(TextLinesStrategy {
                statement: Statement::KeyRatios,
            });
        match secondary {
            Some(extractor) => chain.with_strategy(SecondaryStrategy {
                extractor,
                statement: Statement::KeyRatios,
            }),
            None => chain,
        }
    }

    pub fn statement(&self) -> Statement {
        self.statement
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Fills the statement's missing fields in `result` from `page`. Strategy failures are
    /// logged and absorbed; the next strategy gets its turn. Returns the grid the values were
    /// read from, if any strategy used one.
    pub async fn run(&self, page: &Page, result: &mut ExtractionResult) -> Option<ScoredGrid> {
        let mut grid = None;
        for strategy in &self.strategies {
            let wanted = result.missing(self.statement);
            if wanted.is_empty() {
                break;
            }

            match strategy.attempt(page, &wanted).await {
                Ok(attempt) => {
                    let mut recorded = 0;
                    for candidate in attempt.candidates {
                        if candidate.confidence < strategy.min_confidence() {
                            tracing::debug!(
                                "{}: {} = {} not confident enough ({} < {})",
                                strategy.name(),
                                candidate.field,
                                candidate.value,
                                candidate.confidence,
                                strategy.min_confidence()
                            );
                            continue;
                        }
                        let provenance = Provenance {
                            strategy: strategy.name(),
                            page: page.number,
                            confidence: candidate.confidence,
                        };
                        if wanted.contains(&candidate.field)
                            && result.record(candidate.field, candidate.value, provenance)
                        {
                            recorded += 1;
                        }
                    }
                    if recorded > 0 && grid.is_none() {
                        grid = attempt.grid;
                    }
                    tracing::info!(
                        "{} filled {}/{} {} field(s) on page {}",
                        strategy.name(),
                        recorded,
                        wanted.len(),
                        self.statement.name(),
                        page.number
                    );
                }
                Err(e) => tracing::warn!("{} found nothing on page {}: {}", strategy.name(), page.number, e),
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::grid::GridOrigin;
    use crate::extractors::secondary::CompletionBackend;
    use crate::utils::error::SecondaryError;

    struct Reply(&'static str);

    #[async_trait]
    impl CompletionBackend for Reply {
        async fn complete(&self, _prompt: &str) -> Result<String, SecondaryError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl CompletionBackend for Failing {
        async fn complete(&self, _prompt: &str) -> Result<String, SecondaryError> {
            Err(SecondaryError::Malformed("garbage".to_string()))
        }
    }

    fn statement_page() -> Page {
        Page::from_text(
            7,
            "Balance sheet, SEK million\nAssets\nListed  184 676  170 000\nTotal assets  362 451  350 000",
        )
    }

    #[test]
    fn later_strategies_only_fill_gaps() {
        let secondary = Arc::new(SecondaryExtractor::new(Box::new(Reply(
            "{\"TOTALASSETS\": 1, \"BONDSANDOTHERFIXEDINCOMESECURITIES\": 98500}",
        ))));
        let chain = ExtractionChain::balance_sheet(Some(secondary));
        let mut result = ExtractionResult::default();
        tokio_test::block_on(chain.run(&statement_page(), &mut result));

        assert_eq!(result.get(Field::TotalAssets), Some(Value::Integer(362_451)));
        assert_eq!(result.get(Field::Bonds), Some(Value::Integer(98_500)));
        let provenance = result.provenance(Field::Bonds).expect("provenance");
        assert_eq!(provenance.strategy, "secondary-service");
        assert_eq!(provenance.page, 7);
    }

    #[test]
    fn secondary_failure_keeps_resolved_fields() {
        let secondary = Arc::new(SecondaryExtractor::new(Box::new(Failing)));
        let chain = ExtractionChain::balance_sheet(Some(secondary));
        let mut result = ExtractionResult::default();
        tokio_test::block_on(chain.run(&statement_page(), &mut result));

        assert_eq!(result.get(Field::ListedEquities), Some(Value::Integer(184_676)));
        assert_eq!(result.get(Field::TotalAssets), Some(Value::Integer(362_451)));
        assert_eq!(result.len(), 2);
    }

    struct Fixed {
        name: &'static str,
        confidence: i32,
        value: i64,
    }

    #[async_trait]
    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn min_confidence(&self) -> i32 {
            50
        }

        async fn attempt(&self, _page: &Page, _wanted: &[Field]) -> Result<Attempt, ExtractError> {
            Attempt::non_empty(
                vec![Candidate {
                    field: Field::TotalAssets,
                    value: Value::Integer(self.value),
                    confidence: self.confidence,
                }],
                self.name,
            )
        }
    }

    #[test]
    fn weak_candidates_are_left_for_the_next_strategy() {
        let chain = ExtractionChain::new(Statement::BalanceSheet)
            .with_strategy(Fixed {
                name: "weak",
                confidence: 20,
                value: 1,
            })
            .with_strategy(Fixed {
                name: "strong",
                confidence: 80,
                value: 362_451,
            });
        let mut result = ExtractionResult::default();
        tokio_test::block_on(chain.run(&statement_page(), &mut result));

        assert_eq!(result.get(Field::TotalAssets), Some(Value::Integer(362_451)));
        let provenance = result.provenance(Field::TotalAssets).expect("provenance");
        assert_eq!((provenance.strategy, provenance.confidence), ("strong", 80));
    }

    #[test]
    fn run_hands_back_the_grid_it_read() {
        let chain = ExtractionChain::balance_sheet(None);
        let mut result = ExtractionResult::default();
        let grid = tokio_test::block_on(chain.run(&statement_page(), &mut result)).expect("grid");
        assert_eq!(grid.grid.origin, GridOrigin::Stream);
        assert_eq!(grid.score, 35);

        let ratios = ExtractionChain::key_ratios(None);
        let page = Page::from_text(2, "Key ratios\nFund capital carried forward, SEK bn  357.9");
        assert!(tokio_test::block_on(ratios.run(&page, &mut result)).is_none());
    }

    #[test]
    fn chain_order_is_fixed() {
        assert_eq!(
            ExtractionChain::balance_sheet(None).strategy_names(),
            vec!["structural-grid", "text-lines"]
        );
        assert_eq!(
            ExtractionChain::key_ratios(None).strategy_names(),
            vec!["proximity", "labelled-lines"]
        );
    }

    #[test]
    fn ratio_chain_fills_from_proximity() {
        let page = Page::from_text(
            2,
            "Key ratios\nFund capital carried forward, SEK bn  357.9  367.4  381.3\n\
             Net outflows to the national pension system, SEK bn  -3.4  -2.9\n\
             Net result for the period, SEK bn  21.5  18.0",
        );
        let chain = ExtractionChain::key_ratios(None);
        let mut result = ExtractionResult::default();
        tokio_test::block_on(chain.run(&page, &mut result));

        assert_eq!(result.get(Field::FundCapitalLevel), Some(Value::Decimal(357.9)));
        assert_eq!(result.get(Field::NetOutflowsToPensionSystem), Some(Value::Decimal(-3.4)));
        assert_eq!(result.get(Field::NetResultTotal), Some(Value::Decimal(21.5)));
        assert_eq!(
            result.provenance(Field::FundCapitalLevel).map(|p| p.strategy),
            Some("proximity")
        );
    }
}
