// src/validation.rs
use serde::Serialize;
use std::fmt;

use crate::catalogue::Field;
use crate::output::ExtractionResult;

/// Published statements round each line to whole millions.
pub const DEFAULT_TOLERANCE: f64 = 100.0;

/// An accounting identity: the sum of `parts` should equal `total`.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub name: &'static str,
    pub parts: &'static [Field],
    pub total: Field,
}

pub const IDENTITIES: [Identity; 2] = [
    Identity {
        name: "assets = fund capital and liabilities",
        parts: &[Field::TotalAssets],
        total: Field::TotalFundCapitalAndLiabilities,
    },
    Identity {
        name: "fund capital + liabilities = fund capital and liabilities",
        parts: &[Field::TotalFundCapital, Field::TotalLiabilities],
        total: Field::TotalFundCapitalAndLiabilities,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    Passed { difference: f64 },
    Failed { difference: f64 },
    /// A required field was not extracted.
    Skipped { missing: Vec<Field> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub identity: &'static str,
    #[serde(flatten)]
    pub status: CheckStatus,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        matches!(self.status, CheckStatus::Passed { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, CheckStatus::Failed { .. })
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            CheckStatus::Passed { difference } => write!(f, "{}: passed (difference {})", self.identity, difference),
            CheckStatus::Failed { difference } => write!(f, "{}: FAILED (difference {})", self.identity, difference),
            CheckStatus::Skipped { missing } => {
                let names = missing.iter().map(|field| field.key()).collect::<Vec<_>>().join(", ");
                write!(f, "{}: skipped (missing {})", self.identity, names)
            }
        }
    }
}

/// Evaluates every identity against `result`. Advisory only: values are never touched
/// and a mismatch is reported, not raised.
pub fn validate(result: &ExtractionResult, tolerance: f64) -> Vec<CheckResult> {
    IDENTITIES
        .iter()
        .map(|identity| {
            let status = check(identity, result, tolerance);
            if let CheckStatus::Failed { difference } = status {
                tracing::warn!("Reconciliation mismatch: {} (difference {})", identity.name, difference);
            }
            CheckResult {
                identity: identity.name,
                status,
            }
        })
        .collect()
}

fn check(identity: &Identity, result: &ExtractionResult, tolerance: f64) -> CheckStatus {
    let missing = identity
        .parts
        .iter()
        .chain(std::iter::once(&identity.total))
        .copied()
        .filter(|field| !result.contains(*field))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return CheckStatus::Skipped { missing };
    }

    let sum = identity
        .parts
        .iter()
        .filter_map(|field| result.get(*field))
        .map(|value| value.as_f64())
        .sum::<f64>();
    let total = result.get(identity.total).map_or(0.0, |value| value.as_f64());
    let difference = (sum - total).abs();
    if difference <= tolerance {
        CheckStatus::Passed { difference }
    } else {
        CheckStatus::Failed { difference }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::Value;
    use crate::output::Provenance;

    fn result_with(values: &[(Field, i64)]) -> ExtractionResult {
        let mut result = ExtractionResult::default();
        for (field, value) in values {
            result.record(
                *field,
                Value::Integer(*value),
                Provenance {
                    strategy: "test",
                    page: 1,
                    confidence: 0,
                },
            );
        }
        result
    }

    #[test]
    fn matching_totals_pass() {
        let result = result_with(&[
            (Field::TotalAssets, 362_451),
            (Field::TotalFundCapitalAndLiabilities, 362_451),
        ]);
        let checks = validate(&result, DEFAULT_TOLERANCE);
        assert!(checks[0].passed());
        assert!(matches!(checks[1].status, CheckStatus::Skipped { .. }));
    }

    #[test]
    fn difference_above_tolerance_fails_without_touching_values() {
        let result = result_with(&[
            (Field::TotalAssets, 362_601),
            (Field::TotalFundCapitalAndLiabilities, 362_451),
            (Field::TotalFundCapital, 359_741),
            (Field::TotalLiabilities, 2_710),
        ]);
        let checks = validate(&result, DEFAULT_TOLERANCE);
        assert_eq!(checks[0].status, CheckStatus::Failed { difference: 150.0 });
        assert!(checks[1].passed());
        assert_eq!(result.get(Field::TotalAssets), Some(Value::Integer(362_601)));
    }

    #[test]
    fn rounding_within_tolerance_passes() {
        let result = result_with(&[
            (Field::TotalFundCapital, 359_741),
            (Field::TotalLiabilities, 2_800),
            (Field::TotalFundCapitalAndLiabilities, 362_451),
        ]);
        let checks = validate(&result, DEFAULT_TOLERANCE);
        assert_eq!(checks[1].status, CheckStatus::Passed { difference: 90.0 });
    }

    #[test]
    fn skipped_check_names_missing_fields() {
        let checks = validate(&ExtractionResult::default(), DEFAULT_TOLERANCE);
        assert_eq!(
            checks[1].status,
            CheckStatus::Skipped {
                missing: vec![
                    Field::TotalFundCapital,
                    Field::TotalLiabilities,
                    Field::TotalFundCapitalAndLiabilities
                ]
            }
        );
        assert!(checks[1].to_string().contains("TOTALLIABILITIES"));
    }
}
