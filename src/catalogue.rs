// src/catalogue.rs
//! Field Catalogue and Output Column Schema.
//!
//! The catalogue is fixed and versioned: 17 balance-sheet fields reported in SEK million and
//! 3 key-ratio fields reported in SEK billion. Declaration order of [`Field`] is the output
//! column order and must never change.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

pub const CATALOGUE_VERSION: &str = "2025.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Field {
    // Key ratios (SEK billion)
    FundCapitalLevel,
    NetOutflowsToPensionSystem,
    NetResultTotal,
    // Balance sheet (SEK million)
    ListedEquities,
    UnlistedEquities,
    Bonds,
    DerivativeAssets,
    CashAndBankBalances,
    OtherAssets,
    PrepaidExpenses,
    TotalAssets,
    DerivativeLiabilities,
    OtherLiabilities,
    DeferredIncome,
    TotalLiabilities,
    FundCapitalCarriedForward,
    NetPaymentsToPensionSystem,
    NetResultForPeriod,
    TotalFundCapital,
    TotalFundCapitalAndLiabilities,
}

impl Field {
    pub const ALL: [Field; 20] = [
        Field::FundCapitalLevel,
        Field::NetOutflowsToPensionSystem,
        Field::NetResultTotal,
        Field::ListedEquities,
        Field::UnlistedEquities,
        Field::Bonds,
        Field::DerivativeAssets,
        Field::CashAndBankBalances,
        Field::OtherAssets,
        Field::PrepaidExpenses,
        Field::TotalAssets,
        Field::DerivativeLiabilities,
        Field::OtherLiabilities,
        Field::DeferredIncome,
        Field::TotalLiabilities,
        Field::FundCapitalCarriedForward,
        Field::NetPaymentsToPensionSystem,
        Field::NetResultForPeriod,
        Field::TotalFundCapital,
        Field::TotalFundCapitalAndLiabilities,
    ];

    /// Canonical name, also the key exchanged with the secondary extraction service.
    pub fn key(self) -> &'static str {
        match self {
            Field::FundCapitalLevel => "FUNDCAPITALCARRIEDFORWARDLEVEL",
            Field::NetOutflowsToPensionSystem => "NETOUTFLOWSTOTHENATIONALPENSIONSYSTEM",
            Field::NetResultTotal => "TOTAL",
            Field::ListedEquities => "EQUITIESANDPARTICIPATIONSLISTED",
            Field::UnlistedEquities => "EQUITIESANDPARTICIPATIONSUNLISTED",
            Field::Bonds => "BONDSANDOTHERFIXEDINCOMESECURITIES",
            Field::DerivativeAssets => "DERIVATIVEINSTRUMENTS",
            Field::CashAndBankBalances => "CASHANDBANKBALANCES",
            Field::OtherAssets => "OTHERASSETS",
            Field::PrepaidExpenses => "PREPAIDEXPENSESANDACCRUEDINCOME",
            Field::TotalAssets => "TOTALASSETS",
            Field::DerivativeLiabilities => "DERIVATIVEINSTRUMENTSLIABILITIES",
            Field::OtherLiabilities => "OTHERLIABILITIES",
            Field::DeferredIncome => "DEFERREDINCOMEANDACCRUEDEXPENSES",
            Field::TotalLiabilities => "TOTALLIABILITIES",
            Field::FundCapitalCarriedForward => "FUNDCAPITALCARRIEDFORWARD",
            Field::NetPaymentsToPensionSystem => "NETPAYMENTSTOTHENATIONALPENSIONSYSTEM",
            Field::NetResultForPeriod => "NETRESULTFORTHEPERIOD",
            Field::TotalFundCapital => "TOTALFUNDCAPITAL",
            Field::TotalFundCapitalAndLiabilities => "TOTALFUNDCAPITALANDLIABILITIES",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        let key = key.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.key().eq_ignore_ascii_case(key))
    }

    /// Short description used in logs and service prompts.
    pub fn description(self) -> &'static str {
        match self {
            Field::FundCapitalLevel => "Fund capital carried forward (opening balance)",
            Field::NetOutflowsToPensionSystem => "Net outflows to the national pension system",
            Field::NetResultTotal => "Net result for the period",
            Field::ListedEquities => "Equities and participations, listed",
            Field::UnlistedEquities => "Equities and participations, unlisted",
            Field::Bonds => "Bonds and other fixed-income securities",
            Field::DerivativeAssets => "Derivative instruments (assets side)",
            Field::CashAndBankBalances => "Cash and bank balances",
            Field::OtherAssets => "Other assets",
            Field::PrepaidExpenses => "Prepaid expenses and accrued income",
            Field::TotalAssets => "Total assets",
            Field::DerivativeLiabilities => "Derivative instruments (liabilities side)",
            Field::OtherLiabilities => "Other liabilities",
            Field::DeferredIncome => "Deferred income and accrued expenses",
            Field::TotalLiabilities => "Total liabilities",
            Field::FundCapitalCarriedForward => "Fund capital carried forward",
            Field::NetPaymentsToPensionSystem => "Net payments to the national pension system",
            Field::NetResultForPeriod => "Net result for the period",
            Field::TotalFundCapital => "Total fund capital",
            Field::TotalFundCapitalAndLiabilities => "Total fund capital and liabilities",
        }
    }

    pub fn statement(self) -> Statement {
        match self {
            Field::FundCapitalLevel | Field::NetOutflowsToPensionSystem | Field::NetResultTotal => {
                Statement::KeyRatios
            }
            _ => Statement::BalanceSheet,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The two statements a report is mined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Statement {
    BalanceSheet,
    KeyRatios,
}

impl Statement {
    pub fn name(self) -> &'static str {
        match self {
            Statement::BalanceSheet => "balance sheet",
            Statement::KeyRatios => "key ratios",
        }
    }

    /// Native unit of the statement's figures. No conversion happens between the two.
    pub fn unit(self) -> &'static str {
        match self {
            Statement::BalanceSheet => "SEK million",
            Statement::KeyRatios => "SEK billion",
        }
    }

    /// Balance-sheet figures are whole millions; ratio figures keep their decimals.
    pub fn allows_decimal(self) -> bool {
        matches!(self, Statement::KeyRatios)
    }

    pub fn fields(self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| field.statement() == self)
            .collect()
    }
}

/// Which balance-sheet section a field may be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SectionAffinity {
    AssetSide,
    LiabilitySide,
    Any,
}

/// Label synonym used by the proximity scorer, with its specificity points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synonym {
    pub phrase: &'static str,
    pub specificity: i32,
}

const fn synonym(phrase: &'static str, specificity: i32) -> Synonym {
    Synonym {
        phrase,
        specificity,
    }
}

struct FieldDefinition {
    field: Field,
    patterns: &'static [&'static str],
    affinity: SectionAffinity,
    expected_range: Option<(f64, f64)>,
    synonyms: &'static [Synonym],
}

// Resolver order. More specific labels come before the labels they contain
// ("unlisted" before "listed", "total fund capital and liabilities" before "total liabilities").
const DEFINITIONS: &[FieldDefinition] = &[
    FieldDefinition {
        field: Field::UnlistedEquities,
        patterns: &[r"^\s*unlisted\s*$", r"non-listed", r"equities.*unlisted"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::ListedEquities,
        patterns: &[r"^\s*listed\s*$", r"\blisted\b", r"equities.*\blisted"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::Bonds,
        patterns: &[r"bonds.*fixed.?income", r"fixed.?income.*securities", r"^\s*bonds and other"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::DerivativeAssets,
        patterns: &[r"^\s*derivative instruments\s*$", r"^\s*derivatives\s*$"],
        affinity: SectionAffinity::AssetSide,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::CashAndBankBalances,
        patterns: &[r"cash.*bank", r"cash and cash equivalents"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::OtherAssets,
        patterns: &[r"^\s*other assets\s*$", r"other assets\b"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::PrepaidExpenses,
        patterns: &[r"prepaid.*accrued.*income", r"prepaid expenses"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::TotalAssets,
        patterns: &[r"^\s*total\s+assets\s*$", r"total\s+assets\b"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::DerivativeLiabilities,
        patterns: &[r"^\s*derivative instruments\s*$", r"^\s*derivatives\s*$"],
        affinity: SectionAffinity::LiabilitySide,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::OtherLiabilities,
        patterns: &[r"^\s*other liabilities\s*$", r"other liabilities\b"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::DeferredIncome,
        patterns: &[r"deferred.*accrued.*expenses", r"deferred income.*accrued"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::TotalFundCapitalAndLiabilities,
        patterns: &[
            r"total fund capital and liabilities",
            r"total liabilities and fund capital",
            r"total.*capital.*liabilities",
            r"total.*liabilities.*capital",
        ],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::TotalLiabilities,
        patterns: &[r"^\s*total liabilities\s*$", r"total liabilities\b"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::FundCapitalCarriedForward,
        patterns: &[
            r"fund capital carried forward",
            r"fund capital brought forward",
            r"carried.*forward",
        ],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::NetPaymentsToPensionSystem,
        patterns: &[r"net.*national pension", r"net payments.*pension"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::NetResultForPeriod,
        patterns: &[r"net result.*period", r"net result for the year"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    FieldDefinition {
        field: Field::TotalFundCapital,
        patterns: &[r"^\s*total fund capital\s*$", r"total fund capital\b"],
        affinity: SectionAffinity::Any,
        expected_range: None,
        synonyms: &[],
    },
    // Key ratios. Patterns serve the labelled-line rule, synonyms the proximity scorer.
    FieldDefinition {
        field: Field::FundCapitalLevel,
        patterns: &[r"fund capital (?:carried|brought) forward.*sek\s*(?:bn|billion)"],
        affinity: SectionAffinity::Any,
        expected_range: Some((300.0, 600.0)),
        synonyms: &[
            synonym("fund capital carried forward", 25),
            synonym("fund capital brought forward", 25),
            synonym("opening fund capital", 20),
            synonym("fund capital at start", 20),
            synonym("fund capital", 10),
        ],
    },
    FieldDefinition {
        field: Field::NetOutflowsToPensionSystem,
        patterns: &[r"net outfl.*national pension", r"net (?:flows?|payments?) to.*pension.*sek\s*(?:bn|billion)"],
        affinity: SectionAffinity::Any,
        expected_range: Some((-10.0, 0.0)),
        synonyms: &[
            synonym("net outflows to the national pension system", 25),
            synonym("net outflow", 20),
            synonym("net flow to pension", 15),
            synonym("national pension system", 10),
            synonym("pension system", 10),
        ],
    },
    FieldDefinition {
        field: Field::NetResultTotal,
        patterns: &[
            r"net result for the (?:period|year).*sek\s*(?:bn|billion)",
            r"result amounted to sek",
        ],
        affinity: SectionAffinity::Any,
        expected_range: Some((-50.0, 50.0)),
        synonyms: &[
            synonym("result amounted to sek", 25),
            synonym("net result for the period", 15),
            synonym("net result for the year", 15),
            synonym("result for the period", 15),
            synonym("result for the year", 15),
        ],
    },
];

/// Compiled catalogue entry.
#[derive(Debug)]
pub struct CatalogueEntry {
    pub field: Field,
    pub patterns: Vec<Regex>,
    pub affinity: SectionAffinity,
    /// Expected magnitude, only consulted by the proximity scorer.
    pub expected_range: Option<(f64, f64)>,
    pub synonyms: &'static [Synonym],
}

impl CatalogueEntry {
    pub fn matches(&self, label: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(label))
    }
}

#[derive(Debug)]
pub struct Catalogue {
    entries: Vec<CatalogueEntry>,
}

static STANDARD: Lazy<Catalogue> = Lazy::new(|| {
    let entries = DEFINITIONS
        .iter()
        .map(|definition| CatalogueEntry {
            field: definition.field,
            patterns: definition
                .patterns
                .iter()
                .map(|pattern| {
                    Regex::new(&format!("(?i){pattern}")).expect("Failed to compile catalogue pattern")
                })
                .collect(),
            affinity: definition.affinity,
            expected_range: definition.expected_range,
            synonyms: definition.synonyms,
        })
        .collect();
    Catalogue { entries }
});

impl Catalogue {
    pub fn standard() -> &'static Catalogue {
        &STANDARD
    }

    pub fn entry(&self, field: Field) -> Option<&CatalogueEntry> {
        self.entries.iter().find(|entry| entry.field == field)
    }

    /// Entries of one statement, in resolver order.
    pub fn for_statement(&self, statement: Statement) -> Vec<&CatalogueEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.field.statement() == statement)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One output column: stable technical identifier and stable human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub id: &'static str,
    pub label: &'static str,
    /// `None` for the leading reporting-year column.
    pub field: Option<Field>,
}

/// Fixed, ordered output columns: the year, then one column per catalogue field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSchema {
    columns: Vec<OutputColumn>,
}

const STANDARD_COLUMNS: [(&str, &str, Field); 20] = [
    ("AP2.FUNDCAPITALCARRIEDFORWARD.LEVEL.NONE.H.1@AP2", "AP2 semi-annual: Fund capital carried forward", Field::FundCapitalLevel),
    ("AP2.NETOUTFLOWSTOTHENATIONALPENSIONSYSTEM.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Net outflows to the national pension system", Field::NetOutflowsToPensionSystem),
    ("AP2.TOTAL.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Net result for the year", Field::NetResultTotal),
    ("AP2.EQUITIESANDPARTICIPATIONSLISTED.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Equities and participations - Listed", Field::ListedEquities),
    ("AP2.EQUITIESANDPARTICIPATIONSUNLISTED.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Equities and participations - Unlisted", Field::UnlistedEquities),
    ("AP2.BONDSANDOTHERFIXEDINCOMESECURITIES.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Bonds and other fixed-income securities", Field::Bonds),
    ("AP2.DERIVATIVEINSTRUMENTS.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Derivative instruments", Field::DerivativeAssets),
    ("AP2.CASHANDBANKBALANCES.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Cash and bank balances", Field::CashAndBankBalances),
    ("AP2.OTHERASSETS.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Other assets", Field::OtherAssets),
    ("AP2.PREPAIDEXPENSESANDACCRUEDINCOME.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Prepaid expenses and accrued income", Field::PrepaidExpenses),
    ("AP2.TOTALASSETS.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Total Assets", Field::TotalAssets),
    ("AP2.DERIVATIVEINSTRUMENTSLIABILITIES.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Derivative instruments (liabilities)", Field::DerivativeLiabilities),
    ("AP2.OTHERLIABILITIES.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Other liabilities", Field::OtherLiabilities),
    ("AP2.DEFERREDINCOMEANDACCRUEDEXPENSES.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Deferred income and accrued expenses", Field::DeferredIncome),
    ("AP2.TOTALLIABILITIES.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Total liabilities", Field::TotalLiabilities),
    ("AP2.FUNDCAPITALCARRIEDFORWARD.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Fund capital carried forward", Field::FundCapitalCarriedForward),
    ("AP2.NETPAYMENTSTOTHENATIONALPENSIONSYSTEM.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Net payments to the national pension system", Field::NetPaymentsToPensionSystem),
    ("AP2.NETRESULTFORTHEPERIOD.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Net result for the period", Field::NetResultForPeriod),
    ("AP2.TOTALFUNDCAPITAL.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Total Fund capital", Field::TotalFundCapital),
    ("AP2.TOTALFUNDCAPITALANDLIABILITIES.FLOW.NONE.H.1@AP2", "AP2 semi-annual: Balance - Total Fund capital and other Liabilities", Field::TotalFundCapitalAndLiabilities),
];

impl OutputSchema {
    pub fn standard() -> Self {
        let mut columns = vec![OutputColumn {
            id: "",
            label: "",
            field: None,
        }];
        columns.extend(STANDARD_COLUMNS.iter().map(|(id, label, field)| OutputColumn {
            id: *id,
            label: *label,
            field: Some(*field),
        }));
        Self { columns }
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, field: Field) -> Option<usize> {
        self.columns.iter().position(|column| column.field == Some(field))
    }
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self::standard()
    }
}
