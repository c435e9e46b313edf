// src/extractors/mod.rs
use std::collections::BTreeMap;

use crate::catalogue::Field;

pub mod chain;
pub mod grid;
pub mod locator;
pub mod number;
pub mod proximity;
pub mod resolver;
pub mod secondary;

/// Field values produced by a single strategy or resolver pass.
pub type FieldValues = BTreeMap<Field, Value>;

// Re-export key extraction types for convenience
pub use chain::{
    Attempt,
    Candidate,
    ExtractionChain,
    ExtractionStrategy,
    ProximityStrategy,
    SecondaryStrategy,
    StructuralGridStrategy,
    TextLinesStrategy,
};
pub use grid::{Grid, GridOrigin, ScoredGrid};
pub use locator::{locate, PageMatch, Rubric};
pub use number::{parse_number, Value};
pub use resolver::Section;
pub use secondary::{CompletionBackend, OpenRouterBackend, SecondaryExtractor};
