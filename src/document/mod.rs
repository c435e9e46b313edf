// src/document/mod.rs
pub mod model;
pub mod reader;
pub mod source;

pub use model::{Document, Page, ReportType, Rule, TextFragment, TextLine};
pub use reader::read_document;
pub use source::{discover, DocumentFile};
