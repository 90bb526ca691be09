//! Domain types for the positioning crawler

pub mod contract;
pub mod record;

pub use contract::{Contract, Identity, ParseDomainError};
pub use record::{DataScope, FetchTask, FieldKey, ParsedRecord, ResultTable};
