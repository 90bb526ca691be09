//! Page acquisition and parsing

pub mod classify;
pub mod fetcher;
pub mod layout;
pub mod normalize;
pub mod provider;
pub mod table;
pub mod taifex;

pub use classify::{classify_page, PageClass};
pub use fetcher::{FetchOutcome, Fetcher, RecordFetcher, RetryPolicy};
pub use layout::{
    detect_layout, extract_record, parse_aggregate, parse_identity, ColumnMap, LayoutKind,
    ParseMiss, RowShape, ScanState, Strategy,
};
pub use normalize::{parse_number, Number};
pub use provider::{FetchError, PageQuery, PageSource, RawPage};
pub use table::{locate_data_table, Cell, Row, Table};
pub use taifex::{HttpPageSource, DEFAULT_BASE_URL};
