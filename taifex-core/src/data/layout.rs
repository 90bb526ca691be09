//! Row-layout detection and the two record-extraction strategies.
//!
//! The positioning table has three row shapes:
//!
//! ```text
//! Standard:      | 1 | 臺股期貨 | 自營商 | long vol | long amt | short vol | ... |   (14+ cells)
//! IdentityFirst: | 投信 | long vol | long amt | short vol | ... |                     (rowspan)
//! Short:         | 1 | 臺股期貨 | long vol | short vol | net vol | ... |             (volumes only)
//! ```
//!
//! Column positions come from a header row when one names the fields, and
//! from fixed per-shape offsets otherwise. Header positions win field by field;
//! any field the header does not name falls back to the shape's offset.
//!
//! Two strategies consume the table:
//! - [`Strategy::Aggregate`] walks rows looking for the contract's name cell,
//!   reads that row and the identity rows that follow inside the same block.
//! - [`Strategy::IdentityOffset`] finds the contract's dealer row and steps a
//!   fixed number of rows down to the requested identity.

use super::normalize::{parse_number, Number};
use super::table::{locate_data_table, Row, Table};
use crate::domain::{Contract, FetchTask, FieldKey, Identity, ParsedRecord};
use chrono::NaiveDate;
use thiserror::Error;

// ── Column maps ──────────────────────────────────────────────────────

/// Column index per numeric field. `None` means the field is absent and reads as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    slots: [Option<usize>; 12],
}

impl ColumnMap {
    pub fn get(&self, key: FieldKey) -> Option<usize> {
        self.slots[key.ordinal()]
    }

    pub fn set(&mut self, key: FieldKey, column: usize) {
        self.slots[key.ordinal()] = Some(column);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Twelve consecutive columns starting at `start`, in printed field order.
    pub fn contiguous(start: usize) -> Self {
        let mut map = Self::default();
        for key in FieldKey::ALL {
            map.set(key, start + key.ordinal());
        }
        map
    }

    /// Volumes only at columns 2..=7; amounts are not printed.
    pub fn volumes_only() -> Self {
        let mut map = Self::default();
        for (i, key) in FieldKey::ALL.into_iter().filter(|k| k.is_volume()).enumerate() {
            map.set(key, 2 + i);
        }
        map
    }

    /// Fields present in `self` win; the rest come from `fallback`.
    pub fn or(&self, fallback: &ColumnMap) -> ColumnMap {
        let mut merged = *fallback;
        for key in FieldKey::ALL {
            if let Some(col) = self.get(key) {
                merged.set(key, col);
            }
        }
        merged
    }
}

/// A volume/amount pair sharing one header keyword.
#[derive(Debug, Clone, Copy)]
struct FieldPair {
    volume: FieldKey,
    amount: FieldKey,
}

const LONG_TRADE: FieldPair = FieldPair {
    volume: FieldKey::LongTradeVolume,
    amount: FieldKey::LongTradeAmount,
};
const SHORT_TRADE: FieldPair = FieldPair {
    volume: FieldKey::ShortTradeVolume,
    amount: FieldKey::ShortTradeAmount,
};
const NET_TRADE: FieldPair = FieldPair {
    volume: FieldKey::NetTradeVolume,
    amount: FieldKey::NetTradeAmount,
};
const LONG_OPEN: FieldPair = FieldPair {
    volume: FieldKey::LongOpenVolume,
    amount: FieldKey::LongOpenAmount,
};
const SHORT_OPEN: FieldPair = FieldPair {
    volume: FieldKey::ShortOpenVolume,
    amount: FieldKey::ShortOpenAmount,
};
const NET_OPEN: FieldPair = FieldPair {
    volume: FieldKey::NetOpenVolume,
    amount: FieldKey::NetOpenAmount,
};

/// Header keywords, checked in order against every header cell.
const HEADER_KEYWORDS: &[(&str, FieldPair)] = &[
    ("多方交易", LONG_TRADE),
    ("買方交易", LONG_TRADE),
    ("買進交易", LONG_TRADE),
    ("空方交易", SHORT_TRADE),
    ("賣方交易", SHORT_TRADE),
    ("賣出交易", SHORT_TRADE),
    ("多空淨額交易", NET_TRADE),
    ("買賣淨額交易", NET_TRADE),
    ("交易淨額", NET_TRADE),
    ("多方未平倉", LONG_OPEN),
    ("買方未平倉", LONG_OPEN),
    ("買進未平倉", LONG_OPEN),
    ("空方未平倉", SHORT_OPEN),
    ("賣方未平倉", SHORT_OPEN),
    ("賣出未平倉", SHORT_OPEN),
    ("多空淨額未平倉", NET_OPEN),
    ("買賣淨額未平倉", NET_OPEN),
    ("未平倉淨額", NET_OPEN),
];

const VOLUME_HINTS: &[&str] = &["口數", "數量", "口", "交易量", "成交量"];
const AMOUNT_HINTS: &[&str] = &["金額", "價值", "契約金額", "契約價值"];

/// Build a column map from the first row that mentions any header keyword.
///
/// Returns `None` when no row looks like a header or the header names no
/// volume/amount column.
pub fn header_columns(table: &Table) -> Option<ColumnMap> {
    let header = table.rows.iter().find(|row| {
        let text = row.joined();
        HEADER_KEYWORDS.iter().any(|(kw, _)| text.contains(kw))
    })?;

    let mut map = ColumnMap::default();
    for (i, cell) in header.cells.iter().enumerate() {
        for (kw, pair) in HEADER_KEYWORDS {
            if !cell.text.contains(kw) {
                continue;
            }
            if VOLUME_HINTS.iter().any(|h| cell.text.contains(h)) {
                map.set(pair.volume, i);
            } else if AMOUNT_HINTS.iter().any(|h| cell.text.contains(h)) {
                map.set(pair.amount, i);
            }
        }
    }

    (!map.is_empty()).then_some(map)
}

// ── Layout detection ─────────────────────────────────────────────────

/// Page-level layout, decided once per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// A header row names at least one numeric column.
    HeaderMapped(ColumnMap),
    /// No usable header; columns follow each row's shape.
    Positional,
}

pub fn detect_layout(table: &Table) -> LayoutKind {
    match header_columns(table) {
        Some(map) => LayoutKind::HeaderMapped(map),
        None => LayoutKind::Positional,
    }
}

impl LayoutKind {
    /// Resolve the columns to read for a row of the given shape.
    pub fn columns_for(&self, shape: RowShape) -> ColumnMap {
        let fallback = shape.fallback_columns();
        match self {
            LayoutKind::HeaderMapped(header) => header.or(&fallback),
            LayoutKind::Positional => fallback,
        }
    }
}

/// Shape of an individual data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// Identity label in column 0 (the contract cells are row-spanned above).
    IdentityFirst,
    /// Sequence number, contract name, identity, then twelve values.
    Standard,
    /// Fewer than 14 cells: volumes only.
    Short,
}

impl RowShape {
    /// Minimum cell count of a [`RowShape::Standard`] row.
    pub const STANDARD_MIN_CELLS: usize = 14;

    pub fn classify(cells: &[&str], identity_label: &str) -> RowShape {
        match cells.first() {
            Some(first) if first.contains(identity_label) => RowShape::IdentityFirst,
            _ if cells.len() >= Self::STANDARD_MIN_CELLS => RowShape::Standard,
            _ => RowShape::Short,
        }
    }

    pub fn fallback_columns(self) -> ColumnMap {
        match self {
            RowShape::IdentityFirst => ColumnMap::contiguous(1),
            RowShape::Standard => ColumnMap::contiguous(3),
            RowShape::Short => ColumnMap::volumes_only(),
        }
    }
}

/// Read the mapped columns of one row into a record. Out-of-range columns read as zero.
pub fn read_row(
    cells: &[&str],
    columns: &ColumnMap,
    date: NaiveDate,
    contract: Contract,
    identity_label: &str,
) -> ParsedRecord {
    let mut record = ParsedRecord::empty(date, contract, identity_label);
    for key in FieldKey::ALL {
        let value = columns
            .get(key)
            .and_then(|col| cells.get(col))
            .map(|text| parse_number(text))
            .unwrap_or(Number::ZERO);
        record.set(key, value);
    }
    record
}

// ── Strategies ───────────────────────────────────────────────────────

/// Identity labels captured below a contract's first row by the aggregate scan.
const BLOCK_IDENTITY_LABELS: &[&str] = &["投信", "外資", "投顧"];

/// Rows shorter than this inside a contract block carry no usable values.
const MIN_BLOCK_ROW_CELLS: usize = 8;

/// Rows shorter than this cannot be an identity row.
const MIN_IDENTITY_ROW_CELLS: usize = 5;

/// Scanner position relative to contract blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Searching,
    InContractBlock(Contract),
}

fn is_sequence_number(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Row opens the block of `contract` (name in column 1).
fn opens_block(cells: &[&str], contract: Contract) -> bool {
    cells.get(1).is_some_and(|name| name.contains(contract.table_label()))
}

/// Row opens some contract's block: sequence number, then a known name.
fn opens_any_block(cells: &[&str]) -> bool {
    cells.first().is_some_and(|c| is_sequence_number(c))
        && Contract::ALL.into_iter().any(|c| opens_block(cells, c))
}

/// Aggregate scan: the contract's first row plus the identity rows in its block.
///
/// The first record is the dealer row. An empty result means the contract
/// never appeared.
pub fn parse_aggregate(
    table: &Table,
    layout: &LayoutKind,
    contract: Contract,
    date: NaiveDate,
) -> Vec<ParsedRecord> {
    let mut records = Vec::new();
    let mut state = ScanState::Searching;

    for row in &table.rows {
        let cells = row.texts();
        if cells.len() < 3 {
            continue;
        }

        if opens_block(&cells, contract) {
            state = ScanState::InContractBlock(contract);
            if cells.len() >= MIN_BLOCK_ROW_CELLS {
                let columns = layout.columns_for(RowShape::Standard);
                records.push(read_row(&cells, &columns, date, contract, cells[2]));
            }
            continue;
        }

        let ScanState::InContractBlock(current) = state else {
            continue;
        };
        if cells.len() < MIN_BLOCK_ROW_CELLS {
            continue;
        }

        if !is_sequence_number(cells[0]) && BLOCK_IDENTITY_LABELS.contains(&cells[0]) {
            let columns = layout.columns_for(RowShape::IdentityFirst);
            records.push(read_row(&cells, &columns, date, current, cells[0]));
        } else if opens_any_block(&cells) {
            state = ScanState::Searching;
        }
    }

    records
}

/// The contract's dealer row: mentions the contract and 自營商.
fn is_base_row(row: &Row, contract: Contract) -> bool {
    let text = row.joined();
    let names_contract = text.contains(contract.code()) || text.contains(contract.display_name());
    let confirms = text.contains(contract.code())
        || contract.keywords().iter().any(|kw| text.contains(kw));
    names_contract && confirms && text.contains(Identity::Dealer.label())
}

/// Index of the contract's dealer row.
pub fn find_base_row(table: &Table, contract: Contract) -> Option<usize> {
    table.rows.iter().position(|row| is_base_row(row, contract))
}

/// Identity-offset parse: step `identity.row_offset()` rows below the dealer row.
pub fn parse_identity(
    table: &Table,
    layout: &LayoutKind,
    contract: Contract,
    identity: Identity,
    date: NaiveDate,
) -> Result<ParsedRecord, ParseMiss> {
    let base = find_base_row(table, contract).ok_or(ParseMiss::NoBaseRow)?;
    let target = base + identity.row_offset();
    let row = table
        .rows
        .get(target)
        .ok_or(ParseMiss::RowOutOfRange { index: target })?;

    let cells = row.data_texts();
    if cells.len() < MIN_IDENTITY_ROW_CELLS {
        return Err(ParseMiss::RowTooShort { cells: cells.len() });
    }

    let shape = RowShape::classify(&cells, identity.label());
    let columns = layout.columns_for(shape);
    Ok(read_row(&cells, &columns, date, contract, identity.label()))
}

/// Why a candidate page yielded no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseMiss {
    #[error("page has no table")]
    NoTable,
    #[error("contract row not found")]
    NoContractRow,
    #[error("dealer base row not found")]
    NoBaseRow,
    #[error("identity row {index} beyond table")]
    RowOutOfRange { index: usize },
    #[error("identity row has only {cells} cells")]
    RowTooShort { cells: usize },
}

/// Extraction strategy, chosen from the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Aggregate,
    IdentityOffset(Identity),
}

impl Strategy {
    pub fn for_task(task: &FetchTask) -> Self {
        match task.identity {
            Some(identity) => Strategy::IdentityOffset(identity),
            None => Strategy::Aggregate,
        }
    }

    /// Extract this strategy's record from an already-located table.
    pub fn extract(
        &self,
        table: &Table,
        contract: Contract,
        date: NaiveDate,
    ) -> Result<ParsedRecord, ParseMiss> {
        let layout = detect_layout(table);
        match *self {
            Strategy::Aggregate => parse_aggregate(table, &layout, contract, date)
                .into_iter()
                .next()
                .ok_or(ParseMiss::NoContractRow),
            Strategy::IdentityOffset(identity) => {
                parse_identity(table, &layout, contract, identity, date)
            }
        }
    }
}

/// Locate the data table in a page and extract the task's record.
pub fn extract_record(html: &str, task: &FetchTask) -> Result<ParsedRecord, ParseMiss> {
    let table = locate_data_table(html).ok_or(ParseMiss::NoTable)?;
    Strategy::for_task(task).extract(&table, task.contract, task.date)
}
