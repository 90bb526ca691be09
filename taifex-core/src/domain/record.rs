//! Tasks, parsed positioning records, and the per-crawl result table.

use super::contract::{Contract, Identity};
use crate::data::normalize::Number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One unit of crawl work: a (date, contract, identity) query.
///
/// `identity == None` requests the contract-level (aggregate) parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FetchTask {
    pub date: NaiveDate,
    pub contract: Contract,
    pub identity: Option<Identity>,
}

impl FetchTask {
    pub fn new(date: NaiveDate, contract: Contract, identity: Option<Identity>) -> Self {
        Self {
            date,
            contract,
            identity,
        }
    }

    /// Short human-readable label for log lines.
    pub fn describe(&self) -> String {
        match self.identity {
            Some(identity) => format!("{} {} {}", self.date, self.contract, identity),
            None => format!("{} {} (all)", self.date, self.contract),
        }
    }
}

/// Which part of the table the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    /// Trade volume/amount and open interest.
    #[default]
    Complete,
    /// Trade volume/amount only. Published earlier in the afternoon than
    /// open interest; open-interest fields are left at zero.
    Trading,
}

/// The twelve numeric columns of a positioning row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    LongTradeVolume,
    LongTradeAmount,
    ShortTradeVolume,
    ShortTradeAmount,
    NetTradeVolume,
    NetTradeAmount,
    LongOpenVolume,
    LongOpenAmount,
    ShortOpenVolume,
    ShortOpenAmount,
    NetOpenVolume,
    NetOpenAmount,
}

impl FieldKey {
    /// All fields in printed column order.
    pub const ALL: [FieldKey; 12] = [
        FieldKey::LongTradeVolume,
        FieldKey::LongTradeAmount,
        FieldKey::ShortTradeVolume,
        FieldKey::ShortTradeAmount,
        FieldKey::NetTradeVolume,
        FieldKey::NetTradeAmount,
        FieldKey::LongOpenVolume,
        FieldKey::LongOpenAmount,
        FieldKey::ShortOpenVolume,
        FieldKey::ShortOpenAmount,
        FieldKey::NetOpenVolume,
        FieldKey::NetOpenAmount,
    ];

    /// Position in printed column order (0..12).
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn is_volume(self) -> bool {
        self.ordinal() % 2 == 0
    }

    pub fn is_open_interest(self) -> bool {
        self.ordinal() >= 6
    }

    /// snake_case column name used by exports.
    pub fn column_name(self) -> &'static str {
        match self {
            FieldKey::LongTradeVolume => "long_trade_volume",
            FieldKey::LongTradeAmount => "long_trade_amount",
            FieldKey::ShortTradeVolume => "short_trade_volume",
            FieldKey::ShortTradeAmount => "short_trade_amount",
            FieldKey::NetTradeVolume => "net_trade_volume",
            FieldKey::NetTradeAmount => "net_trade_amount",
            FieldKey::LongOpenVolume => "long_open_volume",
            FieldKey::LongOpenAmount => "long_open_amount",
            FieldKey::ShortOpenVolume => "short_open_volume",
            FieldKey::ShortOpenAmount => "short_open_amount",
            FieldKey::NetOpenVolume => "net_open_volume",
            FieldKey::NetOpenAmount => "net_open_amount",
        }
    }
}

/// One identity's positioning for one contract on one date.
///
/// Volumes are contract counts; amounts are in thousands of NTD as printed.
/// Net fields hold the printed value and are never recomputed from long/short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub date: NaiveDate,
    pub contract: Contract,
    pub identity_label: String,
    pub long_trade_volume: i64,
    pub long_trade_amount: f64,
    pub short_trade_volume: i64,
    pub short_trade_amount: f64,
    pub net_trade_volume: i64,
    pub net_trade_amount: f64,
    pub long_open_volume: i64,
    pub long_open_amount: f64,
    pub short_open_volume: i64,
    pub short_open_amount: f64,
    pub net_open_volume: i64,
    pub net_open_amount: f64,
}

impl ParsedRecord {
    /// A record with every numeric field at zero.
    pub fn empty(date: NaiveDate, contract: Contract, identity_label: impl Into<String>) -> Self {
        Self {
            date,
            contract,
            identity_label: identity_label.into(),
            long_trade_volume: 0,
            long_trade_amount: 0.0,
            short_trade_volume: 0,
            short_trade_amount: 0.0,
            net_trade_volume: 0,
            net_trade_amount: 0.0,
            long_open_volume: 0,
            long_open_amount: 0.0,
            short_open_volume: 0,
            short_open_amount: 0.0,
            net_open_volume: 0,
            net_open_amount: 0.0,
        }
    }

    pub fn set(&mut self, key: FieldKey, value: Number) {
        match key {
            FieldKey::LongTradeVolume => self.long_trade_volume = value.as_i64(),
            FieldKey::LongTradeAmount => self.long_trade_amount = value.as_f64(),
            FieldKey::ShortTradeVolume => self.short_trade_volume = value.as_i64(),
            FieldKey::ShortTradeAmount => self.short_trade_amount = value.as_f64(),
            FieldKey::NetTradeVolume => self.net_trade_volume = value.as_i64(),
            FieldKey::NetTradeAmount => self.net_trade_amount = value.as_f64(),
            FieldKey::LongOpenVolume => self.long_open_volume = value.as_i64(),
            FieldKey::LongOpenAmount => self.long_open_amount = value.as_f64(),
            FieldKey::ShortOpenVolume => self.short_open_volume = value.as_i64(),
            FieldKey::ShortOpenAmount => self.short_open_amount = value.as_f64(),
            FieldKey::NetOpenVolume => self.net_open_volume = value.as_i64(),
            FieldKey::NetOpenAmount => self.net_open_amount = value.as_f64(),
        }
    }

    pub fn get(&self, key: FieldKey) -> f64 {
        match key {
            FieldKey::LongTradeVolume => self.long_trade_volume as f64,
            FieldKey::LongTradeAmount => self.long_trade_amount,
            FieldKey::ShortTradeVolume => self.short_trade_volume as f64,
            FieldKey::ShortTradeAmount => self.short_trade_amount,
            FieldKey::NetTradeVolume => self.net_trade_volume as f64,
            FieldKey::NetTradeAmount => self.net_trade_amount,
            FieldKey::LongOpenVolume => self.long_open_volume as f64,
            FieldKey::LongOpenAmount => self.long_open_amount,
            FieldKey::ShortOpenVolume => self.short_open_volume as f64,
            FieldKey::ShortOpenAmount => self.short_open_amount,
            FieldKey::NetOpenVolume => self.net_open_volume as f64,
            FieldKey::NetOpenAmount => self.net_open_amount,
        }
    }

    /// Zero the open-interest half of the record.
    pub fn restrict_to(mut self, scope: DataScope) -> Self {
        if scope == DataScope::Trading {
            for key in FieldKey::ALL.into_iter().filter(|k| k.is_open_interest()) {
                self.set(key, Number::ZERO);
            }
        }
        self
    }

    /// Presentation sort key: date, contract, then identity in table order.
    /// Labels that are not one of the three identities sort after them.
    fn sort_key(&self) -> (NaiveDate, Contract, usize, &str) {
        let rank = Identity::from_label(&self.identity_label)
            .map(Identity::row_offset)
            .unwrap_or(usize::MAX);
        (self.date, self.contract, rank, self.identity_label.as_str())
    }
}

/// Append-only collection of parsed records for one crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    records: Vec<ParsedRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ParsedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ParsedRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsedRecord> {
        self.records.iter()
    }

    /// Sort by date, contract, identity. Stable, so duplicates keep arrival order.
    pub fn sort_for_presentation(&mut self) {
        self.records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// BLAKE3 hash over the sorted table content.
    ///
    /// Independent of arrival order, so two crawls of the same pages hash equal.
    pub fn content_hash(&self) -> String {
        let mut sorted = self.clone();
        sorted.sort_for_presentation();

        let mut hasher = blake3::Hasher::new();
        for r in &sorted.records {
            hasher.update(r.date.to_string().as_bytes());
            hasher.update(r.contract.code().as_bytes());
            hasher.update(r.identity_label.as_bytes());
            for key in FieldKey::ALL {
                hasher.update(&r.get(key).to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn into_records(self) -> Vec<ParsedRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ParsedRecord;
    type IntoIter = std::slice::Iter<'a, ParsedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<ParsedRecord> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ParsedRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
