//! Post-crawl sanity checks on the result table.
//!
//! Advisory only: flags are logged, the table is never modified.

use serde::Serialize;
use std::collections::BTreeMap;
use taifex_core::domain::{Contract, ParsedRecord, ResultTable};
use tracing::warn;

/// Groups with more records than this are checked for volume outliers.
pub const OUTLIER_MIN_RECORDS: usize = 3;
/// A maximum above this multiple of the group mean is an outlier...
pub const OUTLIER_MEAN_MULTIPLE: f64 = 5.0;
/// ...provided it also exceeds this absolute floor.
pub const OUTLIER_VOLUME_FLOOR: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlagReason {
    /// Several records share one (date, contract, identity).
    Duplicate { date: chrono::NaiveDate, count: usize },
    /// One day's long trade volume dwarfs the group's mean.
    OutlierVolume { max: i64, mean: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyFlag {
    pub contract: Contract,
    pub identity_label: String,
    pub reason: FlagReason,
}

/// Run the duplicate and outlier checks.
pub fn check_consistency(table: &ResultTable) -> Vec<ConsistencyFlag> {
    let mut flags = duplicate_flags(table);
    flags.extend(outlier_flags(table));
    flags
}

fn duplicate_flags(table: &ResultTable) -> Vec<ConsistencyFlag> {
    let mut groups: BTreeMap<(chrono::NaiveDate, Contract, &str), usize> = BTreeMap::new();
    for r in table {
        *groups
            .entry((r.date, r.contract, r.identity_label.as_str()))
            .or_default() += 1;
    }

    groups
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((date, contract, label), count)| ConsistencyFlag {
            contract,
            identity_label: label.to_string(),
            reason: FlagReason::Duplicate { date, count },
        })
        .collect()
}

fn outlier_flags(table: &ResultTable) -> Vec<ConsistencyFlag> {
    let mut groups: BTreeMap<(Contract, &str), Vec<i64>> = BTreeMap::new();
    for r in table {
        groups
            .entry((r.contract, r.identity_label.as_str()))
            .or_default()
            .push(r.long_trade_volume);
    }

    groups
        .into_iter()
        .filter(|(_, volumes)| volumes.len() > OUTLIER_MIN_RECORDS)
        .filter_map(|((contract, label), volumes)| {
            let max = volumes.iter().copied().max()?;
            let mean = volumes.iter().sum::<i64>() as f64 / volumes.len() as f64;
            let is_outlier =
                max as f64 > OUTLIER_MEAN_MULTIPLE * mean && max as f64 > OUTLIER_VOLUME_FLOOR;
            is_outlier.then(|| ConsistencyFlag {
                contract,
                identity_label: label.to_string(),
                reason: FlagReason::OutlierVolume { max, mean },
            })
        })
        .collect()
}

/// Emit one warning per flag.
pub fn log_flags(flags: &[ConsistencyFlag]) {
    for flag in flags {
        match &flag.reason {
            FlagReason::Duplicate { date, count } => warn!(
                contract = %flag.contract,
                identity = %flag.identity_label,
                %date,
                count,
                "duplicate records"
            ),
            FlagReason::OutlierVolume { max, mean } => warn!(
                contract = %flag.contract,
                identity = %flag.identity_label,
                max,
                mean = %format!("{mean:.1}"),
                "long trade volume outlier"
            ),
        }
    }
}

/// Records whose printed net trade volume differs from long minus short.
///
/// The printed net is what gets stored; this only surfaces disagreement.
pub fn net_volume_mismatches(table: &ResultTable) -> Vec<&ParsedRecord> {
    table
        .iter()
        .filter(|r| r.net_trade_volume != r.long_trade_volume - r.short_trade_volume)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use taifex_core::data::Number;
    use taifex_core::domain::{FieldKey, Identity};

    fn rec(day: u32, contract: Contract, identity: Identity, long: i64) -> ParsedRecord {
        let date = NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        let mut r = ParsedRecord::empty(date, contract, identity.label());
        r.set(FieldKey::LongTradeVolume, Number::Int(long));
        r.set(FieldKey::NetTradeVolume, Number::Int(long));
        r
    }

    #[test]
    fn one_duplicate_flag_per_shared_key() {
        let table: ResultTable = vec![
            rec(1, Contract::Tx, Identity::Dealer, 10),
            rec(1, Contract::Tx, Identity::Dealer, 10),
            rec(1, Contract::Tx, Identity::Foreign, 10),
            rec(2, Contract::Tx, Identity::Dealer, 10),
        ]
        .into_iter()
        .collect();

        let flags = check_consistency(&table);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].contract, Contract::Tx);
        assert_eq!(flags[0].identity_label, "自營商");
        assert!(matches!(flags[0].reason, FlagReason::Duplicate { count: 2, .. }));
    }

    #[test]
    fn distinct_keys_have_no_flags() {
        let table: ResultTable = (1..=3)
            .map(|d| rec(d, Contract::Te, Identity::InvestmentTrust, 100))
            .collect();
        assert!(check_consistency(&table).is_empty());
    }

    #[test]
    fn outlier_needs_multiple_and_floor() {
        let spiky: ResultTable = [100, 100, 100, 100, 100, 5000]
            .into_iter()
            .enumerate()
            .map(|(i, v)| rec(i as u32 + 1, Contract::Mtx, Identity::Foreign, v))
            .collect();
        let flags = check_consistency(&spiky);
        assert_eq!(flags.len(), 1);
        assert!(matches!(
            flags[0].reason,
            FlagReason::OutlierVolume { max: 5000, .. }
        ));

        // Same shape below the absolute floor.
        let small: ResultTable = [1, 1, 1, 1, 1, 900]
            .into_iter()
            .enumerate()
            .map(|(i, v)| rec(i as u32 + 1, Contract::Mtx, Identity::Foreign, v))
            .collect();
        assert!(check_consistency(&small).is_empty());
    }

    #[test]
    fn small_groups_skip_outlier_check() {
        let table: ResultTable = [1, 1, 9000]
            .into_iter()
            .enumerate()
            .map(|(i, v)| rec(i as u32 + 1, Contract::Tx, Identity::Dealer, v))
            .collect();
        assert!(check_consistency(&table).is_empty());
    }

    #[test]
    fn mismatch_report_leaves_table_alone() {
        let mut off = rec(1, Contract::Tx, Identity::Dealer, 50);
        off.set(FieldKey::ShortTradeVolume, Number::Int(20));
        off.set(FieldKey::NetTradeVolume, Number::Int(25));
        let table: ResultTable = vec![off, rec(2, Contract::Tx, Identity::Dealer, 7)]
            .into_iter()
            .collect();
        let before = table.clone();

        let mismatches = net_volume_mismatches(&table);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].net_trade_volume, 25);
        assert_eq!(table, before);
    }

    proptest! {
        /// One duplicate flag per key seen more than once, carrying that key's count.
        #[test]
        fn duplicate_flags_match_repeated_keys(
            keys in prop::collection::vec((1u32..=5, 0usize..5, 0usize..3), 0..40)
        ) {
            let table: ResultTable = keys
                .iter()
                .map(|&(day, c, i)| rec(day, Contract::ALL[c], Identity::ALL[i], 10))
                .collect();

            let mut seen: HashMap<(u32, usize, usize), usize> = HashMap::new();
            for key in &keys {
                *seen.entry(*key).or_default() += 1;
            }
            let repeated = seen.values().filter(|n| **n > 1).count();

            let duplicates: Vec<_> = check_consistency(&table)
                .into_iter()
                .filter_map(|f| match f.reason {
                    FlagReason::Duplicate { date, count } => Some((date, f.contract, f.identity_label, count)),
                    FlagReason::OutlierVolume { .. } => None,
                })
                .collect();

            prop_assert_eq!(duplicates.len(), repeated);
            for (date, contract, label, count) in duplicates {
                let expected = table
                    .iter()
                    .filter(|r| r.date == date && r.contract == contract && r.identity_label == label)
                    .count();
                prop_assert_eq!(count, expected);
            }
        }
    }
}
