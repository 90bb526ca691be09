//! Integration tests for page parsing and fetching against a saved exchange page.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicU32, Ordering};
use taifex_core::data::{
    classify_page, detect_layout, extract_record, locate_data_table, parse_aggregate, FetchError,
    FetchOutcome, Fetcher, LayoutKind, PageClass, PageQuery, PageSource, ParseMiss, RawPage,
    RecordFetcher, RetryPolicy,
};
use taifex_core::domain::{Contract, DataScope, FetchTask, FieldKey, Identity};

const FIXTURE: &str = include_str!("fixtures/fut_contracts_2024-06-03.html");

fn fixture_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

/// Serves the fixture for every query and counts requests.
struct FixtureSource {
    body: &'static str,
    calls: AtomicU32,
}

impl FixtureSource {
    fn new(body: &'static str) -> Self {
        Self {
            body,
            calls: AtomicU32::new(0),
        }
    }
}

impl PageSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn get(&self, _query: &PageQuery) -> Result<RawPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawPage::ok(self.body))
    }
}

#[test]
fn fixture_is_a_candidate_page() {
    assert_eq!(classify_page(FIXTURE), PageClass::Candidate);
    let table = locate_data_table(FIXTURE).unwrap();
    assert_eq!(table.rows.len(), 12, "3 header rows + 3 contracts x 3 identities");
    assert_eq!(detect_layout(&table), LayoutKind::Positional);
}

#[test]
fn aggregate_scan_reads_each_contract_block() {
    let table = locate_data_table(FIXTURE).unwrap();
    let layout = detect_layout(&table);

    let tx = parse_aggregate(&table, &layout, Contract::Tx, fixture_date());
    assert_eq!(tx.len(), 3);
    assert_eq!(tx[0].identity_label, "自營商");
    assert_eq!(tx[0].long_trade_volume, 14_052);
    assert_eq!(tx[0].long_trade_amount, 58_446_917.0);
    assert_eq!(tx[0].net_open_volume, 6_118);
    assert_eq!(tx[2].identity_label, "外資");
    assert_eq!(tx[2].net_open_volume, -21_728);

    let mtx = parse_aggregate(&table, &layout, Contract::Mtx, fixture_date());
    assert_eq!(mtx[1].identity_label, "投信");
    assert_eq!(mtx[1].short_trade_volume, 45);

    assert!(parse_aggregate(&table, &layout, Contract::Zmx, fixture_date()).is_empty());
}

#[test]
fn identity_tasks_match_aggregate_rows() {
    let table = locate_data_table(FIXTURE).unwrap();
    let layout = detect_layout(&table);

    for contract in [Contract::Tx, Contract::Te, Contract::Mtx] {
        let block = parse_aggregate(&table, &layout, contract, fixture_date());
        for identity in Identity::ALL {
            let task = FetchTask::new(fixture_date(), contract, Some(identity));
            let record = extract_record(FIXTURE, &task).unwrap();
            let expected = &block[identity.row_offset()];
            assert_eq!(record.identity_label, identity.label());
            for key in FieldKey::ALL {
                assert_eq!(
                    record.get(key),
                    expected.get(key),
                    "{contract} {identity} {key:?}"
                );
            }
        }
    }
}

#[test]
fn printed_net_matches_long_minus_short_in_fixture() {
    let table = locate_data_table(FIXTURE).unwrap();
    let layout = detect_layout(&table);
    for contract in [Contract::Tx, Contract::Te, Contract::Mtx] {
        for r in parse_aggregate(&table, &layout, contract, fixture_date()) {
            assert_eq!(r.net_trade_volume, r.long_trade_volume - r.short_trade_volume);
            assert_eq!(r.net_open_volume, r.long_open_volume - r.short_open_volume);
        }
    }
}

#[test]
fn absent_contract_misses_base_row() {
    let task = FetchTask::new(fixture_date(), Contract::Nqf, Some(Identity::Foreign));
    assert_eq!(extract_record(FIXTURE, &task), Err(ParseMiss::NoBaseRow));
}

#[test]
fn fetcher_over_fixture_source() {
    let fetcher = Fetcher::new(
        FixtureSource::new(FIXTURE),
        RetryPolicy::immediate(3),
        DataScope::Complete,
    );

    let task = FetchTask::new(fixture_date(), Contract::Te, Some(Identity::Foreign));
    let outcome = fetcher.fetch(&task);
    let record = outcome.record().unwrap();
    assert_eq!(record.contract, Contract::Te);
    assert_eq!(record.long_trade_volume, 2_907);
    assert_eq!(record.net_open_amount, -4_428_069.0);
    assert_eq!(fetcher.source().calls.load(Ordering::SeqCst), 1);
}

#[test]
fn fetcher_counts_no_data_and_error_attempts() {
    let no_data = Fetcher::new(
        FixtureSource::new("<html><body><p>查無資料</p></body></html>"),
        RetryPolicy::immediate(4),
        DataScope::Complete,
    );
    let task = FetchTask::new(fixture_date(), Contract::Tx, None);
    assert_eq!(no_data.fetch(&task), FetchOutcome::NoData);
    assert_eq!(no_data.source().calls.load(Ordering::SeqCst), 1);

    let error = Fetcher::new(
        FixtureSource::new("<html><body><p>請輸入正確的日期</p></body></html>"),
        RetryPolicy::immediate(4),
        DataScope::Complete,
    );
    assert!(matches!(
        error.fetch(&task),
        FetchOutcome::Failed {
            attempts: 4,
            reason: FetchError::ErrorPage
        }
    ));
    assert_eq!(error.source().calls.load(Ordering::SeqCst), 4);
}
