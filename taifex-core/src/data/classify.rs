//! Page classification by in-body markers.
//!
//! The exchange answers 200 for every query. Whether a page carries data, an
//! explicit "no data" notice, or an error is only visible in the body text.

/// Phrases the exchange prints when the query is valid but has nothing to show.
pub const NO_DATA_MARKERS: &[&str] = &[
    "查無資料",
    "無交易資料",
    "尚無資料",
    "無此資料",
    "No data",
    "不存在",
    "不提供",
    "維護中",
];

/// Phrases printed for malformed queries or transient server faults.
pub const ERROR_MARKERS: &[&str] = &[
    "系統發生錯誤",
    "查詢發生錯誤",
    "日期錯誤",
    "請輸入正確的日期",
    "Error occurred",
    "資料錯誤",
    "錯誤代碼",
    "伺服器錯誤",
    "Server Error",
    "無法處理您的請求",
];

/// Outcome of scanning a page body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    /// Terminal: the exchange has no data for this query. Not retried.
    NoData,
    /// Transient or malformed-query error page. Retried.
    Error,
    /// Neither marker set matched; hand the page to the table parser.
    Candidate,
}

/// Classify a page body. No-data markers take precedence over error markers.
pub fn classify_page(html: &str) -> PageClass {
    if NO_DATA_MARKERS.iter().any(|m| html.contains(m)) {
        PageClass::NoData
    } else if ERROR_MARKERS.iter().any(|m| html.contains(m)) {
        PageClass::Error
    } else {
        PageClass::Candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_sets_are_disjoint() {
        for m in NO_DATA_MARKERS {
            assert!(!ERROR_MARKERS.contains(m));
            assert_eq!(classify_page(m), PageClass::NoData);
        }
        for m in ERROR_MARKERS {
            assert_eq!(classify_page(m), PageClass::Error, "marker {m}");
        }
    }

    #[test]
    fn no_data_wins_over_error() {
        let page = "<p>日期錯誤</p><p>查無資料</p>";
        assert_eq!(classify_page(page), PageClass::NoData);
    }

    #[test]
    fn plain_table_is_candidate() {
        let page = "<table><tr><td>1</td><td>臺股期貨</td></tr></table>";
        assert_eq!(classify_page(page), PageClass::Candidate);
    }
}
