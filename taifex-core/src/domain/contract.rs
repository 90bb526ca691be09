//! Futures contracts and trader identities published on the positioning page.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Futures contract published in the positioning table.
///
/// Declaration order is the exchange's own listing order and drives
/// presentation sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Contract {
    /// TAIEX futures.
    Tx,
    /// Electronic sector futures.
    Te,
    /// Mini-TAIEX futures.
    Mtx,
    /// Micro-TAIEX futures.
    Zmx,
    /// US Nasdaq-100 futures.
    Nqf,
}

impl Contract {
    pub const ALL: [Contract; 5] = [
        Contract::Tx,
        Contract::Te,
        Contract::Mtx,
        Contract::Zmx,
        Contract::Nqf,
    ];

    /// Exchange commodity code, sent as `commodity_id`.
    pub fn code(self) -> &'static str {
        match self {
            Contract::Tx => "TX",
            Contract::Te => "TE",
            Contract::Mtx => "MTX",
            Contract::Zmx => "ZMX",
            Contract::Nqf => "NQF",
        }
    }

    /// Full product name as the exchange prints it.
    pub fn display_name(self) -> &'static str {
        match self {
            Contract::Tx => "臺股期貨",
            Contract::Te => "電子期貨",
            Contract::Mtx => "小型臺指期貨",
            Contract::Zmx => "微型臺指期貨",
            Contract::Nqf => "美國那斯達克100期貨",
        }
    }

    /// Substring that identifies this contract in the name column of the
    /// all-identities table. Shorter than the display name because the
    /// table truncates some names.
    pub fn table_label(self) -> &'static str {
        match self {
            Contract::Tx => "臺股期貨",
            Contract::Te => "電子期貨",
            Contract::Mtx => "小型臺指",
            Contract::Zmx => "微型臺指",
            Contract::Nqf => "那斯達克",
        }
    }

    /// Alternate spellings used to confirm a base-row match.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Contract::Tx => &["臺指期", "台指期", "臺股期", "台股期"],
            Contract::Te => &["電子期"],
            Contract::Mtx => &["小型臺指", "小型台指", "小臺指", "小台指"],
            Contract::Zmx => &["微型臺指", "微型台指", "微臺指", "微台指"],
            Contract::Nqf => &["那斯達克", "Nasdaq", "美國那斯達克"],
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Trader category a position row is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// 自營商, proprietary dealers. Always the first row of a contract block.
    Dealer,
    /// 投信, securities investment trusts.
    InvestmentTrust,
    /// 外資, foreign institutional investors.
    Foreign,
}

impl Identity {
    pub const ALL: [Identity; 3] = [Identity::Dealer, Identity::InvestmentTrust, Identity::Foreign];

    /// Label as printed in the identity column.
    pub fn label(self) -> &'static str {
        match self {
            Identity::Dealer => "自營商",
            Identity::InvestmentTrust => "投信",
            Identity::Foreign => "外資",
        }
    }

    /// Row distance from the contract's dealer row.
    pub fn row_offset(self) -> usize {
        match self {
            Identity::Dealer => 0,
            Identity::InvestmentTrust => 1,
            Identity::Foreign => 2,
        }
    }

    /// Resolve a printed label back to an identity.
    pub fn from_label(label: &str) -> Option<Identity> {
        Identity::ALL.into_iter().find(|i| i.label() == label)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDomainError {
    #[error("unknown contract code '{0}' (expected one of TX, TE, MTX, ZMX, NQF)")]
    UnknownContract(String),
    #[error("unknown identity '{0}' (expected 自營商, 投信, 外資 or dealer, trust, foreign)")]
    UnknownIdentity(String),
}

impl FromStr for Contract {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Contract::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| ParseDomainError::UnknownContract(s.to_string()))
    }
}

impl FromStr for Identity {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(identity) = Identity::from_label(s) {
            return Ok(identity);
        }
        match s.to_ascii_lowercase().as_str() {
            "dealer" | "dealers" => Ok(Identity::Dealer),
            "trust" | "investment_trust" => Ok(Identity::InvestmentTrust),
            "foreign" | "fini" => Ok(Identity::Foreign),
            _ => Err(ParseDomainError::UnknownIdentity(s.to_string())),
        }
    }
}
