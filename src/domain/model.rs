use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShareType {
    Equity,
    Bonus,
    Dividend,
}

impl ShareType {
    pub const ALL: [ShareType; 3] = [ShareType::Equity, ShareType::Bonus, ShareType::Dividend];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareType::Equity => "Equity",
            ShareType::Bonus => "Bonus",
            ShareType::Dividend => "Dividend",
        }
    }
}

impl FromStr for ShareType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShareType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown share type '{}'", s))
    }
}

impl fmt::Display for ShareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a listing within one market. Displays as `Type-ID`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShareKey {
    pub share_type: ShareType,
    pub share_id: String,
}

impl ShareKey {
    pub fn new(share_type: ShareType, share_id: impl Into<String>) -> Self {
        Self {
            share_type,
            share_id: share_id.into(),
        }
    }
}

impl fmt::Display for ShareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.share_type, self.share_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub share_id: String,
    pub share_type: ShareType,
    pub available: u32,
    pub total: u32,
    pub origin_market: String,
    pub buyers: BTreeSet<String>,
}

impl Share {
    pub fn new(
        share_id: impl Into<String>,
        share_type: ShareType,
        capacity: u32,
        origin_market: impl Into<String>,
    ) -> Self {
        Self {
            share_id: share_id.into(),
            share_type,
            available: capacity,
            total: capacity,
            origin_market: origin_market.into(),
            buyers: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> ShareKey {
        ShareKey::new(self.share_type, self.share_id.clone())
    }

    pub fn reserve(&mut self, count: u32) -> bool {
        if self.available < count {
            return false;
        }
        self.available -= count;
        true
    }

    /// Capacity never grows past what was listed.
    pub fn release(&mut self, count: u32) {
        self.available = self.available.saturating_add(count).min(self.total);
    }

    pub fn has_buyer(&self, buyer_id: &str) -> bool {
        self.buyers.contains(buyer_id)
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Share ID: {}, Type: {}, Available: {}, Market: {}]",
            self.share_id, self.share_type, self.available, self.origin_market
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub name: String,
    pub code: String,
}

impl MarketInfo {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Buyer,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Buyer => "Buyer",
        }
    }
}

/// An admin or buyer ID such as `NYKA1234`; the first three letters name the home market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    pub id: String,
    pub market_code: String,
}

impl UserId {
    pub fn parse(id: &str, known_codes: &[&str]) -> Option<Self> {
        let id = id.trim();
        let prefix = id.get(0..3)?;
        known_codes.iter().find(|code| **code == prefix).map(|code| Self {
            id: id.to_string(),
            market_code: (*code).to_string(),
        })
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
