use crate::domain::model::{Share, ShareKey, ShareType};
use crate::utils::error::{TradeError, TradeResult};
use std::collections::BTreeMap;

/// A completed purchase or sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub key: ShareKey,
    pub quantity: u32,
}

/// Result of probing a listing for a swap of `required` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapCheck {
    Available,
    NotFound,
    Short { required: u32, available: u32 },
}

/// Listed shares and buyer holdings of one market.
#[derive(Debug, Clone)]
pub struct Ledger {
    market: String,
    shares: BTreeMap<ShareType, BTreeMap<String, Share>>,
    holdings: BTreeMap<String, BTreeMap<ShareKey, u32>>,
}

pub(crate) fn check_identifier(value: &str) -> TradeResult<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(TradeError::InvalidIdentifier(value.to_string()));
    }
    Ok(())
}

fn check_quantity(quantity: i32) -> TradeResult<u32> {
    if quantity <= 0 {
        return Err(TradeError::InvalidQuantity(quantity));
    }
    Ok(quantity as u32)
}

impl Ledger {
    pub fn new(market: impl Into<String>) -> Self {
        let shares = ShareType::ALL
            .into_iter()
            .map(|t| (t, BTreeMap::new()))
            .collect();
        Self {
            market: market.into(),
            shares,
            holdings: BTreeMap::new(),
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn share(&self, key: &ShareKey) -> Option<&Share> {
        self.shares.get(&key.share_type)?.get(&key.share_id)
    }

    fn share_mut(&mut self, key: &ShareKey) -> Option<&mut Share> {
        self.shares.get_mut(&key.share_type)?.get_mut(&key.share_id)
    }

    pub fn add_share(
        &mut self,
        share_id: &str,
        share_type: &str,
        capacity: i32,
    ) -> TradeResult<ShareKey> {
        check_identifier(share_id)?;
        let Ok(share_type) = share_type.parse::<ShareType>() else {
            return Err(TradeError::UnsupportedShareType {
                share_type: share_type.to_string(),
                share_id: share_id.to_string(),
            });
        };
        let key = ShareKey::new(share_type, share_id);
        if self.share(&key).is_some() {
            return Err(TradeError::ShareExists {
                share_id: share_id.to_string(),
                share_type: share_type.to_string(),
            });
        }
        if capacity < 0 {
            return Err(TradeError::InvalidCapacity(capacity));
        }

        let mut share = Share::new(share_id, share_type, capacity as u32, self.market.clone());
        // Holdings survive removal, so a re-listed share starts with its existing holders.
        share.buyers = self
            .holdings
            .iter()
            .filter(|(_, held)| held.contains_key(&key))
            .map(|(buyer, _)| buyer.clone())
            .collect();
        self.shares
            .entry(share_type)
            .or_default()
            .insert(share_id.to_string(), share);
        Ok(key)
    }

    /// Holdings of a removed share are kept; the buyer can no longer sell them here.
    pub fn remove_share(&mut self, share_id: &str, share_type: &str) -> TradeResult<Share> {
        let Ok(share_type) = share_type.parse::<ShareType>() else {
            return Err(TradeError::ShareNotAvailable(format!(
                "{}-{}",
                share_type, share_id
            )));
        };
        self.shares
            .get_mut(&share_type)
            .and_then(|listing| listing.remove(share_id))
            .ok_or_else(|| {
                TradeError::ShareNotAvailable(ShareKey::new(share_type, share_id).to_string())
            })
    }

    pub fn listings(&self, share_type: ShareType) -> impl Iterator<Item = &Share> {
        self.shares
            .get(&share_type)
            .into_iter()
            .flat_map(|listing| listing.values())
    }

    pub fn purchase(
        &mut self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        quantity: i32,
    ) -> TradeResult<Trade> {
        check_identifier(buyer_id)?;
        let quantity = check_quantity(quantity)?;
        let key = share_type
            .parse::<ShareType>()
            .ok()
            .map(|t| ShareKey::new(t, share_id))
            .filter(|key| self.share(key).is_some())
            .ok_or_else(|| TradeError::ShareNotAvailable(format!("{}-{}", share_type, share_id)))?;

        let share = self
            .share_mut(&key)
            .ok_or_else(|| TradeError::ShareNotAvailable(key.to_string()))?;
        if !share.reserve(quantity) {
            return Err(TradeError::InsufficientCapacity(key.to_string()));
        }
        share.buyers.insert(buyer_id.to_string());
        self.credit(buyer_id, &key, quantity);

        Ok(Trade { key, quantity })
    }

    pub fn sell(
        &mut self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        quantity: i32,
    ) -> TradeResult<Trade> {
        check_identifier(buyer_id)?;
        let quantity = check_quantity(quantity)?;
        let key = share_type
            .parse::<ShareType>()
            .ok()
            .map(|t| ShareKey::new(t, share_id))
            .filter(|key| self.share(key).is_some())
            .ok_or_else(|| TradeError::ShareNotFound(share_id.to_string()))?;

        let held = self.holding(buyer_id, &key);
        if held < quantity {
            return Err(TradeError::InsufficientHoldings);
        }

        self.debit(buyer_id, &key, quantity);
        if let Some(share) = self.share_mut(&key) {
            share.release(quantity);
        }
        Ok(Trade { key, quantity })
    }

    pub fn holding(&self, buyer_id: &str, key: &ShareKey) -> u32 {
        self.holdings
            .get(buyer_id)
            .and_then(|held| held.get(key))
            .copied()
            .unwrap_or(0)
    }

    pub fn holdings_of(&self, buyer_id: &str) -> Vec<(ShareKey, u32)> {
        self.holdings
            .get(buyer_id)
            .map(|held| held.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    pub fn check_swap(&self, key: &ShareKey, required: u32) -> SwapCheck {
        match self.share(key) {
            None => SwapCheck::NotFound,
            Some(share) if share.available < required => SwapCheck::Short {
                required,
                available: share.available,
            },
            Some(_) => SwapCheck::Available,
        }
    }

    /// Incoming side of a cross-market swap: reserve `count` units of `key` for the buyer.
    pub fn accept_swap(&mut self, buyer_id: &str, key: &ShareKey, count: u32) -> SwapCheck {
        let check = self.check_swap(key, count);
        if check != SwapCheck::Available {
            return check;
        }
        if let Some(share) = self.share_mut(key) {
            share.reserve(count);
            share.buyers.insert(buyer_id.to_string());
        }
        self.credit(buyer_id, key, count);
        SwapCheck::Available
    }

    /// Removes the whole holding of `key` and returns its size. Capacity is not returned.
    pub fn take_holding(&mut self, buyer_id: &str, key: &ShareKey) -> Option<u32> {
        let held = self.holding(buyer_id, key);
        if held == 0 {
            return None;
        }
        self.debit(buyer_id, key, held);
        Some(held)
    }

    pub fn restore_holding(&mut self, buyer_id: &str, key: &ShareKey, count: u32) {
        if let Some(share) = self.share_mut(key) {
            share.buyers.insert(buyer_id.to_string());
        }
        self.credit(buyer_id, key, count);
    }

    pub fn return_capacity(&mut self, key: &ShareKey, count: u32) {
        if let Some(share) = self.share_mut(key) {
            share.release(count);
        }
    }

    /// Swap within this market. The caller has already checked ownership.
    pub fn swap_locally(
        &mut self,
        buyer_id: &str,
        old: &ShareKey,
        new: &ShareKey,
    ) -> TradeResult<u32> {
        if old == new {
            return Err(TradeError::SameShare);
        }
        let held = self.holding(buyer_id, old);
        if held == 0 {
            return Err(TradeError::NotOwned);
        }
        if self.check_swap(new, held) != SwapCheck::Available {
            return Err(TradeError::SwapUnavailable);
        }

        self.take_holding(buyer_id, old);
        self.return_capacity(old, held);
        self.accept_swap(buyer_id, new, held);
        Ok(held)
    }

    fn credit(&mut self, buyer_id: &str, key: &ShareKey, count: u32) {
        *self
            .holdings
            .entry(buyer_id.to_string())
            .or_default()
            .entry(key.clone())
            .or_insert(0) += count;
    }

    fn debit(&mut self, buyer_id: &str, key: &ShareKey, count: u32) {
        let Some(held) = self.holdings.get_mut(buyer_id) else {
            return;
        };
        let emptied = match held.get_mut(key) {
            Some(n) => {
                *n = n.saturating_sub(count);
                *n == 0
            }
            None => false,
        };
        if emptied {
            held.remove(key);
            if held.is_empty() {
                self.holdings.remove(buyer_id);
            }
            if let Some(share) = self.share_mut(key) {
                share.buyers.remove(buyer_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn london() -> Ledger {
        let mut ledger = Ledger::new("London");
        ledger.add_share("LONM101025", "Equity", 10).unwrap();
        ledger.add_share("LONA101025", "Bonus", 5).unwrap();
        ledger
    }

    fn key(share_type: ShareType, id: &str) -> ShareKey {
        ShareKey::new(share_type, id)
    }

    #[test]
    fn test_add_share_rejects_duplicates_and_unknown_types() {
        let mut ledger = london();

        assert_eq!(
            ledger.add_share("LONM101025", "equity", 3),
            Err(TradeError::ShareExists {
                share_id: "LONM101025".to_string(),
                share_type: "Equity".to_string()
            })
        );
        assert_eq!(
            ledger.add_share("LONE101025", "Preferred", 3).unwrap_err().to_string(),
            "Share not added: Preferred-LONE101025"
        );
        assert_eq!(
            ledger.add_share("LONE101025", "Dividend", -1),
            Err(TradeError::InvalidCapacity(-1))
        );

        let share = ledger.share(&key(ShareType::Equity, "LONM101025")).unwrap();
        assert_eq!(share.origin_market, "London");
        assert_eq!(share.total, 10);
    }

    #[test]
    fn test_remove_share() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");
        ledger.purchase("LONB1111", "LONM101025", "Equity", 3).unwrap();

        assert!(ledger.remove_share("LONM101025", "Equity").is_ok());
        assert_eq!(ledger.holding("LONB1111", &equity), 3);
        assert_eq!(ledger.holdings_of("LONB1111"), vec![(equity, 3)]);
        assert_eq!(
            ledger.remove_share("LONM101025", "Equity").unwrap_err().to_string(),
            "Share not available: Equity-LONM101025"
        );
        assert_eq!(
            ledger.remove_share("LONM101025", "Stock").unwrap_err().to_string(),
            "Share not available: Stock-LONM101025"
        );
    }

    #[test]
    fn test_relisted_share_keeps_existing_holders() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");
        ledger.purchase("LONB1111", "LONM101025", "Equity", 3).unwrap();

        ledger.remove_share("LONM101025", "Equity").unwrap();
        ledger.add_share("LONM101025", "Equity", 5).unwrap();

        assert_eq!(ledger.holding("LONB1111", &equity), 3);
        let share = ledger.share(&equity).unwrap();
        assert!(share.has_buyer("LONB1111"));
        assert!(!share.has_buyer("LONB2222"));
        assert_eq!(share.available, 5);

        ledger.sell("LONB1111", "LONM101025", "Equity", 3).unwrap();
        assert!(!ledger.share(&equity).unwrap().has_buyer("LONB1111"));
    }

    #[test]
    fn test_purchase_accumulates_holdings() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");

        ledger.purchase("LONB1111", "LONM101025", "Equity", 3).unwrap();
        ledger.purchase("LONB1111", "LONM101025", "Equity", 4).unwrap();

        assert_eq!(ledger.holding("LONB1111", &equity), 7);
        let share = ledger.share(&equity).unwrap();
        assert_eq!(share.available, 3);
        assert!(share.has_buyer("LONB1111"));

        assert_eq!(
            ledger.purchase("LONB2222", "LONM101025", "Equity", 4),
            Err(TradeError::InsufficientCapacity("Equity-LONM101025".to_string()))
        );
        assert_eq!(
            ledger.purchase("LONB2222", "LONX000000", "Equity", 1),
            Err(TradeError::ShareNotAvailable("Equity-LONX000000".to_string()))
        );
        assert_eq!(
            ledger.purchase("LONB2222", "LONM101025", "Equity", 0),
            Err(TradeError::InvalidQuantity(0))
        );
    }

    #[test]
    fn test_sell_returns_capacity_and_clears_empty_holdings() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");
        ledger.purchase("LONB1111", "LONM101025", "Equity", 5).unwrap();

        assert_eq!(
            ledger.sell("LONB1111", "LONM101025", "Equity", 6),
            Err(TradeError::InsufficientHoldings)
        );
        ledger.sell("LONB1111", "LONM101025", "Equity", 5).unwrap();

        assert!(ledger.holdings_of("LONB1111").is_empty());
        let share = ledger.share(&equity).unwrap();
        assert_eq!(share.available, 10);
        assert!(!share.has_buyer("LONB1111"));

        assert_eq!(
            ledger.sell("LONB1111", "NOPE", "Equity", 1),
            Err(TradeError::ShareNotFound("NOPE".to_string()))
        );
    }

    #[test]
    fn test_sell_rejects_non_positive_quantity() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");
        ledger.purchase("LONB1111", "LONM101025", "Equity", 2).unwrap();

        assert_eq!(
            ledger.sell("LONB1111", "LONM101025", "Equity", 0),
            Err(TradeError::InvalidQuantity(0))
        );
        assert_eq!(
            ledger.sell("LONB1111", "LONM101025", "Equity", -2).unwrap_err().to_string(),
            "Invalid quantity: -2"
        );
        assert_eq!(ledger.holding("LONB1111", &equity), 2);
        assert_eq!(ledger.share(&equity).unwrap().available, 8);
    }

    #[test]
    fn test_check_swap_reports_shortfall() {
        let ledger = london();
        let bonus = key(ShareType::Bonus, "LONA101025");

        assert_eq!(ledger.check_swap(&bonus, 5), SwapCheck::Available);
        assert_eq!(
            ledger.check_swap(&bonus, 6),
            SwapCheck::Short {
                required: 6,
                available: 5
            }
        );
        assert_eq!(
            ledger.check_swap(&key(ShareType::Bonus, "missing"), 1),
            SwapCheck::NotFound
        );
    }

    #[test]
    fn test_swap_locally_moves_capacity_both_ways() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");
        let bonus = key(ShareType::Bonus, "LONA101025");
        ledger.purchase("LONB1111", "LONM101025", "Equity", 4).unwrap();

        assert_eq!(ledger.swap_locally("LONB1111", &equity, &bonus), Ok(4));

        assert_eq!(ledger.holding("LONB1111", &equity), 0);
        assert_eq!(ledger.holding("LONB1111", &bonus), 4);
        assert_eq!(ledger.share(&equity).unwrap().available, 10);
        assert_eq!(ledger.share(&bonus).unwrap().available, 1);
    }

    #[test]
    fn test_swap_locally_rejects_when_new_share_is_short() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");
        let bonus = key(ShareType::Bonus, "LONA101025");
        ledger.purchase("LONB1111", "LONM101025", "Equity", 6).unwrap();

        assert_eq!(
            ledger.swap_locally("LONB1111", &equity, &bonus),
            Err(TradeError::SwapUnavailable)
        );
        assert_eq!(ledger.holding("LONB1111", &equity), 6);
        assert_eq!(
            ledger.swap_locally("LONB1111", &equity, &equity),
            Err(TradeError::SameShare)
        );
    }

    #[test]
    fn test_take_and_restore_holding() {
        let mut ledger = london();
        let equity = key(ShareType::Equity, "LONM101025");
        ledger.purchase("LONB1111", "LONM101025", "Equity", 2).unwrap();

        assert_eq!(ledger.take_holding("LONB1111", &equity), Some(2));
        assert_eq!(ledger.take_holding("LONB1111", &equity), None);
        assert_eq!(ledger.share(&equity).unwrap().available, 8);

        ledger.restore_holding("LONB1111", &equity, 2);
        assert_eq!(ledger.holding("LONB1111", &equity), 2);
        assert!(ledger.share(&equity).unwrap().has_buyer("LONB1111"));
    }

    #[test]
    fn test_accept_swap_credits_buyer() {
        let mut ledger = london();
        let bonus = key(ShareType::Bonus, "LONA101025");

        assert_eq!(ledger.accept_swap("NYKB0001", &bonus, 2), SwapCheck::Available);
        assert_eq!(ledger.holding("NYKB0001", &bonus), 2);
        assert_eq!(ledger.share(&bonus).unwrap().available, 3);
        assert!(matches!(
            ledger.accept_swap("NYKB0001", &bonus, 4),
            SwapCheck::Short { .. }
        ));
    }

    #[test]
    fn test_identifiers_with_whitespace_are_rejected() {
        let mut ledger = london();
        assert_eq!(
            ledger.purchase("LON B1", "LONM101025", "Equity", 1),
            Err(TradeError::InvalidIdentifier("LON B1".to_string()))
        );
        assert!(ledger.add_share("", "Equity", 1).is_err());
        assert_eq!(
            ledger.add_share("LON M1", "Equity", 1),
            Err(TradeError::InvalidIdentifier("LON M1".to_string()))
        );
        assert!(ledger.share(&key(ShareType::Equity, "LON M1")).is_none());
    }
}
