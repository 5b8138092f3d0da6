use super::console::Console;
use super::{reply_text, Flow, SHARE_ID_EXAMPLE, SHARE_TYPE_PROMPT};
use crate::adapters::audit::AuditLog;
use crate::domain::model::UserId;
use crate::domain::ports::{MarketDirectory, ShareMarket};
use crate::utils::error::{MarketError, Result};
use crate::utils::validation::share_id_matches_market;
use std::io::{BufRead, Write};
use std::sync::Arc;

const MENU: [&str; 7] = [
    "1. Purchase Share (Local Market)",
    "2. Purchase Share (Cross-Market)",
    "3. View My Shares",
    "4. Sell Share (Local Market)",
    "5. Sell Share (Cross-Market)",
    "6. Swap Shares",
    "7. Exit",
];

const TARGET_PROMPT: &str = "Enter Target Market (NewYork/London/Tokyo): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Purchase,
    Sell,
}

/// Menu-driven console for a buyer, connected to their home market.
pub struct BuyerSession {
    buyer: UserId,
    market: String,
    home: Arc<dyn ShareMarket>,
    directory: Arc<dyn MarketDirectory>,
    log: AuditLog,
}

struct Order {
    share_id: String,
    share_type: String,
    quantity: i32,
}

impl BuyerSession {
    pub fn new(
        buyer: UserId,
        market: impl Into<String>,
        directory: Arc<dyn MarketDirectory>,
        log: AuditLog,
    ) -> Result<Self> {
        let market = market.into();
        let home = directory
            .connect(&market)
            .ok_or_else(|| MarketError::MissingConfigError {
                field: format!("markets.{}", market),
            })?;
        Ok(Self {
            buyer,
            market,
            home,
            directory,
            log,
        })
    }

    pub async fn run<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<()> {
        console.say(&format!("Connected to {} Server.", self.market))?;

        loop {
            console.say(&format!("\nBuyer Menu ({})", self.market))?;
            for line in MENU {
                console.say(line)?;
            }
            let Some(choice) = console.prompt_int("Enter your choice: ")? else {
                return Ok(());
            };

            let flow = match choice {
                1 => self.local_trade(console, Side::Purchase).await?,
                2 => self.cross_market_trade(console, Side::Purchase).await?,
                3 => self.view_all_shares(console).await?,
                4 => self.local_trade(console, Side::Sell).await?,
                5 => self.cross_market_trade(console, Side::Sell).await?,
                6 => self.swap(console).await?,
                7 => {
                    console.say("Exiting...")?;
                    Flow::Exit
                }
                _ => {
                    console.say("Invalid choice. Please try again.")?;
                    Flow::Continue
                }
            };
            if flow == Flow::Exit {
                return Ok(());
            }
        }
    }

    async fn finish<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
        method: &str,
        reply: String,
    ) -> Result<Flow> {
        self.log.record_response(method, &reply).await;
        console.say(&reply)?;
        Ok(Flow::Continue)
    }

    fn read_order<R: BufRead, W: Write>(
        console: &mut Console<R, W>,
        side: Side,
    ) -> Result<Option<Order>> {
        let (id_prompt, quantity_prompt) = match side {
            Side::Purchase => ("Enter Share ID: ", "Enter Quantity: "),
            Side::Sell => ("Enter Share ID to sell: ", "Enter Quantity to sell: "),
        };

        console.say(SHARE_ID_EXAMPLE)?;
        let Some(share_id) = console.prompt(id_prompt)? else {
            return Ok(None);
        };
        let Some(share_type) = console.prompt(SHARE_TYPE_PROMPT)? else {
            return Ok(None);
        };
        let Some(quantity) = console.prompt_int(quantity_prompt)? else {
            return Ok(None);
        };
        Ok(Some(Order {
            share_id,
            share_type,
            quantity,
        }))
    }

    async fn local_trade<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
        side: Side,
    ) -> Result<Flow> {
        let Some(order) = Self::read_order(console, side)? else {
            return Ok(Flow::Exit);
        };
        let buyer = &self.buyer.id;

        let (method, result) = match side {
            Side::Purchase => (
                "purchaseShare",
                self.home
                    .purchase_share(buyer, &order.share_id, &order.share_type, order.quantity)
                    .await,
            ),
            Side::Sell => (
                "sellShare",
                self.home
                    .sell_share(buyer, &order.share_id, &order.share_type, order.quantity)
                    .await,
            ),
        };
        self.finish(console, method, reply_text(result)).await
    }

    async fn cross_market_trade<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
        side: Side,
    ) -> Result<Flow> {
        let Some(order) = Self::read_order(console, side)? else {
            return Ok(Flow::Exit);
        };
        let Some(target) = console.prompt(TARGET_PROMPT)? else {
            return Ok(Flow::Exit);
        };
        let buyer = &self.buyer.id;

        let (method, reply) = match side {
            Side::Purchase if !share_id_matches_market(&order.share_id, &target) => (
                "purchaseRemoteShare",
                "Purchase failed because Market is not matching with ShareID.".to_string(),
            ),
            Side::Purchase => (
                "purchaseRemoteShare",
                reply_text(
                    self.home
                        .purchase_remote_share(
                            buyer,
                            &order.share_id,
                            &order.share_type,
                            order.quantity,
                            &target,
                        )
                        .await,
                ),
            ),
            Side::Sell => (
                "sellRemoteShare",
                reply_text(
                    self.home
                        .sell_remote_share(
                            buyer,
                            &order.share_id,
                            &order.share_type,
                            order.quantity,
                            &target,
                        )
                        .await,
                ),
            ),
        };
        self.finish(console, method, reply).await
    }

    /// Asks every configured market for this buyer's holdings.
    async fn view_all_shares<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
    ) -> Result<Flow> {
        console.say("--- Share Holdings Across Markets ---")?;

        let mut report = String::new();
        for market in self.directory.market_names() {
            let holdings = match self.directory.connect(&market) {
                Some(port) => port.get_shares(&self.buyer.id).await,
                None => Err(MarketError::protocol(format!("{} is not reachable", market))),
            };
            match holdings {
                Ok(text) => {
                    report.push_str(&format!("---Your {} Market Shares---\n", market));
                    if text.trim().is_empty() || text.contains("No shares") {
                        report.push_str("No shares found.\n");
                    } else {
                        report.push_str(&text);
                        report.push('\n');
                    }
                }
                Err(e) => {
                    tracing::debug!("getShares at {} failed: {}", market, e);
                    report.push_str(&format!("Error retrieving shares from {} market.\n", market));
                }
            }
        }

        self.finish(console, "getShares", report).await
    }

    async fn swap<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<Flow> {
        console.say("--- Swap Shares ---")?;
        let Some(old_id) = console.prompt("Enter Old Share ID to swap out: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(old_type) = console.prompt("Enter Old Share Type (Equity/Bonus/Dividend): ")?
        else {
            return Ok(Flow::Exit);
        };
        let Some(new_id) = console.prompt("Enter New Share ID to swap in: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(new_type) = console.prompt("Enter New Share Type (Equity/Bonus/Dividend): ")?
        else {
            return Ok(Flow::Exit);
        };

        let reply = reply_text(
            self.home
                .swap_shares(&self.buyer.id, &old_id, &old_type, &new_id, &new_type)
                .await,
        );
        self.finish(console, "swapShares", reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{ScriptedDirectory, ScriptedMarket};
    use std::io::Cursor;

    fn session(markets: Vec<Arc<ScriptedMarket>>) -> BuyerSession {
        let buyer = UserId::parse("NYKB1001", &["NYK", "LON", "TOK"]).unwrap();
        BuyerSession::new(
            buyer,
            "NewYork",
            Arc::new(ScriptedDirectory { markets }),
            AuditLog::disabled(),
        )
        .unwrap()
    }

    async fn run(session: &BuyerSession, input: &str) -> String {
        let mut console = Console::new(Cursor::new(input.to_string()), Vec::new());
        session.run(&mut console).await.unwrap();
        String::from_utf8(console.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_cross_market_purchase_checks_target() {
        let home = ScriptedMarket::new("NewYork");
        let session = session(vec![Arc::clone(&home)]);

        let output = run(
            &session,
            "2 LONM101025 Equity 5 Tokyo\n2 LONM101025 Equity 5 London\n7\n",
        )
        .await;

        assert!(output.contains("Purchase failed because Market is not matching with ShareID."));
        assert!(output.contains("Exiting..."));
        assert_eq!(
            home.calls(),
            vec!["purchase-remote NYKB1001 LONM101025 Equity 5 London"]
        );
    }

    #[tokio::test]
    async fn test_local_trades_and_swap_go_to_home_market() {
        let home = ScriptedMarket::new("NewYork");
        let session = session(vec![Arc::clone(&home)]);

        run(
            &session,
            "1 NYKM101025 Equity 2\n4 NYKM101025 Equity 1\n5 TOKE111125 Bonus 1 Tokyo\n6 NYKM101025 Equity NYKA111125 Equity\n",
        )
        .await;

        assert_eq!(
            home.calls(),
            vec![
                "purchase NYKB1001 NYKM101025 Equity 2",
                "sell NYKB1001 NYKM101025 Equity 1",
                "sell-remote NYKB1001 TOKE111125 Bonus 1 Tokyo",
                "swap NYKB1001 NYKM101025 Equity NYKA111125 Equity",
            ]
        );
    }

    #[tokio::test]
    async fn test_holdings_view_sections() {
        let markets = vec![ScriptedMarket::new("NewYork"), ScriptedMarket::failing("Tokyo")];
        let session = session(markets);

        let output = run(&session, "3 0 7").await;

        assert!(output.contains("--- Share Holdings Across Markets ---"));
        assert!(output.contains("---Your NewYork Market Shares---\nNewYork:shares NYKB1001"));
        assert!(output.contains("Error retrieving shares from Tokyo market."));
        assert!(output.contains("Invalid choice. Please try again."));
    }
}
