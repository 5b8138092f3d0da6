use super::console::Console;
use super::{reply_text, Flow, SHARE_ID_EXAMPLE, SHARE_TYPE_PROMPT};
use crate::adapters::audit::AuditLog;
use crate::domain::model::UserId;
use crate::domain::ports::{MarketDirectory, ShareMarket};
use crate::utils::error::{MarketError, Result};
use crate::utils::validation::is_valid_admin_share_id;
use std::io::{BufRead, Write};
use std::sync::Arc;

const MENU: [&str; 7] = [
    "1. Add Share",
    "2. Remove Share",
    "3. List Share Availability",
    "4. Purchase Share (Buyer Function)",
    "5. View My Shares (Buyer Function)",
    "6. Sell Share (Buyer Function)",
    "7. Exit",
];

/// Menu-driven console for a market administrator.
pub struct AdminSession {
    admin: UserId,
    market: String,
    home: Arc<dyn ShareMarket>,
    directory: Arc<dyn MarketDirectory>,
    log: AuditLog,
}

impl AdminSession {
    pub fn new(
        admin: UserId,
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
            admin,
            market,
            home,
            directory,
            log,
        })
    }

    pub async fn run<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<()> {
        console.say(&format!("Connected to {} Server.", self.market))?;

        loop {
            console.say(&format!("\nAdmin Menu ({})", self.market))?;
            for line in MENU {
                console.say(line)?;
            }
            let Some(choice) = console.prompt_int("Enter your choice: ")? else {
                return Ok(());
            };

            let flow = match choice {
                1 => self.add_share(console).await?,
                2 => self.remove_share(console).await?,
                3 => self.list_availability(console).await?,
                4 => self.purchase_share(console).await?,
                5 => self.view_shares(console).await?,
                6 => self.sell_share(console).await?,
                7 => {
                    console.say("Exiting Admin System.")?;
                    Flow::Exit
                }
                _ => {
                    console.say("Invalid choice. Try again.")?;
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

    async fn add_share<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<Flow> {
        console.say(SHARE_ID_EXAMPLE)?;
        let Some(share_id) = console.prompt("Enter Share ID: ")? else {
            return Ok(Flow::Exit);
        };
        if !is_valid_admin_share_id(&share_id, &self.admin.market_code) {
            return self.finish(console, "addShare", "Invalid Share ID.".to_string()).await;
        }
        let Some(share_type) = console.prompt(SHARE_TYPE_PROMPT)? else {
            return Ok(Flow::Exit);
        };
        let Some(capacity) = console.prompt_int("Enter Capacity: ")? else {
            return Ok(Flow::Exit);
        };

        let reply = reply_text(self.home.add_share(&share_id, &share_type, capacity).await);
        self.finish(console, "addShare", reply).await
    }

    async fn remove_share<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
    ) -> Result<Flow> {
        let Some(share_id) = console.prompt("Enter Share ID to remove: ")? else {
            return Ok(Flow::Exit);
        };
        if !is_valid_admin_share_id(&share_id, &self.admin.market_code) {
            return self.finish(console, "removeShare", "Invalid Share ID.".to_string()).await;
        }
        let Some(share_type) = console.prompt("Enter Share Type: ")? else {
            return Ok(Flow::Exit);
        };

        let reply = reply_text(self.home.remove_share(&share_id, &share_type).await);
        self.finish(console, "removeShare", reply).await
    }

    /// Queries every configured market, one section each.
    async fn list_availability<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
    ) -> Result<Flow> {
        let Some(share_type) = console.prompt("Enter Share Type to list availability: ")? else {
            return Ok(Flow::Exit);
        };

        let mut report = String::new();
        for market in self.directory.market_names() {
            report.push_str(&format!("\n---{} Market Availability---\n", market));
            let listing = match self.directory.connect(&market) {
                Some(port) => port.list_share_availability(&share_type).await,
                None => Err(MarketError::protocol(format!("{} is not reachable", market))),
            };
            match listing {
                Ok(text) => report.push_str(&text),
                Err(e) => report.push_str(&format!("Error retrieving availability: {}", e)),
            }
        }

        self.finish(console, "listShareAvailability", report).await
    }

    async fn purchase_share<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
    ) -> Result<Flow> {
        let Some(share_id) = console.prompt("Enter Share ID: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(share_type) = console.prompt(SHARE_TYPE_PROMPT)? else {
            return Ok(Flow::Exit);
        };
        let Some(quantity) = console.prompt_int("Enter Quantity: ")? else {
            return Ok(Flow::Exit);
        };

        let reply = reply_text(
            self.home
                .purchase_share(&self.admin.id, &share_id, &share_type, quantity)
                .await,
        );
        self.finish(console, "purchaseShare", reply).await
    }

    async fn view_shares<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<Flow> {
        let reply = reply_text(self.home.get_shares(&self.admin.id).await);
        self.finish(console, "getShares", format!("Your Shares: {}", reply))
            .await
    }

    async fn sell_share<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<Flow> {
        let Some(share_id) = console.prompt("Enter Share ID to sell: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(share_type) = console.prompt(SHARE_TYPE_PROMPT)? else {
            return Ok(Flow::Exit);
        };
        let Some(quantity) = console.prompt_int("Enter Quantity: ")? else {
            return Ok(Flow::Exit);
        };

        let reply = reply_text(
            self.home
                .sell_share(&self.admin.id, &share_id, &share_type, quantity)
                .await,
        );
        self.finish(console, "sellShare", reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{ScriptedDirectory, ScriptedMarket};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn session(markets: Vec<Arc<ScriptedMarket>>, log: AuditLog) -> AdminSession {
        let admin = UserId::parse("LONA1234", &["NYK", "LON", "TOK"]).unwrap();
        AdminSession::new(admin, "London", Arc::new(ScriptedDirectory { markets }), log).unwrap()
    }

    async fn run(session: &AdminSession, input: &str) -> String {
        let mut console = Console::new(Cursor::new(input.to_string()), Vec::new());
        session.run(&mut console).await.unwrap();
        String::from_utf8(console.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_add_share_validates_id_before_calling() {
        let london = ScriptedMarket::new("London");
        let session = session(vec![Arc::clone(&london)], AuditLog::disabled());

        let output = run(&session, "1 NYKM101025 1 LONM101025 Equity 50 7").await;

        assert!(output.contains("Invalid Share ID."));
        assert!(output.contains("London:add LONM101025 Equity 50"));
        assert!(output.contains("Exiting Admin System."));
        assert_eq!(london.calls(), vec!["add LONM101025 Equity 50"]);
    }

    #[tokio::test]
    async fn test_listing_covers_every_market() {
        let markets = vec![
            ScriptedMarket::new("NewYork"),
            ScriptedMarket::new("London"),
            ScriptedMarket::failing("Tokyo"),
        ];
        let session = session(markets, AuditLog::disabled());

        let output = run(&session, "3 Bonus").await;

        assert!(output.contains("---NewYork Market Availability---\nNewYork:list Bonus"));
        assert!(output.contains("---London Market Availability---\nLondon:list Bonus"));
        assert!(output.contains("---Tokyo Market Availability---\nError retrieving availability:"));
    }

    #[tokio::test]
    async fn test_buyer_functions_use_admin_id_and_log() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::client(dir.path(), crate::domain::model::Role::Admin, "LONA1234");
        let london = ScriptedMarket::new("London");
        let session = session(vec![Arc::clone(&london)], log.clone());

        let output = run(&session, "4 TOKM101025 Equity 3 5 9 7").await;

        assert!(output.contains("Your Shares: London:shares LONA1234"));
        assert!(output.contains("Invalid choice. Try again."));
        assert_eq!(
            london.calls(),
            vec!["purchase LONA1234 TOKM101025 Equity 3", "shares LONA1234"]
        );

        let contents = std::fs::read_to_string(log.path().unwrap()).unwrap();
        assert!(contents.contains("purchaseShare | Response: London:purchase"));
        assert!(contents.contains("getShares | Response: Your Shares:"));
    }
}
