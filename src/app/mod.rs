pub mod admin;
pub mod buyer;
pub mod console;
pub mod node;

pub use admin::AdminSession;
pub use buyer::BuyerSession;
pub use console::Console;
pub use node::MarketNode;

use crate::utils::error::Result;

pub(crate) const SHARE_ID_EXAMPLE: &str =
    "Example Share ID: LOCTDDMMYY (LOC: market code, T: M/A/E time slot, DDMMYY: date)";
pub(crate) const SHARE_TYPE_PROMPT: &str = "Enter Share Type (Equity/Bonus/Dividend): ";

/// Whether a console session keeps reading after a menu action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

/// Text shown to the user for a server reply or a failed call.
pub(crate) fn reply_text(result: Result<String>) -> String {
    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("Request failed: {}", e);
            format!("Request failed: {}", e.user_friendly_message())
        }
    }
}
