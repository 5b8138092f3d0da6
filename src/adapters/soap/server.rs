use super::envelope::{self, Operation, SoapCall, CLIENT_FAULT, SERVER_FAULT};
use super::wsdl;
use crate::domain::ports::ShareMarket;
use crate::utils::error::{MarketError, Result};
use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;

pub const SERVICE_PATH: &str = "/ShareMarketService";

#[derive(Clone)]
struct SoapState {
    market: Arc<dyn ShareMarket>,
    endpoint: String,
}

/// `POST <path>` takes SOAP requests, `GET <path>?wsdl` serves the service description.
pub fn router(path: &str, market: Arc<dyn ShareMarket>, endpoint: String) -> Router {
    Router::new()
        .route(path, post(handle_call).get(handle_get))
        .with_state(SoapState { market, endpoint })
}

/// Routes a decoded call to the matching market operation.
pub async fn dispatch(market: &dyn ShareMarket, call: &SoapCall) -> Result<String> {
    match call.operation {
        Operation::AddShare => {
            market
                .add_share(call.text("shareID")?, call.text("shareType")?, call.int("capacity")?)
                .await
        }
        Operation::RemoveShare => {
            market
                .remove_share(call.text("shareID")?, call.text("shareType")?)
                .await
        }
        Operation::ListShareAvailability => {
            market
                .list_share_availability(call.text("shareType")?)
                .await
        }
        Operation::PurchaseRemoteShare => {
            market
                .purchase_remote_share(
                    call.text("buyerID")?,
                    call.text("shareID")?,
                    call.text("shareType")?,
                    call.int("shareCount")?,
                    call.text("targetMarket")?,
                )
                .await
        }
        Operation::SellRemoteShare => {
            market
                .sell_remote_share(
                    call.text("buyerID")?,
                    call.text("shareID")?,
                    call.text("shareType")?,
                    call.int("shareCount")?,
                    call.text("targetMarket")?,
                )
                .await
        }
        Operation::PurchaseShare => {
            market
                .purchase_share(
                    call.text("buyerID")?,
                    call.text("shareID")?,
                    call.text("shareType")?,
                    call.int("shareCount")?,
                )
                .await
        }
        Operation::GetShares => market.get_shares(call.text("buyerID")?).await,
        Operation::SellShare => {
            market
                .sell_share(
                    call.text("buyerID")?,
                    call.text("shareID")?,
                    call.text("shareType")?,
                    call.int("shareCount")?,
                )
                .await
        }
        Operation::SwapShares => {
            market
                .swap_shares(
                    call.text("buyerID")?,
                    call.text("oldShareID")?,
                    call.text("oldShareType")?,
                    call.text("newShareID")?,
                    call.text("newShareType")?,
                )
                .await
        }
    }
}

fn xml(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/xml; charset=utf-8")], body).into_response()
}

fn fault(error: MarketError) -> Response {
    let (code, message) = match error {
        MarketError::SoapFault { code, message } => (code, message),
        MarketError::XmlError(e) => (CLIENT_FAULT.to_string(), e.to_string()),
        other => (SERVER_FAULT.to_string(), other.to_string()),
    };
    tracing::debug!("Returning SOAP fault {}: {}", code, message);
    xml(
        StatusCode::INTERNAL_SERVER_ERROR,
        envelope::fault_envelope(&code, &message),
    )
}

async fn handle_call(State(state): State<SoapState>, body: String) -> Response {
    let call = match SoapCall::from_envelope(&body) {
        Ok(call) => call,
        Err(e) => return fault(e),
    };
    tracing::debug!("SOAP call {}", call.operation.name());

    match dispatch(state.market.as_ref(), &call).await {
        Ok(reply) => xml(
            StatusCode::OK,
            envelope::response_envelope(call.operation, &reply),
        ),
        Err(e) => fault(e),
    }
}

async fn handle_get(State(state): State<SoapState>, RawQuery(query): RawQuery) -> Response {
    let wants_wsdl = query
        .as_deref()
        .map(|q| q.split('&').any(|p| p.eq_ignore_ascii_case("wsdl")))
        .unwrap_or(false);

    if wants_wsdl {
        return xml(StatusCode::OK, wsdl::document(&state.endpoint));
    }
    (
        StatusCode::OK,
        format!(
            "{} at {}. Append ?wsdl for the service description.",
            envelope::SERVICE_NAME,
            state.endpoint
        ),
    )
        .into_response()
}
