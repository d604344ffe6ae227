//! Exchange endpoints
//!
//! - POST /exchange/nft - Burn positions for named NFTs
//! - POST /exchange/eth - Burn positions and sell as many NFTs for cash

use axum::{extract::State, routing::post, Json, Router};

use crate::dto::{engine_error, ApiResult, ExchangeEthRequest, ExchangeNftRequest, ExchangeResponse};
use crate::AppState;

/// Create exchange routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/nft", post(exchange_for_nft))
        .route("/eth", post(exchange_for_eth))
}

/// POST /exchange/nft - exchangeLPforNFT
pub async fn exchange_for_nft(
    State(state): State<AppState>,
    Json(request): Json<ExchangeNftRequest>,
) -> ApiResult<ExchangeResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let receipt = spot
        .exchange_lp_for_nft(&ctx, request.pool, &request.nft_ids, &request.wrapped_ids)
        .map_err(engine_error)?;
    Ok(Json(receipt.into()))
}

/// POST /exchange/eth - exchangeLPforETH
pub async fn exchange_for_eth(
    State(state): State<AppState>,
    Json(request): Json<ExchangeEthRequest>,
) -> ApiResult<ExchangeResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let receipt = spot
        .exchange_lp_for_eth(&ctx, request.pool, request.recipient, &request.wrapped_ids)
        .map_err(engine_error)?;
    Ok(Json(receipt.into()))
}
