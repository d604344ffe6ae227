//! Liquidity vault endpoints
//!
//! - POST /vault/begin - Start the vault (owner)
//! - POST /vault/purchase - Reserve capital over an epoch window
//! - POST /vault/sell - Give back a reservation's future epochs
//! - POST /vault/claim - Collect an elapsed reservation with interest
//! - POST /vault/include-nft - Publish a collateral root (owner)
//! - POST /vault/rate - Re-price interest from the next epoch (owner)
//! - GET /vault/payout/:epoch - Per-reservation borrow cap for an epoch
//! - GET /vault/reservations/:owner - Reservations held by an address
//! - GET /vault - Vault state

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use spot_core::{Address, Epoch};

use crate::dto::{
    engine_error, parse_amounts, ApiResult, BeginRequest, ClaimResponse, IncludeNftRequest,
    PayoutResponse, PurchaseRequest, PurchaseResponse, ReservationInfo, ReservationRequest,
    ReservationsResponse, SellResponse, UpdateRateRequest, UpdateRateResponse, VaultStateResponse,
};
use crate::state::Engine;
use crate::AppState;

/// Create vault routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_vault))
        .route("/begin", post(begin))
        .route("/purchase", post(purchase))
        .route("/sell", post(sell))
        .route("/claim", post(claim))
        .route("/include-nft", post(include_nft))
        .route("/rate", post(update_rate))
        .route("/payout/:epoch", get(get_payout))
        .route("/reservations/:owner", get(get_reservations))
}

fn vault_state(spot: &Engine, now: u64) -> VaultStateResponse {
    let summary = spot.vault().summary(now);
    let rate = summary
        .current_epoch
        .map(|epoch| spot.ledger().rate_at(epoch))
        .unwrap_or(0);
    VaultStateResponse::new(summary, rate)
}

/// GET /vault - Current vault state
pub async fn get_vault(State(state): State<AppState>) -> ApiResult<VaultStateResponse> {
    let spot = state.engine().lock().await;
    Ok(Json(vault_state(&spot, state.now())))
}

/// POST /vault/begin - Fix parameters and start the epoch clock
pub async fn begin(
    State(state): State<AppState>,
    Json(request): Json<BeginRequest>,
) -> ApiResult<VaultStateResponse> {
    let params = request.params()?;
    let ctx = state.context(request.caller);

    let mut spot = state.engine().lock().await;
    spot.begin(&ctx, params).map_err(engine_error)?;
    Ok(Json(vault_state(&spot, ctx.now)))
}

/// POST /vault/purchase - Reserve capital; the caller's tokens are locked
pub async fn purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> ApiResult<PurchaseResponse> {
    let amounts = parse_amounts("amounts", &request.amounts)?;
    let ctx = state.context(request.caller);

    let mut spot = state.engine().lock().await;
    let index = spot
        .purchase(&ctx, &amounts, request.epoch_start, request.epoch_end)
        .map_err(engine_error)?;
    let locked = spot
        .vault()
        .reservation(index)
        .map(|reservation| reservation.total())
        .unwrap_or_default();

    Ok(Json(PurchaseResponse {
        index,
        locked: locked.to_string(),
    }))
}

/// POST /vault/sell
pub async fn sell(
    State(state): State<AppState>,
    Json(request): Json<ReservationRequest>,
) -> ApiResult<SellResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let refund = spot.sell(&ctx, request.index).map_err(engine_error)?;

    Ok(Json(SellResponse {
        index: request.index,
        refund: refund.to_string(),
    }))
}

/// POST /vault/claim
pub async fn claim(
    State(state): State<AppState>,
    Json(request): Json<ReservationRequest>,
) -> ApiResult<ClaimResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let claim = spot.claim(&ctx, request.index).map_err(engine_error)?;

    Ok(Json(ClaimResponse {
        index: request.index,
        capital: claim.capital.to_string(),
        interest: claim.interest.to_string(),
        written_off: claim.written_off.to_string(),
        total: claim.total().to_string(),
    }))
}

/// POST /vault/include-nft - Replace the collateral root
pub async fn include_nft(
    State(state): State<AppState>,
    Json(request): Json<IncludeNftRequest>,
) -> ApiResult<VaultStateResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    spot.include_nft(&ctx, request.root, &request.collections, &request.token_ids)
        .map_err(engine_error)?;
    Ok(Json(vault_state(&spot, ctx.now)))
}

/// POST /vault/rate
pub async fn update_rate(
    State(state): State<AppState>,
    Json(request): Json<UpdateRateRequest>,
) -> ApiResult<UpdateRateResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let effective_epoch = spot
        .update_rate(&ctx, request.bps)
        .map_err(engine_error)?;

    Ok(Json(UpdateRateResponse {
        bps: request.bps,
        effective_epoch,
    }))
}

/// GET /vault/payout/:epoch - Maximum principal one collateral item may draw
pub async fn get_payout(
    State(state): State<AppState>,
    Path(epoch): Path<Epoch>,
) -> ApiResult<PayoutResponse> {
    let spot = state.engine().lock().await;
    let payout = spot.payout_per_reservation(epoch);
    tracing::debug!(epoch, payout = %payout, "Payout queried");

    Ok(Json(PayoutResponse {
        epoch,
        liquidity: spot.vault().liquidity(epoch).to_string(),
        available: spot.vault().available_liquidity(epoch).to_string(),
        payout: payout.to_string(),
    }))
}

/// GET /vault/reservations/:owner
pub async fn get_reservations(
    State(state): State<AppState>,
    Path(owner): Path<Address>,
) -> ApiResult<ReservationsResponse> {
    let spot = state.engine().lock().await;
    let reservations = spot
        .vault()
        .reservations_of(&owner)
        .into_iter()
        .map(|(index, reservation)| ReservationInfo::new(index, reservation))
        .collect();

    Ok(Json(ReservationsResponse {
        owner,
        reservations,
    }))
}
