//! Pool pairing and wrapped position endpoints
//!
//! - POST /pools/initiate - Pool owner announces the handoff
//! - POST /pools/accept - Initiator accepts once the wrapper owns the pool
//! - POST /pools/release - Initiator takes back a pool with no positions
//! - POST /pools/wrap - Deposit NFTs into a paired pool for positions
//! - GET /pools/:pool - Pairing state
//! - POST /positions/transfer - Move a position
//! - GET /positions/of/:owner - Positions held by an address

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use spot_core::{Address, WrappedId};

use crate::dto::{
    engine_error, ApiResult, PairingResponse, PoolRequest, PositionInfo, PositionsResponse,
    TransferRequest, WrapRequest,
};
use crate::state::Engine;
use crate::AppState;

/// Create pool routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(initiate))
        .route("/accept", post(accept))
        .route("/release", post(release))
        .route("/wrap", post(wrap))
        .route("/:pool", get(get_pairing))
}

/// Create position routes
pub fn positions_router() -> Router<AppState> {
    Router::new()
        .route("/transfer", post(transfer))
        .route("/of/:owner", get(get_positions))
}

fn pairing_response(spot: &Engine, pool: &Address, minted: Vec<WrappedId>) -> PairingResponse {
    PairingResponse::new(
        spot.pairing(pool),
        spot.wrapper().live_positions(pool),
        minted,
    )
}

/// POST /pools/initiate
pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<PairingResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    spot.initiate_pool(&ctx, request.pool)
        .map_err(engine_error)?;
    Ok(Json(pairing_response(&spot, &request.pool, Vec::new())))
}

/// POST /pools/accept - callTransferOwnership
pub async fn accept(
    State(state): State<AppState>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<PairingResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let minted = spot
        .call_transfer_ownership(&ctx, request.pool)
        .map_err(engine_error)?;
    Ok(Json(pairing_response(&spot, &request.pool, minted)))
}

/// POST /pools/release
pub async fn release(
    State(state): State<AppState>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<PairingResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    spot.release_pool(&ctx, request.pool)
        .map_err(engine_error)?;
    Ok(Json(pairing_response(&spot, &request.pool, Vec::new())))
}

/// POST /pools/wrap
pub async fn wrap(
    State(state): State<AppState>,
    Json(request): Json<WrapRequest>,
) -> ApiResult<PairingResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let minted = spot
        .wrap(&ctx, request.pool, &request.nft_ids)
        .map_err(engine_error)?;
    Ok(Json(pairing_response(&spot, &request.pool, minted)))
}

/// GET /pools/:pool
pub async fn get_pairing(
    State(state): State<AppState>,
    Path(pool): Path<Address>,
) -> ApiResult<PairingResponse> {
    let spot = state.engine().lock().await;
    Ok(Json(pairing_response(&spot, &pool, Vec::new())))
}

/// POST /positions/transfer
pub async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<PositionInfo> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    spot.transfer(&ctx, request.id, request.to)
        .map_err(engine_error)?;
    let position = *spot.wrapper().position(request.id).map_err(engine_error)?;

    Ok(Json(PositionInfo {
        id: position.id,
        pool: position.pool,
        owner: position.owner,
        borrowed: false,
    }))
}

/// GET /positions/of/:owner
pub async fn get_positions(
    State(state): State<AppState>,
    Path(owner): Path<Address>,
) -> ApiResult<PositionsResponse> {
    let spot = state.engine().lock().await;
    let positions = spot
        .wrapper()
        .positions_of(&owner)
        .into_iter()
        .map(|p| PositionInfo {
            id: p.id,
            pool: p.pool,
            owner: p.owner,
            borrowed: spot.loan(p.id).map(|loan| loan.is_open()).unwrap_or(false),
        })
        .collect();

    Ok(Json(PositionsResponse { owner, positions }))
}
