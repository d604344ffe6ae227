//! Simulator endpoints
//!
//! Seed the in-memory token and AMM and move the clock. These stand in for
//! the outside world and bypass the engine's own rules.
//!
//! - POST /sim/mint - Mint tokens and NFTs to an address
//! - POST /sim/pools - Open an AMM pool funded with the owner's NFTs
//! - POST /sim/pool-owner - Hand pool ownership to another address at the AMM
//! - POST /sim/advance - Move the clock forward
//! - POST /sim/tree - Build a collateral root with proofs
//! - GET /sim/accounts/:account - Token balance and sale proceeds

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use merkle_proof::MerkleTree;
use spot_core::Address;
use sudo_nft::{CollateralCustodian, TokenLedger};

use crate::dto::{
    engine_error, parse_amount, AccountResponse, ApiResult, SimAdvanceRequest, SimClockResponse,
    SimMintRequest, SimPoolOwnerRequest, SimPoolRequest, SimPoolResponse, SimTreeRequest,
    SimTreeResponse,
};
use crate::state::Engine;
use crate::AppState;

/// Create simulator routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mint", post(mint))
        .route("/pools", post(create_pool))
        .route("/pool-owner", post(set_pool_owner))
        .route("/advance", post(advance))
        .route("/tree", post(build_tree))
        .route("/accounts/:account", get(get_account))
}

fn account_response(spot: &Engine, account: Address) -> AccountResponse {
    AccountResponse {
        account,
        token_balance: spot.token().balance_of(&account).to_string(),
        payouts: spot.custodian().payout_of(&account).to_string(),
    }
}

/// POST /sim/mint
pub async fn mint(
    State(state): State<AppState>,
    Json(request): Json<SimMintRequest>,
) -> ApiResult<AccountResponse> {
    let amount = match &request.amount {
        Some(raw) => parse_amount("amount", raw)?,
        None => 0,
    };
    let collection = state.config().protocol.collection;

    let mut spot = state.engine().lock().await;
    let mut amm = spot.custodian().clone();
    for nft_id in &request.nft_ids {
        amm.mint_nft(collection, *nft_id, request.to)
            .map_err(engine_error)?;
    }
    spot.token_mut()
        .mint(request.to, amount)
        .map_err(engine_error)?;
    *spot.custodian_mut() = amm;

    tracing::debug!(
        to = %request.to,
        amount = %amount,
        nfts = request.nft_ids.len(),
        "Simulator mint"
    );
    Ok(Json(account_response(&spot, request.to)))
}

/// POST /sim/pools
pub async fn create_pool(
    State(state): State<AppState>,
    Json(request): Json<SimPoolRequest>,
) -> ApiResult<SimPoolResponse> {
    let spot_price = parse_amount("spot_price", &request.spot_price)?;
    let reserves = parse_amount("reserves", &request.reserves)?;
    let collection = request
        .collection
        .unwrap_or(state.config().protocol.collection);

    let mut spot = state.engine().lock().await;
    let mut amm = spot.custodian().clone();
    let pool = amm
        .create_pool(request.owner, collection, &request.nft_ids, spot_price, reserves)
        .map_err(engine_error)?;
    *spot.custodian_mut() = amm;

    let nfts = spot.custodian().nft_ids(&pool).map_err(engine_error)?;
    Ok(Json(SimPoolResponse { pool, nfts }))
}

/// POST /sim/pool-owner - the AMM-side `transferOwnership`
pub async fn set_pool_owner(
    State(state): State<AppState>,
    Json(request): Json<SimPoolOwnerRequest>,
) -> ApiResult<SimPoolResponse> {
    let mut spot = state.engine().lock().await;
    spot.custodian_mut()
        .transfer_ownership(&request.pool, &request.caller, &request.new_owner)
        .map_err(engine_error)?;

    let nfts = spot.custodian().nft_ids(&request.pool).map_err(engine_error)?;
    Ok(Json(SimPoolResponse {
        pool: request.pool,
        nfts,
    }))
}

/// POST /sim/advance
pub async fn advance(
    State(state): State<AppState>,
    Json(request): Json<SimAdvanceRequest>,
) -> ApiResult<SimClockResponse> {
    let now = state
        .clock()
        .advance(request.seconds)
        .map_err(engine_error)?;
    let spot = state.engine().lock().await;
    let epoch = spot.vault().epoch_at(now).ok();

    tracing::info!(now, epoch = ?epoch, "Clock advanced");
    Ok(Json(SimClockResponse { now, epoch }))
}

/// POST /sim/tree
pub async fn build_tree(Json(request): Json<SimTreeRequest>) -> ApiResult<SimTreeResponse> {
    let tree =
        MerkleTree::from_collateral(&request.collections, &request.token_ids).map_err(engine_error)?;
    let proofs = (0..tree.len()).filter_map(|i| tree.proof(i)).collect();

    Ok(Json(SimTreeResponse {
        root: tree.root(),
        proofs,
    }))
}

/// GET /sim/accounts/:account
pub async fn get_account(
    State(state): State<AppState>,
    Path(account): Path<Address>,
) -> ApiResult<AccountResponse> {
    let spot = state.engine().lock().await;
    Ok(Json(account_response(&spot, account)))
}
