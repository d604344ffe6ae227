//! Loan endpoints
//!
//! - POST /loans/borrow - Borrow against wrapped positions
//! - POST /loans/interest - Quote interest for listed epochs
//! - POST /loans/pay-interest - Pay interest for listed epochs
//! - POST /loans/repay - Return principal
//! - POST /loans/liquidate - Seize defaulted positions for the vault
//! - GET /loans/:id - Loan on a wrapped position

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use spot_core::{Address, WrappedId};

use crate::dto::{
    engine_error, parse_amounts, AmountResponse, ApiError, ApiResult, BorrowRequest,
    BorrowResponse, InterestQuoteRequest, LiquidateRequest, LiquidateResponse, LoanResponse,
    PayInterestRequest, PayInterestResponse, RepayRequest, RepayResponse,
};
use crate::AppState;

/// Create loan routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/borrow", post(borrow))
        .route("/interest", post(quote_interest))
        .route("/pay-interest", post(pay_interest))
        .route("/repay", post(repay))
        .route("/liquidate", post(liquidate))
        .route("/:id", get(get_loan))
}

/// POST /loans/borrow
pub async fn borrow(
    State(state): State<AppState>,
    Json(request): Json<BorrowRequest>,
) -> ApiResult<BorrowResponse> {
    let amounts = parse_amounts("amounts", &request.amounts)?;
    let ctx = state.context(request.caller);

    let mut spot = state.engine().lock().await;
    let receipt = spot
        .borrow(
            &ctx,
            request.lender,
            request.pool,
            &request.proofs,
            &request.ids,
            &amounts,
        )
        .map_err(engine_error)?;

    Ok(Json(receipt.into()))
}

/// POST /loans/interest - getInterestPayment
pub async fn quote_interest(
    State(state): State<AppState>,
    Json(request): Json<InterestQuoteRequest>,
) -> ApiResult<AmountResponse> {
    let spot = state.engine().lock().await;
    let amount = spot
        .get_interest_payment(&request.epochs, &request.ids)
        .map_err(engine_error)?;

    Ok(Json(AmountResponse {
        amount: amount.to_string(),
    }))
}

/// POST /loans/pay-interest
pub async fn pay_interest(
    State(state): State<AppState>,
    Json(request): Json<PayInterestRequest>,
) -> ApiResult<PayInterestResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let receipts = spot
        .pay_interest(&ctx, request.lender, &request.epochs, &request.ids)
        .map_err(engine_error)?;

    let paid: u128 = receipts.iter().map(|r| r.total).sum();
    let closed = receipts
        .iter()
        .filter(|r| r.closed)
        .map(|r| r.key.token_id)
        .collect();
    Ok(Json(PayInterestResponse {
        paid: paid.to_string(),
        closed,
    }))
}

/// POST /loans/repay
pub async fn repay(
    State(state): State<AppState>,
    Json(request): Json<RepayRequest>,
) -> ApiResult<RepayResponse> {
    let amounts = parse_amounts("amounts", &request.amounts)?;
    let ctx = state.context(request.caller);

    let mut spot = state.engine().lock().await;
    let outcomes = spot
        .repay(&ctx, request.lender, request.pool, &request.ids, &amounts)
        .map_err(engine_error)?;

    Ok(Json(RepayResponse {
        outcomes: outcomes.into_iter().map(Into::into).collect(),
    }))
}

/// POST /loans/liquidate - liquidateLp
pub async fn liquidate(
    State(state): State<AppState>,
    Json(request): Json<LiquidateRequest>,
) -> ApiResult<LiquidateResponse> {
    let ctx = state.context(request.caller);
    let mut spot = state.engine().lock().await;
    let liquidated = spot
        .liquidate_lp(&ctx, request.lender, &request.ids, &request.epochs)
        .map_err(engine_error)?;

    Ok(Json(LiquidateResponse {
        liquidated: liquidated.into_iter().map(Into::into).collect(),
    }))
}

/// GET /loans/:id
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<WrappedId>,
) -> ApiResult<LoanResponse> {
    let ctx = state.context(Address::ZERO);
    let spot = state.engine().lock().await;
    let loan = spot.loan(id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!("no loan on position #{}", id))),
        )
    })?;

    let (outstanding, unpaid, defaulted) = if loan.is_open() {
        let now = spot.vault().current_epoch(&ctx).map_err(engine_error)?;
        let key = loan.key;
        (
            spot.outstanding_interest(&ctx, id).map_err(engine_error)?,
            spot.ledger().unpaid_epochs(&key, now).map_err(engine_error)?,
            spot.ledger().is_defaulted(&key, now).map_err(engine_error)?,
        )
    } else {
        (loan.outstanding_interest, Vec::new(), false)
    };

    Ok(Json(LoanResponse::new(loan, outstanding, unpaid, defaulted)))
}
