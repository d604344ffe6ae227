//! Data Transfer Objects for API requests and responses
//!
//! Token amounts travel as decimal strings; they are `u128` inside the engine.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use lend::{LiquidatedLoan, Loan, RepayOutcome};
use spot_core::{Address, Amount, Epoch, Hash32, MerkleRoot, NftId, Timestamp, WrappedId};
use sudo_nft::{BorrowReceipt, ExchangeReceipt, Pairing, PairingState};
use vault::{Reservation, ReservationStatus, VaultParams, VaultSummary};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub vault_started: bool,
    /// Simulated clock
    pub now: Timestamp,
}

impl HealthResponse {
    pub fn new(vault_started: bool, now: Timestamp) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vault_started,
            now,
        }
    }
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}

/// Error half of every handler result
pub type ApiFailure = (StatusCode, Json<ApiError>);

pub type ApiResult<T> = Result<Json<T>, ApiFailure>;

/// Render an engine error with its own code and status
pub fn engine_error(e: spot_core::Error) -> ApiFailure {
    (
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ApiError::new(e.error_code(), e.to_string())),
    )
}

pub fn parse_amount(field: &str, raw: &str) -> Result<Amount, ApiFailure> {
    raw.trim().parse::<Amount>().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(format!(
                "{} must be a decimal integer, got '{}'",
                field, raw
            ))),
        )
    })
}

pub fn parse_amounts(field: &str, raw: &[String]) -> Result<Vec<Amount>, ApiFailure> {
    raw.iter().map(|r| parse_amount(field, r)).collect()
}

// =============================================================================
// Vault
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginRequest {
    pub caller: Address,
    pub slots: u32,
    pub ticket_size: String,
    pub rate: u64,
    pub epoch_length: u64,
    pub token: Address,
    pub risk_base: u64,
    pub risk_step: u64,
    pub beta: u64,
}

impl BeginRequest {
    pub fn params(&self) -> Result<VaultParams, ApiFailure> {
        Ok(VaultParams {
            slots: self.slots,
            ticket_size: parse_amount("ticket_size", &self.ticket_size)?,
            rate: self.rate,
            epoch_length: self.epoch_length,
            token: self.token,
            risk_base: self.risk_base,
            risk_step: self.risk_step,
            beta: self.beta,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub caller: Address,
    /// Amount per tranche
    pub amounts: Vec<String>,
    pub epoch_start: Epoch,
    pub epoch_end: Epoch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub index: usize,
    pub locked: String,
}

/// Body of `/vault/sell` and `/vault/claim`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub caller: Address,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellResponse {
    pub index: usize,
    pub refund: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub index: usize,
    pub capital: String,
    pub interest: String,
    /// Defaulted principal deducted from the capital
    pub written_off: String,
    pub total: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationInfo {
    pub index: usize,
    pub amounts: Vec<String>,
    pub epoch_start: Epoch,
    pub epoch_end: Epoch,
    pub status: ReservationStatus,
    pub total: String,
    pub written_off: String,
}

impl ReservationInfo {
    pub fn new(index: usize, reservation: &Reservation) -> Self {
        Self {
            index,
            amounts: reservation.amounts.iter().map(ToString::to_string).collect(),
            epoch_start: reservation.epoch_start,
            epoch_end: reservation.epoch_end,
            status: reservation.status,
            total: reservation.total().to_string(),
            written_off: reservation.written_off.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationsResponse {
    pub owner: Address,
    pub reservations: Vec<ReservationInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeNftRequest {
    pub caller: Address,
    pub root: MerkleRoot,
    pub collections: Vec<Address>,
    pub token_ids: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRateRequest {
    pub caller: Address,
    pub bps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRateResponse {
    pub bps: u64,
    pub effective_epoch: Epoch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResponse {
    pub epoch: Epoch,
    pub liquidity: String,
    /// Liquidity not yet lent out to open loans
    pub available: String,
    pub payout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultStateResponse {
    pub address: Address,
    pub owner: Address,
    pub started: bool,
    pub start_time: Option<Timestamp>,
    pub current_epoch: Option<Epoch>,
    pub params: Option<VaultParamsView>,
    pub root: Option<MerkleRoot>,
    pub root_version: u64,
    pub collection_size: u64,
    pub reservations: usize,
    pub outstanding_principal: String,
    pub written_off: String,
    pub rate: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultParamsView {
    pub slots: u32,
    pub ticket_size: String,
    pub rate: u64,
    pub epoch_length: u64,
    pub token: Address,
    pub risk_base: u64,
    pub risk_step: u64,
    pub beta: u64,
}

impl From<&VaultParams> for VaultParamsView {
    fn from(p: &VaultParams) -> Self {
        Self {
            slots: p.slots,
            ticket_size: p.ticket_size.to_string(),
            rate: p.rate,
            epoch_length: p.epoch_length,
            token: p.token,
            risk_base: p.risk_base,
            risk_step: p.risk_step,
            beta: p.beta,
        }
    }
}

impl VaultStateResponse {
    /// `rate` is the interest rate in effect for the current epoch
    pub fn new(summary: VaultSummary, rate: u64) -> Self {
        Self {
            address: summary.address,
            owner: summary.owner,
            started: summary.started,
            start_time: summary.start_time,
            current_epoch: summary.current_epoch,
            params: summary.params.as_ref().map(VaultParamsView::from),
            root: summary.root,
            root_version: summary.root_version,
            collection_size: summary.collection_size,
            reservations: summary.reservations,
            outstanding_principal: summary.outstanding_principal.to_string(),
            written_off: summary.written_off.to_string(),
            rate,
        }
    }
}

// =============================================================================
// Pools and positions
// =============================================================================

/// Body of `/pools/initiate`, `/pools/accept` and `/pools/release`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRequest {
    pub caller: Address,
    pub pool: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrapRequest {
    pub caller: Address,
    pub pool: Address,
    pub nft_ids: Vec<NftId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingResponse {
    pub pool: Address,
    pub initiator: Option<Address>,
    pub state: PairingState,
    pub live_positions: usize,
    /// Positions minted by the call, if any
    #[serde(default)]
    pub minted: Vec<WrappedId>,
}

impl PairingResponse {
    pub fn new(pairing: Pairing, live_positions: usize, minted: Vec<WrappedId>) -> Self {
        Self {
            pool: pairing.pool,
            initiator: pairing.initiator,
            state: pairing.state,
            live_positions,
            minted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub caller: Address,
    pub id: WrappedId,
    pub to: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub id: WrappedId,
    pub pool: Address,
    pub owner: Address,
    pub borrowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsResponse {
    pub owner: Address,
    pub positions: Vec<PositionInfo>,
}

// =============================================================================
// Loans
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub caller: Address,
    pub lender: Address,
    pub pool: Address,
    /// One proof per id
    pub proofs: Vec<Vec<Hash32>>,
    pub ids: Vec<WrappedId>,
    pub amounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAmount {
    pub id: WrappedId,
    pub principal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowResponse {
    pub epoch: Epoch,
    pub loans: Vec<LoanAmount>,
    pub total: String,
}

impl From<BorrowReceipt> for BorrowResponse {
    fn from(receipt: BorrowReceipt) -> Self {
        Self {
            epoch: receipt.epoch,
            loans: receipt
                .loans
                .into_iter()
                .map(|(id, principal)| LoanAmount {
                    id,
                    principal: principal.to_string(),
                })
                .collect(),
            total: receipt.total.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestQuoteRequest {
    pub epochs: Vec<Epoch>,
    pub ids: Vec<WrappedId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountResponse {
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayInterestRequest {
    pub caller: Address,
    pub lender: Address,
    pub epochs: Vec<Epoch>,
    pub ids: Vec<WrappedId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayInterestResponse {
    pub paid: String,
    /// Loans fully settled by this payment
    pub closed: Vec<WrappedId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayRequest {
    pub caller: Address,
    pub lender: Address,
    pub pool: Address,
    pub ids: Vec<WrappedId>,
    pub amounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayInfo {
    pub id: WrappedId,
    pub repaid: String,
    pub remaining_principal: String,
    pub outstanding_interest: String,
    pub closed: bool,
}

impl From<RepayOutcome> for RepayInfo {
    fn from(o: RepayOutcome) -> Self {
        Self {
            id: o.key.token_id,
            repaid: o.repaid.to_string(),
            remaining_principal: o.remaining_principal.to_string(),
            outstanding_interest: o.outstanding_interest.to_string(),
            closed: o.closed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayResponse {
    pub outcomes: Vec<RepayInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidateRequest {
    pub caller: Address,
    pub lender: Address,
    pub ids: Vec<WrappedId>,
    /// Delinquent epochs whose interest is forfeited
    #[serde(default)]
    pub epochs: Vec<Epoch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationInfo {
    pub id: WrappedId,
    pub borrower: Address,
    pub principal: String,
    pub forfeited_interest: String,
}

impl From<LiquidatedLoan> for LiquidationInfo {
    fn from(l: LiquidatedLoan) -> Self {
        Self {
            id: l.loan.key.token_id,
            borrower: l.loan.borrower,
            principal: l.loan.principal.to_string(),
            forfeited_interest: l.forfeited_interest.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidateResponse {
    pub liquidated: Vec<LiquidationInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanResponse {
    pub id: WrappedId,
    pub collateral: Address,
    pub borrower: Address,
    pub lender: Address,
    pub principal: String,
    pub origination_epoch: Epoch,
    pub last_paid_epoch: Option<Epoch>,
    pub paid_epochs: Vec<Epoch>,
    /// Epochs through the current one that still owe interest
    pub unpaid_epochs: Vec<Epoch>,
    /// Unpaid interest through the current epoch
    pub outstanding_interest: String,
    pub status: lend::LoanStatus,
    pub defaulted: bool,
}

impl LoanResponse {
    pub fn new(
        loan: &Loan,
        outstanding_interest: Amount,
        unpaid_epochs: Vec<Epoch>,
        defaulted: bool,
    ) -> Self {
        Self {
            id: loan.key.token_id,
            collateral: loan.key.collateral,
            borrower: loan.borrower,
            lender: loan.lender,
            principal: loan.principal.to_string(),
            origination_epoch: loan.origination_epoch,
            last_paid_epoch: loan.last_paid_epoch,
            paid_epochs: loan.paid_epochs.iter().copied().collect(),
            unpaid_epochs,
            outstanding_interest: outstanding_interest.to_string(),
            status: loan.status,
            defaulted,
        }
    }
}

// =============================================================================
// Exchange
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeNftRequest {
    pub caller: Address,
    pub pool: Address,
    pub nft_ids: Vec<NftId>,
    pub wrapped_ids: Vec<WrappedId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEthRequest {
    pub caller: Address,
    pub pool: Address,
    pub recipient: Address,
    pub wrapped_ids: Vec<WrappedId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub burned: Vec<WrappedId>,
    pub nfts: Vec<NftId>,
    pub proceeds: String,
}

impl From<ExchangeReceipt> for ExchangeResponse {
    fn from(r: ExchangeReceipt) -> Self {
        Self {
            burned: r.burned,
            nfts: r.nfts,
            proceeds: r.proceeds.to_string(),
        }
    }
}

// =============================================================================
// Simulator
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMintRequest {
    pub to: Address,
    /// Underlying tokens to mint
    #[serde(default)]
    pub amount: Option<String>,
    /// NFTs of the configured collection to mint
    #[serde(default)]
    pub nft_ids: Vec<NftId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimPoolRequest {
    pub owner: Address,
    /// Defaults to the configured collection
    #[serde(default)]
    pub collection: Option<Address>,
    pub nft_ids: Vec<NftId>,
    pub spot_price: String,
    pub reserves: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimPoolResponse {
    pub pool: Address,
    pub nfts: Vec<NftId>,
}

/// Pool owner hands the pool to another address at the AMM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimPoolOwnerRequest {
    pub caller: Address,
    pub pool: Address,
    pub new_owner: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimAdvanceRequest {
    pub seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClockResponse {
    pub now: Timestamp,
    pub epoch: Option<Epoch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimTreeRequest {
    pub collections: Vec<Address>,
    pub token_ids: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimTreeResponse {
    pub root: MerkleRoot,
    /// Proof per input pair, same order
    pub proofs: Vec<Vec<Hash32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account: Address,
    pub token_balance: String,
    /// Pool sale proceeds credited to this account
    pub payouts: String,
}
