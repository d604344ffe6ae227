mod common;

use common::*;
use lend::LoanStatus;
use spot_core::ProtocolError;

#[test]
fn test_liquidation_waits_for_default() {
    let mut h = Harness::new();
    h.borrow(&[3], 900, 0);
    let vault = h.vault();

    // grace of two epochs
    let err = h
        .spot
        .liquidate_lp(&h.ctx(carol(), 2), vault, &[3], &[0, 1, 2])
        .unwrap_err();
    assert_eq!(err, ProtocolError::NotDefaulted { token_id: 3 }.into());
    assert_eq!(h.spot.wrapper().position(3).unwrap().owner, alice());
}

#[test]
fn test_liquidation_seizes_position_once() {
    let mut h = Harness::new();
    h.borrow(&[3], 900, 0);
    let vault = h.vault();

    let liquidated = h
        .spot
        .liquidate_lp(&h.ctx(carol(), 3), vault, &[3], &[1, 2])
        .unwrap();
    assert_eq!(liquidated[0].forfeited_interest, 18);
    assert_eq!(liquidated[0].loan.status, LoanStatus::Liquidated);
    assert_eq!(h.spot.wrapper().position(3).unwrap().owner, vault);
    assert_eq!(h.spot.vault().outstanding_principal(), 0);
    assert_eq!(h.spot.ledger().total_principal(), 0);

    let balances = (h.balance(vault), h.balance(alice()), h.balance(carol()));
    let err = h
        .spot
        .liquidate_lp(&h.ctx(carol(), 3), vault, &[3], &[1, 2])
        .unwrap_err();
    assert_eq!(err, ProtocolError::AlreadyLiquidated { token_id: 3 }.into());
    assert_eq!(
        (h.balance(vault), h.balance(alice()), h.balance(carol())),
        balances
    );
    assert_eq!(h.spot.wrapper().position(3).unwrap().owner, vault);
}

#[test]
fn test_paying_interest_prevents_default() {
    let mut h = Harness::new();
    h.borrow(&[3], 900, 0);
    let vault = h.vault();
    h.spot
        .pay_interest(&h.ctx(alice(), 1), vault, &[0, 1], &[3])
        .unwrap();

    let err = h
        .spot
        .liquidate_lp(&h.ctx(carol(), 3), vault, &[3], &[2, 3])
        .unwrap_err();
    assert_eq!(err.error_code(), "not_defaulted");
}

#[test]
fn test_liquidation_rejects_paid_epochs() {
    let mut h = Harness::new();
    h.borrow(&[3], 900, 0);
    let vault = h.vault();
    h.spot
        .pay_interest(&h.ctx(alice(), 1), vault, &[1], &[3])
        .unwrap();

    let err = h
        .spot
        .liquidate_lp(&h.ctx(carol(), 3), vault, &[3], &[1])
        .unwrap_err();
    assert_eq!(err.error_code(), "epoch_range");
    assert!(h.spot.ledger().has_open_loan(&lend::LoanKey::new(h.wrapper(), 3)));
}

#[test]
fn test_liquidated_loan_cannot_be_repaid() {
    let mut h = Harness::new();
    h.borrow(&[3], 900, 0);
    let (vault, pool) = (h.vault(), h.pool);
    h.spot
        .liquidate_lp(&h.ctx(carol(), 3), vault, &[3], &[])
        .unwrap();

    let err = h
        .spot
        .repay(&h.ctx(alice(), 3), vault, pool, &[3], &[900])
        .unwrap_err();
    assert_eq!(err, ProtocolError::AlreadyLiquidated { token_id: 3 }.into());
}

#[test]
fn test_vault_exchanges_seized_position() {
    let mut h = Harness::new();
    h.borrow(&[3], 900, 0);
    let (vault, pool) = (h.vault(), h.pool);
    h.spot
        .liquidate_lp(&h.ctx(carol(), 3), vault, &[3], &[])
        .unwrap();

    let receipt = h
        .spot
        .exchange_lp_for_eth(&h.ctx(vault, 3), pool, vault, &[3])
        .unwrap();
    assert_eq!(receipt.proceeds, 50);
    assert_eq!(h.spot.custodian().payout_of(&vault), 50);
}

#[test]
fn test_default_loss_stays_with_funding_reservation() {
    let mut h = Harness::new();
    h.spot.token_mut().mint(carol(), 12_000).unwrap();
    h.spot
        .purchase(&h.ctx(carol(), 0), &[6_000, 6_000], 4, 6)
        .unwrap();
    h.borrow(&[1, 2, 3], 970, 0);
    let vault = h.vault();
    assert_eq!(h.balance(vault), 24_000 - 2_910);

    // bob's window is over but part of it is still lent out
    let err = h.spot.claim(&h.ctx(bob(), 4), 0).unwrap_err();
    assert_eq!(err.error_code(), "epoch_range");

    h.spot
        .liquidate_lp(&h.ctx(carol(), 4), vault, &[1, 2, 3], &[])
        .unwrap();

    let bob_claim = h.spot.claim(&h.ctx(bob(), 4), 0).unwrap();
    assert_eq!(bob_claim.capital, 12_000 - 2_910);
    assert_eq!(bob_claim.written_off, 2_910);

    let carol_claim = h.spot.claim(&h.ctx(carol(), 6), 1).unwrap();
    assert_eq!(carol_claim.capital, 12_000);
    assert_eq!(carol_claim.written_off, 0);
    assert_eq!(h.balance(vault), 0);
}
