//! Withdrawal ledger rules: request validation, the pending → paid/rejected
//! state machine and the balance moves each transition implies.

use thiserror::Error;

use crate::model::{Balances, Money, WithdrawalStatus};
use crate::storage::StorageError;

/// Requested amounts are expressed in whole cents.
pub const WITHDRAWAL_DECIMALS: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be a positive value with at most {WITHDRAWAL_DECIMALS} decimals")]
    InvalidAmount,
    #[error("verify your email before requesting a withdrawal")]
    EmailNotVerified,
    #[error("minimum withdrawal is ${}", .minimum.format_dp(WITHDRAWAL_DECIMALS))]
    BelowMinimum { minimum: Money },
    #[error("insufficient balance (available ${})", .available.format_dp(WITHDRAWAL_DECIMALS))]
    InsufficientBalance { available: Money },
    #[error("withdrawal not found")]
    NotFound,
    #[error("user not found")]
    UnknownUser,
    #[error("withdrawal already {}", .status.as_ref())]
    AlreadyProcessed { status: WithdrawalStatus },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerError {
    /// True for the caller-facing precondition failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount
                | LedgerError::EmailNotVerified
                | LedgerError::BelowMinimum { .. }
                | LedgerError::InsufficientBalance { .. }
        )
    }
}

/// Inputs to the create-withdrawal precondition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalCheck {
    pub amount: Money,
    pub email_verified: bool,
    pub min_withdrawal: Money,
    pub available: Money,
}

/// Checks run in order: amount shape, email verification, minimum, balance.
pub fn validate_request(check: WithdrawalCheck) -> Result<(), LedgerError> {
    if !check.amount.is_positive() || check.amount.fractional_digits() > WITHDRAWAL_DECIMALS {
        return Err(LedgerError::InvalidAmount);
    }
    if !check.email_verified {
        return Err(LedgerError::EmailNotVerified);
    }
    if check.amount < check.min_withdrawal {
        return Err(LedgerError::BelowMinimum {
            minimum: check.min_withdrawal,
        });
    }
    if check.amount > check.available {
        return Err(LedgerError::InsufficientBalance {
            available: check.available.max(Money::ZERO),
        });
    }
    Ok(())
}

/// Withdrawable amount given the pending balance on the user row and the
/// aggregate of file earnings minus everything paid out (withdrawals and
/// manual payouts alike) and everything still held by pending requests.
pub fn withdrawable_balance(
    pending_earnings: Money,
    file_earnings: Money,
    paid_earnings: Money,
    pending_withdrawals: Money,
) -> Money {
    pending_earnings
        .min(release_headroom(file_earnings, paid_earnings, pending_withdrawals))
        .max(Money::ZERO)
}

/// Upper bound for the pending balance: what the files earned that is
/// neither paid nor held.
pub fn release_headroom(
    file_earnings: Money,
    paid_earnings: Money,
    pending_withdrawals: Money,
) -> Money {
    file_earnings - paid_earnings - pending_withdrawals
}

/// Only pending withdrawals may transition.
pub fn ensure_pending(status: WithdrawalStatus) -> Result<(), LedgerError> {
    if status.is_terminal() {
        return Err(LedgerError::AlreadyProcessed { status });
    }
    Ok(())
}

impl Balances {
    /// Holds a freshly requested amount out of the withdrawable balance.
    pub fn hold(&mut self, amount: Money) {
        self.pending_earnings -= amount;
    }

    /// Approval completes the move started by [`Balances::hold`].
    pub fn settle(&mut self, amount: Money) {
        self.paid_earnings += amount;
    }

    /// Rejection releases the hold, but never past `headroom`: a manual
    /// payout taken while the request was pending already consumed part of
    /// it. Pending never shrinks on release.
    pub fn release(&mut self, amount: Money, headroom: Money) {
        let released = (self.pending_earnings + amount).min(headroom);
        self.pending_earnings = self.pending_earnings.max(released);
    }

    /// Out-of-band settlement recorded by an admin.
    pub fn manual_payout(&mut self, amount: Money) {
        self.paid_earnings += amount;
        self.pending_earnings = (self.pending_earnings - amount).max(Money::ZERO);
    }

    /// Lifetime total: paid, plus pending, plus whatever pending requests
    /// still hold.
    pub fn reconcile(&mut self, held: Money) {
        self.total_earnings = self.paid_earnings + self.pending_earnings + held;
    }

    pub fn accrue(&mut self, amount: Money) {
        self.pending_earnings += amount;
        self.total_earnings += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(raw: &str) -> Money {
        raw.parse().unwrap()
    }

    fn check(amount: &str) -> WithdrawalCheck {
        WithdrawalCheck {
            amount: money(amount),
            email_verified: true,
            min_withdrawal: money("10.00"),
            available: money("25.00"),
        }
    }

    #[test]
    fn exact_minimum_is_accepted() {
        assert_eq!(validate_request(check("10.00")), Ok(()));
    }

    #[test]
    fn one_cent_below_minimum_is_rejected() {
        assert_eq!(
            validate_request(check("9.99")),
            Err(LedgerError::BelowMinimum {
                minimum: money("10.00")
            })
        );
    }

    #[test]
    fn above_balance_is_rejected() {
        assert_eq!(
            validate_request(check("25.01")),
            Err(LedgerError::InsufficientBalance {
                available: money("25.00")
            })
        );
    }

    #[test]
    fn unverified_email_fails_regardless_of_amount() {
        for amount in ["10.00", "20.00", "5.00", "1000.00"] {
            let mut input = check(amount);
            input.email_verified = false;
            assert_eq!(validate_request(input), Err(LedgerError::EmailNotVerified));
        }
    }

    #[test]
    fn malformed_amounts_are_rejected() {
        assert_eq!(validate_request(check("0")), Err(LedgerError::InvalidAmount));
        assert_eq!(
            validate_request(check("-10")),
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(
            validate_request(check("10.001")),
            Err(LedgerError::InvalidAmount)
        );
    }

    #[test]
    fn withdrawable_takes_the_lower_ledger() {
        assert_eq!(
            withdrawable_balance(money("8"), money("20"), money("5"), money("2")),
            money("8")
        );
        assert_eq!(
            withdrawable_balance(money("30"), money("20"), money("5"), money("2")),
            money("13")
        );
        assert_eq!(
            withdrawable_balance(money("30"), money("2"), money("5"), money("0")),
            Money::ZERO
        );
    }

    #[test]
    fn terminal_statuses_cannot_transition() {
        assert_eq!(ensure_pending(WithdrawalStatus::Pending), Ok(()));
        assert_eq!(
            ensure_pending(WithdrawalStatus::Paid),
            Err(LedgerError::AlreadyProcessed {
                status: WithdrawalStatus::Paid
            })
        );
    }

    #[test]
    fn hold_then_settle_moves_amount_from_pending_to_paid() {
        let mut balances = Balances::default();
        balances.accrue(money("30"));
        balances.hold(money("10"));
        assert_eq!(balances.total_earnings, money("30"));
        balances.settle(money("10"));
        balances.reconcile(Money::ZERO);
        assert_eq!(balances.pending_earnings, money("20"));
        assert_eq!(balances.paid_earnings, money("10"));
        assert_eq!(balances.total_earnings, money("30"));
    }

    #[test]
    fn hold_then_release_restores_pending() {
        let mut balances = Balances::default();
        balances.accrue(money("30"));
        balances.hold(money("10"));
        balances.release(money("10"), money("30"));
        assert_eq!(balances.pending_earnings, money("30"));
        assert_eq!(balances.paid_earnings, Money::ZERO);
    }

    #[test]
    fn release_after_manual_payout_stops_at_headroom() {
        // 20 earned, 10 held, then 15 paid out of band.
        let mut balances = Balances::default();
        balances.accrue(money("20"));
        balances.hold(money("10"));
        balances.manual_payout(money("15"));
        assert_eq!(balances.pending_earnings, Money::ZERO);

        let headroom = release_headroom(money("20"), balances.paid_earnings, Money::ZERO);
        balances.release(money("10"), headroom);
        balances.reconcile(Money::ZERO);
        assert_eq!(balances.pending_earnings, money("5"));
        assert_eq!(balances.total_earnings, money("20"));
        assert_eq!(
            withdrawable_balance(
                balances.pending_earnings,
                money("20"),
                balances.paid_earnings,
                Money::ZERO
            ),
            money("5")
        );
    }

    #[test]
    fn release_never_lowers_pending() {
        let mut balances = Balances::default();
        balances.accrue(money("4"));
        balances.release(money("10"), money("-3"));
        assert_eq!(balances.pending_earnings, money("4"));
    }

    #[test]
    fn manual_payout_clamps_pending_at_zero() {
        let mut balances = Balances::default();
        balances.accrue(money("5"));
        balances.manual_payout(money("8"));
        balances.reconcile(Money::ZERO);
        assert_eq!(balances.pending_earnings, Money::ZERO);
        assert_eq!(balances.paid_earnings, money("8"));
        assert_eq!(balances.total_earnings, money("8"));
    }
}
