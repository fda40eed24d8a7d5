mod common;

use chrono::Utc;
use common::{at, event, file, money, storage, user};
use diskwala_domain::model::{
    FileType, Money, NewWithdrawal, UserRecord, WithdrawalStatus, DEFAULT_PAYMENT_METHOD,
};
use diskwala_domain::settings::SiteSettings;
use diskwala_domain::storage::{AccrualStore, UserStore, WithdrawalStore};
use diskwala_domain::withdrawal::LedgerError;
use diskwala_storage::SeaOrmStorage;

/// One unique image access earns exactly 10.00 at these rates
/// (4.00 for the view plus 6.00 for the download).
fn generous_settings() -> SiteSettings {
    SiteSettings {
        earning_per_view: money("4.00"),
        ..SiteSettings::default()
    }
}

async fn earner(storage: &SeaOrmStorage, name: &str, verified: bool) -> UserRecord {
    let owner = user(storage, name, verified).await;
    let code = format!("{:0<8}", name.to_ascii_uppercase());
    file(storage, &owner, FileType::Image, &code).await;
    storage
        .record_access(event(&code, "9.9.9.9", false, at(1, 12)), &generous_settings())
        .await
        .unwrap()
        .expect("active file");
    storage.find_user(owner.id).await.unwrap().unwrap()
}

fn request(user: &UserRecord, amount: &str) -> NewWithdrawal {
    NewWithdrawal {
        user_id: user.id,
        amount: money(amount),
        payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
        payment_details: "payee@upi".to_string(),
        requested_at: Utc::now(),
    }
}

#[tokio::test]
async fn exact_minimum_is_accepted_and_held() {
    let storage = storage().await;
    let owner = earner(&storage, "alice", true).await;
    assert_eq!(owner.balances.pending_earnings, money("10.00"));

    let created = storage
        .request_withdrawal(request(&owner, "10.00"), &generous_settings())
        .await
        .unwrap();
    assert_eq!(created.status, WithdrawalStatus::Pending);
    assert!(created.processed_at.is_none());

    let after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(after.balances.pending_earnings, Money::ZERO);
    assert_eq!(after.balances.total_earnings, money("10.00"));
    assert_eq!(
        storage.withdrawable_balance(owner.id).await.unwrap(),
        Money::ZERO
    );
}

#[tokio::test]
async fn requests_outside_the_limits_are_rejected() {
    let storage = storage().await;
    let owner = earner(&storage, "bob", true).await;
    let settings = generous_settings();

    assert_eq!(
        storage
            .request_withdrawal(request(&owner, "9.99"), &settings)
            .await,
        Err(LedgerError::BelowMinimum {
            minimum: money("10.00")
        })
    );
    assert_eq!(
        storage
            .request_withdrawal(request(&owner, "10.01"), &settings)
            .await,
        Err(LedgerError::InsufficientBalance {
            available: money("10.00")
        })
    );
    assert_eq!(
        storage
            .request_withdrawal(request(&owner, "10.001"), &settings)
            .await,
        Err(LedgerError::InvalidAmount)
    );
    assert!(storage
        .list_withdrawals_for_user(owner.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unverified_email_blocks_requests() {
    let storage = storage().await;
    let owner = earner(&storage, "carol", false).await;
    assert_eq!(
        storage
            .request_withdrawal(request(&owner, "10.00"), &generous_settings())
            .await,
        Err(LedgerError::EmailNotVerified)
    );
}

#[tokio::test]
async fn approval_settles_once() {
    let storage = storage().await;
    let owner = earner(&storage, "dave", true).await;
    let created = storage
        .request_withdrawal(request(&owner, "10.00"), &generous_settings())
        .await
        .unwrap();

    let approved = storage
        .approve_withdrawal(created.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Paid);
    assert!(approved.processed_at.is_some());

    let after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(after.balances.pending_earnings, Money::ZERO);
    assert_eq!(after.balances.paid_earnings, money("10.00"));
    assert_eq!(after.balances.total_earnings, money("10.00"));

    assert_eq!(
        storage.approve_withdrawal(created.id, Utc::now()).await,
        Err(LedgerError::AlreadyProcessed {
            status: WithdrawalStatus::Paid
        })
    );
    assert_eq!(
        storage.reject_withdrawal(created.id, Utc::now()).await,
        Err(LedgerError::AlreadyProcessed {
            status: WithdrawalStatus::Paid
        })
    );
    let unchanged = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(unchanged.balances, after.balances);
}

#[tokio::test]
async fn rejection_releases_the_hold() {
    let storage = storage().await;
    let owner = earner(&storage, "erin", true).await;
    let created = storage
        .request_withdrawal(request(&owner, "10.00"), &generous_settings())
        .await
        .unwrap();

    let rejected = storage
        .reject_withdrawal(created.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);

    let after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(after.balances.pending_earnings, money("10.00"));
    assert_eq!(after.balances.paid_earnings, Money::ZERO);
    assert_eq!(
        storage.withdrawable_balance(owner.id).await.unwrap(),
        money("10.00")
    );
}

#[tokio::test]
async fn unknown_withdrawal_is_not_found() {
    let storage = storage().await;
    assert_eq!(
        storage.approve_withdrawal(4242, Utc::now()).await,
        Err(LedgerError::NotFound)
    );
    assert_eq!(
        storage.reject_withdrawal(4242, Utc::now()).await,
        Err(LedgerError::NotFound)
    );
}

#[tokio::test]
async fn manual_payout_clamps_pending_at_zero() {
    let storage = storage().await;
    let owner = earner(&storage, "frank", true).await;

    let paid = storage
        .manual_payout(owner.id, money("25.00"))
        .await
        .unwrap();
    assert_eq!(paid.balances.pending_earnings, Money::ZERO);
    assert_eq!(paid.balances.paid_earnings, money("25.00"));
    assert_eq!(paid.balances.total_earnings, money("25.00"));

    assert_eq!(
        storage.manual_payout(owner.id, Money::ZERO).await,
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        storage.manual_payout(9999, money("1.00")).await,
        Err(LedgerError::UnknownUser)
    );
}

#[tokio::test]
async fn rejection_after_manual_payout_cannot_overdraw() {
    let storage = storage().await;
    let owner = earner(&storage, "heidi", true).await;
    storage
        .record_access(
            event("HEIDI000", "8.8.8.8", false, at(1, 13)),
            &generous_settings(),
        )
        .await
        .unwrap()
        .expect("active file");
    let owner = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(owner.balances.pending_earnings, money("20.00"));

    let created = storage
        .request_withdrawal(request(&owner, "10.00"), &generous_settings())
        .await
        .unwrap();
    let paid = storage
        .manual_payout(owner.id, money("15.00"))
        .await
        .unwrap();
    assert_eq!(paid.balances.pending_earnings, Money::ZERO);
    assert_eq!(paid.balances.paid_earnings, money("15.00"));
    assert_eq!(paid.balances.total_earnings, money("25.00"));

    storage
        .reject_withdrawal(created.id, Utc::now())
        .await
        .unwrap();
    let after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(after.balances.pending_earnings, money("5.00"));
    assert_eq!(after.balances.paid_earnings, money("15.00"));
    assert_eq!(after.balances.total_earnings, money("20.00"));
    assert_eq!(
        storage.withdrawable_balance(owner.id).await.unwrap(),
        money("5.00")
    );

    let settings = SiteSettings {
        min_withdrawal: money("1.00"),
        ..generous_settings()
    };
    assert_eq!(
        storage
            .request_withdrawal(request(&owner, "5.01"), &settings)
            .await,
        Err(LedgerError::InsufficientBalance {
            available: money("5.00")
        })
    );
}

#[tokio::test]
async fn total_counts_amounts_still_on_hold() {
    let storage = storage().await;
    let owner = earner(&storage, "ivan", true).await;
    let settings = SiteSettings {
        min_withdrawal: money("1.00"),
        ..generous_settings()
    };
    let first = storage
        .request_withdrawal(request(&owner, "4.00"), &settings)
        .await
        .unwrap();
    storage
        .request_withdrawal(request(&owner, "3.00"), &settings)
        .await
        .unwrap();

    storage.approve_withdrawal(first.id, Utc::now()).await.unwrap();
    let after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(after.balances.paid_earnings, money("4.00"));
    assert_eq!(after.balances.pending_earnings, money("3.00"));
    assert_eq!(after.balances.total_earnings, money("10.00"));

    let paid = storage.manual_payout(owner.id, money("1.00")).await.unwrap();
    assert_eq!(paid.balances.pending_earnings, money("2.00"));
    assert_eq!(paid.balances.total_earnings, money("10.00"));
}

#[tokio::test]
async fn listings_are_newest_first_with_owner_names() {
    let storage = storage().await;
    let owner = earner(&storage, "grace", true).await;
    let settings = SiteSettings {
        min_withdrawal: money("1.00"),
        ..generous_settings()
    };

    let mut first = request(&owner, "2.00");
    first.requested_at = at(2, 9);
    let mut second = request(&owner, "3.00");
    second.requested_at = at(3, 9);
    let older = storage.request_withdrawal(first, &settings).await.unwrap();
    let newer = storage.request_withdrawal(second, &settings).await.unwrap();

    let mine = storage.list_withdrawals_for_user(owner.id).await.unwrap();
    assert_eq!(
        mine.iter().map(|w| w.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );

    let all = storage.list_all_withdrawals().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|row| row.username == "grace"));
    assert_eq!(
        storage.withdrawable_balance(owner.id).await.unwrap(),
        money("5.00")
    );
}
