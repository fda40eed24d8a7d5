use chrono::{DateTime, Utc};
use diskwala_domain::model::{
    Balances, Money, NewWithdrawal, UserId, UserRecord, WithdrawalId, WithdrawalRecord, WithdrawalStatus,
    WithdrawalWithOwner,
};
use diskwala_domain::settings::SiteSettings;
use diskwala_domain::storage::{StorageError, StorageResult, WithdrawalStore};
use diskwala_domain::withdrawal::{
    ensure_pending, release_headroom, validate_request, withdrawable_balance, LedgerError,
    WithdrawalCheck,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::entity::withdrawals::{self, WithdrawalStatusDb};
use crate::entity::{user_files, users};
use crate::errors::db_error;
use crate::file_store::{sum_column, usernames};
use crate::user_store::user_to_record;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl WithdrawalStore for SeaOrmStorage {
    async fn request_withdrawal(
        &self,
        request: NewWithdrawal,
        settings: &SiteSettings,
    ) -> Result<WithdrawalRecord, LedgerError> {
        let txn = self.connection().begin().await.map_err(db_error)?;
        let user = users::Entity::find_by_id(request.user_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or(LedgerError::UnknownUser)?;

        let available = available_balance(&txn, &user).await?;
        validate_request(WithdrawalCheck {
            amount: request.amount,
            email_verified: user.email_verified,
            min_withdrawal: settings.min_withdrawal,
            available,
        })?;

        let created = withdrawals::ActiveModel {
            user_id: Set(request.user_id),
            amount: Set(request.amount.micros()),
            payment_method: Set(request.payment_method),
            payment_details: Set(request.payment_details),
            status: Set(WithdrawalStatusDb::Pending),
            requested_at: Set(request.requested_at),
            processed_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;

        users::Entity::update_many()
            .col_expr(
                users::Column::PendingEarnings,
                Expr::col(users::Column::PendingEarnings).sub(request.amount.micros()),
            )
            .filter(users::Column::Id.eq(user.id))
            .exec(&txn)
            .await
            .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        info!(
            withdrawal_id = created.id,
            user_id = user.id,
            amount = %request.amount,
            "withdrawal requested"
        );
        Ok(withdrawal_to_record(created))
    }

    async fn approve_withdrawal(
        &self,
        id: WithdrawalId,
        at: DateTime<Utc>,
    ) -> Result<WithdrawalRecord, LedgerError> {
        let txn = self.connection().begin().await.map_err(db_error)?;
        let settled = transition(&txn, id, WithdrawalStatusDb::Paid, at).await?;
        let amount = Money::from_micros(settled.amount);
        rebalance(&txn, settled.user_id, |balances, _| balances.settle(amount)).await?;
        txn.commit().await.map_err(db_error)?;

        info!(withdrawal_id = id, user_id = settled.user_id, "withdrawal approved");
        Ok(withdrawal_to_record(settled))
    }

    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        at: DateTime<Utc>,
    ) -> Result<WithdrawalRecord, LedgerError> {
        let txn = self.connection().begin().await.map_err(db_error)?;
        let released = transition(&txn, id, WithdrawalStatusDb::Rejected, at).await?;
        let amount = Money::from_micros(released.amount);
        rebalance(&txn, released.user_id, |balances, ledger| {
            let headroom = ledger.headroom(balances.paid_earnings);
            balances.release(amount, headroom);
        })
        .await?;
        txn.commit().await.map_err(db_error)?;

        info!(withdrawal_id = id, user_id = released.user_id, "withdrawal rejected");
        Ok(withdrawal_to_record(released))
    }

    async fn manual_payout(
        &self,
        user_id: UserId,
        amount: Money,
    ) -> Result<UserRecord, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        let txn = self.connection().begin().await.map_err(db_error)?;
        let updated = rebalance(&txn, user_id, |balances, _| balances.manual_payout(amount)).await?;
        txn.commit().await.map_err(db_error)?;

        info!(user_id, amount = %amount, "manual payout recorded");
        Ok(user_to_record(updated))
    }

    async fn withdrawable_balance(&self, user_id: UserId) -> StorageResult<Money> {
        let user = users::Entity::find_by_id(user_id)
            .one(self.connection())
            .await
            .map_err(db_error)?
            .ok_or_else(|| StorageError::Database(format!("user {user_id} not found")))?;
        available_balance(self.connection(), &user).await
    }

    async fn list_withdrawals_for_user(
        &self,
        user_id: UserId,
    ) -> StorageResult<Vec<WithdrawalRecord>> {
        let rows = withdrawals::Entity::find()
            .filter(withdrawals::Column::UserId.eq(user_id))
            .order_by_desc(withdrawals::Column::RequestedAt)
            .order_by_desc(withdrawals::Column::Id)
            .all(self.connection())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(withdrawal_to_record).collect())
    }

    async fn list_all_withdrawals(&self) -> StorageResult<Vec<WithdrawalWithOwner>> {
        let rows = withdrawals::Entity::find()
            .order_by_desc(withdrawals::Column::RequestedAt)
            .order_by_desc(withdrawals::Column::Id)
            .all(self.connection())
            .await
            .map_err(db_error)?;
        let usernames = usernames(self.connection()).await?;
        Ok(rows
            .into_iter()
            .map(|model| WithdrawalWithOwner {
                username: usernames.get(&model.user_id).cloned().unwrap_or_default(),
                withdrawal: withdrawal_to_record(model),
            })
            .collect())
    }
}

/// Guarded `pending -> target` move; returns the updated row.
async fn transition(
    txn: &DatabaseTransaction,
    id: WithdrawalId,
    target: WithdrawalStatusDb,
    at: DateTime<Utc>,
) -> Result<withdrawals::Model, LedgerError> {
    let result = withdrawals::Entity::update_many()
        .col_expr(withdrawals::Column::Status, Expr::value(target))
        .col_expr(withdrawals::Column::ProcessedAt, Expr::value(Some(at)))
        .filter(withdrawals::Column::Id.eq(id))
        .filter(withdrawals::Column::Status.eq(WithdrawalStatusDb::Pending))
        .exec(txn)
        .await
        .map_err(db_error)?;

    let row = withdrawals::Entity::find_by_id(id)
        .one(txn)
        .await
        .map_err(db_error)?
        .ok_or(LedgerError::NotFound)?;
    if result.rows_affected == 0 {
        let status = WithdrawalStatus::from(row.status);
        ensure_pending(status)?;
        return Err(LedgerError::AlreadyProcessed { status });
    }
    Ok(row)
}

/// Aggregates the balance rules need beyond the user row itself.
struct Ledger {
    file_earnings: Money,
    held: Money,
}

impl Ledger {
    async fn load<C: ConnectionTrait>(db: &C, user_id: UserId) -> StorageResult<Self> {
        let file_earnings = sum_column(
            db,
            user_files::Entity::find().filter(user_files::Column::UserId.eq(user_id)),
            user_files::Column::Earnings,
        )
        .await?;
        let held = sum_column(
            db,
            withdrawals::Entity::find()
                .filter(withdrawals::Column::UserId.eq(user_id))
                .filter(withdrawals::Column::Status.eq(WithdrawalStatusDb::Pending)),
            withdrawals::Column::Amount,
        )
        .await?;
        Ok(Self {
            file_earnings: Money::from_micros(file_earnings),
            held: Money::from_micros(held),
        })
    }

    fn headroom(&self, paid_earnings: Money) -> Money {
        release_headroom(self.file_earnings, paid_earnings, self.held)
    }
}

async fn available_balance<C: ConnectionTrait>(
    db: &C,
    user: &users::Model,
) -> StorageResult<Money> {
    let ledger = Ledger::load(db, user.id).await?;
    Ok(withdrawable_balance(
        Money::from_micros(user.pending_earnings),
        ledger.file_earnings,
        Money::from_micros(user.paid_earnings),
        ledger.held,
    ))
}

/// Locks the user row, applies `change` to its balances, then recomputes
/// the lifetime total against the holds left after the change.
async fn rebalance<F>(
    txn: &DatabaseTransaction,
    user_id: UserId,
    change: F,
) -> Result<users::Model, LedgerError>
where
    F: FnOnce(&mut Balances, &Ledger),
{
    let user = users::Entity::find_by_id(user_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(db_error)?
        .ok_or(LedgerError::UnknownUser)?;
    let ledger = Ledger::load(txn, user_id).await?;

    let mut balances = user_to_record(user.clone()).balances;
    change(&mut balances, &ledger);
    balances.reconcile(ledger.held);

    let mut active: users::ActiveModel = user.into();
    active.pending_earnings = Set(balances.pending_earnings.micros());
    active.paid_earnings = Set(balances.paid_earnings.micros());
    active.total_earnings = Set(balances.total_earnings.micros());
    Ok(active.update(txn).await.map_err(db_error)?)
}

fn withdrawal_to_record(model: withdrawals::Model) -> WithdrawalRecord {
    WithdrawalRecord {
        id: model.id,
        user_id: model.user_id,
        amount: Money::from_micros(model.amount),
        payment_method: model.payment_method,
        payment_details: model.payment_details,
        status: model.status.into(),
        requested_at: model.requested_at,
        processed_at: model.processed_at,
    }
}
