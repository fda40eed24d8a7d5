use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use diskwala_domain::model::{
    Balances, Money, NewWithdrawal, WithdrawalRecord, WithdrawalStatus, DEFAULT_PAYMENT_METHOD,
};
use diskwala_domain::storage::WithdrawalStore;
use diskwala_domain::withdrawal::LedgerError;
use metrics::counter;
use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::auth::authenticate;
use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub id: i64,
    pub amount: Money,
    pub payment_method: String,
    pub payment_details: String,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<WithdrawalRecord> for WithdrawalResponse {
    fn from(record: WithdrawalRecord) -> Self {
        Self {
            id: record.id,
            amount: record.amount,
            payment_method: record.payment_method,
            payment_details: record.payment_details,
            status: record.status,
            requested_at: record.requested_at,
            processed_at: record.processed_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Option<Money>,
    pub payment_method: Option<String>,
    pub payment_details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(flatten)]
    pub balances: Balances,
    pub withdrawable: Money,
    pub min_withdrawal: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum LedgerOutcome {
    Ok,
    AlreadyProcessed,
    NotFound,
    Error,
    Rejected,
}

/// Metric label for the outcome of a ledger operation.
pub(crate) fn ledger_result<T>(result: &Result<T, LedgerError>) -> &'static str {
    let outcome = match result {
        Ok(_) => LedgerOutcome::Ok,
        Err(LedgerError::AlreadyProcessed { .. }) => LedgerOutcome::AlreadyProcessed,
        Err(LedgerError::NotFound | LedgerError::UnknownUser) => LedgerOutcome::NotFound,
        Err(LedgerError::Storage(_)) => LedgerOutcome::Error,
        Err(_) => LedgerOutcome::Rejected,
    };
    outcome.into()
}

pub async fn balance_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let settings = state.site_settings().await?;
    let withdrawable = state.storage().withdrawable_balance(user.id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse {
        balances: user.balances,
        withdrawable,
        min_withdrawal: settings.min_withdrawal,
    }))
}

pub async fn withdraw_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<WithdrawRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let payload = payload.into_inner();
    let amount = payload
        .amount
        .ok_or_else(|| ApiError::validation("invalid amount"))?;
    let settings = state.site_settings().await?;

    let result = state
        .storage()
        .request_withdrawal(
            NewWithdrawal {
                user_id: user.id,
                amount,
                payment_method: payload
                    .payment_method
                    .map(|method| method.trim().to_string())
                    .filter(|method| !method.is_empty())
                    .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
                payment_details: payload.payment_details.unwrap_or_default(),
                requested_at: Utc::now(),
            },
            &settings,
        )
        .await;
    counter!("api_withdrawals_total", "action" => "request", "result" => ledger_result(&result))
        .increment(1);

    Ok(HttpResponse::Created().json(WithdrawalResponse::from(result?)))
}

pub async fn list_withdrawals_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let records = state.storage().list_withdrawals_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(
        records
            .into_iter()
            .map(WithdrawalResponse::from)
            .collect::<Vec<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_results_map_to_metric_labels() {
        let ok: Result<(), LedgerError> = Ok(());
        assert_eq!(ledger_result(&ok), "ok");
        let settled: Result<(), LedgerError> = Err(LedgerError::AlreadyProcessed {
            status: WithdrawalStatus::Paid,
        });
        assert_eq!(ledger_result(&settled), "already_processed");
        let missing: Result<(), LedgerError> = Err(LedgerError::UnknownUser);
        assert_eq!(ledger_result(&missing), "not_found");
        let refused: Result<(), LedgerError> = Err(LedgerError::EmailNotVerified);
        assert_eq!(ledger_result(&refused), "rejected");
    }
}
