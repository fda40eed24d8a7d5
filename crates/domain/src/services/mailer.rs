use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::model::OtpPurpose;

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Outbound mail seam used for one-time codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose)
        -> Result<(), MailError>;
}

/// Default mailer: records the delivery in the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<(), MailError> {
        info!(
            recipient = to,
            code,
            purpose = purpose.as_ref(),
            "one-time code issued"
        );
        Ok(())
    }
}
