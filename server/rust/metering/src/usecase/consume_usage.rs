use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::domain::entity::{day_key, Identity, QuotaClass, QuotaLimits, UsageDecision};
use crate::domain::repository::UsageCounterStore;

/// チェック&消費の入力。
#[derive(Debug, Clone)]
pub struct ConsumeUsageInput {
    pub identity: Identity,
    pub class: QuotaClass,
}

#[derive(Debug, Error)]
pub enum ConsumeUsageError {
    #[error("usage counter store unavailable: {0}")]
    StoreUnavailable(String),
}

/// 本日分のカウンターを上限付きで 1 消費するユースケース。
/// 上限到達は正常系の判定結果であり、エラーにはしない。
pub struct ConsumeUsageUseCase {
    store: Arc<dyn UsageCounterStore>,
    limits: QuotaLimits,
}

impl ConsumeUsageUseCase {
    pub fn new(store: Arc<dyn UsageCounterStore>, limits: QuotaLimits) -> Self {
        Self { store, limits }
    }

    pub async fn execute(
        &self,
        input: ConsumeUsageInput,
    ) -> Result<UsageDecision, ConsumeUsageError> {
        let now = Utc::now();
        let limit = self.limits.limit_for(input.class);
        let key = day_key(input.class, &input.identity, now.date_naive());

        let outcome = self
            .store
            .increment_with_ceiling(&key, limit)
            .await
            .map_err(|e| ConsumeUsageError::StoreUnavailable(e.to_string()))?;

        Ok(UsageDecision::new(
            outcome.admitted,
            outcome.count,
            limit,
            now,
        ))
    }
}
