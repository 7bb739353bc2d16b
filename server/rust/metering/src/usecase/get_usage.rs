use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::domain::entity::{day_key, Identity, QuotaClass, QuotaLimits, UsageSnapshot};
use crate::domain::repository::UsageCounterStore;

/// 使用量照会の入力。
#[derive(Debug, Clone)]
pub struct GetUsageInput {
    pub identity: Identity,
    pub class: QuotaClass,
}

#[derive(Debug, Error)]
pub enum GetUsageError {
    #[error("usage counter store unavailable: {0}")]
    StoreUnavailable(String),
}

/// 本日分の使用量を消費せずに読み取るユースケース。
pub struct GetUsageUseCase {
    store: Arc<dyn UsageCounterStore>,
    limits: QuotaLimits,
}

impl GetUsageUseCase {
    pub fn new(store: Arc<dyn UsageCounterStore>, limits: QuotaLimits) -> Self {
        Self { store, limits }
    }

    pub async fn execute(&self, input: GetUsageInput) -> Result<UsageSnapshot, GetUsageError> {
        let now = Utc::now();
        let limit = self.limits.limit_for(input.class);
        let key = day_key(input.class, &input.identity, now.date_naive());

        let current = self
            .store
            .get(&key)
            .await
            .map_err(|e| GetUsageError::StoreUnavailable(e.to_string()))?;

        Ok(UsageSnapshot::new(current, limit, now))
    }
}
