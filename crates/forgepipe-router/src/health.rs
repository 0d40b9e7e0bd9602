//! A process-wide table of [`ProviderHealthRecord`]s, one per provider,
//! updated after every terminal call.

use std::collections::HashMap;
use std::sync::Mutex;

use forgepipe_core::provider_health::{HealthState, ProviderHealthRecord};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct HealthTable {
    records: RwLock<HashMap<String, Mutex<ProviderHealthRecord>>>,
}

impl HealthTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, provider: &str, success: bool, latency_ms: u64) {
        if let Some(record) = self.records.read().await.get(provider) {
            record
                .lock()
                .expect("provider health mutex poisoned")
                .record(success, latency_ms);
            return;
        }
        let mut records = self.records.write().await;
        let record = records
            .entry(provider.to_string())
            .or_insert_with(|| Mutex::new(ProviderHealthRecord::new()));
        record.lock().expect("provider health mutex poisoned").record(success, latency_ms);
    }

    pub async fn state(&self, provider: &str) -> HealthState {
        match self.records.read().await.get(provider) {
            Some(record) => record.lock().expect("provider health mutex poisoned").state(),
            None => HealthState::Unknown,
        }
    }
}
