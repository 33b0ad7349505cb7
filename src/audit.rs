use crate::confidence::SourceInfo;
use crate::errors::AppError;
use crate::sources::AuditSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One provenance record as written to an audit sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub piva: String,
    pub field: String,
    pub value: serde_json::Value,
    pub source: String,
    pub method: String,
    pub confidence: String,
    pub recorded_at: DateTime<Utc>,
    pub correlation_id: Uuid,
}

impl AuditRecord {
    pub fn new(
        piva: &str,
        field: &str,
        value: serde_json::Value,
        source: &SourceInfo,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            piva: piva.to_string(),
            field: field.to_string(),
            value,
            source: source.source.clone(),
            method: source.method.clone(),
            confidence: source.confidence.as_str().to_string(),
            recorded_at: source.timestamp,
            correlation_id,
        }
    }
}

/// Sink that keeps records in memory. Used in tests and demos.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(
        &self,
        piva: &str,
        field: &str,
        value: serde_json::Value,
        source: &SourceInfo,
        correlation_id: Uuid,
    ) -> Result<(), AppError> {
        let record = AuditRecord::new(piva, field, value, source, correlation_id);
        self.records
            .lock()
            .map_err(|_| AppError::InternalError("audit buffer poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}

/// Writes every entry, logging and skipping the ones the sink rejects.
///
/// Returns how many were recorded. Audit is best-effort and never fails the
/// request it describes.
pub async fn record_all(
    sink: &dyn AuditSink,
    piva: &str,
    entries: Vec<(String, serde_json::Value, SourceInfo)>,
    correlation_id: Uuid,
) -> usize {
    let mut recorded = 0;
    for (field, value, source) in entries {
        match sink.record(piva, &field, value, &source, correlation_id).await {
            Ok(()) => recorded += 1,
            Err(e) => tracing::warn!(
                "Audit record {} for {} failed (request {}): {}",
                field,
                piva,
                correlation_id,
                e
            ),
        }
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::Confidence;
    use serde_json::json;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(
            &self,
            _piva: &str,
            _field: &str,
            _value: serde_json::Value,
            _source: &SourceInfo,
            _correlation_id: Uuid,
        ) -> Result<(), AppError> {
            Err(AppError::InternalError("audit table missing".to_string()))
        }
    }

    #[tokio::test]
    async fn test_record_all_keeps_provenance() {
        let sink = MemoryAuditSink::new();
        let id = Uuid::new_v4();
        let info = SourceInfo::new("OSM", "polygon geometry", Confidence::High);

        let n = record_all(
            &sink,
            "12345678901",
            vec![("building.area".to_string(), json!(1200.0), info)],
            id,
        )
        .await;

        assert_eq!(n, 1);
        let records = sink.records();
        assert_eq!(records[0].field, "building.area");
        assert_eq!(records[0].confidence, "HIGH");
        assert_eq!(records[0].correlation_id, id);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let info = SourceInfo::new("OSM", "heuristic", Confidence::Medium);
        let n = record_all(
            &FailingSink,
            "12345678901",
            vec![("building.basement".to_string(), json!(false), info)],
            Uuid::new_v4(),
        )
        .await;
        assert_eq!(n, 0);
    }
}
