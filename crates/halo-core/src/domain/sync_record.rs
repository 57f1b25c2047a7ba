//! 동기화 실행 기록 모델.
//!
//! 하나의 동기화 실행은 하나의 `SyncRecord` 행으로 추적됩니다.
//!
//! ```text
//! Pending ──> Running ──> Success
//!    │           │
//!    └───────────┴──────> Failed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 전체 동기화의 `sync_type` 값.
pub const SYNC_TYPE_FULL: &str = "full_sync";

/// 동기화 기록 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// 더 이상 전이할 수 없는 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// `self`에서 `next`로의 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Failed)
        )
    }

    /// `self`로 전이할 수 있는 이전 상태 목록.
    pub fn allowed_predecessors(&self) -> &'static [SyncStatus] {
        match self {
            Self::Pending => &[],
            Self::Running => &[Self::Pending],
            Self::Success => &[Self::Running],
            Self::Failed => &[Self::Pending, Self::Running],
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}

/// 새 동기화 기록.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSyncRecord {
    pub sync_type: String,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
}

impl NewSyncRecord {
    /// `pending` 상태의 기록을 만듭니다.
    pub fn pending(sync_type: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            sync_type: sync_type.into(),
            status: SyncStatus::Pending,
            started_at,
        }
    }
}

/// 동기화 기록 갱신 내용.
///
/// `None` 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRecordUpdate {
    pub status: Option<SyncStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 소요 시간 (초)
    pub duration: Option<i64>,
    pub total_records: Option<i64>,
    pub success_records: Option<i64>,
    pub failed_records: Option<i64>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
}

impl SyncRecordUpdate {
    /// `running` 전이.
    pub fn running() -> Self {
        Self {
            status: Some(SyncStatus::Running),
            ..Default::default()
        }
    }

    /// 종료 상태(`success`/`failed`) 전이.
    pub fn finished(status: SyncStatus, completed_at: DateTime<Utc>, duration: i64) -> Self {
        Self {
            status: Some(status),
            completed_at: Some(completed_at),
            duration: Some(duration),
            ..Default::default()
        }
    }

    pub fn with_counts(mut self, total: i64, success: i64, failed: i64) -> Self {
        self.total_records = Some(total);
        self.success_records = Some(success);
        self.failed_records = Some(failed);
        self
    }

    pub fn with_error(
        mut self,
        message: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        self.error_message = message;
        self.error_details = details;
        self
    }
}

/// 저장된 동기화 기록.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: i64,
    pub sync_type: String,
    pub status: SyncStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub total_records: i64,
    pub success_records: i64,
    pub failed_records: i64,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
}

impl SyncRecord {
    /// 새 기록으로부터 저장 직후의 상태를 만듭니다.
    pub fn from_new(id: i64, new: &NewSyncRecord) -> Self {
        Self {
            id,
            sync_type: new.sync_type.clone(),
            status: new.status,
            started_at: Some(new.started_at),
            completed_at: None,
            duration: None,
            total_records: 0,
            success_records: 0,
            failed_records: 0,
            error_message: None,
            error_details: None,
        }
    }

    /// 갱신 내용을 적용합니다. 허용되지 않는 상태 전이는 에러입니다.
    pub fn apply(&mut self, update: &SyncRecordUpdate) -> Result<(), String> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(format!(
                    "invalid sync status transition {} -> {}",
                    self.status, next
                ));
            }
            self.status = next;
        }
        if let Some(at) = update.completed_at {
            self.completed_at = Some(at);
        }
        if let Some(duration) = update.duration {
            self.duration = Some(duration);
        }
        if let Some(total) = update.total_records {
            self.total_records = total;
        }
        if let Some(success) = update.success_records {
            self.success_records = success;
        }
        if let Some(failed) = update.failed_records {
            self.failed_records = failed;
        }
        if update.error_message.is_some() {
            self.error_message = update.error_message.clone();
        }
        if update.error_details.is_some() {
            self.error_details = update.error_details.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(SyncStatus::Pending.can_transition_to(SyncStatus::Running));
        assert!(SyncStatus::Pending.can_transition_to(SyncStatus::Failed));
        assert!(SyncStatus::Running.can_transition_to(SyncStatus::Success));
        assert!(SyncStatus::Running.can_transition_to(SyncStatus::Failed));

        assert!(!SyncStatus::Pending.can_transition_to(SyncStatus::Success));
        assert!(!SyncStatus::Success.can_transition_to(SyncStatus::Failed));
        assert!(!SyncStatus::Failed.can_transition_to(SyncStatus::Running));
        assert!(!SyncStatus::Running.can_transition_to(SyncStatus::Running));
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Running,
            SyncStatus::Success,
            SyncStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("done".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_record_apply_lifecycle() {
        let started = Utc::now();
        let mut record = SyncRecord::from_new(1, &NewSyncRecord::pending(SYNC_TYPE_FULL, started));
        assert_eq!(record.status, SyncStatus::Pending);

        record.apply(&SyncRecordUpdate::running()).unwrap();
        assert_eq!(record.status, SyncStatus::Running);

        let update = SyncRecordUpdate::finished(SyncStatus::Success, started, 12)
            .with_counts(120, 110, 0);
        record.apply(&update).unwrap();
        assert_eq!(record.status, SyncStatus::Success);
        assert_eq!(record.duration, Some(12));
        assert_eq!(record.total_records, 120);

        // 종료 후에는 어떤 전이도 허용되지 않음
        let again = SyncRecordUpdate::finished(SyncStatus::Failed, started, 13);
        assert!(record.apply(&again).is_err());
        assert_eq!(record.status, SyncStatus::Success);
    }
}
