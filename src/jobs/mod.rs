//! Maintenance jobs
//!
//! Two periodic sweeps run beside the server: expired rate-limit windows are
//! purged, and yesterday's attendance gaps are filled with `absent` rows.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::clock::{Clock, SystemClock};
use crate::domain::{AttendanceStatus, SettlementSettings};

// =========================================================================
// Rate-limit windows
// =========================================================================

/// Drop per-key minute windows older than the previous one
pub async fn cleanup_rate_limit_buckets(pool: &PgPool) -> Result<u64, JobError> {
    let purged = sqlx::query(
        "DELETE FROM rate_limit_buckets WHERE window_start < date_trunc('minute', NOW()) - INTERVAL '1 minute'",
    )
    .execute(pool)
    .await?
    .rows_affected();

    if purged > 0 {
        tracing::debug!(windows = purged, "Purged closed rate-limit windows");
    }

    Ok(purged)
}

// =========================================================================
// Absences
// =========================================================================

/// Record `absent` for every active operator with no attendance row on `work_date`.
///
/// Idempotent: days that already have a record are left alone.
pub async fn mark_absent(pool: &PgPool, work_date: NaiveDate) -> Result<u64, JobError> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance (operator_id, work_date, status)
        SELECT id, $1, $2 FROM operators WHERE is_active
        ON CONFLICT (operator_id, work_date) DO NOTHING
        "#,
    )
    .bind(work_date)
    .bind(AttendanceStatus::Absent.as_str())
    .execute(pool)
    .await?;

    let rows_inserted = result.rows_affected();

    if rows_inserted > 0 {
        tracing::info!(
            %work_date,
            operators = rows_inserted,
            "Marked operators absent"
        );
    }

    Ok(rows_inserted)
}

/// The business day before the one containing `now`
pub fn previous_business_day(settings: &SettlementSettings, now: DateTime<Utc>) -> NaiveDate {
    settings.business_date(now - ChronoDuration::days(1))
}

// =========================================================================
// Scheduler
// =========================================================================

#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    pub rate_limit_cleanup_interval: Duration,
    /// Absence marking is idempotent, so hourly is enough to catch the day change
    pub absence_check_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            rate_limit_cleanup_interval: Duration::from_secs(60),
            absence_check_interval: Duration::from_secs(3600),
        }
    }
}

/// Runs both sweeps on their own intervals until aborted
pub struct JobScheduler {
    pool: PgPool,
    settings: SettlementSettings,
    clock: Arc<dyn Clock>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(pool: PgPool, settings: SettlementSettings) -> Self {
        Self {
            pool,
            settings,
            clock: Arc::new(SystemClock),
            config: JobSchedulerConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Spawn the sweep loop; abort the handle on shutdown
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        tracing::info!(
            rate_limit_every = ?self.config.rate_limit_cleanup_interval,
            absence_every = ?self.config.absence_check_interval,
            "Maintenance scheduler started"
        );

        let mut windows_tick = interval(self.config.rate_limit_cleanup_interval);
        let mut absence_tick = interval(self.config.absence_check_interval);

        loop {
            tokio::select! {
                _ = windows_tick.tick() => {
                    if let Err(e) = cleanup_rate_limit_buckets(&self.pool).await {
                        tracing::error!(error = %e, "Rate-limit window purge failed");
                    }
                }
                _ = absence_tick.tick() => {
                    let day = self.absence_day();
                    if let Err(e) = mark_absent(&self.pool, day).await {
                        tracing::error!(error = %e, %day, "Absence marking failed");
                    }
                }
            }
        }
    }

    /// Both sweeps once, collecting failures instead of stopping at the first
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            absence_day: Some(self.absence_day()),
            ..MaintenanceReport::default()
        };

        match cleanup_rate_limit_buckets(&self.pool).await {
            Ok(count) => report.rate_limit_buckets_cleaned = count,
            Err(e) => report.errors.push(format!("rate-limit purge: {e}")),
        }

        if let Some(day) = report.absence_day {
            match mark_absent(&self.pool, day).await {
                Ok(count) => report.absences_marked = count,
                Err(e) => report.errors.push(format!("absence marking for {day}: {e}")),
            }
        }

        report.completed_at = self.clock.now();
        report
    }

    fn absence_day(&self) -> NaiveDate {
        previous_business_day(&self.settings, self.clock.now())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub rate_limit_buckets_cleaned: u64,
    /// Business day the absence sweep covered
    pub absence_day: Option<NaiveDate>,
    pub absences_marked: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("maintenance query failed: {0}")]
    Storage(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_previous_business_day_uses_local_date() {
        let settings = SettlementSettings::default();

        // 2026-03-02 18:00 UTC is already 2026-03-03 01:00 WIB
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();
        assert_eq!(
            previous_business_day(&settings, now),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );

        let morning = Utc.with_ymd_and_hms(2026, 3, 2, 3, 0, 0).unwrap();
        assert_eq!(
            previous_business_day(&settings, morning),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_default_intervals() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.rate_limit_cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.absence_check_interval, Duration::from_secs(3600));
    }
}
