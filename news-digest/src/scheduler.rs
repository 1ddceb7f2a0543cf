use crate::config::ScheduleSettings;
use crate::types::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::future::Future;
use tracing::{info, warn};

/// Daily wall-clock trigger in an IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct DailySchedule {
    at: NaiveTime,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(at: NaiveTime, tz: Tz) -> Self {
        Self { at, tz }
    }

    pub fn from_settings(settings: &ScheduleSettings) -> Result<Self> {
        Ok(Self::new(settings.local_time()?, settings.tz()?))
    }

    /// First occurrence of the configured local time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();
        let mut date = today;
        loop {
            if let Some(candidate) = self.occurrence_on(date) {
                if candidate > now {
                    return candidate;
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => return now + Duration::days(1),
            };
        }
    }

    /// The configured time on `date`. A time skipped by a DST jump moves
    /// forward one hour; a repeated time resolves to its first instance.
    fn occurrence_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_time(self.at);
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| self.tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Run `job` at every occurrence until Ctrl-C. A job is awaited to
    /// completion before the next occurrence is computed.
    pub async fn run_forever<F, Fut>(&self, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            let now = Utc::now();
            let next = self.next_run_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(
                "Next digest run at {} ({})",
                next.with_timezone(&self.tz).format("%Y-%m-%d %H:%M %Z"),
                crate::utils::time::format_duration(next - now)
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, stopping scheduler");
                    return;
                }
            }

            tokio::select! {
                _ = job() => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted during a run, stopping scheduler");
                    return;
                }
            }
        }
    }
}
