//! # Sync Scheduler
//!
//! Fires a zero-argument sync trigger on a calendar schedule.
//!
//! The loop waits for whichever comes first: the next scheduled instant, a
//! manual trigger from a [`SchedulerHandle`], or cancellation. A running sync
//! is awaited to completion; `clear()` only prevents later invocations.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use core_runtime::config::ScheduleSettings;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// How often a scheduled sync runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncInterval {
    SixHours,
    Daily,
    Weekly,
    /// Weekly, restricted to even ISO weeks
    Fortnightly,
    Monthly,
    /// For testing a deployment
    EveryMinute,
}

impl SyncInterval {
    /// Parse `6h`, `1d`, `1w`, `2w`, `1m` or `1min`; anything else is six-hourly.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "6h" => Self::SixHours,
            "1d" => Self::Daily,
            "1w" => Self::Weekly,
            "2w" => Self::Fortnightly,
            "1m" => Self::Monthly,
            "1min" => Self::EveryMinute,
            other => {
                warn!("Unknown sync interval '{}', using 6h", other);
                Self::SixHours
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SixHours => "6h",
            Self::Daily => "1d",
            Self::Weekly => "1w",
            Self::Fortnightly => "2w",
            Self::Monthly => "1m",
            Self::EveryMinute => "1min",
        }
    }
}

impl fmt::Display for SyncInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub interval: SyncInterval,
    /// Time of day for daily and longer intervals
    pub at: NaiveTime,
    /// Weekday for weekly and fortnightly intervals
    pub day: Weekday,
    /// 1..=28
    pub day_of_month: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: SyncInterval::SixHours,
            at: NaiveTime::default(),
            day: Weekday::Mon,
            day_of_month: 1,
        }
    }
}

impl Schedule {
    pub fn new(interval: SyncInterval) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn at(mut self, at: NaiveTime) -> Self {
        self.at = at;
        self
    }

    pub fn on(mut self, day: Weekday) -> Self {
        self.day = day;
        self
    }

    pub fn on_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = day.clamp(1, 28);
        self
    }

    /// Interpret raw settings; malformed values fall back to defaults.
    pub fn from_settings(settings: &ScheduleSettings) -> Self {
        let at = NaiveTime::parse_from_str(settings.time.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("Invalid sync time '{}', using 00:00", settings.time);
            NaiveTime::default()
        });
        let day = settings.day.trim().parse::<Weekday>().unwrap_or_else(|_| {
            warn!("Invalid sync day '{}', using Monday", settings.day);
            Weekday::Mon
        });

        Self::new(SyncInterval::parse(&settings.interval))
            .at(at)
            .on(day)
            .on_day_of_month(settings.day_of_month)
    }

    /// First scheduled instant strictly after `now`, in local wall-clock time.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        match self.interval {
            SyncInterval::SixHours => {
                let hour_start = today.and_time(NaiveTime::default())
                    + ChronoDuration::hours(i64::from(now.hour()));
                hour_start + ChronoDuration::hours(i64::from(6 - now.hour() % 6))
            }
            SyncInterval::Daily => {
                let candidate = today.and_time(self.at);
                if candidate <= now {
                    candidate + ChronoDuration::days(1)
                } else {
                    candidate
                }
            }
            SyncInterval::Weekly => self.next_weekday(now),
            SyncInterval::Fortnightly => {
                let mut candidate = self.next_weekday(now);
                while candidate.iso_week().week() % 2 == 1 {
                    candidate += ChronoDuration::weeks(1);
                }
                candidate
            }
            SyncInterval::Monthly => {
                let this_month = month_day(today.year(), today.month(), self.day_of_month);
                match this_month.map(|date| date.and_time(self.at)) {
                    Some(candidate) if candidate > now => candidate,
                    _ => {
                        let (year, month) = if today.month() == 12 {
                            (today.year() + 1, 1)
                        } else {
                            (today.year(), today.month() + 1)
                        };
                        month_day(year, month, self.day_of_month)
                            .map(|date| date.and_time(self.at))
                            .unwrap_or(now + ChronoDuration::days(30))
                    }
                }
            }
            SyncInterval::EveryMinute => {
                let minute_start = today.and_time(NaiveTime::default())
                    + ChronoDuration::minutes(i64::from(now.hour() * 60 + now.minute()));
                minute_start + ChronoDuration::minutes(1)
            }
        }
    }

    /// Next scheduled instant after `now` in `now`'s time zone.
    pub fn next_occurrence<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let naive = self.next_after(now.naive_local());
        let tz = now.timezone();
        tz.from_local_datetime(&naive)
            .earliest()
            // inside a DST gap
            .or_else(|| tz.from_local_datetime(&(naive + ChronoDuration::hours(1))).earliest())
            .unwrap_or_else(|| now.clone() + ChronoDuration::hours(1))
    }

    fn next_weekday(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        let days_ahead = (7 + self.day.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            % 7;
        let candidate = (today + ChronoDuration::days(days_ahead)).and_time(self.at);
        if candidate <= now {
            candidate + ChronoDuration::weeks(1)
        } else {
            candidate
        }
    }
}

fn month_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// The work a scheduler invokes.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run_scheduled(&self);
}

#[derive(Debug)]
enum SchedulerCommand {
    RunNow,
}

/// Control side of a running [`SyncScheduler`].
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    shutdown: CancellationToken,
}

impl SchedulerHandle {
    /// Request an immediate run.
    pub async fn trigger(&self) -> Result<()> {
        self.commands
            .send(SchedulerCommand::RunNow)
            .await
            .map_err(|_| SyncError::Scheduler("scheduler is not running".to_string()))
    }

    /// Stop all future invocations. A run in progress completes.
    pub fn clear(&self) {
        self.shutdown.cancel();
    }

    pub fn is_cleared(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

pub struct SyncScheduler {
    schedule: Schedule,
    task: Arc<dyn ScheduledTask>,
    commands: mpsc::Receiver<SchedulerCommand>,
    shutdown: CancellationToken,
    run_on_start: bool,
}

impl SyncScheduler {
    /// Build a scheduler and its handle. Cancelling `shutdown` has the same
    /// effect as [`SchedulerHandle::clear`].
    pub fn new(
        schedule: Schedule,
        task: Arc<dyn ScheduledTask>,
        shutdown: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (sender, receiver) = mpsc::channel(8);
        let handle = SchedulerHandle {
            commands: sender,
            shutdown: shutdown.clone(),
        };
        let scheduler = Self {
            schedule,
            task,
            commands: receiver,
            shutdown,
            run_on_start: false,
        };
        (scheduler, handle)
    }

    /// Run once immediately when the loop starts.
    pub fn with_initial_run(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn next_run(&self) -> DateTime<Local> {
        self.schedule.next_occurrence(&Local::now())
    }

    /// Drive the schedule until cleared. Returns the number of runs.
    pub async fn run(mut self) -> usize {
        info!(interval = %self.schedule.interval, "Sync scheduler started");
        let mut runs = 0;

        if self.run_on_start && !self.shutdown.is_cancelled() {
            self.task.run_scheduled().await;
            runs += 1;
        }

        loop {
            let next = self.next_run();
            let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
            info!("Next sync scheduled for {}", next.format("%Y-%m-%d %H:%M"));
            debug!("Scheduler sleeping for {:?}", wait);

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Sync scheduler cleared");
                    break;
                }
                Some(command) = self.commands.recv() => {
                    debug!(?command, "Manual sync requested");
                }
                _ = tokio::time::sleep(wait) => {
                    debug!("Scheduled sync due");
                }
            }

            if self.shutdown.is_cancelled() {
                break;
            }
            self.task.run_scheduled().await;
            runs += 1;
        }

        info!(runs, "Sync scheduler stopped");
        runs
    }
}
