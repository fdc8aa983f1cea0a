//! Window selection for the `run` and `watch` commands.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use flickrdown_core::BeginEvent;
use flickrdown_engine::{PassError, PassResult, Window, WindowError, WindowPlanner};
use flickrdown_logging::{flickrdown_debug, flickrdown_info, flickrdown_warn};

use crate::watermark::WatermarkStore;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Window for a one-shot run.
///
/// An explicit start date wins over the watermark. The end defaults to one
/// day after the start.
pub fn one_shot_window(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    watermark: Option<DateTime<Utc>>,
    earliest_start: NaiveDate,
) -> Result<Window> {
    let from = match (start_date, watermark) {
        (Some(date), _) => first_instant(date, earliest_start)?,
        (None, Some(watermark)) => watermark,
        (None, None) => bail!("no --start-date given and no watermark has been saved"),
    };
    let to = match end_date {
        Some(date) => midnight(date),
        None => from
            .checked_add_days(Days::new(1))
            .context("start date is out of range")?,
    };

    let window = Window::new(from, to);
    window.validate()?;
    Ok(window)
}

/// Start of the first watch pass: the watermark if one exists, else `start_date`.
pub fn watch_start(
    start_date: Option<NaiveDate>,
    watermark: Option<DateTime<Utc>>,
    earliest_start: NaiveDate,
) -> Result<DateTime<Utc>> {
    match (watermark, start_date) {
        (Some(watermark), Some(date)) => {
            flickrdown_info!(
                "Resuming from watermark {}, ignoring --start-date {}",
                watermark.to_rfc3339(),
                date
            );
            Ok(watermark)
        }
        (Some(watermark), None) => Ok(watermark),
        (None, Some(date)) => first_instant(date, earliest_start),
        (None, None) => bail!("no watermark has been saved; pass --start-date for the first run"),
    }
}

fn first_instant(date: NaiveDate, earliest_start: NaiveDate) -> Result<DateTime<Utc>> {
    if date < earliest_start {
        bail!("start date {date} is before the earliest allowed start {earliest_start}");
    }
    Ok(midnight(date))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Plans every watch pass as `[watermark, now)`.
///
/// The watermark only moves, in memory and on disk, after a pass without
/// failures, so a failed window is retried in full by the next pass.
pub struct WatermarkPlanner {
    store: WatermarkStore,
    from: DateTime<Utc>,
    clock: Clock,
}

impl WatermarkPlanner {
    pub fn new(store: WatermarkStore, from: DateTime<Utc>) -> Self {
        Self::with_clock(store, from, Arc::new(Utc::now))
    }

    pub fn with_clock(store: WatermarkStore, from: DateTime<Utc>, clock: Clock) -> Self {
        Self { store, from, clock }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.from
    }
}

impl WindowPlanner for WatermarkPlanner {
    fn plan(&mut self, begin: BeginEvent) -> Result<Window, WindowError> {
        let window = Window::new(self.from, (self.clock)());
        flickrdown_debug!(
            "Planned {} window {}",
            if begin.is_deferred() { "deferred" } else { "immediate" },
            window
        );
        window.validate()?;
        Ok(window)
    }

    fn settled(&mut self, window: &Window, outcome: &Result<PassResult, PassError>) {
        match outcome {
            Ok(result) if result.is_success() => {
                self.from = window.to;
                self.store.save(window.to);
                flickrdown_info!("Watermark advanced to {}", window.to.to_rfc3339());
            }
            _ => flickrdown_warn!(
                "Keeping watermark at {}, window will be retried",
                self.from.to_rfc3339()
            ),
        }
    }
}
