use std::fmt;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Label of the full-resolution size variant.
pub const ORIGINAL_LABEL: &str = "Original";

/// Remote-side identity of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Half-open time range `[from, to)` bounding which remote items a pass considers.
///
/// Construction does not validate; `validate` is checked before any remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Window {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The UTC calendar day starting at `date`.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(start_of(date), start_of(next_day(date)))
    }

    /// Whole UTC days from `first` up to but excluding `end`.
    pub fn days(first: NaiveDate, end: NaiveDate) -> Self {
        Self::new(start_of(first), start_of(end))
    }

    pub fn validate(&self) -> Result<(), WindowError> {
        if self.from > self.to {
            return Err(WindowError::Inverted {
                from: self.from,
                to: self.to,
            });
        }
        if self.from == self.to {
            return Err(WindowError::Empty { at: self.from });
        }
        Ok(())
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant < self.to
    }

    /// Splits the window at UTC midnights. Returns nothing for an invalid window.
    pub fn split_days(&self) -> Vec<Window> {
        let mut slices = Vec::new();
        let mut start = self.from;
        while start < self.to {
            let end = start_of(next_day(start.date_naive())).min(self.to);
            if end <= start {
                break;
            }
            slices.push(Window::new(start, end));
            start = end;
        }
        slices
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from.to_rfc3339(), self.to.to_rfc3339())
    }
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("window start {from} is after its end {to}")]
    Inverted {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    #[error("window starting and ending at {at} is empty")]
    Empty { at: DateTime<Utc> },
}

/// Failure talking to the remote service, shared by paging and metadata lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("http status {status}")]
    HttpStatus { status: u16 },
    #[error("remote api error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("could not decode {method} response: {message}")]
    Decode { method: String, message: String },
}

/// Metadata of one remote item, fetched lazily and written next to the transferred bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub taken: NaiveDateTime,
    /// Titles of the collections (sets) the item belongs to.
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<SizeVariant>,
}

impl ItemMeta {
    pub fn variant(&self, label: &str) -> Option<&SizeVariant> {
        self.sizes.iter().find(|size| size.label == label)
    }

    pub fn original(&self) -> Option<&SizeVariant> {
        self.variant(ORIGINAL_LABEL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeVariant {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_window_is_half_open() {
        let window = Window::day(date(2016, 3, 1));
        assert!(window.validate().is_ok());
        assert!(window.contains(window.from));
        assert!(!window.contains(window.to));
        assert_eq!(window.to, Window::day(date(2016, 3, 2)).from);
    }

    #[test]
    fn inverted_and_empty_windows_are_rejected() {
        let day = Window::day(date(2016, 3, 1));
        let inverted = Window::new(day.to, day.from);
        assert!(matches!(
            inverted.validate(),
            Err(WindowError::Inverted { .. })
        ));
        let empty = Window::new(day.from, day.from);
        assert_eq!(empty.validate(), Err(WindowError::Empty { at: day.from }));
    }

    #[test]
    fn split_days_cuts_at_midnight() {
        let from = date(2016, 3, 1).and_hms_opt(18, 0, 0).unwrap().and_utc();
        let to = date(2016, 3, 3).and_hms_opt(6, 0, 0).unwrap().and_utc();
        let slices = Window::new(from, to).split_days();

        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].from, from);
        assert_eq!(slices[0].to, Window::day(date(2016, 3, 2)).from);
        assert_eq!(slices[1], Window::day(date(2016, 3, 2)));
        assert_eq!(slices[2].to, to);
        assert!(Window::new(to, from).split_days().is_empty());
    }
}
