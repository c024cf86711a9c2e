// src/window/mod.rs
use chrono::{Datelike, Days, NaiveDate};
use std::fmt;
use url::Url;

/// One Sunday..Saturday span, the period a single bulletin covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// The window containing `date`, or `None` when that week runs past
    /// either end of the representable calendar.
    pub fn containing(date: NaiveDate) -> Option<Self> {
        let back = date.weekday().num_days_from_sunday() as u64;
        date.checked_sub_days(Days::new(back))
            .and_then(Self::starting)
    }

    fn starting(start: NaiveDate) -> Option<Self> {
        let end = start.checked_add_days(Days::new(6))?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn id(&self) -> BulletinId {
        BulletinId {
            start_code: self.start.format("%y%m%d").to_string(),
            end_code: self.end.format("%y%m%d").to_string(),
        }
    }
}

/// `YYMMDD` codes for both ends of a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BulletinId {
    pub start_code: String,
    pub end_code: String,
}

impl BulletinId {
    /// `"{start}-{end}.csv"`; also the archive idempotency key.
    pub fn filename(&self) -> String {
        format!("{}-{}.csv", self.start_code, self.end_code)
    }

    /// Retrieval location under the portal's csv directory.
    pub fn url(&self, csv_base: &Url) -> Result<Url, url::ParseError> {
        let mut base = csv_base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(&self.filename())
    }
}

impl fmt::Display for BulletinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_code, self.end_code)
    }
}

/// Lazy ascending sequence of weekly windows, see [`enumerate_weeks`].
#[derive(Debug, Clone)]
pub struct Weeks {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for Weeks {
    type Item = DateWindow;

    fn next(&mut self) -> Option<DateWindow> {
        let start = self.next.filter(|s| *s <= self.end)?;
        let window = DateWindow::starting(start);
        self.next = window.and_then(|_| start.checked_add_days(Days::new(7)));
        window
    }
}

/// Every weekly window from the one containing `start` up to and including
/// the one containing `end`. Windows are never truncated at `end`.
pub fn enumerate_weeks(start: NaiveDate, end: NaiveDate) -> Weeks {
    let next = if start <= end {
        DateWindow::containing(start).map(|w| w.start)
    } else {
        None
    };
    Weeks { next, end }
}
