use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month};

/// The only date shape users may type: `dd-mm-yyyy`.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[day]-[month]-[year]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarDate {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u8,
    #[serde(rename = "Day")]
    pub day: u8,
}

impl CalendarDate {
    pub fn new(year: i32, month: u8, day: u8) -> Result<Self, AppError> {
        let month = Month::try_from(month).map_err(|err| AppError::date_parse(err.to_string()))?;
        let date = Date::from_calendar_date(year, month, day)
            .map_err(|err| AppError::date_parse(err.to_string()))?;
        Ok(Self::from(date))
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let date = Date::parse(trimmed, DATE_FORMAT)
            .map_err(|err| AppError::date_parse(format!("{trimmed:?}: {err}")))?;
        Ok(Self::from(date))
    }
}

impl From<Date> for CalendarDate {
    fn from(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
            day: date.day(),
        }
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}-{:04}", self.day, self.month, self.year)
    }
}
