use thiserror::Error;
use time::format_description::{well_known::Rfc3339, FormatItem};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub mod expense;
pub mod task;

pub use expense::{Expense, ExpenseInput, ExpensePatch};
pub use task::{normalize_tags, Priority, Task, TaskInput, TaskPatch, DEFAULT_PROJECT};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Rejected input. State is left untouched whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("amount {0:?} is not a number")]
    InvalidAmount(String),
    #[error("amount cannot be negative")]
    NegativeAmount,
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parses a calendar date. Full RFC 3339 instants are accepted and truncated to their date.
pub fn parse_date(input: &str) -> Option<Date> {
    let trimmed = input.trim();
    if let Ok(date) = Date::parse(trimmed, DATE_FORMAT) {
        return Some(date);
    }
    OffsetDateTime::parse(trimmed, &Rfc3339)
        .ok()
        .map(|dt| dt.date())
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Empty input means "no date"; anything else must parse.
pub fn parse_optional_date(input: &str) -> Result<Option<Date>, ValidationError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    parse_date(input)
        .map(Some)
        .ok_or_else(|| ValidationError::InvalidDate(input.to_string()))
}

/// Serde adapter for `YYYY-MM-DD` dates.
pub(crate) mod calendar_date {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let text = date
            .format(super::DATE_FORMAT)
            .map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date {raw:?}")))
    }

    /// `null` and `""` both decode to `None`; `None` encodes as `null`.
    pub mod option {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(text) => crate::model::parse_date(text)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid date {text:?}"))),
            }
        }
    }
}
