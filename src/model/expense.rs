use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use time::{Date, OffsetDateTime};

use super::{calendar_date, new_id, ValidationError};

/// A single spending record. `amount` is stored as text and read back from text or number.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub title: String,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub amount: f64,
    pub category: String,
    #[serde(with = "calendar_date")]
    pub date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Expense {
    pub(crate) fn from_input(
        input: ExpenseInput,
        categories: &[String],
        now: OffsetDateTime,
    ) -> Result<Self, ValidationError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        let amount = parse_amount(&input.amount)?;
        let category = check_category(&input.category, categories)?;
        Ok(Self {
            id: new_id(),
            title: title.to_string(),
            amount,
            category,
            date: input.date.unwrap_or_else(|| now.date()),
            created_at: now,
        })
    }

    pub(crate) fn apply(
        &mut self,
        patch: ExpensePatch,
        categories: &[String],
    ) -> Result<(), ValidationError> {
        // Whole patch is validated before any field changes.
        let title = match patch.title.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::MissingField("title")),
            other => other.map(str::to_string),
        };
        let amount = patch.amount.as_deref().map(parse_amount).transpose()?;
        let category = patch
            .category
            .as_deref()
            .map(|c| check_category(c, categories))
            .transpose()?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(amount) = amount {
            self.amount = amount;
        }
        if let Some(category) = category {
            self.category = category;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseInput {
    pub title: String,
    /// Raw text as typed by the user, e.g. `"12.50"`.
    pub amount: String,
    pub category: String,
    /// Defaults to today when absent.
    pub date: Option<Date>,
}

impl ExpenseInput {
    pub fn new(
        title: impl Into<String>,
        amount: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            amount: amount.into(),
            category: category.into(),
            date: None,
        }
    }

    pub fn on(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpensePatch {
    pub title: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    pub date: Option<Date>,
}

pub fn parse_amount(raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("amount"));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidAmount(raw.to_string()))?;
    if !value.is_finite() {
        return Err(ValidationError::InvalidAmount(raw.to_string()));
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeAmount);
    }
    Ok(value)
}

fn check_category(raw: &str, categories: &[String]) -> Result<String, ValidationError> {
    let category = raw.trim();
    if category.is_empty() {
        return Err(ValidationError::MissingField("category"));
    }
    if !categories.iter().any(|known| known == category) {
        return Err(ValidationError::UnknownCategory(category.to_string()));
    }
    Ok(category.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::{date, datetime};

    fn categories() -> Vec<String> {
        vec!["Food".into(), "Bills".into()]
    }

    #[test]
    fn amount_must_be_a_non_negative_number() {
        assert_eq!(parse_amount(" 12.50 "), Ok(12.5));
        assert_eq!(parse_amount("0"), Ok(0.0));
        assert_eq!(parse_amount(""), Err(ValidationError::MissingField("amount")));
        assert_eq!(parse_amount("-3"), Err(ValidationError::NegativeAmount));
        assert_matches!(parse_amount("ten"), Err(ValidationError::InvalidAmount(_)));
        assert_matches!(parse_amount("inf"), Err(ValidationError::InvalidAmount(_)));
    }

    #[test]
    fn input_requires_known_category() {
        let now = datetime!(2024-02-10 12:00 UTC);
        let err = Expense::from_input(ExpenseInput::new("Taxi", "9", "Travel"), &categories(), now)
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownCategory("Travel".into()));

        let expense =
            Expense::from_input(ExpenseInput::new("Lunch", "9", "Food"), &categories(), now)
                .unwrap();
        assert_eq!(expense.date, date!(2024 - 02 - 10));
        assert_eq!(expense.created_at, now);
    }

    #[test]
    fn rejected_patch_leaves_expense_untouched() {
        let now = datetime!(2024-02-10 12:00 UTC);
        let mut expense =
            Expense::from_input(ExpenseInput::new("Lunch", "9", "Food"), &categories(), now)
                .unwrap();
        let before = expense.clone();
        let patch = ExpensePatch {
            title: Some("Dinner".into()),
            amount: Some("-1".into()),
            ..ExpensePatch::default()
        };
        assert_eq!(
            expense.apply(patch, &categories()),
            Err(ValidationError::NegativeAmount)
        );
        assert_eq!(expense, before);
    }

    #[test]
    fn amount_reads_text_or_number_and_writes_text() {
        let raw = r#"[
            {"id":"a","title":"Bus","amount":"2.5","category":"Food","date":"2024-01-01","createdAt":"2024-01-01T10:00:00.000Z"},
            {"id":"b","title":"Tram","amount":4,"category":"Food","date":"2024-01-02","createdAt":"2024-01-02T10:00:00Z"}
        ]"#;
        let expenses: Vec<Expense> = serde_json::from_str(raw).unwrap();
        assert_eq!(expenses[0].amount, 2.5);
        assert_eq!(expenses[1].amount, 4.0);

        let json = serde_json::to_value(&expenses[1]).unwrap();
        assert_eq!(json["amount"], "4");
        assert_eq!(json["date"], "2024-01-02");
    }
}
