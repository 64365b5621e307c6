use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::Date;

use super::{restriction, DateRange};
use crate::model::{calendar_date, Expense};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExpenseSort {
    #[default]
    Date,
    Amount,
    Title,
    Category,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Names accepted by the `setFilter(key, value)` intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum ExpenseFilterKey {
    Category,
    DateFrom,
    DateTo,
    Search,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseFilters {
    pub category: String,
    #[serde(with = "calendar_date::option")]
    pub date_from: Option<Date>,
    #[serde(with = "calendar_date::option")]
    pub date_to: Option<Date>,
    pub search: String,
}

impl ExpenseFilters {
    pub fn date_range(&self) -> DateRange {
        DateRange {
            from: self.date_from,
            to: self.date_to,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseView {
    pub filters: ExpenseFilters,
    pub sort_by: ExpenseSort,
    pub sort_order: SortOrder,
}

/// Category, inclusive date range, then case-insensitive title search; stable sort in `sort_order`.
pub fn project_expenses<'a>(expenses: &'a [Expense], view: &ExpenseView) -> Vec<&'a Expense> {
    let filters = &view.filters;
    let category = restriction(&filters.category);
    let range = filters.date_range();
    let needle = filters.search.trim().to_lowercase();

    let mut visible = expenses
        .iter()
        .filter(|expense| category.map_or(true, |c| expense.category == c))
        .filter(|expense| range.contains(expense.date))
        .filter(|expense| needle.is_empty() || expense.title.to_lowercase().contains(&needle))
        .collect::<Vec<_>>();

    visible.sort_by(|a, b| {
        let ordering = compare_expenses(a, b, view.sort_by);
        match view.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    visible
}

fn compare_expenses(a: &Expense, b: &Expense, sort_by: ExpenseSort) -> Ordering {
    match sort_by {
        ExpenseSort::Date => a.date.cmp(&b.date),
        ExpenseSort::Amount => a.amount.total_cmp(&b.amount),
        ExpenseSort::Title => a.title.cmp(&b.title),
        ExpenseSort::Category => a.category.cmp(&b.category),
    }
}

pub fn total_amount<'a, I>(expenses: I) -> f64
where
    I: IntoIterator<Item = &'a Expense>,
{
    expenses.into_iter().map(|expense| expense.amount).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
    /// Share of the grand total in percent, rounded to one decimal place.
    pub percentage: f64,
}

/// Totals per category in first-seen order. Categories without expenses are absent;
/// a zero grand total yields 0% shares.
pub fn category_breakdown<'a, I>(expenses: I) -> Vec<CategoryShare>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut totals: IndexMap<&str, f64> = IndexMap::new();
    for expense in expenses {
        *totals.entry(expense.category.as_str()).or_insert(0.0) += expense.amount;
    }
    let grand_total: f64 = totals.values().sum();
    totals
        .into_iter()
        .map(|(category, amount)| CategoryShare {
            category: category.to_string(),
            amount,
            percentage: percentage_of(amount, grand_total),
        })
        .collect()
}

fn percentage_of(amount: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    (amount / total * 1000.0).round() / 10.0
}
