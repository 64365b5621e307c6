use std::sync::Arc;

use anyhow::Result;

use super::actions::{ExpenseIntent, Outcome};
use super::ledger::{ExpenseLedger, ExpenseSnapshot};
use crate::config::AppConfig;
use crate::model::{parse_optional_date, Expense, ValidationError};
use crate::search::{self, CategoryShare, ExpenseFilterKey, ExpenseFilters, ExpenseView};
use crate::storage::KeyValueStore;
use crate::sync::{DarkModeV1, ExpenseViewV1, ExpensesV1, PersistenceSync, Slices};

/// Expense domain: ledger, filters and the theme flag behind one dispatcher.
pub struct ExpenseTracker {
    config: Arc<AppConfig>,
    ledger: ExpenseLedger,
    view: ExpenseView,
    dark_mode: bool,
    sync: PersistenceSync,
}

impl ExpenseTracker {
    pub fn open(store: Arc<dyn KeyValueStore>, config: Arc<AppConfig>) -> Result<Self> {
        let sync = PersistenceSync::new(store, &config.persistence)?;
        Ok(Self::hydrate(sync, config))
    }

    pub fn hydrate(sync: PersistenceSync, config: Arc<AppConfig>) -> Self {
        let mut ledger = ExpenseLedger::new(config.expenses.categories.clone());
        ledger.replace_all(sync.load_or::<ExpensesV1, _>(Vec::new));
        let dark_mode = sync.load_or::<DarkModeV1, _>(|| false);
        let view = sync.load_or::<ExpenseViewV1, _>(|| ExpenseView {
            filters: ExpenseFilters::default(),
            sort_by: config.expenses.default_sort,
            sort_order: config.expenses.default_order,
        });
        tracing::info!(
            expenses = ledger.expenses().len(),
            background = sync.is_background(),
            "expense tracker hydrated"
        );
        Self {
            config,
            ledger,
            view,
            dark_mode,
            sync,
        }
    }

    pub fn dispatch(&mut self, intent: ExpenseIntent) -> Result<Outcome, ValidationError> {
        let touched = intent.touches();
        let label = format!("{intent:?}");
        let outcome = self.apply(intent)?;
        if outcome.changed() {
            self.persist(touched);
        } else {
            tracing::debug!(intent = %label, "intent ignored");
        }
        Ok(outcome)
    }

    fn apply(&mut self, intent: ExpenseIntent) -> Result<Outcome, ValidationError> {
        let outcome = match intent {
            ExpenseIntent::AddExpense(input) => Outcome::Created(self.ledger.add(input)?),
            ExpenseIntent::UpdateExpense { id, patch } => {
                Outcome::from_hit(self.ledger.update(&id, patch)?)
            }
            ExpenseIntent::DeleteExpense(id) => Outcome::from_hit(self.ledger.remove(&id)),
            ExpenseIntent::SetFilter { key, value } => {
                self.set_filter(key, &value)?;
                Outcome::Applied
            }
            ExpenseIntent::ClearFilters => {
                self.view.filters = ExpenseFilters::default();
                Outcome::Applied
            }
            ExpenseIntent::SetSort {
                sort_by,
                sort_order,
            } => {
                self.view.sort_by = sort_by;
                self.view.sort_order = sort_order;
                Outcome::Applied
            }
            ExpenseIntent::ToggleDarkMode => {
                self.dark_mode = !self.dark_mode;
                Outcome::Applied
            }
        };
        Ok(outcome)
    }

    fn set_filter(&mut self, key: ExpenseFilterKey, value: &str) -> Result<(), ValidationError> {
        let filters = &mut self.view.filters;
        match key {
            ExpenseFilterKey::Category => filters.category = value.trim().to_string(),
            ExpenseFilterKey::DateFrom => filters.date_from = parse_optional_date(value)?,
            ExpenseFilterKey::DateTo => filters.date_to = parse_optional_date(value)?,
            ExpenseFilterKey::Search => filters.search = value.to_string(),
        }
        Ok(())
    }

    fn persist(&self, slices: Slices) {
        if slices.contains(Slices::EXPENSES) {
            self.sync.write::<ExpensesV1>(&self.ledger.snapshot().expenses);
        }
        if slices.contains(Slices::EXPENSE_VIEW) {
            self.sync.write::<ExpenseViewV1>(&self.view);
        }
        if slices.contains(Slices::DARK_MODE) {
            self.sync.write::<DarkModeV1>(&self.dark_mode);
        }
    }

    pub fn snapshot(&self) -> Arc<ExpenseSnapshot> {
        self.ledger.snapshot()
    }

    pub fn ledger(&self) -> &ExpenseLedger {
        &self.ledger
    }

    pub fn view(&self) -> &ExpenseView {
        &self.view
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn categories(&self) -> &[String] {
        self.ledger.categories()
    }

    pub fn visible_expenses(&self) -> Vec<&Expense> {
        search::project_expenses(self.ledger.expenses(), &self.view)
    }

    /// Sum over the current projection.
    pub fn visible_total(&self) -> f64 {
        search::total_amount(self.visible_expenses())
    }

    /// Sum over every recorded expense, whatever the filters say.
    pub fn grand_total(&self) -> f64 {
        search::total_amount(self.ledger.expenses())
    }

    /// Category shares of the grand total, in insertion order. Filters do not apply.
    pub fn breakdown(&self) -> Vec<CategoryShare> {
        search::category_breakdown(self.ledger.expenses())
    }

    pub fn flush(&self) {
        self.sync.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExpenseInput, ExpensePatch};
    use crate::search::{ExpenseSort, SortOrder};
    use crate::storage::MemoryStore;
    use assert_matches::assert_matches;
    use time::macros::date;

    fn tracker(store: Arc<dyn KeyValueStore>) -> ExpenseTracker {
        ExpenseTracker::open(store, Arc::new(AppConfig::default())).expect("open tracker")
    }

    fn add(tracker: &mut ExpenseTracker, input: ExpenseInput) -> String {
        match tracker.dispatch(ExpenseIntent::AddExpense(input)) {
            Ok(Outcome::Created(id)) => id,
            other => panic!("expected created expense, got {other:?}"),
        }
    }

    fn seed(tracker: &mut ExpenseTracker) {
        add(tracker, ExpenseInput::new("Groceries", "10", "Food").on(date!(2024 - 03 - 01)));
        add(tracker, ExpenseInput::new("Dinner out", "30", "Food").on(date!(2024 - 03 - 05)));
        add(
            tracker,
            ExpenseInput::new("Train pass", "60", "Transportation").on(date!(2024 - 03 - 10)),
        );
    }

    #[test]
    fn breakdown_reflects_category_shares() {
        let mut tracker = tracker(Arc::new(MemoryStore::new()));
        seed(&mut tracker);
        let shares: Vec<_> = tracker
            .breakdown()
            .into_iter()
            .map(|share| (share.category, share.amount, share.percentage))
            .collect();
        assert_eq!(
            shares,
            vec![
                ("Food".to_string(), 40.0, 40.0),
                ("Transportation".to_string(), 60.0, 60.0),
            ]
        );
        assert_eq!(tracker.visible_total(), 100.0);
        assert_eq!(tracker.grand_total(), 100.0);
    }

    #[test]
    fn breakdown_ignores_active_filters() -> anyhow::Result<()> {
        let mut tracker = tracker(Arc::new(MemoryStore::new()));
        seed(&mut tracker);
        tracker.dispatch(ExpenseIntent::SetFilter {
            key: ExpenseFilterKey::Category,
            value: "Food".into(),
        })?;
        assert_eq!(tracker.visible_total(), 40.0);
        assert_eq!(tracker.grand_total(), 100.0);
        let shares: Vec<_> = tracker
            .breakdown()
            .into_iter()
            .map(|share| (share.category, share.percentage))
            .collect();
        assert_eq!(
            shares,
            vec![
                ("Food".to_string(), 40.0),
                ("Transportation".to_string(), 60.0),
            ]
        );
        Ok(())
    }

    #[test]
    fn filters_narrow_the_projection_and_clear_resets_them() -> anyhow::Result<()> {
        let mut tracker = tracker(Arc::new(MemoryStore::new()));
        seed(&mut tracker);
        tracker.dispatch(ExpenseIntent::SetFilter {
            key: ExpenseFilterKey::DateFrom,
            value: "2024-03-05".into(),
        })?;
        tracker.dispatch(ExpenseIntent::SetFilter {
            key: ExpenseFilterKey::Category,
            value: "Food".into(),
        })?;
        let titles: Vec<_> = tracker
            .visible_expenses()
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Dinner out"]);
        assert_eq!(tracker.visible_total(), 30.0);

        tracker.dispatch(ExpenseIntent::ClearFilters)?;
        assert!(tracker.view().filters.is_empty());
        assert_eq!(tracker.visible_expenses().len(), 3);
        Ok(())
    }

    #[test]
    fn bad_filter_date_is_rejected() {
        let mut tracker = tracker(Arc::new(MemoryStore::new()));
        assert_matches!(
            tracker.dispatch(ExpenseIntent::SetFilter {
                key: ExpenseFilterKey::DateTo,
                value: "soon".into(),
            }),
            Err(ValidationError::InvalidDate(_))
        );
        assert_eq!(tracker.view().filters.date_to, None);
    }

    #[test]
    fn sort_honours_order_for_amounts() -> anyhow::Result<()> {
        let mut tracker = tracker(Arc::new(MemoryStore::new()));
        seed(&mut tracker);
        add(&mut tracker, ExpenseInput::new("Coffee", "9", "Food"));
        tracker.dispatch(ExpenseIntent::SetSort {
            sort_by: ExpenseSort::Amount,
            sort_order: SortOrder::Asc,
        })?;
        let amounts: Vec<_> = tracker.visible_expenses().iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![9.0, 10.0, 30.0, 60.0]);
        Ok(())
    }

    #[test]
    fn state_survives_a_reopen() -> anyhow::Result<()> {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut first = tracker(store.clone());
        seed(&mut first);
        let id = first.ledger().expenses()[0].id.clone();
        first.dispatch(ExpenseIntent::UpdateExpense {
            id,
            patch: ExpensePatch {
                amount: Some("12.5".into()),
                ..ExpensePatch::default()
            },
        })?;
        first.dispatch(ExpenseIntent::ToggleDarkMode)?;
        first.dispatch(ExpenseIntent::SetFilter {
            key: ExpenseFilterKey::Search,
            value: "train".into(),
        })?;

        let second = tracker(store.clone());
        assert_eq!(second.ledger().expenses(), first.ledger().expenses());
        assert!(second.dark_mode());
        assert_eq!(second.view(), first.view());
        assert_eq!(store.get("darkMode")?.as_deref(), Some("true"));
        Ok(())
    }

    #[test]
    fn deleting_unknown_expense_is_ignored() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = tracker(store.clone());
        assert_eq!(
            tracker.dispatch(ExpenseIntent::DeleteExpense("missing".into()))?,
            Outcome::Ignored
        );
        assert_eq!(store.get("expenses")?, None);
        Ok(())
    }
}
