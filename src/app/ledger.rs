use std::sync::Arc;

use time::OffsetDateTime;

use crate::model::{Expense, ExpenseInput, ExpensePatch, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseSnapshot {
    pub expenses: Vec<Expense>,
    pub revision: u64,
}

/// Canonical owner of the expense collection. Categories are fixed at construction.
#[derive(Debug, Clone)]
pub struct ExpenseLedger {
    snapshot: Arc<ExpenseSnapshot>,
    categories: Arc<[String]>,
}

impl ExpenseLedger {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            snapshot: Arc::new(ExpenseSnapshot {
                expenses: Vec::new(),
                revision: 0,
            }),
            categories: categories.into(),
        }
    }

    pub fn snapshot(&self) -> Arc<ExpenseSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.snapshot.expenses
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn revision(&self) -> u64 {
        self.snapshot.revision
    }

    pub fn get(&self, id: &str) -> Option<&Expense> {
        self.snapshot.expenses.iter().find(|expense| expense.id == id)
    }

    pub fn add(&mut self, input: ExpenseInput) -> Result<String, ValidationError> {
        self.add_at(input, OffsetDateTime::now_utc())
    }

    pub(crate) fn add_at(
        &mut self,
        input: ExpenseInput,
        now: OffsetDateTime,
    ) -> Result<String, ValidationError> {
        let expense = Expense::from_input(input, &self.categories, now)?;
        let id = expense.id.clone();
        self.commit().expenses.push(expense);
        Ok(id)
    }

    /// Returns `false` when no expense has `id`; a rejected patch changes nothing.
    pub fn update(&mut self, id: &str, patch: ExpensePatch) -> Result<bool, ValidationError> {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        let mut updated = self.snapshot.expenses[index].clone();
        updated.apply(patch, &self.categories)?;
        self.commit().expenses[index] = updated;
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        self.commit().expenses.remove(index);
        true
    }

    pub fn replace_all(&mut self, expenses: Vec<Expense>) {
        self.commit().expenses = expenses;
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.snapshot
            .expenses
            .iter()
            .position(|expense| expense.id == id)
    }

    fn commit(&mut self) -> &mut ExpenseSnapshot {
        let snapshot = Arc::make_mut(&mut self.snapshot);
        snapshot.revision += 1;
        snapshot
    }
}
