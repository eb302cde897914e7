//! Minimal in-memory expense records for the downstream service.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use mynance_core::clock::unix_secs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub description: String,
    pub amount: f64,
    /// `YYYY-MM-DD`.
    pub due_date: String,
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    pub created_at: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewExpense {
    pub description: String,
    pub amount: f64,
    pub due_date: String,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub category_id: Option<i64>,
}

impl NewExpense {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.description.trim().is_empty() {
            return Err("description must not be empty");
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err("amount must be a non-negative number");
        }
        if !is_iso_date(&self.due_date) {
            return Err("dueDate must be formatted as YYYY-MM-DD");
        }
        Ok(())
    }
}

fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
}

#[derive(Debug)]
pub struct ExpenseStore {
    expenses: DashMap<i64, Expense>,
    next_id: AtomicI64,
}

impl Default for ExpenseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpenseStore {
    pub fn new() -> Self {
        Self {
            expenses: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn create(&self, user_id: i64, new: NewExpense) -> Expense {
        let expense = Expense {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id,
            description: new.description.trim().to_string(),
            amount: new.amount,
            due_date: new.due_date,
            paid: new.paid,
            category_id: new.category_id,
            created_at: unix_secs(),
        };
        self.expenses.insert(expense.id, expense.clone());
        expense
    }

    /// Every expense owned by `user_id`, oldest first.
    pub fn list(&self, user_id: i64) -> Vec<Expense> {
        let mut owned: Vec<Expense> = self
            .expenses
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        owned.sort_by_key(|e| e.id);
        owned
    }

    /// The expense, only if `user_id` owns it.
    pub fn get(&self, user_id: i64, id: i64) -> Option<Expense> {
        self.expenses
            .get(&id)
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coffee() -> NewExpense {
        NewExpense {
            description: "Coffee".to_string(),
            amount: 4.5,
            due_date: "2024-03-01".to_string(),
            paid: false,
            category_id: None,
        }
    }

    #[test]
    fn expenses_are_scoped_to_owner() {
        let store = ExpenseStore::new();
        let mine = store.create(1, coffee());
        store.create(2, coffee());

        assert_eq!(store.list(1), vec![mine.clone()]);
        assert_eq!(store.get(1, mine.id), Some(mine.clone()));
        assert_eq!(store.get(2, mine.id), None);
    }

    #[test]
    fn validation_rules() {
        assert!(coffee().validate().is_ok());
        assert!(NewExpense { description: "  ".into(), ..coffee() }.validate().is_err());
        assert!(NewExpense { amount: -1.0, ..coffee() }.validate().is_err());
        assert!(NewExpense { amount: f64::NAN, ..coffee() }.validate().is_err());
        assert!(NewExpense { due_date: "01/03/2024".into(), ..coffee() }.validate().is_err());
    }
}
