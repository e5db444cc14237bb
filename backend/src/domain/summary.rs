//! Aggregation over month containers.
//!
//! Pure functions only; the ledger owns the state and calls in here. The
//! balance formula is income minus expenses; saved amounts are reported
//! alongside but never subtracted (a deliberate, long-standing fix).

use shared::{FoodAllowance, MonthData, MonthSummary, SavingsGoal, YearSummary};
use std::collections::BTreeMap;

/// Derive the summary for one month container.
pub fn summarize(data: &MonthData) -> MonthSummary {
    let total_income: f64 = data.incomes.iter().map(|income| income.amount).sum();
    let total_expenses: f64 = data.expenses.iter().map(|expense| expense.amount).sum();
    let total_saved: f64 = data
        .savings_goals
        .iter()
        .map(|goal| goal.saved_amount)
        .sum();

    MonthSummary {
        total_income,
        total_expenses,
        total_saved,
        balance: total_income - total_expenses,
    }
}

/// Partition expense amounts by category label.
///
/// Keys are compared exactly as stored; no normalization, so case or
/// diacritic variants form distinct groups.
pub fn expenses_by_category(data: &MonthData) -> BTreeMap<String, f64> {
    let mut groups = BTreeMap::new();
    for expense in &data.expenses {
        *groups
            .entry(expense.category.as_str().to_string())
            .or_insert(0.0) += expense.amount;
    }
    groups
}

/// Partition income amounts by person label. Same exact-match grouping as
/// [`expenses_by_category`].
pub fn incomes_by_person(data: &MonthData) -> BTreeMap<String, f64> {
    let mut groups = BTreeMap::new();
    for income in &data.incomes {
        *groups.entry(income.person.clone()).or_insert(0.0) += income.amount;
    }
    groups
}

/// Percentage of `total` consumed by `used`, rounded and clamped to
/// [0, 100]. A zero (or unusable) total reads as 0%.
///
/// Clamping is display-only: the underlying amounts are never adjusted, an
/// over-spent allowance keeps its real `used_amount`.
pub fn percent_used(used: f64, total: f64) -> f64 {
    if !(total > 0.0) {
        return 0.0;
    }
    let percent = (used / total * 100.0).round();
    if !percent.is_finite() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}

/// Display percentage for a food allowance.
pub fn allowance_percent_used(allowance: &FoodAllowance) -> f64 {
    percent_used(allowance.used_amount, allowance.total_amount)
}

/// What is left of an allowance, floored at zero for display.
pub fn allowance_remaining(allowance: &FoodAllowance) -> f64 {
    (allowance.total_amount - allowance.used_amount).max(0.0)
}

/// Display progress of a savings goal.
pub fn goal_progress(goal: &SavingsGoal) -> f64 {
    percent_used(goal.saved_amount, goal.target_amount)
}

/// Fold twelve monthly summaries into the annual view. The caller supplies
/// one summary per month (zero-valued for untouched months); averages are
/// always over twelve, not over populated months.
pub fn summarize_year(year: i32, months: Vec<MonthSummary>) -> YearSummary {
    debug_assert_eq!(months.len(), 12, "a year has twelve summaries");

    let mut totals = MonthSummary::default();
    for month in &months {
        totals.total_income += month.total_income;
        totals.total_expenses += month.total_expenses;
        totals.total_saved += month.total_saved;
        totals.balance += month.balance;
    }

    let average = MonthSummary {
        total_income: totals.total_income / 12.0,
        total_expenses: totals.total_expenses / 12.0,
        total_saved: totals.total_saved / 12.0,
        balance: totals.balance / 12.0,
    };

    YearSummary {
        year,
        months,
        totals,
        average,
    }
}
