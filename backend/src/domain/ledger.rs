//! The month-indexed ledger.
//!
//! Owns the in-process set of month containers for the active family and
//! exposes entity-scoped CRUD plus aggregation. Mutations are remote-first:
//! the movement store write happens before any local change, so a rejected
//! write leaves the in-memory state exactly as it was.
//!
//! One behavior here is deliberately non-obvious and load-bearing: adds
//! always land in the month the cursor points at, never in the month of the
//! entity's own date field. The date the user types into a form is stored on
//! the entity (and on the movement row), but the container it joins is the
//! one currently on screen.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{summary, ActivityService, LedgerError};
use crate::storage::{MovementRecord, MovementStore, MovementUpdate, NewMovement, SnapshotStore};
use shared::{
    Apply, Expense, ExpenseCategory, FoodAllowance, IdentitySnapshot, Income, IncomeKind,
    MonthData, MonthKey, MonthSummary, MovementKind, NewExpense, NewFoodAllowance, NewIncome,
    NewSavingsGoal, PaymentStatus, SavingsGoal, YearSummary,
};

/// Everything behind the lock. `generation` bumps on every activation so
/// that a mutation still in flight when the family changes can tell its
/// local apply has gone stale and must be discarded.
struct LedgerState {
    months: BTreeMap<MonthKey, MonthData>,
    cursor: MonthKey,
    identity: IdentitySnapshot,
    generation: u64,
}

/// The ledger store. Cheap to clone; all clones share one state.
///
/// Collaborators are injected at construction: without a movement store ids
/// are minted locally and nothing leaves the process, without a snapshot
/// store nothing is cached, without an activity service nothing is audited.
#[derive(Clone)]
pub struct LedgerService {
    state: Arc<Mutex<LedgerState>>,
    movements: Option<Arc<dyn MovementStore>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    activity: Option<ActivityService>,
}

/// Identity and position captured before a mutation's network round trip.
struct MutationContext {
    user_id: String,
    family_id: String,
    cursor: MonthKey,
    generation: u64,
}

fn snapshot_key(family_id: &str) -> String {
    format!("ledger::{family_id}")
}

/// Row date for income/expense movements: the entity's own date, midnight UTC.
fn wire_date(date: &NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).and_utc().to_rfc3339()
}

/// Bulk load bucketing: a movement row joins the month its date falls in.
/// Accepts full timestamps and bare dates; anything else is unusable.
fn parse_row_month(date: &str) -> Option<MonthKey> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(date) {
        return Some(MonthKey::from_date(&timestamp.date_naive()));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| MonthKey::from_date(&d))
}

fn entity_date(record: &MovementRecord, key: MonthKey) -> NaiveDate {
    DateTime::parse_from_rfc3339(&record.date)
        .map(|t| t.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(&record.date, "%Y-%m-%d"))
        .unwrap_or_else(|_| {
            // parse_row_month accepted this string, so one of the above did too
            NaiveDate::from_ymd_opt(key.year, key.month + 1, 1).unwrap_or_default()
        })
}

impl LedgerService {
    /// A ledger with no collaborators: purely in-memory, locally minted ids.
    pub fn new() -> Self {
        let today = Utc::now().date_naive();
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                months: BTreeMap::new(),
                cursor: MonthKey::from_date(&today),
                identity: IdentitySnapshot::anonymous(),
                generation: 0,
            })),
            movements: None,
            snapshots: None,
            activity: None,
        }
    }

    pub fn with_movement_store(mut self, movements: Arc<dyn MovementStore>) -> Self {
        self.movements = Some(movements);
        self
    }

    pub fn with_snapshot_store(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn with_activity(mut self, activity: ActivityService) -> Self {
        self.activity = Some(activity);
        self
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }

    /// Establish the active identity and (re)load that family's ledger.
    ///
    /// The previous family's containers are discarded before anything else
    /// happens, so a family switch never shows stale data, even while the
    /// new load is still in flight. A `None` family means there is nothing
    /// to load and the ledger stays empty-but-initialized.
    ///
    /// Load order: snapshot cache first (absent or corrupt blobs are
    /// ignored), then the movement store, whose result replaces the cached
    /// view and refreshes the cache. A movement store failure surfaces as
    /// [`LedgerError::Load`]; re-activating retries.
    pub async fn activate(&self, identity: &IdentitySnapshot) -> Result<(), LedgerError> {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.months.clear();
            state.identity = identity.clone();
            let year = state.cursor.year;
            for month in 0..12 {
                let key = MonthKey::new(month, year);
                state.months.insert(key, MonthData::empty(key));
            }
            state.generation
        };

        let Some(family_id) = identity.family_id().map(str::to_string) else {
            info!("session activated without a family; nothing to load");
            return Ok(());
        };

        if let Some(snapshots) = &self.snapshots {
            match snapshots.load(&snapshot_key(&family_id)).await {
                Ok(Some(blob)) => match serde_json::from_str::<Vec<MonthData>>(&blob) {
                    Ok(months) => {
                        debug!("preloaded {} cached month containers", months.len());
                        self.install_months(generation, months, false);
                    }
                    Err(e) => warn!("discarding corrupt ledger snapshot: {e}"),
                },
                Ok(None) => {}
                Err(e) => warn!("snapshot preload failed: {e:?}"),
            }
        }

        let Some(movements) = &self.movements else {
            return Ok(());
        };

        let records = movements
            .list_by_family(&family_id)
            .await
            .map_err(LedgerError::Load)?;
        info!(
            "loaded {} movements for family {family_id}",
            records.len()
        );

        let months = partition_records(records);
        self.install_months(generation, months, true);
        self.rewrite_snapshot(&family_id).await;
        Ok(())
    }

    /// Merge loaded containers into the state, unless the family changed
    /// while the load was in flight. `reset` rebuilds from scratch (bulk
    /// load is authoritative); otherwise containers merge over the seeds.
    fn install_months(&self, generation: u64, months: Vec<MonthData>, reset: bool) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!("discarding ledger load that outlived its activation");
            return;
        }
        if reset {
            state.months.clear();
            let year = state.cursor.year;
            for month in 0..12 {
                let key = MonthKey::new(month, year);
                state.months.insert(key, MonthData::empty(key));
            }
        }
        for data in months {
            state.months.insert(data.key(), data);
        }
    }

    /// Best-effort rewrite of the cached snapshot. Never fails the caller.
    async fn rewrite_snapshot(&self, family_id: &str) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        let months: Vec<MonthData> = {
            let state = self.lock();
            state.months.values().cloned().collect()
        };
        let blob = match serde_json::to_string(&months) {
            Ok(blob) => blob,
            Err(e) => {
                // NaN amounts are valid in memory but not in JSON
                warn!("ledger snapshot not serializable, skipping cache: {e}");
                return;
            }
        };
        if let Err(e) = snapshots.store(&snapshot_key(family_id), &blob).await {
            warn!("ledger snapshot write failed: {e:?}");
        }
    }

    pub fn identity(&self) -> IdentitySnapshot {
        self.lock().identity.clone()
    }

    pub fn set_cursor(&self, month: u32, year: i32) {
        let mut state = self.lock();
        state.cursor = MonthKey::new(month, year);
    }

    pub fn cursor(&self) -> MonthKey {
        self.lock().cursor
    }

    /// The container for `(month, year)`, materializing and registering an
    /// empty one on first access. Never fails.
    pub fn month_data(&self, month: u32, year: i32) -> MonthData {
        let key = MonthKey::new(month, year);
        let mut state = self.lock();
        state
            .months
            .entry(key)
            .or_insert_with(|| MonthData::empty(key))
            .clone()
    }

    /// Pure read: zero-valued when no container exists. Unlike
    /// [`month_data`](Self::month_data) this never materializes storage.
    pub fn month_summary(&self, month: u32, year: i32) -> MonthSummary {
        let key = MonthKey::new(month, year);
        let state = self.lock();
        state
            .months
            .get(&key)
            .map(summary::summarize)
            .unwrap_or_default()
    }

    /// Twelve summaries plus totals and `sum / 12` averages. Untouched
    /// months contribute zeroes; they are not skipped.
    pub fn year_summary(&self, year: i32) -> YearSummary {
        let months = (0..12).map(|m| self.month_summary(m, year)).collect();
        summary::summarize_year(year, months)
    }

    pub fn expenses_by_category(&self, month: u32, year: i32) -> BTreeMap<String, f64> {
        let key = MonthKey::new(month, year);
        let state = self.lock();
        state
            .months
            .get(&key)
            .map(summary::expenses_by_category)
            .unwrap_or_default()
    }

    pub fn incomes_by_person(&self, month: u32, year: i32) -> BTreeMap<String, f64> {
        let key = MonthKey::new(month, year);
        let state = self.lock();
        state
            .months
            .get(&key)
            .map(summary::incomes_by_person)
            .unwrap_or_default()
    }

    /// Snapshot of identity and cursor taken before a mutation's network
    /// round trip. Mutations need an active family to attribute rows to.
    fn mutation_context(&self) -> Result<MutationContext, LedgerError> {
        let state = self.lock();
        let family_id = state
            .identity
            .family_id()
            .ok_or(LedgerError::NoActiveFamily)?
            .to_string();
        let user_id = state
            .identity
            .user_id
            .clone()
            .unwrap_or_else(|| "anonymous".to_string());
        Ok(MutationContext {
            user_id,
            family_id,
            cursor: state.cursor,
            generation: state.generation,
        })
    }

    /// Mutate the container at the cursor captured in `ctx`, materializing
    /// it if needed. Skipped (returning false) when the family changed while
    /// the remote write was in flight.
    fn apply_at_cursor(&self, ctx: &MutationContext, mutate: impl FnOnce(&mut MonthData)) -> bool {
        let mut state = self.lock();
        if state.generation != ctx.generation {
            debug!("discarding local apply; the session changed mid-flight");
            return false;
        }
        let data = state
            .months
            .entry(ctx.cursor)
            .or_insert_with(|| MonthData::empty(ctx.cursor));
        mutate(data);
        true
    }

    /// Post-mutation bookkeeping: refresh the cached snapshot and append an
    /// activity entry. Both best-effort.
    async fn after_mutation(&self, ctx: &MutationContext, action: &str, description: &str) {
        self.rewrite_snapshot(&ctx.family_id).await;
        if let Some(activity) = &self.activity {
            activity
                .record(&ctx.user_id, &ctx.family_id, action, description)
                .await;
        }
    }

    async fn insert_remote(&self, movement: NewMovement) -> Result<String, LedgerError> {
        match &self.movements {
            Some(store) => {
                let record = store.insert(movement).await.map_err(LedgerError::Remote)?;
                Ok(record.id)
            }
            None => Ok(shared::new_record_id()),
        }
    }

    async fn update_remote(&self, id: &str, fields: MovementUpdate) -> Result<(), LedgerError> {
        if let Some(store) = &self.movements {
            store.update(id, fields).await.map_err(LedgerError::Remote)?;
        }
        Ok(())
    }

    async fn delete_remote(&self, id: &str) -> Result<(), LedgerError> {
        if let Some(store) = &self.movements {
            store.delete(id).await.map_err(LedgerError::Remote)?;
        }
        Ok(())
    }

    /// Add an income to the month at the active cursor.
    ///
    /// The entity's `date` is stored as typed but does not choose the
    /// container; the cursor does.
    pub async fn add_income(&self, new: NewIncome) -> Result<Income, LedgerError> {
        let ctx = self.mutation_context()?;
        let id = self
            .insert_remote(NewMovement {
                user_id: ctx.user_id.clone(),
                family_id: ctx.family_id.clone(),
                kind: MovementKind::Income,
                amount: new.amount,
                date: wire_date(&new.date),
                person_name: new.person.clone(),
                name: None,
                category: Some(new.kind.as_str().to_string()),
                status: None,
                target_amount: None,
                target_month: None,
                target_year: None,
            })
            .await?;

        let income = Income {
            id,
            person: new.person,
            kind: new.kind,
            amount: new.amount,
            date: new.date,
        };
        let entry = income.clone();
        if self.apply_at_cursor(&ctx, |data| data.incomes.push(entry)) {
            self.after_mutation(&ctx, "add_income", "Receita adicionada").await;
        }
        Ok(income)
    }

    /// Replace the income with the matching id in the active month.
    pub async fn update_income(&self, income: Income) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.update_remote(
            &income.id,
            MovementUpdate {
                amount: Some(income.amount),
                date: Some(wire_date(&income.date)),
                person_name: Some(income.person.clone()),
                category: Some(income.kind.as_str().to_string()),
                ..Default::default()
            },
        )
        .await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            if let Some(slot) = data.incomes.iter_mut().find(|i| i.id == income.id) {
                *slot = income;
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "update_income", "Receita atualizada")
            .await;
        Ok(apply)
    }

    /// Remove the income with the given id from the active month only.
    pub async fn delete_income(&self, id: &str) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.delete_remote(id).await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            let before = data.incomes.len();
            data.incomes.retain(|i| i.id != id);
            if data.incomes.len() != before {
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "delete_income", "Receita removida")
            .await;
        Ok(apply)
    }

    pub async fn add_expense(&self, new: NewExpense) -> Result<Expense, LedgerError> {
        let ctx = self.mutation_context()?;
        let id = self
            .insert_remote(NewMovement {
                user_id: ctx.user_id.clone(),
                family_id: ctx.family_id.clone(),
                kind: MovementKind::Expense,
                amount: new.amount,
                date: wire_date(&new.date),
                person_name: String::new(),
                name: Some(new.name.clone()),
                category: Some(new.category.as_str().to_string()),
                status: Some(new.status.as_str().to_string()),
                target_amount: None,
                target_month: None,
                target_year: None,
            })
            .await?;

        let expense = Expense {
            id,
            name: new.name,
            category: new.category,
            amount: new.amount,
            date: new.date,
            status: new.status,
        };
        let entry = expense.clone();
        if self.apply_at_cursor(&ctx, |data| data.expenses.push(entry)) {
            self.after_mutation(&ctx, "add_expense", "Despesa adicionada").await;
        }
        Ok(expense)
    }

    pub async fn update_expense(&self, expense: Expense) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.update_remote(
            &expense.id,
            MovementUpdate {
                amount: Some(expense.amount),
                date: Some(wire_date(&expense.date)),
                name: Some(expense.name.clone()),
                category: Some(expense.category.as_str().to_string()),
                status: Some(expense.status.as_str().to_string()),
                ..Default::default()
            },
        )
        .await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            if let Some(slot) = data.expenses.iter_mut().find(|e| e.id == expense.id) {
                *slot = expense;
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "update_expense", "Despesa atualizada")
            .await;
        Ok(apply)
    }

    pub async fn delete_expense(&self, id: &str) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.delete_remote(id).await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            let before = data.expenses.len();
            data.expenses.retain(|e| e.id != id);
            if data.expenses.len() != before {
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "delete_expense", "Despesa removida")
            .await;
        Ok(apply)
    }

    /// Goal rows carry the creation timestamp as their date, so on reload a
    /// goal lands in the month it was created in.
    pub async fn add_savings_goal(&self, new: NewSavingsGoal) -> Result<SavingsGoal, LedgerError> {
        let ctx = self.mutation_context()?;
        let id = self
            .insert_remote(NewMovement {
                user_id: ctx.user_id.clone(),
                family_id: ctx.family_id.clone(),
                kind: MovementKind::Goal,
                amount: new.saved_amount,
                date: Utc::now().to_rfc3339(),
                person_name: String::new(),
                name: Some(new.name.clone()),
                category: None,
                status: None,
                target_amount: Some(new.target_amount),
                target_month: Some(new.target_month),
                target_year: Some(new.target_year),
            })
            .await?;

        let goal = SavingsGoal {
            id,
            name: new.name,
            target_amount: new.target_amount,
            saved_amount: new.saved_amount,
            target_month: new.target_month,
            target_year: new.target_year,
        };
        let entry = goal.clone();
        if self.apply_at_cursor(&ctx, |data| data.savings_goals.push(entry)) {
            self.after_mutation(&ctx, "add_goal", "Meta de economia criada").await;
        }
        Ok(goal)
    }

    pub async fn update_savings_goal(&self, goal: SavingsGoal) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.update_remote(
            &goal.id,
            MovementUpdate {
                amount: Some(goal.saved_amount),
                name: Some(goal.name.clone()),
                target_amount: Some(goal.target_amount),
                target_month: Some(goal.target_month),
                target_year: Some(goal.target_year),
                ..Default::default()
            },
        )
        .await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            if let Some(slot) = data.savings_goals.iter_mut().find(|g| g.id == goal.id) {
                *slot = goal;
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "update_goal", "Meta de economia atualizada")
            .await;
        Ok(apply)
    }

    pub async fn delete_savings_goal(&self, id: &str) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.delete_remote(id).await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            let before = data.savings_goals.len();
            data.savings_goals.retain(|g| g.id != id);
            if data.savings_goals.len() != before {
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "delete_goal", "Meta de economia removida")
            .await;
        Ok(apply)
    }

    /// Allowance rows have no date of their own; like goals they carry the
    /// creation timestamp.
    pub async fn add_food_allowance(
        &self,
        new: NewFoodAllowance,
    ) -> Result<FoodAllowance, LedgerError> {
        let ctx = self.mutation_context()?;
        let id = self
            .insert_remote(NewMovement {
                user_id: ctx.user_id.clone(),
                family_id: ctx.family_id.clone(),
                kind: MovementKind::Allowance,
                amount: new.used_amount,
                date: Utc::now().to_rfc3339(),
                person_name: new.person.clone(),
                name: None,
                category: None,
                status: None,
                target_amount: Some(new.total_amount),
                target_month: None,
                target_year: None,
            })
            .await?;

        let allowance = FoodAllowance {
            id,
            person: new.person,
            total_amount: new.total_amount,
            used_amount: new.used_amount,
        };
        let entry = allowance.clone();
        if self.apply_at_cursor(&ctx, |data| data.food_allowances.push(entry)) {
            self.after_mutation(&ctx, "add_allowance", "Vale alimentação adicionado")
                .await;
        }
        Ok(allowance)
    }

    pub async fn update_food_allowance(
        &self,
        allowance: FoodAllowance,
    ) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.update_remote(
            &allowance.id,
            MovementUpdate {
                amount: Some(allowance.used_amount),
                person_name: Some(allowance.person.clone()),
                target_amount: Some(allowance.total_amount),
                ..Default::default()
            },
        )
        .await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            if let Some(slot) = data
                .food_allowances
                .iter_mut()
                .find(|a| a.id == allowance.id)
            {
                *slot = allowance;
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "update_allowance", "Vale alimentação atualizado")
            .await;
        Ok(apply)
    }

    pub async fn delete_food_allowance(&self, id: &str) -> Result<Apply, LedgerError> {
        let ctx = self.mutation_context()?;
        self.delete_remote(id).await?;

        let mut apply = Apply::NotFound;
        self.apply_at_cursor(&ctx, |data| {
            let before = data.food_allowances.len();
            data.food_allowances.retain(|a| a.id != id);
            if data.food_allowances.len() != before {
                apply = Apply::Applied;
            }
        });
        self.finish_apply(&ctx, apply, "delete_allowance", "Vale alimentação removido")
            .await;
        Ok(apply)
    }

    /// Bookkeeping for update/delete: a missing id changed nothing locally,
    /// so it neither rewrites the cache nor shows up in the audit trail.
    async fn finish_apply(&self, ctx: &MutationContext, apply: Apply, action: &str, description: &str) {
        match apply {
            Apply::Applied => self.after_mutation(ctx, action, description).await,
            Apply::NotFound => debug!("{action}: no entity with that id in the active month"),
        }
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}

/// Bucket movement rows into month containers by their date. Rows whose
/// dates do not parse are skipped, not fatal.
fn partition_records(records: Vec<MovementRecord>) -> Vec<MonthData> {
    let mut months: BTreeMap<MonthKey, MonthData> = BTreeMap::new();

    for record in records {
        let Some(key) = parse_row_month(&record.date) else {
            warn!(
                "skipping movement {} with unparseable date '{}'",
                record.id, record.date
            );
            continue;
        };
        let data = months
            .entry(key)
            .or_insert_with(|| MonthData::empty(key));

        match record.kind {
            MovementKind::Income => {
                let date = entity_date(&record, key);
                data.incomes.push(Income {
                    id: record.id,
                    person: record.person_name,
                    kind: IncomeKind::parse(record.category.as_deref().unwrap_or("")),
                    amount: record.amount,
                    date,
                });
            }
            MovementKind::Expense => {
                let date = entity_date(&record, key);
                data.expenses.push(Expense {
                    id: record.id,
                    name: record.name.unwrap_or_default(),
                    category: ExpenseCategory::parse(record.category.as_deref().unwrap_or("")),
                    amount: record.amount,
                    date,
                    status: PaymentStatus::parse(record.status.as_deref().unwrap_or("")),
                });
            }
            MovementKind::Goal => {
                data.savings_goals.push(SavingsGoal {
                    id: record.id,
                    name: record.name.unwrap_or_default(),
                    target_amount: record.target_amount.unwrap_or(0.0),
                    saved_amount: record.amount,
                    target_month: record.target_month.unwrap_or(key.month),
                    target_year: record.target_year.unwrap_or(key.year),
                });
            }
            MovementKind::Allowance => {
                data.food_allowances.push(FoodAllowance {
                    id: record.id,
                    person: record.person_name,
                    total_amount: record.target_amount.unwrap_or(0.0),
                    used_amount: record.amount,
                });
            }
        }
    }

    months.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DbConnection, SqliteMovementStore, SqliteSnapshotStore};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use shared::{Family, Profile};

    fn family_identity(user_id: &str, family_id: &str) -> IdentitySnapshot {
        IdentitySnapshot {
            user_id: Some(user_id.to_string()),
            profile: Some(Profile {
                id: user_id.to_string(),
                name: "Léo".to_string(),
                family_id: Some(family_id.to_string()),
                created_at: "2024-01-01T00:00:00+00:00".to_string(),
                updated_at: "2024-01-01T00:00:00+00:00".to_string(),
            }),
            family: Some(Family {
                id: family_id.to_string(),
                code: "ABCD1234".to_string(),
                created_at: "2024-01-01T00:00:00+00:00".to_string(),
            }),
            loading: false,
        }
    }

    fn new_income(person: &str, amount: f64, date: (i32, u32, u32)) -> NewIncome {
        NewIncome {
            person: person.to_string(),
            kind: IncomeKind::SalaryPayment,
            amount,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        }
    }

    fn new_expense(name: &str, amount: f64) -> NewExpense {
        NewExpense {
            name: name.to_string(),
            category: ExpenseCategory::Variable,
            amount,
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            status: PaymentStatus::Pending,
        }
    }

    /// In-memory ledger, no collaborators, activated for one family.
    async fn local_ledger() -> LedgerService {
        let ledger = LedgerService::new();
        ledger.set_cursor(2, 2024);
        ledger
            .activate(&family_identity("user-1", "fam-1"))
            .await
            .unwrap();
        ledger
    }

    /// Ledger backed by a fresh in-memory database, with snapshot cache.
    async fn sqlite_ledger() -> (LedgerService, DbConnection) {
        let db = DbConnection::init_test().await.unwrap();
        let ledger = LedgerService::new()
            .with_movement_store(Arc::new(SqliteMovementStore::new(db.clone())))
            .with_snapshot_store(Arc::new(SqliteSnapshotStore::new(db.clone())));
        ledger.set_cursor(2, 2024);
        ledger
            .activate(&family_identity("user-1", "fam-1"))
            .await
            .unwrap();
        (ledger, db)
    }

    struct FailingMovementStore;

    #[async_trait]
    impl MovementStore for FailingMovementStore {
        async fn insert(&self, _movement: NewMovement) -> Result<MovementRecord> {
            Err(anyhow!("store unavailable"))
        }

        async fn update(&self, _id: &str, _fields: MovementUpdate) -> Result<()> {
            Err(anyhow!("store unavailable"))
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            Err(anyhow!("store unavailable"))
        }

        async fn list_by_family(&self, _family_id: &str) -> Result<Vec<MovementRecord>> {
            Err(anyhow!("store unavailable"))
        }
    }

    #[tokio::test]
    async fn month_data_materializes_once() {
        let ledger = local_ledger().await;

        // a month far outside the seeded year
        let first = ledger.month_data(6, 2031);
        let second = ledger.month_data(6, 2031);
        assert_eq!(first, second);
        assert!(first.is_empty());
        assert_eq!(first.key(), MonthKey::new(6, 2031));
    }

    #[tokio::test]
    async fn month_summary_does_not_materialize() {
        let ledger = local_ledger().await;

        assert_eq!(ledger.month_summary(6, 2031), MonthSummary::default());
        // still absent: reading the summary must not register a container
        let state = ledger.lock();
        assert!(!state.months.contains_key(&MonthKey::new(6, 2031)));
    }

    #[tokio::test]
    async fn add_income_lands_at_cursor_not_at_its_date() {
        let ledger = local_ledger().await;

        // cursor is March 2024; the income is dated May
        let income = ledger
            .add_income(new_income("Léo", 1000.0, (2024, 5, 20)))
            .await
            .unwrap();
        assert!(!income.id.is_empty());

        let march = ledger.month_data(2, 2024);
        assert_eq!(march.incomes.len(), 1);
        assert_eq!(march.incomes[0].amount, 1000.0);
        // the typed date is preserved on the entity
        assert_eq!(
            march.incomes[0].date,
            NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
        );
        assert!(ledger.month_data(4, 2024).incomes.is_empty());
    }

    #[tokio::test]
    async fn march_income_shows_in_march_summary() {
        let ledger = local_ledger().await;

        ledger
            .add_income(new_income("Léo", 1000.0, (2024, 3, 1)))
            .await
            .unwrap();
        assert_eq!(ledger.month_summary(2, 2024).total_income, 1000.0);
    }

    #[tokio::test]
    async fn balance_ignores_savings_goals() {
        let ledger = local_ledger().await;

        ledger
            .add_income(new_income("Léo", 3000.0, (2024, 3, 1)))
            .await
            .unwrap();
        ledger.add_expense(new_expense("Mercado", 1200.0)).await.unwrap();
        ledger
            .add_savings_goal(NewSavingsGoal {
                name: "Viagem".to_string(),
                target_amount: 5000.0,
                saved_amount: 800.0,
                target_month: 11,
                target_year: 2024,
            })
            .await
            .unwrap();

        let summary = ledger.month_summary(2, 2024);
        assert_eq!(summary.total_saved, 800.0);
        assert_eq!(summary.balance, 1800.0);
    }

    #[tokio::test]
    async fn update_replaces_fields_and_keeps_id() {
        let ledger = local_ledger().await;

        let expense = ledger.add_expense(new_expense("Conta de luz", 300.0)).await.unwrap();

        let mut paid = expense.clone();
        paid.status = PaymentStatus::Paid;
        let apply = ledger.update_expense(paid).await.unwrap();
        assert_eq!(apply, Apply::Applied);

        let march = ledger.month_data(2, 2024);
        assert_eq!(march.expenses.len(), 1);
        assert_eq!(march.expenses[0].id, expense.id);
        assert_eq!(march.expenses[0].status, PaymentStatus::Paid);
        // amount and totals are untouched by the status flip
        assert_eq!(march.expenses[0].amount, 300.0);
        assert_eq!(ledger.month_summary(2, 2024).total_expenses, 300.0);
    }

    #[tokio::test]
    async fn update_of_missing_id_is_a_silent_no_op() {
        let ledger = local_ledger().await;

        let apply = ledger
            .update_income(Income {
                id: "no-such-id".to_string(),
                person: "Léo".to_string(),
                kind: IncomeKind::Extra,
                amount: 1.0,
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(apply, Apply::NotFound);
        assert!(ledger.month_data(2, 2024).incomes.is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_id_changes_nothing() {
        let ledger = local_ledger().await;

        let income = ledger
            .add_income(new_income("Léo", 100.0, (2024, 3, 1)))
            .await
            .unwrap();

        let apply = ledger.delete_income("no-such-id").await.unwrap();
        assert_eq!(apply, Apply::NotFound);

        let march = ledger.month_data(2, 2024);
        assert_eq!(march.incomes.len(), 1);
        assert_eq!(march.incomes[0].id, income.id);
    }

    #[tokio::test]
    async fn delete_removes_only_from_the_active_month() {
        let ledger = local_ledger().await;

        let march_income = ledger
            .add_income(new_income("Léo", 100.0, (2024, 3, 1)))
            .await
            .unwrap();
        ledger.set_cursor(3, 2024);
        let april_income = ledger
            .add_income(new_income("Léo", 200.0, (2024, 4, 1)))
            .await
            .unwrap();

        // cursor is April; the March entity is invisible to delete
        let apply = ledger.delete_income(&march_income.id).await.unwrap();
        assert_eq!(apply, Apply::NotFound);
        assert_eq!(ledger.month_data(2, 2024).incomes.len(), 1);

        let apply = ledger.delete_income(&april_income.id).await.unwrap();
        assert_eq!(apply, Apply::Applied);
        assert!(ledger.month_data(3, 2024).incomes.is_empty());
    }

    #[tokio::test]
    async fn over_used_allowance_is_stored_unclamped() {
        let ledger = local_ledger().await;

        let allowance = ledger
            .add_food_allowance(NewFoodAllowance {
                person: "Cat".to_string(),
                total_amount: 500.0,
                used_amount: 600.0,
            })
            .await
            .unwrap();

        assert_eq!(allowance.used_amount, 600.0);
        assert_eq!(summary::allowance_percent_used(&allowance), 100.0);

        let stored = &ledger.month_data(2, 2024).food_allowances[0];
        assert_eq!(stored.used_amount, 600.0);
    }

    #[tokio::test]
    async fn empty_year_aggregates_to_zero() {
        let ledger = local_ledger().await;

        let year = ledger.year_summary(2030);
        assert_eq!(year.months.len(), 12);
        assert_eq!(year.totals, MonthSummary::default());
        assert_eq!(year.average, MonthSummary::default());
    }

    #[tokio::test]
    async fn year_summary_covers_all_twelve_months() {
        let ledger = local_ledger().await;

        ledger
            .add_income(new_income("Léo", 1200.0, (2024, 3, 1)))
            .await
            .unwrap();
        ledger.set_cursor(8, 2024);
        ledger
            .add_income(new_income("Cat", 600.0, (2024, 9, 1)))
            .await
            .unwrap();

        let year = ledger.year_summary(2024);
        assert_eq!(year.totals.total_income, 1800.0);
        assert_eq!(year.average.total_income, 150.0);
        assert_eq!(year.months[2].total_income, 1200.0);
        assert_eq!(year.months[8].total_income, 600.0);
    }

    #[tokio::test]
    async fn grouping_reads_come_from_the_requested_month() {
        let ledger = local_ledger().await;

        ledger.add_expense(new_expense("Mercado", 250.0)).await.unwrap();
        ledger
            .add_income(new_income("Léo", 100.0, (2024, 3, 1)))
            .await
            .unwrap();

        let by_category = ledger.expenses_by_category(2, 2024);
        assert_eq!(by_category.get("variável"), Some(&250.0));
        let by_person = ledger.incomes_by_person(2, 2024);
        assert_eq!(by_person.get("Léo"), Some(&100.0));

        // a month with no container reads as empty, not as an error
        assert!(ledger.expenses_by_category(6, 2031).is_empty());
    }

    #[tokio::test]
    async fn mutations_require_an_active_family() {
        let ledger = LedgerService::new();
        ledger.set_cursor(2, 2024);
        ledger.activate(&IdentitySnapshot::anonymous()).await.unwrap();

        let result = ledger.add_income(new_income("Léo", 100.0, (2024, 3, 1))).await;
        assert!(matches!(result, Err(LedgerError::NoActiveFamily)));
    }

    #[tokio::test]
    async fn remote_failure_leaves_local_state_untouched() {
        let ledger = LedgerService::new().with_movement_store(Arc::new(FailingMovementStore));
        ledger.set_cursor(2, 2024);
        // activation's bulk load fails; the ledger stays initialized-empty
        let result = ledger.activate(&family_identity("user-1", "fam-1")).await;
        assert!(matches!(result, Err(LedgerError::Load(_))));

        let result = ledger.add_income(new_income("Léo", 100.0, (2024, 3, 1))).await;
        assert!(matches!(result, Err(LedgerError::Remote(_))));
        assert!(ledger.month_data(2, 2024).incomes.is_empty());
        assert_eq!(ledger.month_summary(2, 2024), MonthSummary::default());
    }

    #[tokio::test]
    async fn switching_families_discards_previous_data() {
        let (ledger, _db) = sqlite_ledger().await;

        ledger
            .add_income(new_income("Léo", 1000.0, (2024, 3, 1)))
            .await
            .unwrap();
        assert_eq!(ledger.month_summary(2, 2024).total_income, 1000.0);

        ledger
            .activate(&family_identity("user-1", "fam-2"))
            .await
            .unwrap();
        assert_eq!(ledger.month_summary(2, 2024), MonthSummary::default());
        assert!(ledger.month_data(2, 2024).incomes.is_empty());
    }

    #[tokio::test]
    async fn bulk_load_rebuilds_the_ledger_from_movements() {
        let (ledger, _db) = sqlite_ledger().await;

        ledger
            .add_income(new_income("Léo", 1000.0, (2024, 3, 1)))
            .await
            .unwrap();
        ledger.add_expense(new_expense("Mercado", 250.0)).await.unwrap();
        ledger
            .add_food_allowance(NewFoodAllowance {
                person: "Cat".to_string(),
                total_amount: 500.0,
                used_amount: 120.0,
            })
            .await
            .unwrap();

        // a second activation reloads everything from the movement store;
        // incomes and expenses land in the month of their row date
        ledger
            .activate(&family_identity("user-1", "fam-1"))
            .await
            .unwrap();

        let march = ledger.month_data(2, 2024);
        assert_eq!(march.incomes.len(), 1);
        assert_eq!(march.incomes[0].person, "Léo");
        assert_eq!(march.expenses.len(), 1);
        assert_eq!(march.expenses[0].category, ExpenseCategory::Variable);
        assert_eq!(march.expenses[0].status, PaymentStatus::Pending);

        // the allowance row was dated with its creation time, so it lands
        // in the real current month
        let today = Utc::now().date_naive();
        let now_key = MonthKey::from_date(&today);
        let current = ledger.month_data(now_key.month, now_key.year);
        assert_eq!(current.food_allowances.len(), 1);
        assert_eq!(current.food_allowances[0].total_amount, 500.0);
        assert_eq!(current.food_allowances[0].used_amount, 120.0);
    }

    #[tokio::test]
    async fn bulk_load_skips_rows_with_unparseable_dates() {
        let db = DbConnection::init_test().await.unwrap();
        let store = SqliteMovementStore::new(db.clone());

        store
            .insert(NewMovement {
                user_id: "user-1".to_string(),
                family_id: "fam-1".to_string(),
                kind: MovementKind::Income,
                amount: 10.0,
                date: "not-a-date".to_string(),
                person_name: "Léo".to_string(),
                name: None,
                category: Some("pagamento".to_string()),
                status: None,
                target_amount: None,
                target_month: None,
                target_year: None,
            })
            .await
            .unwrap();
        store
            .insert(NewMovement {
                user_id: "user-1".to_string(),
                family_id: "fam-1".to_string(),
                kind: MovementKind::Income,
                amount: 20.0,
                date: "2024-03-05".to_string(),
                person_name: "Cat".to_string(),
                name: None,
                category: Some("extra".to_string()),
                status: None,
                target_amount: None,
                target_month: None,
                target_year: None,
            })
            .await
            .unwrap();

        let ledger = LedgerService::new().with_movement_store(Arc::new(store));
        ledger.set_cursor(2, 2024);
        ledger
            .activate(&family_identity("user-1", "fam-1"))
            .await
            .unwrap();

        // only the parseable row survives; bare dates are accepted
        let march = ledger.month_data(2, 2024);
        assert_eq!(march.incomes.len(), 1);
        assert_eq!(march.incomes[0].amount, 20.0);
        assert_eq!(march.incomes[0].kind, IncomeKind::Extra);
    }

    #[tokio::test]
    async fn snapshot_cache_preloads_without_a_movement_store() {
        let db = DbConnection::init_test().await.unwrap();
        let snapshots = Arc::new(SqliteSnapshotStore::new(db.clone()));

        // first session writes the cache through its mutations
        let ledger = LedgerService::new().with_snapshot_store(snapshots.clone());
        ledger.set_cursor(2, 2024);
        ledger
            .activate(&family_identity("user-1", "fam-1"))
            .await
            .unwrap();
        ledger
            .add_income(new_income("Léo", 750.0, (2024, 3, 1)))
            .await
            .unwrap();

        // a fresh instance sees the cached containers at startup
        let restarted = LedgerService::new().with_snapshot_store(snapshots);
        restarted.set_cursor(2, 2024);
        restarted
            .activate(&family_identity("user-1", "fam-1"))
            .await
            .unwrap();
        assert_eq!(restarted.month_summary(2, 2024).total_income, 750.0);
    }

    #[tokio::test]
    async fn corrupt_snapshot_falls_back_to_empty() {
        let db = DbConnection::init_test().await.unwrap();
        let snapshots = SqliteSnapshotStore::new(db.clone());
        snapshots
            .store(&snapshot_key("fam-1"), "{ not json ]")
            .await
            .unwrap();

        let ledger = LedgerService::new().with_snapshot_store(Arc::new(snapshots));
        ledger.set_cursor(2, 2024);
        ledger
            .activate(&family_identity("user-1", "fam-1"))
            .await
            .unwrap();
        assert!(ledger.month_data(2, 2024).is_empty());
    }

    #[tokio::test]
    async fn local_ids_are_minted_without_a_movement_store() {
        let ledger = local_ledger().await;

        let first = ledger
            .add_income(new_income("Léo", 1.0, (2024, 3, 1)))
            .await
            .unwrap();
        let second = ledger
            .add_income(new_income("Léo", 2.0, (2024, 3, 1)))
            .await
            .unwrap();
        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn row_month_parsing_accepts_both_wire_shapes() {
        assert_eq!(
            parse_row_month("2024-03-01T12:30:00+00:00"),
            Some(MonthKey::new(2, 2024))
        );
        assert_eq!(parse_row_month("2024-12-31"), Some(MonthKey::new(11, 2024)));
        assert_eq!(parse_row_month("31/12/2024"), None);
        assert_eq!(parse_row_month(""), None);
    }
}
