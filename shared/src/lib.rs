use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub mod format;

/// Generate an opaque record id.
///
/// Ids are normally assigned by the movement store at insert time; a ledger
/// running without a remote store mints them locally with the same shape.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Composite month key, zero-based month (0 = January) plus calendar year.
///
/// Ordering follows the encoded index `year * 12 + month`, so keys sort
/// chronologically and can be used directly in ordered maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub month: u32,
    pub year: i32,
}

impl MonthKey {
    pub fn new(month: u32, year: i32) -> Self {
        debug_assert!(month < 12, "month must be in 0..12");
        Self { month, year }
    }

    /// Key for the month a calendar date falls in.
    pub fn from_date(date: &NaiveDate) -> Self {
        Self {
            month: date.month0(),
            year: date.year(),
        }
    }

    /// Encoded integer form, `year * 12 + month`.
    pub fn index(&self) -> i64 {
        self.year as i64 * 12 + self.month as i64
    }
}

impl Ord for MonthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl PartialOrd for MonthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-based month for humans
        write!(f, "{:02}/{}", self.month + 1, self.year)
    }
}

/// Income source classification. Wire labels are the pt-BR values the
/// movements relation has always stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeKind {
    #[serde(rename = "pagamento")]
    SalaryPayment,
    #[serde(rename = "vale")]
    Allowance,
    #[serde(rename = "extra")]
    Extra,
    #[serde(rename = "outros")]
    Other,
}

impl IncomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeKind::SalaryPayment => "pagamento",
            IncomeKind::Allowance => "vale",
            IncomeKind::Extra => "extra",
            IncomeKind::Other => "outros",
        }
    }

    /// Lenient parse: unknown labels fall back to `Other` rather than erroring.
    pub fn parse(label: &str) -> Self {
        match label {
            "pagamento" => IncomeKind::SalaryPayment,
            "vale" => IncomeKind::Allowance,
            "extra" => IncomeKind::Extra,
            _ => IncomeKind::Other,
        }
    }
}

/// Expense category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCategory {
    #[serde(rename = "fixa")]
    Fixed,
    #[serde(rename = "variável")]
    Variable,
    #[serde(rename = "parcelada")]
    Installment,
    #[serde(rename = "lazer")]
    Leisure,
    #[serde(rename = "saúde")]
    Health,
    #[serde(rename = "transporte")]
    Transport,
    #[serde(rename = "outros")]
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Fixed => "fixa",
            ExpenseCategory::Variable => "variável",
            ExpenseCategory::Installment => "parcelada",
            ExpenseCategory::Leisure => "lazer",
            ExpenseCategory::Health => "saúde",
            ExpenseCategory::Transport => "transporte",
            ExpenseCategory::Other => "outros",
        }
    }

    pub fn parse(label: &str) -> Self {
        match label {
            "fixa" => ExpenseCategory::Fixed,
            "variável" => ExpenseCategory::Variable,
            "parcelada" => ExpenseCategory::Installment,
            "lazer" => ExpenseCategory::Leisure,
            "saúde" => ExpenseCategory::Health,
            "transporte" => ExpenseCategory::Transport,
            _ => ExpenseCategory::Other,
        }
    }
}

/// Whether an expense has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "paga")]
    Paid,
    #[serde(rename = "pendente")]
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paga",
            PaymentStatus::Pending => "pendente",
        }
    }

    /// Missing or unknown status reads as pending.
    pub fn parse(label: &str) -> Self {
        match label {
            "paga" => PaymentStatus::Paid,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Discriminator stored on every movement row; decides which collection a
/// record lands in during bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "receita")]
    Income,
    #[serde(rename = "despesa")]
    Expense,
    #[serde(rename = "meta")]
    Goal,
    #[serde(rename = "vale")]
    Allowance,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Income => "receita",
            MovementKind::Expense => "despesa",
            MovementKind::Goal => "meta",
            MovementKind::Allowance => "vale",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "receita" => Some(MovementKind::Income),
            "despesa" => Some(MovementKind::Expense),
            "meta" => Some(MovementKind::Goal),
            "vale" => Some(MovementKind::Allowance),
            _ => None,
        }
    }
}

/// A single income entry. Amounts are plain `f64`; the store does not
/// validate them (see the ledger docs on numeric leniency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: String,
    /// Free-text label of who earned it ("Léo", "Cat", ...)
    pub person: String,
    #[serde(rename = "type")]
    pub kind: IncomeKind,
    pub amount: f64,
    pub date: NaiveDate,
}

/// Income fields minus the id the store assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncome {
    pub person: String,
    #[serde(rename = "type")]
    pub kind: IncomeKind,
    pub amount: f64,
    pub date: NaiveDate,
}

/// A single expense entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub name: String,
    pub category: ExpenseCategory,
    pub amount: f64,
    pub date: NaiveDate,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub name: String,
    pub category: ExpenseCategory,
    pub amount: f64,
    pub date: NaiveDate,
    pub status: PaymentStatus,
}

/// A savings goal. `saved_amount` may legitimately exceed `target_amount`;
/// progress display clamps, the data does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    pub saved_amount: f64,
    /// Zero-based target month, 0..=11
    pub target_month: u32,
    pub target_year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSavingsGoal {
    pub name: String,
    pub target_amount: f64,
    pub saved_amount: f64,
    pub target_month: u32,
    pub target_year: i32,
}

/// A per-person food allowance envelope. `used_amount > total_amount` is
/// accepted and preserved; only the usage percentage is clamped for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodAllowance {
    pub id: String,
    pub person: String,
    pub total_amount: f64,
    pub used_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFoodAllowance {
    pub person: String,
    pub total_amount: f64,
    pub used_amount: f64,
}

/// The dense per-month container holding all four entity collections.
/// Exactly one exists per (month, year) pair that has ever been touched;
/// containers are materialized lazily on first access and never destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthData {
    /// Zero-based month, 0..=11
    pub month: u32,
    pub year: i32,
    pub incomes: Vec<Income>,
    pub expenses: Vec<Expense>,
    pub savings_goals: Vec<SavingsGoal>,
    pub food_allowances: Vec<FoodAllowance>,
}

impl MonthData {
    pub fn empty(key: MonthKey) -> Self {
        Self {
            month: key.month,
            year: key.year,
            incomes: Vec::new(),
            expenses: Vec::new(),
            savings_goals: Vec::new(),
            food_allowances: Vec::new(),
        }
    }

    pub fn key(&self) -> MonthKey {
        MonthKey::new(self.month, self.year)
    }

    pub fn is_empty(&self) -> bool {
        self.incomes.is_empty()
            && self.expenses.is_empty()
            && self.savings_goals.is_empty()
            && self.food_allowances.is_empty()
    }
}

/// Derived per-month aggregate. Computed on demand, never persisted.
///
/// `balance` is income minus expenses only; saved amounts are tracked in
/// `total_saved` but deliberately do not reduce the balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub total_saved: f64,
    pub balance: f64,
}

/// Twelve month summaries plus their totals and the `sum / 12` average.
/// Months with no container contribute zeroes, they are not skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    /// Index 0 = January
    pub months: Vec<MonthSummary>,
    pub totals: MonthSummary,
    pub average: MonthSummary,
}

/// Result of an update or delete against the active month.
///
/// A missing id is a silent no-op, not an error: the UI never edits an id it
/// did not just render, so this path is defensive. The tagged result lets
/// callers log it if they care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Apply {
    Applied,
    NotFound,
}

impl Apply {
    pub fn is_applied(&self) -> bool {
        matches!(self, Apply::Applied)
    }
}

/// Outcome envelope for update/delete endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub applied: bool,
}

impl From<Apply> for ApplyResponse {
    fn from(apply: Apply) -> Self {
        Self {
            applied: apply.is_applied(),
        }
    }
}

/// A member profile. `family_id` is `None` only for profiles that have not
/// joined (or been given) a family yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub family_id: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

/// A sharing scope. All ledger data is partitioned by `id`; `code` is the
/// short invite code other members join with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: String,
    pub code: String,
    pub created_at: String,
}

/// What the identity provider exposes to the ledger: the logged-in user (if
/// any), their profile, and their family. A `None` family means there is no
/// data to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub user_id: Option<String>,
    pub profile: Option<Profile>,
    pub family: Option<Family>,
    pub loading: bool,
}

impl IdentitySnapshot {
    /// Snapshot for a signed-out session.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            profile: None,
            family: None,
            loading: false,
        }
    }

    /// The family id the ledger should scope to, when fully resolved.
    pub fn family_id(&self) -> Option<&str> {
        self.family.as_ref().map(|f| f.id.as_str())
    }
}

/// One audit trail entry. Writes to the activity log are best-effort and
/// never abort the operation that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub user_id: String,
    pub family_id: String,
    pub action_type: String,
    pub description: String,
    pub created_at: String,
}

/// Request to establish the active session/family for the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateSessionRequest {
    pub user_id: String,
}

/// Request to move the active (month, year) cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorRequest {
    /// Zero-based month, 0..=11
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: String,
    pub name: String,
    /// Join an existing family by code; omitted means a new family is created.
    pub family_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinFamilyRequest {
    pub user_id: String,
    pub code: String,
}
