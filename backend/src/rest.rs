//! HTTP surface over the domain services.
//!
//! Handlers stay thin: extract, call the service, map the result. No failure
//! here is fatal to the process; errors become status codes with a
//! user-facing message and the API keeps serving.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::domain::{ActivityService, FamilyService, LedgerError, LedgerService};
use shared::{
    ActivateSessionRequest, ApplyResponse, CreateProfileRequest, CursorRequest, Expense,
    FoodAllowance, Income, JoinFamilyRequest, NewExpense, NewFoodAllowance, NewIncome,
    NewSavingsGoal, SavingsGoal,
};

/// Application state shared across handlers. Services are cheap clones over
/// shared internals.
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
    pub family: FamilyService,
    pub activity: ActivityService,
}

impl AppState {
    pub fn new(ledger: LedgerService, family: FamilyService, activity: ActivityService) -> Self {
        Self {
            ledger,
            family,
            activity,
        }
    }
}

/// How failures leave the API: a status code plus a message the UI can show
/// as a transient notification.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::NoActiveFamily => Self::new(StatusCode::CONFLICT, error.to_string()),
            LedgerError::Remote(e) => {
                error!("movement store write failed: {e:?}");
                Self::new(StatusCode::BAD_GATEWAY, "Erro ao salvar. Tente novamente.")
            }
            LedgerError::Load(e) => {
                error!("bulk load failed: {e:?}");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "Erro ao carregar dados. Por favor, tente novamente.",
                )
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!("request failed: {error:?}");
        Self::internal("Algo deu errado. Tente novamente.")
    }
}

fn check_month(month: u32) -> Result<(), ApiError> {
    if month > 11 {
        return Err(ApiError::bad_request(format!(
            "month must be 0..=11, got {month}"
        )));
    }
    Ok(())
}

/// The API router, nested under `/api` by `main`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/activate", post(activate_session))
        .route("/cursor", get(get_cursor).put(set_cursor))
        .route("/months/:year/:month", get(get_month))
        .route("/months/:year/:month/summary", get(get_month_summary))
        .route(
            "/months/:year/:month/expenses-by-category",
            get(get_expenses_by_category),
        )
        .route(
            "/months/:year/:month/incomes-by-person",
            get(get_incomes_by_person),
        )
        .route("/years/:year/summary", get(get_year_summary))
        .route("/incomes", post(add_income).put(update_income))
        .route("/incomes/:id", delete(delete_income))
        .route("/expenses", post(add_expense).put(update_expense))
        .route("/expenses/:id", delete(delete_expense))
        .route("/savings-goals", post(add_goal).put(update_goal))
        .route("/savings-goals/:id", delete(delete_goal))
        .route("/food-allowances", post(add_allowance).put(update_allowance))
        .route(
            "/food-allowances/:id",
            delete(delete_allowance),
        )
        .route("/profiles", post(create_profile))
        .route("/profiles/:user_id", get(get_profile).put(update_profile))
        .route("/families/join", post(join_family))
        .route("/activity/:family_id", get(list_activity))
}

/// GET /api/session - the identity the ledger is currently scoped to.
async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.identity())
}

/// POST /api/session/activate
///
/// Resolves the user's identity and (re)loads the ledger for their family.
/// Activating for a different user discards everything loaded before.
async fn activate_session(
    State(state): State<AppState>,
    Json(request): Json<ActivateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/session/activate - user: {}", request.user_id);

    let identity = state.family.fetch_identity(&request.user_id).await?;
    state.ledger.activate(&identity).await?;
    Ok(Json(identity))
}

async fn get_cursor(State(state): State<AppState>) -> impl IntoResponse {
    let cursor = state.ledger.cursor();
    Json(CursorRequest {
        month: cursor.month,
        year: cursor.year,
    })
}

async fn set_cursor(
    State(state): State<AppState>,
    Json(request): Json<CursorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_month(request.month)?;
    state.ledger.set_cursor(request.month, request.year);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/months/:year/:month
///
/// Returns the month container, materializing an empty one on first access.
async fn get_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    check_month(month)?;
    Ok(Json(state.ledger.month_data(month, year)))
}

async fn get_month_summary(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    check_month(month)?;
    Ok(Json(state.ledger.month_summary(month, year)))
}

async fn get_expenses_by_category(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    check_month(month)?;
    Ok(Json(state.ledger.expenses_by_category(month, year)))
}

async fn get_incomes_by_person(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    check_month(month)?;
    Ok(Json(state.ledger.incomes_by_person(month, year)))
}

async fn get_year_summary(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> impl IntoResponse {
    Json(state.ledger.year_summary(year))
}

async fn add_income(
    State(state): State<AppState>,
    Json(new): Json<NewIncome>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/incomes - person: {}", new.person);
    let income = state.ledger.add_income(new).await?;
    Ok((StatusCode::CREATED, Json(income)))
}

async fn update_income(
    State(state): State<AppState>,
    Json(income): Json<Income>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.update_income(income).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn delete_income(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.delete_income(&id).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn add_expense(
    State(state): State<AppState>,
    Json(new): Json<NewExpense>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/expenses - name: {}", new.name);
    let expense = state.ledger.add_expense(new).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn update_expense(
    State(state): State<AppState>,
    Json(expense): Json<Expense>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.update_expense(expense).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.delete_expense(&id).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn add_goal(
    State(state): State<AppState>,
    Json(new): Json<NewSavingsGoal>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/savings-goals - name: {}", new.name);
    let goal = state.ledger.add_savings_goal(new).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn update_goal(
    State(state): State<AppState>,
    Json(goal): Json<SavingsGoal>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.update_savings_goal(goal).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn delete_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.delete_savings_goal(&id).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn add_allowance(
    State(state): State<AppState>,
    Json(new): Json<NewFoodAllowance>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/food-allowances - person: {}", new.person);
    let allowance = state.ledger.add_food_allowance(new).await?;
    Ok((StatusCode::CREATED, Json(allowance)))
}

async fn update_allowance(
    State(state): State<AppState>,
    Json(allowance): Json<FoodAllowance>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.update_food_allowance(allowance).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn delete_allowance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let apply = state.ledger.delete_food_allowance(&id).await?;
    Ok(Json(ApplyResponse::from(apply)))
}

async fn create_profile(
    State(state): State<AppState>,
    Json(request): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/profiles - user: {}", request.user_id);
    let profile = state
        .family
        .create_profile(
            &request.user_id,
            &request.name,
            request.family_code.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .family
        .fetch_identity(&user_id)
        .await?
        .profile
        .ok_or_else(|| ApiError::not_found("Perfil não encontrado"))?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<shared::UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.family.update_profile_name(&user_id, &request.name).await?;
    Ok(Json(profile))
}

/// POST /api/families/join
///
/// Re-points the profile at the family matching the code. The client is
/// expected to re-activate the session afterwards so the old family's data
/// is discarded and the new family's records load.
async fn join_family(
    State(state): State<AppState>,
    Json(request): Json<JoinFamilyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("POST /api/families/join - user: {}", request.user_id);
    let family = state.family.join_family(&request.user_id, &request.code).await?;
    Ok(Json(family))
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    limit: Option<u32>,
}

async fn list_activity(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .activity
        .list(&family_id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(entries))
}
