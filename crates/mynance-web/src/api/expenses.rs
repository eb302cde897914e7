use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mynance_core::Identity;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::expenses::{Expense, NewExpense};
use crate::state::ServiceState;

pub async fn list(
    State(state): State<ServiceState>,
    AuthUser(user): AuthUser,
) -> Json<Vec<Expense>> {
    Json(state.expenses.list(user.user_id))
}

pub async fn create(
    State(state): State<ServiceState>,
    AuthUser(user): AuthUser,
    body: Result<Json<NewExpense>, JsonRejection>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    let Json(body) = body?;
    body.validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let expense = state.expenses.create(user.user_id, body);
    tracing::info!(user_id = user.user_id, expense_id = expense.id, "expense created");
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn get_one(
    State(state): State<ServiceState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Expense>, AppError> {
    state
        .expenses
        .get(user.user_id, id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Expense not found".to_string()))
}

/// The identity the authority vouched for.
pub async fn me(AuthUser(user): AuthUser) -> Json<Identity> {
    Json(user)
}
