use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use super::{ApiError, parse_account};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account: String,
    /// Token balance in base units, as a decimal string.
    pub balance: String,
}

/// `GET /balances/{account}`
pub async fn balance(
    State(state): State<SharedState>,
    Path(account): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let who = parse_account(&account)?;
    Ok(Json(BalanceResponse {
        account: who.to_hex(),
        balance: state.engine.token_ledger().balance_of(&who).to_string(),
    }))
}
