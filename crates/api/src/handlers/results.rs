//! The cross-task results endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::tasks::{ResultListOut, ResultOut};
use super::{resolve_page, ApiError, AppState, Pagination};

#[derive(Debug, Deserialize)]
pub struct ListResultsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub task_id: Option<Uuid>,
    pub success: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListResultsQuery>,
) -> Result<Json<ResultListOut>, ApiError> {
    let (page, limit, offset) = resolve_page(query.page, query.limit);
    let (results, total) = state
        .service
        .list_results(limit, offset, query.task_id, query.success)
        .await?;

    Ok(Json(ResultListOut {
        results: results.into_iter().map(ResultOut::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}
