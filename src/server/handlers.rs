//! Route handlers. Each one is a thin wrapper over a command function.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use std::str::FromStr;

use super::{ApiResult, AppState, json_response, with_context};
use crate::commands::{self, Scope};
use crate::storage::{EvaluationFilter, ProjectFilter, RiskFilter};
use crate::{Error, Result};

fn parse<T: FromStr<Err = Error>>(value: Option<String>) -> Result<Option<T>> {
    value.map(|v| v.parse()).transpose()
}

#[derive(Debug, Default, Deserialize)]
pub struct OwnerQuery {
    pub owner: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub portfolio: Option<String>,
    pub status: Option<String>,
    pub owner: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RiskQuery {
    pub project: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvaluationQuery {
    pub project: Option<String>,
    pub standard: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub project: Option<String>,
    pub portfolio: Option<String>,
    pub standard: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleQuery {
    pub role: Option<String>,
}

pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::dashboard(ctx)).await
}

pub async fn list_portfolios(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<OwnerQuery>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| {
        commands::portfolio_list(ctx, q.owner.as_deref())
    })
    .await
}

pub async fn show_portfolio(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::portfolio_show(ctx, &id)).await
}

pub async fn portfolio_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::portfolio_stats(ctx, &id)).await
}

pub async fn recompute_health(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| {
        commands::portfolio_recompute_health(ctx, &id)
    })
    .await
}

pub async fn list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ProjectQuery>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| {
        let filter = ProjectFilter {
            portfolio_id: q.portfolio,
            status: parse(q.status)?,
            owner_id: q.owner,
            tag: q.tag,
        };
        commands::project_list(ctx, &filter)
    })
    .await
}

pub async fn show_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::project_show(ctx, &id)).await
}

pub async fn list_risks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<RiskQuery>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| {
        let filter = RiskFilter {
            project_id: q.project,
            severity: parse(q.severity)?,
            status: parse(q.status)?,
        };
        commands::risk_list(ctx, &filter)
    })
    .await
}

pub async fn show_risk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::risk_show(ctx, &id)).await
}

pub async fn risk_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ScopeQuery>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| {
        let scope = Scope::from_ids(q.project, q.portfolio, None)?;
        commands::risk_summary(ctx, scope)
    })
    .await
}

pub async fn list_standards(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::standard_list(ctx)).await
}

pub async fn show_standard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::standard_show(ctx, &id)).await
}

pub async fn list_evaluations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<EvaluationQuery>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| {
        let filter = EvaluationFilter {
            project_id: q.project,
            standard_id: q.standard,
        };
        commands::compliance_list(ctx, &filter)
    })
    .await
}

pub async fn show_evaluation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| commands::compliance_show(ctx, &id)).await
}

pub async fn compliance_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ScopeQuery>,
) -> ApiResult {
    with_context(&state, &headers, |ctx| {
        let scope = Scope::from_ids(q.project, q.portfolio, q.standard)?;
        commands::compliance_summary(ctx, scope)
    })
    .await
}

/// The permission table is public policy; no acting user is needed.
pub async fn access_matrix(Query(q): Query<RoleQuery>) -> ApiResult {
    let role = parse(q.role)?;
    Ok(json_response(&commands::access_matrix(role)))
}
