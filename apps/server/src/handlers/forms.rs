use super::ListQuery;
use crate::error::ApiError;
use crate::extract::Tenant;
use axum::Json;
use axum::extract::{Path, Query, State};
use vanish::content::{ContentStore, NewForm};
use vanish::domain::{EntryKind, Response};

pub(crate) async fn create(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Json(req): Json<NewForm>,
) -> Result<Json<Response>, ApiError> {
    let entry = store.create_form(&ctx, req).await?;
    Ok(Json(Response::entries(EntryKind::Form, vec![entry])))
}

pub(crate) async fn list(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Query(params): Query<ListQuery>,
) -> Result<Json<Response>, ApiError> {
    let filter = params.apicontext.as_deref().unwrap_or_default();
    let entries = store.list(&ctx, filter, params.query.as_deref(), EntryKind::Form).await?;
    Ok(Json(Response::entries(EntryKind::Form, entries)))
}

pub(crate) async fn describe(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
) -> Result<Json<Response>, ApiError> {
    let entry = store.describe(&ctx, &id, EntryKind::Form).await?;
    Ok(Json(Response::entries(EntryKind::Form, vec![entry])))
}

pub(crate) async fn delete(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
) -> Result<Json<Response>, ApiError> {
    store.delete(&ctx, &id, EntryKind::Form).await?;
    Ok(Json(Response::ok("Form successfully deleted")))
}
