use super::ListQuery;
use crate::error::ApiError;
use crate::extract::Tenant;
use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::Response as HttpResponse;
use tokio_util::io::ReaderStream;
use tracing::debug;
use vanish::content::{ContentStore, Delivery, ModifyUpload, NewUpload, UploadFile};
use vanish::domain::{EntryKind, Response};

/// Multipart field carrying the files. `upload` is accepted too.
const FILE_FIELD: &str = "upload[]";

pub(crate) async fn create(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    mut multipart: Multipart,
) -> Result<Json<Response>, ApiError> {
    let mut req = NewUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            FILE_FIELD | "upload" => {
                let file = field.file_name().unwrap_or_default().to_owned();
                let data = field.bytes().await?;
                debug!(%file, bytes = data.len(), "Received file");
                req.files.push(UploadFile::new(file, data));
            },
            "expire" => req.expire = Some(field.text().await?),
            "description" => req.description = Some(field.text().await?),
            "form" => req.form = Some(field.text().await?),
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let entry = store.create_upload(&ctx, req).await?;
    Ok(Json(Response::entries(EntryKind::Upload, vec![entry])))
}

pub(crate) async fn list(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Query(params): Query<ListQuery>,
) -> Result<Json<Response>, ApiError> {
    let filter = params.apicontext.as_deref().unwrap_or_default();
    let entries = store.list(&ctx, filter, params.query.as_deref(), EntryKind::Upload).await?;
    Ok(Json(Response::entries(EntryKind::Upload, entries)))
}

pub(crate) async fn describe(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
) -> Result<Json<Response>, ApiError> {
    let entry = store.describe(&ctx, &id, EntryKind::Upload).await?;
    Ok(Json(Response::entries(EntryKind::Upload, vec![entry])))
}

pub(crate) async fn modify(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
    Json(change): Json<ModifyUpload>,
) -> Result<Json<Response>, ApiError> {
    let entry = store.modify(&ctx, &id, change).await?;
    Ok(Json(Response::entries(EntryKind::Upload, vec![entry])))
}

pub(crate) async fn delete(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
) -> Result<Json<Response>, ApiError> {
    store.delete(&ctx, &id, EntryKind::Upload).await?;
    Ok(Json(Response::ok("Upload successfully deleted")))
}

/// Operator view of the artifact. Never consumes an `asap` upload.
pub(crate) async fn fetch(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
) -> Result<HttpResponse, ApiError> {
    deliver(store.peek(&ctx, &id).await?)
}

/// The public download link. The file segment is cosmetic, the record decides
/// what gets served.
pub(crate) async fn download(
    State(store): State<ContentStore>,
    Tenant(ctx): Tenant,
    Path((id, _file)): Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    deliver(store.fetch(&ctx, &id).await?)
}

fn deliver(delivery: Delivery) -> Result<HttpResponse, ApiError> {
    let name = delivery.file_name().to_owned();
    let len = delivery.len;
    debug!(id = %delivery.entry.id, file = %name, bytes = len, "Streaming artifact");

    let body = Body::from_stream(ReaderStream::new(delivery.file));
    Ok(HttpResponse::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\""))
        .header(header::CACHE_CONTROL, "no-store")
        .body(body)?)
}
