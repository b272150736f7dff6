//! Attachment upload, download and deletion.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grove_types::{Attachment, ForestError};

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, Engine};

/// Attachment record as returned to clients: everything but the bytes.
#[derive(Debug, Serialize)]
pub struct AttachmentView {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub hash: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Attachment> for AttachmentView {
    fn from(att: &Attachment) -> Self {
        Self {
            id: att.id.clone(),
            name: att.name.clone(),
            mime_type: att.mime_type.clone(),
            size: att.size,
            hash: att.hash.clone(),
            uploaded_by: att.uploaded_by.clone(),
            uploaded_at: att.uploaded_at,
        }
    }
}

struct UploadForm {
    path: String,
    filename: String,
    mime_type: String,
    content: Vec<u8>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut path = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError(ForestError::InvalidArgument(format!("bad multipart body: {e}")))
    })? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("path") => {
                let value = field.text().await.map_err(|e| {
                    ApiError(ForestError::InvalidArgument(format!("bad path field: {e}")))
                })?;
                path = Some(value);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("attachment").to_owned();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let content = field.bytes().await.map_err(|e| {
                    ApiError(ForestError::InvalidArgument(format!("bad file field: {e}")))
                })?;
                file = Some((filename, mime_type, content.to_vec()));
            }
            _ => {}
        }
    }

    let path = path
        .ok_or_else(|| ApiError(ForestError::InvalidArgument("missing path field".into())))?;
    let (filename, mime_type, content) = file
        .ok_or_else(|| ApiError(ForestError::InvalidArgument("missing file field".into())))?;
    Ok(UploadForm {
        path,
        filename,
        mime_type,
        content,
    })
}

/// `POST /attachments/upload` – multipart upload of a node attachment.
pub async fn upload_attachment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> ApiResult<Json<AttachmentView>> {
    let form = read_upload_form(multipart).await?;
    let node_id = state.resolve_path(&form.path).await?;

    let attachment =
        state
            .attachments
            .store(form.content, &form.filename, &form.mime_type, &user.user_id)?;
    let view = AttachmentView::from(&attachment);
    let user_id = user.user_id;

    state
        .queue
        .submit("add_attachment", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.add_attachment(attachment, &user_id)?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct AttachmentQuery {
    #[serde(default)]
    pub path: String,
}

/// `GET /attachments/{id}?path=…` – download the raw bytes with a
/// `Content-Disposition` filename.
pub async fn get_attachment(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(attachment_id): Path<String>,
    Query(query): Query<AttachmentQuery>,
) -> ApiResult<impl IntoResponse> {
    let node_id = state.resolve_path(&query.path).await?;
    let forest = state.engine.forest.read().await;
    let node = forest
        .node(&node_id)
        .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
    let attachment = node.attachment(&attachment_id)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&attachment.mime_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    let disposition = format!("attachment; filename=\"{}\"", attachment.name);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or(HeaderValue::from_static("attachment")),
    );
    Ok((headers, attachment.data.clone()))
}

/// `DELETE /attachments/{id}?path=…` – remove a node attachment.
pub async fn delete_attachment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(attachment_id): Path<String>,
    Query(query): Query<AttachmentQuery>,
) -> ApiResult<StatusCode> {
    let node_id = state.resolve_path(&query.path).await?;
    let user_id = user.user_id;

    state
        .queue
        .submit("delete_attachment", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.delete_attachment(&attachment_id, &user_id)?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(StatusCode::OK)
}

/// `POST /events/{event_id}/entries/{entry_index}/attachments` –
/// multipart upload bound to one entry of an event.
pub async fn add_entry_attachment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((event_id, entry_index)): Path<(String, usize)>,
    multipart: Multipart,
) -> ApiResult<Json<AttachmentView>> {
    let form = read_upload_form(multipart).await?;
    let node_id = state.resolve_path(&form.path).await?;

    let attachment =
        state
            .attachments
            .store(form.content, &form.filename, &form.mime_type, &user.user_id)?;
    let view = AttachmentView::from(&attachment);
    let user_id = user.user_id;

    state
        .queue
        .submit("add_entry_attachment", move |engine: Engine| async move {
            {
                let mut forest = engine.forest.write().await;
                let node = forest
                    .node_mut(&node_id)
                    .ok_or_else(|| ForestError::NotFound(format!("node not found: {node_id}")))?;
                node.add_entry_attachment(&event_id, entry_index, attachment, &user_id)?;
            }
            engine.persist().await?;
            Ok::<(), ForestError>(())
        })
        .await??;

    Ok(Json(view))
}
