//! Dashboard page, uploads and queries.

use axum::{
    extract::{Multipart, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use docdesk_common::Route;
use docdesk_documents::{FileStatus, FileUpload, UploadPolicy};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::WebError;
use crate::state::{AppEvent, SharedState};
use crate::templates::{DashboardView, FileView, FilesView, ResultView};

/// Multipart field the upload form puts its files under.
pub const FILES_FIELD: &str = "files";

#[derive(Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub message: String,
}

pub async fn dashboard_page(State(state): State<SharedState>) -> Result<Response, WebError> {
    // The guard admitted us, but the session may have ended since.
    let Some(identity) = state.session.identity().await else {
        return Ok(Redirect::to(Route::Login.path()).into_response());
    };
    let notifications = state.notifications.snapshot();
    let draft = state.dashboard.draft();

    let page = state.templates.render(
        "dashboard.html",
        DashboardView {
            identity: &identity,
            user_label: identity.label(),
            files: state.dashboard.files().into_iter().map(FileView::from).collect(),
            results: state.dashboard.results().into_iter().map(ResultView::from).collect(),
            draft: &draft,
            service_status: state.dashboard.service_status(),
            accept: state.dashboard.policy().allowed_mime_types.join(","),
            notifications: &notifications,
        },
    )?;
    Ok(page.into_response())
}

pub async fn files_fragment(State(state): State<SharedState>) -> Result<Html<String>, WebError> {
    let files = state.dashboard.files().into_iter().map(FileView::from).collect();
    Ok(state.templates.render("files.html", FilesView { files })?)
}

/// Accepts the picked files, records them as processing and returns at once;
/// the sends continue in the background and settle through SSE.
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Redirect, WebError> {
    let files = read_files(&mut multipart, state.dashboard.policy()).await?;
    debug!(count = files.len(), "upload received");

    let staged = state.dashboard.stage_uploads(files);
    if !staged.is_empty() {
        let state = state.clone();
        tokio::spawn(async move {
            let settled = state.dashboard.complete_uploads(staged).await;
            let failed = settled.iter().filter(|f| f.status == FileStatus::Error).count();
            info!(completed = settled.len() - failed, failed, "upload batch settled");
            let _ = state.event_tx.send(AppEvent::FilesSettled {
                completed: settled.len() - failed,
                failed,
            });
        });
    }

    Ok(Redirect::to("/dashboard"))
}

/// Streams every file part. A file is held in memory only while it fits the
/// policy's allowance; past that it is read to the end and kept as
/// [`FileUpload::unbuffered`], so the policy can still name it.
async fn read_files(multipart: &mut Multipart, policy: &UploadPolicy) -> Result<Vec<FileUpload>, WebError> {
    let mut files = Vec::new();
    let mut buffered = 0u64;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        let allowance = if policy.accepts_type(&mime) { policy.buffer_allowance(buffered) } else { 0 };

        let mut bytes = Vec::new();
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            if size <= allowance {
                bytes.extend_from_slice(&chunk);
            } else if !bytes.is_empty() {
                bytes = Vec::new();
            }
        }

        // An empty file input still submits one nameless part.
        if name.is_empty() && size == 0 {
            continue;
        }
        if size <= allowance {
            buffered += size;
            files.push(FileUpload::new(name, mime, bytes));
        } else {
            debug!(%name, size, allowance, "file not held in memory");
            files.push(FileUpload::unbuffered(name, mime, size));
        }
    }
    Ok(files)
}

pub async fn query_submit(State(state): State<SharedState>, Form(form): Form<QueryForm>) -> Redirect {
    // Outcomes are reported as notifications; the page shows the new state.
    let _ = state.dashboard.submit_query(&form.message).await;
    Redirect::to("/dashboard")
}

pub async fn remove_file(State(state): State<SharedState>, Path(id): Path<Uuid>) -> Redirect {
    if !state.dashboard.remove_file(id) {
        debug!(%id, "remove requested for unknown file");
    }
    Redirect::to("/dashboard")
}
