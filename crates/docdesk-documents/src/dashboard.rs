//! Upload and query orchestration behind the dashboard page.
//!
//! Uploads happen in two phases. [`Dashboard::stage_uploads`] validates the
//! picked files and records the accepted ones as `Processing`; the web layer
//! renders that immediately. [`Dashboard::complete_uploads`] then sends the
//! files concurrently and settles each record on its own, so one failure
//! never touches another file's status.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use docdesk_common::{DocdeskError, Result};
use docdesk_notify::NotificationStore;
use futures_util::future::join_all;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{FileStatus, FileUpload, QueryResult, ServiceStatus, UploadedFile};
use crate::policy::UploadPolicy;
use crate::response::extract_excerpt;
use crate::service::DocumentService;

const OFFLINE_UPLOAD: &str = "Cannot upload files while service is offline";
const OFFLINE_QUERY: &str = "Cannot query while service is offline";
const EMPTY_QUERY: &str = "Please enter a query";

/// An accepted file waiting to be sent.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub id: Uuid,
    pub file: FileUpload,
}

#[derive(Debug, Default)]
struct Board {
    files: Vec<UploadedFile>,
    /// Newest first.
    results: Vec<QueryResult>,
    draft: String,
    status: ServiceStatus,
}

pub struct Dashboard {
    service: Arc<dyn DocumentService>,
    notifications: NotificationStore,
    policy: UploadPolicy,
    board: Mutex<Board>,
}

impl Dashboard {
    pub fn new(service: Arc<dyn DocumentService>, notifications: NotificationStore, policy: UploadPolicy) -> Self {
        Self { service, notifications, policy, board: Mutex::new(Board::default()) }
    }

    fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    // ── uploads ──────────────────────────────────────────────────────────

    /// Validate `files` and record the accepted ones as `Processing`.
    ///
    /// Each rejected file raises its own error notification and is never sent.
    pub fn stage_uploads(&self, files: Vec<FileUpload>) -> Vec<StagedUpload> {
        if !self.service_status().is_online() {
            self.notifications.error(OFFLINE_UPLOAD);
            return Vec::new();
        }

        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            if let Err(e) = self.policy.check(&file) {
                info!(name = %file.name, reason = %e, "upload rejected");
                self.notifications.error(e.to_string());
                continue;
            }
            let id = Uuid::new_v4();
            self.board().files.push(UploadedFile {
                id,
                name: file.name.clone(),
                size: file.size(),
                uploaded_at: Utc::now(),
                status: FileStatus::Processing,
                error_message: None,
            });
            staged.push(StagedUpload { id, file });
        }
        staged
    }

    /// Send every staged file concurrently and settle each record.
    #[instrument(skip_all, fields(count = staged.len()))]
    pub async fn complete_uploads(&self, staged: Vec<StagedUpload>) -> Vec<UploadedFile> {
        let settled = join_all(staged.into_iter().map(|s| self.complete_one(s))).await;
        settled.into_iter().flatten().collect()
    }

    /// Stage and send in one step.
    pub async fn upload_files(&self, files: Vec<FileUpload>) -> Vec<UploadedFile> {
        let staged = self.stage_uploads(files);
        self.complete_uploads(staged).await
    }

    async fn complete_one(&self, staged: StagedUpload) -> Option<UploadedFile> {
        let StagedUpload { id, file } = staged;
        match self.service.upload(&file).await {
            Ok(()) => {
                self.notifications.success(format!("Successfully uploaded {}", file.name));
                self.settle(id, FileStatus::Completed, None)
            }
            Err(e) => {
                warn!(name = %file.name, error = %e, "upload failed");
                let reason = e.to_string();
                self.notifications.error(format!("Failed to upload {}: {}", file.name, reason));
                self.settle(id, FileStatus::Error, Some(reason))
            }
        }
    }

    /// Returns the settled record, or `None` if it was removed meanwhile.
    fn settle(&self, id: Uuid, status: FileStatus, error_message: Option<String>) -> Option<UploadedFile> {
        let mut board = self.board();
        let entry = board.files.iter_mut().find(|f| f.id == id)?;
        entry.status = status;
        entry.error_message = error_message;
        Some(entry.clone())
    }

    /// Forget a file record. Nothing is sent to the service.
    pub fn remove_file(&self, id: Uuid) -> bool {
        let mut board = self.board();
        let before = board.files.len();
        board.files.retain(|f| f.id != id);
        board.files.len() != before
    }

    pub fn files(&self) -> Vec<UploadedFile> {
        self.board().files.clone()
    }

    // ── queries ──────────────────────────────────────────────────────────

    /// Ask the service `text` and record the answer at the top of the results.
    ///
    /// On failure the error is both notified and returned, the results are
    /// left as they were and the draft keeps the submitted text.
    #[instrument(skip(self, text))]
    pub async fn submit_query(&self, text: &str) -> Result<QueryResult> {
        self.board().draft = text.to_string();

        let question = text.trim();
        if question.is_empty() {
            self.notifications.error(EMPTY_QUERY);
            return Err(DocdeskError::ValidationRejected(EMPTY_QUERY.to_string()));
        }
        if !self.service_status().is_online() {
            self.notifications.error(OFFLINE_QUERY);
            return Err(DocdeskError::NetworkFailure(OFFLINE_QUERY.to_string()));
        }

        let excerpt = match self.ask(question).await {
            Ok(excerpt) => excerpt,
            Err(e) => {
                warn!(error = %e, "query failed");
                self.notifications.error(e.to_string());
                return Err(e);
            }
        };

        let result = QueryResult {
            id: Uuid::new_v4(),
            title: question.to_string(),
            excerpt,
            relevance: 1.0,
            date: Utc::now(),
        };
        {
            let mut board = self.board();
            board.results.insert(0, result.clone());
            board.draft.clear();
        }
        self.notifications.success("Query completed successfully");
        Ok(result)
    }

    async fn ask(&self, question: &str) -> Result<String> {
        let body = self.service.query(question).await?;
        extract_excerpt(&body)
    }

    pub fn results(&self) -> Vec<QueryResult> {
        self.board().results.clone()
    }

    /// Text left in the query box.
    pub fn draft(&self) -> String {
        self.board().draft.clone()
    }

    // ── service status ───────────────────────────────────────────────────

    pub fn service_status(&self) -> ServiceStatus {
        self.board().status
    }

    pub fn set_service_status(&self, status: ServiceStatus) {
        self.board().status = status;
    }

    /// Probe the service and record the outcome. Errors count as offline.
    pub async fn refresh_service_status(&self) -> ServiceStatus {
        self.set_service_status(ServiceStatus::Checking);
        let status = match self.service.health().await {
            Ok(true) => ServiceStatus::Online,
            Ok(false) => ServiceStatus::Offline,
            Err(e) => {
                warn!(error = %e, "health probe failed");
                ServiceStatus::Offline
            }
        };
        self.set_service_status(status);
        status
    }

    /// Drop files, results and draft. Used on sign-out.
    pub fn reset(&self) {
        let mut board = self.board();
        board.files.clear();
        board.results.clear();
        board.draft.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use docdesk_common::Severity;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;

    const MIB: usize = 1024 * 1024;

    #[derive(Default)]
    struct FakeService {
        uploads: AtomicUsize,
        queries: AtomicUsize,
        /// Upload outcome per file name; missing names succeed.
        upload_errors: HashMap<String, DocdeskError>,
        query_reply: Mutex<Option<Result<String>>>,
        gate: Option<Arc<Notify>>,
        healthy: Option<bool>,
    }

    impl FakeService {
        fn replying(body: &str) -> Self {
            Self { query_reply: Mutex::new(Some(Ok(body.to_string()))), ..Self::default() }
        }

        fn failing_query(err: DocdeskError) -> Self {
            Self { query_reply: Mutex::new(Some(Err(err))), ..Self::default() }
        }
    }

    fn clone_err(e: &DocdeskError) -> DocdeskError {
        match e {
            DocdeskError::NetworkFailure(m) => DocdeskError::NetworkFailure(m.clone()),
            DocdeskError::MalformedResponse(m) => DocdeskError::MalformedResponse(m.clone()),
            other => DocdeskError::NetworkFailure(other.to_string()),
        }
    }

    #[async_trait]
    impl DocumentService for FakeService {
        async fn upload(&self, file: &FileUpload) -> Result<()> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.upload_errors.get(&file.name) {
                Some(e) => Err(clone_err(e)),
                None => Ok(()),
            }
        }

        async fn query(&self, _message: &str) -> Result<String> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            match &*self.query_reply.lock().unwrap() {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(e)) => Err(clone_err(e)),
                None => Ok(r#"{"result":"ok"}"#.to_string()),
            }
        }

        async fn health(&self) -> Result<bool> {
            match self.healthy {
                Some(h) => Ok(h),
                None => Err(DocdeskError::NetworkFailure("connection refused".into())),
            }
        }
    }

    fn dashboard(service: FakeService) -> (Arc<FakeService>, Dashboard, NotificationStore) {
        let service = Arc::new(service);
        let notifications = NotificationStore::default();
        let dash = Dashboard::new(service.clone(), notifications.clone(), UploadPolicy::default());
        (service, dash, notifications)
    }

    fn pdf(name: &str, size: usize) -> FileUpload {
        FileUpload::new(name, "application/pdf", vec![b'%'; size])
    }

    fn messages(store: &NotificationStore) -> Vec<(String, Severity)> {
        store.snapshot().into_iter().map(|n| (n.message, n.severity)).collect()
    }

    #[tokio::test]
    async fn unsupported_type_is_never_sent() {
        let (service, dash, notes) = dashboard(FakeService::default());

        let settled = dash.upload_files(vec![FileUpload::new("cat.png", "image/png", vec![1; 64])]).await;

        assert!(settled.is_empty());
        assert!(dash.files().is_empty());
        assert_eq!(service.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(messages(&notes), vec![("File type not supported: cat.png".to_string(), Severity::Error)]);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_with_size_message() {
        let (service, dash, notes) = dashboard(FakeService::default());

        dash.upload_files(vec![pdf("huge.pdf", 11 * MIB)]).await;

        assert_eq!(service.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(messages(&notes), vec![("File too large: huge.pdf (max 10MB)".to_string(), Severity::Error)]);
    }

    #[tokio::test]
    async fn accepted_file_is_processing_until_the_service_answers() {
        let gate = Arc::new(Notify::new());
        let (_service, dash, notes) = dashboard(FakeService { gate: Some(gate.clone()), ..FakeService::default() });
        let dash = Arc::new(dash);

        let staged = dash.stage_uploads(vec![pdf("report.pdf", 5 * MIB)]);
        assert_eq!(staged.len(), 1);
        assert_eq!(dash.files()[0].status, FileStatus::Processing);
        assert_eq!(dash.files()[0].size, (5 * MIB) as u64);

        let worker = {
            let dash = dash.clone();
            tokio::spawn(async move { dash.complete_uploads(staged).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(dash.files()[0].status, FileStatus::Processing);

        gate.notify_one();
        let settled = worker.await.unwrap();
        assert_eq!(settled[0].status, FileStatus::Completed);
        assert_eq!(dash.files()[0].status, FileStatus::Completed);
        assert_eq!(messages(&notes), vec![("Successfully uploaded report.pdf".to_string(), Severity::Success)]);
    }

    #[tokio::test]
    async fn one_failure_does_not_touch_other_files() {
        let mut errors = HashMap::new();
        errors.insert("second.pdf".to_string(), DocdeskError::NetworkFailure("Server responded with 500".into()));
        let (service, dash, notes) = dashboard(FakeService { upload_errors: errors, ..FakeService::default() });

        dash.upload_files(vec![pdf("first.pdf", 10), pdf("second.pdf", 10)]).await;

        assert_eq!(service.uploads.load(Ordering::SeqCst), 2);
        let files = dash.files();
        assert_eq!(files[0].name, "first.pdf");
        assert_eq!(files[0].status, FileStatus::Completed);
        assert_eq!(files[0].error_message, None);
        assert_eq!(files[1].status, FileStatus::Error);
        assert_eq!(files[1].error_message.as_deref(), Some("Server responded with 500"));

        let notes = messages(&notes);
        assert!(notes.contains(&("Successfully uploaded first.pdf".to_string(), Severity::Success)));
        assert!(notes.contains(&(
            "Failed to upload second.pdf: Server responded with 500".to_string(),
            Severity::Error
        )));
    }

    #[tokio::test]
    async fn mixed_batch_sends_only_accepted_files() {
        let (service, dash, notes) = dashboard(FakeService::default());

        dash.upload_files(vec![
            pdf("ok.pdf", 10),
            FileUpload::new("sheet.xlsx", "application/vnd.ms-excel", vec![0; 10]),
            FileUpload::new("notes.txt", "text/plain", b"hello".to_vec()),
        ])
        .await;

        assert_eq!(service.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(dash.files().len(), 2);
        assert_eq!(notes.len(), 3);
    }

    #[tokio::test]
    async fn removed_file_stays_removed_after_settling() {
        let gate = Arc::new(Notify::new());
        let (_service, dash, _notes) = dashboard(FakeService { gate: Some(gate.clone()), ..FakeService::default() });

        let staged = dash.stage_uploads(vec![pdf("gone.pdf", 10)]);
        assert!(dash.remove_file(staged[0].id));
        assert!(!dash.remove_file(staged[0].id));

        gate.notify_one();
        let settled = dash.complete_uploads(staged).await;
        assert!(settled.is_empty());
        assert!(dash.files().is_empty());
    }

    #[tokio::test]
    async fn query_records_result_and_clears_draft() {
        let (_service, dash, notes) = dashboard(FakeService::replying(r#"{"result":"ok"}"#));

        let result = dash.submit_query("  status report ").await.unwrap();

        assert_eq!(result.title, "status report");
        assert_eq!(result.excerpt, "ok");
        assert_eq!(result.relevance, 1.0);
        assert_eq!(dash.results(), vec![result]);
        assert_eq!(dash.draft(), "");
        assert_eq!(messages(&notes), vec![("Query completed successfully".to_string(), Severity::Success)]);
    }

    #[tokio::test]
    async fn empty_array_reply_yields_placeholder_excerpt() {
        let (_service, dash, _notes) = dashboard(FakeService::replying("[]"));
        let result = dash.submit_query("status report").await.unwrap();
        assert_eq!(result.excerpt, "No results found");
    }

    #[tokio::test]
    async fn newest_result_comes_first() {
        let (_service, dash, _notes) = dashboard(FakeService::default());
        dash.submit_query("first").await.unwrap();
        dash.submit_query("second").await.unwrap();

        let titles: Vec<_> = dash.results().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn blank_query_is_refused_locally() {
        let (service, dash, notes) = dashboard(FakeService::default());

        let err = dash.submit_query("   ").await.unwrap_err();

        assert!(matches!(err, DocdeskError::ValidationRejected(_)));
        assert_eq!(service.queries.load(Ordering::SeqCst), 0);
        assert_eq!(messages(&notes), vec![("Please enter a query".to_string(), Severity::Error)]);
    }

    #[tokio::test]
    async fn failures_keep_results_and_draft() {
        let cases = [
            (FakeService::failing_query(DocdeskError::NetworkFailure("Query failed".into())), "Query failed"),
            (FakeService::replying(""), "Empty response from server"),
            (FakeService::replying("not json"), "Invalid response format from server"),
        ];
        for (service, expected) in cases {
            let (_service, dash, notes) = dashboard(service);

            let err = dash.submit_query("what changed?").await.unwrap_err();

            assert_eq!(err.to_string(), expected);
            assert!(dash.results().is_empty());
            assert_eq!(dash.draft(), "what changed?");
            assert_eq!(messages(&notes), vec![(expected.to_string(), Severity::Error)]);
        }
    }

    #[tokio::test]
    async fn offline_service_refuses_work() {
        let (service, dash, notes) = dashboard(FakeService { healthy: Some(false), ..FakeService::default() });
        assert_eq!(dash.refresh_service_status().await, ServiceStatus::Offline);

        assert!(dash.stage_uploads(vec![pdf("a.pdf", 10)]).is_empty());
        assert!(dash.submit_query("anything").await.is_err());

        assert_eq!(service.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(service.queries.load(Ordering::SeqCst), 0);
        assert_eq!(
            messages(&notes),
            vec![
                ("Cannot upload files while service is offline".to_string(), Severity::Error),
                ("Cannot query while service is offline".to_string(), Severity::Error),
            ]
        );
    }

    #[tokio::test]
    async fn failed_probe_counts_as_offline() {
        let (_service, dash, _notes) = dashboard(FakeService::default());
        assert_eq!(dash.service_status(), ServiceStatus::Online);
        assert_eq!(dash.refresh_service_status().await, ServiceStatus::Offline);

        let (_service, dash, _notes) = dashboard(FakeService { healthy: Some(true), ..FakeService::default() });
        assert_eq!(dash.refresh_service_status().await, ServiceStatus::Online);
    }

    #[tokio::test]
    async fn reset_clears_everything_but_status() {
        let (_service, dash, _notes) = dashboard(FakeService::default());
        dash.upload_files(vec![pdf("a.pdf", 10)]).await;
        dash.submit_query("q").await.unwrap();
        dash.board().draft = "half typed".into();

        dash.reset();

        assert!(dash.files().is_empty());
        assert!(dash.results().is_empty());
        assert_eq!(dash.draft(), "");
        assert_eq!(dash.service_status(), ServiceStatus::Online);
    }
}
