//! HTML rendering.
//!
//! Templates are compiled into the binary and rendered with minijinja;
//! every `.html` template auto-escapes, so file names, answers and emails
//! coming from users or the document service are safe to interpolate.

use axum::response::Html;
use docdesk_common::{Identity, Notification};
use docdesk_documents::{FileStatus, QueryResult, ServiceStatus, UploadedFile};
use minijinja::Environment;
use serde::Serialize;
use uuid::Uuid;

const SOURCES: [(&str, &str); 5] = [
    ("base.html", include_str!("../templates/base.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("files.html", include_str!("../templates/files.html")),
    ("results.html", include_str!("../templates/results.html")),
];

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in SOURCES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<Html<String>, minijinja::Error> {
        let html = self.env.get_template(name)?.render(ctx)?;
        Ok(Html(html))
    }
}

// ── View models ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginView<'a> {
    pub email: &'a str,
    pub password_sign_in: bool,
    pub google_client_id: Option<&'a str>,
    pub google_scope: &'a str,
    pub notifications: &'a [Notification],
}

#[derive(Debug, Serialize)]
pub struct DashboardView<'a> {
    pub identity: &'a Identity,
    pub user_label: &'a str,
    pub files: Vec<FileView>,
    pub results: Vec<ResultView>,
    pub draft: &'a str,
    pub service_status: ServiceStatus,
    pub accept: String,
    pub notifications: &'a [Notification],
}

#[derive(Debug, Serialize)]
pub struct FilesView {
    pub files: Vec<FileView>,
}

#[derive(Debug, Serialize)]
pub struct FileView {
    pub id: Uuid,
    pub name: String,
    pub size: String,
    pub uploaded_at: String,
    pub status: FileStatus,
    pub error_message: Option<String>,
}

impl From<UploadedFile> for FileView {
    fn from(file: UploadedFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            size: format_size(file.size),
            uploaded_at: file.uploaded_at.format("%Y-%m-%d %H:%M").to_string(),
            status: file.status,
            error_message: file.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub relevance: u32,
    pub date: String,
}

impl From<QueryResult> for ResultView {
    fn from(result: QueryResult) -> Self {
        Self {
            id: result.id,
            title: result.title,
            excerpt: result.excerpt,
            relevance: (result.relevance * 100.0).round() as u32,
            date: result.date.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// `1.5 MB` style size label.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdesk_common::Severity;
    use serde_json::json;

    #[test]
    fn all_templates_compile() {
        let templates = Templates::new().unwrap();
        for (name, _) in SOURCES {
            assert!(templates.env.get_template(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn size_labels() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn user_text_is_escaped() {
        let templates = Templates::new().unwrap();
        let html = templates
            .render(
                "files.html",
                json!({
                    "files": [{
                        "id": Uuid::nil(),
                        "name": "<script>alert(1)</script>.pdf",
                        "size": "1 B",
                        "uploaded_at": "2024-01-01 00:00",
                        "status": "processing",
                        "error_message": null,
                    }]
                }),
            )
            .unwrap();
        assert!(!html.0.contains("<script>alert"));
        assert!(html.0.contains("&lt;script&gt;"));
    }

    #[test]
    fn login_lists_pending_notifications() {
        let templates = Templates::new().unwrap();
        let notifications = vec![Notification {
            id: 7,
            message: "Unauthorized email address".into(),
            severity: Severity::Error,
        }];
        let html = templates
            .render(
                "login.html",
                LoginView {
                    email: "someone@example.com",
                    password_sign_in: true,
                    google_client_id: None,
                    google_scope: "email",
                    notifications: &notifications,
                },
            )
            .unwrap()
            .0;
        assert!(html.contains("Unauthorized email address"));
        assert!(html.contains(r#"data-id="7""#));
        assert!(html.contains(r#"value="someone@example.com""#));
        assert!(!html.contains("Continue with Google"));
    }
}
