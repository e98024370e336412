//! JSON endpoints used by the page scripts.

use axum::{
    extract::{Path, State},
    Json,
};
use docdesk_common::Notification;
use docdesk_documents::ServiceStatus;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct Dismissed {
    pub id: u64,
    pub dismissed: bool,
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub document_service: ServiceStatus,
    pub signed_in: bool,
}

pub async fn list_notifications(State(state): State<SharedState>) -> Json<Vec<Notification>> {
    Json(state.notifications.snapshot())
}

pub async fn dismiss_notification(State(state): State<SharedState>, Path(id): Path<u64>) -> Json<Dismissed> {
    Json(Dismissed { id, dismissed: state.notifications.dismiss(id) })
}

pub async fn healthz(State(state): State<SharedState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        document_service: state.dashboard.service_status(),
        signed_in: state.session.is_authenticated().await,
    })
}
