use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::forms::schedule::{accepts_submissions, phase_at, FormPhase};
use crate::models::form::{FormStatus, PublishedForm};
use crate::models::submission::{Answer, FormSubmission};
use crate::state::AppState;
use crate::store::form_not_found;
use crate::store::kv::ClientStore;
use crate::submissions::export::{to_csv, to_pdf_table, to_spreadsheet};
use crate::submissions::stats::{load_stats, AdminStats};
use crate::submissions::{gate, locks};

#[derive(Serialize)]
pub struct PublicFormSummary {
    #[serde(flatten)]
    pub form: PublishedForm,
    /// This client already has a stored submission for the form.
    pub locked: bool,
}

#[derive(Serialize)]
pub struct PublicFormResponse {
    pub form: PublishedForm,
    pub phase: FormPhase,
    pub locked: bool,
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub answers: BTreeMap<String, Answer>,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct SubmissionFilter {
    pub form_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct SubmissionEdit {
    pub values: BTreeMap<String, Answer>,
}

/// GET /api/v1/public/forms
pub async fn handle_list_public_forms(
    State(state): State<AppState>,
    client: ClientStore,
) -> Result<Json<Vec<PublicFormSummary>>, AppError> {
    let now = Utc::now();
    let mut listing = Vec::new();
    for form in state.forms.list_published().await? {
        if !accepts_submissions(&form, now) {
            continue;
        }
        let locked = locks::reconcile(&client, state.submissions.as_ref(), form.id).await?;
        listing.push(PublicFormSummary { form, locked });
    }
    Ok(Json(listing))
}

/// GET /api/v1/public/forms/:slug
pub async fn handle_get_public_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    client: ClientStore,
) -> Result<Json<PublicFormResponse>, AppError> {
    let form = state.forms.get_by_slug(&slug).await?;
    if form.status != FormStatus::Published {
        return Err(form_not_found(&slug));
    }
    let locked = locks::reconcile(&client, state.submissions.as_ref(), form.id).await?;
    Ok(Json(PublicFormResponse {
        phase: phase_at(&form, Utc::now()),
        form,
        locked,
    }))
}

/// POST /api/v1/public/forms/:slug/submissions
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    client: ClientStore,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let form = state.forms.get_by_slug(&slug).await?;
    let submission = gate::submit(
        &form,
        req.answers,
        state.submissions.as_ref(),
        &client,
        Utc::now(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            id: submission.id,
            submitted_at: submission.submitted_at,
        }),
    ))
}

/// GET /api/v1/admin/submissions
pub async fn handle_list_submissions(
    State(state): State<AppState>,
    Query(filter): Query<SubmissionFilter>,
) -> Result<Json<Vec<FormSubmission>>, AppError> {
    Ok(Json(state.submissions.list(filter.form_id).await?))
}

/// PATCH /api/v1/admin/submissions/:id
pub async fn handle_edit_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmissionEdit>,
) -> Result<Json<FormSubmission>, AppError> {
    let values = req
        .values
        .iter()
        .map(|(field_id, answer)| (field_id.clone(), answer.to_stored()))
        .collect();
    Ok(Json(state.submissions.update_values(id, values).await?))
}

/// DELETE /api/v1/admin/submissions/:id
pub async fn handle_delete_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.submissions.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_source(
    state: &AppState,
    form_id: Uuid,
) -> Result<(PublishedForm, Vec<FormSubmission>), AppError> {
    let form = state.forms.get(form_id).await?;
    let submissions = state.submissions.list(Some(form_id)).await?;
    Ok((form, submissions))
}

/// GET /api/v1/admin/forms/:id/export/csv
pub async fn handle_export_csv(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (form, submissions) = export_source(&state, id).await?;
    let Some(export) = to_csv(&form, &submissions)? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.content,
    )
        .into_response())
}

/// GET /api/v1/admin/forms/:id/export/spreadsheet
pub async fn handle_export_spreadsheet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (form, submissions) = export_source(&state, id).await?;
    Ok(match to_spreadsheet(&form, &submissions) {
        Some(export) => Json(export).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// GET /api/v1/admin/forms/:id/export/pdf
pub async fn handle_export_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (form, submissions) = export_source(&state, id).await?;
    Ok(match to_pdf_table(&form, &submissions) {
        Some(table) => Json(table).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// GET /api/v1/admin/stats
pub async fn handle_stats(State(state): State<AppState>) -> Result<Json<AdminStats>, AppError> {
    let stats = load_stats(state.forms.as_ref(), state.submissions.as_ref(), Utc::now()).await?;
    Ok(Json(stats))
}
