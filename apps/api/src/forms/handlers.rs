use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::forms::draft::{self, Direction, DraftDetails};
use crate::forms::publish::{publish, PublishRequest, PublishResponse};
use crate::forms::schedule::{is_closed, is_live};
use crate::forms::templates::{templates, FieldTemplate};
use crate::models::form::{DraftForm, FieldPatch, FieldType, FormPatch, PublishedForm};
use crate::routes::client::NamedClient;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddFieldRequest {
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Deserialize)]
pub struct MoveFieldRequest {
    pub direction: Direction,
}

#[derive(Deserialize)]
pub struct FormEdit {
    /// When present, the edit only applies to this version of the record.
    pub expected_version: Option<i32>,
    #[serde(flatten)]
    pub patch: FormPatch,
}

/// A form record with its window state as of the request.
#[derive(Serialize)]
pub struct AdminFormSummary {
    #[serde(flatten)]
    pub form: PublishedForm,
    pub live: bool,
    pub closed: bool,
}

/// GET /api/v1/templates
pub async fn handle_list_templates() -> Json<Vec<FieldTemplate>> {
    Json(templates())
}

/// GET /api/v1/draft
pub async fn handle_get_draft(
    NamedClient(client): NamedClient,
) -> Result<Json<DraftForm>, AppError> {
    Ok(Json(draft::load(&client).await?))
}

/// PUT /api/v1/draft
pub async fn handle_update_draft(
    NamedClient(client): NamedClient,
    Json(details): Json<DraftDetails>,
) -> Result<Json<DraftForm>, AppError> {
    let mut current = draft::load(&client).await?;
    current.update_details(details);
    draft::save(&client, &current).await?;
    Ok(Json(current))
}

/// DELETE /api/v1/draft
pub async fn handle_reset_draft(
    NamedClient(client): NamedClient,
) -> Result<Json<DraftForm>, AppError> {
    draft::reset(&client).await?;
    Ok(Json(draft::load(&client).await?))
}

/// POST /api/v1/draft/fields
pub async fn handle_add_field(
    NamedClient(client): NamedClient,
    Json(req): Json<AddFieldRequest>,
) -> Result<(StatusCode, Json<DraftForm>), AppError> {
    let mut current = draft::load(&client).await?;
    current.add_field(req.field_type)?;
    draft::save(&client, &current).await?;
    Ok((StatusCode::CREATED, Json(current)))
}

/// PATCH /api/v1/draft/fields/:id
pub async fn handle_update_field(
    NamedClient(client): NamedClient,
    Path(field_id): Path<String>,
    Json(patch): Json<FieldPatch>,
) -> Result<Json<DraftForm>, AppError> {
    let mut current = draft::load(&client).await?;
    current.update_field(&field_id, patch)?;
    draft::save(&client, &current).await?;
    Ok(Json(current))
}

/// DELETE /api/v1/draft/fields/:id
pub async fn handle_remove_field(
    NamedClient(client): NamedClient,
    Path(field_id): Path<String>,
) -> Result<Json<DraftForm>, AppError> {
    let mut current = draft::load(&client).await?;
    current.remove_field(&field_id)?;
    draft::save(&client, &current).await?;
    Ok(Json(current))
}

/// POST /api/v1/draft/fields/:index/move
pub async fn handle_move_field(
    NamedClient(client): NamedClient,
    Path(index): Path<usize>,
    Json(req): Json<MoveFieldRequest>,
) -> Result<Json<DraftForm>, AppError> {
    let mut current = draft::load(&client).await?;
    if current.move_field(index, req.direction) {
        draft::save(&client, &current).await?;
    }
    Ok(Json(current))
}

/// POST /api/v1/draft/publish
pub async fn handle_publish(
    State(state): State<AppState>,
    NamedClient(client): NamedClient,
    Json(req): Json<PublishRequest>,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    let response = publish(
        state.forms.as_ref(),
        &client,
        req,
        &state.config.public_base_url,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/admin/forms
pub async fn handle_list_forms(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminFormSummary>>, AppError> {
    let now = Utc::now();
    let forms = state
        .forms
        .list_all()
        .await?
        .into_iter()
        .map(|form| AdminFormSummary {
            live: is_live(&form, now),
            closed: is_closed(&form, now),
            form,
        })
        .collect();
    Ok(Json(forms))
}

/// PATCH /api/v1/admin/forms/:id
pub async fn handle_edit_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edit): Json<FormEdit>,
) -> Result<Json<PublishedForm>, AppError> {
    let form = state
        .forms
        .update(id, edit.patch, edit.expected_version)
        .await?;
    info!("Form {id} updated to version {}", form.version);
    Ok(Json(form))
}

/// DELETE /api/v1/admin/forms/:id
pub async fn handle_delete_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.forms.delete(id).await?;
    info!("Deleted form {id} and its submissions");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/forms/:id/toggle-status
pub async fn handle_toggle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublishedForm>, AppError> {
    let current = state.forms.get(id).await?;
    let next = current.status.toggled();
    let form = state
        .forms
        .update(id, FormPatch::status(next), Some(current.version))
        .await?;
    info!("Form {id} is now {}", next.as_str());
    Ok(Json(form))
}
