use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AppError, FieldErrors};
use crate::forms::draft;
use crate::forms::schedule::validate_window;
use crate::forms::slug::build_slug;
use crate::models::form::{DraftForm, FormField, JobMetadata, NewForm, PublishedForm};
use crate::store::kv::ClientStore;
use crate::store::FormRepository;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishRequest {
    /// Public name; the draft title is used when absent.
    pub name: Option<String>,
    /// Defaults to now.
    pub open_at: Option<DateTime<Utc>>,
    pub close_at: Option<DateTime<Utc>>,
    /// Alternative to `close_at`: keep the form open this many hours.
    pub open_hours: Option<i64>,
    #[serde(flatten)]
    pub job: JobMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub form: PublishedForm,
    pub share_url: String,
}

/// Resolves the live window of a publish request against `now`.
pub fn resolve_window(
    request: &PublishRequest,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let open_at = request.open_at.unwrap_or(now);
    let close_at = match (request.close_at, request.open_hours) {
        (Some(close_at), _) => close_at,
        (None, Some(hours)) => Duration::try_hours(hours)
            .and_then(|span| open_at.checked_add_signed(span))
            .ok_or_else(|| {
                AppError::InvalidRequest(format!("open_hours {hours} is out of range"))
            })?,
        (None, None) => {
            return Err(AppError::InvalidRequest(
                "Either close_at or open_hours is required".to_string(),
            ))
        }
    };
    validate_window(open_at, close_at)?;
    Ok((open_at, close_at))
}

/// Checks that every question carries what it needs to be answered.
pub fn validate_fields(fields: &[FormField]) -> Result<(), AppError> {
    let problems: FieldErrors = fields
        .iter()
        .filter_map(|f| f.publish_problem().map(|p| (f.id.clone(), p)))
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(problems))
    }
}

pub fn validate_draft(draft: &DraftForm) -> Result<(), AppError> {
    if draft.fields.is_empty() {
        return Err(AppError::InvalidRequest(
            "Add at least one field before publishing".to_string(),
        ));
    }
    validate_fields(&draft.fields)
}

/// Turns the client's draft into a live form record and clears the draft.
pub async fn publish(
    forms: &dyn FormRepository,
    store: &ClientStore,
    request: PublishRequest,
    public_base_url: &str,
    now: DateTime<Utc>,
) -> Result<PublishResponse, AppError> {
    let current = draft::load(store).await?;
    validate_draft(&current)?;
    let (open_at, close_at) = resolve_window(&request, now)?;

    let name = request
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| current.title.clone());

    let form = forms
        .create(NewForm {
            draft: current.clone(),
            slug: build_slug(&name),
            name,
            open_at,
            close_at,
            job: request.job,
        })
        .await?;

    draft::remember_last_used(store, &current).await?;
    draft::reset(store).await?;

    let share_url = format!("{}/form/{}", public_base_url.trim_end_matches('/'), form.slug);
    info!("Published form {} at {share_url}", form.id);
    Ok(PublishResponse { form, share_url })
}
