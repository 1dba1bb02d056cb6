// Form builder and the published form records it produces.

pub mod draft;
pub mod handlers;
pub mod publish;
pub mod schedule;
pub mod slug;
pub mod templates;

use crate::errors::AppError;
use crate::models::form::PublishedForm;

/// Invariants every stored form record must satisfy.
pub fn validate_record(form: &PublishedForm) -> Result<(), AppError> {
    schedule::validate_window(form.open_at, form.close_at)?;
    publish::validate_fields(&form.fields)
}
