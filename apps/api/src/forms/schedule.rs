//! Where a form sits in its publishing window. Nothing here is stored: the
//! phase is derived from the clock on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::form::{FormStatus, PublishedForm};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    Scheduled,
    Live,
    Closed,
}

pub fn phase_at(form: &PublishedForm, now: DateTime<Utc>) -> FormPhase {
    if now < form.open_at {
        FormPhase::Scheduled
    } else if now > form.close_at {
        FormPhase::Closed
    } else {
        FormPhase::Live
    }
}

/// Live means `open_at <= now <= close_at`. Status plays no part.
pub fn is_live(form: &PublishedForm, now: DateTime<Utc>) -> bool {
    phase_at(form, now) == FormPhase::Live
}

pub fn is_closed(form: &PublishedForm, now: DateTime<Utc>) -> bool {
    phase_at(form, now) == FormPhase::Closed
}

/// Visible in the public listing and open for new submissions.
pub fn accepts_submissions(form: &PublishedForm, now: DateTime<Utc>) -> bool {
    form.status == FormStatus::Published && is_live(form, now)
}

pub fn ensure_accepting(form: &PublishedForm, now: DateTime<Utc>) -> Result<(), AppError> {
    if form.status != FormStatus::Published {
        return Err(AppError::FormNotAccepting(format!(
            "'{}' is not published",
            form.name
        )));
    }
    match phase_at(form, now) {
        FormPhase::Live => Ok(()),
        FormPhase::Scheduled => Err(AppError::FormNotAccepting(format!(
            "Form is scheduled to open at {}",
            form.open_at.to_rfc3339()
        ))),
        FormPhase::Closed => Err(AppError::FormNotAccepting(format!(
            "This form is closed. Window ended {}",
            form.close_at.to_rfc3339()
        ))),
    }
}

pub fn validate_window(open_at: DateTime<Utc>, close_at: DateTime<Utc>) -> Result<(), AppError> {
    if close_at <= open_at {
        return Err(AppError::InvalidRequest(
            "close_at must be later than open_at".to_string(),
        ));
    }
    Ok(())
}
