use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::forms::schedule::is_live;
use crate::models::form::{FormStatus, PublishedForm};
use crate::models::submission::FormSubmission;
use crate::store::{FormRepository, SubmissionRepository};

/// Counts shown on the admin home page.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AdminStats {
    pub total_forms: usize,
    pub published_forms: usize,
    /// Published and inside their window right now.
    pub live_forms: usize,
    pub total_submissions: usize,
    /// Submitted within the last 24 hours.
    pub recent_submissions: usize,
}

pub fn compute_stats(
    forms: &[PublishedForm],
    submissions: &[FormSubmission],
    now: DateTime<Utc>,
) -> AdminStats {
    let published: Vec<&PublishedForm> = forms
        .iter()
        .filter(|f| f.status == FormStatus::Published)
        .collect();
    let since = now - Duration::hours(24);

    AdminStats {
        total_forms: forms.len(),
        published_forms: published.len(),
        live_forms: published.iter().filter(|f| is_live(f, now)).count(),
        total_submissions: submissions.len(),
        recent_submissions: submissions
            .iter()
            .filter(|s| s.submitted_at >= since)
            .count(),
    }
}

pub async fn load_stats(
    forms: &dyn FormRepository,
    submissions: &dyn SubmissionRepository,
    now: DateTime<Utc>,
) -> Result<AdminStats, AppError> {
    let all_forms = forms.list_all().await?;
    let all_submissions = submissions.list(None).await?;
    Ok(compute_stats(&all_forms, &all_submissions, now))
}
