//! Decides whether a candidate's answers become a stored submission.
//!
//! Order of checks:
//! 1. the form is published and inside its live window
//! 2. this client holds no reconciled "already submitted" marker
//! 3. every answer has its field's shape and every required field is
//!    answered (all problems reported together)
//! 4. no stored submission shares the applicant key
//!
//! Only a successful write sets the client's marker.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::errors::{AppError, FieldErrors};
use crate::forms::schedule::ensure_accepting;
use crate::models::form::PublishedForm;
use crate::models::submission::{
    applicant_key_from, serialize_answers, Answer, FormSubmission, NewSubmission,
};
use crate::store::kv::ClientStore;
use crate::store::SubmissionRepository;
use crate::submissions::locks;

pub const REQUIRED_MESSAGE: &str = "Required";
pub const WRONG_SHAPE_MESSAGE: &str = "Unexpected answer format";

/// Collects one error per field: a wrongly shaped answer, or a required
/// field left empty.
pub fn validate_answers(
    form: &PublishedForm,
    answers: &BTreeMap<String, Answer>,
) -> Result<(), AppError> {
    let errors: FieldErrors = form
        .fields
        .iter()
        .filter_map(|field| {
            let message = match answers.get(&field.id) {
                Some(answer) if !answer.fits(field.field_type) => WRONG_SHAPE_MESSAGE,
                Some(answer) if field.required && answer.is_missing_for(field) => REQUIRED_MESSAGE,
                None if field.required => REQUIRED_MESSAGE,
                _ => return None,
            };
            Some((field.id.clone(), message.to_string()))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// The trimmed, lower-cased answer to the form's email question, if any.
pub fn derive_applicant_key(
    form: &PublishedForm,
    answers: &BTreeMap<String, Answer>,
) -> Option<String> {
    let email_field = form.email_field()?;
    answers
        .get(&email_field.id)
        .and_then(Answer::as_text)
        .and_then(applicant_key_from)
}

pub async fn submit(
    form: &PublishedForm,
    answers: BTreeMap<String, Answer>,
    submissions: &dyn SubmissionRepository,
    client: &ClientStore,
    now: DateTime<Utc>,
) -> Result<FormSubmission, AppError> {
    ensure_accepting(form, now)?;

    let email_field_id = form.email_field().map(|f| f.id.clone());
    let duplicate = || AppError::DuplicateApplication {
        field_id: email_field_id.clone(),
    };

    if locks::reconcile(client, submissions, form.id).await? {
        return Err(duplicate());
    }

    validate_answers(form, &answers)?;

    let applicant_key = derive_applicant_key(form, &answers);
    if let Some(key) = &applicant_key {
        if submissions.find_by_applicant(form.id, key).await?.is_some() {
            info!("Rejected duplicate application to form {} from {key}", form.id);
            return Err(duplicate());
        }
    }

    let submission = submissions
        .insert(NewSubmission {
            form_id: form.id,
            values: serialize_answers(&form.fields, &answers),
            applicant_key,
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent submission from the same applicant.
            AppError::DuplicateApplication { .. } => duplicate(),
            e => {
                warn!("Failed to store submission for form {}: {e}", form.id);
                e
            }
        })?;

    locks::mark_submitted(client, &submission).await?;
    info!("Accepted submission {} for form {}", submission.id, form.id);
    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::testing::{email_field, field, new_form};
    use crate::models::form::{FieldType, FormStatus, FormPatch};
    use crate::store::kv::MemoryKvStore;
    use crate::store::memory::MemoryStore;
    use crate::store::FormRepository;
    use chrono::Duration;
    use std::sync::Arc;

    fn client(name: &str) -> ClientStore {
        ClientStore::new(Arc::new(MemoryKvStore::default()), name)
    }

    fn answers(pairs: &[(&str, Answer)]) -> BTreeMap<String, Answer> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(value: &str) -> Answer {
        Answer::Text(value.to_string())
    }

    async fn email_form(store: &MemoryStore) -> PublishedForm {
        store
            .create(new_form("f1", vec![email_field(true)]))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_same_email_twice_is_a_duplicate() {
        let store = MemoryStore::new();
        let form = email_form(&store).await;
        let now = Utc::now();

        let first = submit(&form, answers(&[("email", text("a@x.com"))]), &store, &client("one"), now)
            .await
            .unwrap();
        assert_eq!(first.applicant_key.as_deref(), Some("a@x.com"));
        assert_eq!(store.list(Some(form.id)).await.unwrap().len(), 1);

        // A different browser, same applicant, different casing and padding.
        let second = submit(&form, answers(&[("email", text("A@X.com "))]), &store, &client("two"), now).await;
        match second {
            Err(AppError::DuplicateApplication { field_id }) => {
                assert_eq!(field_id.as_deref(), Some("email"))
            }
            other => panic!("expected duplicate, got {other:?}"),
        }

        let empty = submit(&form, answers(&[("email", text(""))]), &store, &client("three"), now).await;
        match empty {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("email").map(String::as_str), Some(REQUIRED_MESSAGE))
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        assert_eq!(store.list(Some(form.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_marker_blocks_same_client_until_submission_is_deleted() {
        let store = MemoryStore::new();
        let form = email_form(&store).await;
        let browser = client("browser");
        let now = Utc::now();

        let first = submit(&form, answers(&[("email", text("a@x.com"))]), &store, &browser, now)
            .await
            .unwrap();

        let again = submit(&form, answers(&[("email", text("b@x.com"))]), &store, &browser, now).await;
        assert!(matches!(again, Err(AppError::DuplicateApplication { .. })));

        crate::store::SubmissionRepository::delete(&store, first.id)
            .await
            .unwrap();

        submit(&form, answers(&[("email", text("a@x.com"))]), &store, &browser, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_optional_empty_field_is_accepted() {
        let store = MemoryStore::new();
        let form = store
            .create(new_form("notes", vec![field("notes", FieldType::ShortText, false)]))
            .await
            .unwrap();

        let submission = submit(&form, answers(&[("notes", text(""))]), &store, &client("c"), Utc::now())
            .await
            .unwrap();
        assert_eq!(submission.values.get("notes").map(String::as_str), Some(""));
        assert_eq!(submission.applicant_key, None);
    }

    #[tokio::test]
    async fn test_all_missing_required_fields_are_reported() {
        let store = MemoryStore::new();
        let mut skills = field("skills", FieldType::Checkboxes, true);
        skills.options = Some(vec!["Rust".to_string()]);
        let form = store
            .create(new_form(
                "multi",
                vec![
                    email_field(true),
                    field("name", FieldType::ShortText, true),
                    skills,
                    field("bio", FieldType::LongText, false),
                ],
            ))
            .await
            .unwrap();

        let result = submit(
            &form,
            answers(&[("skills", Answer::Choices(vec![]))]),
            &store,
            &client("c"),
            Utc::now(),
        )
        .await;

        match result {
            Err(AppError::Validation(errors)) => {
                let ids: Vec<&str> = errors.keys().map(String::as_str).collect();
                assert_eq!(ids, vec!["email", "name", "skills"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_or_unpublished_form_rejects() {
        let store = MemoryStore::new();
        let form = email_form(&store).await;
        let late = form.close_at + Duration::minutes(1);

        let closed = submit(&form, answers(&[("email", text("a@x.com"))]), &store, &client("c"), late).await;
        assert!(matches!(closed, Err(AppError::FormNotAccepting(_))));

        let hidden = store
            .update(form.id, FormPatch::status(FormStatus::Unpublished), None)
            .await
            .unwrap();
        let result = submit(&hidden, answers(&[("email", text("a@x.com"))]), &store, &client("c"), Utc::now()).await;
        assert!(matches!(result, Err(AppError::FormNotAccepting(_))));
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_email_sent_as_list_cannot_dodge_duplicate_check() {
        let store = MemoryStore::new();
        let form = email_form(&store).await;
        let now = Utc::now();

        submit(&form, answers(&[("email", text("a@x.com"))]), &store, &client("one"), now)
            .await
            .unwrap();

        let listed = Answer::Choices(vec!["a@x.com".to_string()]);
        let second = submit(&form, answers(&[("email", listed)]), &store, &client("two"), now).await;
        match second {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("email").map(String::as_str), Some(WRONG_SHAPE_MESSAGE))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.list(Some(form.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_shape_on_optional_fields_is_reported() {
        let store = MemoryStore::new();
        let mut level = field("level", FieldType::MultipleChoiceGrid, false);
        level.rows = Some(vec!["Rust".to_string()]);
        level.columns = Some(vec!["Novice".to_string(), "Expert".to_string()]);
        let mut skills = field("skills", FieldType::Checkboxes, false);
        skills.options = Some(vec!["Rust".to_string()]);
        let form = store
            .create(new_form("shapes", vec![level, skills, field("bio", FieldType::LongText, false)]))
            .await
            .unwrap();

        let result = submit(
            &form,
            answers(&[
                ("level", text("Expert")),
                ("skills", text("Rust")),
                ("bio", text("Hello")),
            ]),
            &store,
            &client("c"),
            Utc::now(),
        )
        .await;

        match result {
            Err(AppError::Validation(errors)) => {
                let ids: Vec<&str> = errors.keys().map(String::as_str).collect();
                assert_eq!(ids, vec!["level", "skills"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_write_sets_no_marker() {
        let store = MemoryStore::new();
        let form = email_form(&store).await;
        let browser = client("browser");
        // The record disappears between load and submit.
        FormRepository::delete(&store, form.id).await.unwrap();

        let result = submit(&form, answers(&[("email", text("a@x.com"))]), &store, &browser, Utc::now()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(!locks::reconcile(&browser, &store, form.id).await.unwrap());
    }
}
