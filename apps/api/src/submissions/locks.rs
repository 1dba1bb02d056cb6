//! "Already submitted" markers kept per client and per form.
//!
//! A marker is only a hint: it names the submission it stands for and is
//! checked against the submission store whenever the client loads a form.
//! Markers whose submission is gone (deleted by an admin, or removed with its
//! form) are dropped so the applicant can apply again.
//!
//! The anonymous scope is shared, so it never gets a marker; those applicants
//! rely on the store-side applicant key check alone.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::submission::FormSubmission;
use crate::store::kv::{submission_marker_key, ClientStore};
use crate::store::SubmissionRepository;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionMarker {
    pub submission_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_key: Option<String>,
}

pub async fn mark_submitted(
    store: &ClientStore,
    submission: &FormSubmission,
) -> Result<(), AppError> {
    if store.is_anonymous() {
        return Ok(());
    }
    let marker = SubmissionMarker {
        submission_id: submission.id,
        applicant_key: submission.applicant_key.clone(),
    };
    let raw = serde_json::to_string(&marker).map_err(|e| AppError::Internal(e.into()))?;
    store.set(&submission_marker_key(submission.form_id), &raw).await
}

/// Returns whether the client is still locked out of `form_id`, clearing the
/// marker when the store no longer backs it.
pub async fn reconcile(
    store: &ClientStore,
    submissions: &dyn SubmissionRepository,
    form_id: Uuid,
) -> Result<bool, AppError> {
    if store.is_anonymous() {
        return Ok(false);
    }
    let key = submission_marker_key(form_id);
    let Some(raw) = store.get(&key).await? else {
        return Ok(false);
    };

    let marker = match serde_json::from_str::<SubmissionMarker>(&raw) {
        Ok(marker) => marker,
        Err(e) => {
            warn!("Dropping unreadable submission marker for form {form_id}: {e}");
            store.delete(&key).await?;
            return Ok(false);
        }
    };

    let backed = submissions
        .get(marker.submission_id)
        .await?
        .is_some_and(|s| s.form_id == form_id);

    if !backed {
        info!(
            "Releasing stale submission lock on form {form_id} for client {}",
            store.client_id()
        );
        store.delete(&key).await?;
    }
    Ok(backed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::testing::{email_field, new_form};
    use crate::models::submission::NewSubmission;
    use crate::store::kv::{MemoryKvStore, ANONYMOUS_CLIENT};
    use crate::store::memory::MemoryStore;
    use crate::store::FormRepository;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn submitted(store: &MemoryStore, client: &ClientStore) -> FormSubmission {
        let form = store
            .create(new_form("intern", vec![email_field(true)]))
            .await
            .unwrap();
        let submission = store
            .insert(NewSubmission {
                form_id: form.id,
                values: BTreeMap::new(),
                applicant_key: Some("a@x.com".to_string()),
            })
            .await
            .unwrap();
        mark_submitted(client, &submission).await.unwrap();
        submission
    }

    fn client() -> ClientStore {
        ClientStore::new(Arc::new(MemoryKvStore::default()), "candidate")
    }

    #[tokio::test]
    async fn test_backed_marker_keeps_lock() {
        let store = MemoryStore::new();
        let client = client();
        let submission = submitted(&store, &client).await;

        assert!(reconcile(&client, &store, submission.form_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleted_submission_releases_lock() {
        let store = MemoryStore::new();
        let client = client();
        let submission = submitted(&store, &client).await;

        SubmissionRepository::delete(&store, submission.id).await.unwrap();

        assert!(!reconcile(&client, &store, submission.form_id).await.unwrap());
        let key = submission_marker_key(submission.form_id);
        assert_eq!(client.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deleted_form_releases_lock() {
        let store = MemoryStore::new();
        let client = client();
        let submission = submitted(&store, &client).await;

        FormRepository::delete(&store, submission.form_id).await.unwrap();

        assert!(!reconcile(&client, &store, submission.form_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_marker_without_submission_id_is_dropped() {
        let store = MemoryStore::new();
        let client = client();
        let form_id = Uuid::new_v4();
        client.set(&submission_marker_key(form_id), "yes").await.unwrap();

        assert!(!reconcile(&client, &store, form_id).await.unwrap());
        assert_eq!(client.get(&submission_marker_key(form_id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_anonymous_scope_never_holds_a_marker() {
        let store = MemoryStore::new();
        let anonymous = ClientStore::new(Arc::new(MemoryKvStore::default()), ANONYMOUS_CLIENT);
        let submission = submitted(&store, &anonymous).await;

        let key = submission_marker_key(submission.form_id);
        assert_eq!(anonymous.get(&key).await.unwrap(), None);
        assert!(!reconcile(&anonymous, &store, submission.form_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_marker_means_unlocked() {
        let store = MemoryStore::new();
        assert!(!reconcile(&client(), &store, Uuid::new_v4()).await.unwrap());
    }
}
