use serde::Deserialize;
use tracing::warn;

use crate::errors::AppError;
use crate::forms::templates::{instantiate, template_for};
use crate::models::form::{
    DraftForm, FieldPatch, FieldType, FormField, FormTheme, DEFAULT_DRAFT_DESCRIPTION,
    DEFAULT_DRAFT_TITLE,
};
use crate::store::kv::{ClientStore, DRAFT_KEY, LAST_DESCRIPTION_KEY, LAST_TITLE_KEY};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Title, description and theme edits. Only supplied keys change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub theme: Option<FormTheme>,
}

impl DraftForm {
    pub fn add_field(&mut self, field_type: FieldType) -> Result<&FormField, AppError> {
        let template = template_for(field_type).ok_or_else(|| {
            AppError::InvalidRequest(format!("No template for field type {field_type:?}"))
        })?;
        self.fields.push(instantiate(&template));
        Ok(&self.fields[self.fields.len() - 1])
    }

    pub fn update_field(&mut self, id: &str, patch: FieldPatch) -> Result<&FormField, AppError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Field {id} not found in draft")))?;
        patch.apply_to(field);
        Ok(&*field)
    }

    pub fn remove_field(&mut self, id: &str) -> Result<(), AppError> {
        let before = self.fields.len();
        self.fields.retain(|f| f.id != id);
        if self.fields.len() == before {
            return Err(AppError::NotFound(format!("Field {id} not found in draft")));
        }
        Ok(())
    }

    /// Swaps the field at `index` with its neighbour. Moving past either end
    /// does nothing and returns `false`.
    pub fn move_field(&mut self, index: usize, direction: Direction) -> bool {
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => index.checked_add(1),
        };
        match target {
            Some(target) if index < self.fields.len() && target < self.fields.len() => {
                self.fields.swap(index, target);
                true
            }
            _ => false,
        }
    }

    pub fn update_details(&mut self, details: DraftDetails) {
        if let Some(title) = details.title {
            self.title = title;
        }
        if let Some(description) = details.description {
            self.description = description;
        }
        if details.theme.is_some() {
            self.theme = details.theme;
        }
    }
}

/// The client's persisted draft, or a fresh one seeded with the copy of the
/// last form they published.
pub async fn load(store: &ClientStore) -> Result<DraftForm, AppError> {
    if let Some(raw) = store.get(DRAFT_KEY).await? {
        match serde_json::from_str::<DraftForm>(&raw) {
            Ok(draft) => return Ok(draft),
            Err(e) => warn!(
                "Discarding unreadable draft for client {}: {e}",
                store.client_id()
            ),
        }
    }

    let title = store.get(LAST_TITLE_KEY).await?;
    let description = store.get(LAST_DESCRIPTION_KEY).await?;
    Ok(DraftForm {
        title: title.unwrap_or_else(|| DEFAULT_DRAFT_TITLE.to_string()),
        description: description.unwrap_or_else(|| DEFAULT_DRAFT_DESCRIPTION.to_string()),
        ..DraftForm::default()
    })
}

pub async fn save(store: &ClientStore, draft: &DraftForm) -> Result<(), AppError> {
    let raw = serde_json::to_string(draft).map_err(|e| AppError::Internal(e.into()))?;
    store.set(DRAFT_KEY, &raw).await
}

pub async fn reset(store: &ClientStore) -> Result<(), AppError> {
    store.delete(DRAFT_KEY).await
}

/// Keeps the published draft's copy as the default for the next one.
pub async fn remember_last_used(store: &ClientStore, draft: &DraftForm) -> Result<(), AppError> {
    store.set(LAST_TITLE_KEY, &draft.title).await?;
    store.set(LAST_DESCRIPTION_KEY, &draft.description).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::MemoryKvStore;
    use std::sync::Arc;

    fn client() -> ClientStore {
        ClientStore::new(Arc::new(MemoryKvStore::default()), "operator")
    }

    fn draft_with(types: &[FieldType]) -> DraftForm {
        let mut draft = DraftForm::default();
        for t in types {
            draft.add_field(*t).unwrap();
        }
        draft
    }

    #[tokio::test]
    async fn test_load_without_anything_persisted_gives_defaults() {
        let draft = load(&client()).await.unwrap();
        assert_eq!(draft, DraftForm::default());
    }

    #[tokio::test]
    async fn test_saved_draft_round_trips() {
        let store = client();
        let mut draft = draft_with(&[FieldType::Email, FieldType::Dropdown]);
        draft.title = "Design intern".to_string();
        save(&store, &draft).await.unwrap();

        assert_eq!(load(&store).await.unwrap(), draft);
    }

    #[tokio::test]
    async fn test_reset_falls_back_to_last_used_copy() {
        let store = client();
        let mut draft = draft_with(&[FieldType::ShortText]);
        draft.title = "Marketing intern".to_string();
        draft.description = "Summer 2025 cohort".to_string();
        save(&store, &draft).await.unwrap();

        remember_last_used(&store, &draft).await.unwrap();
        reset(&store).await.unwrap();

        let next = load(&store).await.unwrap();
        assert_eq!(next.title, "Marketing intern");
        assert_eq!(next.description, "Summer 2025 cohort");
        assert!(next.fields.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_draft_is_treated_as_missing() {
        let store = client();
        store.set(DRAFT_KEY, "{not json").await.unwrap();
        assert_eq!(load(&store).await.unwrap(), DraftForm::default());
    }

    #[test]
    fn test_move_field_swaps_neighbours() {
        let mut draft = draft_with(&[FieldType::ShortText, FieldType::Email, FieldType::Date]);
        let ids: Vec<String> = draft.fields.iter().map(|f| f.id.clone()).collect();

        assert!(draft.move_field(2, Direction::Up));
        let moved: Vec<&str> = draft.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(moved, vec![ids[0].as_str(), ids[2].as_str(), ids[1].as_str()]);
    }

    #[test]
    fn test_move_past_either_end_is_a_no_op() {
        let mut draft = draft_with(&[FieldType::ShortText, FieldType::Email]);
        let before = draft.clone();

        assert!(!draft.move_field(0, Direction::Up));
        assert!(!draft.move_field(1, Direction::Down));
        assert!(!draft.move_field(7, Direction::Up));
        assert_eq!(draft, before);
    }

    #[test]
    fn test_update_and_remove_field() {
        let mut draft = draft_with(&[FieldType::Dropdown]);
        let id = draft.fields[0].id.clone();

        draft
            .update_field(
                &id,
                FieldPatch {
                    label: Some("Preferred team".to_string()),
                    required: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(draft.fields[0].label, "Preferred team");
        assert!(draft.fields[0].required);
        assert!(draft.fields[0].options.is_some());

        draft.remove_field(&id).unwrap();
        assert!(draft.fields.is_empty());
        assert!(matches!(draft.remove_field(&id), Err(AppError::NotFound(_))));
    }
}
