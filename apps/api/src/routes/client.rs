use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::state::AppState;
use crate::store::kv::{ClientStore, ANONYMOUS_CLIENT};

/// Identifies the browser or device a request comes from. Drafts, last-used
/// copy and submission markers are kept per client.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

const MAX_CLIENT_ID_LEN: usize = 128;

fn parse_client_id(raw: Option<&str>) -> Result<String, AppError> {
    let id = raw.map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Ok(ANONYMOUS_CLIENT.to_string());
    }
    let valid = id.len() <= MAX_CLIENT_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::InvalidRequest(format!(
            "{CLIENT_ID_HEADER} must be at most {MAX_CLIENT_ID_LEN} letters, digits, '-' or '_'"
        )));
    }
    Ok(id.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for ClientStore {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = match parts.headers.get(CLIENT_ID_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| {
                AppError::InvalidRequest(format!("{CLIENT_ID_HEADER} is not valid ASCII"))
            })?),
            None => None,
        };
        let client_id = parse_client_id(raw)?;
        Ok(ClientStore::new(state.kv.clone(), client_id))
    }
}

/// A `ClientStore` for a request that named its client. Used where state must
/// not leak between callers, such as the builder draft.
pub struct NamedClient(pub ClientStore);

#[async_trait]
impl FromRequestParts<AppState> for NamedClient {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let client = ClientStore::from_request_parts(parts, state).await?;
        if client.is_anonymous() {
            return Err(AppError::InvalidRequest(format!(
                "{CLIENT_ID_HEADER} header is required"
            )));
        }
        Ok(NamedClient(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header_is_anonymous() {
        assert_eq!(parse_client_id(None).unwrap(), ANONYMOUS_CLIENT);
        assert_eq!(parse_client_id(Some("  ")).unwrap(), ANONYMOUS_CLIENT);
    }

    #[test]
    fn test_client_id_is_trimmed() {
        assert_eq!(parse_client_id(Some(" browser-42 ")).unwrap(), "browser-42");
    }

    #[test]
    fn test_key_separator_is_rejected() {
        assert!(matches!(
            parse_client_id(Some("a:b")),
            Err(AppError::InvalidRequest(_))
        ));
    }
}
