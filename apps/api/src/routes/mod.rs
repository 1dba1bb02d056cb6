pub mod auth;
pub mod client;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::forms::handlers as forms;
use crate::state::AppState;
use crate::submissions::handlers as submissions;
use crate::uploads;

/// Multipart framing on top of the largest accepted file.
const UPLOAD_BODY_LIMIT: usize = uploads::MAX_UPLOAD_BYTES + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/forms", get(forms::handle_list_forms))
        .route(
            "/forms/:id",
            patch(forms::handle_edit_form).delete(forms::handle_delete_form),
        )
        .route("/forms/:id/toggle-status", post(forms::handle_toggle_status))
        .route("/forms/:id/export/csv", get(submissions::handle_export_csv))
        .route(
            "/forms/:id/export/spreadsheet",
            get(submissions::handle_export_spreadsheet),
        )
        .route("/forms/:id/export/pdf", get(submissions::handle_export_pdf))
        .route("/submissions", get(submissions::handle_list_submissions))
        .route(
            "/submissions/:id",
            patch(submissions::handle_edit_submission).delete(submissions::handle_delete_submission),
        )
        .route("/stats", get(submissions::handle_stats))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/templates", get(forms::handle_list_templates))
        // Builder (per client)
        .route(
            "/api/v1/draft",
            get(forms::handle_get_draft)
                .put(forms::handle_update_draft)
                .delete(forms::handle_reset_draft),
        )
        .route("/api/v1/draft/fields", post(forms::handle_add_field))
        .route(
            "/api/v1/draft/fields/:id",
            patch(forms::handle_update_field).delete(forms::handle_remove_field),
        )
        .route("/api/v1/draft/fields/:index/move", post(forms::handle_move_field))
        .route("/api/v1/draft/publish", post(forms::handle_publish))
        // Candidates
        .route("/api/v1/public/forms", get(submissions::handle_list_public_forms))
        .route("/api/v1/public/forms/:slug", get(submissions::handle_get_public_form))
        .route(
            "/api/v1/public/forms/:slug/submissions",
            post(submissions::handle_submit),
        )
        .route(
            "/api/v1/uploads",
            post(uploads::handle_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .nest("/api/v1/admin", admin)
        .with_state(state)
}
