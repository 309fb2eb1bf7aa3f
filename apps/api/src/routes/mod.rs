pub mod health;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

const SESSION: &str = "/api/v1/sessions/:instrument/:subject";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            SESSION,
            post(sessions::handle_open)
                .get(sessions::handle_snapshot)
                .delete(sessions::handle_close),
        )
        .route(
            &format!("{SESSION}/question"),
            get(sessions::handle_current_question),
        )
        .route(&format!("{SESSION}/answer"), post(sessions::handle_answer))
        .route(&format!("{SESSION}/next"), post(sessions::handle_next))
        .route(&format!("{SESSION}/previous"), post(sessions::handle_previous))
        .route(
            &format!("{SESSION}/gates/:gate"),
            get(sessions::handle_get_questionnaire).post(sessions::handle_complete_gate),
        )
        .route(&format!("{SESSION}/restart"), post(sessions::handle_restart))
        .route(&format!("{SESSION}/refresh"), post(sessions::handle_refresh))
        .with_state(state)
}
