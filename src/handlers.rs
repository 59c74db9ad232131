use axum::{
    extract::{rejection::FormRejection, Form, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use std::sync::Arc;
use tracing::{error, info};

use crate::components::google_calendar::auth::{authorize, CredentialProvider};
use crate::components::google_calendar::client::CalendarApi;
use crate::components::google_calendar::models::{EventForm, NewEvent};
use crate::config::Config;
use crate::error::AppResult;

/// Body returned when the event was inserted
pub const SUCCESS_MESSAGE: &str = "Event created successfully!";
/// Body returned for every failure
pub const FAILURE_MESSAGE: &str = "Error creating event";

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Supplies OAuth clients, from disk or through consent
    pub credentials: Arc<dyn CredentialProvider>,
    /// Remote calendar the events go to
    pub calendar: Arc<dyn CalendarApi>,
}

/// Handler for the form page
pub async fn index_handler() -> impl IntoResponse {
    Html(include_str!("../assets/form.html"))
}

/// Handler for form submissions
pub async fn create_event_handler(
    State(state): State<AppState>,
    form: Result<Form<EventForm>, FormRejection>,
) -> impl IntoResponse {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            error!("Unreadable form submission: {}", rejection);
            return (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE);
        }
    };

    match create_event(&state, form).await {
        Ok(()) => (StatusCode::OK, SUCCESS_MESSAGE),
        Err(e) => {
            error!("{:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE)
        }
    }
}

async fn create_event(state: &AppState, form: EventForm) -> AppResult<()> {
    let event = NewEvent::from_form(form, &state.config.timezone, &state.config.utc_offset);
    info!("Creating event '{}' at {}", event.summary, event.start.date_time);

    let auth = authorize(state.credentials.as_ref()).await?;
    state.calendar.insert_event(&auth, &event).await?;

    Ok(())
}

// Handler for API health check
pub async fn health_handler() -> &'static str {
    "OK"
}
