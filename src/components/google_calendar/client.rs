use super::models::{CreatedEvent, NewEvent};
use super::token::OAuthClient;
use crate::config::Config;
use crate::error::{google_calendar_error, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};
use url::Url;

/// The one remote operation the form needs
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn insert_event(&self, auth: &OAuthClient, event: &NewEvent) -> AppResult<CreatedEvent>;
}

/// Google Calendar v3 over plain HTTPS
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    api_base_url: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
        }
    }

    fn events_url(&self) -> AppResult<Url> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| google_calendar_error("API base URL cannot have path segments"))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);

        Ok(url)
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn insert_event(&self, auth: &OAuthClient, event: &NewEvent) -> AppResult<CreatedEvent> {
        let access_token = auth.bearer_token().await?;
        let url = self.events_url()?;

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                error!("There was an error contacting the Calendar service: {}", e);
                google_calendar_error(&format!("Failed to insert event: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("Calendar service rejected the event: HTTP {} - {}", status, error_body);
            return Err(google_calendar_error(&format!(
                "Failed to insert event: HTTP {} - {}",
                status, error_body
            )));
        }

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse insert response: {}", e)))?;

        info!(
            "Event created: {}",
            created.html_link.as_deref().unwrap_or("(no link)")
        );
        Ok(created)
    }
}
