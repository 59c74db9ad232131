use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use calform::components::google_calendar::models::{CreatedEvent, NewEvent};
use calform::components::google_calendar::token::{AuthorizedUser, OAuthClient, AUTHORIZED_USER};
use calform::components::{CalendarApi, CredentialProvider};
use calform::config::Config;
use calform::error::{authorization_error, google_calendar_error, AppResult};
use calform::handlers::{AppState, FAILURE_MESSAGE, SUCCESS_MESSAGE};
use calform::startup::build_router;
use http_body_util::BodyExt;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn test_user() -> AuthorizedUser {
    AuthorizedUser {
        kind: AUTHORIZED_USER.to_string(),
        client_id: "test_client_id".to_string(),
        client_secret: "test_client_secret".to_string(),
        refresh_token: "test_refresh_token".to_string(),
    }
}

/// Credential provider with a fixed outcome
struct MockCredentials {
    /// Whether a valid token file "exists"
    saved: bool,
    /// Whether a consent path is available (false = headless)
    interactive: bool,
}

#[async_trait]
impl CredentialProvider for MockCredentials {
    async fn load_existing(&self) -> Option<OAuthClient> {
        self.saved
            .then(|| OAuthClient::new(test_user(), "http://127.0.0.1:9/token"))
    }

    async fn obtain_interactively(&self) -> AppResult<OAuthClient> {
        if self.interactive {
            Ok(OAuthClient::new(test_user(), "http://127.0.0.1:9/token"))
        } else {
            Err(authorization_error("no browser available"))
        }
    }
}

/// Calendar that records what it was asked to insert
#[derive(Default)]
struct MockCalendar {
    fail: bool,
    inserted: Mutex<Vec<NewEvent>>,
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn insert_event(&self, _auth: &OAuthClient, event: &NewEvent) -> AppResult<CreatedEvent> {
        if self.fail {
            return Err(google_calendar_error("HTTP 400 Bad Request - Invalid start time"));
        }
        self.inserted.lock().unwrap().push(event.clone());
        Ok(CreatedEvent {
            id: "event1".to_string(),
            html_link: Some("https://www.google.com/calendar/event?eid=event1".to_string()),
            status: Some("confirmed".to_string()),
        })
    }
}

fn state(credentials: MockCredentials, calendar: Arc<MockCalendar>) -> AppState {
    AppState {
        config: Arc::new(Config::default()),
        credentials: Arc::new(credentials),
        calendar,
    }
}

fn form_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/create-event")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const STANDUP_FORM: &str =
    "summary=Standup&start_time=2024-05-01T09%3A00&end_time=2024-05-01T09%3A30";

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_index_serves_form() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(state(MockCredentials { saved: true, interactive: false }, calendar));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let html = body_text(response).await;
    assert!(html.contains("action=\"/create-event\""));
    assert!(html.contains("name=\"start_time\""));
}

#[tokio::test]
async fn test_create_event_with_saved_token() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(state(
        MockCredentials { saved: true, interactive: false },
        Arc::clone(&calendar),
    ));

    let response = app.oneshot(form_request(STANDUP_FORM)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, SUCCESS_MESSAGE);

    let inserted = calendar.inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].summary, "Standup");
    assert_eq!(inserted[0].start.date_time, "2024-05-01T09:00:00+09:00");
    assert_eq!(inserted[0].end.date_time, "2024-05-01T09:30:00+09:00");
    assert_eq!(inserted[0].start.time_zone, "Asia/Tokyo");
    assert_eq!(inserted[0].end.time_zone, "Asia/Tokyo");
}

#[tokio::test]
async fn test_create_event_after_interactive_consent() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(state(
        MockCredentials { saved: false, interactive: true },
        Arc::clone(&calendar),
    ));

    let response = app.oneshot(form_request(STANDUP_FORM)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calendar.inserted.lock().unwrap().len(), 1);
}

/// Insertion failures must reach the browser as a failure, not a false success
#[tokio::test]
async fn test_insertion_failure_returns_500() {
    let calendar = Arc::new(MockCalendar { fail: true, ..Default::default() });
    let app = build_router(state(MockCredentials { saved: true, interactive: false }, calendar));

    let response = app.oneshot(form_request(STANDUP_FORM)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_headless_without_token_returns_500() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(state(
        MockCredentials { saved: false, interactive: false },
        Arc::clone(&calendar),
    ));

    let response = app.oneshot(form_request(STANDUP_FORM)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, FAILURE_MESSAGE);
    assert!(calendar.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_form_body_returns_500() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(state(
        MockCredentials { saved: true, interactive: false },
        Arc::clone(&calendar),
    ));

    let request = Request::builder()
        .method("POST")
        .uri("/create-event")
        .header("content-type", "text/plain")
        .body(Body::from(STANDUP_FORM))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, FAILURE_MESSAGE);
    assert!(calendar.inserted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_fields_are_forwarded_unvalidated() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(state(
        MockCredentials { saved: true, interactive: false },
        Arc::clone(&calendar),
    ));

    let response = app.oneshot(form_request("summary=Lunch")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let inserted = calendar.inserted.lock().unwrap();
    assert_eq!(inserted[0].summary, "Lunch");
    assert_eq!(inserted[0].start.date_time, ":00+09:00");
}

#[tokio::test]
async fn test_configured_offset_and_timezone_are_used() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(AppState {
        config: Arc::new(Config {
            timezone: "Europe/Helsinki".to_string(),
            utc_offset: "+03:00".to_string(),
            ..Config::default()
        }),
        credentials: Arc::new(MockCredentials { saved: true, interactive: false }),
        calendar: Arc::clone(&calendar) as Arc<dyn CalendarApi>,
    });

    let response = app.oneshot(form_request(STANDUP_FORM)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let inserted = calendar.inserted.lock().unwrap();
    assert_eq!(inserted[0].start.date_time, "2024-05-01T09:00:00+03:00");
    assert_eq!(inserted[0].start.time_zone, "Europe/Helsinki");
}

#[tokio::test]
async fn test_health() {
    let calendar = Arc::new(MockCalendar::default());
    let app = build_router(state(MockCredentials { saved: true, interactive: false }, calendar));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}
