pub mod auth;
pub mod client;
pub mod consent;
pub mod models;
pub mod token;

pub use auth::{authorize, AuthState, CredentialProvider, FileCredentialProvider};
pub use client::{CalendarApi, GoogleCalendarClient};
pub use models::{CreatedEvent, EventDateTime, EventForm, NewEvent};
pub use token::{OAuthClient, TokenStore};
