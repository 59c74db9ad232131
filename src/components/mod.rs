// Export components
pub mod google_calendar;

// Re-export the pieces the web layer wires together
pub use google_calendar::{CalendarApi, CredentialProvider};
