use serde::{Deserialize, Serialize};

/// Fields posted by the event form
///
/// Missing fields deserialize to empty strings; the remote API decides what is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventForm {
    #[serde(default)]
    pub summary: String,
    /// Local time without seconds or offset, e.g. `2024-05-01T10:00`
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

/// Start or end of an event as Google expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

/// Event payload sent to the insert endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

impl NewEvent {
    /// Build the payload from form fields, appending `:00<offset>` to both times
    pub fn from_form(form: EventForm, timezone: &str, utc_offset: &str) -> Self {
        let stamp = |local: &str| EventDateTime {
            date_time: format!("{}:00{}", local, utc_offset),
            time_zone: timezone.to_string(),
        };

        Self {
            start: stamp(&form.start_time),
            end: stamp(&form.end_time),
            summary: form.summary,
        }
    }
}

/// The parts of Google's insert response we read
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    #[serde(default)]
    pub id: String,
    pub html_link: Option<String>,
    pub status: Option<String>,
}
