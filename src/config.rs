use crate::error::{config_error, env_error, AppResult};
use chrono::FixedOffset;
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Google's OAuth2 consent page
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Google Calendar v3 API root
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
/// Full read/write access to the user's calendars
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Default location of the optional TOML config file
const DEFAULT_CONFIG_FILE: &str = "config/calform.toml";

/// Main configuration structure, built once at process start
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub bind_address: String,
    /// Port the HTTP listener binds to
    pub port: u16,
    /// Google "client secret" JSON downloaded from the cloud console
    pub credentials_path: PathBuf,
    /// Where the authorized user's refresh token is persisted
    pub token_path: PathBuf,
    /// OAuth scopes requested during consent
    pub scopes: Vec<String>,
    /// Calendar that receives new events
    pub calendar_id: String,
    /// IANA time zone attached to submitted event times
    pub timezone: String,
    /// Offset appended to the form's local times, e.g. `+09:00`
    pub utc_offset: String,
    /// Loopback port that receives the consent redirect
    pub consent_port: u16,
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            calendar_id: "primary".to_string(),
            timezone: "Asia/Tokyo".to_string(),
            utc_offset: "+09:00".to_string(),
            consent_port: 8080,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

/// Overrides read from the TOML config file; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind_address: Option<String>,
    port: Option<u16>,
    credentials_path: Option<PathBuf>,
    token_path: Option<PathBuf>,
    scopes: Option<Vec<String>>,
    calendar_id: Option<String>,
    timezone: Option<String>,
    utc_offset: Option<String>,
    consent_port: Option<u16>,
    auth_url: Option<String>,
    token_url: Option<String>,
    api_base_url: Option<String>,
}

impl Config {
    /// Load configuration from defaults, the optional config file and the environment
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let mut config = Config::default();

        let config_file = env::var("CALFORM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        if let Ok(content) = fs::read_to_string(&config_file) {
            config.merge_toml(&content)?;
        }

        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Merge overrides from a TOML document
    pub fn merge_toml(&mut self, content: &str) -> AppResult<()> {
        let file: FileConfig = toml::from_str(content)?;

        if let Some(v) = file.bind_address { self.bind_address = v; }
        if let Some(v) = file.port { self.port = v; }
        if let Some(v) = file.credentials_path { self.credentials_path = v; }
        if let Some(v) = file.token_path { self.token_path = v; }
        if let Some(v) = file.scopes { self.scopes = v; }
        if let Some(v) = file.calendar_id { self.calendar_id = v; }
        if let Some(v) = file.timezone { self.timezone = v; }
        if let Some(v) = file.utc_offset { self.utc_offset = v; }
        if let Some(v) = file.consent_port { self.consent_port = v; }
        if let Some(v) = file.auth_url { self.auth_url = v; }
        if let Some(v) = file.token_url { self.token_url = v; }
        if let Some(v) = file.api_base_url { self.api_base_url = v; }

        Ok(())
    }

    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(v) = env::var("BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.port = v.parse::<u16>().map_err(|_| env_error("PORT"))?;
        }
        if let Ok(v) = env::var("GOOGLE_CREDENTIALS_PATH") {
            self.credentials_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("GOOGLE_TOKEN_PATH") {
            self.token_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("GOOGLE_SCOPES") {
            self.scopes = v.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(v) = env::var("GOOGLE_CALENDAR_ID") {
            self.calendar_id = v;
        }
        if let Ok(v) = env::var("TIMEZONE") {
            self.timezone = v;
        }
        if let Ok(v) = env::var("UTC_OFFSET") {
            self.utc_offset = v;
        }
        if let Ok(v) = env::var("CONSENT_PORT") {
            self.consent_port = v.parse::<u16>().map_err(|_| env_error("CONSENT_PORT"))?;
        }
        if let Ok(v) = env::var("GOOGLE_AUTH_URL") {
            self.auth_url = v;
        }
        if let Ok(v) = env::var("GOOGLE_TOKEN_URL") {
            self.token_url = v;
        }
        if let Ok(v) = env::var("GOOGLE_API_BASE_URL") {
            self.api_base_url = v;
        }

        Ok(())
    }

    /// Reject settings that would only fail later, at request time
    pub fn validate(&self) -> AppResult<()> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown time zone: {}", self.timezone)))?;

        self.utc_offset
            .parse::<FixedOffset>()
            .map_err(|_| config_error(&format!("Invalid UTC offset: {}", self.utc_offset)))?;

        if self.scopes.is_empty() {
            return Err(config_error("At least one OAuth scope is required"));
        }

        Ok(())
    }

    /// Socket address string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Redirect URI registered for the loopback consent callback
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.consent_port)
    }
}
