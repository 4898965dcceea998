use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the spreadsheet service.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("request to the Sheets API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unable to obtain a Google access token: {0}")]
    Auth(#[from] gcp_auth::Error),

    #[error("range '{0}' does not exist")]
    MissingRange(String),
}

/// Problems found while loading the configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required configuration details: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("'{field}' for team '{team}' is not a valid range: '{value}'")]
    InvalidRange {
        team: String,
        field: &'static str,
        value: String,
    },

    #[error("no teams configured")]
    NoTeams,

    #[error("default_team '{0}' is not a configured team")]
    UnknownDefaultTeam(String),

    #[error("unable to set up Google client: {0}")]
    Credentials(#[source] SheetError),

    #[error("unable to access '{field}' for '{team}': {source}")]
    Unreachable {
        team: String,
        field: &'static str,
        #[source]
        source: SheetError,
    },
}
