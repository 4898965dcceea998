use crate::error::{ConfigError, SheetError};
use crate::spreadsheet::{Credentials, SheetRange, SheetSource, SheetsClient};
use log::{error, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const CONFIG_ENV: &str = "ULTITRACKER_CONFIG";

fn default_port() -> u16 {
    8080
}

fn default_service_creds() -> PathBuf {
    PathBuf::from("google-service-account.json")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_player_range() -> String {
    "Settings!A:A".to_string()
}

fn default_task_range() -> String {
    "Settings!B:B".to_string()
}

fn default_stats_range() -> String {
    "Stats!A:E".to_string()
}

/// Contents of the config file.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Service account key used to reach the spreadsheets.
    #[serde(default = "default_service_creds")]
    pub service_creds: PathBuf,

    /// Bearer token used instead of `service_creds` when set.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Team served when the request host does not name one.
    #[serde(default)]
    pub default_team: Option<String>,

    #[serde(default)]
    pub teams: HashMap<String, TeamSettings>,
}

/// One team's section of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamSettings {
    pub name: Option<String>,
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_player_range")]
    pub player_range: String,
    #[serde(default = "default_task_range")]
    pub task_range: String,
    #[serde(default = "default_stats_range")]
    pub stats_range: String,
}

/// A validated team.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamConfig {
    /// Subdomain the team is served on.
    pub key: String,
    /// Display name.
    pub name: String,
    pub spreadsheet_id: String,
    pub player_range: String,
    pub task_range: String,
    pub stats_range: String,
}

impl TeamConfig {
    /// The three ranges the team reads, with their config names.
    pub fn ranges(&self) -> [(&'static str, &str); 3] {
        [
            ("player_range", self.player_range.as_str()),
            ("task_range", self.task_range.as_str()),
            ("stats_range", self.stats_range.as_str()),
        ]
    }
}

impl Config {
    /// Reads and parses a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Resolves the config file location: first CLI argument, then the
    /// `ULTITRACKER_CONFIG` environment variable, then `config.json`.
    pub fn locate(arg: Option<String>) -> PathBuf {
        arg.or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Checks every team has what it needs to start.
    ///
    /// All missing details are logged before the error is returned so the
    /// whole file can be fixed in one go.
    pub fn validate(&self) -> Result<Vec<TeamConfig>, ConfigError> {
        if self.teams.is_empty() {
            return Err(ConfigError::NoTeams);
        }

        let mut missing = Vec::new();
        let mut teams = Vec::new();

        for (key, settings) in &self.teams {
            let key = key.to_lowercase();
            if settings.name.is_none() {
                error!(
                    "Missing required 'name' details in config file for '{}'.",
                    key
                );
                missing.push(format!("{}.name", key));
            }
            if settings.spreadsheet_id.is_none() {
                error!(
                    "Missing required 'spreadsheet_id' details in config file for '{}'. EG: '1Kh7AcFON0ZGHGaeDQpqbLLIndtRrZTdD5XVTv6CTjfI'",
                    key
                );
                missing.push(format!("{}.spreadsheet_id", key));
            }

            if let (Some(name), Some(spreadsheet_id)) = (&settings.name, &settings.spreadsheet_id) {
                let team = TeamConfig {
                    key,
                    name: name.clone(),
                    spreadsheet_id: spreadsheet_id.clone(),
                    player_range: settings.player_range.clone(),
                    task_range: settings.task_range.clone(),
                    stats_range: settings.stats_range.clone(),
                };
                for (field, range) in team.ranges() {
                    if SheetRange::parse(range).is_none() {
                        return Err(ConfigError::InvalidRange {
                            team: team.key.clone(),
                            field,
                            value: range.to_string(),
                        });
                    }
                }
                teams.push(team);
            }
        }

        if !missing.is_empty() {
            missing.sort();
            return Err(ConfigError::Missing(missing));
        }

        if let Some(default_team) = &self.default_team {
            let default_team = default_team.to_lowercase();
            if !teams.iter().any(|t| t.key == default_team) {
                return Err(ConfigError::UnknownDefaultTeam(default_team));
            }
        }

        teams.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(teams)
    }

    /// Builds the spreadsheet client the teams share.
    pub fn sheet_client(&self) -> Result<SheetsClient, ConfigError> {
        match &self.access_token {
            Some(token) => Ok(SheetsClient::new(Credentials::Token(token.clone()))),
            None => SheetsClient::from_service_account(&self.service_creds)
                .map_err(ConfigError::Credentials),
        }
    }
}

/// A team and the sheet its data lives in.
pub struct Team {
    pub config: TeamConfig,
    pub sheet: Arc<dyn SheetSource>,
}

impl Team {
    pub async fn fetch(&self, range: &str) -> Result<Vec<Vec<String>>, SheetError> {
        self.sheet
            .get_values(&self.config.spreadsheet_id, range)
            .await
    }
}

/// Every configured team, built once at startup and read-only afterwards.
pub struct Registry {
    teams: HashMap<String, Team>,
    default_team: Option<String>,
}

impl Registry {
    pub fn new(
        teams: Vec<TeamConfig>,
        sheet: Arc<dyn SheetSource>,
        default_team: Option<String>,
    ) -> Self {
        let teams = teams
            .into_iter()
            .map(|config| {
                (
                    config.key.clone(),
                    Team {
                        config,
                        sheet: Arc::clone(&sheet),
                    },
                )
            })
            .collect();

        Registry {
            teams,
            default_team: default_team.map(|t| t.to_lowercase()),
        }
    }

    /// Looks up a team by key, falling back to the default team.
    pub fn team(&self, key: &str) -> Option<&Team> {
        self.teams.get(&key.to_lowercase()).or_else(|| {
            self.default_team
                .as_ref()
                .and_then(|default| self.teams.get(default))
        })
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.teams.keys().map(String::as_str).collect();
        keys.sort();
        keys
    }

    /// Fetches every range of every team once, so bad permissions or a bad
    /// range stop the server at startup instead of on the first request.
    pub async fn verify(&self) -> Result<(), ConfigError> {
        for key in self.keys() {
            let team = &self.teams[key];
            for (field, range) in team.config.ranges() {
                team.fetch(range)
                    .await
                    .map_err(|source| ConfigError::Unreachable {
                        team: key.to_string(),
                        field,
                        source,
                    })?;
            }
            info!("team '{}' ({}) is ready", key, team.config.name);
        }
        Ok(())
    }
}
