use crate::error::SheetError;
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

lazy_static! {
    static ref RANGE_REGEX: Regex = Regex::new(
        r"^(?:(?P<sheet>'[^']+'|[^!]+)!)?(?P<start_col>[A-Za-z]{1,3})(?P<start_row>[0-9]+)?(?::(?P<end_col>[A-Za-z]{1,3})(?P<end_row>[0-9]+)?)?$"
    )
    .unwrap();
}

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// A column range in A1 notation, e.g. `Stats!A:E` or `Settings!B2:B`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: Option<String>,
    pub start_col: u16,
    pub start_row: Option<u32>,
    pub end_col: Option<u16>,
    pub end_row: Option<u32>,
}

impl SheetRange {
    /// Parses A1 notation. Returns `None` for anything that is not a plain
    /// column or cell range, or whose end column is before its start.
    pub fn parse(range: &str) -> Option<Self> {
        let caps = RANGE_REGEX.captures(range.trim())?;

        let start_col = Self::letter_to_col(&caps["start_col"]);
        let end_col = caps.name("end_col").map(|m| Self::letter_to_col(m.as_str()));
        if end_col.is_some_and(|end| end < start_col) {
            return None;
        }

        Some(SheetRange {
            sheet: caps.name("sheet").map(|m| m.as_str().to_string()),
            start_col,
            start_row: caps.name("start_row").and_then(|m| m.as_str().parse().ok()),
            end_col,
            end_row: caps.name("end_row").and_then(|m| m.as_str().parse().ok()),
        })
    }

    /// Number of columns covered by the range.
    pub fn width(&self) -> usize {
        match self.end_col {
            Some(end) => (end - self.start_col) as usize + 1,
            None => 1,
        }
    }

    pub fn col_to_letter(col: u16) -> String {
        let mut col = col;
        let mut result = String::new();
        while col > 0 {
            col -= 1;
            result.push(((col % 26) as u8 + b'A') as char);
            col /= 26;
        }
        result.chars().rev().collect()
    }

    pub fn letter_to_col(letters: &str) -> u16 {
        letters
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .fold(0, |acc, c| acc * 26 + (c as u16 - 'A' as u16 + 1))
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sheet)?;
        }
        write!(f, "{}", Self::col_to_letter(self.start_col))?;
        if let Some(row) = self.start_row {
            write!(f, "{}", row)?;
        }
        if let Some(end) = self.end_col {
            write!(f, ":{}", Self::col_to_letter(end))?;
            if let Some(row) = self.end_row {
                write!(f, "{}", row)?;
            }
        }
        Ok(())
    }
}

/// Read and append access to a spreadsheet.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetches every row of `range`. Row 0 is the sheet's header.
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetError>;

    /// Appends one row after the last row of `range`.
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        range: &str,
        row: Vec<Value>,
    ) -> Result<(), SheetError>;
}

/// How the client authenticates against Google.
pub enum Credentials {
    /// Service account key, tokens are minted and cached by `gcp_auth`.
    ServiceAccount(Arc<dyn TokenProvider>),
    /// A ready-made bearer token.
    Token(String),
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Google Sheets v4 REST client.
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl SheetsClient {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, SHEETS_API_URL)
    }

    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Self {
        SheetsClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Creates a client authenticated with a service account key file.
    pub fn from_service_account(path: impl AsRef<Path>) -> Result<Self, SheetError> {
        let account = CustomServiceAccount::from_file(path.as_ref())?;
        Ok(Self::new(Credentials::ServiceAccount(Arc::new(account))))
    }

    async fn bearer_token(&self) -> Result<String, SheetError> {
        match &self.credentials {
            Credentials::ServiceAccount(provider) => {
                let token = provider.token(&[SHEETS_SCOPE]).await?;
                Ok(token.as_str().to_string())
            }
            Credentials::Token(token) => Ok(token.clone()),
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SheetError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(self.values_url(spreadsheet_id, range))
            .bearer_auth(token)
            .send()
            .await?;
        let value_range: ValueRange = Self::check(response).await?.json().await?;

        // the API drops trailing empty cells, pad rows back to the range width
        let width = SheetRange::parse(range).map(|r| r.width()).unwrap_or(0);

        Ok(value_range
            .values
            .into_iter()
            .map(|row| pad_row(row.iter().map(cell_to_string).collect(), width))
            .collect())
    }

    async fn append_row(
        &self,
        spreadsheet_id: &str,
        range: &str,
        row: Vec<Value>,
    ) -> Result<(), SheetError> {
        let token = self.bearer_token().await?;
        let url = format!("{}:append", self.values_url(spreadsheet_id, range));
        let response = self
            .http
            .post(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(token)
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Renders a cell the way it reads in the sheet.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn pad_row(mut row: Vec<String>, width: usize) -> Vec<String> {
    if row.len() < width {
        row.resize(width, String::new());
    }
    row
}
