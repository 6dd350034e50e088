//! Spreadsheet fetching and row parsing.

use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    config::{SheetsAuthConfig, SheetsConfig},
    db::models::pipeline::SheetRecord,
};

const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Source of raw sheet values: one `Vec<String>` per row, header row first.
#[async_trait]
pub trait SheetsClient: Send + Sync {
    async fn fetch_values(&self, spreadsheet_id: &str, sheet_name: &str) -> anyhow::Result<Vec<Vec<String>>>;
}

/// Pull the spreadsheet id out of a `.../spreadsheets/d/{id}/...` URL.
pub fn spreadsheet_id_from_url(sheet_url: &str) -> Option<&str> {
    let (_, rest) = sheet_url.split_once("/spreadsheets/d/")?;
    let id = rest.split(['/', '?', '#']).next()?;
    (!id.is_empty()).then_some(id)
}

#[derive(Debug, Default, PartialEq)]
pub struct ParsedSheet {
    pub records: Vec<SheetRecord>,
    /// Data rows without a value in the id column
    pub skipped: u64,
}

/// Turn sheet values into lead records keyed by the `id_column` cell.
///
/// The header lookup is case-insensitive. Short rows are padded with empty strings.
pub fn parse_rows(values: &[Vec<String>], id_column: &str) -> anyhow::Result<ParsedSheet> {
    let Some((header, rows)) = values.split_first() else {
        return Ok(ParsedSheet::default());
    };
    let header: Vec<&str> = header.iter().map(|h| h.trim()).collect();
    let id_index = header
        .iter()
        .position(|h| h.eq_ignore_ascii_case(id_column))
        .ok_or_else(|| anyhow!("sheet has no '{id_column}' column"))?;

    let mut parsed = ParsedSheet::default();
    for row in rows {
        let external_id = row.get(id_index).map(|c| c.trim()).unwrap_or_default();
        if external_id.is_empty() {
            parsed.skipped += 1;
            continue;
        }

        let record: Map<String, Value> = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(i, name)| (name.to_string(), Value::String(row.get(i).cloned().unwrap_or_default())))
            .collect();

        parsed.records.push(SheetRecord {
            external_id: external_id.to_string(),
            record: Value::Object(record),
        });
    }
    Ok(parsed)
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Google Sheets v4 values API over reqwest.
pub struct GoogleSheetsClient {
    client: Client,
    base_url: Url,
    auth: SheetsAuthConfig,
    tokens: Cache<(), String>,
}

impl GoogleSheetsClient {
    pub fn new(config: &SheetsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build sheets HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth: config.auth.clone(),
            tokens: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs((ASSERTION_LIFETIME_SECS - 300) as u64))
                .build(),
        })
    }

    fn values_url(&self, spreadsheet_id: &str, sheet_name: &str) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets base URL cannot be a base"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", sheet_name]);
        Ok(url)
    }

    async fn service_account_token(&self, client_email: &str, private_key: &str, token_url: &Url) -> anyhow::Result<String> {
        if let Some(token) = self.tokens.get(&()).await {
            return Ok(token);
        }

        let now = Utc::now().timestamp();
        let claims = ServiceAccountClaims {
            iss: client_email,
            scope: READONLY_SCOPE,
            aud: token_url.as_str(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).context("parse service account private key")?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key).context("sign service account assertion")?;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .client
            .post(token_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("token exchange failed: {status} - {body}"));
        }

        let token: TokenResponse = response.json().await.context("decode token response")?;
        self.tokens.insert((), token.access_token.clone()).await;
        debug!("Obtained sheets access token");
        Ok(token.access_token)
    }
}

#[async_trait]
impl SheetsClient for GoogleSheetsClient {
    #[instrument(skip(self), err)]
    async fn fetch_values(&self, spreadsheet_id: &str, sheet_name: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let mut url = self.values_url(spreadsheet_id, sheet_name)?;

        let request = match &self.auth {
            SheetsAuthConfig::Disabled => return Err(anyhow!("sheet access is disabled")),
            SheetsAuthConfig::ApiKey { key } => {
                url.query_pairs_mut().append_pair("key", key);
                self.client.get(url)
            }
            SheetsAuthConfig::ServiceAccount {
                client_email,
                private_key,
                token_url,
            } => {
                let token = self.service_account_token(client_email, private_key, token_url).await?;
                self.client.get(url).bearer_auth(token)
            }
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.tokens.invalidate(&()).await;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Sheets API error: {status} - {body}"));
        }

        let range: ValueRange = response.json().await.context("decode sheet values")?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::install_crypto_provider;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect()
    }

    #[test]
    fn test_spreadsheet_id_from_url() {
        assert_eq!(
            spreadsheet_id_from_url("https://docs.google.com/spreadsheets/d/1AbC-xyz_9/edit#gid=0"),
            Some("1AbC-xyz_9")
        );
        assert_eq!(spreadsheet_id_from_url("https://docs.google.com/spreadsheets/d/abc"), Some("abc"));
        assert_eq!(spreadsheet_id_from_url("https://example.com/sheet"), None);
        assert_eq!(spreadsheet_id_from_url("https://docs.google.com/spreadsheets/d//edit"), None);
    }

    #[test]
    fn test_parse_rows() {
        let values = rows(&[
            &["id", "Company", "Phone"],
            &["r1", "Initech", "555-0100"],
            &["", "No Id Corp", "555-0101"],
            &["r2", "Hooli"],
        ]);
        let parsed = parse_rows(&values, "ID").unwrap();

        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].external_id, "r1");
        assert_eq!(
            parsed.records[0].record,
            json!({"id": "r1", "Company": "Initech", "Phone": "555-0100"})
        );
        assert_eq!(parsed.records[1].record["Phone"], "");
    }

    #[test]
    fn test_parse_rows_requires_id_column() {
        let values = rows(&[&["Company"], &["Initech"]]);
        assert!(parse_rows(&values, "ID").is_err());
        assert_eq!(parse_rows(&[], "ID").unwrap(), ParsedSheet::default());
    }

    #[tokio::test]
    async fn test_fetch_values_with_api_key() {
        install_crypto_provider();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123/values/Leads%20Q1"))
            .and(query_param("key", "k-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "'Leads Q1'!A1:C3",
                "majorDimension": "ROWS",
                "values": [["ID", "Amount"], ["r1", 42], ["r2", null]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::new(&SheetsConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            auth: SheetsAuthConfig::ApiKey { key: "k-1".to_string() },
            ..Default::default()
        })
        .unwrap();

        let values = client.fetch_values("sheet-123", "Leads Q1").await.unwrap();
        assert_eq!(values, rows(&[&["ID", "Amount"], &["r1", "42"], &["r2", ""]]));
    }

    #[tokio::test]
    async fn test_fetch_values_errors() {
        install_crypto_provider();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let api_key = GoogleSheetsClient::new(&SheetsConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            auth: SheetsAuthConfig::ApiKey { key: "k".to_string() },
            ..Default::default()
        })
        .unwrap();
        assert!(api_key.fetch_values("s", "Sheet1").await.is_err());

        let disabled = GoogleSheetsClient::new(&SheetsConfig::default()).unwrap();
        assert!(disabled.fetch_values("s", "Sheet1").await.is_err());

        let bad_key = GoogleSheetsClient::new(&SheetsConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            auth: SheetsAuthConfig::ServiceAccount {
                client_email: "sync@project.iam.example".to_string(),
                private_key: "not a pem".to_string(),
                token_url: Url::parse(&format!("{}/token", server.uri())).unwrap(),
            },
            ..Default::default()
        })
        .unwrap();
        assert!(bad_key.fetch_values("s", "Sheet1").await.is_err());
    }
}
