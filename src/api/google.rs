//! Implements the `Sheet` trait against the Google Sheets v4 REST API.

use crate::api::{Sheet, TokenProvider};
use crate::model::Cell;
use crate::utils::column_letter;
use crate::Result;
use anyhow::{bail, Context};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::json;
use std::collections::HashMap;
use tracing::trace;

const BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// A live Google spreadsheet. Holds a `TokenProvider` and refreshes the
/// access token before each call.
pub(super) struct GoogleSheet {
    spreadsheet_id: String,
    token_provider: TokenProvider,
    http: reqwest::Client,
    /// Tab title to numeric sheetId, filled lazily; row deletion needs the id.
    sheet_ids: HashMap<String, i64>,
}

impl GoogleSheet {
    pub(super) fn new(spreadsheet_id: String, token_provider: TokenProvider) -> Self {
        Self {
            spreadsheet_id,
            token_provider,
            http: reqwest::Client::new(),
            sheet_ids: HashMap::new(),
        }
    }

    async fn values_get(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        trace!("values_get {range}");
        let token = self.token_provider.access_token().await?;
        let url = format!("{BASE}/{}/values/{}", self.spreadsheet_id, encode_range(range));
        let response = self
            .http
            .get(url)
            .query(&[("majorDimension", "ROWS")])
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch range {range}"))?;
        let body: serde_json::Value = check_response(response, range).await?;
        let values = body
            .get("values")
            .and_then(|v| v.as_array())
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| c.as_str().unwrap_or_default().to_string())
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(values)
    }

    /// Resolves a tab title to its numeric sheetId, fetching and caching the
    /// spreadsheet's tab list on first use.
    async fn sheet_id(&mut self, tab: &str) -> Result<i64> {
        if !self.sheet_ids.contains_key(tab) {
            let token = self.token_provider.access_token().await?;
            let url = format!("{BASE}/{}", self.spreadsheet_id);
            let response = self
                .http
                .get(url)
                .query(&[("fields", "sheets.properties")])
                .bearer_auth(token)
                .send()
                .await
                .context("Failed to fetch spreadsheet metadata")?;
            let body: serde_json::Value = check_response(response, "metadata").await?;
            if let Some(sheets) = body.get("sheets").and_then(|s| s.as_array()) {
                for sheet in sheets {
                    let props = &sheet["properties"];
                    if let (Some(title), Some(id)) =
                        (props["title"].as_str(), props["sheetId"].as_i64())
                    {
                        self.sheet_ids.insert(title.to_string(), id);
                    }
                }
            }
        }
        self.sheet_ids
            .get(tab)
            .copied()
            .with_context(|| format!("Tab '{tab}' not found in the spreadsheet"))
    }

    async fn batch_update(&mut self, requests: Vec<serde_json::Value>) -> Result<()> {
        let token = self.token_provider.access_token().await?;
        let url = format!("{BASE}/{}:batchUpdate", self.spreadsheet_id);
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .context("Failed to send batchUpdate request")?;
        let _: serde_json::Value = check_response(response, "batchUpdate").await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn header(&mut self, tab: &str) -> Result<Vec<String>> {
        let rows = self.values_get(&format!("'{tab}'!1:1")).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn key_column(&mut self, tab: &str) -> Result<Vec<String>> {
        let rows = self.values_get(&format!("'{tab}'!A2:A")).await?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                if row.is_empty() {
                    String::new()
                } else {
                    row.remove(0)
                }
            })
            .collect())
    }

    async fn append_rows(&mut self, tab: &str, rows: &[Vec<Cell>]) -> Result<()> {
        trace!("append {} row(s) to {tab}", rows.len());
        let values: Vec<Vec<serde_json::Value>> = rows
            .iter()
            .map(|row| row.iter().map(Cell::to_json).collect())
            .collect();
        let token = self.token_provider.access_token().await?;
        let url = format!(
            "{BASE}/{}/values/{}:append",
            self.spreadsheet_id,
            encode_range(&format!("'{tab}'!A1"))
        );
        let response = self
            .http
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(token)
            .json(&json!({ "values": values }))
            .send()
            .await
            .with_context(|| format!("Failed to append rows to '{tab}'"))?;
        let _: serde_json::Value = check_response(response, tab).await?;
        Ok(())
    }

    async fn delete_rows(&mut self, tab: &str, positions: &[u64]) -> Result<()> {
        trace!("delete rows {positions:?} from {tab}");
        let sheet_id = self.sheet_id(tab).await?;
        let requests: Vec<serde_json::Value> = positions
            .iter()
            .map(|&pos| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": pos - 1,
                            "endIndex": pos,
                        }
                    }
                })
            })
            .collect();
        self.batch_update(requests)
            .await
            .with_context(|| format!("Failed to delete rows from '{tab}'"))
    }

    async fn write_formulas(
        &mut self,
        tab: &str,
        start_row: u64,
        column: usize,
        formulas: &[String],
    ) -> Result<()> {
        if formulas.is_empty() {
            return Ok(());
        }
        let letter = column_letter(column);
        let end_row = start_row + formulas.len() as u64 - 1;
        let range = format!("'{tab}'!{letter}{start_row}:{letter}{end_row}");
        trace!("write {} formula(s) to {range}", formulas.len());
        let values: Vec<Vec<String>> = formulas.iter().map(|f| vec![f.clone()]).collect();
        let token = self.token_provider.access_token().await?;
        let url = format!("{BASE}/{}/values/{}", self.spreadsheet_id, encode_range(&range));
        let response = self
            .http
            .put(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(token)
            .json(&json!({ "values": values, "majorDimension": "ROWS" }))
            .send()
            .await
            .with_context(|| format!("Failed to write formulas to {range}"))?;
        let _: serde_json::Value = check_response(response, &range).await?;
        Ok(())
    }
}

/// The range goes into the URL path and tab titles can carry spaces, `&`,
/// `#`, or `%`, so everything outside the alphanumeric set is escaped.
fn encode_range(range: &str) -> String {
    utf8_percent_encode(range, NON_ALPHANUMERIC).to_string()
}

async fn check_response(response: reqwest::Response, what: &str) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        bail!("Sheets API call for '{what}' failed with status {status}: {body}");
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse the Sheets API response for '{what}'"))
}
