use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credentials::ServiceAccountKey;
use super::{Grid, SheetStore};
use crate::types::Cell;

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeUpdate<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a Grid,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: u16,
    message: String,
    #[serde(default)]
    status: String,
}

/// Authenticated client for one spreadsheet
pub struct SheetsClient {
    client: Client,
    access_token: String,
    spreadsheet_id: String,
}

impl SheetsClient {
    /// Authenticate with the service account and bind to `spreadsheet_id`
    pub fn connect(key: &ServiceAccountKey, spreadsheet_id: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("outage-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let access_token = key
            .fetch_access_token(&client)
            .context("Failed to authenticate with Google")?;
        Ok(Self {
            client,
            access_token,
            spreadsheet_id: spreadsheet_id.to_string(),
        })
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        values_url(&self.spreadsheet_id, range)
    }
}

/// `values.get` URL. Cells come back unformatted so counts stay numbers
/// when they are written back.
fn values_get_url(spreadsheet_id: &str, range: &str) -> Result<Url> {
    let mut url = values_url(spreadsheet_id, range)?;
    url.query_pairs_mut()
        .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
    Ok(url)
}

/// `.../spreadsheets/{id}/values/{range}` with both segments escaped
fn values_url(spreadsheet_id: &str, range: &str) -> Result<Url> {
    let mut url = Url::parse(SHEETS_API_URL)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Sheets API URL cannot be a base"))?
        .push(spreadsheet_id)
        .push("values")
        .push(range);
    Ok(url)
}

/// Turn a non-success response into an error carrying Google's message
fn check_status(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(ApiErrorBody { error }) => bail!(
            "Sheets API error while {}: {} {} ({})",
            action,
            error.code,
            error.status,
            error.message
        ),
        Err(_) => bail!("Sheets API error while {}: HTTP {}: {}", action, status, body),
    }
}

impl SheetStore for SheetsClient {
    fn get_values(&self, range: &str) -> Result<Grid> {
        let url = values_get_url(&self.spreadsheet_id, range)?;
        debug!(%url, "reading sheet");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .context("Failed to reach Sheets API")?;
        let body: ValueRange = check_status(response, "reading values")?
            .json()
            .context("Failed to parse Sheets values")?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from_json).collect())
            .collect())
    }

    fn update_values(&self, range: &str, grid: &Grid) -> Result<()> {
        let url = self.values_url(range)?;
        debug!(%url, rows = grid.len(), "writing sheet");

        let body = ValueRangeUpdate {
            range,
            major_dimension: "ROWS",
            values: grid,
        };
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .context("Failed to reach Sheets API")?;
        check_status(response, "updating values")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_url_escapes_range() {
        let url = values_url("abc123", "Sheet 1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Sheet%201"
        );
    }

    #[test]
    fn test_values_are_read_unformatted() {
        let url = values_get_url("abc123", "Sheet1").unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/abc123/values/Sheet1");
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "valueRenderOption" && v == "UNFORMATTED_VALUE"));
    }

    #[test]
    fn test_unformatted_counts_stay_numbers() {
        let body: ValueRange = serde_json::from_str(
            r#"{"values": [["Operator/Metric", "t1"], ["MTS - Daily complaints", 1234]]}"#,
        )
        .unwrap();
        let row: Vec<Cell> = body.values[1].iter().cloned().map(Cell::from_json).collect();
        assert_eq!(row, vec![Cell::from("MTS - Daily complaints"), Cell::Number(1234)]);
    }

    #[test]
    fn test_empty_sheet_has_no_values_field() {
        let body: ValueRange =
            serde_json::from_str(r#"{"range": "Sheet1!A1:Z1000", "majorDimension": "ROWS"}"#)
                .unwrap();
        assert!(body.values.is_empty());
    }

    #[test]
    fn test_update_body_shape() {
        let grid: Grid = vec![
            vec![Cell::from("Operator/Metric"), Cell::from("2026-10-15 12:00")],
            vec![Cell::from("MTS - Daily complaints"), Cell::Number(12)],
        ];
        let body = ValueRangeUpdate {
            range: "Sheet1",
            major_dimension: "ROWS",
            values: &grid,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "range": "Sheet1",
                "majorDimension": "ROWS",
                "values": [
                    ["Operator/Metric", "2026-10-15 12:00"],
                    ["MTS - Daily complaints", 12]
                ]
            })
        );
    }

    #[test]
    fn test_api_error_body() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#,
        )
        .unwrap();
        assert_eq!(body.error.code, 403);
        assert_eq!(body.error.status, "PERMISSION_DENIED");
    }
}
