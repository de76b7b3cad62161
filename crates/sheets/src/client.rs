//! Thin REST client over the Sheets v4 and Drive v3 endpoints the bot uses.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use hyperbot_core::config::GoogleConfig;

use crate::token::AccessTokenSource;
use crate::SheetsError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSpreadsheet {
    pub spreadsheet_id: String,
    pub spreadsheet_url: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetResponse {
    spreadsheet_id: String,
}

#[derive(Deserialize)]
struct FileParents {
    #[serde(default)]
    parents: Vec<String>,
}

pub struct SheetsClient {
    http: Client,
    tokens: Arc<dyn AccessTokenSource>,
    sheets_base_url: String,
    drive_base_url: String,
}

impl SheetsClient {
    pub fn new(
        tokens: Arc<dyn AccessTokenSource>,
        sheets_base_url: impl Into<String>,
        drive_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            tokens,
            sheets_base_url: sheets_base_url.into().trim_end_matches('/').to_owned(),
            drive_base_url: drive_base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn from_config(tokens: Arc<dyn AccessTokenSource>, config: &GoogleConfig) -> Self {
        Self::new(tokens, config.sheets_base_url.clone(), config.drive_base_url.clone())
    }

    /// Cells of `range`, each rendered as a string.
    pub async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!("{}/v4/spreadsheets/{spreadsheet_id}/values/{range}", self.sheets_base_url);
        let body: ValueRange = self.send_json(&url, self.http.get(&url)).await?;
        Ok(body.values.into_iter().map(|row| row.into_iter().map(cell_text).collect()).collect())
    }

    pub async fn create_spreadsheet(&self, title: &str) -> Result<CreatedSpreadsheet, SheetsError> {
        let url = format!("{}/v4/spreadsheets", self.sheets_base_url);
        let request = self.http.post(&url).json(&json!({ "properties": { "title": title } }));
        let created: SpreadsheetResponse = self.send_json(&url, request).await?;
        Ok(CreatedSpreadsheet {
            spreadsheet_url: format!(
                "https://docs.google.com/spreadsheets/d/{}",
                created.spreadsheet_id
            ),
            spreadsheet_id: created.spreadsheet_id,
        })
    }

    /// Overwrites `range` with `rows`; cells are stored as typed (`RAW`).
    pub async fn write_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        let url = format!("{}/v4/spreadsheets/{spreadsheet_id}/values/{range}", self.sheets_base_url);
        let request = self
            .http
            .put(&url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": rows }));
        let _: Value = self.send_json(&url, request).await?;
        Ok(())
    }

    pub async fn file_parents(&self, file_id: &str) -> Result<Vec<String>, SheetsError> {
        let url = format!("{}/drive/v3/files/{file_id}", self.drive_base_url);
        let request =
            self.http.get(&url).query(&[("fields", "parents"), ("supportsAllDrives", "true")]);
        let file: FileParents = self.send_json(&url, request).await?;
        Ok(file.parents)
    }

    pub async fn move_to_folder(
        &self,
        file_id: &str,
        folder_id: &str,
        previous_parents: &[String],
    ) -> Result<(), SheetsError> {
        let url = format!("{}/drive/v3/files/{file_id}", self.drive_base_url);
        let remove = previous_parents.join(",");
        let mut query = vec![
            ("addParents", folder_id),
            ("fields", "id,parents"),
            ("supportsAllDrives", "true"),
        ];
        if !remove.is_empty() {
            query.push(("removeParents", remove.as_str()));
        }
        let request = self.http.patch(&url).query(&query).json(&json!({}));
        let _: Value = self.send_json(&url, request).await?;
        Ok(())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, SheetsError> {
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|error| SheetsError::Http {
                endpoint: endpoint.to_owned(),
                detail: error.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Status { endpoint: endpoint.to_owned(), status, body });
        }

        response.json::<T>().await.map_err(|error| SheetsError::Decode {
            endpoint: endpoint.to_owned(),
            detail: error.to_string(),
        })
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::SheetsClient;
    use crate::token::StaticToken;
    use crate::SheetsError;

    fn client(server: &MockServer) -> SheetsClient {
        SheetsClient::new(Arc::new(StaticToken::new("ya29.token")), server.base_url(), server.base_url())
    }

    #[tokio::test]
    async fn read_range_stringifies_cells() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v4/spreadsheets/sheet-1/values/A1:K20")
                    .header("authorization", "Bearer ya29.token");
                then.status(200).json_body(json!({
                    "range": "Sheet1!A1:K20",
                    "majorDimension": "ROWS",
                    "values": [["No", "Full Name"], [1, "Nguyen Van A"]]
                }));
            })
            .await;

        let rows = client(&server).read_range("sheet-1", "A1:K20").await.expect("rows");

        assert_eq!(rows, vec![vec!["No", "Full Name"], vec!["1", "Nguyen Van A"]]);
    }

    #[tokio::test]
    async fn create_spreadsheet_builds_docs_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v4/spreadsheets")
                    .json_body(json!({ "properties": { "title": "New Employee Skill - 2026-10-16" } }));
                then.status(200).json_body(json!({ "spreadsheetId": "new-sheet" }));
            })
            .await;

        let created = client(&server)
            .create_spreadsheet("New Employee Skill - 2026-10-16")
            .await
            .expect("created");

        mock.assert_async().await;
        assert_eq!(created.spreadsheet_id, "new-sheet");
        assert_eq!(created.spreadsheet_url, "https://docs.google.com/spreadsheets/d/new-sheet");
    }

    #[tokio::test]
    async fn write_rows_uses_raw_input() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/v4/spreadsheets/new-sheet/values/A1")
                    .query_param("valueInputOption", "RAW")
                    .json_body(json!({
                        "range": "A1",
                        "majorDimension": "ROWS",
                        "values": [["Full Name"], ["Tran B"]]
                    }));
                then.status(200).json_body(json!({ "updatedRows": 2 }));
            })
            .await;

        client(&server)
            .write_rows(
                "new-sheet",
                "A1",
                &[vec!["Full Name".to_owned()], vec!["Tran B".to_owned()]],
            )
            .await
            .expect("written");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn move_to_folder_swaps_parents_across_drives() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/drive/v3/files/new-sheet")
                    .query_param("fields", "parents");
                then.status(200).json_body(json!({ "parents": ["root-folder"] }));
            })
            .await;
        let patch = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH)
                    .path("/drive/v3/files/new-sheet")
                    .query_param("addParents", "shared-folder")
                    .query_param("removeParents", "root-folder")
                    .query_param("supportsAllDrives", "true");
                then.status(200).json_body(json!({ "id": "new-sheet", "parents": ["shared-folder"] }));
            })
            .await;

        let client = client(&server);
        let parents = client.file_parents("new-sheet").await.expect("parents");
        client.move_to_folder("new-sheet", "shared-folder", &parents).await.expect("moved");

        patch.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v4/spreadsheets/missing/values/A1:K20");
                then.status(404).body("Requested entity was not found.");
            })
            .await;

        let error = client(&server).read_range("missing", "A1:K20").await.expect_err("missing");

        match error {
            SheetsError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Requested entity was not found.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
