//! HBase REST gateway implementation of [`EventStore`].
//!
//! Rows come back from the gateway's multiget endpoint as JSON with
//! base64-encoded keys, columns, and cell values; only the event column is
//! projected out.

use std::time::Duration;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{EventStore, StoreError, EVENT_COLUMN};
use crate::config::StoreConfig;

pub struct RestEventStore {
    http: Client,
    base_url: String,
}

impl RestEventStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .pool_max_idle_per_host(config.pool_size)
            .build()?;
        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

fn classify(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(err.to_string())
    } else if err.is_connect() {
        StoreError::NoConnections(err.to_string())
    } else {
        StoreError::Protocol(err.to_string())
    }
}

// Gateway wire format: {"Row": [{"key": b64, "Cell": [{"column": b64, "$": b64}]}]}
#[derive(Debug, Deserialize)]
struct CellSet {
    #[serde(rename = "Row", default)]
    rows: Vec<RestRow>,
}

#[derive(Debug, Deserialize)]
struct RestRow {
    #[serde(rename = "Cell", default)]
    cells: Vec<RestCell>,
}

#[derive(Debug, Deserialize)]
struct RestCell {
    column: String,
    #[serde(rename = "$")]
    value: String,
}

#[async_trait::async_trait]
impl EventStore for RestEventStore {
    async fn fetch_rows(
        &self,
        table: &str,
        row_keys: &[String],
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let query: Vec<(&str, &str)> = row_keys.iter().map(|k| ("row", k.as_str())).collect();
        let response = self
            .http
            .get(format!("{}/{}/multiget", self.base_url, table))
            .query(&query)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify)?;

        // The gateway answers 404 when none of the keys exist.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(StoreError::Protocol(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        let cell_set: CellSet = response.json().await.map_err(classify)?;
        let mut rows = Vec::new();
        for row in cell_set.rows {
            for cell in row.cells {
                let column = BASE64
                    .decode(&cell.column)
                    .map_err(|e| StoreError::Protocol(format!("bad column encoding: {}", e)))?;
                if column == EVENT_COLUMN.as_bytes() {
                    let value = BASE64
                        .decode(&cell.value)
                        .map_err(|e| StoreError::Protocol(format!("bad cell encoding: {}", e)))?;
                    rows.push(value);
                }
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_set_parses_gateway_json() {
        let column = BASE64.encode("n:e");
        let value = BASE64.encode(r#"{"raw": "x"}"#);
        let body = format!(
            r#"{{"Row": [{{"key": "a2V5", "Cell": [{{"column": "{}", "timestamp": 1, "$": "{}"}}]}}]}}"#,
            column, value
        );
        let cell_set: CellSet = serde_json::from_str(&body).unwrap();
        assert_eq!(cell_set.rows.len(), 1);
        assert_eq!(cell_set.rows[0].cells[0].column, column);
    }

    #[test]
    fn test_missing_row_list_defaults_to_empty() {
        let cell_set: CellSet = serde_json::from_str("{}").unwrap();
        assert!(cell_set.rows.is_empty());
    }
}
