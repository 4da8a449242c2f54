// Supabase (PostgREST) reader for members and performances

use crate::db::{DataSource, Member, PerformanceRecord};
use crate::remote::{check_status, RemoteError};
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "supabase";
pub const PAGE_SIZE: usize = 1000;

pub struct SupabaseClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl SupabaseClient {
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self, RemoteError> {
        if url.trim().is_empty() {
            return Err(RemoteError::NotConfigured { service: SERVICE, field: "url" });
        }
        if api_key.trim().is_empty() {
            return Err(RemoteError::NotConfigured { service: SERVICE, field: "api_key" });
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::http(SERVICE))?;

        Ok(SupabaseClient {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn table_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{}?{}", self.base_url, table, query)
    }

    /// Read a whole table, one Range page at a time
    pub fn fetch_all<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>, RemoteError> {
        let url = self.table_url(table, query);
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let resp = self
                .client
                .get(&url)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .header("Range-Unit", "items")
                .header("Range", page_range(offset, PAGE_SIZE))
                .send()
                .map_err(RemoteError::http(SERVICE))?;

            let page: Vec<T> = check_status(SERVICE, resp)?
                .json()
                .map_err(RemoteError::http(SERVICE))?;

            let n = page.len();
            debug!(table, offset, rows = n, "Fetched page");
            rows.extend(page);

            if n < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        info!(table, rows = rows.len(), "Fetched table");
        Ok(rows)
    }
}

fn page_range(offset: usize, size: usize) -> String {
    format!("{}-{}", offset, offset + size - 1)
}

impl DataSource for SupabaseClient {
    fn members(&self) -> Result<Vec<Member>> {
        Ok(self.fetch_all("members", "select=*&order=lastName.asc")?)
    }

    fn performances(&self) -> Result<Vec<PerformanceRecord>> {
        Ok(self.fetch_all("performances", "select=*&order=date.asc")?)
    }
}
