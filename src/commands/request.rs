use std::collections::HashMap;

use colored::Colorize;
use reqwest::Method;

use crate::client::ApiClient;
use crate::error::{DinedashError, Result};

/// Arguments for the `request` command
#[derive(Debug, Clone)]
pub struct RequestArgs {
    /// HTTP method name
    pub method: String,
    /// Path relative to the API base URL
    pub path: String,
    /// Raw JSON body
    pub body: Option<String>,
    /// Raw `Name: value` header strings
    pub headers: Vec<String>,
}

/// Send a request and print status and body.
pub async fn run_request(client: &ApiClient, args: RequestArgs) -> Result<()> {
    let method = parse_method(&args.method)?;
    let headers = parse_headers(&args.headers)?;
    let body = args
        .body
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| DinedashError::Config(format!("--body is not valid JSON: {}", e)))?;

    tracing::debug!("Sending {} {}", method, args.path);
    let response = client
        .request(method, &args.path, body.as_ref(), Some(&headers))
        .await?;

    let status = response.status();
    let text = response.text().await?;
    println!("{}", status.to_string().green());

    // Pretty-print JSON bodies; anything else verbatim.
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

fn parse_method(raw: &str) -> Result<Method> {
    let upper = raw.to_uppercase();
    match upper.as_str() {
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS" => {
            Method::from_bytes(upper.as_bytes())
                .map_err(|e| DinedashError::Config(format!("Invalid method {}: {}", raw, e)).into())
        }
        _ => Err(DinedashError::Config(format!("Unsupported HTTP method: {}", raw)).into()),
    }
}

fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>> {
    raw.iter()
        .map(|entry| -> Result<(String, String)> {
            let (name, value) = entry.split_once(':').ok_or_else(|| {
                DinedashError::Config(format!("Header must look like 'Name: value': {}", entry))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(DinedashError::Config(format!("Header name is empty: {}", entry)).into());
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
