// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP passthrough to a device's own SPIFFS endpoints.
//!
//! The proxy tolerates the firmware's response-envelope variance (`ok` vs
//! `success`) and normalises it so callers always see `ok`.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

enum Method {
    Get,
    Post,
    Delete,
}

/// List a directory on the device filesystem.
pub async fn list(
    ctx: &Arc<AppState>,
    device: &str,
    dir: &str,
) -> Result<Value, (ApiError, String)> {
    forward(ctx, device, Method::Get, "/list", &[("dir", dir)], None).await
}

/// Read one file.
pub async fn read(
    ctx: &Arc<AppState>,
    device: &str,
    path: &str,
) -> Result<Value, (ApiError, String)> {
    forward(ctx, device, Method::Get, "/file", &[("path", path)], None).await
}

/// Create or overwrite one file.
pub async fn write(
    ctx: &Arc<AppState>,
    device: &str,
    path: &str,
    content: &str,
) -> Result<Value, (ApiError, String)> {
    let body = json!({ "path": path, "content": content });
    forward(ctx, device, Method::Post, "/file", &[], Some(body)).await
}

/// Delete one file.
pub async fn delete(
    ctx: &Arc<AppState>,
    device: &str,
    path: &str,
) -> Result<Value, (ApiError, String)> {
    forward(ctx, device, Method::Delete, "/file", &[("path", path)], None).await
}

/// Filesystem usage info.
pub async fn info(ctx: &Arc<AppState>, device: &str) -> Result<Value, (ApiError, String)> {
    forward(ctx, device, Method::Get, "/info", &[], None).await
}

/// Format the device filesystem. The caller must have confirmed.
pub async fn format(ctx: &Arc<AppState>, device: &str) -> Result<Value, (ApiError, String)> {
    forward(ctx, device, Method::Post, "/format", &[], Some(json!({ "confirm": true }))).await
}

/// Normalise the device envelope so `ok` is always present.
pub fn normalize(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        if !map.contains_key("ok") {
            let ok = map.get("success").and_then(Value::as_bool).unwrap_or(true);
            map.insert("ok".to_owned(), Value::Bool(ok));
        }
    }
    value
}

/// Base URL for a device address: a bare host gets the http scheme.
fn device_base(device: &str) -> String {
    if device.starts_with("http://") || device.starts_with("https://") {
        device.trim_end_matches('/').to_owned()
    } else {
        format!("http://{device}")
    }
}

async fn forward(
    ctx: &Arc<AppState>,
    device: &str,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
    body: Option<Value>,
) -> Result<Value, (ApiError, String)> {
    let url = format!("{}{path}", device_base(device));
    let client = ctx.device_client(device);
    let mut request = match method {
        Method::Get => client.get(&url),
        Method::Post => client.post(&url),
        Method::Delete => client.delete(&url),
    };
    if !query.is_empty() {
        request = request.query(query);
    }
    if let Some(ref body) = body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| (ApiError::DeviceUnreachable, format!("device {device} unreachable: {e}")))?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err((
            ApiError::DeviceUnreachable,
            format!("device {device} returned {status}: {text}"),
        ));
    }

    let value = serde_json::from_str::<Value>(&text)
        .unwrap_or_else(|_| json!({ "ok": true, "raw": text }));
    Ok(normalize(value))
}

#[cfg(test)]
#[path = "spiffs_tests.rs"]
mod tests;
