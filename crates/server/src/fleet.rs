// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet-wide operations: compile, upload, flash-all, device reset.
//!
//! Uploads are strictly sequential — concurrent flashes over a shared USB
//! bus are unreliable — with a short settle delay between ports and a
//! per-upload timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::monitor::pulse_reset;
use crate::ports;
use crate::runner::{run_tool, ToolOptions};
use crate::state::AppState;

const COMPILE_TIMEOUT: Duration = Duration::from_secs(300);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const RESET_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Settle time between sequential uploads.
const INTER_UPLOAD_DELAY: Duration = Duration::from_secs(2);

/// Result of one compile invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub ok: bool,
    pub fqbn: String,
    pub sketch_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_path: Option<String>,
    pub duration_ms: u64,
    pub stdout: String,
    pub stderr: String,
}

/// Result of one upload invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub ok: bool,
    pub port: String,
    pub duration_ms: u64,
    pub stdout: String,
    pub stderr: String,
}

/// Per-port outcome within a flash-all run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashResult {
    pub port: String,
    pub ok: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of a flash-all run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashAllReport {
    pub ok: bool,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub compile: CompileReport,
    pub results: Vec<FlashResult>,
}

/// How to reset a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMethod {
    /// DTR/RTS boot-reset pulse over the serial line.
    #[default]
    Pulse,
    /// Vendor tool hard reset via the helper runtime.
    Esptool,
}

impl ResetMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pulse => "pulse",
            Self::Esptool => "esptool",
        }
    }
}

/// Result of a device reset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReport {
    pub ok: bool,
    pub port: String,
    pub method: &'static str,
    /// Whether a monitor session was stopped to free the port.
    pub monitor_stopped: bool,
}

/// Compile one sketch, exporting binaries under the build-output directory.
pub async fn compile(
    ctx: &Arc<AppState>,
    sketch_path: &str,
    fqbn: Option<String>,
) -> Result<CompileReport, (ApiError, String)> {
    let fqbn = fqbn.unwrap_or_else(|| ctx.workspace.default_fqbn());
    let sketch = resolve_sketch(ctx, sketch_path);
    let stem = sketch
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sketch".to_owned());
    let build_path = ctx.workspace.build_output_dir().join(stem);

    let args = vec![
        "compile".to_owned(),
        "--fqbn".to_owned(),
        fqbn.clone(),
        "--output-dir".to_owned(),
        build_path.to_string_lossy().into_owned(),
        sketch.to_string_lossy().into_owned(),
    ];

    let started = Instant::now();
    let output = run_tool(
        &ctx.config.build_tool(),
        &args,
        ToolOptions { timeout: Some(COMPILE_TIMEOUT), ..Default::default() },
    )
    .await
    .map_err(|e| (ApiError::SpawnFailed, format!("failed to spawn compile tool: {e}")))?;

    Ok(CompileReport {
        ok: output.ok(),
        fqbn,
        sketch_path: sketch.to_string_lossy().into_owned(),
        build_path: output.ok().then(|| build_path.to_string_lossy().into_owned()),
        duration_ms: started.elapsed().as_millis() as u64,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Upload a previously produced build to one port. Stops any monitor
/// session holding the port first and waits for it to terminate.
pub async fn upload(
    ctx: &Arc<AppState>,
    port: &str,
    build_path: &str,
    fqbn: Option<String>,
) -> Result<UploadReport, (ApiError, String)> {
    let fqbn = fqbn.unwrap_or_else(|| ctx.workspace.default_fqbn());
    if ctx.monitors.stop_port_and_wait(port).await.is_some() {
        tracing::info!(port, "stopped monitor session before upload");
    }

    let args = vec![
        "upload".to_owned(),
        "-p".to_owned(),
        port.to_owned(),
        "--fqbn".to_owned(),
        fqbn,
        "--input-dir".to_owned(),
        build_path.to_owned(),
    ];

    let started = Instant::now();
    let output = run_tool(
        &ctx.config.build_tool(),
        &args,
        ToolOptions { timeout: Some(UPLOAD_TIMEOUT), ..Default::default() },
    )
    .await
    .map_err(|e| (ApiError::SpawnFailed, format!("failed to spawn upload tool: {e}")))?;

    Ok(UploadReport {
        ok: output.ok(),
        port: port.to_owned(),
        duration_ms: started.elapsed().as_millis() as u64,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Compile once, then upload to every target-class port in sequence.
pub async fn flash_all(
    ctx: &Arc<AppState>,
    sketch_path: &str,
    fqbn: Option<String>,
) -> Result<FlashAllReport, (ApiError, String)> {
    let scan = ports::scan(ctx).await;
    let targets: Vec<String> =
        scan.ports.iter().filter(|p| p.is_target).map(|p| p.address.clone()).collect();

    let compile_report = compile(ctx, sketch_path, fqbn.clone()).await?;
    if !compile_report.ok {
        return Ok(FlashAllReport {
            ok: false,
            total: targets.len(),
            success: 0,
            failed: 0,
            compile: compile_report,
            results: Vec::new(),
        });
    }
    let build_path = compile_report.build_path.clone().unwrap_or_default();

    let mut results = Vec::with_capacity(targets.len());
    for (index, port) in targets.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(INTER_UPLOAD_DELAY).await;
        }
        match upload(ctx, port, &build_path, fqbn.clone()).await {
            Ok(report) => results.push(FlashResult {
                port: port.clone(),
                ok: report.ok,
                duration_ms: report.duration_ms,
                error: if report.ok { None } else { Some(truncate_diag(&report.stderr)) },
            }),
            Err((_, message)) => results.push(FlashResult {
                port: port.clone(),
                ok: false,
                duration_ms: 0,
                error: Some(message),
            }),
        }
    }

    let success = results.iter().filter(|r| r.ok).count();
    Ok(FlashAllReport {
        ok: success == results.len(),
        total: targets.len(),
        success,
        failed: results.len() - success,
        compile: compile_report,
        results,
    })
}

/// Reset one device, stopping its monitor session first.
pub async fn reset_device(
    ctx: &Arc<AppState>,
    port: &str,
    method: ResetMethod,
    delay_ms: Option<u64>,
) -> Result<ResetReport, (ApiError, String)> {
    let monitor_stopped = ctx.monitors.stop_port_and_wait(port).await.is_some();

    match method {
        ResetMethod::Pulse => {
            pulse_reset(port, delay_ms.map(Duration::from_millis)).await.map_err(|e| {
                (ApiError::PortUnreachable, format!("line-control reset on {port} failed: {e}"))
            })?;
        }
        ResetMethod::Esptool => {
            let args = vec![
                "-m".to_owned(),
                "esptool".to_owned(),
                "--port".to_owned(),
                port.to_owned(),
                "run".to_owned(),
            ];
            let output = run_tool(
                &ctx.config.runtime(),
                &args,
                ToolOptions { timeout: Some(RESET_TOOL_TIMEOUT), ..Default::default() },
            )
            .await
            .map_err(|e| (ApiError::SpawnFailed, format!("failed to spawn esptool: {e}")))?;
            if !output.ok() {
                return Err((
                    ApiError::DeviceUnreachable,
                    format!("esptool reset failed: {}", truncate_diag(&output.stderr)),
                ));
            }
        }
    }

    Ok(ResetReport { ok: true, port: port.to_owned(), method: method.as_str(), monitor_stopped })
}

/// Resolve a sketch path: absolute as-is, relative under the sketches dir.
fn resolve_sketch(ctx: &Arc<AppState>, sketch_path: &str) -> PathBuf {
    let path = Path::new(sketch_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        ctx.workspace.sketches_dir().join(path)
    }
}

/// Trim tool stderr to a single diagnostic line for aggregates.
fn truncate_diag(stderr: &str) -> String {
    let line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
    let diag: String = line.trim().chars().take(200).collect();
    if diag.is_empty() {
        return "tool failed with no diagnostics".to_owned();
    }
    diag
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod tests;
