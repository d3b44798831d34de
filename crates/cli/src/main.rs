//! Gantry CLI - Control surface client for the Gantry agent

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9600";

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Gantry job scheduler CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "GANTRY_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List jobs in lease order
    Ls {
        /// Only jobs in this state (pending, processing, done, failed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one job record
    Show {
        /// Job name (description file name)
        name: String,
    },

    /// Change a job's priority (lower runs first)
    Priority { name: String, priority: i64 },

    /// Move a job to the front of the queue
    GodMode { name: String },

    /// Send a failed job back to pending with a fresh retry budget
    Retry { name: String },

    /// Show queue statistics
    Status,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Tabled)]
struct JobRow {
    priority: String,
    name: String,
    status: String,
    kind: String,
    workflow: String,
    attempts: String,
    duration: String,
    error: String,
}

impl JobRow {
    fn from_json(job: &Value) -> Self {
        let text = |key: &str| job[key].as_str().unwrap_or("-").to_string();
        Self {
            priority: job["priority"].to_string(),
            name: text("name"),
            status: text("status"),
            kind: text("kind"),
            workflow: text("workflow_ref"),
            attempts: format!(
                "{} ({}/{} retries)",
                job["run_count"], job["retries_used"], job["retry_limit"]
            ),
            duration: job["duration_ms"]
                .as_i64()
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
            error: job["error"]
                .as_str()
                .map(|e| truncate(e, 48))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn format_duration(ms: i64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

fn colored_status(status: &str) -> String {
    match status {
        "pending" => status.yellow().to_string(),
        "processing" => status.cyan().to_string(),
        "done" => status.green().to_string(),
        "failed" => status.red().to_string(),
        other => other.to_string(),
    }
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to agent")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_job(job: &Value) {
    let status = job["status"].as_str().unwrap_or("-");
    println!("{} {}", "Job".cyan().bold(), job["name"].as_str().unwrap_or("-").bold());
    println!();
    println!("  {} {}", "ID:".bold(), job["id"]);
    println!("  {} {}", "Status:".bold(), colored_status(status));
    println!("  {} {}", "Priority:".bold(), job["priority"]);
    println!("  {} {}", "Kind:".bold(), job["kind"].as_str().unwrap_or("-"));
    println!("  {} {}", "Workflow:".bold(), job["workflow_ref"].as_str().unwrap_or("-"));
    println!(
        "  {} {} runs, {}/{} retries used",
        "Attempts:".bold(),
        job["run_count"],
        job["retries_used"],
        job["retry_limit"]
    );
    if let Some(owner) = job["lease_owner"].as_str() {
        println!("  {} {} (expires {})", "Lease:".bold(), owner, job["lease_expires_at"]);
    }
    if let Some(ms) = job["duration_ms"].as_i64() {
        println!("  {} {}", "Duration:".bold(), format_duration(ms));
    }
    if let Some(error) = job["error"].as_str() {
        println!("  {} {}", "Error:".bold(), error.red());
    }
    println!();
    println!("  {}", "Payload:".bold());
    let payload = serde_json::to_string_pretty(&job["payload"]).unwrap_or_default();
    for line in payload.lines() {
        println!("    {}", line);
    }
    if !job["result"].is_null() {
        println!("  {}", "Result:".bold());
        let result = serde_json::to_string_pretty(&job["result"]).unwrap_or_default();
        for line in result.lines() {
            println!("    {}", line);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ls { status } => {
            let result = call_rpc(&cli.rpc_url, "queue.list.v1", json!({ "status": status })).await?;
            let rows: Vec<JobRow> = result["jobs"]
                .as_array()
                .map(|jobs| jobs.iter().map(JobRow::from_json).collect())
                .unwrap_or_default();

            if rows.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Show { name } => {
            let result = call_rpc(&cli.rpc_url, "queue.get.v1", json!({ "name": name })).await?;
            print_job(&result["job"]);
        }

        Commands::Priority { name, priority } => {
            let result = call_rpc(
                &cli.rpc_url,
                "queue.set_priority.v1",
                json!({ "name": name, "priority": priority }),
            )
            .await?;
            println!(
                "{}",
                format!("✓ {} priority set to {}", name, result["job"]["priority"])
                    .green()
                    .bold()
            );
        }

        Commands::GodMode { name } => {
            let result = call_rpc(&cli.rpc_url, "queue.god_mode.v1", json!({ "name": name })).await?;
            println!(
                "{}",
                format!("✓ {} moved to the front (priority {})", name, result["job"]["priority"])
                    .green()
                    .bold()
            );
        }

        Commands::Retry { name } => {
            call_rpc(&cli.rpc_url, "queue.retry.v1", json!({ "name": name })).await?;
            println!("{}", format!("✓ {} requeued", name).green().bold());
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Pending:".bold(), stats["pending_jobs"]);
                    println!("  {} {}", "Processing:".bold(), stats["processing_jobs"]);
                    println!("  {} {}", "Done:".bold(), stats["done_jobs"]);
                    println!("  {} {}", "Failed:".bold(), stats["failed_jobs"]);
                    println!();
                    match stats["avg_duration_ms"].as_f64() {
                        Some(ms) => println!(
                            "  {} {}",
                            "Avg Duration:".bold(),
                            format_duration(ms.round() as i64)
                        ),
                        None => println!("  {} -", "Avg Duration:".bold()),
                    }
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_row_from_listing() {
        let row = JobRow::from_json(&json!({
            "name": "T2I_dunes.yaml",
            "status": "failed",
            "kind": "T2I",
            "workflow_ref": "wf_portrait",
            "priority": 10,
            "run_count": 3,
            "retries_used": 2,
            "retry_limit": 2,
            "duration_ms": 2500,
            "error": null
        }));
        assert_eq!(row.priority, "10");
        assert_eq!(row.attempts, "3 (2/2 retries)");
        assert_eq!(row.duration, "2.5s");
        assert_eq!(row.error, "-");
    }

    #[test]
    fn test_truncate_long_errors() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("backend unavailable: refused", 12), "backend u...");
    }

    #[test]
    fn test_error_response_shape() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 4002, "message": "job is not failed"}
        }))
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, 4002);
        assert!(response.result.is_none());
    }
}
