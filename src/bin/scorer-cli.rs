use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "scorer-cli")]
#[command(about = "Management CLI for the batch scoring service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "ADMIN_API_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show circuit breaker state and cache statistics
    Status,
    /// Show service version (admin)
    Admin,
    /// Force the circuit breaker closed (admin)
    ResetBreaker,
    /// Drop every cached score (admin)
    ClearCache,
    /// Score a batch read from a JSON file ({"items": [...], "context": {...}})
    Score { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/api/score/status", cli.url)).send().await?,
        Commands::Admin => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::ResetBreaker => {
            client
                .post(format!("{}/admin/breaker/reset", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::ClearCache => {
            client
                .post(format!("{}/admin/cache/clear", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Score { file } => {
            let body: Value = serde_json::from_slice(&std::fs::read(&file)?)?;
            client
                .post(format!("{}/api/score/batch", cli.url))
                .json(&body)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
