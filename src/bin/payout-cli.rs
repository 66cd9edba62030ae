use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "payout-cli")]
#[command(about = "Client for the payout engine intake API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "PAYOUT_ENGINE_URL")]
    url: String,

    /// Bearer secret, when the engine is configured with one
    #[arg(short, long, env = "API_SECRET")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a batch payout request from a JSON file
    Submit {
        #[arg(short, long)]
        file: PathBuf,

        /// Override the batch id; a UUID is generated when the file has none
        #[arg(long)]
        batch_id: Option<String>,
    },
    /// List chains the engine can pay out on
    Chains,
    /// Check engine health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let res = match cli.command {
        Commands::Submit { file, batch_id } => {
            let mut batch: Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let batch_id = batch_id.unwrap_or_else(|| {
                batch
                    .get("batch_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
            });
            let Some(fields) = batch.as_object_mut() else {
                return Err(format!("{} does not contain a JSON object", file.display()).into());
            };
            fields.insert("batch_id".to_string(), Value::String(batch_id));

            client
                .post(format!("{}/v1/payouts/batch", cli.url))
                .headers(headers)
                .json(&batch)
                .send()
                .await?
        }
        Commands::Chains => {
            client
                .get(format!("{}/v1/chains", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/health", cli.url)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: payout engine returned status {}", status);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
