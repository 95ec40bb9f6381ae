use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the Data Access Gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show settings, cache and threat overview
    Status,
    /// Show cache counters
    Cache,
    /// Drop every cached read of a table
    Invalidate {
        table: String,
    },
    /// Show recent security threats
    Threats {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Flush the pending audit batch
    Flush,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Cache => client.get(format!("{}/admin/cache", cli.url)),
        Commands::Invalidate { table } => {
            client.post(format!("{}/admin/cache/invalidate/{}", cli.url, table))
        }
        Commands::Threats { limit } => client
            .get(format!("{}/admin/threats", cli.url))
            .query(&[("limit", limit)]),
        Commands::Flush => client.post(format!("{}/admin/audit/flush", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.text().await?;

    if status.is_success() {
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{}", body),
        }
    } else {
        eprintln!("Error ({}): {}", status, body);
    }

    Ok(())
}
