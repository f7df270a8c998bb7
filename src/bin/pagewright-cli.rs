use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "pagewright-cli")]
#[command(about = "Operator CLI for a running pagewright server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server mode, route count and cache size
    Status,
    /// List the active route table
    Routes,
    /// Show which route a path resolves to
    Resolve {
        /// Request path, e.g. /work/
        path: String,
    },
    /// Inspect the compiled style cache
    Cache,
    /// Drop every compiled style and generated asset
    Purge,
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

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Routes => client.get(format!("{}/admin/routes", cli.url)),
        Commands::Resolve { path } => client
            .get(format!("{}/admin/resolve", cli.url))
            .query(&[("path", path)]),
        Commands::Cache => client.get(format!("{}/admin/cache", cli.url)),
        Commands::Purge => client.post(format!("{}/admin/purge", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
