use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "catalog-cli")]
#[command(about = "Command line client for the catalog gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:7777")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health and enabled interceptors
    Health,
    /// Submit a product for evaluation
    Evaluate {
        #[arg(long)]
        product_name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        vendor_name: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        /// Sent as X-Session-Id
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Evaluate {
            product_name,
            description,
            vendor_name,
            price,
            category,
            session,
        } => {
            let mut headers = HeaderMap::new();
            if let Some(session) = session {
                headers.insert("x-session-id", HeaderValue::from_str(&session)?);
            }

            let body = json!({
                "productName": product_name,
                "description": description,
                "vendorName": vendor_name,
                "price": price,
                "category": category,
            });

            let res = client
                .post(format!("{}/products/evaluate", base))
                .headers(headers)
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
