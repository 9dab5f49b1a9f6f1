use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the perimeter gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint an unsigned bearer token for test traffic
    Token {
        /// Identity value to embed
        #[arg(short, long)]
        name: String,

        /// Claim the identity is embedded under
        #[arg(long, default_value = "name")]
        claim: String,
    },
    /// Send a body through the gateway and print the relayed response
    Send {
        /// Bearer token (e.g. from the token subcommand)
        #[arg(short, long)]
        token: String,

        /// Request body
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token { name, claim } => {
            println!("{}", mint_token(&claim, &name)?);
        }
        Commands::Send { token, body } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

            let client = reqwest::Client::new();
            let res = client
                .post(&cli.url)
                .headers(headers)
                .body(body)
                .send()
                .await?;

            let status = res.status();
            let text = res.text().await?;
            println!("{}", status);
            if !text.is_empty() {
                println!("{}", text);
            }
            if !status.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Build an unsigned compact JWT carrying one claim. The gateway never
/// checks the signature segment, so it is left empty.
fn mint_token(claim: &str, value: &str) -> Result<String, serde_json::Error> {
    let mut claims = serde_json::Map::new();
    claims.insert(
        claim.to_string(),
        serde_json::Value::String(value.to_string()),
    );

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    Ok(format!("{header}.{payload}."))
}
