use std::time::Duration;

use chatai::{
    CancellationToken, CompletionClient, CompletionConfig, GeminiClient, GeminiConfig,
    HttpClientConfig, Provider,
};
use clap::Parser;
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

/// Ask Gemini a question, falling back across models when one is unavailable
/// or rate limited.
#[derive(Debug, Parser)]
#[command(name = "chatai", version)]
struct Cli {
    /// Message to send
    #[arg(required_unless_present = "list_models")]
    prompt: Option<String>,

    /// System instruction prepended to the message
    #[arg(long, short)]
    system: Option<String>,

    /// Candidate model, most preferred first (repeatable)
    #[arg(long = "model", short = 'm')]
    models: Vec<String>,

    /// Attempts per model on rate limiting
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Base backoff delay in seconds, doubled on each retry
    #[arg(long, default_value_t = 2)]
    base_delay_secs: u64,

    /// Give up on the whole call after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the API base URL
    #[arg(long, env = "GEMINI_BASE_URL")]
    base_url: Option<String>,

    /// Print the models this key can use for generateContent and exit
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatai=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut gemini_config = match cli.api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => GeminiConfig::new(key),
        None => GeminiConfig::from_env(),
    }
    .with_http_config(HttpClientConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
    });
    if let Some(base_url) = cli.base_url {
        gemini_config = gemini_config.with_base_url(base_url);
    }

    let gemini = GeminiClient::new(gemini_config)?;
    tracing::debug!(provider = %Provider::Gemini, "Client ready");

    if cli.list_models {
        for name in gemini.list_models().await? {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = CompletionConfig::default()
        .with_max_retries(cli.max_retries)
        .with_base_delay(Duration::from_secs(cli.base_delay_secs));
    if !cli.models.is_empty() {
        config = config.with_models(cli.models);
    }
    if let Some(secs) = cli.deadline_secs {
        config = config.with_deadline(Duration::from_secs(secs));
    }

    let client = CompletionClient::new(gemini, config)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let prompt = cli.prompt.unwrap_or_default();
    let reply = client
        .complete_with_cancellation(&prompt, cli.system.as_deref(), &cancel)
        .await?;
    println!("{reply}");

    Ok(())
}
