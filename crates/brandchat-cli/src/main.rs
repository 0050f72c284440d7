//! Terminal front end: sends one message and renders the assistant reply as it
//! streams in.

mod render;

use std::process::ExitCode;
use std::time::Duration;

use brandchat_client::observability::init_observability;
use brandchat_client::prelude::*;
use clap::Parser;
use tracing::info;

use crate::render::TerminalRenderer;

#[derive(Parser, Debug)]
#[command(name = "brandchat", about = "Chat with the brand strategy assistant")]
struct Args {
    /// Message to send.
    message: String,

    /// Backend base URL. Overrides `BRANDCHAT_API_URL`.
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token for the signed-in user.
    #[arg(long, env = "BRANDCHAT_TOKEN", hide_env_values = true)]
    token: String,

    /// Display name of the signed-in user.
    #[arg(long, env = "BRANDCHAT_USER")]
    user: Option<String>,

    /// Conversation to continue. A new one is started when omitted.
    #[arg(long)]
    conversation: Option<String>,

    /// Project whose documents scope the answer.
    #[arg(long)]
    project: Option<String>,

    /// Exchange timeout in seconds. Overrides `BRANDCHAT_TIMEOUT_SECS`.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// Flags win over environment variables; everything not given on the command
/// line comes from the environment.
fn resolve_config(
    args: &Args,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ClientError> {
    let mut config = match &args.api_url {
        Some(url) => ClientConfig::new(url.clone()).with_env_overrides(lookup)?,
        None => ClientConfig::from_lookup(lookup)?,
    };
    if let Some(secs) = args.timeout_secs {
        config = config.timeout(Duration::from_secs(secs));
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_observability("warn");
    let args = Args::parse();

    let config = resolve_config(&args, |key| std::env::var(key).ok())?;
    let session = SessionContext::signed_in(args.token, args.user);
    let client = ChatClient::new(config, session)?;

    let mut request = QueryRequest::new(args.message);
    if let Some(id) = args.conversation {
        request = request.conversation(id);
    }
    if let Some(id) = args.project {
        request = request.project(id);
    }

    let exchange = client.exchange(request, TerminalRenderer::stdout());
    let abort = exchange.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let message = exchange.run().await;
    println!();
    info!(id = %message.id, state = ?message.state, "reply finalized");

    Ok(match message.state {
        ExchangeState::Done => ExitCode::SUCCESS,
        ExchangeState::Cancelled => ExitCode::from(130),
        ExchangeState::Failed(_) | ExchangeState::Receiving => ExitCode::FAILURE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> impl Fn(&str) -> Option<String> {
        |key: &str| match key {
            "BRANDCHAT_API_URL" => Some("http://backend".into()),
            "BRANDCHAT_STREAM_PATH" => Some("/api/query/stream".into()),
            "BRANDCHAT_TIMEOUT_SECS" => Some("7".into()),
            _ => None,
        }
    }

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("args")
    }

    #[test]
    fn environment_supplies_url_path_and_timeout() {
        let args = parse(&["brandchat", "hola", "--token", "t"]);
        let config = resolve_config(&args, env()).expect("config");
        assert_eq!(config.base_url, "http://backend");
        assert_eq!(config.stream_path, "/api/query/stream");
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    #[test]
    fn flags_override_url_and_timeout_but_keep_env_path() {
        let args = parse(&[
            "brandchat",
            "hola",
            "--token",
            "t",
            "--api-url",
            "http://flag",
            "--timeout-secs",
            "3",
        ]);
        let config = resolve_config(&args, env()).expect("config");
        assert_eq!(config.base_url, "http://flag");
        assert_eq!(config.stream_path, "/api/query/stream");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn missing_url_everywhere_is_a_config_error() {
        let args = parse(&["brandchat", "hola", "--token", "t"]);
        let result = resolve_config(&args, |_| None);
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
