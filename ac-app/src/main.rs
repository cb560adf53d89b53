//! apichat main binary.
//!
//! `apichat chat` runs an interactive conversation with Claude or GPT; `apichat describe`
//! sends one image to a vision model and prints the answer.

mod commands;
mod config;
mod describe;
mod repl;

use ac_llm::{LlmError, Provider, ReqwestTransport, Transport};
use clap::{Parser, Subcommand};
use config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "apichat",
    version,
    about = "Chat with Claude or GPT over their HTTP APIs, or describe an image"
)]
struct Cli {
    /// TOML config file. Default: ~/.apichat/config.toml (optional).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an interactive chat session.
    Chat {
        /// anthropic or openai.
        #[arg(long, short = 'P', default_value = "anthropic")]
        provider: Provider,
        /// Override the configured model.
        #[arg(long)]
        model: Option<String>,
        /// Initial system message.
        #[arg(long)]
        system: Option<String>,
    },
    /// Analyze an image (jpg, jpeg, png, gif, webp) with a vision model.
    #[command(
        after_help = "Example:\n  apichat describe photo.jpg\n  apichat describe photo.png --prompt 'What objects are in this image?'"
    )]
    Describe {
        /// Path to the image file.
        image_path: PathBuf,
        /// Custom prompt (default: general description).
        #[arg(long, short)]
        prompt: Option<String>,
        /// Override the configured vision model.
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; variables may come from the real environment.
    let _ = dotenvy::dotenv();
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config).await?;
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new());

    match cli.command {
        Command::Chat {
            provider,
            model,
            system,
        } => chat(&cfg, transport, provider, model, system).await,
        Command::Describe {
            image_path,
            prompt,
            model,
        } => {
            let api_key = require_key_or_exit(&cfg, Provider::OpenAI);
            let mut vision = cfg.vision.clone();
            if let Some(model) = model {
                vision.model = model;
            }
            let describer = describe::describer(&api_key, &vision, transport);
            let mut stdout = std::io::stdout();
            if let Err(message) =
                describe::run(&describer, &image_path, prompt.as_deref(), &mut stdout).await
            {
                eprintln!("Error: {message}");
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn chat(
    cfg: &AppConfig,
    transport: Arc<dyn Transport>,
    provider: Provider,
    model: Option<String>,
    system: Option<String>,
) -> anyhow::Result<()> {
    let api_key = require_key_or_exit(cfg, provider);
    let mut settings = cfg.provider(provider).chat_settings();
    if let Some(model) = model {
        settings.model = model;
    }

    let mut conversation = ac_llm::connect(provider, &api_key, settings, transport);
    conversation.set_system_instruction(system.as_deref().unwrap_or(&cfg.general.system_prompt));
    tracing::info!(%provider, model = conversation.model(), "chat session started");

    let mut stdout = std::io::stdout();
    repl::print_banner(&mut stdout, provider.title())?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let exit = repl::run(conversation.as_mut(), stdin, &mut stdout, shutdown).await?;
    tracing::info!(?exit, turns = conversation.transcript().len(), "chat session ended");
    Ok(())
}

/// Missing credentials are fatal: print the remediation hint and exit.
fn require_key_or_exit(cfg: &AppConfig, provider: Provider) -> String {
    match cfg.require_api_key(provider) {
        Ok(key) => key.to_string(),
        Err(e) => {
            eprintln!("Error: {}", missing_key_message(&e));
            std::process::exit(1);
        }
    }
}

fn missing_key_message(err: &LlmError) -> String {
    match err {
        LlmError::Configuration(hint) => hint.clone(),
        other => other.to_string(),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    // Quiet by default so log lines do not interleave with the conversation.
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("warn"),
    };
    let log_format = std::env::var("APICHAT_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported APICHAT_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::debug!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_chat_and_describe() {
        let cli = Cli::try_parse_from([
            "apichat",
            "chat",
            "--provider",
            "openai",
            "--system",
            "Be brief.",
        ])
        .expect("chat args parse");
        match cli.command {
            Command::Chat {
                provider, system, ..
            } => {
                assert_eq!(provider, Provider::OpenAI);
                assert_eq!(system.as_deref(), Some("Be brief."));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["apichat", "describe", "photo.png", "-p", "What is this?"])
            .expect("describe args parse");
        match cli.command {
            Command::Describe {
                image_path, prompt, ..
            } => {
                assert_eq!(image_path, PathBuf::from("photo.png"));
                assert_eq!(prompt.as_deref(), Some("What is this?"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn chat_defaults_to_anthropic_and_rejects_unknown_provider() {
        let cli = Cli::try_parse_from(["apichat", "chat"]).expect("chat args parse");
        assert!(matches!(
            cli.command,
            Command::Chat {
                provider: Provider::Anthropic,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["apichat", "chat", "--provider", "gemini"]).is_err());
    }

    #[test]
    fn missing_key_message_is_the_bare_hint() {
        let cfg = AppConfig::defaults();
        let err = cfg
            .require_api_key(Provider::Anthropic)
            .expect_err("defaults carry no keys");
        let message = missing_key_message(&err);
        assert!(message.starts_with("ANTHROPIC_API_KEY not found in environment variables."));
        assert!(message.ends_with("ANTHROPIC_API_KEY=your-api-key-here"));
        assert_eq!(missing_key_message(&LlmError::Timeout), "Request timed out");
    }

    #[test]
    fn panic_payload_handles_str_and_string() {
        let s: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_payload_to_string(s.as_ref()), "boom");
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_payload_to_string(s.as_ref()), "bang");
    }
}
