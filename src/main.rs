use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use realtime_scribe::sdk::{BridgeEvent, EventKind};
use realtime_scribe::{Assistant, AssistantConfig};

/// Voice-driven writing assistant with local markdown and script tools
#[derive(Parser, Debug)]
#[command(name = "realtime-scribe")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding the markdown files
    #[arg(short = 'w', long = "working-dir", value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Directory holding script definitions
    #[arg(short = 's', long = "scripts-dir", value_name = "DIR")]
    scripts_dir: Option<PathBuf>,

    /// Voice used for spoken responses
    #[arg(long)]
    voice: Option<String>,
}

const HELP: &str = "Type a message and press enter. Commands: /commit /cancel /progress /scripts /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AssistantConfig::load()?;
    if let Some(dir) = cli.working_dir {
        config.working_directory = dir;
    }
    if let Some(dir) = cli.scripts_dir {
        config.scripts_directory = dir;
    }
    if let Some(voice) = cli.voice {
        config.voice = voice;
    }
    if config.api_key.is_none() {
        anyhow::bail!("OPENAI_API_KEY is not set");
    }

    let assistant = Assistant::new(config).await?;
    let bridge = assistant.bridge().clone();
    bridge.register_event_handler(EventKind::TextDelta, |event| async move {
        if let BridgeEvent::TextDelta(delta) = event {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        Ok(())
    });

    let session = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.connect().await }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let result = match line {
            "/quit" => break,
            "/commit" => bridge.commit_audio_buffer().await,
            "/cancel" => bridge.cancel_response().await,
            "/progress" => {
                let progress = assistant.scripts().lock().progress();
                println!("{}", serde_json::to_string_pretty(&progress)?);
                Ok(())
            }
            "/scripts" => {
                let library = assistant.scripts().lock().library().clone();
                for (name, description) in library.list().await {
                    println!("  {name}: {description}");
                }
                Ok(())
            }
            text if text.starts_with('/') => {
                println!("{HELP}");
                Ok(())
            }
            text => bridge.send_text(text).await,
        };
        if let Err(err) = result {
            eprintln!("error: {err}");
        }
        if session.is_finished() {
            break;
        }
    }

    assistant.shutdown().await;
    match session.await? {
        Ok(()) => Ok(()),
        Err(err) => Err(err.into()),
    }
}
