use bytes::Bytes;
use clap::{Parser, Subcommand};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use inference_bridge::config::config_search_paths;
use inference_bridge::relay::{decode_stream, encode_sse};
use inference_bridge::template::ChatMlTemplate;
use inference_bridge::translate::openai_types::ChatCompletionRequest;
use inference_bridge::{Backend, BridgeConfig, BridgeError, Dispatcher, SharedLogger};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "inference-bridge",
    about = "Translate OpenAI chat-completion traffic for Bedrock Anthropic and chat-template backends",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend name (overrides config)
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Tokenizer / chat template identifier (overrides config)
    #[arg(long, global = true)]
    template_id: Option<String>,

    /// Default system instruction (overrides config)
    #[arg(long, global = true)]
    system: Option<String>,

    /// Translation journal path (overrides config)
    #[arg(long, global = true)]
    journal: Option<PathBuf>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Translate an OpenAI chat-completion request and print the backend request
    Translate {
        /// Request JSON file; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Decode backend stream events into OpenAI chunks, printed as SSE
    Decode {
        /// Event file; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Model name echoed in every chunk
        #[arg(short, long, default_value = "")]
        model: String,

        /// Input uses SSE framing instead of one JSON event per line
        #[arg(long)]
        sse: bool,
    },
    /// List the known backends
    Backends,
}

type FrameStream = Pin<Box<dyn Stream<Item = inference_bridge::Result<Bytes>> + Send>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries translated output, so diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inference_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given, see --help");
    };

    if matches!(command, Command::Backends) {
        for backend in Backend::all() {
            println!("{:<10} {}", backend.name(), backend.description());
        }
        return Ok(());
    }

    let mut config = BridgeConfig::find_and_load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(id) = cli.template_id {
        config.model_template_id = Some(id);
    }
    if let Some(system) = cli.system {
        config.system_instruction = Some(system);
    }
    if let Some(journal) = cli.journal {
        config.journal_file = Some(journal);
    }

    let backend = config.backend()?;
    let dispatcher = Dispatcher::new(backend, Arc::new(ChatMlTemplate::default()));
    let journal = config
        .journal_file
        .as_ref()
        .map(SharedLogger::new)
        .transpose()?;

    info!(
        backend = %backend,
        template_id = config.model_template_id.as_deref().unwrap_or("-"),
        journal = ?config.journal_file,
        "inference-bridge v{}",
        env!("CARGO_PKG_VERSION")
    );

    match command {
        Command::Translate { input } => {
            run_translate(&dispatcher, &config, input.as_deref(), journal.as_ref()).await
        }
        Command::Decode { input, model, sse } => {
            run_decode(&dispatcher, input.as_deref(), model, sse, journal.as_ref()).await
        }
        Command::Backends => Ok(()),
    }
}

async fn run_translate(
    dispatcher: &Dispatcher,
    config: &BridgeConfig,
    input: Option<&Path>,
    journal: Option<&SharedLogger>,
) -> anyhow::Result<()> {
    let mut body = String::new();
    open_input(input).await?.read_to_string(&mut body).await?;

    let request: ChatCompletionRequest = serde_json::from_str(&body)?;
    let model = request.model.clone();
    let messages = request.messages.as_ref().map_or(0, Vec::len);

    let translated = match dispatcher.translate_request(request, &config.params()).await {
        Ok(t) => t,
        Err(e) => {
            if let Some(journal) = journal {
                // Rejected requests are journaled as warnings.
                if e.is_validation() {
                    journal.warn(dispatcher.strategy_name(), "translate", e.to_string());
                } else {
                    journal.error(dispatcher.strategy_name(), "translate", e.to_string());
                }
            }
            return Err(e.into());
        }
    };

    if let Some(journal) = journal {
        journal.log_with_context(
            inference_bridge::logging::LogLevel::Info,
            dispatcher.strategy_name(),
            "translate",
            format!("model={model}"),
            json!({ "messages": messages }),
        );
    }

    println!("{}", serde_json::to_string_pretty(&translated)?);
    Ok(())
}

async fn run_decode(
    dispatcher: &Dispatcher,
    input: Option<&Path>,
    model: String,
    sse: bool,
    journal: Option<&SharedLogger>,
) -> anyhow::Result<()> {
    let reader = open_input(input).await?;
    let frames = if sse { sse_frames(reader) } else { line_frames(reader) };

    let mut lines = Box::pin(encode_sse(decode_stream(
        dispatcher.strategy(),
        model.clone(),
        frames,
    )));
    let mut stdout = tokio::io::stdout();
    let mut chunks = 0usize;

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                stdout.write_all(line.as_bytes()).await?;
                chunks += 1;
            }
            Err(e) => {
                stdout.flush().await?;
                if let Some(journal) = journal {
                    journal.error(
                        dispatcher.strategy_name(),
                        "decode",
                        format!("model={model} after {chunks} chunks: {e}"),
                    );
                }
                return Err(e.into());
            }
        }
    }
    stdout.flush().await?;

    if let Some(journal) = journal {
        // The last line is the [DONE] sentinel.
        journal.info(
            dispatcher.strategy_name(),
            "decode",
            format!("model={model} chunks={}", chunks.saturating_sub(1)),
        );
    }
    Ok(())
}

async fn open_input(path: Option<&Path>) -> std::io::Result<Box<dyn AsyncRead + Unpin + Send>> {
    Ok(match path {
        Some(p) => Box::new(tokio::fs::File::open(p).await?),
        None => Box::new(tokio::io::stdin()),
    })
}

/// One backend event per input line.
fn line_frames(reader: Box<dyn AsyncRead + Unpin + Send>) -> FrameStream {
    let lines = LinesStream::new(BufReader::new(reader).lines());
    Box::pin(lines.map(|line| line.map(Bytes::from).map_err(BridgeError::from)))
}

/// SSE-framed input: each event's `data` is one backend event; `[DONE]` is dropped.
fn sse_frames(reader: Box<dyn AsyncRead + Unpin + Send>) -> FrameStream {
    let lines = LinesStream::new(BufReader::new(reader).lines()).map(|line| {
        line.map(|mut l| {
            l.push('\n');
            Bytes::from(l)
        })
    });

    Box::pin(lines.eventsource().filter_map(|event| async move {
        match event {
            Ok(event) if event.data == "[DONE]" => None,
            Ok(event) => Some(Ok(Bytes::from(event.data))),
            Err(e) => Some(Err(BridgeError::decode(format!("SSE framing error: {e}")))),
        }
    }))
}
