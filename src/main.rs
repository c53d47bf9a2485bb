use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use log::{debug, info, warn};
use tokio::io::AsyncBufReadExt;

use tubemind::acquire::{Acquirer, StrategyDeps};
use tubemind::config::{self, Config};
use tubemind::gemini::{GeminiClient, TextModel};
use tubemind::http::{self, Pacing};
use tubemind::normalize::truncate_chars;
use tubemind::session::{Assistant, Session};
use tubemind::{Error, VideoId, web};

mod cli;

use cli::Cli;

const CHECK_PROMPT: &str = "Say 'Hello, the API is working!'";
const PREVIEW_CHARS: usize = 200;

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("tubemind.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubemind")
        .join("logs")
}

fn tool_version(program: &Path) -> Option<String> {
    Command::new(program)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn build_after_help(config: &Config) -> String {
    let yt_dlp_line = match tool_version(&config.ytdlp_path) {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found; the yt-dlp caption strategy will be skipped)".to_string(),
    };

    let log_path = log_dir().join("tubemind.log");

    format!(
        "\nREQUIRED TOOLS:\n{yt_dlp_line}\n\nConfig is read from: {}\nLogs are written to: {}",
        config::config_path().display(),
        log_path.display()
    )
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref model) = cli.model {
        config.model = model.clone();
    }
    if !cli.strategies.is_empty() {
        config.strategies = cli.strategies.clone();
    }
    if cli.no_pacing {
        config.pacing = false;
    }
    if let cli::Command::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.host = host.clone();
        }
        if let Some(port) = port {
            config.port = *port;
        }
    }
}

fn build_acquirer(config: &Config, client: &reqwest::Client) -> Acquirer {
    let deps = StrategyDeps {
        http: Arc::new(client.clone()),
        ytdlp_path: config.ytdlp_path.clone(),
        retry: config.retry_policy(),
        pacing: if config.pacing { Pacing::enabled() } else { Pacing::none() },
    };
    let acquirer = Acquirer::from_kinds(&config.strategies, &deps);
    debug!("Strategy chain: {}", acquirer.strategy_names().join(" -> "));
    acquirer
}

fn build_model(config: &Config, client: &reqwest::Client) -> Result<GeminiClient> {
    let key = config::api_key()?;
    Ok(GeminiClient::new(client.clone(), key, config.model.clone()))
}

fn build_assistant(config: &Config, client: &reqwest::Client) -> Result<Assistant> {
    let model = build_model(config, client)?;
    Ok(Assistant::new(
        build_acquirer(config, client),
        Box::new(model),
        config.limits(),
    ))
}

async fn run_chat(assistant: &Assistant, url: &str) -> Result<ExitCode> {
    let mut session = Session::new();

    eprintln!("Fetching transcript...");
    let processed = match assistant.process(&mut session, url).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("Video: {}\n", processed.video_id.watch_url());
    match (session.summary(), processed.summary_error) {
        (Some(summary), _) => println!("--- Summary ---\n{summary}\n"),
        (None, Some(e)) => eprintln!("Summary failed: {}\n", e.user_message()),
        (None, None) => {}
    }
    eprintln!("Ask a question (\"/clear\" resets the conversation, \"exit\" quits).");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                session.clear_history();
                eprintln!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        match assistant.ask(&mut session, question).await {
            Ok(answer) => println!("\n{answer}\n"),
            Err(e) => eprintln!("Error generating response: {}", e.user_message()),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn model_failure_hints(err: &Error) -> &'static [&'static str] {
    match err {
        Error::ModelAuth(_) => &[
            "Check that GOOGLE_API_KEY in .env is correct",
            "Make sure the key is enabled for the Generative Language API",
            "Create a new key at https://aistudio.google.com/app/apikey",
        ],
        Error::RateLimited(_) => &["Quota exceeded; wait a few minutes or check your plan limits"],
        Error::ModelCallFailed(msg) if msg.contains("404") || msg.to_lowercase().contains("not found") => &[
            "The model name may be wrong or retired",
            "Run `tubemind models` to see what this key can use, then pass --model",
        ],
        Error::Network(_) => &["Check your internet connection and any proxy settings"],
        _ => &["Run with RUST_LOG=debug and check the log file for the full response"],
    }
}

async fn check_model(config: &Config, client: &reqwest::Client) -> Result<ExitCode> {
    let model = build_model(config, client)?;
    eprintln!("Testing model {} ...", model.model());

    match model.generate(CHECK_PROMPT).await {
        Ok(text) => {
            println!("✅ Success! Response: {}", text.trim());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("❌ Error: {e}");
            println!("\nPossible fixes:");
            for hint in model_failure_hints(&e) {
                println!("  - {hint}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn check_captions(config: &Config, client: &reqwest::Client, video: &str) -> Result<ExitCode> {
    let video_id = VideoId::parse_lenient(video)?;
    let acquirer = build_acquirer(config, client);
    eprintln!(
        "Fetching transcript for {video_id} via {}",
        acquirer.strategy_names().join(", ")
    );

    match acquirer.acquire(&video_id).await {
        Ok(transcript) => {
            println!("✅ Success! Transcript length: {} characters", transcript.char_count());
            println!("\nPreview:\n{}...", truncate_chars(transcript.as_str(), PREVIEW_CHARS));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("❌ {}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn list_models(config: &Config, client: &reqwest::Client) -> Result<ExitCode> {
    let gemini = build_model(config, client)?;
    let models = gemini.list_models().await.wrap_err("failed to list models")?;

    let usable: Vec<_> = models.iter().filter(|m| m.supports_generate_content()).collect();
    println!("Models supporting generateContent ({}):\n", usable.len());
    for m in usable {
        let name = m.name.strip_prefix("models/").unwrap_or(&m.name);
        if m.display_name.is_empty() {
            println!("  {name}");
        } else {
            println!("  {name:<40} {}", m.display_name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    setup_logging()?;

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env loaded: {e}");
    }

    // Load config file (non-fatal if missing/invalid)
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring config file: {e}");
        Config::default()
    });

    let after_help = build_after_help(&config);
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    apply_overrides(&mut config, &cli);

    if cli.verbose {
        let config_path = config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!(
            "Model: {}\nStrategies: {}\nPacing: {}",
            config.model,
            config
                .strategies
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            config.pacing
        );
    }

    let client = http::build_client(config.request_timeout()).wrap_err("failed to build HTTP client")?;

    match &cli.command {
        cli::Command::Serve { .. } => {
            let assistant = build_assistant(&config, &client)?;
            web::serve(&format!("{}:{}", config.host, config.port), assistant).await?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Chat { url } => {
            let assistant = build_assistant(&config, &client)?;
            run_chat(&assistant, url).await
        }
        cli::Command::CheckModel => check_model(&config, &client).await,
        cli::Command::CheckCaptions { video } => check_captions(&config, &client, video).await,
        cli::Command::Models => list_models(&config, &client).await,
    }
}
