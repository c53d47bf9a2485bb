use clap::{Parser, Subcommand};

use tubemind::acquire::StrategyKind;

/// Video used by `check-captions` when none is given.
pub const SAMPLE_VIDEO: &str = "rNxC16mlO60";

#[derive(Parser)]
#[command(
    name = "tubemind",
    about = "Summarize YouTube videos and chat about their transcripts",
    version
)]
pub struct Cli {
    /// Gemini model to use (overrides config)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Caption strategy to try, in order; repeat to build a chain
    #[arg(long = "strategy", value_enum, global = true)]
    pub strategies: Vec<StrategyKind>,

    /// Skip the randomized pauses between YouTube requests
    #[arg(long, global = true)]
    pub no_pacing: bool,

    /// Show config and strategy details on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the web UI
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Summarize a video, then answer questions read from stdin
    Chat {
        /// YouTube video URL
        url: String,
    },

    /// Send a canned prompt to the model to verify the API key
    CheckModel,

    /// Fetch a transcript through the strategy chain and preview it
    CheckCaptions {
        /// YouTube video URL or 11-character ID
        #[arg(default_value = SAMPLE_VIDEO)]
        video: String,
    },

    /// List models that support text generation
    Models,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_strategy_flags_keep_order() {
        let cli = Cli::try_parse_from([
            "tubemind",
            "--strategy",
            "innertube",
            "--strategy",
            "yt-dlp",
            "check-captions",
        ])
        .unwrap();
        assert_eq!(cli.strategies, vec![StrategyKind::InnerTube, StrategyKind::YtDlp]);
        match cli.command {
            Command::CheckCaptions { video } => assert_eq!(video, SAMPLE_VIDEO),
            _ => panic!("expected check-captions"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["tubemind", "serve", "--port", "9000", "--no-pacing"]).unwrap();
        assert!(cli.no_pacing);
        match cli.command {
            Command::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_chat_requires_url() {
        assert!(Cli::try_parse_from(["tubemind", "chat"]).is_err());
    }
}
