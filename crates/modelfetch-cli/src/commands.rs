//! Subcommand definitions.

use clap::Subcommand;

use modelfetch_core::{DownloadPriority, ModelKind};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one or more files
    Get {
        /// URLs to download (http or https)
        #[arg(required = true)]
        urls: Vec<String>,
        /// Model reference recorded for the download (single URL only)
        #[arg(long = "model-ref")]
        model_ref: Option<String>,
        /// Model category: llm, stt, tts, vad, embedding, other
        #[arg(long, default_value = "other")]
        kind: ModelKind,
        /// Priority: low, normal, high, urgent
        #[arg(long, default_value = "normal")]
        priority: DownloadPriority,
        /// Expected SHA-256 of the file, hex encoded (single URL only)
        #[arg(long)]
        checksum: Option<String>,
        /// Maximum simultaneous transfers
        #[arg(short = 'j', long, env = "MODELFETCH_MAX_CONCURRENT", default_value_t = 3)]
        concurrency: usize,
        /// Automatic retries after a transient network failure
        #[arg(long, env = "MODELFETCH_RETRIES", default_value_t = 3)]
        retries: u32,
        /// Print events as JSON lines instead of progress bars
        #[arg(long)]
        json: bool,
    },
    /// Show resolved directories
    Paths,
}

#[cfg(test)]
mod tests {
    use crate::Cli;
    use crate::commands::Commands;
    use clap::Parser;
    use modelfetch_core::{DownloadPriority, ModelKind};

    #[test]
    fn test_get_defaults() {
        let cli = Cli::parse_from(["modelfetch", "get", "https://example.com/a.bin"]);
        let Some(Commands::Get {
            urls,
            kind,
            priority,
            concurrency,
            json,
            model_ref,
            checksum,
            ..
        }) = cli.command
        else {
            panic!("expected get command");
        };
        assert_eq!(urls, ["https://example.com/a.bin"]);
        assert_eq!(kind, ModelKind::Other);
        assert_eq!(priority, DownloadPriority::Normal);
        assert_eq!(concurrency, 3);
        assert!(!json);
        assert!(model_ref.is_none());
        assert!(checksum.is_none());
    }

    #[test]
    fn test_get_options() {
        let cli = Cli::parse_from([
            "modelfetch",
            "get",
            "--kind",
            "LLM",
            "--priority",
            "high",
            "--model-ref",
            "org/model",
            "-j",
            "1",
            "--json",
            "https://example.com/a.gguf",
        ]);
        let Some(Commands::Get {
            kind,
            priority,
            concurrency,
            json,
            model_ref,
            ..
        }) = cli.command
        else {
            panic!("expected get command");
        };
        assert_eq!(kind, ModelKind::Llm);
        assert_eq!(priority, DownloadPriority::High);
        assert_eq!(concurrency, 1);
        assert!(json);
        assert_eq!(model_ref.as_deref(), Some("org/model"));
    }

    #[test]
    fn test_get_rejects_unknown_kind() {
        let result = Cli::try_parse_from(["modelfetch", "get", "--kind", "video", "https://x/y"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_requires_url() {
        assert!(Cli::try_parse_from(["modelfetch", "get"]).is_err());
    }
}
