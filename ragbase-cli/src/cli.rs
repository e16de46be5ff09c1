//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ragbase_rag::Namespace;

/// Ingest documents and ask questions about them.
#[derive(Parser, Debug)]
#[command(name = "ragbase", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the persisted vector index
    #[arg(long, global = true, env = "RAGBASE_STORE_DIR", default_value = ".ragbase")]
    pub store_dir: PathBuf,

    #[command(flatten)]
    pub models: ModelArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "RAGBASE_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk, embed and index files or directories
    Ingest(IngestArgs),

    /// Start an interactive conversation over an index
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Files or directories to ingest (directories are searched for text files)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Maximum characters per chunk
    #[arg(long, env = "RAGBASE_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[arg(long, env = "RAGBASE_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Overwrite chunks that were ingested before instead of skipping them
    #[arg(long)]
    pub replace: bool,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Conversation id; a fresh one is generated when omitted
    #[arg(long, env = "RAGBASE_SESSION")]
    pub session: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(long, env = "RAGBASE_TOP_K")]
    pub top_k: Option<usize>,

    /// Reply with the fixed not-found sentence when nothing relevant is indexed
    #[arg(long)]
    pub strict: bool,
}

/// Which namespace a command works on.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Use the per-user namespace `user_<id>`
    #[arg(long, env = "RAGBASE_USER", conflicts_with = "namespace")]
    pub user: Option<String>,

    /// Use an explicitly named namespace
    #[arg(long, env = "RAGBASE_NAMESPACE")]
    pub namespace: Option<String>,
}

impl TargetArgs {
    pub fn resolve(&self) -> ragbase_rag::Result<Namespace> {
        match (&self.namespace, &self.user) {
            (Some(name), _) => Namespace::new(name.as_str()),
            (None, Some(user)) => Ok(Namespace::for_user(user)),
            (None, None) => Ok(Namespace::default()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Offline lexical hashing embedder
    Hashing,
    /// Ollama `/api/embed`
    Ollama,
}

/// Model selection shared by both subcommands.
///
/// Ingestion and chat must use the same embedder; the index rejects vectors
/// of a different length.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Embedding backend
    #[arg(long, global = true, env = "RAGBASE_EMBEDDER", value_enum, default_value = "hashing")]
    pub embedder: EmbedderKind,

    /// Embedding length (hashing) or declared model output length (ollama)
    #[arg(long, global = true, env = "RAGBASE_DIMENSIONS")]
    pub dimensions: Option<usize>,

    /// Ollama embedding model, overriding OLLAMA_EMBED_MODEL
    #[arg(long, global = true, env = "RAGBASE_EMBED_MODEL")]
    pub embed_model: Option<String>,

    /// Ollama chat model, overriding OLLAMA_MODEL
    #[arg(long, global = true, env = "RAGBASE_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature for the chat model
    #[arg(long, global = true, env = "RAGBASE_TEMPERATURE")]
    pub temperature: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ingest_for_a_user() {
        let cli = Cli::try_parse_from(["ragbase", "ingest", "notes", "a.md", "--user", "alice"])
            .unwrap();
        let Command::Ingest(args) = cli.command else { panic!("expected ingest") };
        assert_eq!(args.paths, vec![PathBuf::from("notes"), PathBuf::from("a.md")]);
        assert_eq!(args.target.resolve().unwrap().as_str(), "user_alice");
        assert_eq!(args.chunk_size, 1000);
        assert!(!args.replace);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "ragbase",
            "chat",
            "--namespace",
            "team",
            "--embedder",
            "ollama",
            "--store-dir",
            "/tmp/idx",
        ])
        .unwrap();
        assert_eq!(cli.models.embedder, EmbedderKind::Ollama);
        assert_eq!(cli.store_dir, PathBuf::from("/tmp/idx"));
        let Command::Chat(args) = cli.command else { panic!("expected chat") };
        assert_eq!(args.target.resolve().unwrap().as_str(), "team");
        assert!(args.session.is_none());
    }

    #[test]
    fn user_and_namespace_conflict() {
        let result =
            Cli::try_parse_from(["ragbase", "chat", "--user", "a", "--namespace", "b"]);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_needs_a_path() {
        assert!(Cli::try_parse_from(["ragbase", "ingest"]).is_err());
    }

    #[test]
    fn no_target_uses_default_namespace() {
        assert_eq!(TargetArgs::default().resolve().unwrap(), Namespace::default());
    }
}
