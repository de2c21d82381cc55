use chrono::Utc;
use clap::{Parser, Subcommand};
use qa_assistant_core::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use qa_assistant_core::config::{DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECS};
use qa_assistant_core::embeddings::DEFAULT_EMBEDDING_MODEL;
use qa_assistant_core::index::DEFAULT_TOP_K;
use qa_assistant_core::llm::DEFAULT_CHAT_MODEL;
use qa_assistant_core::memory::DEFAULT_WINDOW_SIZE;
use qa_assistant_core::{
    Answer, Assistant, AssistantConfig, CharacterNgramEmbedder, Embedder, IndexedAssistant,
    OpenAiChatModel, OpenAiEmbedder, StartupReport,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const FEEDBACK_QUESTION: &str = "Overall Session Feedback";
const FEEDBACK_RESPONSE: &str = "Overall Feedback";

type CliAssistant = IndexedAssistant<Box<dyn Embedder>, OpenAiChatModel>;

#[derive(Parser)]
#[command(name = "qa-assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder scanned for .docx and .pdf files
    #[arg(long, env = "DOCUMENT_FOLDER", default_value = "./data/")]
    document_folder: PathBuf,

    /// Where the vector index is persisted
    #[arg(long, env = "INDEX_PERSIST_PATH", default_value = "./chroma_store")]
    index_persist_path: PathBuf,

    /// Folder for conversation and feedback logs
    #[arg(long, env = "LOG_FOLDER", default_value = "./data/")]
    log_folder: PathBuf,

    #[arg(long, env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Question/answer pairs kept in conversation memory
    #[arg(long, env = "MEMORY_WINDOW_SIZE", default_value_t = DEFAULT_WINDOW_SIZE)]
    memory_window_size: usize,

    /// Documents returned per similarity search
    #[arg(long, env = "RETRIEVAL_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    /// Use local character trigram embeddings instead of the embeddings API.
    #[arg(long, global = true, default_value_t = false)]
    offline_embeddings: bool,
}

impl Cli {
    fn assistant_config(&self) -> AssistantConfig {
        AssistantConfig {
            document_folder: self.document_folder.clone(),
            index_persist_path: self.index_persist_path.clone(),
            log_folder: self.log_folder.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            memory_window_size: self.memory_window_size,
            top_k: self.top_k,
            api_key: self.api_key.clone().unwrap_or_default(),
            api_base_url: self.api_base_url.clone(),
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
            request_timeout_secs: self.request_timeout_secs,
            ..AssistantConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Build the index from the document folder, or load the persisted one.
    Index,
    /// Answer a single question and exit.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Interactive session on stdin. `/feedback <text>` records feedback, `/quit` exits.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter(&std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default()))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.assistant_config();
    config.validate()?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        offline_embeddings = cli.offline_embeddings,
        "qa-assistant boot"
    );

    let settings = config.provider_settings()?;
    let embedder: Box<dyn Embedder> = if cli.offline_embeddings {
        Box::new(CharacterNgramEmbedder::default())
    } else {
        Box::new(OpenAiEmbedder::new(settings.clone(), &config.embedding_model)?)
    };
    let model = OpenAiChatModel::new(settings, &config.chat_model)?;

    let (assistant, report) = Assistant::bootstrap(&config, embedder, model).await?;
    report_startup(&report);

    match cli.command {
        Command::Index => {
            println!(
                "{:?}: {} chunks in {} at {}",
                report.outcome,
                report.indexed_chunks,
                config.index_persist_path.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => {
            let mut session = assistant.new_session();
            let answer = assistant.answer(&mut session, &question).await?;
            print_answer(&answer);
            log_conversation(&assistant, &question, &answer);
        }
        Command::Chat => run_chat(&assistant).await?,
    }

    Ok(())
}

/// Directives come from `RUST_LOG`; without any, info and above are shown so
/// skipped documents and log write failures stay visible.
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

fn report_startup(report: &StartupReport) {
    for skipped in &report.skipped_files {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
    }
    info!(
        outcome = ?report.outcome,
        documents = report.loaded_documents,
        chunks = report.indexed_chunks,
        "index ready"
    );
}

#[derive(Debug, PartialEq, Eq)]
enum ReplInput<'a> {
    Blank,
    Quit,
    Feedback(&'a str),
    Question(&'a str),
}

fn parse_repl_line(line: &str) -> ReplInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Blank;
    }

    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match command {
        "/quit" if rest.trim().is_empty() => ReplInput::Quit,
        "/feedback" => ReplInput::Feedback(rest.trim()),
        _ => ReplInput::Question(line),
    }
}

async fn run_chat(assistant: &CliAssistant) -> anyhow::Result<()> {
    let mut session = assistant.new_session();
    let mut feedback_given = false;
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!(session = %session.id, "chat session started");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_repl_line(&line) {
            ReplInput::Blank => {}
            ReplInput::Quit => break,
            ReplInput::Feedback("") => println!("usage: /feedback <text>"),
            ReplInput::Feedback(_) if feedback_given => {
                println!("Feedback was already recorded for this session.");
            }
            ReplInput::Feedback(feedback) => {
                match assistant.record_feedback(feedback, FEEDBACK_QUESTION, FEEDBACK_RESPONSE) {
                    Ok(()) => {
                        feedback_given = true;
                        println!("Thank you for your feedback!");
                    }
                    Err(error) => warn!(%error, "failed to record feedback"),
                }
            }
            ReplInput::Question(question) => match assistant.answer(&mut session, question).await {
                Ok(answer) => {
                    print_answer(&answer);
                    log_conversation(assistant, question, &answer);
                }
                Err(error) => println!("error: {error}"),
            },
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("Sources:");
        for source in &answer.sources {
            println!("- {source}");
        }
    }
}

fn log_conversation(assistant: &CliAssistant, question: &str, answer: &Answer) {
    if let Err(error) = assistant.record_conversation(question, &answer.text) {
        warn!(%error, "failed to record conversation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_log_directives_still_show_warnings() {
        assert_eq!(log_filter("").max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter("debug").max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter("error").max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn offline_embeddings_flag_is_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "qa-assistant",
            "ask",
            "--question",
            "What is a swap?",
            "--offline-embeddings",
        ])
        .unwrap();

        assert!(cli.offline_embeddings);
        assert!(matches!(
            cli.command,
            Command::Ask { ref question } if question == "What is a swap?"
        ));
    }

    #[test]
    fn repl_commands_match_whole_words() {
        assert_eq!(parse_repl_line("   "), ReplInput::Blank);
        assert_eq!(parse_repl_line("/quit"), ReplInput::Quit);
        assert_eq!(
            parse_repl_line("/feedback  very helpful "),
            ReplInput::Feedback("very helpful")
        );
        assert_eq!(parse_repl_line("/feedback"), ReplInput::Feedback(""));
        assert_eq!(
            parse_repl_line("/feedbackfoo"),
            ReplInput::Question("/feedbackfoo")
        );
        assert_eq!(
            parse_repl_line(" What is a cap? "),
            ReplInput::Question("What is a cap?")
        );
    }
}
