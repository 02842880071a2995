//! Rincewrite binary: a writing companion in the terminal.
//!
//! Asks about the piece and the writer, then chats. `--thread-id` with `--db`
//! continues a stored conversation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use config::Settings;
use rincewrite::{
    ChatOpenAI, Checkpointer, ConversationGraph, ConversationState, JsonSerializer, LlmClient,
    MockLlm, PromptRegistry, Session, SqliteSaver,
};
use rincewrite_cli::{run_session, TerminalView};

const MOCK_WELCOME: &str = "Welcome! I am running without a model, so my answers are canned. \
Tell me about the first scene you have in mind.";
const MOCK_REPLY: &str = "That sounds promising. What should the reader feel at that point?";

#[derive(Parser, Debug)]
#[command(name = "rincewrite")]
#[command(about = "Rincewrite: a writing companion that helps you structure your piece")]
struct Args {
    /// Conversation thread to start or continue (default: a new id per session)
    #[arg(long, value_name = "ID")]
    thread_id: Option<String>,

    /// Chat model name (default: RINCEWRITE_MODEL / OPENAI_MODEL / MODEL, else gpt-3.5-turbo)
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Sampling temperature (default: RINCEWRITE_TEMPERATURE, else 0.7)
    #[arg(long, value_name = "T", value_parser = parse_temperature)]
    temperature: Option<f32>,

    /// SQLite file for conversations (default: RINCEWRITE_DB, else in memory)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Directory of prompt templates overriding the built-in ones (default: PROMPTS_DIR)
    #[arg(long, value_name = "DIR")]
    prompts_dir: Option<PathBuf>,

    /// Seconds to wait for a model reply (default: RINCEWRITE_TIMEOUT_SECS, else 120)
    #[arg(long, value_name = "N")]
    timeout_secs: Option<u64>,

    /// Use canned replies instead of a model (no API key needed)
    #[arg(long)]
    mock: bool,
}

fn parse_temperature(raw: &str) -> Result<f32, String> {
    let t: f32 = raw.trim().parse().map_err(|e| format!("{}", e))?;
    if !config::TEMPERATURE_RANGE.contains(&t) {
        return Err("expected 0.0 to 2.0".to_string());
    }
    Ok(t)
}

impl Args {
    /// Flags override environment settings.
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(t) = self.temperature {
            settings.temperature = t;
        }
        if let Some(secs) = self.timeout_secs {
            settings.model_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(db) = &self.db {
            settings.db_path = Some(db.clone());
        }
        if let Some(dir) = &self.prompts_dir {
            settings.prompts_dir = Some(dir.clone());
        }
        settings
    }
}

fn generate_thread_id() -> String {
    format!("thread-{}", uuid::Uuid::new_v4())
}

fn build_graph(
    settings: &Settings,
    mock: bool,
) -> Result<ConversationGraph, Box<dyn std::error::Error>> {
    let llm: Arc<dyn LlmClient> = if mock {
        Arc::new(
            MockLlm::with_replies(vec![MOCK_WELCOME.to_string(), MOCK_REPLY.to_string()])
                .with_stream_by_char(),
        )
    } else {
        Arc::new(ChatOpenAI::new(settings.model.clone()).with_temperature(settings.temperature))
    };
    let prompts = PromptRegistry::load_or_default(settings.prompts_dir.as_deref())?;

    let mut builder = ConversationGraph::builder(llm)
        .prompts(prompts)
        .model_timeout(settings.model_timeout);
    if let Some(path) = &settings.db_path {
        let saver: Arc<dyn Checkpointer<ConversationState>> =
            Arc::new(SqliteSaver::new(path, Arc::new(JsonSerializer))?);
        builder = builder.checkpointer(saver);
    }
    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_and_apply("rincewrite", None).ok();
    let _log_guard = config::logging::init()?;

    let args = Args::parse();
    let settings = args.apply(Settings::from_env()?);
    tracing::info!(
        model = %settings.model,
        temperature = settings.temperature,
        db = ?settings.db_path,
        mock = args.mock,
        "starting rincewrite"
    );
    let graph = build_graph(&settings, args.mock)?;

    let thread_id = args.thread_id.clone().unwrap_or_else(generate_thread_id);
    let reopened = Session::reopen(graph.clone(), &thread_id, TerminalView::stdout()).await?;
    let mut session = match reopened {
        Some(mut session) => {
            let state = session.state().clone();
            let view = session.view_mut();
            view.line(&format!("Continuing thread {}", thread_id));
            view.line(state.renderer_content.trim_end());
            view.print_transcript(&state);
            session
        }
        None => Session::new(graph, thread_id, TerminalView::stdout()),
    };

    let in_turn = Arc::new(AtomicBool::new(false));
    let canceller = session.canceller();
    let flag = in_turn.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if flag.load(Ordering::SeqCst) {
                canceller.cancel();
            } else {
                println!();
                std::process::exit(130);
            }
        }
    });

    let input = BufReader::new(tokio::io::stdin()).lines();
    run_session(&mut session, input, in_turn).await?;
    Ok(())
}
