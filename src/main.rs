use clap::{Parser, Subcommand};
use nutrition_rag::{app::App, config::Config, utils::init_logger};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

/// The scripted conversation of the original notebook: a memory check
/// followed by questions answered from the PDFs.
const DEMO_QUERIES: [&str; 5] = [
    "Hello, my name is Lin. My favorite food is pizza.",
    "Can you tell me how many letters are there in my favorite food?",
    "Tell me the ingredients of pumpkin bites.",
    "Tell me about Tell me about amount of calories needed for people?",
    "Can you tel me about pre-workout meals?",
];

#[derive(Parser)]
#[command(name = "nutrition-rag", version, about = "Ask questions about a folder of nutrition PDFs")]
struct Cli {
    /// Directory containing the source PDFs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory holding the persisted vector index
    #[arg(long, global = true)]
    persist_dir: Option<PathBuf>,

    /// Gemini chat model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(short = 'k', long = "top-k", global = true)]
    top_k: Option<usize>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Build the vector index from the data directory
    Ingest {
        /// Rebuild even if an index already exists
        #[arg(long)]
        force: bool,
    },
    /// Ask one or more questions in a single conversation
    Ask {
        #[arg(required = true)]
        queries: Vec<String>,
    },
    /// Interactive conversation on stdin
    Chat,
    /// Run the scripted demo conversation (default)
    Demo,
}

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq)]
enum ChatInput<'a> {
    Empty,
    Exit,
    Reset,
    Query(&'a str),
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => ChatInput::Empty,
            "exit" | "quit" => ChatInput::Exit,
            "/reset" => ChatInput::Reset,
            query => ChatInput::Query(query),
        }
    }
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.data_dir {
            config.index.data_directory = dir.clone();
        }
        if let Some(dir) = &self.persist_dir {
            config.index.persist_directory = dir.clone();
        }
        if let Some(model) = &self.model {
            config.chat.model = model.clone();
        }
        if let Some(k) = self.top_k {
            config.chat.top_k = k;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = Config::from_env()?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    info!(index = ?config.index, chat = ?config.chat, "Configuration loaded");

    match cli.command.unwrap_or(Command::Demo) {
        Command::Ingest { force } => {
            let embedder = App::google_embedder(&config)?;
            let store = App::load_or_build_index(&config, embedder.as_ref(), force).await?;
            println!(
                "Index at {} holds {} chunks ({} dimensions, {})",
                config.index.persist_directory.display(),
                store.len(),
                store.dimension(),
                store.embedding_model()
            );
        }
        Command::Ask { queries } => {
            let app = App::bootstrap(config).await?;
            let mut agent = app.agent()?;
            for query in queries {
                println!("{}", agent.call(&query).await?);
            }
        }
        Command::Demo => {
            let app = App::bootstrap(config).await?;
            let mut agent = app.agent()?;
            for query in DEMO_QUERIES {
                println!("{}", agent.call(query).await?);
            }
        }
        Command::Chat => {
            let app = App::bootstrap(config).await?;
            let mut agent = app.agent()?;
            run_chat(&mut agent).await?;
        }
    }

    Ok(())
}

async fn run_chat(agent: &mut nutrition_rag::agents::RagAgent) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Ask about nutrition. Type /reset to forget the conversation, exit to quit.\n")
        .await?;

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => break,
            ChatInput::Reset => {
                agent.reset();
                stdout.write_all(b"Conversation cleared.\n").await?;
            }
            ChatInput::Query(query) => match agent.call(query).await {
                Ok(answer) => {
                    stdout.write_all(format!("\n{}\n", answer).as_bytes()).await?;
                }
                Err(e) => {
                    error!(error = %e, "Failed to answer");
                    stdout.write_all(format!("\nError: {}\n", e).as_bytes()).await?;
                }
            },
        }
    }

    stdout.flush().await?;
    Ok(())
}
