//! `docqa`: chat with multiple research papers from the terminal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docqa_chat::{
    PaperMetadata, SessionError, SessionManager, SessionReply, loader, unique_document_ids,
};
use docqa_cli::AppConfig;
use docqa_cli::render::{history_listing, metadata_json, metadata_listing};
use docqa_model::{RetryPolicy, retry_with_backoff};
use docqa_rag::Document;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Chat with multiple research papers")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Chunks retrieved per question (overrides DOCQA_TOP_K)
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Answer each question without earlier turns (overrides DOCQA_MEMORY)
    #[arg(long, global = true)]
    no_memory: bool,

    /// Chat model name (overrides DOCQA_CHAT_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if self.no_memory {
            config.memory = false;
        }
        if let Some(model) = &self.model {
            config.chat_model = model.clone();
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Upload papers and ask questions interactively
    Chat {
        /// PDF, text or markdown files to upload
        files: Vec<PathBuf>,
    },
    /// Upload papers, answer one question, and exit
    Ask {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        question: String,
    },
    /// Upload papers and print the extracted metadata table
    Metadata {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// The single session the binary drives.
struct App {
    manager: SessionManager,
    session_id: String,
    retry: RetryPolicy,
}

impl App {
    async fn new(config: &AppConfig) -> Result<Self> {
        let manager = SessionManager::new(config.services()?);
        let session_id = manager.create_session().await;
        Ok(Self { manager, session_id, retry: config.retry_policy() })
    }

    async fn upload(&self, files: &[PathBuf]) -> Result<(Vec<String>, Vec<PaperMetadata>)> {
        let documents = unique_document_ids(load_documents(files).await?);
        let names: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let manager = &self.manager;
        let session_id = self.session_id.as_str();
        let rows = retry_with_backoff(&self.retry, "upload", SessionError::is_retryable, move || {
            manager.upload(session_id, documents.clone())
        })
        .await
        .context("failed to index documents")?;
        info!(documents = names.len(), "upload complete");
        Ok((names, rows))
    }

    async fn ask(&self, question: &str) -> Result<SessionReply> {
        let manager = &self.manager;
        let session_id = self.session_id.as_str();
        let reply = retry_with_backoff(&self.retry, "ask", SessionError::is_retryable, move || {
            manager.ask(session_id, question)
        })
        .await
        .context("failed to answer question")?;
        Ok(reply)
    }

    async fn history(&self) -> String {
        match self.manager.get(&self.session_id).await {
            Some(session) => history_listing(session.lock().await.history().turns()),
            None => history_listing(&[]),
        }
    }
}

async fn load_documents(files: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let document = loader::load_path(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        debug!(document = %document.id, chars = document.text.len(), "loaded document");
        documents.push(document);
    }
    Ok(documents)
}

fn print_reply(reply: &SessionReply) {
    println!("{}", reply.text());
    if let SessionReply::Answer(answer) = reply {
        let documents = answer.documents();
        if !documents.is_empty() {
            println!("\nSources: {}", documents.join(", "));
        }
    }
    println!();
}

async fn run_chat(app: &App, files: &[PathBuf]) -> Result<()> {
    if !files.is_empty() {
        let (names, rows) = app.upload(files).await?;
        print!("{}", metadata_listing(&names, &rows));
    }

    println!("Ask a question about your papers.");
    println!("Commands: :upload <files>  :reset  :history  :quit\n");

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("docqa> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match line {
            ":quit" | ":q" | ":exit" => break,
            ":reset" => {
                app.manager.reset(&app.session_id).await?;
                println!("Session cleared.\n");
            }
            ":history" => print!("{}", app.history().await),
            _ if line.starts_with(":upload") => {
                let files: Vec<PathBuf> =
                    line.split_whitespace().skip(1).map(PathBuf::from).collect();
                if files.is_empty() {
                    println!("Usage: :upload <files>...\n");
                    continue;
                }
                match app.upload(&files).await {
                    Ok((names, rows)) => print!("{}", metadata_listing(&names, &rows)),
                    Err(e) => error!("{e:#}"),
                }
            }
            question => match app.ask(question).await {
                Ok(reply) => print_reply(&reply),
                Err(e) => error!("{e:#}"),
            },
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config);
    debug!(?config, "loaded configuration");
    let app = App::new(&config).await?;

    match cli.command {
        Command::Chat { files } => run_chat(&app, &files).await?,
        Command::Ask { files, question } => {
            app.upload(&files).await?;
            print_reply(&app.ask(&question).await?);
        }
        Command::Metadata { files, json } => {
            let (names, rows) = app.upload(&files).await?;
            if json {
                println!("{}", metadata_json(&names, &rows)?);
            } else {
                print!("{}", metadata_listing(&names, &rows));
            }
        }
    }
    Ok(())
}
