//! Runs the scenario agents in the terminal.

#[macro_use]
extern crate tracing;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use stepwise::Error;
use stepwise::core::{Agent, AgentBuilder};
use stepwise::knowledge::{
    HashingEmbedder, InMemoryVectorStore, VectorStore, load_documents,
};
use stepwise::scenarios::*;
use stepwise_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

const BAR_CHAR: &str = "▎";

#[derive(Parser)]
#[command(name = "stepwise", version, about = "Tool-calling agent scenarios")]
struct Cli {
    /// API key of the OpenAI-compatible service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Base URL of the service.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,
    /// Chat model name.
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,
    /// Embedding model used by the search scenarios.
    #[arg(long, env = "OPENAI_EMBEDDING_MODEL")]
    embedding_model: Option<String>,
    /// Log debug output unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze four weeks of expenses by category.
    Expenses {
        /// File with weekly expense data. Uses sample data if omitted.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Answer a compound interest question.
    Interest,
    /// List a café table's orders and generate order ids.
    Cafe {
        /// CSV file with a `table_id,drink_name,size` header.
        #[arg(long, default_value = "orders.csv")]
        orders: PathBuf,
        /// Task to run instead of the default one.
        task: Option<String>,
    },
    /// Answer appliance questions from manuals.
    Appliance {
        /// Directory of `.txt`/`.md` manuals.
        #[arg(long, default_value = "manuals")]
        manuals: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        /// Question to ask instead of the default one.
        question: Option<String>,
    },
    /// Help a basketball coach using scouting reports, printing each step.
    Coach {
        /// Directory of `.txt`/`.md` scouting reports.
        #[arg(long, default_value = "reports")]
        reports: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        /// Question to ask instead of the default one.
        question: Option<String>,
    },
    /// Show a travel assistant remembering details between questions.
    Travel,
    /// Coordinate school research and essay writing agents.
    Admissions,
}

#[derive(Args)]
struct SearchArgs {
    /// Maximum characters per indexed section.
    #[arg(long, default_value_t = 800)]
    chunk_size: usize,
    /// Embed sections locally instead of calling the embeddings API.
    #[arg(long)]
    offline_embeddings: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("scenario failed: {err:?}");
            eprintln!("{} {err}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let mut config = OpenAIConfigBuilder::with_api_key(cli.api_key);
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(model) = cli.embedding_model {
        config = config.with_embedding_model(model);
    }
    let provider = OpenAIProvider::new(config.build());
    let spinner = Spinner::new();

    match cli.command {
        Command::Expenses { data } => {
            let data = match data {
                Some(path) => std::fs::read_to_string(&path)
                    .map_err(|source| Error::Io { path, source })?,
                None => SAMPLE_EXPENSES.to_owned(),
            };
            let mut agent = spinner.attach(basic_agent(provider)).build();
            let answer = spinner.run(&mut agent, expense_task(&data)).await?;
            print_answer("Personal finance analysis", &answer);
        }
        Command::Interest => {
            let mut agent = spinner.attach(basic_agent(provider)).build();
            let answer = spinner.run(&mut agent, INTEREST_TASK).await?;
            print_answer("Balance", &answer);
        }
        Command::Cafe { orders, task } => {
            let mut agent =
                spinner.attach(cafe_agent(provider, orders)).build();
            let task = task.unwrap_or_else(|| CAFE_TASK.to_owned());
            let answer = spinner.run(&mut agent, task).await?;
            print_answer("Orders", &answer);
        }
        Command::Appliance {
            manuals,
            search,
            question,
        } => {
            let store = build_store(&manuals, &search, &provider).await?;
            let mut agent =
                spinner.attach(appliance_agent(provider, store)).build();
            let question =
                question.unwrap_or_else(|| APPLIANCE_QUESTION.to_owned());
            let answer = spinner.run(&mut agent, question).await?;
            print_answer("Appliance help", &answer);
        }
        Command::Coach {
            reports,
            search,
            question,
        } => {
            let store = build_store(&reports, &search, &provider).await?;
            let bar = spinner.bar.clone();
            let builder = coach_agent(provider, store, move |line| {
                bar.suspend(|| println!("{}", line.bright_yellow()));
            });
            let mut agent = spinner.attach(builder).build();
            let question = question.unwrap_or_else(|| COACH_QUESTION.to_owned());
            let answer = spinner.run(&mut agent, question).await?;
            print_answer("Game plan", &answer);
        }
        Command::Travel => {
            let mut agent = spinner.attach(travel_agent(provider)).build();
            spinner.run(&mut agent, TRAVEL_FACT).await?;
            let answer = spinner.follow_up(&mut agent, TRAVEL_QUESTION).await?;
            print_answer("Travel assistant", &answer);

            let executed_code = agent.memory().full_code();
            println!("Executed code during session:");
            println!("{}", "=".repeat(50));
            if executed_code.is_empty() {
                println!("{}", "(no tool calls)".dimmed());
            } else {
                println!("{executed_code}");
            }
        }
        Command::Admissions => {
            let builder = admissions_agent(provider)?;
            let mut agent = spinner.attach(builder).build();
            let answer = spinner.run(&mut agent, ADMISSIONS_TASK).await?;
            print_answer("Application plan", &answer);
        }
    }
    Ok(())
}

async fn build_store(
    dir: &Path,
    args: &SearchArgs,
    provider: &OpenAIProvider,
) -> Result<Arc<dyn VectorStore>, Error> {
    let documents = load_documents(dir, args.chunk_size)?;
    info!("indexing {} sections from {}", documents.len(), dir.display());
    if documents.is_empty() {
        warn!("no documents found in {}", dir.display());
    }

    if args.offline_embeddings {
        let mut store = InMemoryVectorStore::new(HashingEmbedder::default());
        store.add_documents(documents).await?;
        Ok(Arc::new(store))
    } else {
        let mut store = InMemoryVectorStore::new(provider.embedder());
        store.add_documents(documents).await?;
        Ok(Arc::new(store))
    }
}

fn print_answer(title: &str, answer: &str) {
    println!("{}", format!("{title}:").bright_white().bold());
    for line in answer.lines() {
        println!("{}{line}", BAR_CHAR.bright_cyan());
    }
    println!();
}

/// Shows a spinner while an agent works.
struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    fn new() -> Self {
        let bar = ProgressBar::hidden();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        Self { bar }
    }

    /// Switches the spinner message once the model starts writing.
    fn attach(&self, builder: AgentBuilder) -> AgentBuilder {
        let bar = self.bar.clone();
        builder.on_transcript(move |_delta: &str| {
            bar.set_message("✍️  Writing...");
        })
    }

    async fn run<S: Into<String>>(
        &self,
        agent: &mut Agent,
        task: S,
    ) -> Result<String, Error> {
        self.start();
        let result = agent.run(task).await;
        self.bar.finish_and_clear();
        Ok(result?)
    }

    async fn follow_up<S: Into<String>>(
        &self,
        agent: &mut Agent,
        task: S,
    ) -> Result<String, Error> {
        self.start();
        let result = agent.follow_up(task).await;
        self.bar.finish_and_clear();
        Ok(result?)
    }

    fn start(&self) {
        self.bar.reset();
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_message("🤔 Thinking...");
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }
}
