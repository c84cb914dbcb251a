use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use doclens::config::Config;
use doclens::file::{LocalFile, PreviewKind};
use doclens::preview::{ObjectUrlRegistry, PreviewViewer};
use doclens::registry::{HttpRegistry, ListFilter};
use doclens::render;
use doclens::session::Session;
use doclens::store::SqliteBlobStore;
use doclens::workspace::{
    AnswerView, DeleteOutcome, DocumentCachePresenter, QueryOrchestrator, SelectionCoordinator,
    SharedSelection, ThemeOrchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doclens", version, about = "Ask questions across your documents")]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, env = "DOCLENS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Server root, e.g. http://localhost:8000
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding the local blob cache
    #[arg(long, global = true)]
    cache_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents known to the server
    List {
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        doc_type: Option<String>,
        /// Inclusive ISO date
        #[arg(long)]
        from: Option<String>,
        /// Inclusive ISO date
        #[arg(long)]
        to: Option<String>,
    },
    /// Upload .pdf, .txt, .png or .jpg files
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Delete a document from the server and the local cache
    Delete {
        doc_id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Per-document answers to a question
    Query {
        question: String,
        #[arg(long)]
        top_k: Option<u32>,
        /// Restrict to these documents (repeatable)
        #[arg(long = "doc")]
        doc_ids: Vec<String>,
    },
    /// Cross-document themes for a question
    Theme {
        question: String,
        #[arg(long)]
        top_k: Option<u32>,
        #[arg(long = "doc")]
        doc_ids: Vec<String>,
    },
    /// Preview a locally cached document
    Preview {
        doc_id: String,
        /// pdf, image, text or other (inferred from the file name by default)
        #[arg(long)]
        kind: Option<PreviewKind>,
        /// Print images as a data: URI
        #[arg(long)]
        data_uri: bool,
    },
    /// Interactive session with selection, preview and questions
    Session,
    /// Check that the server is up
    Health,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the JSON Schema of config.toml
    Schema,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct Client {
    registry: Arc<HttpRegistry>,
    store: Arc<SqliteBlobStore>,
    selection: SharedSelection,
}

impl Client {
    fn open(config: &Config) -> Result<Self> {
        let registry = Arc::new(HttpRegistry::from_config(config).context("build HTTP client")?);
        let cache_dir = config.cache_path()?;
        let store = Arc::new(
            SqliteBlobStore::open(&cache_dir)
                .with_context(|| format!("open blob cache in {}", cache_dir.display()))?,
        );
        debug!(api = %config.api_url, cache = %cache_dir.display(), "client ready");
        Ok(Self {
            registry,
            store,
            selection: SelectionCoordinator::shared(),
        })
    }

    fn presenter(&self) -> DocumentCachePresenter {
        DocumentCachePresenter::new(
            self.registry.clone(),
            self.store.clone(),
            self.selection.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("load config")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }
    init_tracing(&config);

    run(cli.command, &config).await
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::List {
            author,
            doc_type,
            from,
            to,
        } => {
            let client = Client::open(config)?;
            let mut presenter = client.presenter();
            presenter.set_filter(ListFilter {
                author,
                doc_type,
                date_from: from,
                date_to: to,
            });
            presenter.load().await;
            if let Some(notice) = presenter.take_notice() {
                bail!("{}", notice.message);
            }
            print!(
                "{}",
                render::documents(presenter.documents(), client.selection.lock().state())
            );
        }
        Commands::Upload { paths } => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                let file = LocalFile::read(path)
                    .await
                    .with_context(|| format!("read {}", path.display()))?;
                files.push(file);
            }
            let mut presenter = Client::open(config)?.presenter();
            let summary = presenter.upload(files).await;
            if let Some(summary) = &summary {
                print!("{}", render::upload_results(&summary.results));
            }
            if let Some(notice) = presenter.take_notice() {
                eprintln!("{}", render::notice(&notice));
            }
            if summary.map_or(true, |s| s.indexed() == 0) {
                bail!("no documents were indexed");
            }
        }
        Commands::Delete { doc_id, yes } => {
            let mut presenter = Client::open(config)?.presenter();
            presenter.load().await;
            presenter.take_notice();
            let confirm = |prompt: &str| {
                yes || dialoguer::Confirm::new()
                    .with_prompt(prompt)
                    .default(false)
                    .interact()
                    .unwrap_or(false)
            };
            match presenter.handle_delete(&doc_id, &confirm).await {
                DeleteOutcome::Deleted => println!("Deleted {doc_id}."),
                DeleteOutcome::Declined => println!("Cancelled."),
                DeleteOutcome::Failed { message, .. } => bail!("{message}"),
                DeleteOutcome::Discarded => warn!("delete settled after shutdown"),
            }
        }
        Commands::Query {
            question,
            top_k,
            doc_ids,
        } => {
            let client = Client::open(config)?;
            let mut query =
                QueryOrchestrator::new(client.registry, top_k.unwrap_or(config.top_k_per_doc));
            query.set_input(question);
            let view = query.submit(Some(doc_ids)).await;
            println!("{}", render::answer_view(view, render::answers));
            if matches!(view, AnswerView::Failed(_)) {
                bail!("query failed");
            }
        }
        Commands::Theme {
            question,
            top_k,
            doc_ids,
        } => {
            let client = Client::open(config)?;
            let mut theme =
                ThemeOrchestrator::new(client.registry, top_k.unwrap_or(config.top_k_per_doc));
            theme.set_input(question);
            let view = theme.submit(Some(doc_ids)).await;
            println!("{}", render::answer_view(view, render::themes));
            if matches!(view, AnswerView::Failed(_)) {
                bail!("theme identification failed");
            }
        }
        Commands::Preview {
            doc_id,
            kind,
            data_uri,
        } => {
            let client = Client::open(config)?;
            let mut viewer = PreviewViewer::new(
                client.store,
                client.selection.clone(),
                ObjectUrlRegistry::new(),
            );
            client.selection.lock().set_selected(vec![doc_id]);
            let Some(state) = viewer.open_selected(kind).await else {
                bail!("nothing selected");
            };
            print!("{}", render::preview(state));
            match state.session() {
                Some(session) if data_uri && session.kind == PreviewKind::Image => {
                    println!("{}", session.data_uri().unwrap_or_default());
                }
                Some(_) => {}
                None => bail!("preview failed"),
            }
        }
        Commands::Session => {
            let client = Client::open(config)?;
            let mut session = Session::new(client.registry, client.store, config.top_k_per_doc);
            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            tokio::select! {
                result = session.run(stdin, &mut stdout) => result?,
                _ = tokio::signal::ctrl_c() => println!(),
            }
            session.shutdown();
        }
        Commands::Health => {
            let client = Client::open(config)?;
            let health = client.registry.health().await?;
            println!("{}", health.status);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", config.to_toml()?),
            ConfigAction::Schema => println!("{}", Config::json_schema()?),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "doclens", &mut std::io::stdout());
        }
    }
    Ok(())
}
