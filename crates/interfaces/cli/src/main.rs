use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use capsule_config::AppConfig;
use capsule_engine::aggregate::AggregateStore;
use capsule_engine::{classify, codec, seed};
use capsule_engine::{Processor, ProcessorOptions, SeedEntry};
use capsule_llm::{InsightRecord, OpenAiAnalyzer};
use capsule_store::{HttpTreeStore, TreeStore};

type JournalProcessor = Processor<HttpTreeStore, OpenAiAnalyzer>;

#[derive(Debug, Parser)]
#[command(
    name = "capsule",
    version,
    about = "Sync AI insights and a rolling dashboard into a document-backed journal"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = "capsule.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show configuration state and whether the journal root is reachable.
    Status,
    /// Look up today's entry and report its processing state.
    Today,
    /// List journal entries with processing state and mood.
    List {
        /// Only show unprocessed entries.
        #[arg(long)]
        pending: bool,
    },
    /// Print one entry's content and its insight record, if any.
    Show {
        #[arg(value_name = "ENTRY_ID")]
        entry_id: String,
    },
    /// Analyze one entry and embed the insight. Defaults to today's entry.
    Process {
        #[arg(value_name = "ENTRY_ID")]
        entry_id: Option<String>,
    },
    /// Analyze every unprocessed entry, sequentially.
    ProcessAll,
    /// Print the rolling analytics aggregate.
    Dashboard,
    /// Import a JSON dataset of {date, text} entries into the journal.
    Seed {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// Import at most this many entries.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level)),
        )
        .init();

    let store = HttpTreeStore::new(&config.store.base_url, &config.store.token);
    let analyzer = OpenAiAnalyzer::new(
        &config.analyzer.base_url,
        &config.analyzer.api_key,
        &config.analyzer.model,
    );
    let options = ProcessorOptions {
        root_title: config.store.root_title.clone(),
        entry_fetch_depth: config.runner.entry_fetch_depth,
        pace: std::time::Duration::from_millis(config.runner.pace_ms),
    };
    let processor = Processor::new(store, analyzer, options);

    match cli.command {
        Commands::Status => status(&processor, &config).await,
        Commands::Today => today(&processor).await,
        Commands::List { pending } => list(&processor, pending).await,
        Commands::Show { entry_id } => {
            show(&processor, &entry_id, config.runner.entry_fetch_depth).await
        }
        Commands::Process { entry_id } => process(&processor, entry_id).await,
        Commands::ProcessAll => process_all(&processor).await,
        Commands::Dashboard => dashboard(&processor).await,
        Commands::Seed { path, limit } => run_seed(&processor, &path, limit).await,
    }
}

async fn status(processor: &JournalProcessor, config: &AppConfig) -> Result<()> {
    println!("store:    {}", config.store.base_url);
    println!(
        "token:    {}",
        if config.has_store_token() {
            "configured"
        } else {
            "missing"
        }
    );
    println!(
        "analyzer: {} ({})",
        config.analyzer.model,
        if config.has_analyzer_key() {
            "key configured"
        } else {
            "key missing"
        }
    );

    match processor.find_journal_root().await {
        Ok(root) => println!("journal:  \"{}\" ({})", root.title, root.id),
        Err(err) => println!("journal:  unreachable: {err}"),
    }
    Ok(())
}

async fn today(processor: &JournalProcessor) -> Result<()> {
    let date = JournalProcessor::today();
    match processor.find_today_entry().await? {
        Some(entry) => {
            let id = entry.id.as_deref().unwrap_or("?");
            let state = if classify::is_processed(&entry) {
                "processed"
            } else {
                "unprocessed"
            };
            println!("{date}: {state} ({id})");
        }
        None => println!("{date}: no entry yet"),
    }
    Ok(())
}

async fn list(processor: &JournalProcessor, pending: bool) -> Result<()> {
    let root = processor.find_journal_root().await?;
    let entries = processor.list_entries(&root.id).await?;

    let mut shown = 0;
    for entry in &entries {
        if pending && entry.processed {
            continue;
        }
        shown += 1;
        let mood = entry
            .mood
            .map(|mood| format!("mood {mood}/10"))
            .unwrap_or_else(|| "-".to_string());
        let state = if entry.processed { "done" } else { "todo" };
        println!("[{state}] {}  {}  ({})", entry.title, mood, entry.id);
    }
    if shown == 0 {
        println!(
            "{}",
            if pending {
                "All caught up, no unprocessed entries."
            } else {
                "No entries found."
            }
        );
    }
    Ok(())
}

async fn show(processor: &JournalProcessor, entry_id: &str, depth: i32) -> Result<()> {
    let entry = processor.store().get_block(entry_id, depth).await?;
    println!("# {}", entry.label().unwrap_or("Untitled Entry"));
    println!();

    let (user_text, insight) = codec::split_entry(&entry.content);
    if user_text.trim().is_empty() {
        println!("(no content in this entry)");
    } else {
        println!("{}", user_text.trim_end());
    }

    println!();
    match insight {
        Some(record) => print_insight(&record),
        None => println!("No insights generated for this entry yet."),
    }
    Ok(())
}

async fn process(processor: &JournalProcessor, entry_id: Option<String>) -> Result<()> {
    let root = processor.find_journal_root().await?;
    let entry_id = match entry_id {
        Some(id) => id,
        None => {
            let Some(entry) = processor.find_today_entry().await? else {
                bail!(
                    "no entry titled {:?} found; write today's entry first",
                    JournalProcessor::today()
                );
            };
            entry.id.context("today's entry has no id")?
        }
    };

    let record = processor.process_entry(&entry_id, Some(&root.id)).await?;
    println!("Entry processed.");
    println!();
    print_insight(&record);
    Ok(())
}

async fn process_all(processor: &JournalProcessor) -> Result<()> {
    let root = processor.find_journal_root().await?;
    let candidates = processor.list_unprocessed(&root.id).await?;
    if candidates.is_empty() {
        println!("All caught up, no unprocessed entries.");
        return Ok(());
    }

    println!("Processing {} entries…", candidates.len());
    let report = processor.process_all(&candidates, Some(&root.id)).await;
    println!(
        "Done: {} of {} entries processed.",
        report.succeeded, report.attempted
    );
    Ok(())
}

async fn dashboard(processor: &JournalProcessor) -> Result<()> {
    let root = processor.find_journal_root().await?;
    let aggregate = AggregateStore::new(processor.store(), &root.id);

    let Some(record) = aggregate.read().await? else {
        println!("No dashboard yet. Process an entry first.");
        return Ok(());
    };

    println!("entries:  {}", record.total_entries);
    println!("avg mood: {}", record.avg_mood);
    println!("streak:   {} day(s)", record.streak);
    if !record.themes.is_empty() {
        let themes: Vec<String> = record
            .themes
            .iter()
            .take(10)
            .map(|theme| format!("{} ({})", theme.name, theme.count))
            .collect();
        println!("themes:   {}", themes.join(", "));
    }
    if !record.daily_moods.is_empty() {
        println!("recent:");
        for observation in record.daily_moods.iter().rev().take(7) {
            println!("  {}  mood {}", observation.date, observation.mood);
        }
    }
    println!("updated:  {}", record.last_updated);
    Ok(())
}

async fn run_seed(processor: &JournalProcessor, path: &PathBuf, limit: Option<usize>) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading dataset from {}", path.display()))?;
    let mut entries: Vec<SeedEntry> =
        serde_json::from_str(&raw).context("dataset must be a JSON array of {date, text}")?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    let root = processor.find_journal_root().await?;
    let inserted = seed::seed_entries(processor.store(), &root.id, &entries).await?;
    println!("Seeded {inserted} entries into \"{}\".", root.title);
    Ok(())
}

fn print_insight(record: &InsightRecord) {
    println!("Summary: {}", record.summary);
    println!(
        "Mood: {}/10   Stress: {}/10   Emotion: {}",
        record.mood, record.stress, record.emotion
    );
    if !record.themes.is_empty() {
        println!("Themes: {}", record.themes.join(", "));
    }
    if !record.gratitude.is_empty() {
        println!("Gratitude: {}", record.gratitude);
    }
    if !record.reflection_questions.is_empty() {
        println!("Reflect:");
        for question in &record.reflection_questions {
            println!("  - {question}");
        }
    }
    if !record.tomorrow_suggestions.is_empty() {
        println!("Tomorrow:");
        for suggestion in &record.tomorrow_suggestions {
            println!("  - {suggestion}");
        }
    }
    if record.growth_signal {
        println!("Growth signal: yes");
    }
}
