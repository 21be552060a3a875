use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use standup_digest::{
    config, ingest, llm, BatchPlan, BatchProgress, GeneratedSummary, Level, OrderBy, ResultsQuery,
    Scope, StandupDigest, Strategy, SummaryRequest,
};

#[derive(Parser)]
#[command(name = "standup-digest", about = "Stand-up summary generator and results browser")]
struct Cli {
    /// Database path (default: ~/.standup-digest/summaries.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl BatchProgress for StderrProgress {
    fn on_request_start(&self, request: &SummaryRequest, index: usize, total: usize) {
        eprintln!(
            "[{}/{}] {} | {} days | {}...",
            index + 1,
            total,
            request.scope,
            request.period_days,
            request.strategy
        );
    }

    fn on_request_complete(&self, _request: &SummaryRequest, summary: &GeneratedSummary) {
        if summary.is_no_data() {
            eprintln!("  No data");
        } else {
            eprintln!(
                "  Done: {} tokens, {:.2}s, {} calls",
                summary.tokens, summary.elapsed_secs, summary.calls
            );
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate summaries for every scope, period and strategy
    Run {
        /// Stand-up export CSV
        #[arg(long)]
        csv: PathBuf,
        /// Comma-separated period lengths in days (default: config or 1,3,5,7,15,30)
        #[arg(long)]
        periods: Option<String>,
        /// Number of users to summarize individually (default: config or 6)
        #[arg(long)]
        max_users: Option<usize>,
        /// Seed for the team split
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Generate a single summary
    Generate {
        /// Stand-up export CSV
        #[arg(long)]
        csv: PathBuf,
        /// Scope level: user, team, all
        #[arg(long)]
        level: Level,
        /// User or team name (not used for level "all")
        #[arg(long)]
        entity: Option<String>,
        /// Period length in days
        #[arg(long)]
        period: u32,
        /// Strategy: direct, daily_chained, weekly_chained
        #[arg(long)]
        strategy: Strategy,
        /// Seed for the team split
        #[arg(long)]
        seed: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Do not append the result to the database
        #[arg(long)]
        no_store: bool,
    },
    /// Browse stored summaries
    Results {
        #[command(flatten)]
        filters: ResultFilters,
        /// Max results
        #[arg(long)]
        limit: Option<u32>,
        /// Sort field: id, tokens, time, generated_at
        #[arg(long, default_value = "id")]
        order_by: OrderBy,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Print full summary text
        #[arg(long)]
        full: bool,
        /// Output as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Token and time usage grouped by level, strategy and period
    Stats {
        #[command(flatten)]
        filters: ResultFilters,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the static HTML report with CSV and chart files
    Export {
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show stored summary counts and filter values
    Status,
}

/// Filters shared by `results` and `stats`. Each accepts repeats or a comma list.
#[derive(Args)]
struct ResultFilters {
    /// Filter by level
    #[arg(long, value_delimiter = ',')]
    level: Vec<Level>,
    /// Filter by entity (user, team, or "All Teams")
    #[arg(long)]
    entity: Vec<String>,
    /// Filter by period length in days
    #[arg(long, value_delimiter = ',')]
    period: Vec<u32>,
    /// Filter by strategy
    #[arg(long, value_delimiter = ',')]
    strategy: Vec<Strategy>,
}

impl ResultFilters {
    fn query(self) -> ResultsQuery {
        ResultsQuery::new()
            .levels(self.level)
            .entities(self.entity)
            .periods(self.period)
            .strategies(self.strategy)
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// Remove a config value
    Unset { key: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => standup_digest::Database::open_at(path).await?,
        None => standup_digest::Database::open().await?,
    };
    let sd = StandupDigest::new(db);

    match cli.command {
        Commands::Run {
            csv,
            periods,
            max_users,
            seed,
        } => {
            let mut settings = sd.settings().await?;
            if let Some(p) = periods {
                settings.periods = config::parse_periods(&p)?;
            }
            if let Some(n) = max_users {
                settings.max_users = n;
            }
            if seed.is_some() {
                settings.team_seed = seed;
            }
            let summarizer = llm::create_summarizer(&settings)?;

            let log = ingest::load_csv(&csv, settings.team_seed)?;
            eprintln!("Loaded {} entries from {}", log.len(), csv.display());
            let plan = BatchPlan::from_log(&log, &settings);
            let report = sd.run(&log, &plan, &summarizer, &StderrProgress).await?;

            println!("Batch complete");
            println!("  Requests:     {}", report.requests_run);
            println!("  Rows stored:  {}", report.rows_stored);
            println!("  No data:      {}", report.no_data);
            println!("  Model calls:  {}", report.model_calls);
            println!("  Failed calls: {}", report.failed_calls);
            println!("  Tokens:       {}", report.total_tokens);
            println!("  Time:         {:.2}s", report.total_secs);
        }
        Commands::Generate {
            csv,
            level,
            entity,
            period,
            strategy,
            seed,
            json,
            no_store,
        } => {
            let scope = Scope::from_parts(level, entity.as_deref())?;
            if period == 0 {
                anyhow::bail!("period must be at least 1 day");
            }
            let settings = sd.settings().await?;
            let summarizer = llm::create_summarizer(&settings)?;

            let log = ingest::load_csv(&csv, seed.or(settings.team_seed))?;
            let request = SummaryRequest::new(scope, period, strategy);
            let (summary, id) = sd.generate(&log, &request, &summarizer, !no_store).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary.text);
                eprintln!(
                    "\n{} tokens, {:.2}s, {} calls ({} failed)",
                    summary.tokens, summary.elapsed_secs, summary.calls, summary.failed_calls
                );
                if let Some(id) = id {
                    eprintln!("Stored as #{id}");
                }
            }
        }
        Commands::Results {
            filters,
            limit,
            order_by,
            desc,
            full,
            json,
            csv,
        } => {
            let mut query = filters.query().order_by(order_by);
            if desc {
                query = query.descending();
            }
            handle_results(&sd, query, limit, full, json, csv).await?;
        }
        Commands::Stats { filters, json } => {
            handle_stats(&sd, filters.query(), json).await?;
        }
        Commands::Export { out_dir } => match sd.export(&out_dir).await? {
            Some(summary) => {
                println!("Exported {} summaries. Files created:", summary.rows);
                for file in summary.files() {
                    println!("  {}", file.display());
                }
            }
            None => println!("No data found. Run 'standup-digest run' first."),
        },
        Commands::Config { action } => {
            handle_config(&sd, action).await?;
        }
        Commands::Status => {
            print_status(&sd).await?;
        }
    }

    Ok(())
}

async fn handle_results(
    sd: &StandupDigest,
    query: ResultsQuery,
    limit: Option<u32>,
    full: bool,
    json: bool,
    csv: bool,
) -> anyhow::Result<()> {
    let query = match limit {
        Some(n) => query.limit(n),
        None => query,
    };

    if json {
        println!("{}", query.to_json(sd.db()).await?);
    } else if csv {
        print!("{}", query.to_csv(sd.db()).await?);
    } else {
        let rows = sd.results(query).await?;
        if rows.is_empty() {
            println!("No summaries found.");
            return Ok(());
        }
        for row in &rows {
            println!(
                "#{} {} {} | {} days | {} | {} tokens | {:.2}s | {}",
                row.id,
                row.level,
                row.entity,
                row.period_days,
                row.strategy,
                row.tokens,
                row.time_taken,
                row.generated_at
            );
            let text = if full {
                row.summary_text.clone()
            } else {
                truncate(&row.summary_text, 160)
            };
            for line in text.lines() {
                println!("    {line}");
            }
        }
        println!("\n{} summaries", rows.len());
    }
    Ok(())
}

async fn handle_stats(sd: &StandupDigest, query: ResultsQuery, json: bool) -> anyhow::Result<()> {
    let stats = sd.stats(query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    if stats.is_empty() {
        println!("No summaries found.");
        return Ok(());
    }
    println!(
        "{:<6} {:<15} {:>6} {:>5} {:>12} {:>12} {:>10} {:>10}",
        "level", "strategy", "period", "n", "tokens_mean", "tokens_sum", "time_mean", "time_sum"
    );
    for s in &stats {
        println!(
            "{:<6} {:<15} {:>6} {:>5} {:>12.1} {:>12.0} {:>10.2} {:>10.2}",
            s.level,
            s.strategy,
            s.period_days,
            s.count,
            s.tokens_mean,
            s.tokens_sum,
            s.time_mean,
            s.time_sum
        );
    }
    Ok(())
}

async fn handle_config(sd: &StandupDigest, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match sd.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            sd.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::Unset { key } => {
            if sd.config_unset(&key).await? {
                println!("Removed {key}.");
            } else {
                println!("{key} is not set");
            }
        }
        ConfigAction::List => {
            let items = sd.config_list().await?;
            if items.is_empty() {
                println!("No configuration set. Known keys: {}", config::KNOWN_KEYS.join(", "));
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(sd: &StandupDigest) -> anyhow::Result<()> {
    let status = sd.status().await?;
    println!("Summary Store Status");
    println!("  Summaries:  {}", status.summaries);
    println!(
        "  Last run:   {}",
        status.last_generated_at.as_deref().unwrap_or("never")
    );
    println!("  Levels:     {}", status.levels.join(", "));
    println!("  Entities:   {}", status.entities.join(", "));
    println!("  Periods:    {}", status.periods.join(", "));
    println!("  Strategies: {}", status.strategies.join(", "));
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
