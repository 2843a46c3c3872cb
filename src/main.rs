use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod counter;
mod db;
mod error;
mod leaderboard;
mod lookup;
mod models;
mod report;
mod simulate;
mod store;
mod submission;
mod validation;

use config::Config;
use counter::CounterStrategy;
use db::PgStore;
use error::SubmitError;
use lookup::Directories;
use models::{Dimension, SubmissionForm};
use submission::Pipeline;
use validation::{EmailPolicy, DEFAULT_COUNTRY_CODE};

#[derive(Parser)]
#[command(name = "valentine-leads")]
#[command(about = "Lead capture with per-country and per-university leaderboards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Record one submission and update its leaderboard counters
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = DEFAULT_COUNTRY_CODE)]
        country_code: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long)]
        university: Option<String>,
        /// Reject submissions without an email address
        #[arg(long)]
        require_email: bool,
        #[arg(long, value_enum)]
        strategy: Option<CounterStrategy>,
    },
    /// Replay submissions from a CSV file through the submit pipeline
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        require_email: bool,
        #[arg(long, value_enum)]
        strategy: Option<CounterStrategy>,
    },
    /// Print the top entries of one leaderboard
    Leaderboard {
        #[arg(long, value_enum, default_value_t = Dimension::Country)]
        dimension: Dimension,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report of both leaderboards
    Report {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List the entries of a static lookup table
    Lookup {
        #[arg(long, value_enum, default_value_t = Dimension::Country)]
        dimension: Dimension,
    },
    /// Race concurrent clients on a fresh counter with both strategies
    Simulate {
        #[arg(long, default_value_t = 50)]
        clients: usize,
        #[arg(long, default_value_t = 10)]
        trials: usize,
        /// Simulated round-trip latency in milliseconds
        #[arg(long)]
        latency_ms: Option<u64>,
    },
}

fn email_policy(require_email: bool) -> EmailPolicy {
    if require_email {
        EmailPolicy::Required
    } else {
        EmailPolicy::Optional
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgStore> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")?;

    Ok(PgStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let directories = Directories::bundled().context("bundled lookup tables are malformed")?;

    match cli.command {
        Commands::InitDb => {
            let store = connect(&config).await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Submit {
            name,
            country_code,
            phone,
            email,
            university,
            require_email,
            strategy,
        } => {
            let store = connect(&config).await?;
            let form = SubmissionForm {
                name,
                country_code,
                phone,
                email,
                university,
            };
            let pipeline = Pipeline::new(&store, &directories)
                .with_strategy(strategy.unwrap_or(config.counter_strategy))
                .with_email_policy(email_policy(require_email));

            match pipeline.submit_form(&form).await {
                Ok(outcome) => {
                    println!("Successfully submitted. {}", outcome.message);
                    println!(
                        "Phone on file: {}",
                        validation::format_phone_display(&outcome.record.phone)
                    );
                }
                Err(SubmitError::Invalid(errors)) => {
                    for (field, message) in errors.iter() {
                        println!("- {field}: {message}");
                    }
                    anyhow::bail!("submission rejected");
                }
                Err(SubmitError::Write(err)) => {
                    return Err(err).context("submission was not recorded; try again");
                }
            }
        }
        Commands::Import {
            csv,
            require_email,
            strategy,
        } => {
            let store = connect(&config).await?;
            let pipeline = Pipeline::new(&store, &directories)
                .with_strategy(strategy.unwrap_or(config.counter_strategy))
                .with_email_policy(email_policy(require_email));

            let mut reader = csv::Reader::from_path(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let mut inserted = 0usize;
            let mut skipped = 0usize;

            for (line, result) in reader.deserialize::<SubmissionForm>().enumerate() {
                let form = result?;
                match pipeline.submit_form(&form).await {
                    Ok(_) => inserted += 1,
                    Err(SubmitError::Invalid(errors)) => {
                        warn!(row = line + 1, %errors, "skipping invalid row");
                        skipped += 1;
                    }
                    Err(SubmitError::Write(err)) => {
                        return Err(err)
                            .with_context(|| format!("import stopped at row {}", line + 1));
                    }
                }
            }

            println!(
                "Inserted {inserted} submissions from {} ({skipped} invalid rows skipped).",
                csv.display()
            );
        }
        Commands::Leaderboard {
            dimension,
            limit,
            json,
        } => {
            let store = connect(&config).await?;
            let limit = limit.unwrap_or(config.leaderboard_limit);
            let board = leaderboard::top_n(&store, dimension, limit, directories.resolver(dimension))
                .await
                .context("leaderboard unavailable; run the command again to retry")?;

            if json {
                println!("{}", serde_json::to_string_pretty(board.entries())?);
            } else {
                println!("{}", report::title(dimension));
                print!("{}", report::render_leaderboard(dimension, &board));
            }
        }
        Commands::Report { limit, out } => {
            let store = connect(&config).await?;
            let limit = limit.unwrap_or(config.leaderboard_limit);
            let countries = leaderboard::top_n(
                &store,
                Dimension::Country,
                limit,
                directories.resolver(Dimension::Country),
            )
            .await;
            let universities = leaderboard::top_n(
                &store,
                Dimension::University,
                limit,
                directories.resolver(Dimension::University),
            )
            .await;

            let report = report::build_report(chrono::Utc::now(), &countries, &universities);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Lookup { dimension } => match dimension {
            Dimension::Country => {
                for country in directories.countries.all() {
                    println!("{:<10} {}", country.code, country.name);
                }
            }
            Dimension::University => {
                for university in directories.universities.all() {
                    println!("{:<10} {:<10} {}", university.key, university.short, university.full);
                }
            }
        },
        Commands::Simulate {
            clients,
            trials,
            latency_ms,
        } => {
            let latency = latency_ms.map(std::time::Duration::from_millis);
            info!(clients, trials, "racing clients on a fresh counter");

            for strategy in [CounterStrategy::Naive, CounterStrategy::Atomic] {
                let result = simulate::run(strategy, clients, trials, latency).await?;
                println!(
                    "{:?}: final counts {:?}, {} of {} trials undercounted, {} updates lost",
                    result.strategy,
                    result.final_counts,
                    result.undercounted_trials(),
                    trials,
                    result.lost_updates()
                );
            }
        }
    }

    Ok(())
}
