use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use persona_pipeline::app::ports::{CanonicalStorePort, PersonFeedPort};
use persona_pipeline::app::report_use_case::ReportUseCase;
use persona_pipeline::app::transform_use_case::TransformUseCase;
use persona_pipeline::config::Config;
use persona_pipeline::domain::RawPersonRecord;
use persona_pipeline::logging;
use persona_pipeline::pipeline::aggregate::{bracket_distribution, Aggregator, DemographicReport};
use persona_pipeline::pipeline::ingestion::{FeedConfig, PersonFeedClient};
use persona_pipeline::pipeline::processing::{BracketScheme, RecordTransformer, TransformStats};
use persona_pipeline::pipeline::storage::{
    read_canonical_snapshot, read_raw_snapshot, write_canonical_snapshot, write_raw_snapshot,
    InMemoryStore,
};

const RAW_SNAPSHOT: &str = "data/raw_persons.json";
const CANONICAL_SNAPSHOT: &str = "data/canonical_persons.json";

#[derive(Parser)]
#[command(name = "persona_pipeline")]
#[command(about = "Synthetic person demographics pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch raw records from the feed and save them as a snapshot
    Fetch {
        /// Total number of records to fetch
        #[arg(long)]
        total: Option<u32>,
        /// Batch size for feed requests
        #[arg(long)]
        batch_size: Option<u32>,
        /// Demographic filter applied upstream by the feed
        #[arg(long)]
        gender: Option<String>,
        /// Where to write the raw snapshot
        #[arg(long, default_value = RAW_SNAPSHOT)]
        out: String,
    },
    /// Transform a raw snapshot into the canonical record set
    Transform {
        /// Raw snapshot to read
        #[arg(long, default_value = RAW_SNAPSHOT)]
        input: String,
        /// Where to write the canonical snapshot
        #[arg(long, default_value = CANONICAL_SNAPSHOT)]
        out: String,
    },
    /// Verify a canonical snapshot and print the demographic report
    Report {
        /// Canonical snapshot to read
        #[arg(long, default_value = CANONICAL_SNAPSHOT)]
        input: String,
    },
    /// Full pipeline in one process: fetch, transform, verify, report
    Run {
        #[arg(long)]
        total: Option<u32>,
        #[arg(long)]
        batch_size: Option<u32>,
        #[arg(long)]
        gender: Option<String>,
    },
}

fn load_config(path: &str) -> Config {
    match Config::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            info!("No usable config file ({}), using defaults", e);
            Config::default()
        }
    }
}

fn feed_config(
    config: &Config,
    total: Option<u32>,
    batch_size: Option<u32>,
    gender: Option<String>,
) -> FeedConfig {
    FeedConfig {
        gender: gender.unwrap_or_else(|| config.feed.gender.clone()),
        batch_size: batch_size.unwrap_or(config.feed.batch_size),
        total: total.unwrap_or(config.feed.total),
        base_url: config.feed.base_url.clone(),
        timeout_seconds: config.feed.timeout_seconds,
        max_retries: config.feed.max_retries,
    }
}

fn print_run_summary(stats: &TransformStats, stored: usize) {
    println!("\n📊 Transform Results:");
    println!("   Input records:       {}", stats.input);
    println!("   Accepted:            {}", stats.accepted);
    println!("   Rejected:            {}", stats.rejected());
    println!("     age out of range:  {}", stats.age_out_of_range);
    println!("     bad birth date:    {}", stats.malformed_birth_date);
    println!("     missing email:     {}", stats.missing_email);
    println!("     invalid email:     {}", stats.invalid_email);
    println!("   Duplicates dropped:  {}", stats.duplicates_discarded);
    println!("   Missing identity:    {}", stats.missing_identity);
    println!("   Canonical records:   {}", stored);
}

fn print_report(report: &DemographicReport) {
    println!("\n📈 Demographic Report:");

    println!("\n   Top countries by Gmail usage:");
    if report.top_gmail_countries.is_empty() {
        println!("     (no Gmail users in the canonical set)");
    }
    for row in &report.top_gmail_countries {
        println!(
            "     #{} {} — {} Gmail users",
            row.rank, row.country, row.gmail_users
        );
    }

    match report.germany_gmail.percentage {
        Some(pct) => println!(
            "\n   Gmail users in Germany: {}% ({} of {} records)",
            pct, report.germany_gmail.gmail_users_germany, report.germany_gmail.total_records
        ),
        None => println!("\n   Gmail users in Germany: undefined (empty set)"),
    }

    match report.senior_gmail.percentage {
        Some(pct) => println!(
            "   Senior Gmail adoption:  {}% ({} of {} seniors)",
            pct, report.senior_gmail.gmail_seniors, report.senior_gmail.total_seniors
        ),
        None => println!("   Senior Gmail adoption:  undefined (no seniors)"),
    }

    println!("\n   Data quality:");
    for field in &report.quality.fields {
        println!(
            "     {:<15} completeness {:.2}, uniqueness {:.2}, format {:.2}",
            field.field, field.completeness, field.uniqueness, field.format_validity
        );
    }
    println!("     PII masking:    {:.2}", report.quality.pii_masking);
    println!("     Overall score:  {:.2}", report.quality.overall_score);
}

/// Pulls every batch from the feed, in order. Caps the result at the
/// configured total in case the feed over-delivers the final batch.
async fn fetch_raw(client: &PersonFeedClient) -> Result<Vec<RawPersonRecord>, Box<dyn std::error::Error>> {
    let config = client.config();
    let total = config.total;
    let batch_size = config.batch_size;
    let mut records = Vec::with_capacity(total as usize);

    let mut remaining = total;
    for batch_id in 0..config.num_batches() {
        let quantity = remaining.min(batch_size);
        let batch = client.fetch_batch(batch_id, quantity).await?;
        records.extend(batch);
        remaining -= quantity.min(remaining);
    }
    records.truncate(total as usize);
    Ok(records)
}

async fn ingest(
    feed: Arc<dyn PersonFeedPort>,
    store: Arc<dyn CanonicalStorePort>,
    scheme: BracketScheme,
    total: u32,
    batch_size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let use_case = TransformUseCase::new(feed, store, RecordTransformer::new(scheme));
    let summary = use_case.run(total, batch_size).await?;
    print_run_summary(&summary.stats, summary.stored);
    Ok(())
}

async fn report(
    store: Arc<dyn CanonicalStorePort>,
    scheme: BracketScheme,
    top_n: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let use_case = ReportUseCase::new(
        store.clone(),
        Aggregator::with_top_n(scheme, top_n),
        scheme,
    );

    let verification = use_case.verify().await?;
    if !verification.is_ok() {
        println!("\n⚠️  Verification found {} issue(s):", verification.issues.len());
        for issue in &verification.issues {
            println!("   - [{}] {}", issue.check, issue.detail);
        }
    } else {
        println!(
            "\n✅ Verified {} canonical records",
            verification.records_checked
        );
    }

    let report = use_case.generate().await?;
    print_report(&report);

    let records = store.scan_all().await?;
    println!("\n   Age bracket distribution:");
    for (bracket, count) in bracket_distribution(scheme, &records) {
        println!("     {:<9} {}", bracket, count);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli.config);
    let scheme = config.pipeline.bracket_scheme;

    match cli.command {
        Commands::Fetch {
            total,
            batch_size,
            gender,
            out,
        } => {
            println!("🔄 Fetching raw records...");
            let client = PersonFeedClient::new(feed_config(&config, total, batch_size, gender))?;
            let records = match fetch_raw(&client).await {
                Ok(records) => records,
                Err(e) => {
                    error!("Fetch failed: {}", e);
                    return Err(e);
                }
            };
            write_raw_snapshot(&out, &records)?;
            println!("💾 Saved {} raw records to {}", records.len(), out);
        }
        Commands::Transform { input, out } => {
            println!("🔄 Transforming raw snapshot {}...", input);
            let raw = read_raw_snapshot(&input)?;
            let outcome =
                RecordTransformer::new(scheme).transform_run(std::slice::from_ref(&raw));
            write_canonical_snapshot(&out, &outcome.records)?;
            print_run_summary(&outcome.stats, outcome.records.len());
            println!("\n💾 Saved canonical records to {}", out);
        }
        Commands::Report { input } => {
            println!("🔄 Reporting on canonical snapshot {}...", input);
            let records = read_canonical_snapshot(&input)?;
            let store: Arc<dyn CanonicalStorePort> = Arc::new(InMemoryStore::new());
            store.insert_batch(&records).await?;
            report(store, scheme, config.report.top_n).await?;
        }
        Commands::Run {
            total,
            batch_size,
            gender,
        } => {
            println!("🔄 Running full pipeline...");
            let feed_config = feed_config(&config, total, batch_size, gender);
            let total = feed_config.total;
            let batch_size = feed_config.batch_size;

            let feed = Arc::new(PersonFeedClient::new(feed_config)?);
            let store: Arc<dyn CanonicalStorePort> = Arc::new(InMemoryStore::new());
            if let Err(e) = ingest(feed, store.clone(), scheme, total, batch_size).await {
                error!("Pipeline run failed: {}", e);
                return Err(e);
            }
            report(store, scheme, config.report.top_n).await?;
        }
    }

    Ok(())
}
