use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scrape_toolkit::config::{self, Config, GlobalArgs};
use scrape_toolkit::dedup::{DedupRequest, Deduplicated, Deduplicator, OutputOrder};
use scrape_toolkit::fetch::Fetcher;
use scrape_toolkit::logging::{self, LogContext};
use scrape_toolkit::models::{Extracted, Record, cell_from_field};
use scrape_toolkit::text::{EmailOptions, parse_emails};
use scrape_toolkit::{date, urls};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collapse duplicate records in a tabular file
    Dedup {
        /// Path to the input file
        #[arg(short, long)]
        input: PathBuf,

        /// Path to write survivors to
        #[arg(short, long, required_unless_present = "in_place", conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Overwrite the input file with the survivors
        #[arg(long)]
        in_place: bool,

        /// Identity-key column (repeatable); falls back to the configured columns
        #[arg(short, long = "key")]
        keys: Vec<String>,

        /// Priority column in declared order (repeatable)
        #[arg(short, long = "priority")]
        priorities: Vec<String>,

        /// Emit survivors in their original input order
        #[arg(long)]
        keep_input_order: bool,
    },
    /// Merge every tabular file in a directory into one
    Merge {
        /// Directory holding the files
        #[arg(short, long)]
        dir: PathBuf,

        /// Path to the merged output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Append a single record to a tabular file
    Append {
        /// Path to the file to append to
        #[arg(short, long)]
        output: PathBuf,

        /// Field as column=value (repeatable); an empty value is absent
        #[arg(short, long = "field", required = true)]
        fields: Vec<String>,

        /// Comma separated column list to project the record onto
        #[arg(long, value_delimiter = ',')]
        schema: Vec<String>,
    },
    /// Extract email addresses from text, a file or fetched pages
    Emails {
        /// Literal text to scan
        #[arg(long)]
        text: Option<String>,

        /// File to scan
        #[arg(long)]
        file: Option<PathBuf>,

        /// Page to fetch and scan (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Keep repeated addresses
        #[arg(long)]
        keep_duplicates: bool,

        /// Join matches with this separator
        #[arg(long)]
        join: Option<String>,

        /// Only keep addresses on this site's domain
        #[arg(long)]
        domain: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalize a loose date string or millisecond timestamp
    Date {
        input: String,

        /// Print only YYYY-MM-DD
        #[arg(long)]
        date_only: bool,
    },
    /// Report the domain and page kind of a URL
    ClassifyUrl { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::build_config(&cli.global)?;
    logging::init_tracing(&config.log_level);

    match cli.command {
        Commands::Dedup {
            input,
            output,
            in_place,
            keys,
            priorities,
            keep_input_order,
        } => {
            let keys = if keys.is_empty() {
                config.identity_columns.clone()
            } else {
                keys
            };
            let priorities = if priorities.is_empty() {
                config.priority_columns.clone()
            } else {
                priorities
            };
            let order = if keep_input_order {
                OutputOrder::Input
            } else {
                config.output_order
            };
            run_dedup(&config, input, output, in_place, keys, priorities, order)?;
        }
        Commands::Merge { dir, output } => {
            let log = LogContext::new().with_suffix("merge");
            let io = config.table_io(log);
            let merged = io.merge_tables(&dir)?;
            io.save_table(&merged, &output)?;
            info!(
                "Merged {} records from {} into {}",
                merged.len(),
                dir.display(),
                output.display()
            );
        }
        Commands::Append {
            output,
            fields,
            schema,
        } => {
            let record = parse_fields(&fields)?;
            let io = config.table_io(LogContext::new().with_suffix("append"));
            let schema = (!schema.is_empty()).then_some(schema.as_slice());
            io.append_record(&output, &record, schema)?;
            info!("Appended record to {}", output.display());
        }
        Commands::Emails {
            text,
            file,
            urls,
            keep_duplicates,
            join,
            domain,
            json,
        } => {
            let corpus = collect_text(&config, text, file, &urls).await?;
            let opts = EmailOptions {
                unique: !keep_duplicates,
                join_with: join,
                domain,
            };
            let found = parse_emails(&corpus, &opts)?;
            print_extracted(&found, json)?;
        }
        Commands::Date { input, date_only } => {
            let now = chrono::Local::now().naive_local();
            if date_only {
                println!("{}", date::format_date_string(&input, now)?);
            } else {
                println!("{}", date::format_date(&input, now)?.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        Commands::ClassifyUrl { url } => {
            let domain = urls::get_domain_from_url(&url)?;
            let kind = if urls::is_about_page(&url) {
                "about"
            } else if urls::is_contact_page(&url) {
                "contact"
            } else {
                "other"
            };
            println!("{}\t{}", domain, kind);
        }
    }

    Ok(())
}

fn run_dedup(
    config: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
    in_place: bool,
    keys: Vec<String>,
    priorities: Vec<String>,
    order: OutputOrder,
) -> Result<()> {
    let log = LogContext::new().with_suffix("dedup");
    let deduplicator = Deduplicator::new(config.table_io(log.clone()), log);

    if in_place {
        let request = DedupRequest::from_path(&input, keys)
            .priority(priorities)
            .order(order)
            .in_place(true);
        if let Deduplicated::Written { path, kept, dropped } = deduplicator.deduplicate(request)? {
            info!(
                "Rewrote {} with {} records ({} duplicates dropped)",
                path.display(),
                kept,
                dropped
            );
        }
        return Ok(());
    }

    let output = output.context("--output is required unless --in-place is given")?;
    let kept = deduplicator.deduplicate_to(&input, &output, keys, priorities, order)?;
    info!("Wrote {} records to {}", kept, output.display());
    Ok(())
}

fn parse_fields(fields: &[String]) -> Result<Record> {
    let mut record = Record::new();
    for field in fields {
        let (column, value) = field
            .split_once('=')
            .with_context(|| format!("Field '{}' is not in column=value form", field))?;
        record.set(column.trim(), cell_from_field(value));
    }
    Ok(record)
}

async fn collect_text(
    config: &Config,
    text: Option<String>,
    file: Option<PathBuf>,
    urls: &[String],
) -> Result<String> {
    let mut corpus = Vec::new();
    if let Some(text) = text {
        corpus.push(text);
    }
    if let Some(file) = file {
        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        corpus.push(content);
    }

    if !urls.is_empty() {
        let fetcher = Fetcher::new(config.network.clone())?;
        let progress_bar = ProgressBar::new(urls.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );
        let pages = fetcher
            .fetch_pages(urls, |page| {
                progress_bar.set_message(page.url.to_string());
                progress_bar.inc(1);
            })
            .await?;
        progress_bar.finish_with_message("Fetching complete");
        corpus.extend(pages.into_iter().filter_map(|page| page.body));
    }

    if corpus.is_empty() {
        anyhow::bail!("Nothing to scan: pass --text, --file or --url");
    }
    Ok(corpus.join("\n"))
}

fn print_extracted(found: &Extracted, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(found)?);
        return Ok(());
    }
    match found {
        Extracted::Empty => {}
        Extracted::Single(value) => println!("{}", value),
        Extracted::Many(values) => {
            for value in values {
                println!("{}", value);
            }
        }
    }
    Ok(())
}
