use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use luna_store::{
    Config, DayEditor, DebouncedSaver, LogField, LogFields, LogStore, YearMonth,
};

#[derive(Parser)]
#[command(name = "luna", version, about = "Inspect and edit the local cycle log store")]
struct Cli {
    /// Directory holding activity_logs.json (overrides LUNA_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the log stored for a date
    Get { date: NaiveDate },
    /// Replace the log for a date with the given JSON fields
    Save {
        date: NaiveDate,
        /// e.g. '{"bleeding":"Heavy","mood":["Happy"]}'
        #[arg(long)]
        json: String,
    },
    /// Edit single fields of a date, keeping the rest
    Edit {
        date: NaiveDate,
        /// Toggle a multi-select option, as field=Option
        #[arg(long = "toggle")]
        toggles: Vec<String>,
        /// Set a single-select field, as field=Option (empty to unset)
        #[arg(long = "choice")]
        choices: Vec<String>,
        /// Set a numeric field, as field=value (empty to unset)
        #[arg(long = "text")]
        texts: Vec<String>,
        /// Empty the day before applying other edits
        #[arg(long)]
        clear: bool,
    },
    /// Delete the log for a date
    Delete { date: NaiveDate },
    /// List logged dates
    Dates {
        #[arg(long, conflicts_with = "active")]
        bleeding: bool,
        #[arg(long)]
        active: bool,
    },
    /// List months that have logs
    Months,
    /// List logged dates in a month (YYYY-MM)
    MonthDates { month: YearMonth },
    /// Group bleeding days into consecutive episodes
    Episodes,
    /// Raw values per logged day
    Series {
        #[arg(long = "field")]
        fields: Vec<LogField>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Encoded per-day values of one or two fields for a month
    Chart {
        month: YearMonth,
        field: LogField,
        second: Option<LogField>,
    },
    /// Remove every stored log
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir.clone());
    let store = LogStore::open(&data_dir);
    tracing::debug!("🧠 using store at {}", store.path().display());

    run(cli.command, store, &config).await
}

async fn run(command: Command, store: LogStore, config: &Config) -> Result<()> {
    match command {
        Command::Get { date } => print(&store.get_log(date).await),
        Command::Save { date, json } => {
            let fields: LogFields =
                serde_json::from_str(&json).context("--json must be an object of log fields")?;
            if !store.save_log(date, fields).await {
                bail!("failed to save log for {date}");
            }
            print(&store.get_log(date).await)
        }
        Command::Edit {
            date,
            toggles,
            choices,
            texts,
            clear,
        } => {
            let saver = DebouncedSaver::spawn(store.clone(), config.save_debounce);
            let mut editor = DayEditor::open(store.clone(), saver, date).await;
            if clear {
                editor.clear();
            }
            for arg in &toggles {
                let (field, option) = split_assignment(arg)?;
                editor.toggle_option(field, option)?;
            }
            for arg in &choices {
                let (field, option) = split_assignment(arg)?;
                editor.set_choice(field, Some(option).filter(|o| !o.is_empty()))?;
            }
            for arg in &texts {
                let (field, value) = split_assignment(arg)?;
                editor.set_text(field, value)?;
            }
            if !editor.close().await {
                bail!("failed to save edits for {date}");
            }
            print(&store.get_log(date).await)
        }
        Command::Delete { date } => {
            if !store.delete_log(date).await {
                bail!("failed to delete log for {date}");
            }
            Ok(())
        }
        Command::Dates { bleeding, active } => {
            let dates = if bleeding {
                store.dates_with_bleeding().await
            } else if active {
                store.dates_with_any_activity().await
            } else {
                store.all_dates().await
            };
            print(&dates)
        }
        Command::Months => print(&store.months_with_data().await),
        Command::MonthDates { month } => print(&store.dates_in_month(month).await),
        Command::Episodes => print(&store.bleeding_episodes().await),
        Command::Series { fields, from, to } => print(&store.time_series(&fields, from, to).await),
        Command::Chart {
            month,
            field,
            second,
        } => {
            let chart = store.monthly_series(month, field, second).await;
            let labels: Vec<_> = chart
                .series
                .iter()
                .map(|s| {
                    let labels: Vec<Option<String>> =
                        s.values.iter().map(|v| v.map(|v| s.label(v))).collect();
                    json!({ "field": s.field, "labels": labels })
                })
                .collect();
            print(&json!({
                "renderable": chart.is_renderable(),
                "chart": chart,
                "labels": labels,
            }))
        }
        Command::Clear => {
            if !store.clear_all().await {
                bail!("failed to clear activity logs");
            }
            Ok(())
        }
    }
}

fn split_assignment(arg: &str) -> Result<(LogField, &str)> {
    let Some((field, value)) = arg.split_once('=') else {
        bail!("expected field=value, got {arg:?}");
    };
    Ok((field.trim().parse()?, value.trim()))
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
