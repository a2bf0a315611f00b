//! Command line interface.
//!
//! Thin shell over the services layer: parses arguments, loads the accounts
//! file, wires the IMAP session factory into the services, and prints table
//! data. All mailbox semantics live in [`crate::services`].

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::{AccountsConfig, DEFAULT_ACCOUNT};
use crate::domain::{message_table, Account, SearchCriteria, SearchOptions};
use crate::error::MailError;
use crate::services::{tally_table, BatchMover, Deleter, FolderService, SenderAggregator, Searcher};
use crate::session::{ImapSessionFactory, SessionFactory};

/// mailsweep: bulk-edit IMAP mailboxes from the shell.
#[derive(Debug, Parser)]
#[command(name = "mailsweep", version, about, long_about = None)]
pub struct Cli {
    /// Account identifier from the accounts file.
    #[arg(short = 'A', long, global = true, default_value = DEFAULT_ACCOUNT)]
    account: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the folders in the configured mailbox.
    #[command(alias = "folders")]
    Ls,

    /// Search a folder for messages, optionally moving or deleting matches.
    #[command(alias = "search")]
    Find(FindArgs),

    /// Print senders in a folder by how many messages they sent.
    Senders {
        /// Folder to tally.
        folder: String,
        /// Only show senders with at least this many messages.
        #[arg(short, long, default_value_t = 1)]
        threshold: usize,
    },

    /// Recursively create a folder path.
    Mkdir {
        /// '/'-delimited folder path to create.
        path: String,
    },
}

#[derive(Debug, Args)]
struct FindArgs {
    /// Folder to search.
    folder: String,

    /// Find messages to this address.
    #[arg(short, long)]
    to: Option<String>,

    /// Find messages from this address.
    #[arg(short, long)]
    from: Option<String>,

    /// Match subject.
    #[arg(short, long)]
    subject: Option<String>,

    /// Find messages received on or after this date (YYYY-MM-DD).
    #[arg(short, long, value_name = "DATE")]
    after: Option<String>,

    /// Find messages received on or before this date (YYYY-MM-DD).
    #[arg(short, long, value_name = "DATE")]
    before: Option<String>,

    /// Find only unread messages.
    #[arg(short, long)]
    unread: bool,

    /// Find only read messages.
    #[arg(short, long)]
    read: bool,

    /// OR the search criteria together instead of AND.
    #[arg(short, long)]
    or: bool,

    /// Move matched messages to this folder.
    #[arg(short = 'm', long = "move", value_name = "FOLDER", conflicts_with = "delete")]
    move_to: Option<String>,

    /// Delete matched messages per the account's deletion policy.
    #[arg(long)]
    delete: bool,

    /// Messages per move batch (defaults to the unified batch size).
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long)]
    yes: bool,
}

/// Parses arguments and runs the requested command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AccountsConfig::load()?;
    let account = config.account(&cli.account)?.clone();

    let factory: Arc<dyn SessionFactory> = Arc::new(ImapSessionFactory::new());
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Ls => {
            let folders = FolderService::new(factory).list_folders(&account).await?;
            for folder in folders {
                println!("{folder}");
            }
        }
        Command::Find(args) => run_find(factory, &account, args, &cancel).await?,
        Command::Senders { folder, threshold } => {
            let tallies = SenderAggregator::new(factory)
                .count_by_sender(&account, &folder, threshold, &cancel)
                .await?;
            print_table(&tally_table(&tallies));
        }
        Command::Mkdir { path } => {
            let mut session = factory.open(&account).await?;
            FolderService::ensure_folder(session.as_mut(), &path)
                .await
                .with_context(|| format!("failed to create folder {path}"))?;
            let _ = session.logout().await;
            println!("created {path}");
        }
    }
    Ok(())
}

async fn run_find(
    factory: Arc<dyn SessionFactory>,
    account: &Account,
    args: FindArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let options = build_search_options(&args)?;
    tracing::debug!(options = %options.serialize(), "search options");
    let criteria = if args.or {
        SearchCriteria::or(&options)?
    } else {
        SearchCriteria::and(&options)?
    };

    let messages = Searcher::new(factory.clone())
        .search(account, &args.folder, &criteria, cancel)
        .await?;
    print_table(&message_table(&messages));

    if messages.is_empty() {
        return Ok(());
    }

    if let Some(destination) = &args.move_to {
        let prompt = format!("really move {} messages to {destination}?", messages.len());
        if args.yes || confirm(&prompt)? {
            BatchMover::new(factory)
                .move_messages(account, &messages, &args.folder, destination, args.batch_size, cancel)
                .await?;
        } else {
            println!("operation cancelled");
        }
    } else if args.delete {
        let prompt = format!("really delete {} messages?", messages.len());
        if args.yes || confirm(&prompt)? {
            Deleter::new(factory)
                .delete_messages(account, &messages, &args.folder, cancel)
                .await?;
        } else {
            println!("operation cancelled");
        }
    }
    Ok(())
}

fn build_search_options(args: &FindArgs) -> Result<SearchOptions, MailError> {
    Ok(SearchOptions {
        to: args.to.clone(),
        from: args.from.clone(),
        subject: args.subject.clone(),
        start_date: args.after.as_deref().map(parse_date).transpose()?,
        end_date: args.before.as_deref().map(parse_date).transpose()?,
        seen: args.read.then_some(true),
        unseen: args.unread.then_some(true),
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, MailError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| MailError::Config(format!("invalid date {value:?}: {e}")))
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Prints table data with columns padded to their widest cell.
fn print_table(rows: &[Vec<String>]) {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(col, cell)| format!("{cell:<width$}", width = widths[col]))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}
