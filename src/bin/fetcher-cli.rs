#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for browsing an IMAP account (read-only)

use chrono::DateTime;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use imap_fetcher::{Fetcher, FetcherConfig, MailboxNode, MessageDescriptor, ParsedMessage};
use tokio::io::AsyncWriteExt;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fetcher-cli")]
#[command(about = "Read-only CLI for IMAP mailboxes")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the subscribed mailbox tree
    Boxes,

    /// List messages in a mailbox
    List {
        /// Mailbox to list
        #[arg(long, default_value = "INBOX")]
        mailbox: String,

        /// UID set to list (e.g. "1:*" or "10:20")
        #[arg(long, default_value = "1:*")]
        query: String,
    },

    /// Download and decode a single message by UID
    Show {
        /// Message UID
        uid: u32,

        /// Mailbox containing the message
        #[arg(long, default_value = "INBOX")]
        mailbox: String,
    },

    /// Write the raw content of a message to stdout
    Raw {
        /// Message UID
        uid: u32,

        /// Mailbox containing the message
        #[arg(long, default_value = "INBOX")]
        mailbox: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = FetcherConfig::from_env()?;
    let mut fetcher = Fetcher::new(config);
    fetcher.connect().await?;

    let result = match &args.command {
        Command::Boxes => cmd_boxes(&mut fetcher, &args).await,
        Command::List { mailbox, query } => cmd_list(&mut fetcher, &args, mailbox, query).await,
        Command::Show { uid, mailbox } => cmd_show(&mut fetcher, &args, mailbox, *uid).await,
        Command::Raw { uid, mailbox } => cmd_raw(&mut fetcher, mailbox, *uid).await,
    };

    if let Err(e) = fetcher.disconnect().await {
        warn!(%e, "Disconnect failed");
    }
    result
}

async fn cmd_boxes(fetcher: &mut Fetcher, args: &Args) -> anyhow::Result<()> {
    let tree = fetcher.list_boxes().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_tree(&tree, 0);
    }

    Ok(())
}

async fn cmd_list(
    fetcher: &mut Fetcher,
    args: &Args,
    mailbox: &str,
    query: &str,
) -> anyhow::Result<()> {
    let mut results = fetcher.list(mailbox, query)?;
    let mut messages = Vec::new();
    while let Some(result) = results.next().await {
        match result {
            Ok(message) => messages.push(message),
            Err(e) if !e.is_fatal() => warn!(%e, "Skipping message"),
            Err(e) => return Err(e.into()),
        }
    }
    messages.sort_by_key(|m| m.uid);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        print_message_table(&messages);
    }

    Ok(())
}

async fn cmd_show(
    fetcher: &mut Fetcher,
    args: &Args,
    mailbox: &str,
    uid: u32,
) -> anyhow::Result<()> {
    let message = fetcher.download(mailbox, uid).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message_detail(uid, &message);
    }

    Ok(())
}

async fn cmd_raw(fetcher: &mut Fetcher, mailbox: &str, uid: u32) -> anyhow::Result<()> {
    let mut fetched = fetcher.fetch(mailbox, uid).await?;
    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = fetched.content.next().await {
        stdout.write_all(&chunk?).await?;
    }
    stdout.flush().await?;
    Ok(())
}

fn print_tree(nodes: &[MailboxNode], depth: usize) {
    for node in nodes {
        println!("{}{}", "  ".repeat(depth), node.id);
        if let Some(children) = &node.children {
            print_tree(children, depth + 1);
        }
    }
}

fn print_message_table(messages: &[MessageDescriptor]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    let header = format!("{:<8} {:<20} {:<30} {}", "UID", "Date", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(100));

    for message in messages {
        let from = message.people.first().map_or_else(String::new, |p| {
            if p.name.is_empty() {
                p.address.clone()
            } else {
                p.name.clone()
            }
        });
        println!(
            "{:<8} {:<20} {:<30} {}",
            message.uid,
            format_date(message.date),
            truncate(&from, 28),
            truncate(&message.subject, 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn print_message_detail(uid: u32, message: &ParsedMessage) {
    println!("UID:     {uid}");
    println!("Subject: {}", message.subject);

    if !message.attachments.is_empty() {
        println!("\n--- Attachments ---");
        for attachment in &message.attachments {
            println!(
                "  {} ({}, {} bytes)",
                attachment.filename.as_deref().unwrap_or("(unnamed)"),
                attachment.content_type,
                attachment.size
            );
        }
    }

    println!("\n--- Body ---\n");
    match (&message.text, &message.html) {
        (Some(text), _) => println!("{text}"),
        (None, Some(html)) => println!("{html}"),
        (None, None) => println!("(no text body)"),
    }
}

fn format_date(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
