//! `clipsync queue` subcommands.
//!
//! Each handler returns the process exit code; errors are reported through
//! [`report_error`] in the selected output format.

use std::collections::BTreeMap;

use clipsync_core::{ClientConfig, Mutation, MutationKind, MutationRecord};
use clipsync_engine::{Enqueued, HttpRemoteActions, MutationQueue, RemoteReplayer};
use clipsync_storage::FileStorage;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{report_error, OutputFormat};

/// Arguments of `queue push`, as given on the command line.
pub(crate) struct PushArgs {
    pub kind: MutationKind,
    pub target: String,
    pub user: String,
    pub parent: Option<String>,
    pub text: Option<String>,
    pub handle: Option<String>,
    pub author: Option<String>,
}

impl PushArgs {
    /// `--target` is the post for post-level kinds and the comment or reply
    /// for comment likes.
    fn into_mutation(self) -> Mutation {
        let (post_id, comment_id) = match self.kind {
            MutationKind::CommentLike | MutationKind::ReplyLike => (None, Some(self.target)),
            _ => (Some(self.target), None),
        };
        Mutation {
            kind: self.kind,
            post_id,
            comment_id,
            parent_id: self.parent,
            user_id: self.user,
            text: self.text,
            user_handle: self.handle,
            author_handle: self.author,
            placeholder_id: None,
        }
    }
}

async fn open_queue(
    config: &ClientConfig,
    output: OutputFormat,
    quiet: bool,
) -> Option<MutationQueue<FileStorage>> {
    match FileStorage::open(&config.queue.dir).await {
        Ok(storage) => Some(MutationQueue::from_settings(storage, &config.queue)),
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            None
        }
    }
}

async fn load_pending(
    queue: &MutationQueue<FileStorage>,
    output: OutputFormat,
    quiet: bool,
) -> Option<Vec<MutationRecord>> {
    match queue.pending().await {
        Ok(records) => Some(records),
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            None
        }
    }
}

fn format_at(at: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(at) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| at.to_string())
}

fn describe(record: &MutationRecord) -> String {
    let mutation = &record.mutation;
    let mut line = format!(
        "{}  {}  {:<11}  {}  user={}",
        record.id,
        format_at(record.at),
        record.kind().as_str(),
        record.target_id(),
        record.user_id()
    );
    if let Some(parent) = &mutation.parent_id {
        line.push_str(&format!(" parent={parent}"));
    }
    if let Some(author) = &mutation.author_handle {
        line.push_str(&format!(" author={author}"));
    }
    if let Some(text) = &mutation.text {
        line.push_str(&format!(" text={text:?}"));
    }
    line
}

pub(crate) async fn cmd_list(config: &ClientConfig, output: OutputFormat, quiet: bool) -> i32 {
    let Some(queue) = open_queue(config, output, quiet).await else {
        return 1;
    };
    let Some(records) = load_pending(&queue, output, quiet).await else {
        return 1;
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&records) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                report_error(&format!("error: {e}"), output, quiet);
                return 1;
            }
        },
        OutputFormat::Text => {
            if records.is_empty() {
                if !quiet {
                    println!("queue is empty");
                }
            } else {
                for record in &records {
                    println!("{}", describe(record));
                }
            }
        }
    }
    0
}

pub(crate) async fn cmd_status(config: &ClientConfig, output: OutputFormat, quiet: bool) -> i32 {
    let Some(queue) = open_queue(config, output, quiet).await else {
        return 1;
    };
    let Some(records) = load_pending(&queue, output, quiet).await else {
        return 1;
    };

    let mut by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for record in &records {
        *by_kind.entry(record.kind().as_str()).or_default() += 1;
    }
    let oldest = records.iter().map(|r| r.at).min();
    let now_ms = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
        .unwrap_or(i64::MAX);
    let oldest_age_ms = oldest.map(|at| (now_ms - at).max(0));

    match output {
        OutputFormat::Json => {
            let result = serde_json::json!({
                "dir": config.queue.dir.display().to_string(),
                "key": config.queue.key,
                "pending": records.len(),
                "oldest": oldest.map(format_at),
                "oldestAgeMs": oldest_age_ms,
                "byKind": by_kind,
            });
            println!("{result}");
        }
        OutputFormat::Text => {
            println!(
                "{} pending in {} ({})",
                records.len(),
                config.queue.dir.display(),
                config.queue.key
            );
            if let (Some(at), Some(age)) = (oldest, oldest_age_ms) {
                println!("oldest: {} ({}s ago)", format_at(at), age / 1000);
            }
            for (kind, count) in &by_kind {
                println!("  {kind:<11} {count}");
            }
        }
    }
    0
}

pub(crate) async fn cmd_push(
    config: &ClientConfig,
    args: PushArgs,
    output: OutputFormat,
    quiet: bool,
) -> i32 {
    let Some(queue) = open_queue(config, output, quiet).await else {
        return 1;
    };

    let enqueued = match queue.enqueue(args.into_mutation()).await {
        Ok(enqueued) => enqueued,
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            return 1;
        }
    };

    match (&enqueued, output) {
        (Enqueued::Appended(record), OutputFormat::Json) => {
            println!("{}", serde_json::json!({ "appended": record }));
        }
        (Enqueued::Coalesced { cancelled }, OutputFormat::Json) => {
            println!("{}", serde_json::json!({ "cancelled": cancelled }));
        }
        (Enqueued::Appended(record), OutputFormat::Text) => {
            if !quiet {
                println!("queued {}", describe(record));
            }
        }
        (Enqueued::Coalesced { cancelled }, OutputFormat::Text) => {
            if !quiet {
                println!("cancelled pending {}", describe(cancelled));
            }
        }
    }
    0
}

pub(crate) async fn cmd_drain(config: &ClientConfig, output: OutputFormat, quiet: bool) -> i32 {
    let remote = match HttpRemoteActions::from_settings(&config.remote) {
        Ok(remote) => remote,
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            return 1;
        }
    };
    let Some(queue) = open_queue(config, output, quiet).await else {
        return 1;
    };

    let report = match queue.drain(&RemoteReplayer::new(remote)).await {
        Ok(report) => report,
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            return 1;
        }
    };
    let remaining = queue.len().await.unwrap_or_default();

    match output {
        OutputFormat::Json => {
            let aborted = report.aborted.as_ref().map(|abort| {
                serde_json::json!({
                    "recordId": abort.record_id,
                    "kind": abort.kind,
                    "error": abort.error.to_string(),
                })
            });
            let result = serde_json::json!({
                "replayed": report.replayed,
                "aborted": aborted,
                "remaining": remaining,
            });
            if report.is_complete() {
                println!("{result}");
            } else {
                eprintln!("{result}");
            }
        }
        OutputFormat::Text => {
            if let Some(abort) = &report.aborted {
                if !quiet {
                    eprintln!(
                        "drain stopped at {} ({}): {}",
                        abort.record_id, abort.kind, abort.error
                    );
                    eprintln!(
                        "{} replayed, {} still pending",
                        report.replayed.len(),
                        remaining
                    );
                }
            } else if !quiet {
                println!("{} replayed, {} pending", report.replayed.len(), remaining);
            }
        }
    }

    if report.is_complete() {
        0
    } else {
        1
    }
}
