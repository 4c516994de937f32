//! Foreground loop and line rendering for `imount`.

use imount_core::journal::{LogEntry, Status};
use imount_core::theme::Theme;
use imount_core::worker::{Outcome, Task, TaskEvent};

/// `[HH:MM:SS]` in local time.
pub fn stamp() -> String {
    chrono::Local::now().format("[%H:%M:%S]").to_string()
}

/// Print `text` line by line, each prefixed with a timestamp.
pub fn print_stamped(theme: &Theme, text: &str) {
    let prefix = theme.muted(&stamp());
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        println!("{} {}", prefix, line);
    }
}

/// Drive a dispatched operation to completion.
///
/// Ctrl+C cancels the task once; the loop keeps reading until the task
/// reports `Finished`. Returns the reported success and the value, if the
/// operation ran to completion.
pub async fn drive<T: Outcome>(theme: &Theme, title: &str, mut task: Task<T>) -> (bool, Option<T>) {
    println!("{} {}", theme.muted(&stamp()), theme.primary(title));
    let spinner = theme.spinner(title);
    let cancel = task.cancellation_token();
    let mut success = false;

    loop {
        tokio::select! {
            event = task.next_event() => match event {
                Some(TaskEvent::Output(text)) => {
                    spinner.suspend(|| print_stamped(theme, &text));
                }
                Some(TaskEvent::Finished { success: ok, output }) => {
                    spinner.finish_and_clear();
                    println!("{} {}", theme.muted(&stamp()), theme.status(ok, &output));
                    success = ok;
                    break;
                }
                None => {
                    spinner.finish_and_clear();
                    break;
                }
            },
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                tracing::debug!("ctrl-c, cancelling operation");
                cancel.cancel();
            }
        }
    }

    (success, task.join().await)
}

/// One operation-log row.
pub fn log_line(theme: &Theme, entry: &LogEntry) -> String {
    let status = match entry.status {
        Status::Success => theme.success(&entry.status.to_string()),
        Status::Failed => theme.error(&entry.status.to_string()),
    };
    let mut line = format!(
        "{}  {:<7}  {}",
        theme.muted(&entry.timestamp),
        status,
        entry.operation
    );
    if !entry.details.trim().is_empty() {
        let details = entry.details.replace('\n', " ");
        line.push_str(&format!("  {}", theme.muted(details.trim())));
    }
    line
}
