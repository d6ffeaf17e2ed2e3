//! Terminal output for job snapshots.

use vidscribe_core::{JobSnapshot, JobStatus};

/// Lines of `next` not yet shown, given the previously shown history.
///
/// Every poll carries the full history. When the new history does not
/// extend the old one (the backend restarted its log), all of it is new.
pub fn unseen_lines<'a>(previous: &[String], next: &'a [String]) -> &'a [String] {
    if next.len() >= previous.len() && next[..previous.len()] == *previous {
        &next[previous.len()..]
    } else {
        next
    }
}

/// Prints status changes and new log lines as snapshots arrive.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    status: Option<JobStatus>,
    progress: Option<String>,
    shown: Vec<String>,
}

impl ProgressPrinter {
    /// Render whatever changed since the last snapshot.
    pub fn show(&mut self, snapshot: &JobSnapshot) {
        for line in self.render(snapshot) {
            eprintln!("{}", line);
        }
    }

    fn render(&mut self, snapshot: &JobSnapshot) -> Vec<String> {
        let mut out = Vec::new();

        if self.status != Some(snapshot.status) || self.progress != snapshot.progress_message {
            match &snapshot.progress_message {
                Some(progress) => out.push(format!("[{}] {}", snapshot.status, progress)),
                None => out.push(format!("[{}]", snapshot.status)),
            }
            self.status = Some(snapshot.status);
            self.progress = snapshot.progress_message.clone();
        }

        for line in unseen_lines(&self.shown, &snapshot.log_lines) {
            out.push(format!("  {}", line));
        }
        self.shown = snapshot.log_lines.clone();

        out
    }
}
