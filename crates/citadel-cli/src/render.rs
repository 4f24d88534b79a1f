//! Terminal output for streamed operations.
//!
//! Every function returns the text to print, so the command loop decides
//! where it goes and tests can look at it directly.

use citadel_core::{
    BatchTally, DeployEvent, DeployResult, LogLine, NarrationEvent, RemoveResult, UpgradeResult,
};
use colored::Colorize;
use serde_json::Value;

/// Render one build/deploy narration line.
///
/// `stream` text is forwarded as is (docker output carries its own
/// newlines). `status` and `progress` share a line.
pub fn narration(event: &NarrationEvent) -> String {
    let mut output = String::new();

    if let Some(error) = &event.error {
        output.push_str(&format!("{}\n", error.red()));
    }
    if let Some(stream) = &event.stream {
        output.push_str(stream);
    }
    match (&event.status, &event.progress) {
        (Some(status), Some(progress)) => {
            output.push_str(&format!("{} {}\n", status.green(), progress));
        }
        (Some(status), None) => output.push_str(&format!("{}\n", status.green())),
        (None, Some(progress)) => output.push_str(&format!("{progress}\n")),
        (None, None) => {}
    }

    output
}

pub fn deploy(event: &DeployEvent) -> String {
    match event {
        DeployEvent::Progress(narration_event) => narration(narration_event),
        DeployEvent::Container(result) => container(result),
    }
}

fn container(result: &DeployResult) -> String {
    if result.success {
        let line = format!(
            "Container {} / {} created successfully",
            result.id.as_deref().unwrap_or("-"),
            result.name.as_deref().unwrap_or("-"),
        );
        format!("{}\n", line.green())
    } else {
        let line = result.error.as_deref().unwrap_or("Container creation failed");
        format!("{}\n", line.red())
    }
}

pub fn remove(result: &RemoveResult) -> String {
    if result.success {
        let line = format!("Container {} removed successfully", result.id);
        format!("{}\n", line.green())
    } else {
        let line = format!(
            "Fail to remove {}, error: {}",
            result.id,
            result.message.as_deref().unwrap_or("")
        );
        format!("{}\n", line.red())
    }
}

pub fn upgrade(result: &UpgradeResult) -> String {
    if result.success {
        let line = format!(
            "Container {} upgrade to {} / {} successfully",
            result.id,
            result.new_id.as_deref().unwrap_or("-"),
            result.new_name.as_deref().unwrap_or("-"),
        );
        format!("{}\n", line.green())
    } else {
        let line = format!(
            "Fail to upgrade {}, error: {}",
            result.id,
            result.error.as_deref().unwrap_or("")
        );
        format!("{}\n", line.red())
    }
}

/// Container output as sent; errors in red.
pub fn log_line(line: &LogLine) -> String {
    let mut output = String::new();

    if let Some(error) = &line.error {
        output.push_str(&format!("{}\n", error.red()));
    }
    if let Some(data) = &line.data {
        output.push_str(data);
        if !data.ends_with('\n') {
            output.push('\n');
        }
    }

    output
}

/// Closing line of a remove/upgrade batch.
pub fn tally(operation: &str, tally: &BatchTally) -> String {
    let line = format!(
        "{operation}: {} succeeded, {} failed",
        tally.succeeded, tally.failed
    );
    if tally.failed == 0 {
        format!("{}\n", line.bold())
    } else {
        format!("{}\n", line.yellow().bold())
    }
}

/// Pretty JSON for the inspection commands.
pub fn json(value: &Value) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(text) => format!("{text}\n"),
        Err(_) => format!("{value}\n"),
    }
}

pub fn error(message: &str) -> String {
    format!("{}\n", message.red().bold())
}

pub fn info(message: &str) -> String {
    format!("{}\n", message.green())
}
