use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::{MessageRef, Sender},
    engine::{DeleteOutcome, RelayOutcome},
    errors::Error,
    Result,
};

const AUDIT_MAX_TEXT: usize = 500;

/// RFC3339 timestamp in UTC.
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purged: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, sender: Option<&Sender>) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: sender.map(|s| s.user_id),
            username: sender.and_then(|s| s.username.clone()),
            ..Default::default()
        }
    }

    pub fn relay(sender: &Sender, original: &MessageRef, text: &str, out: &RelayOutcome) -> Self {
        Self {
            original: Some(original.to_string()),
            content: Some(text.to_string()),
            succeeded: Some(out.delivered.len()),
            failed: Some(out.failed.len()),
            ..Self::base("relay", Some(sender))
        }
    }

    pub fn cascade_delete(sender: Option<&Sender>, original: &MessageRef, out: &DeleteOutcome) -> Self {
        Self {
            original: Some(original.to_string()),
            succeeded: Some(out.deleted.len()),
            failed: Some(out.failed.len()),
            purged: Some(out.purged),
            ..Self::base("cascade_delete", sender)
        }
    }

    pub fn command(sender: &Sender, command: &str, authorized: bool) -> Self {
        Self {
            command: Some(command.to_string()),
            authorized: Some(authorized),
            ..Self::base("command", Some(sender))
        }
    }

    pub fn unauthorized(sender: &Sender, text: &str) -> Self {
        Self {
            content: Some(text.to_string()),
            authorized: Some(false),
            ..Self::base("unauthorized", Some(sender))
        }
    }

    pub fn error(sender: Option<&Sender>, error: &str, context: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            command: Some(context.to_string()),
            ..Self::base("error", sender)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}
