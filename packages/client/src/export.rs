//! Flattening judgments for export.

use serde::Serialize;
use serde_json::Value;

use crate::queue::{GetAll, Queue};
use crate::server::Server;
use crate::Error;

/// Value the server stores for judgments settled by reconciliation.
const RECONCILED: &str = "reconciled";

/// One judgment on one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgmentRow {
    pub question_id: String,
    /// The judge's `fb_user_id`.
    pub user: String,
    /// The judged value; reconciled judgments read `reconciled:<recon_id>`.
    pub value: String,
}

/// One row per judgment for every question in `state` that has at least
/// `min` judgments.
pub fn export_judgments(
    queue: &Queue,
    state: Option<&str>,
    min: usize,
) -> Result<Vec<JudgmentRow>, Error> {
    let mut options = GetAll::default().with_judgments();
    if let Some(state) = state {
        options = options.state(state);
    }

    let mut rows = Vec::new();
    for question in queue.get_all(&options)? {
        let url = question.locator().url();
        let id = question
            .id()
            .ok_or_else(|| Error::missing(url.as_str(), "id"))?;
        let judgments = match question.get("judgments") {
            Some(Value::Array(judgments)) => judgments,
            _ => continue,
        };
        if judgments.len() < min {
            continue;
        }
        for judgment in judgments {
            rows.push(JudgmentRow {
                question_id: id.to_string(),
                user: judge(judgment, &url)?,
                value: judged_value(judgment, &url)?,
            });
        }
    }
    Ok(rows)
}

/// [`export_judgments`] for a queue fetched by id.
pub fn export_queue_judgments(
    server: &Server,
    queue_id: &str,
    access_key: Option<&str>,
    state: Option<&str>,
    min: usize,
) -> Result<Vec<JudgmentRow>, Error> {
    let queue = server.get_queue(queue_id, access_key)?;
    export_judgments(&queue, state, min)
}

fn judge(judgment: &Value, url: &str) -> Result<String, Error> {
    judgment
        .pointer("/user/fb_user_id")
        .map(text)
        .ok_or_else(|| Error::missing(url, "user.fb_user_id"))
}

fn judged_value(judgment: &Value, url: &str) -> Result<String, Error> {
    let value = judgment
        .get("value")
        .ok_or_else(|| Error::missing(url, "value"))?;
    if value.as_str() != Some(RECONCILED) {
        return Ok(text(value));
    }
    let recon_id = judgment
        .pointer("/__metadata__/recon_id")
        .ok_or_else(|| Error::missing(url, "__metadata__.recon_id"))?;
    Ok(format!("{}:{}", RECONCILED, text(recon_id)))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
