use anyhow::{Context, Result};

/// Response that the app may send as a response to a event.
/// This is used in `DaemonCommand`s that contain a response sender.
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_more::Display)]
pub enum DaemonResponse {
    Success(String),
    Failure(String),
}

#[derive(Debug)]
pub struct DaemonResponseSender(tokio::sync::mpsc::UnboundedSender<DaemonResponse>);

pub fn create_pair() -> (DaemonResponseSender, tokio::sync::mpsc::UnboundedReceiver<DaemonResponse>) {
    let (sender, recv) = tokio::sync::mpsc::unbounded_channel();
    (DaemonResponseSender(sender), recv)
}

impl DaemonResponseSender {
    pub fn send_success(&self, s: String) -> Result<()> {
        self.0.send(DaemonResponse::Success(s)).context("Failed to send success response from application thread")
    }

    pub fn send_failure(&self, s: String) -> Result<()> {
        self.0.send(DaemonResponse::Failure(s)).context("Failed to send failure response from application thread")
    }

    /// Given a result, respond with its `Ok` value serialized as JSON, or the formatted error.
    pub fn respond_with_json<T: serde::Serialize>(&self, result: Result<T>) -> Result<()> {
        match result.and_then(|value| serde_json::to_string_pretty(&value).context("Failed to serialize response")) {
            Ok(json) => self.send_success(json),
            Err(e) => self.send_failure(crate::error_handling_ctx::format_error(&e)),
        }
    }
}

pub type DaemonResponseReceiver = tokio::sync::mpsc::UnboundedReceiver<DaemonResponse>;
