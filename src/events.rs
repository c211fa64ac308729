//! Ordered hand-off from worker tasks to the UI thread.

use log::warn;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel};

use crate::model::{ProgressEvent, RunOutcome, Status};

/// Everything a worker can tell the UI
#[derive(Clone, Debug, PartialEq)]
pub enum QueueMessage {
    LogLine(String),
    StatusChanged(Status),
    Progress(ProgressEvent),
    /// Shown in the log and in a modal alert
    ErrorReported(String),
    /// Terminal result of a download run, always right before `ResetControls`
    Finished(RunOutcome),
    /// Re-enable Download, disable Stop
    ResetControls,
}

/// Producer half; cheap to clone into every worker task
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: UnboundedSender<QueueMessage>,
}

/// Consumer half, owned by the UI
#[derive(Debug)]
pub struct EventQueue {
    rx: UnboundedReceiver<QueueMessage>,
}

pub fn channel() -> (EventSender, EventQueue) {
    let (tx, rx) = unbounded_channel();
    (EventSender { tx }, EventQueue { rx })
}

impl EventSender {
    pub fn send(&self, msg: QueueMessage) {
        if self.tx.send(msg).is_err() {
            warn!("event queue closed, message dropped");
        }
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(QueueMessage::LogLine(line.into()));
    }

    pub fn status(&self, status: Status) {
        self.send(QueueMessage::StatusChanged(status));
    }

    pub fn progress(&self, event: ProgressEvent) {
        self.send(QueueMessage::Progress(event));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(QueueMessage::ErrorReported(message.into()));
    }

    pub fn finished(&self, outcome: RunOutcome) {
        self.send(QueueMessage::Finished(outcome));
    }

    pub fn reset_controls(&self) {
        self.send(QueueMessage::ResetControls);
    }
}

impl EventQueue {
    /// Takes every message queued so far, oldest first. Never waits.
    pub fn drain(&mut self) -> Vec<QueueMessage> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(msg) => out.push(msg),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}
