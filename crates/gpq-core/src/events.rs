//! Outbound notifications from jobs to their owner.
//!
//! The host observes a download through a typed event channel rather than
//! callbacks: progress text for a status line, informational and error
//! messages for dialogs, the size warning that suspends a job, the request
//! to load a finished file as a layer, and a completion marker that lets a
//! queue advance.

use std::path::PathBuf;

use tokio::sync::mpsc;

/// One observable event from a running job or validator.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Human-readable status, suitable for a progress label.
    Progress(String),
    /// Informational outcome; not an error, the job still completes.
    Info(String),
    /// A failure already classified for the user.
    Error(String),
    /// Estimated output size (MB) exceeded the threshold; job suspended.
    FileSizeWarning(f64),
    /// The finished file the host should open as a layer.
    RequestLoad(PathBuf),
    /// Terminal marker; a sequencer may start the next job.
    Completed,
}

/// Sending half of the event channel.
///
/// Sends never fail from the emitter's point of view: if the receiver is
/// gone the event is dropped, matching a host that closed its progress UI.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl EventSender {
    /// Create a connected sender/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.send(JobEvent::Progress(message.into()));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(JobEvent::Info(message.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(JobEvent::Error(message.into()));
    }

    pub fn file_size_warning(&self, estimated_mb: f64) {
        self.send(JobEvent::FileSizeWarning(estimated_mb));
    }

    pub fn request_load(&self, path: PathBuf) {
        self.send(JobEvent::RequestLoad(path));
    }

    pub fn completed(&self) {
        self.send(JobEvent::Completed);
    }

    fn send(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
