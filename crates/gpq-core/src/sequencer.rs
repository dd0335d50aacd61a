//! Sequential processing of a download queue.
//!
//! The engine's job model and the host's progress reporting are both
//! single-flow, so queued requests run strictly in submission order with
//! exactly one job in flight. A per-job failure is surfaced and the queue
//! moves on; a size warning suspends the whole queue until the caller
//! resolves it; cancellation stops the run and continuing is an explicit
//! caller decision.

use std::collections::VecDeque;
use std::path::PathBuf;

use log::info;

use crate::engine::EngineFactory;
use crate::events::EventSender;
use crate::job::{DownloadJob, DownloadRequest, JobOutcome, KillSwitch};

/// How the caller resolves a suspended size warning.
#[derive(Debug, Clone)]
pub enum SizeWarningChoice {
    /// Write the GeoJSON anyway.
    ProceedAnyway,
    /// Write to a different destination (and thus format) instead.
    SwitchFormat { output_path: PathBuf },
    /// Drop the request and continue with the rest of the queue.
    Abandon,
}

/// Why a [`DownloadSequencer::run`] call returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequencerState {
    /// Every request reached a terminal outcome.
    Drained,
    /// The active job hit the size threshold; resolve before running again.
    Suspended { estimated_mb: f64 },
    /// The kill flag was observed; the remaining queue is kept.
    Cancelled,
}

/// Runs queued [`DownloadRequest`]s one at a time.
pub struct DownloadSequencer {
    queue: VecDeque<DownloadRequest>,
    events: EventSender,
    kill: KillSwitch,
    suspended: Option<DownloadRequest>,
}

impl DownloadSequencer {
    #[must_use]
    pub fn new(events: EventSender, kill: KillSwitch) -> Self {
        Self {
            queue: VecDeque::new(),
            events,
            kill,
            suspended: None,
        }
    }

    pub fn enqueue(&mut self, request: DownloadRequest) {
        self.queue.push_back(request);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.suspended.is_none()
    }

    /// The shared cancellation flag for the active job.
    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    /// Process the queue until it drains, suspends, or is cancelled.
    ///
    /// Starting the next job only after the previous one reached a terminal
    /// signal is the ordering guarantee: jobs never run concurrently and are
    /// never reordered. After [`SequencerState::Cancelled`], call
    /// [`KillSwitch::reset`] and run again to continue with the remaining
    /// queue; continuation is never automatic.
    pub fn run(&mut self, factory: &dyn EngineFactory) -> SequencerState {
        while let Some(request) = self.queue.pop_front() {
            info!("Starting download of {}", request.dataset_url);
            let mut job = DownloadJob::new(request, self.events.clone(), self.kill.clone());
            let outcome = job.run(factory);
            match outcome {
                JobOutcome::Completed | JobOutcome::Failed => {},
                JobOutcome::SizeWarning(estimated_mb) => {
                    self.suspended = Some(job.into_request());
                    return SequencerState::Suspended { estimated_mb };
                },
                JobOutcome::Killed => {
                    return SequencerState::Cancelled;
                },
            }
        }
        SequencerState::Drained
    }

    /// Resolve a suspended size warning. Returns false when nothing was
    /// suspended. The queue does not advance past the suspended request
    /// unless it is abandoned.
    pub fn resolve_size_warning(&mut self, choice: SizeWarningChoice) -> bool {
        let Some(mut request) = self.suspended.take() else {
            return false;
        };
        match choice {
            SizeWarningChoice::ProceedAnyway => {
                request.size_warning_accepted = true;
                self.queue.push_front(request);
            },
            SizeWarningChoice::SwitchFormat { output_path } => {
                request.output_path = output_path;
                self.queue.push_front(request);
            },
            SizeWarningChoice::Abandon => {},
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeEngine, FakeFactory, describe_row};
    use crate::events::{EventSender, JobEvent, drain};
    use crate::extent::{Crs, Extent};
    use crate::validate::ValidationReport;

    fn request(url: &str, output: &str) -> DownloadRequest {
        DownloadRequest::new(
            url,
            Extent::new(-122.5, 37.2, -122.1, 37.9),
            Crs::parse("EPSG:4326").unwrap(),
            output,
            ValidationReport::trusted(),
        )
    }

    fn populated_factory() -> FakeFactory {
        FakeFactory {
            engine: FakeEngine {
                describe_rows: vec![
                    describe_row("id", "INTEGER"),
                    describe_row("geometry", "GEOMETRY"),
                ],
                row_count: 10,
                avg_feature_size: Some(100.0),
                ..FakeEngine::default()
            },
            ..FakeFactory::default()
        }
    }

    #[test]
    fn test_queue_runs_in_submission_order() {
        let factory = populated_factory();
        let (events, mut rx) = EventSender::channel();
        let mut sequencer = DownloadSequencer::new(events, KillSwitch::new());
        sequencer.enqueue(request("https://example.com/a.parquet", "/tmp/a.parquet"));
        sequencer.enqueue(request("https://example.com/b.parquet", "/tmp/b.parquet"));

        assert_eq!(sequencer.run(&factory), SequencerState::Drained);
        assert!(sequencer.is_empty());

        let loads: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                JobEvent::RequestLoad(path) => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(
            loads,
            vec![PathBuf::from("/tmp/a.parquet"), PathBuf::from("/tmp/b.parquet")]
        );
    }

    #[test]
    fn test_failed_job_does_not_abort_queue() {
        let factory = populated_factory();
        let (events, mut rx) = EventSender::channel();
        let mut sequencer = DownloadSequencer::new(events, KillSwitch::new());
        sequencer.enqueue(request("https://example.com/a.parquet", "/tmp/a.xyz"));
        sequencer.enqueue(request("https://example.com/b.parquet", "/tmp/b.parquet"));

        assert_eq!(sequencer.run(&factory), SequencerState::Drained);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, JobEvent::Error(_))));
        assert!(
            events
                .iter()
                .any(|e| *e == JobEvent::RequestLoad(PathBuf::from("/tmp/b.parquet")))
        );
    }

    #[test]
    fn test_size_warning_suspends_and_proceed_resubmits() {
        let mut factory = populated_factory();
        factory.engine.row_count = 1_000_000;
        factory.engine.avg_feature_size = Some(8192.0);
        let (events, mut rx) = EventSender::channel();
        let mut sequencer = DownloadSequencer::new(events, KillSwitch::new());
        sequencer.enqueue(request("https://example.com/a.parquet", "/tmp/a.geojson"));
        sequencer.enqueue(request("https://example.com/b.parquet", "/tmp/b.parquet"));

        let state = sequencer.run(&factory);
        assert!(matches!(state, SequencerState::Suspended { estimated_mb } if estimated_mb > 4096.0));
        // The suspended request did not advance the queue.
        assert_eq!(sequencer.len(), 1);

        assert!(sequencer.resolve_size_warning(SizeWarningChoice::ProceedAnyway));
        assert_eq!(sequencer.run(&factory), SequencerState::Drained);

        let log = factory.engine.log();
        assert!(
            log.iter()
                .any(|sql| sql.starts_with("COPY download_data TO '/tmp/a.geojson'"))
        );
        assert!(
            log.iter()
                .any(|sql| sql.starts_with("COPY download_data TO '/tmp/b.parquet'"))
        );
        drop(drain(&mut rx));
    }

    #[test]
    fn test_size_warning_switch_format() {
        let mut factory = populated_factory();
        factory.engine.row_count = 1_000_000;
        factory.engine.avg_feature_size = Some(8192.0);
        let (events, _rx) = EventSender::channel();
        let mut sequencer = DownloadSequencer::new(events, KillSwitch::new());
        sequencer.enqueue(request("https://example.com/a.parquet", "/tmp/a.geojson"));

        assert!(matches!(
            sequencer.run(&factory),
            SequencerState::Suspended { .. }
        ));
        assert!(sequencer.resolve_size_warning(SizeWarningChoice::SwitchFormat {
            output_path: PathBuf::from("/tmp/a.fgb"),
        }));
        assert_eq!(sequencer.run(&factory), SequencerState::Drained);

        assert!(factory.engine.log().iter().any(|sql| {
            sql.starts_with("COPY download_data TO '/tmp/a.fgb'")
                && sql.contains("DRIVER 'FlatGeobuf'")
        }));
    }

    #[test]
    fn test_size_warning_abandon_continues_queue() {
        let mut factory = populated_factory();
        factory.engine.row_count = 1_000_000;
        factory.engine.avg_feature_size = Some(8192.0);
        let (events, _rx) = EventSender::channel();
        let mut sequencer = DownloadSequencer::new(events, KillSwitch::new());
        sequencer.enqueue(request("https://example.com/a.parquet", "/tmp/a.geojson"));
        sequencer.enqueue(request("https://example.com/b.parquet", "/tmp/b.parquet"));

        assert!(matches!(
            sequencer.run(&factory),
            SequencerState::Suspended { .. }
        ));
        assert!(sequencer.resolve_size_warning(SizeWarningChoice::Abandon));
        assert_eq!(sequencer.run(&factory), SequencerState::Drained);

        let log = factory.engine.log();
        assert!(!log.iter().any(|sql| sql.contains("'/tmp/a.geojson'") && sql.starts_with("COPY")));
        assert!(
            log.iter()
                .any(|sql| sql.starts_with("COPY download_data TO '/tmp/b.parquet'"))
        );
    }

    #[test]
    fn test_resolve_without_suspension_is_noop() {
        let (events, _rx) = EventSender::channel();
        let mut sequencer = DownloadSequencer::new(events, KillSwitch::new());
        assert!(!sequencer.resolve_size_warning(SizeWarningChoice::Abandon));
    }

    #[test]
    fn test_cancel_keeps_remaining_queue() {
        let factory = populated_factory();
        let (events, mut rx) = EventSender::channel();
        let kill = KillSwitch::new();
        kill.kill();
        let mut sequencer = DownloadSequencer::new(events, kill.clone());
        sequencer.enqueue(request("https://example.com/a.parquet", "/tmp/a.parquet"));
        sequencer.enqueue(request("https://example.com/b.parquet", "/tmp/b.parquet"));

        assert_eq!(sequencer.run(&factory), SequencerState::Cancelled);
        // The killed request is gone; the rest waits for an explicit resume.
        assert_eq!(sequencer.len(), 1);
        assert!(drain(&mut rx).is_empty());

        kill.reset();
        assert_eq!(sequencer.run(&factory), SequencerState::Drained);
        assert!(drain(&mut rx).contains(&JobEvent::RequestLoad(PathBuf::from("/tmp/b.parquet"))));
    }
}
