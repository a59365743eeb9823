//! Build run reporting

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::app::BuildStatus;

/// Events emitted during a build run
#[derive(Debug, Clone)]
pub enum BuildEvent {
    /// An app build is starting
    Started {
        index: usize,
        app: String,
        at: DateTime<Utc>,
    },
    /// An app build finished, successfully or not
    Finished {
        index: usize,
        app: String,
        status: BuildStatus,
        duration: Duration,
        comment: Option<String>,
    },
    /// An app was skipped by the dependency gate or a dry run
    Skipped {
        index: usize,
        app: String,
        reason: String,
    },
    /// A warning was found in a build log
    Warning {
        app: String,
        line: String,
    },
    /// All apps of this job are processed
    AllCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
}

/// Trait for reporting build progress
pub trait BuildReporter: Send + Sync {
    fn report(&self, event: &BuildEvent);
}

/// Reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl BuildReporter for TracingReporter {
    fn report(&self, event: &BuildEvent) {
        match event {
            BuildEvent::Started { index, app, at } => {
                tracing::info!(index, started = %at.to_rfc3339(), "({}) Building {}", index, app);
            }
            BuildEvent::Finished {
                index,
                app,
                status,
                duration,
                comment,
            } => match status {
                BuildStatus::Failed => tracing::error!(
                    "({}) {} failed after {:.1}s: {}",
                    index,
                    app,
                    duration.as_secs_f64(),
                    comment.as_deref().unwrap_or("")
                ),
                _ => tracing::info!("({}) {} {} in {:.1}s", index, app, status, duration.as_secs_f64()),
            },
            BuildEvent::Skipped { index, app, reason } => {
                tracing::info!("({}) {} skipped: {}", index, app, reason);
            }
            BuildEvent::Warning { app, line } => {
                tracing::warn!(app = %app, "{}", line);
            }
            BuildEvent::AllCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                tracing::info!(
                    "Build run complete: {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
                    succeeded,
                    total,
                    failed,
                    skipped,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that keeps every event
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<BuildEvent>>,
}

impl CollectingReporter {
    pub fn events(&self) -> Vec<BuildEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl BuildReporter for CollectingReporter {
    fn report(&self, event: &BuildEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Registry of build reporters
pub struct BuildReporterRegistry {
    reporters: Vec<Arc<dyn BuildReporter>>,
}

impl BuildReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: BuildReporter + 'static>(&mut self, reporter: R) {
        self.reporters.push(Arc::new(reporter));
    }

    pub fn register_shared(&mut self, reporter: Arc<dyn BuildReporter>) {
        self.reporters.push(reporter);
    }

    pub fn all(&self) -> &[Arc<dyn BuildReporter>] {
        &self.reporters
    }

    /// Broadcast an event to all registered reporters
    pub fn broadcast(&self, event: &BuildEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl Default for BuildReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();
        reporter.report(&BuildEvent::Started {
            index: 1,
            app: "examples/hello".to_string(),
            at: Utc::now(),
        });
        reporter.report(&BuildEvent::Finished {
            index: 1,
            app: "examples/hello".to_string(),
            status: BuildStatus::Success,
            duration: Duration::from_secs(5),
            comment: None,
        });

        assert_eq!(reporter.events().len(), 2);
    }

    #[test]
    fn test_tracing_reporter() {
        let reporter = TracingReporter;
        reporter.report(&BuildEvent::Finished {
            index: 2,
            app: "examples/blink".to_string(),
            status: BuildStatus::Failed,
            duration: Duration::from_secs(1),
            comment: Some("exit code 2".to_string()),
        });
        reporter.report(&BuildEvent::AllCompleted {
            total: 2,
            succeeded: 1,
            failed: 1,
            skipped: 0,
            duration: Duration::from_secs(6),
        });
    }

    #[test]
    fn test_broadcast_to_shared() {
        let collecting = Arc::new(CollectingReporter::default());
        let mut registry = BuildReporterRegistry::empty();
        registry.register_shared(collecting.clone());
        registry.register(TracingReporter);
        assert_eq!(registry.all().len(), 2);

        registry.broadcast(&BuildEvent::Skipped {
            index: 1,
            app: "examples/hello".to_string(),
            reason: "current build does not modify any components".to_string(),
        });
        assert_eq!(collecting.events().len(), 1);
    }
}
