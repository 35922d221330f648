//! Compilation diagnostics
//!
//! What the compiler tolerated or decided is reported through a
//! [`Diagnostics`] sink supplied by the caller. Plain `tracing` calls remain
//! for progress only.

use std::fmt;
use std::sync::Mutex;
use tektonic_resources::LoadNote;
use tracing::{debug, info, warn};

/// Something worth telling the user about during a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// The loader skipped or replaced a document
    Load(LoadNote),
    /// A build option key was not recognized
    UnknownOption {
        /// The unrecognized key
        key: String,
    },
    /// A run supplied a value for a param the task does not declare
    UnusedParam {
        /// Run or pipeline task that supplied the value
        resource: String,
        /// Undeclared param name
        param: String,
    },
    /// A step was compiled into a descriptor
    StepCompiled {
        /// Display name of the exec node
        display_name: String,
        /// Normalized image reference
        image: String,
    },
    /// Image metadata was resolved
    ImageResolved {
        /// Normalized image reference
        reference: String,
        /// Pinned digest, when the resolver knows one
        digest: Option<String>,
    },
    /// Pipeline tasks were ordered
    TasksOrdered {
        /// Pipeline task names in execution order
        order: Vec<String>,
    },
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(note) => fmt::Display::fmt(note, f),
            Self::UnknownOption { key } => write!(f, "ignoring unknown build option '{key}'"),
            Self::UnusedParam { resource, param } => {
                write!(f, "{resource}: param '{param}' is not declared and was ignored")
            }
            Self::StepCompiled {
                display_name,
                image,
            } => write!(f, "compiled step {display_name} ({image})"),
            Self::ImageResolved { reference, digest } => match digest {
                Some(digest) => write!(f, "resolved {reference} to {digest}"),
                None => write!(f, "resolved {reference} (unpinned)"),
            },
            Self::TasksOrdered { order } => write!(f, "task order: {}", order.join(" -> ")),
        }
    }
}

/// Sink for [`DiagnosticEvent`]s
pub trait Diagnostics: Send + Sync {
    /// Report one event
    fn emit(&self, event: DiagnosticEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::Load(LoadNote::Replaced { name, .. }) => {
                warn!(definition = %name, "{event}");
            }
            DiagnosticEvent::Load(LoadNote::Skipped { kind, .. }) => {
                info!(kind = %kind, "{event}");
            }
            DiagnosticEvent::UnusedParam { param, .. } => warn!(param = %param, "{event}"),
            DiagnosticEvent::UnknownOption { key } => debug!(key = %key, "{event}"),
            DiagnosticEvent::StepCompiled { display_name, .. } => {
                debug!(step = %display_name, "{event}");
            }
            DiagnosticEvent::ImageResolved { reference, .. } => {
                debug!(image = %reference, "{event}");
            }
            DiagnosticEvent::TasksOrdered { .. } => info!("{event}"),
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, in order
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn emit(&self, event: DiagnosticEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
