//! Progress events emitted while applying a plan or tearing a project down.
//!
//! The engine reports every mutating step through a [`ProgressReporter`].
//! Reporters must not fail; they observe, they do not steer.

use crate::types::ResourceKind;
use std::fmt;
use tracing::info;

/// Event types for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NetworkCreated,
    NetworkRemoved,
    VolumeCreated,
    VolumeRemoved,
    ImagePulled,
    ContainerCreated,
    ContainerStarted,
    ContainerStopped,
    ContainerRemoved,
    ExternalVerified,
    Skipped,
}

impl EventType {
    /// Event type string (e.g., "container.created").
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NetworkCreated => "network.created",
            EventType::NetworkRemoved => "network.removed",
            EventType::VolumeCreated => "volume.created",
            EventType::VolumeRemoved => "volume.removed",
            EventType::ImagePulled => "image.pulled",
            EventType::ContainerCreated => "container.created",
            EventType::ContainerStarted => "container.started",
            EventType::ContainerStopped => "container.stopped",
            EventType::ContainerRemoved => "container.removed",
            EventType::ExternalVerified => "external.verified",
            EventType::Skipped => "skipped",
        }
    }

    /// Action part of the type string (e.g., "created").
    pub fn action(&self) -> &'static str {
        match self.as_str().rsplit_once('.') {
            Some((_, action)) => action,
            None => self.as_str(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a convergence or teardown run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub event_type: EventType,
    pub kind: Option<ResourceKind>,

    /// Runtime name of the resource (container name, network name, image reference)
    pub name: String,

    /// Logical service name, for container events
    pub service: Option<String>,
}

impl ProgressEvent {
    pub fn new(event_type: EventType, kind: Option<ResourceKind>, name: impl Into<String>) -> Self {
        Self { event_type, kind, name: name.into(), service: None }
    }

    pub fn container(event_type: EventType, service: &str, name: impl Into<String>) -> Self {
        Self {
            event_type,
            kind: Some(ResourceKind::Container),
            name: name.into(),
            service: Some(service.to_string()),
        }
    }

    pub fn network(event_type: EventType, name: impl Into<String>) -> Self {
        Self::new(event_type, Some(ResourceKind::Network), name)
    }

    pub fn volume(event_type: EventType, name: impl Into<String>) -> Self {
        Self::new(event_type, Some(ResourceKind::Volume), name)
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.event_type {
            EventType::NetworkCreated | EventType::VolumeCreated | EventType::ContainerCreated => "Created",
            EventType::NetworkRemoved | EventType::VolumeRemoved | EventType::ContainerRemoved => "Removed",
            EventType::ContainerStarted => "Started",
            EventType::ContainerStopped => "Stopped",
            EventType::ImagePulled => "Pulled",
            EventType::ExternalVerified => "Found external",
            EventType::Skipped => "Skipped external",
        };
        match (self.kind, &self.service) {
            (Some(ResourceKind::Container), Some(service)) => {
                write!(f, "{} container {} ({})", action, self.name, service)
            }
            (Some(kind), _) => write!(f, "{} {} {}", action, kind.as_label(), self.name),
            (None, _) => write!(f, "{} image {}", action, self.name),
        }
    }
}

/// Receiver of progress events.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Reporter that forwards events to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, event: &ProgressEvent) {
        info!(event = %event.event_type, name = %event.name, service = ?event.service, "{}", event);
    }
}

/// Reporter that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: &ProgressEvent) {}
}
