//! Progress reporting for a generation run.
//!
//! The reporter is a cheap cloneable handle; a copy can be read from another
//! thread or task while the run that owns it is still working.

use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub phase: Phase,
    pub percent: u8,
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    inner: Arc<RwLock<GenerationStatus>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves plain data behind; keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, GenerationStatus> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GenerationStatus> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> GenerationStatus {
        self.read().clone()
    }

    pub fn phase(&self) -> Phase {
        self.read().phase
    }

    /// Resets the state for a new run.
    pub fn start(&self, message: impl Into<String>) {
        *self.write() = GenerationStatus {
            phase: Phase::Running,
            percent: 0,
            message: message.into(),
            errors: Vec::new(),
        };
    }

    pub fn progress(&self, percent: u8, message: impl Into<String>) {
        let mut status = self.write();
        status.percent = percent.min(100);
        status.message = message.into();
    }

    /// Records a problem that does not stop the run.
    pub fn record_error(&self, error: impl Into<String>) {
        self.write().errors.push(error.into());
    }

    pub fn complete(&self, message: impl Into<String>) {
        let mut status = self.write();
        status.phase = Phase::Completed;
        status.percent = 100;
        status.message = message.into();
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut status = self.write();
        status.phase = Phase::Failed;
        status.message = message.into();
    }
}
