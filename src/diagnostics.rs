// ABOUTME: Diagnostics accumulator for non-fatal failures during a rollout.
// ABOUTME: Stop/remove failures are collected and shown without failing the deploy.

/// Collects non-fatal warnings during rollout operations.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a rollout.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A previous container could not be stopped; draining continued.
    pub fn container_stop(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ContainerStop,
            message: message.into(),
        }
    }

    /// An exited container could not be removed; pruning continued.
    pub fn container_remove(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ContainerRemove,
            message: message.into(),
        }
    }
}

/// Categories of non-fatal failures during a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Graceful stop of a previous container failed.
    ContainerStop,
    /// Removal of an exited container failed.
    ContainerRemove,
}
