//! Per-run diagnostic event collection.
//!
//! Actions and executors never write to the process-wide logger while a
//! pipeline runs; they push events into a [`RunDiagnostics`] sink that is
//! returned with the run outcome. The caller decides whether to log, audit,
//! or drop the events, and evaluation stays a pure function of its inputs.

use serde::Serialize;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticLevel {
    /// Expected degradation: a value skipped, a rule not triggered.
    Debug,
    /// Something a deployer should look at: a tripped blind stopper, a
    /// failing condition or action.
    Warn,
}

/// One diagnostic event recorded during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEvent {
    /// Severity.
    pub level: DiagnosticLevel,
    /// Zero-based index of the rule being evaluated, when the event was
    /// raised inside a rule.
    pub rule: Option<usize>,
    /// Human-readable message.
    pub message: String,
}

/// The diagnostic sink of a single pipeline run.
#[derive(Debug, Default)]
pub struct RunDiagnostics {
    events: Vec<DiagnosticEvent>,
    current_rule: Option<usize>,
}

impl RunDiagnostics {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the rule subsequent events belong to.
    pub fn enter_rule(&mut self, index: usize) {
        self.current_rule = Some(index);
    }

    /// Records a debug event.
    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Debug, message);
    }

    /// Records a warning event.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Warn, message);
    }

    fn push(&mut self, level: DiagnosticLevel, message: impl Into<String>) {
        self.events.push(DiagnosticEvent {
            level,
            rule: self.current_rule,
            message: message.into(),
        });
    }

    /// All recorded events, in order.
    #[must_use]
    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    /// Number of warning-level events.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.level == DiagnosticLevel::Warn)
            .count()
    }

    /// Checks whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_the_current_rule() {
        let mut diag = RunDiagnostics::new();
        diag.warn("before any rule");
        diag.enter_rule(2);
        diag.debug("value skipped");

        assert_eq!(diag.events().len(), 2);
        assert_eq!(diag.events()[0].rule, None);
        assert_eq!(diag.events()[1].rule, Some(2));
        assert_eq!(diag.warning_count(), 1);
        assert!(!diag.is_empty());
    }
}
