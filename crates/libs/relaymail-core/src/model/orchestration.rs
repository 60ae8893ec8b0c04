//! Orchestration state machine for review workflows.
//!
//! This module provides state parsing for review threads based on subject prefixes.
//! Used by multi-agent orchestration to track task lifecycle.

use crate::model::message::Message;
use serde::{Deserialize, Serialize};

/// State machine for orchestration workflows.
/// States are parsed from message subject prefixes like `[TASK_STARTED]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestrationState {
    /// Task has been started - `[TASK_STARTED]`
    Started,
    /// Task is complete, awaiting review - `[COMPLETION]`
    Completed,
    /// Reviewer is actively reviewing - `[REVIEWING]`
    Reviewing,
    /// Review approved - `[APPROVED]`
    Approved,
    /// Review rejected, needs fixes - `[REJECTED]`
    Rejected,
    /// Fixes applied after rejection - `[FIXED]`
    Fixed,
    /// Message acknowledged - `[ACK]`
    Acknowledged,
}

impl OrchestrationState {
    /// Parse state from message subject prefix.
    /// Returns `None` if no recognized prefix is found.
    pub fn from_subject(subject: &str) -> Option<Self> {
        let subject_upper = subject.to_uppercase();

        if subject_upper.starts_with("[TASK_STARTED]") {
            Some(Self::Started)
        } else if subject_upper.starts_with("[COMPLETION]") {
            Some(Self::Completed)
        } else if subject_upper.starts_with("[REVIEWING]") {
            Some(Self::Reviewing)
        } else if subject_upper.starts_with("[APPROVED]") {
            Some(Self::Approved)
        } else if subject_upper.starts_with("[REJECTED]") {
            Some(Self::Rejected)
        } else if subject_upper.starts_with("[FIXED]") {
            Some(Self::Fixed)
        } else if subject_upper.starts_with("[ACK]") {
            Some(Self::Acknowledged)
        } else {
            None
        }
    }

    /// Check if transitioning to the given state is valid.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        use OrchestrationState::*;

        match (self, next) {
            // From Started: can move to Completed
            (Started, Completed) => true,

            // From Completed: can be Reviewing, Approved, Rejected, or Acknowledged
            (Completed, Reviewing) => true,
            (Completed, Approved) => true,
            (Completed, Rejected) => true,
            (Completed, Acknowledged) => true,

            // From Reviewing: can be Approved or Rejected
            (Reviewing, Approved) => true,
            (Reviewing, Rejected) => true,

            // From Rejected: can be Fixed
            (Rejected, Fixed) => true,

            // From Fixed: goes back to review cycle
            (Fixed, Reviewing) => true,
            (Fixed, Approved) => true,
            (Fixed, Rejected) => true,

            // From Approved: can be Acknowledged
            (Approved, Acknowledged) => true,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Get the prefix string for this state
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Started => "[TASK_STARTED]",
            Self::Completed => "[COMPLETION]",
            Self::Reviewing => "[REVIEWING]",
            Self::Approved => "[APPROVED]",
            Self::Rejected => "[REJECTED]",
            Self::Fixed => "[FIXED]",
            Self::Acknowledged => "[ACK]",
        }
    }
}

impl std::fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

// -- ORCH-2: CompletionReport --

/// Quality gate check results
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QualityGateResults {
    pub tests_passed: Option<bool>,
    pub lint_passed: Option<bool>,
    pub build_passed: Option<bool>,
    pub coverage_met: Option<bool>,
}

impl QualityGateResults {
    pub fn all_passed(&self) -> bool {
        self.tests_passed.unwrap_or(true)
            && self.lint_passed.unwrap_or(true)
            && self.build_passed.unwrap_or(true)
            && self.coverage_met.unwrap_or(true)
    }
}

/// Standardized completion report for [COMPLETION] mails.
/// Used by agents to report task completion in a structured format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    /// Beads task ID (e.g., "relaymail-rs-abc")
    pub task_id: String,
    /// Human-readable task title
    pub task_title: String,
    /// Git commit SHA of the final commit
    pub commit_id: String,
    /// Branch where the work was done
    pub branch: String,
    /// List of files changed
    pub files_changed: Vec<String>,
    /// Summary of changes made
    pub summary: String,
    /// Acceptance criteria status: (criterion, passed)
    pub criteria_status: Vec<(String, bool)>,
    /// Quality gate results
    pub quality_gates: QualityGateResults,
    /// Optional additional notes
    pub notes: Option<String>,
}

impl CompletionReport {
    /// Create a new blank report with the given task ID
    pub fn new(task_id: impl Into<String>, task_title: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task_title: task_title.into(),
            commit_id: String::new(),
            branch: String::new(),
            files_changed: vec![],
            summary: String::new(),
            criteria_status: vec![],
            quality_gates: QualityGateResults::default(),
            notes: None,
        }
    }

    /// Generate markdown format suitable for [COMPLETION] messages
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# Completion Report: {}\n\n", self.task_title));
        md.push_str(&format!("**Task ID**: `{}`\n", self.task_id));
        md.push_str(&format!("**Commit**: `{}`\n", self.commit_id));
        md.push_str(&format!("**Branch**: `{}`\n\n", self.branch));

        // Summary
        md.push_str("## Summary\n\n");
        md.push_str(&self.summary);
        md.push_str("\n\n");

        // Files Changed
        md.push_str("## Files Changed\n\n");
        for file in &self.files_changed {
            md.push_str(&format!("- `{}`\n", file));
        }
        md.push_str("\n");

        // Acceptance Criteria
        md.push_str("## Acceptance Criteria\n\n");
        for (criterion, passed) in &self.criteria_status {
            let icon = if *passed { "✅" } else { "❌" };
            md.push_str(&format!("{} {}\n", icon, criterion));
        }
        md.push_str("\n");

        // Quality Gates
        md.push_str("## Quality Gates\n\n");
        let gate_icon = |opt: Option<bool>| match opt {
            Some(true) => "✅",
            Some(false) => "❌",
            None => "⏭️",
        };
        md.push_str(&format!(
            "{} Tests\n",
            gate_icon(self.quality_gates.tests_passed)
        ));
        md.push_str(&format!(
            "{} Lint\n",
            gate_icon(self.quality_gates.lint_passed)
        ));
        md.push_str(&format!(
            "{} Build\n",
            gate_icon(self.quality_gates.build_passed)
        ));
        md.push_str(&format!(
            "{} Coverage\n",
            gate_icon(self.quality_gates.coverage_met)
        ));

        // Notes
        if let Some(notes) = &self.notes {
            md.push_str("\n## Notes\n\n");
            md.push_str(notes);
        }

        md
    }
}

/// Parse the current orchestration state from a thread's message history.
/// Returns the state from the most recent message with a recognized prefix,
/// or `Started` if no state messages are found.
pub fn parse_thread_state(messages: &[Message]) -> OrchestrationState {
    // Iterate in reverse (most recent first)
    for msg in messages.iter().rev() {
        if let Some(state) = OrchestrationState::from_subject(&msg.subject) {
            return state;
        }
    }

    // Default to Started if no state found
    OrchestrationState::Started
}
