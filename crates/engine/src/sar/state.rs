use serde::{Deserialize, Serialize};

use screening_core::error::{Error, ErrorCode, Result};
use screening_core::types::InfoType;

/// Phases of the Search-Assess-Refine loop. The working phases cycle
/// `Search -> Assess -> Refine -> Search`; the terminal trio is absorbing —
/// once reached, no further transitions or iterations are possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SarPhase {
    Search,
    Assess,
    Refine,
    Complete,
    Capped,
    Diminished,
}

impl SarPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SarPhase::Complete | SarPhase::Capped | SarPhase::Diminished)
    }
}

impl std::fmt::Display for SarPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SarPhase::Search => "search",
            SarPhase::Assess => "assess",
            SarPhase::Refine => "refine",
            SarPhase::Complete => "complete",
            SarPhase::Capped => "capped",
            SarPhase::Diminished => "diminished",
        };
        write!(f, "{}", name)
    }
}

/// Why a SAR loop reached its terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    ConfidenceThresholdMet,
    MaxIterationsReached,
    DiminishingReturns,
    DeadlineExceeded,
    ProvidersExhausted,
    BlockedByCompliance,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompletionReason::ConfidenceThresholdMet => "confidence_threshold_met",
            CompletionReason::MaxIterationsReached => "max_iterations_reached",
            CompletionReason::DiminishingReturns => "diminishing_returns",
            CompletionReason::DeadlineExceeded => "deadline_exceeded",
            CompletionReason::ProvidersExhausted => "providers_exhausted",
            CompletionReason::BlockedByCompliance => "blocked_by_compliance",
        };
        write!(f, "{}", name)
    }
}

/// One completed iteration of the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub index: u32,
    pub queries_executed: usize,
    pub new_facts: usize,
    pub new_inconsistencies: usize,
    pub confidence: f64,
    pub info_gain_rate: f64,
}

/// SAR state for one info type within an investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarState {
    pub info_type: InfoType,
    pub phase: SarPhase,
    pub iterations: Vec<IterationRecord>,
    pub final_confidence: f64,
    pub completion_reason: Option<CompletionReason>,
}

impl SarState {
    pub fn new(info_type: InfoType) -> Self {
        Self {
            info_type,
            phase: SarPhase::Search,
            iterations: Vec::new(),
            final_confidence: 0.0,
            completion_reason: None,
        }
    }

    /// State for a type the compliance ruleset forbids: capped before any
    /// iteration runs.
    pub fn blocked_by_compliance(info_type: InfoType) -> Self {
        Self {
            info_type,
            phase: SarPhase::Capped,
            iterations: Vec::new(),
            final_confidence: 0.0,
            completion_reason: Some(CompletionReason::BlockedByCompliance),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn is_blocked_by_compliance(&self) -> bool {
        self.completion_reason == Some(CompletionReason::BlockedByCompliance)
    }

    pub fn iteration_count(&self) -> u32 {
        self.iterations.len() as u32
    }

    pub fn last_confidence(&self) -> f64 {
        self.iterations.last().map(|i| i.confidence).unwrap_or(0.0)
    }

    /// Move to a working phase. Terminal states are absorbing; an attempted
    /// transition out of one is a controller bug surfaced as an error.
    pub fn transition(&mut self, to: SarPhase) -> Result<SarPhase> {
        if self.phase.is_terminal() {
            return Err(Error::new(
                ErrorCode::InternalError,
                format!(
                    "SAR state for {} is terminal ({}); cannot transition to {}",
                    self.info_type, self.phase, to
                ),
            ));
        }
        let from = self.phase;
        self.phase = to;
        Ok(from)
    }

    /// Terminate the loop with the given phase and reason.
    pub fn terminate(&mut self, phase: SarPhase, reason: CompletionReason) -> Result<SarPhase> {
        debug_assert!(phase.is_terminal());
        let from = self.transition(phase)?;
        self.completion_reason = Some(reason);
        self.final_confidence = self.last_confidence();
        Ok(from)
    }

    pub fn record_iteration(&mut self, record: IterationRecord) {
        self.iterations.push(record);
    }
}
