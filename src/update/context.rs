use std::collections::VecDeque;

/// Continuation state a provider carries between chained update rounds.
///
/// The orchestrator never looks inside; it only asks whether another round is
/// needed and what to report if the chain stops early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequentialContext {
    pending: VecDeque<String>,
    interrupted_message: String,
}

impl SequentialContext {
    /// Context with `pending` steps still to run, in order.
    pub fn new(pending: impl IntoIterator<Item = String>, interrupted_message: impl Into<String>) -> Self {
        Self {
            pending: pending.into_iter().collect(),
            interrupted_message: interrupted_message.into(),
        }
    }

    /// True while steps remain, meaning the orchestrator must run another round.
    pub fn should_fail(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take the next pending step.
    pub fn next_step(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Error text used when the chain stops early; names the steps not run.
    pub fn message_when_interrupted_before_start(&self) -> String {
        if self.pending.is_empty() {
            return self.interrupted_message.clone();
        }
        let rest: Vec<&str> = self.pending().collect();
        format!("{}: {}", self.interrupted_message, rest.join(", "))
    }
}
