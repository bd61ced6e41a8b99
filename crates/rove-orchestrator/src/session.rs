//! Per-task state and the report handed back to the caller

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rove_core::Message;
use serde::Serialize;
use uuid::Uuid;

use crate::state_machine::{transition, Action, Event, State};

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The model called `done`
    Completed { summary: String },
    /// The turn budget ran out first
    Exhausted,
    /// The model stopped calling tools
    IdleExit { reply: Option<String> },
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed { .. } => write!(f, "completed"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::IdleExit { .. } => write!(f, "idle_exit"),
        }
    }
}

/// Result of one task run
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub run_id: Uuid,
    pub outcome: TaskOutcome,
    /// Model-call turns performed
    pub turns: usize,
    pub transcript: Vec<Message>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Completed { .. })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Mutable state for one task invocation
#[derive(Debug)]
pub struct TaskSession {
    pub run_id: Uuid,
    pub working_dir: PathBuf,
    pub transcript: Vec<Message>,
    pub max_turns: usize,
    pub started_at: DateTime<Utc>,
    state: State,
}

impl TaskSession {
    pub fn new(working_dir: &Path, max_turns: usize, system_prompt: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            working_dir: working_dir.to_path_buf(),
            transcript: vec![Message::system(system_prompt)],
            max_turns,
            started_at: Utc::now(),
            state: State::Enhancing,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Turns started so far
    pub fn turn_count(&self) -> usize {
        match &self.state {
            State::Enhancing | State::Failed { .. } => 0,
            State::Running { turn } => *turn,
            State::Completed { turns, .. }
            | State::Exhausted { turns }
            | State::IdleExit { turns, .. } => *turns,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, State::Completed { .. })
    }

    /// Append to the transcript
    pub fn push(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Feed `event` to the state machine and log the resulting actions
    pub fn apply(&mut self, event: Event) -> &State {
        let state = std::mem::replace(&mut self.state, State::Enhancing);
        let (next, actions) = transition(state, event);
        for action in actions {
            match action {
                Action::RequestTurn { turn } => {
                    tracing::info!("=== Turn {} of {} ===", turn, self.max_turns)
                }
                Action::LogActivity { message } => tracing::info!("{}", message),
            }
        }
        if let State::Failed { error } = &next {
            tracing::error!("Task entered failed state: {}", error);
        }
        self.state = next;
        &self.state
    }

    /// Consume a finished session into its report
    ///
    /// Returns `None` while the session is still running or has failed.
    pub fn into_report(self) -> Option<TaskReport> {
        let turns = self.turn_count();
        let outcome = match self.state {
            State::Completed { summary, .. } => TaskOutcome::Completed { summary },
            State::Exhausted { .. } => TaskOutcome::Exhausted,
            State::IdleExit { reply, .. } => TaskOutcome::IdleExit { reply },
            State::Enhancing | State::Running { .. } | State::Failed { .. } => return None,
        };

        Some(TaskReport {
            run_id: self.run_id,
            outcome,
            turns,
            transcript: self.transcript,
            started_at: self.started_at,
            finished_at: Utc::now(),
        })
    }
}
