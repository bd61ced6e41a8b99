//! Pure state machine for the agent loop
//!
//! This module has NO I/O. The loop feeds it events and acts on the state
//! and actions it returns.
//!
//! - Pure function: transition(state, event) -> (state, actions)
//! - Invalid transitions go to Failed state (never panic)
//! - Turn numbers are 1-based

/// Task state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Rewriting the user's request before the first turn
    Enhancing,
    /// Working on turn `turn`
    Running { turn: usize },
    /// The model called `done`
    Completed { summary: String, turns: usize },
    /// The turn budget ran out
    Exhausted { turns: usize },
    /// The model answered without calling a tool
    IdleExit { reply: Option<String>, turns: usize },
    /// Unrecoverable error or invalid transition
    Failed { error: String },
}

impl State {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Enhancing | Self::Running { .. })
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The task text is settled
    Enhanced { max_turns: usize },
    /// The model called `done` during the current turn
    DoneCalled { summary: String },
    /// The model replied with no tool calls
    NoToolCalls { reply: Option<String> },
    /// The current turn's tool batch and follow-up are finished
    TurnFinished { max_turns: usize },
    /// Error occurred
    Error { message: String },
}

/// Side effects the loop should perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ask the model for turn `turn`
    RequestTurn { turn: usize },
    /// Log activity
    LogActivity { message: String },
}

/// Pure state transition function
///
/// Never panics; anything unexpected ends in [`State::Failed`].
pub fn transition(state: State, event: Event) -> (State, Vec<Action>) {
    match (state, event) {
        (State::Enhancing, Event::Enhanced { max_turns }) => {
            if max_turns == 0 {
                (
                    State::Exhausted { turns: 0 },
                    vec![Action::LogActivity {
                        message: "Turn budget is zero, nothing to do".to_string(),
                    }],
                )
            } else {
                (
                    State::Running { turn: 1 },
                    vec![Action::RequestTurn { turn: 1 }],
                )
            }
        }

        (State::Running { turn }, Event::DoneCalled { summary }) => {
            let actions = vec![Action::LogActivity {
                message: format!("Task completed on turn {}: {}", turn, summary),
            }];
            (
                State::Completed {
                    summary,
                    turns: turn,
                },
                actions,
            )
        }

        (State::Running { turn }, Event::NoToolCalls { reply }) => {
            let actions = vec![Action::LogActivity {
                message: format!("Model replied without tools on turn {}, stopping", turn),
            }];
            (State::IdleExit { reply, turns: turn }, actions)
        }

        (State::Running { turn }, Event::TurnFinished { max_turns }) => {
            if turn >= max_turns {
                (
                    State::Exhausted { turns: turn },
                    vec![Action::LogActivity {
                        message: format!("Turn budget of {} exhausted", max_turns),
                    }],
                )
            } else {
                (
                    State::Running { turn: turn + 1 },
                    vec![Action::RequestTurn { turn: turn + 1 }],
                )
            }
        }

        // Error events from any non-terminal state
        (State::Enhancing, Event::Error { message })
        | (State::Running { .. }, Event::Error { message }) => {
            let actions = vec![Action::LogActivity {
                message: format!("Error: {}", message),
            }];
            (State::Failed { error: message }, actions)
        }

        // Terminal states - no valid transitions
        (state, event) if state.is_terminal() => (
            State::Failed {
                error: format!(
                    "Invalid transition from terminal state {:?} on event: {:?}",
                    state, event
                ),
            },
            vec![],
        ),

        // All other invalid transitions
        (state, event) => (
            State::Failed {
                error: format!(
                    "Invalid state transition: {:?} cannot handle event {:?}",
                    state, event
                ),
            },
            vec![],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_full_flow() {
        // Enhancing -> Running(1)
        let (state, actions) = transition(State::Enhancing, Event::Enhanced { max_turns: 5 });
        assert_eq!(state, State::Running { turn: 1 });
        assert_eq!(actions, vec![Action::RequestTurn { turn: 1 }]);

        // Running(1) -> Running(2)
        let (state, actions) = transition(state, Event::TurnFinished { max_turns: 5 });
        assert_eq!(state, State::Running { turn: 2 });
        assert_eq!(actions, vec![Action::RequestTurn { turn: 2 }]);

        // Running(2) -> Completed
        let (state, actions) = transition(
            state,
            Event::DoneCalled {
                summary: "Read the file".to_string(),
            },
        );
        assert_eq!(
            state,
            State::Completed {
                summary: "Read the file".to_string(),
                turns: 2
            }
        );
        assert_eq!(actions.len(), 1);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_turn_budget_exhaustion() {
        let mut state = transition(State::Enhancing, Event::Enhanced { max_turns: 3 }).0;
        for _ in 0..3 {
            state = transition(state, Event::TurnFinished { max_turns: 3 }).0;
        }
        assert_eq!(state, State::Exhausted { turns: 3 });
    }

    #[test]
    fn test_zero_budget_exhausts_immediately() {
        let (state, actions) = transition(State::Enhancing, Event::Enhanced { max_turns: 0 });
        assert_eq!(state, State::Exhausted { turns: 0 });
        assert!(matches!(actions[0], Action::LogActivity { .. }));
    }

    #[test]
    fn test_idle_exit() {
        let (state, _) = transition(
            State::Running { turn: 4 },
            Event::NoToolCalls {
                reply: Some("Here is the answer".to_string()),
            },
        );
        assert_eq!(
            state,
            State::IdleExit {
                reply: Some("Here is the answer".to_string()),
                turns: 4
            }
        );
    }

    #[test]
    fn test_error_from_non_terminal_states() {
        let (state, _) = transition(
            State::Running { turn: 2 },
            Event::Error {
                message: "LLM unavailable".to_string(),
            },
        );
        assert_eq!(
            state,
            State::Failed {
                error: "LLM unavailable".to_string()
            }
        );

        let (state, _) = transition(
            State::Enhancing,
            Event::Error {
                message: "boom".to_string(),
            },
        );
        assert!(matches!(state, State::Failed { .. }));
    }

    #[test]
    fn test_invalid_transition_never_panics() {
        // A turn cannot finish before enhancement
        let (state, _) = transition(State::Enhancing, Event::TurnFinished { max_turns: 5 });
        assert!(matches!(state, State::Failed { .. }));

        // Enhancement cannot happen twice
        let (state, _) = transition(State::Running { turn: 1 }, Event::Enhanced { max_turns: 5 });
        assert!(matches!(state, State::Failed { .. }));
    }

    #[test]
    fn test_terminal_states_reject_all_events() {
        let completed = State::Completed {
            summary: "Done".to_string(),
            turns: 1,
        };
        let (state, actions) = transition(completed, Event::TurnFinished { max_turns: 5 });
        assert!(matches!(state, State::Failed { .. }));
        assert!(actions.is_empty());

        let (state, _) = transition(
            State::Exhausted { turns: 5 },
            Event::DoneCalled {
                summary: "late".to_string(),
            },
        );
        assert!(matches!(state, State::Failed { .. }));

        let (state, _) = transition(
            State::IdleExit {
                reply: None,
                turns: 1,
            },
            Event::NoToolCalls { reply: None },
        );
        assert!(matches!(state, State::Failed { .. }));
    }
}
