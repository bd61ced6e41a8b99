//! # rove-orchestrator
//!
//! The agent loop for Rove.
//!
//! This crate provides:
//! - [`AgentLoop`] - runs one task from request to [`TaskReport`]
//! - A pure state machine (`Enhancing -> Running -> Completed | Exhausted | IdleExit`)
//! - Per-task session state and the structured outcome returned to callers
//! - System prompt loading and request enhancement

mod agent_loop;
mod prompt;
mod session;
mod state_machine;

pub use agent_loop::{AgentLoop, LoopSettings};
pub use prompt::{build_enhancement_messages, load_system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use session::{TaskOutcome, TaskReport, TaskSession};
pub use state_machine::{transition, Action, Event, State};
