//! Agent loop - drives one task from request to outcome
//!
//! Each turn:
//! 1. Sends the transcript plus every tool declaration to the model
//! 2. Stops if the reply has no tool calls
//! 3. Runs the requested tools in order, one tool message per call
//! 4. Stops if `done` was called (later calls in the batch are skipped)
//! 5. Otherwise asks for a follow-up reply with no tools offered
//!
//! The working directory is passed to every tool explicitly; the process
//! directory is never changed.

use std::path::Path;
use std::sync::Arc;

use rove_agent::{complete_with_retry, ChatModel, OpenAiClient};
use rove_core::fail_open::fail_open;
use rove_core::{Backoff, ChatRequest, Message, Result, RoveConfig, RoveError, ToolCall};
use rove_tools::{ToolInvocation, ToolKind, ToolRegistry, ToolServices};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::prompt::{build_enhancement_messages, load_system_prompt};
use crate::session::{TaskReport, TaskSession};
use crate::state_machine::{Event, State};

/// Agent loop settings
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Model used for every loop call
    pub model: String,
    pub backoff: Backoff,
    pub system_prompt: String,
    pub max_turns: usize,
}

impl LoopSettings {
    pub fn from_config(config: &RoveConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            backoff: config.retry.backoff(),
            system_prompt: load_system_prompt(&config.agent.system_prompt_path),
            max_turns: config.agent.max_turns,
        }
    }
}

/// Drives tasks against one model and one tool registry
pub struct AgentLoop {
    model: Arc<dyn ChatModel>,
    registry: ToolRegistry,
    settings: LoopSettings,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ChatModel>, registry: ToolRegistry, settings: LoopSettings) -> Self {
        Self {
            model,
            registry,
            settings,
        }
    }

    /// Wire up the OpenAI-compatible client and the full tool set from config
    pub fn from_config(config: &RoveConfig) -> Result<Self> {
        let model: Arc<dyn ChatModel> =
            Arc::new(OpenAiClient::new(&config.llm, config.timeouts.api())?);
        let services = ToolServices::from_config(config, model.clone())?;
        Ok(Self::new(
            model,
            ToolRegistry::new(services),
            LoopSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run one task in `working_dir`
    ///
    /// Fails only when a main turn request cannot be completed after retries.
    pub async fn run(&self, working_dir: &Path, request: &str) -> Result<TaskReport> {
        let session = TaskSession::new(
            working_dir,
            self.settings.max_turns,
            &self.settings.system_prompt,
        );
        let span = info_span!("task", run_id = %session.run_id);
        self.drive(session, request).instrument(span).await
    }

    async fn drive(&self, mut session: TaskSession, request: &str) -> Result<TaskReport> {
        info!(
            "Starting task in {} (max {} turns)",
            session.working_dir.display(),
            session.max_turns
        );

        let task = self.enhance(request).await;
        session.push(Message::user(task));
        session.apply(Event::Enhanced {
            max_turns: session.max_turns,
        });

        loop {
            let turn = match session.state() {
                State::Running { turn } => *turn,
                _ => break,
            };
            let turn_request = ChatRequest::new(self.settings.model.clone(), session.transcript.clone())
                .with_tools(self.registry.declarations());

            let reply = match complete_with_retry(self.model.as_ref(), &turn_request, self.settings.backoff).await {
                Ok(reply) => reply,
                Err(e) => {
                    session.apply(Event::Error {
                        message: format!("Model call failed on turn {}: {}", turn, e),
                    });
                    return Err(e);
                }
            };

            if !reply.has_tool_calls() {
                let text = reply.text_content().map(str::to_string);
                session.push(reply.into_message());
                session.apply(Event::NoToolCalls { reply: text });
                break;
            }

            let calls = reply.tool_calls.clone();
            session.push(reply.into_message());

            if let Some(summary) = self.run_batch(&mut session, &calls).await {
                session.apply(Event::DoneCalled { summary });
                break;
            }

            self.follow_up(&mut session).await;
            session.apply(Event::TurnFinished {
                max_turns: session.max_turns,
            });
        }

        let state = format!("{:?}", session.state());
        session
            .into_report()
            .inspect(|report| {
                info!(
                    "Task finished: {} after {} turn(s)",
                    report.outcome, report.turns
                )
            })
            .ok_or_else(|| RoveError::Other(format!("Task ended in unexpected state {}", state)))
    }

    /// Rewrite the request before the first turn; the raw request on failure
    async fn enhance(&self, request: &str) -> String {
        let enhancement = ChatRequest::new(
            self.settings.model.clone(),
            build_enhancement_messages(&self.settings.system_prompt, request),
        );

        let reply = fail_open(
            "prompt_enhancement",
            complete_with_retry(self.model.as_ref(), &enhancement, self.settings.backoff),
        )
        .await;

        match reply.as_ref().and_then(|r| r.text_content()) {
            Some(text) => {
                debug!("Enhanced request: {}", text);
                text.to_string()
            }
            None => request.to_string(),
        }
    }

    /// Run tool calls in order; returns the summary if `done` was called
    async fn run_batch(&self, session: &mut TaskSession, calls: &[ToolCall]) -> Option<String> {
        for (index, call) in calls.iter().enumerate() {
            let name = call.name();
            let arguments = &call.function.arguments;

            if ToolKind::from_name(name) == Some(ToolKind::Done) {
                let summary = match ToolInvocation::parse(ToolKind::Done, arguments) {
                    Ok(ToolInvocation::Done { summary }) => summary,
                    _ => String::new(),
                };
                let ack = self
                    .registry
                    .dispatch(&session.working_dir, name, arguments)
                    .await
                    .unwrap_or_else(|e| e.message);
                session.push(Message::tool(&call.id, ack));

                let skipped = calls.len() - index - 1;
                if skipped > 0 {
                    info!("done called, skipping {} remaining tool call(s)", skipped);
                }
                return Some(summary);
            }

            info!("Tool call {}: {}", call.id, name);
            let content = match self
                .registry
                .dispatch(&session.working_dir, name, arguments)
                .await
            {
                Ok(output) => {
                    debug!("{} returned {} bytes", name, output.len());
                    output
                }
                Err(e) => {
                    warn!("{} failed ({:?}): {}", name, e.kind, first_line(&e.message));
                    e.message
                }
            };
            session.push(Message::tool(&call.id, content));
        }
        None
    }

    /// Let the model react to tool results; failures are ignored
    async fn follow_up(&self, session: &mut TaskSession) {
        let request = ChatRequest::new(self.settings.model.clone(), session.transcript.clone());
        let reply = fail_open(
            "follow_up",
            complete_with_retry(self.model.as_ref(), &request, self.settings.backoff),
        )
        .await;

        if let Some(text) = reply.as_ref().and_then(|r| r.text_content()) {
            debug!("Follow-up: {}", first_line(text));
            session.push(Message::assistant(text));
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
