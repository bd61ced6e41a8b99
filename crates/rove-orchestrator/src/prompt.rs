//! Prompt builder for the agent loop
//!
//! Provides:
//! - The built-in system prompt (overridable by a text file)
//! - The enhancement request sent before the first turn

use std::path::Path;

use rove_core::Message;

/// System prompt used when no override file is present
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an autonomous software engineering agent working inside a repository.

You can read and write files, run shell commands, research topics on the web, \
and analyze images. Relative paths are resolved against the repository root, \
and shell commands run there.

Work step by step:
- Inspect before you change anything.
- Prefer small, verifiable edits and check your work by running commands.
- If a tool returns an error, read it carefully and adjust your approach.

When the task is fully complete, call the `done` tool with a short summary of \
what you accomplished. Do not call `done` until the work is actually finished.";

const ENHANCEMENT_INSTRUCTIONS: &str = "\
Rewrite the following request so an autonomous coding agent can act on it. \
Make the goal explicit, list the concrete steps or checks that would confirm \
success, and keep every constraint the user gave. Do not invent requirements. \
Reply with the rewritten request only.";

/// Load the system prompt from `path`, falling back to the built-in prompt
///
/// A missing or empty file is not an error.
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            tracing::info!("Using system prompt from {}", path.display());
            content
        }
        Ok(_) => {
            tracing::debug!("{} is empty, using built-in system prompt", path.display());
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No system prompt file at {}", path.display());
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
        Err(e) => {
            tracing::warn!(
                "Failed to read system prompt {}: {}, using built-in prompt",
                path.display(),
                e
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

/// Messages for the one-shot request enhancement call
pub fn build_enhancement_messages(system_prompt: &str, request: &str) -> Vec<Message> {
    vec![
        Message::system(system_prompt),
        Message::user(format!(
            "{}\n\n## REQUEST\n\n{}",
            ENHANCEMENT_INSTRUCTIONS, request
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_core::MessageContent;

    #[test]
    fn test_missing_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = load_system_prompt(&dir.path().join("system_prompt.txt"));
        assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.txt");
        std::fs::write(&path, "You are terse.").unwrap();
        assert_eq!(load_system_prompt(&path), "You are terse.");
    }

    #[test]
    fn test_blank_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.txt");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(load_system_prompt(&path), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_enhancement_messages() {
        let messages = build_enhancement_messages("sys", "fix the build");
        assert_eq!(messages[0], Message::system("sys"));
        match &messages[1] {
            Message::User {
                content: MessageContent::Text(text),
            } => {
                assert!(text.starts_with("Rewrite the following request"));
                assert!(text.ends_with("## REQUEST\n\nfix the build"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
