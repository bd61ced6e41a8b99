//! Tool declarations and dispatch

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rove_agent::{ChatModel, HttpFetcher};
use rove_core::{Backoff, Result, RoveConfig, ToolDeclaration};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::{ToolError, ToolResult};
use crate::{command, fs, image, web};

/// Every tool the model may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    WriteFile,
    RunCommand,
    AnalyzeImage,
    ImageSearchAnalysis,
    WebResearch,
    Done,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        Self::ReadFile,
        Self::WriteFile,
        Self::RunCommand,
        Self::AnalyzeImage,
        Self::ImageSearchAnalysis,
        Self::WebResearch,
        Self::Done,
    ];

    /// Name the model uses to call this tool
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::RunCommand => "run_command",
            Self::AnalyzeImage => "analyze_image",
            Self::ImageSearchAnalysis => "image_search_analysis",
            Self::WebResearch => "webresearch",
            Self::Done => "done",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn declaration(&self) -> ToolDeclaration {
        let (description, parameters) = match self {
            Self::ReadFile => (
                "Read the contents of a file. Relative paths are resolved against the repository root.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path of the file to read"}
                    },
                    "required": ["path"]
                }),
            ),
            Self::WriteFile => (
                "Create or overwrite a file with the given content. The parent directory must exist.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path of the file to write"},
                        "content": {"type": "string", "description": "Full content of the file"}
                    },
                    "required": ["path", "content"]
                }),
            ),
            Self::RunCommand => (
                "Run a shell command in the repository root and return its output.",
                json!({
                    "type": "object",
                    "properties": {
                        "command": {"type": "string", "description": "Shell command to execute"}
                    },
                    "required": ["command"]
                }),
            ),
            Self::AnalyzeImage => (
                "Analyze an image from a local path or an http(s) URL with a vision model.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Local file path or image URL"},
                        "prompt": {"type": "string", "description": "What to look for in the image"}
                    },
                    "required": ["path"]
                }),
            ),
            Self::ImageSearchAnalysis => (
                "Search the web for images matching a query, analyze up to three of them, and summarize the findings.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Image search query"},
                        "analysis_prompt": {"type": "string", "description": "What to look for in each image"}
                    },
                    "required": ["query"]
                }),
            ),
            Self::WebResearch => (
                "Search the web, read the top results, and return a synthesized summary with sources.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Search query"}
                    },
                    "required": ["query"]
                }),
            ),
            Self::Done => (
                "Signal that the task is complete. Call this once the request has been fully handled.",
                json!({
                    "type": "object",
                    "properties": {
                        "summary": {"type": "string", "description": "Summary of what was accomplished"}
                    },
                    "required": ["summary"]
                }),
            ),
        };

        ToolDeclaration {
            name: self.name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// A tool call with its arguments parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    RunCommand {
        command: String,
    },
    AnalyzeImage {
        path: String,
        prompt: Option<String>,
    },
    ImageSearchAnalysis {
        query: String,
        analysis_prompt: Option<String>,
    },
    WebResearch {
        query: String,
    },
    Done {
        summary: String,
    },
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct CommandArgs {
    command: String,
}

#[derive(Deserialize)]
struct AnalyzeImageArgs {
    path: String,
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Deserialize)]
struct ImageSearchArgs {
    query: String,
    #[serde(default)]
    analysis_prompt: Option<String>,
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Deserialize)]
struct DoneArgs {
    #[serde(default)]
    summary: String,
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, arguments: &str) -> std::result::Result<T, ToolError> {
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(arguments).map_err(|e| ToolError::invalid_arguments(kind.name(), e))
}

impl ToolInvocation {
    /// Parse the JSON argument string the model sent for `kind`
    pub fn parse(kind: ToolKind, arguments: &str) -> std::result::Result<Self, ToolError> {
        Ok(match kind {
            ToolKind::ReadFile => {
                let args: PathArgs = parse_args(kind, arguments)?;
                Self::ReadFile { path: args.path }
            }
            ToolKind::WriteFile => {
                let args: WriteArgs = parse_args(kind, arguments)?;
                Self::WriteFile {
                    path: args.path,
                    content: args.content,
                }
            }
            ToolKind::RunCommand => {
                let args: CommandArgs = parse_args(kind, arguments)?;
                Self::RunCommand {
                    command: args.command,
                }
            }
            ToolKind::AnalyzeImage => {
                let args: AnalyzeImageArgs = parse_args(kind, arguments)?;
                Self::AnalyzeImage {
                    path: args.path,
                    prompt: args.prompt.filter(|p| !p.trim().is_empty()),
                }
            }
            ToolKind::ImageSearchAnalysis => {
                let args: ImageSearchArgs = parse_args(kind, arguments)?;
                Self::ImageSearchAnalysis {
                    query: args.query,
                    analysis_prompt: args.analysis_prompt.filter(|p| !p.trim().is_empty()),
                }
            }
            ToolKind::WebResearch => {
                let args: QueryArgs = parse_args(kind, arguments)?;
                Self::WebResearch { query: args.query }
            }
            ToolKind::Done => {
                let args: DoneArgs = parse_args(kind, arguments)?;
                Self::Done {
                    summary: args.summary,
                }
            }
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ReadFile { .. } => ToolKind::ReadFile,
            Self::WriteFile { .. } => ToolKind::WriteFile,
            Self::RunCommand { .. } => ToolKind::RunCommand,
            Self::AnalyzeImage { .. } => ToolKind::AnalyzeImage,
            Self::ImageSearchAnalysis { .. } => ToolKind::ImageSearchAnalysis,
            Self::WebResearch { .. } => ToolKind::WebResearch,
            Self::Done { .. } => ToolKind::Done,
        }
    }
}

/// Acknowledgement returned by the done tool
pub fn acknowledge_done(summary: &str) -> String {
    format!("Task marked complete: {}", summary)
}

/// Search backends used by the web tools
#[derive(Debug, Clone)]
pub struct SearchEndpoints {
    /// HTML web search results page
    pub web_search: String,
    /// HTML image search results page
    pub image_search: String,
    /// Base URL of the JSON image search (token page plus `/i.js`)
    pub image_json: String,
}

impl Default for SearchEndpoints {
    fn default() -> Self {
        Self {
            web_search: "https://html.duckduckgo.com/html/".to_string(),
            image_search: "https://www.bing.com/images/search".to_string(),
            image_json: "https://duckduckgo.com".to_string(),
        }
    }
}

/// Everything the handlers need from the outside world
#[derive(Clone)]
pub struct ToolServices {
    pub model: Arc<dyn ChatModel>,
    /// Model for text synthesis
    pub text_model: String,
    /// Model for image analysis
    pub vision_model: String,
    pub backoff: Backoff,
    /// Fetcher configured with the web timeout
    pub http: HttpFetcher,
    pub image_timeout: Duration,
    pub command_timeout: Duration,
    pub search: SearchEndpoints,
}

impl ToolServices {
    pub fn from_config(config: &RoveConfig, model: Arc<dyn ChatModel>) -> Result<Self> {
        let backoff = config.retry.backoff();
        Ok(Self {
            model,
            text_model: config.llm.model.clone(),
            vision_model: config.llm.vision_model().to_string(),
            backoff,
            http: HttpFetcher::new(config.timeouts.web(), backoff)?,
            image_timeout: config.timeouts.image(),
            command_timeout: config.timeouts.command(),
            search: SearchEndpoints::default(),
        })
    }

    /// Fetcher configured with the image timeout and image retry schedule
    pub fn image_http(&self) -> HttpFetcher {
        self.http
            .with_timeout(self.image_timeout)
            .with_backoff(self.image_backoff())
    }

    /// Retry schedule for single-image analysis calls
    pub fn image_backoff(&self) -> Backoff {
        self.backoff
            .with_max_attempts(self.backoff.max_attempts.clamp(1, 2))
    }
}

/// Tool table offered to the model and the dispatcher behind it
pub struct ToolRegistry {
    services: ToolServices,
    declarations: Vec<ToolDeclaration>,
}

impl ToolRegistry {
    pub fn new(services: ToolServices) -> Self {
        Self {
            services,
            declarations: ToolKind::ALL.iter().map(ToolKind::declaration).collect(),
        }
    }

    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn services(&self) -> &ToolServices {
        &self.services
    }

    /// Parse and run one tool call against `working_dir`
    #[instrument(skip(self, working_dir, arguments))]
    pub async fn dispatch(&self, working_dir: &Path, name: &str, arguments: &str) -> ToolResult {
        let kind = ToolKind::from_name(name).ok_or_else(|| ToolError::unknown_tool(name))?;
        let invocation = ToolInvocation::parse(kind, arguments)?;
        self.execute(working_dir, invocation).await
    }

    pub async fn execute(&self, working_dir: &Path, invocation: ToolInvocation) -> ToolResult {
        let services = &self.services;
        match invocation {
            ToolInvocation::ReadFile { path } => fs::read_file(working_dir, &path).await,
            ToolInvocation::WriteFile { path, content } => {
                fs::write_file(working_dir, &path, &content).await
            }
            ToolInvocation::RunCommand { command } => {
                command::run_command(working_dir, &command, services.command_timeout).await
            }
            ToolInvocation::AnalyzeImage { path, prompt } => {
                image::analyze_image(services, working_dir, &path, prompt.as_deref()).await
            }
            ToolInvocation::ImageSearchAnalysis {
                query,
                analysis_prompt,
            } => image::image_search_analysis(services, &query, analysis_prompt.as_deref()).await,
            ToolInvocation::WebResearch { query } => web::web_research(services, &query).await,
            ToolInvocation::Done { summary } => Ok(acknowledge_done(&summary)),
        }
    }
}
