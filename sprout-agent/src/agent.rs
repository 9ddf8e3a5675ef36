//! Agent implementation - orchestrates the LLM <-> plant tool loop

use crate::provider::{
    ChatMessage, CompletionRequest, LlmProvider, ToolCall, ToolDefinition, UsageTracker,
};
use crate::transcript::Transcript;
use chrono::Local;
use serde::Serialize;
use sprout_engine::ToolTable;
use sprout_error::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Marker the model appends to its final reply
pub const TERMINATE: &str = "TERMINATE";

pub const DEFAULT_PROMPT: &str = "Does my plant need water?";

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum model turns per session
    pub max_turns: usize,
    /// Where session transcripts are written; `None` disables them
    pub transcript_dir: Option<PathBuf>,
    /// Sampling temperature passed to the model, if any
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            transcript_dir: None,
            temperature: None,
        }
    }
}

/// One tool the model asked for, and what came back
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    pub ok: bool,
    pub output: String,
}

/// Result from one agent session
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Last assistant reply, without the TERMINATE marker
    pub summary: String,
    pub chat_history: Vec<ChatMessage>,
    pub invocations: Vec<ToolInvocation>,
    pub usage: UsageTracker,
    /// Whether the model ended the session itself
    pub terminated: bool,
    pub transcript_path: Option<PathBuf>,
}

impl AgentResult {
    /// How many times the model invoked `name`
    pub fn invocation_count(&self, name: &str) -> usize {
        self.invocations.iter().filter(|i| i.name == name).count()
    }
}

/// The agent orchestrator - manages the LLM <-> tool loop
pub struct Agent<P: LlmProvider> {
    provider: P,
    tools: Arc<ToolTable>,
    config: AgentConfig,
}

impl<P: LlmProvider> Agent<P> {
    pub fn new(provider: P, tools: ToolTable) -> Self {
        Self::with_config(provider, tools, AgentConfig::default())
    }

    pub fn with_config(provider: P, tools: ToolTable, config: AgentConfig) -> Self {
        Self {
            provider,
            tools: Arc::new(tools),
            config,
        }
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    fn system_message(&self) -> String {
        format!(
            "Use only the functions provided to keep the plant alive and in good health. \
             Today's date is {} Reply {} when the task is done.",
            Local::now().naive_local(),
            TERMINATE
        )
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition::new(t.name(), t.description()))
            .collect()
    }

    /// Run one session for `prompt` to completion.
    ///
    /// If the provider fails partway, the transcript is still written with
    /// every tool that already ran, then the provider error is returned.
    pub async fn run(&self, prompt: &str) -> Result<AgentResult> {
        let started_at = Local::now().naive_local();
        info!(prompt = %prompt, provider = self.provider.name(), "starting agent session");

        let mut messages = vec![
            ChatMessage::system(self.system_message()),
            ChatMessage::user(prompt),
        ];
        let definitions = self.tool_definitions();
        let mut invocations = Vec::new();
        let mut usage = UsageTracker::new();
        let mut terminated = false;
        let mut failure = None;

        for turn in 0..self.config.max_turns {
            let mut request = CompletionRequest::new(messages.clone())
                .with_model(self.provider.default_model())
                .with_tools(definitions.clone());
            if let Some(temp) = self.config.temperature {
                request = request.with_temperature(temp);
            }

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    let e = Error::from(e).with_context("turn", turn.to_string());
                    error!(turn, error = %e, tools_run = invocations.len(), "model request failed");
                    failure = Some(e);
                    break;
                }
            };
            usage.track(&response.model, &response.usage);

            if response.tool_calls.is_empty() {
                let content = response.content.unwrap_or_default();
                terminated = is_termination(&content);
                debug!(turn, terminated, "assistant replied");
                messages.push(ChatMessage::assistant(content));
                break;
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.content,
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let invocation = self.dispatch(call).await;
                messages.push(ChatMessage::tool_result(&call.id, &invocation.output));
                invocations.push(invocation);
            }
        }

        if !terminated && failure.is_none() {
            warn!(max_turns = self.config.max_turns, "session ended without TERMINATE");
        }

        let summary = last_assistant_text(&messages);
        let mut result = AgentResult {
            summary,
            chat_history: messages,
            invocations,
            usage,
            terminated,
            transcript_path: None,
        };

        if let Some(dir) = &self.config.transcript_dir {
            let transcript = Transcript::new(prompt, started_at, &result);
            match (transcript.save(dir), failure) {
                (Ok(path), failure) => {
                    info!(path = %path.display(), "saved chat transcript");
                    if let Some(e) = failure {
                        return Err(e.with_context("transcript", path.display().to_string()));
                    }
                    result.transcript_path = Some(path);
                }
                (Err(save_err), Some(e)) => {
                    warn!(error = %save_err, "failed to save transcript of failed session");
                    return Err(e);
                }
                (Err(save_err), None) => return Err(save_err),
            }
        } else if let Some(e) = failure {
            return Err(e);
        }

        Ok(result)
    }

    /// Run one requested tool on a blocking worker.
    ///
    /// Tool failures are reported back to the model as text rather than
    /// ending the session; the model decides what to do about them.
    async fn dispatch(&self, call: &ToolCall) -> ToolInvocation {
        info!(tool = %call.name, call_id = %call.id, "executing tool");

        let tools = Arc::clone(&self.tools);
        let name = call.name.clone();
        let outcome = tokio::task::spawn_blocking(move || tools.invoke(&name))
            .await
            .unwrap_or_else(|e| Err(Error::unexpected(format!("tool worker failed: {}", e))));

        match outcome {
            Ok(value) => ToolInvocation {
                call_id: call.id.clone(),
                name: call.name.clone(),
                ok: true,
                output: value_text(&value),
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                ToolInvocation {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    ok: false,
                    output: format!("Error: {}", e),
                }
            }
        }
    }
}

fn is_termination(content: &str) -> bool {
    content.trim_end().ends_with(TERMINATE)
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn last_assistant_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == crate::provider::Role::Assistant)
        .find_map(|m| m.content.as_deref())
        .map(|text| {
            let text = text.trim_end();
            text.strip_suffix(TERMINATE).unwrap_or(text).trim().to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompletionResponse, FinishReason, ProviderError, Role, Usage};
    use chrono::NaiveDate;
    use serde_json::json;
    use sprout_engine::hardware::{ConstantVoltage, RecordingMotor};
    use sprout_engine::tools::{DAYS_SINCE_LAST_WATERED, GET_SOIL_MOISTURE, WATER_PLANT};
    use sprout_engine::{ManualClock, MemoryStore, MoistureLevel, Plant, PlantConfig, Tool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Stand-in for the model: checks moisture, waters only when it is DRY,
    /// then ends the session.
    struct GardenerModel {
        requests: AtomicUsize,
    }

    impl GardenerModel {
        fn new() -> Self {
            Self {
                requests: AtomicUsize::new(0),
            }
        }

        fn tool_result(messages: &[ChatMessage], tool: &str) -> Option<String> {
            let call_id = messages
                .iter()
                .filter_map(|m| m.tool_calls.as_ref())
                .flatten()
                .find(|c| c.name == tool)
                .map(|c| c.id.clone())?;
            messages
                .iter()
                .find(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(&call_id))
                .and_then(|m| m.content.clone())
        }

        fn call(&self, id: usize, name: &str) -> CompletionResponse {
            reply(None, vec![ToolCall {
                id: format!("call_{}", id),
                name: name.to_string(),
                arguments: "{}".into(),
            }])
        }
    }

    fn reply(content: Option<&str>, tool_calls: Vec<ToolCall>) -> CompletionResponse {
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };
        CompletionResponse {
            id: "test".into(),
            model: "gardener".into(),
            content: content.map(str::to_string),
            tool_calls,
            finish_reason,
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 2,
                total_tokens: 12,
            },
        }
    }

    impl LlmProvider for GardenerModel {
        fn name(&self) -> &str {
            "gardener"
        }

        fn default_model(&self) -> &str {
            "gardener"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            let n = self.requests.fetch_add(1, Ordering::SeqCst);
            let messages = &request.messages;

            let moisture = match Self::tool_result(messages, GET_SOIL_MOISTURE) {
                None => return Ok(self.call(n, GET_SOIL_MOISTURE)),
                Some(m) => m,
            };
            let dry = matches!(moisture.parse::<MoistureLevel>(), Ok(MoistureLevel::Dry));
            let watered = Self::tool_result(messages, WATER_PLANT).is_some();

            if dry && !watered {
                return Ok(self.call(n, WATER_PLANT));
            }
            let text = if watered {
                "The soil was dry, so I watered the plant. TERMINATE"
            } else {
                "The soil has enough water; no watering needed. TERMINATE"
            };
            Ok(reply(Some(text), Vec::new()))
        }
    }

    /// Table with a mocked moisture reading and a counted watering action.
    fn mocked_tools(moisture: &'static str, waterings: Arc<AtomicUsize>) -> ToolTable {
        ToolTable::new()
            .register(Tool::new(GET_SOIL_MOISTURE, "moisture", move || Ok(json!(moisture))))
            .register(Tool::new(WATER_PLANT, "water", move || {
                waterings.fetch_add(1, Ordering::SeqCst);
                Ok(json!("Watering Complete"))
            }))
    }

    #[test]
    fn test_waters_only_when_dry() {
        for (moisture, should_water) in [("dry", true), ("moist", false), ("wet", false)] {
            let waterings = Arc::new(AtomicUsize::new(0));
            let agent = Agent::new(GardenerModel::new(), mocked_tools(moisture, waterings.clone()));

            let result = tokio_test::block_on(agent.run(DEFAULT_PROMPT)).unwrap();

            assert!(result.invocation_count(GET_SOIL_MOISTURE) >= 1);
            if should_water {
                assert!(waterings.load(Ordering::SeqCst) >= 1, "soil '{}' needs water", moisture);
            } else {
                assert_eq!(waterings.load(Ordering::SeqCst), 0, "soil '{}' is fine", moisture);
            }
            assert!(result.terminated);
            assert!(!result.summary.contains(TERMINATE));
        }
    }

    #[test]
    fn test_session_against_real_plant() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let motor = RecordingMotor::new();
        let motor_log = motor.log();
        let plant = Plant::new(
            &PlantConfig::default(),
            ConstantVoltage(3.0),
            motor,
            MemoryStore::new(),
            Arc::new(ManualClock::new(now)),
        )
        .unwrap();
        let plant = Arc::new(Mutex::new(plant));

        let agent = Agent::new(GardenerModel::new(), ToolTable::for_plant(plant.clone()));
        let result = tokio_test::block_on(agent.run(DEFAULT_PROMPT)).unwrap();

        assert_eq!(result.invocation_count(WATER_PLANT), 1);
        assert_eq!(motor_log.calls(), vec![true, false]);
        assert_eq!(plant.lock().unwrap().days_since_last_watered(), 0);
        assert_eq!(result.usage.total_calls, 3);
    }

    /// Model that keeps asking for tools forever.
    struct RestlessModel;

    impl LlmProvider for RestlessModel {
        fn name(&self) -> &str {
            "restless"
        }

        fn default_model(&self) -> &str {
            "restless"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            Ok(reply(None, vec![ToolCall {
                id: format!("call_{}", request.messages.len()),
                name: DAYS_SINCE_LAST_WATERED.into(),
                arguments: "{}".into(),
            }]))
        }
    }

    #[test]
    fn test_turn_budget_ends_session() {
        let tools = ToolTable::new().register(Tool::new(DAYS_SINCE_LAST_WATERED, "days", || {
            Ok(json!(-1))
        }));
        let config = AgentConfig {
            max_turns: 3,
            ..AgentConfig::default()
        };
        let agent = Agent::with_config(RestlessModel, tools, config);

        let result = tokio_test::block_on(agent.run(DEFAULT_PROMPT)).unwrap();
        assert!(!result.terminated);
        assert_eq!(result.invocation_count(DAYS_SINCE_LAST_WATERED), 3);
        assert!(result.invocations.iter().all(|i| i.ok && i.output == "-1"));
    }

    #[test]
    fn test_tool_errors_go_back_to_model() {
        let agent = Agent::new(GardenerModel::new(), ToolTable::new());
        let result = tokio_test::block_on(agent.run(DEFAULT_PROMPT)).unwrap();

        let first = &result.invocations[0];
        assert!(!first.ok);
        assert!(first.output.contains("ToolUnknown"));
        // The failed call's text is the moisture reading, which is not DRY.
        assert_eq!(result.invocation_count(WATER_PLANT), 0);
        assert!(result.terminated);
    }

    /// Model whose server is down.
    struct OfflineModel;

    impl LlmProvider for OfflineModel {
        fn name(&self) -> &str {
            "offline"
        }

        fn default_model(&self) -> &str {
            "offline"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    #[test]
    fn test_provider_failure_is_an_error() {
        let agent = Agent::new(OfflineModel, ToolTable::new());
        let err = tokio_test::block_on(agent.run(DEFAULT_PROMPT)).unwrap_err();
        assert_eq!(err.kind(), sprout_error::ErrorKind::NetworkFailed);
        assert!(err.is_retryable());
    }

    /// Model that asks for water once, then loses its server.
    struct FlakyModel {
        requests: AtomicUsize,
    }

    impl LlmProvider for FlakyModel {
        fn name(&self) -> &str {
            "flaky"
        }

        fn default_model(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            match self.requests.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(reply(None, vec![ToolCall {
                    id: "call_0".into(),
                    name: WATER_PLANT.into(),
                    arguments: "{}".into(),
                }])),
                _ => Err(ProviderError::Network("connection reset".into())),
            }
        }
    }

    #[test]
    fn test_failed_session_still_records_watering() {
        let temp_dir = TempDir::new().unwrap();
        let waterings = Arc::new(AtomicUsize::new(0));
        let config = AgentConfig {
            transcript_dir: Some(temp_dir.path().to_path_buf()),
            ..AgentConfig::default()
        };
        let model = FlakyModel {
            requests: AtomicUsize::new(0),
        };
        let agent = Agent::with_config(model, mocked_tools("DRY", waterings.clone()), config);

        let err = tokio_test::block_on(agent.run(DEFAULT_PROMPT)).unwrap_err();
        assert_eq!(err.kind(), sprout_error::ErrorKind::NetworkFailed);
        assert_eq!(waterings.load(Ordering::SeqCst), 1);

        let files: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let path = files[0].display().to_string();
        assert!(err.context().iter().any(|(k, v)| *k == "transcript" && *v == path));

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(saved["terminated"], false);
        assert_eq!(saved["invocations"][0]["name"], WATER_PLANT);
        assert_eq!(saved["invocations"][0]["output"], "Watering Complete");
    }

    #[test]
    fn test_transcript_is_written() {
        let temp_dir = TempDir::new().unwrap();
        let waterings = Arc::new(AtomicUsize::new(0));
        let config = AgentConfig {
            transcript_dir: Some(temp_dir.path().to_path_buf()),
            ..AgentConfig::default()
        };
        let agent = Agent::with_config(
            GardenerModel::new(),
            mocked_tools("DRY", waterings),
            config,
        );

        let result = tokio_test::block_on(agent.run(DEFAULT_PROMPT)).unwrap();
        let path = result.transcript_path.unwrap();
        assert!(path.starts_with(temp_dir.path()));

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["prompt"], DEFAULT_PROMPT);
        assert_eq!(saved["invocations"][1]["name"], WATER_PLANT);
        assert_eq!(saved["invocations"][1]["output"], "Watering Complete");
    }

    #[test]
    fn test_summary_strips_marker() {
        let messages = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("All good.  TERMINATE \n"),
        ];
        assert_eq!(last_assistant_text(&messages), "All good.");
        assert!(is_termination("done TERMINATE\n"));
        assert!(!is_termination("TERMINATE? not yet"));
    }
}
