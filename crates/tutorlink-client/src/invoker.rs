//! Typed facade over the capability server's tools.
//!
//! Every method here absorbs failures: a call that cannot be completed is
//! logged and answered with a safe default, so callers never have to handle
//! "the tool server is down".

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};
use tutorlink_protocol::{Result, ToolCallResult};
use tutorlink_records::{
    MaterialAccess, MaterialContent, SearchCategory, SearchEnvelope, SpecificQuestion,
};

use crate::config::ClientConfig;
use crate::dispatcher::{Idempotency, RequestDispatcher};
use crate::supervisor::{ConnectionState, ConnectionSupervisor};
use crate::tools::{self, RESPONSE_FORMAT, ToolDescriptor, parse_tool_list};

/// What a search (or the learning context) produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    /// The server answered in JSON; passed through untouched
    Json(Value),
    /// The server answered in text, parsed into records
    Parsed(SearchEnvelope),
}

impl SearchOutcome {
    /// Safe default for a failed search (`summary = "failed"`)
    pub fn failed() -> Self {
        Self::Parsed(SearchEnvelope::failed())
    }

    /// Whether this is the failed default
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Parsed(envelope) if envelope.is_failed())
    }

    /// The parsed envelope, for text replies
    pub fn envelope(&self) -> Option<&SearchEnvelope> {
        match self {
            Self::Parsed(envelope) => Some(envelope),
            Self::Json(_) => None,
        }
    }
}

/// A learner's dashboard, parsed across every category.
///
/// Empty (not failed) when the server cannot be reached.
pub type LearningContext = SearchOutcome;

/// Client for one capability server.
#[derive(Debug)]
pub struct ToolClient {
    dispatcher: RequestDispatcher,
    prefer_structured: bool,
    tools: RwLock<Option<Arc<Vec<ToolDescriptor>>>>,
}

impl ToolClient {
    /// Client for the server described by `config`. Nothing is sent until
    /// the first call.
    ///
    /// # Errors
    ///
    /// Returns [`tutorlink_protocol::Error::Configuration`] if the config is
    /// unusable.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let supervisor = ConnectionSupervisor::from_config(config)?;
        let dispatcher = RequestDispatcher::new(supervisor, config.session_retry_delay());
        Ok(Self::from_dispatcher(dispatcher, config.prefer_structured))
    }

    /// Client over an existing dispatcher
    pub fn from_dispatcher(dispatcher: RequestDispatcher, prefer_structured: bool) -> Self {
        Self {
            dispatcher,
            prefer_structured,
            tools: RwLock::new(None),
        }
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Connection state of the underlying supervisor
    pub fn state(&self) -> ConnectionState {
        self.dispatcher.supervisor().state()
    }

    /// Call any tool as a write; never retried automatically.
    ///
    /// Failures come back as [`ToolCallResult::Error`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        self.invoke(name, arguments, Idempotency::Write).await
    }

    /// Call a tool known to be side-effect free; retried once on a fresh
    /// session if the server dropped the old one.
    pub async fn call_tool_read(&self, name: &str, arguments: Value) -> ToolCallResult {
        self.invoke(name, arguments, Idempotency::Read).await
    }

    /// Tools the server advertises. Cached after the first successful
    /// listing; empty on failure.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tool_catalog()
            .await
            .map(|tools| tools.as_ref().clone())
            .unwrap_or_default()
    }

    /// Search a learner's records.
    ///
    /// Text replies are parsed with `category` as the grammar hint. Returns
    /// [`SearchOutcome::failed`] on any failure.
    ///
    /// ```rust,no_run
    /// # use tutorlink_client::{ClientConfig, SearchCategory, SearchOutcome, ToolClient};
    /// # tokio_test::block_on(async {
    /// let client = ToolClient::new(&ClientConfig::default()).unwrap();
    /// match client.search("learner-42", "rounding", SearchCategory::Worksheets).await {
    ///     SearchOutcome::Json(value) => println!("{value}"),
    ///     SearchOutcome::Parsed(envelope) => {
    ///         for worksheet in &envelope.results.worksheets {
    ///             println!("{} due {:?}", worksheet.title, worksheet.due_date);
    ///         }
    ///     }
    /// }
    /// # });
    /// ```
    pub async fn search(
        &self,
        child_id: &str,
        query: &str,
        category: SearchCategory,
    ) -> SearchOutcome {
        let arguments = json!({
            "child_id": child_id,
            "query": query,
            "category": category.as_str(),
        });

        match self.call_read_tool(tools::SEARCH, arguments).await {
            ToolCallResult::Json(value) => SearchOutcome::Json(value),
            ToolCallResult::Text(text) => {
                SearchOutcome::Parsed(SearchEnvelope::from_text(&text, category))
            }
            ToolCallResult::Error(message) => {
                warn!(child_id, category = %category, error = %message, "Search failed");
                SearchOutcome::failed()
            }
        }
    }

    /// A material's content and question list, or `None`.
    pub async fn get_material_content(
        &self,
        child_id: &str,
        identifier: &str,
    ) -> Option<MaterialContent> {
        let arguments = json!({"child_id": child_id, "identifier": identifier});

        let material = match self.call_read_tool(tools::GET_MATERIAL_CONTENT, arguments).await {
            ToolCallResult::Json(value) => MaterialContent::from_json(identifier, &value),
            ToolCallResult::Text(text) => MaterialContent::from_text(identifier, &text),
            ToolCallResult::Error(message) => {
                warn!(child_id, identifier, error = %message, "Material fetch failed");
                return None;
            }
        };
        if material.is_none() {
            warn!(child_id, identifier, "Material reply had no usable content");
        }
        material
    }

    /// Question `number` of a material with its instruction, or `None` when
    /// the material cannot be fetched or has no such question.
    pub async fn get_specific_question(
        &self,
        child_id: &str,
        identifier: &str,
        number: u32,
    ) -> Option<SpecificQuestion> {
        let material = self.get_material_content(child_id, identifier).await?;
        let question = SpecificQuestion::locate(&material, number);
        if question.is_none() {
            debug!(
                child_id,
                identifier,
                number,
                questions = material.questions.len(),
                "Question not found in material"
            );
        }
        question
    }

    /// Whether a learner may open a material. Denied on any failure.
    pub async fn check_material_access(&self, child_id: &str, identifier: &str) -> MaterialAccess {
        let arguments = json!({"child_id": child_id, "identifier": identifier});

        match self.call_read_tool(tools::CHECK_MATERIAL_ACCESS, arguments).await {
            ToolCallResult::Json(value) => MaterialAccess::from_json(&value).unwrap_or_else(|| {
                warn!(child_id, identifier, "Access reply had no access flag");
                MaterialAccess::denied("access could not be determined")
            }),
            ToolCallResult::Text(text) => MaterialAccess::from_text(&text),
            ToolCallResult::Error(message) => {
                warn!(child_id, identifier, error = %message, "Access check failed");
                MaterialAccess::denied("access check failed")
            }
        }
    }

    /// A learner's dashboard, every section merged into one envelope.
    pub async fn get_learning_context(&self, child_id: &str) -> LearningContext {
        let arguments = json!({"child_id": child_id});

        match self.call_read_tool(tools::GET_LEARNING_CONTEXT, arguments).await {
            ToolCallResult::Json(value) => SearchOutcome::Json(value),
            ToolCallResult::Text(text) => {
                SearchOutcome::Parsed(SearchEnvelope::from_text(&text, SearchCategory::All))
            }
            ToolCallResult::Error(message) => {
                warn!(child_id, error = %message, "Learning context unavailable");
                SearchOutcome::Parsed(SearchEnvelope::default())
            }
        }
    }

    /// Close the session. The next call reconnects.
    pub fn disconnect(&self) {
        self.dispatcher.supervisor().disconnect();
    }

    async fn call_read_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        match self.negotiate_format(name, arguments).await {
            Ok(arguments) => self.invoke(name, arguments, Idempotency::Read).await,
            Err(e) => {
                warn!(tool = name, kind = %e.kind(), error = %e, "Tool call skipped, server unreachable");
                ToolCallResult::Error(e.to_string())
            }
        }
    }

    /// Ask for JSON when the tool declares a `response_format` argument.
    ///
    /// Fails only when the tool listing could not get a session; the call
    /// itself would then run the same handshakes again.
    async fn negotiate_format(&self, name: &str, arguments: Value) -> Result<Value> {
        if !self.prefer_structured {
            return Ok(arguments);
        }
        let Value::Object(mut map) = arguments else {
            return Ok(arguments);
        };

        let tools = match self.tool_catalog().await {
            Ok(tools) => tools,
            Err(e) if e.is_unreachable() => return Err(e),
            Err(_) => return Ok(Value::Object(map)),
        };
        if tools
            .iter()
            .any(|tool| tool.name == name && tool.supports_structured_response())
        {
            map.insert(RESPONSE_FORMAT.to_string(), Value::from("json"));
        }
        Ok(Value::Object(map))
    }

    async fn invoke(&self, name: &str, arguments: Value, idempotency: Idempotency) -> ToolCallResult {
        let mut params = Map::new();
        params.insert("name".to_string(), Value::from(name));
        params.insert("arguments".to_string(), arguments);

        match self
            .dispatcher
            .send("tools/call", Some(Value::Object(params)), idempotency)
            .await
        {
            Ok(result) => ToolCallResult::from_call_result(result),
            Err(e) => {
                warn!(tool = name, kind = %e.kind(), error = %e, "Tool call failed");
                ToolCallResult::Error(e.to_string())
            }
        }
    }

    async fn tool_catalog(&self) -> Result<Arc<Vec<ToolDescriptor>>> {
        if let Some(tools) = self.tools.read().as_ref() {
            return Ok(Arc::clone(tools));
        }

        let listed = self
            .dispatcher
            .send("tools/list", None, Idempotency::Read)
            .await
            .and_then(parse_tool_list);
        match listed {
            Ok(tools) => {
                debug!(count = tools.len(), "Cached tool list");
                let tools = Arc::new(tools);
                *self.tools.write() = Some(Arc::clone(&tools));
                Ok(tools)
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Listing tools failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorlink_records::FAILED_SUMMARY;

    #[test]
    fn test_failed_outcome() {
        let outcome = SearchOutcome::failed();
        assert!(outcome.is_failed());
        assert_eq!(outcome.envelope().unwrap().summary, FAILED_SUMMARY);
        assert!(!SearchOutcome::Json(json!({"results": []})).is_failed());
        assert!(!SearchOutcome::Parsed(SearchEnvelope::default()).is_failed());
    }

    #[test]
    fn test_outcome_serializes_untagged() {
        let value = serde_json::to_value(SearchOutcome::Json(json!({"hits": 2}))).unwrap();
        assert_eq!(value, json!({"hits": 2}));

        let value = serde_json::to_value(SearchOutcome::failed()).unwrap();
        assert_eq!(value["summary"], "failed");
    }
}
