//! Tools: named, schema-described capabilities an agent can call.
//!
//! There are three ways to provide a tool:
//!
//! - implement the typed [`Tool`] trait on a struct (arguments are
//!   deserialized into `Tool::Args`, schema comes from [`schemars`])
//! - wrap a closure with [`FunctionTool::new`] or [`FunctionTool::new_async`]
//! - implement the object-safe [`DynTool`] trait directly, as
//!   [`AgentTool`](crate::agent::AgentTool) does
//!
//! Tools attached to an agent live in a [`ToolList`]: an ordered collection,
//! unique by name, shared between clones of the agent.
//!
//! Invocation goes through [`invoke`], which validates arguments against the
//! tool's parameter schema before the body ever runs, and turns failures and
//! panics into [`ToolError`] values instead of aborting the run.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::agent::Agent;
use crate::callback::RunContext;
use crate::error::ToolError;
use crate::schema;

/// A type alias for `Result<T, ToolError>`.
pub type ToolResult<T> = Result<T, ToolError>;

/// Definition of a tool as shown to the model.
///
/// Serializes to the function-calling format:
/// ```json
/// {"type": "function", "function": {"name": "...", "description": "...", "parameters": {...}}}
/// ```
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ToolDefinition {
    /// Name of the tool (e.g., "get_weather").
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON schema for the tool's parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Returns the tool name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description.
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Serialize for ToolDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut function = serde_json::Map::new();
        function.insert("name".to_owned(), Value::String(self.name.clone()));
        function.insert(
            "description".to_owned(),
            Value::String(self.description.clone()),
        );
        function.insert("parameters".to_owned(), self.parameters.clone());

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &function)?;
        map.end()
    }
}

/// The typed tool trait.
///
/// ```rust,ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct WeatherArgs { city: String }
///
/// struct GetWeather;
///
/// #[async_trait]
/// impl Tool for GetWeather {
///     const NAME: &'static str = "get_weather";
///     type Args = WeatherArgs;
///     type Output = String;
///     type Error = ToolError;
///
///     fn description(&self) -> String { "Current weather for a city".into() }
///
///     async fn call(&self, args: WeatherArgs, _ctx: &RunContext) -> ToolResult<String> {
///         Ok(format!("Sunny in {}", args.city))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static name of the tool.
    const NAME: &'static str;

    /// Arguments type for the tool.
    type Args: DeserializeOwned + JsonSchema + Send;

    /// Output type of the tool.
    type Output: Serialize + Send;

    /// Error type for tool execution.
    type Error: Into<ToolError> + Send;

    /// Get the name of the tool.
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Get the description of the tool.
    fn description(&self) -> String;

    /// Get the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value {
        schema::generate_json_schema::<Self::Args>().1
    }

    /// Whether the tool is visible to `agent` for the current turn.
    fn is_enabled(&self, context: &RunContext, agent: &Agent) -> bool {
        let _ = (context, agent);
        true
    }

    /// Execute the tool with typed arguments.
    async fn call(
        &self,
        args: Self::Args,
        context: &RunContext,
    ) -> Result<Self::Output, Self::Error>;

    /// Get the tool definition shown to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters_schema())
    }

    /// Call the tool with JSON arguments and return JSON output.
    async fn call_json(&self, args: Value, context: &RunContext) -> ToolResult<Value> {
        let typed_args: Self::Args = serde_json::from_value(args)?;
        let output = self.call(typed_args, context).await.map_err(Into::into)?;
        serde_json::to_value(output).map_err(|e| ToolError::execution(e.to_string()))
    }
}

/// Object-safe tool interface used by the runtime.
#[async_trait]
pub trait DynTool: Send + Sync {
    /// Get the name of the tool.
    fn name(&self) -> &str;

    /// Get the tool definition shown to the model.
    fn definition(&self) -> ToolDefinition;

    /// Whether the tool is visible to `agent` for the current turn.
    fn is_enabled(&self, context: &RunContext, agent: &Agent) -> bool {
        let _ = (context, agent);
        true
    }

    /// Call the tool with JSON arguments.
    async fn call_json(&self, args: Value, context: &RunContext) -> ToolResult<Value>;
}

#[async_trait]
impl<T: Tool + 'static> DynTool for T {
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn definition(&self) -> ToolDefinition {
        Tool::definition(self)
    }

    fn is_enabled(&self, context: &RunContext, agent: &Agent) -> bool {
        Tool::is_enabled(self, context, agent)
    }

    async fn call_json(&self, args: Value, context: &RunContext) -> ToolResult<Value> {
        Tool::call_json(self, args, context).await
    }
}

/// A boxed dynamic tool.
pub type BoxedTool = Box<dyn DynTool>;

/// A shared dynamic tool.
pub type SharedTool = Arc<dyn DynTool>;

/// Enablement predicate for tools and handoffs.
#[derive(Clone)]
pub enum IsEnabled {
    /// Fixed visibility.
    Static(bool),
    /// Visibility computed per turn from the run context and the agent.
    Dynamic(Arc<dyn Fn(&RunContext, &Agent) -> bool + Send + Sync>),
}

impl IsEnabled {
    /// Evaluate the predicate.
    #[must_use]
    pub fn evaluate(&self, context: &RunContext, agent: &Agent) -> bool {
        match self {
            Self::Static(enabled) => *enabled,
            Self::Dynamic(f) => f(context, agent),
        }
    }
}

impl Default for IsEnabled {
    fn default() -> Self {
        Self::Static(true)
    }
}

impl From<bool> for IsEnabled {
    fn from(enabled: bool) -> Self {
        Self::Static(enabled)
    }
}

impl fmt::Debug for IsEnabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(enabled) => f.debug_tuple("Static").field(enabled).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

type SyncHandler = Arc<dyn Fn(Value, &RunContext) -> ToolResult<Value> + Send + Sync>;
type AsyncHandler = Arc<dyn Fn(Value, RunContext) -> BoxFuture<'static, ToolResult<Value>> + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

/// A tool built from a plain function or closure.
///
/// The parameter schema is generated from the argument type, so the closure
/// only ever sees arguments that already passed schema validation.
///
/// ```rust,ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct AddArgs { a: i64, b: i64 }
///
/// let add = FunctionTool::new("add", "Add two integers", |args: AddArgs, _ctx| {
///     Ok::<_, ToolError>(args.a + args.b)
/// });
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    definition: ToolDefinition,
    handler: Handler,
    enabled: IsEnabled,
}

impl FunctionTool {
    /// Wrap a synchronous function.
    pub fn new<A, O, E, F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + JsonSchema,
        O: Serialize,
        E: Into<ToolError>,
        F: Fn(A, &RunContext) -> Result<O, E> + Send + Sync + 'static,
    {
        let handler: SyncHandler = Arc::new(move |args, ctx| {
            let args: A = serde_json::from_value(args)?;
            let output = f(args, ctx).map_err(Into::into)?;
            serde_json::to_value(output).map_err(|e| ToolError::execution(e.to_string()))
        });
        Self {
            definition: ToolDefinition::new(name, description, schema::generate_json_schema::<A>().1),
            handler: Handler::Sync(handler),
            enabled: IsEnabled::default(),
        }
    }

    /// Wrap an asynchronous function.
    ///
    /// The function receives an owned [`RunContext`] so the returned future
    /// can be `'static`.
    pub fn new_async<A, O, E, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> Self
    where
        A: DeserializeOwned + JsonSchema + Send + 'static,
        O: Serialize + 'static,
        E: Into<ToolError> + 'static,
        F: Fn(A, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let f = Arc::new(f);
        let handler: AsyncHandler = Arc::new(move |args, ctx| {
            let f = Arc::clone(&f);
            async move {
                let args: A = serde_json::from_value(args)?;
                let output = f(args, ctx).await.map_err(Into::into)?;
                serde_json::to_value(output).map_err(|e| ToolError::execution(e.to_string()))
            }
            .boxed()
        });
        Self {
            definition: ToolDefinition::new(name, description, schema::generate_json_schema::<A>().1),
            handler: Handler::Async(handler),
            enabled: IsEnabled::default(),
        }
    }

    /// Override the generated parameter schema.
    #[must_use]
    pub fn parameters(mut self, schema: Value) -> Self {
        self.definition.parameters = schema;
        self
    }

    /// Set a fixed enablement flag.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = IsEnabled::Static(enabled);
        self
    }

    /// Compute enablement per turn.
    #[must_use]
    pub fn enabled_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> bool + Send + Sync + 'static,
    {
        self.enabled = IsEnabled::Dynamic(Arc::new(f));
        self
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.definition.name)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DynTool for FunctionTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn is_enabled(&self, context: &RunContext, agent: &Agent) -> bool {
        self.enabled.evaluate(context, agent)
    }

    async fn call_json(&self, args: Value, context: &RunContext) -> ToolResult<Value> {
        match &self.handler {
            Handler::Sync(f) => f(args, context),
            Handler::Async(f) => f(args, context.clone()).await,
        }
    }
}

/// An ordered, name-unique, shareable collection of tools.
///
/// Cloning a `ToolList` yields a handle to the *same* collection: a tool
/// added through one handle is visible through every other. Use
/// [`ToolList::deep_clone`] for an independent copy.
#[derive(Clone, Default)]
pub struct ToolList {
    inner: Arc<RwLock<Vec<SharedTool>>>,
}

impl ToolList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list from tools; later tools replace earlier ones with the
    /// same name.
    #[must_use]
    pub fn from_tools(tools: impl IntoIterator<Item = SharedTool>) -> Self {
        let list = Self::new();
        for tool in tools {
            list.add(tool);
        }
        list
    }

    /// Add a tool. A tool with the same name is replaced in place, keeping
    /// its position.
    pub fn add(&self, tool: SharedTool) {
        let mut tools = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => tools[index] = tool,
            None => tools.push(tool),
        }
    }

    /// Remove a tool by name. Returns `true` if it was present.
    pub fn remove(&self, name: &str) -> bool {
        let mut tools = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = tools.len();
        tools.retain(|t| t.name() != name);
        tools.len() != before
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    /// Take a point-in-time copy of the tools, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SharedTool> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tool names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|t| t.name().to_owned()).collect()
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an independent list holding the same tools.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        Self::from_tools(self.snapshot())
    }

    /// Returns `true` if both handles refer to the same collection.
    #[must_use]
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ToolList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Invoke a tool with raw model-supplied arguments.
///
/// The arguments are parsed and validated against the tool's parameter
/// schema first; the tool body is not called when validation fails. Errors
/// and panics raised by the body become [`ToolError::Execution`].
pub async fn invoke(tool: &dyn DynTool, raw_arguments: &str, context: &RunContext) -> ToolResult<Value> {
    let args = parse_arguments(raw_arguments)?;
    schema::validate(&tool.definition().parameters, &args).map_err(ToolError::InvalidArguments)?;

    match AssertUnwindSafe(tool.call_json(args, context))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(ToolError::execution(format!(
            "tool panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

/// Render a tool outcome as the text the model sees.
#[must_use]
pub fn render_result(result: &ToolResult<Value>) -> String {
    match result {
        Ok(Value::String(s)) => s.clone(),
        Ok(value) => value.to_string(),
        Err(e) => format!("Tool error: {e}"),
    }
}

fn parse_arguments(raw: &str) -> ToolResult<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::invalid_args(format!("arguments are not valid JSON: {e}")))
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
