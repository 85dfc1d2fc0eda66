use crate::Result;
use crate::protocol::models::Tool;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::transport::BoxFuture;

pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
}

/// A function call extracted from `response.function_call_arguments.done`.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub call_id: String,
    pub arguments: Value,
    /// Arrival order within the current connection.
    pub sequence: u64,
}

/// Name → handler table plus the schema declarations sent at session setup.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    defs: Vec<ToolDefinition>,
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.defs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<ToolHandler> {
        self.handlers.get(name).cloned()
    }

    /// Register an untyped handler with an explicit parameter schema.
    /// Registering an existing name replaces both the handler and its declaration.
    pub fn register<F, Fut>(
        &mut self,
        name: &str,
        description: Option<String>,
        parameters: Value,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let entry = ToolDefinition {
            name: name.to_string(),
            description,
            parameters,
        };
        if let Some(existing) = self.defs.iter_mut().find(|d| d.name == name) {
            *existing = entry;
        } else {
            self.defs.push(entry);
        }
        self.handlers
            .insert(name.to_string(), Arc::new(move |args| Box::pin(handler(args))));
        tracing::info!("Registered tool: {name}");
    }

    /// Register a handler whose arguments are decoded into `TArgs`; the
    /// parameter schema is derived from `TArgs`.
    pub fn tool<TArgs, TResp, F, Fut>(&mut self, name: &str, handler: F)
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.typed(name, None, handler);
    }

    pub fn tool_with_description<TArgs, TResp, F, Fut>(
        &mut self,
        name: &str,
        description: impl Into<String>,
        handler: F,
    ) where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.typed(name, Some(description.into()), handler);
    }

    fn typed<TArgs, TResp, F, Fut>(&mut self, name: &str, description: Option<String>, handler: F)
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        let parameters = parameters_schema::<TArgs>();
        let user_handler = Arc::new(handler);
        let tool_name = name.to_string();
        let handler = move |value: Value| -> BoxFuture<'static, Result<Value>> {
            let user_handler = Arc::clone(&user_handler);
            let tool_name = tool_name.clone();
            Box::pin(async move {
                let args: TArgs = serde_json::from_value(value).map_err(|e| {
                    crate::Error::Validation(format!("Invalid arguments for {tool_name}: {e}"))
                })?;
                let resp = user_handler(args).await?;
                Ok(serde_json::to_value(resp)?)
            })
        };
        self.register(name, description, parameters, handler);
    }

    /// Protocol-level declarations for `session.update`.
    #[must_use]
    pub fn as_tools(&self) -> Vec<Tool> {
        self.defs
            .iter()
            .map(|def| Tool::Function {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            })
            .collect()
    }
}

/// JSON schema for `T` with the meta keys the realtime API does not accept.
#[must_use]
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| Value::Object(Map::new()));
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
    }
    value
}

/// Text form of a tool's return value for `function_call_output`.
#[must_use]
pub fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    #[test]
    fn typed_tool_declares_required_fields() {
        let mut registry = ToolRegistry::new();
        registry.tool("echo", |args: EchoArgs| async move { Ok(args.text) });
        let def = &registry.definitions()[0];
        assert_eq!(def.name, "echo");
        assert_eq!(def.parameters["required"], serde_json::json!(["text"]));
        assert!(def.parameters.get("$schema").is_none());
    }

    #[test]
    fn reregistration_replaces_definition() {
        let mut registry = ToolRegistry::new();
        registry.register("a", None, serde_json::json!({}), |v| async move { Ok(v) });
        registry.register("a", Some("second".into()), serde_json::json!({}), |v| async move { Ok(v) });
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.definitions().len(), 1);
        assert_eq!(registry.definitions()[0].description.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn typed_handler_rejects_bad_arguments() {
        let mut registry = ToolRegistry::new();
        registry.tool("echo", |args: EchoArgs| async move { Ok(args.text) });
        let handler = registry.handler("echo").unwrap();
        let err = handler(serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Invalid arguments for echo"));
        let ok = handler(serde_json::json!({"text": "hi"})).await.unwrap();
        assert_eq!(ok, Value::String("hi".into()));
    }

    #[test]
    fn render_output_keeps_strings_bare() {
        assert_eq!(render_output(&Value::String("ok".into())), "ok");
        assert_eq!(render_output(&serde_json::json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(render_output(&serde_json::json!(3)), "3");
    }
}
