//! Multi-server tool aggregation and call routing.

use crate::config::ServerConfig;
use crate::error::McpError;
use crate::tool::{ToolCallResult, ToolDescriptor};
use futures_util::future::join_all;
use hearth_types::ToolDefinition;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Discovery and invocation seam between the registry and the protocol
/// client. Dyn-compatible so tests can substitute a scripted backend.
pub trait ToolBackend: Send + Sync {
    fn list_tools<'a>(
        &'a self,
        config: &'a ServerConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<Vec<ToolDescriptor>>, McpError>> + Send + 'a>>;

    fn call_tool<'a>(
        &'a self,
        config: &'a ServerConfig,
        name: &'a str,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolCallResult, McpError>> + Send + 'a>>;
}

impl ToolBackend for crate::client::McpClient {
    fn list_tools<'a>(
        &'a self,
        config: &'a ServerConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<Vec<ToolDescriptor>>, McpError>> + Send + 'a>>
    {
        Box::pin(crate::client::McpClient::list_tools(self, config))
    }

    fn call_tool<'a>(
        &'a self,
        config: &'a ServerConfig,
        name: &'a str,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolCallResult, McpError>> + Send + 'a>> {
        Box::pin(crate::client::McpClient::call_tool(self, config, name, arguments))
    }
}

/// Aggregates tools across configured servers and routes calls to the
/// server that owns each tool.
#[derive(Clone)]
pub struct ToolRegistry {
    backend: Arc<dyn ToolBackend>,
}

impl ToolRegistry {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self { backend }
    }

    /// Collect the tool definitions every enabled server exposes, honoring
    /// each server's tool selection. Servers are queried concurrently; one
    /// unreachable server costs its own tools, never the whole set.
    pub async fn list_all_tools(&self, configs: &[ServerConfig]) -> Vec<ToolDefinition> {
        let enabled: Vec<&ServerConfig> = configs.iter().filter(|c| c.enabled).collect();
        let results = join_all(enabled.iter().map(|config| self.backend.list_tools(config))).await;

        let mut definitions = Vec::new();
        for (config, result) in enabled.iter().zip(results) {
            match result {
                Ok(tools) => {
                    definitions.extend(
                        tools
                            .iter()
                            .filter(|tool| config.exposes_tool(&tool.name))
                            .map(ToolDescriptor::to_definition),
                    );
                }
                Err(e) => {
                    tracing::warn!("Skipping tools from '{}': {e}", config.name);
                }
            }
        }
        definitions
    }

    /// Route a tool call to the first enabled server exposing the tool.
    pub async fn call_tool(
        &self,
        configs: &[ServerConfig],
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        for config in configs.iter().filter(|c| c.enabled) {
            if !config.exposes_tool(name) {
                continue;
            }
            let tools = match self.backend.list_tools(config).await {
                Ok(tools) => tools,
                Err(e) => {
                    tracing::warn!("Cannot resolve tools on '{}': {e}", config.name);
                    continue;
                }
            };
            if tools.iter().any(|tool| tool.name == name) {
                return self.backend.call_tool(config, name, arguments).await;
            }
        }
        Err(McpError::ToolNotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Scripted backend: tools per server name, plus a call log.
    struct StubBackend {
        tools: HashMap<String, Vec<&'static str>>,
        failing: Vec<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubBackend {
        fn new(tools: &[(&str, &[&'static str])]) -> Self {
            Self {
                tools: tools
                    .iter()
                    .map(|(server, names)| (server.to_string(), names.to_vec()))
                    .collect(),
                failing: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, server: &str) -> Self {
            self.failing.push(server.to_string());
            self
        }
    }

    impl ToolBackend for StubBackend {
        fn list_tools<'a>(
            &'a self,
            config: &'a ServerConfig,
        ) -> Pin<Box<dyn Future<Output = Result<Arc<Vec<ToolDescriptor>>, McpError>> + Send + 'a>>
        {
            Box::pin(async move {
                if self.failing.contains(&config.name) {
                    return Err(McpError::Handshake {
                        server: config.name.clone(),
                        message: "connection refused".into(),
                    });
                }
                let tools = self
                    .tools
                    .get(&config.name)
                    .map(|names| {
                        names
                            .iter()
                            .map(|name| ToolDescriptor {
                                name: (*name).to_string(),
                                title: None,
                                description: None,
                                input_schema: None,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Arc::new(tools))
            })
        }

        fn call_tool<'a>(
            &'a self,
            config: &'a ServerConfig,
            name: &'a str,
            _arguments: Value,
        ) -> Pin<Box<dyn Future<Output = Result<ToolCallResult, McpError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((config.name.clone(), name.to_string()));
                Ok(ToolCallResult::Text(format!("{name} ran on {}", config.name)))
            })
        }
    }

    fn config(name: &str) -> ServerConfig {
        ServerConfig {
            id: Uuid::new_v4(),
            name: name.into(),
            endpoint_url: format!("http://{name}:8123/sse"),
            access_token: String::new(),
            use_auth: false,
            enabled: true,
            selected_tools: vec![],
            timeout_ms: 30000,
        }
    }

    #[tokio::test]
    async fn aggregates_tools_across_servers() {
        let backend = StubBackend::new(&[
            ("home", &["HassTurnOn", "HassTurnOff"]),
            ("files", &["ReadFile"]),
        ]);
        let registry = ToolRegistry::new(Arc::new(backend));
        let configs = vec![config("home"), config("files")];

        let definitions = registry.list_all_tools(&configs).await;
        let names: Vec<&str> = definitions.iter().map(|d| d.function.name.as_str()).collect();
        assert_eq!(names, vec!["HassTurnOn", "HassTurnOff", "ReadFile"]);
    }

    #[tokio::test]
    async fn disabled_servers_excluded() {
        let backend = StubBackend::new(&[("home", &["HassTurnOn"]), ("files", &["ReadFile"])]);
        let registry = ToolRegistry::new(Arc::new(backend));
        let mut files = config("files");
        files.enabled = false;
        let configs = vec![config("home"), files];

        let definitions = registry.list_all_tools(&configs).await;
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].function.name, "HassTurnOn");
    }

    #[tokio::test]
    async fn selection_filters_exposed_tools() {
        let backend = StubBackend::new(&[("home", &["HassTurnOn", "HassTurnOff", "HassLightSet"])]);
        let registry = ToolRegistry::new(Arc::new(backend));
        let mut home = config("home");
        home.selected_tools = vec!["HassTurnOn".into(), "HassLightSet".into()];
        let configs = vec![home];

        let definitions = registry.list_all_tools(&configs).await;
        let names: Vec<&str> = definitions.iter().map(|d| d.function.name.as_str()).collect();
        assert_eq!(names, vec!["HassTurnOn", "HassLightSet"]);
    }

    #[tokio::test]
    async fn unreachable_server_skipped_not_fatal() {
        let backend =
            StubBackend::new(&[("home", &["HassTurnOn"]), ("files", &["ReadFile"])]).failing("home");
        let registry = ToolRegistry::new(Arc::new(backend));
        let configs = vec![config("home"), config("files")];

        let definitions = registry.list_all_tools(&configs).await;
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].function.name, "ReadFile");
    }

    #[tokio::test]
    async fn call_routed_to_owning_server() {
        let backend = StubBackend::new(&[("home", &["HassTurnOn"]), ("files", &["ReadFile"])]);
        let backend = Arc::new(backend);
        let registry = ToolRegistry::new(Arc::clone(&backend) as Arc<dyn ToolBackend>);
        let configs = vec![config("home"), config("files")];

        let result = registry
            .call_tool(&configs, "ReadFile", serde_json::json!({"path": "/tmp/x"}))
            .await
            .unwrap();
        assert_eq!(result.message(), "ReadFile ran on files");
        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec![("files".to_string(), "ReadFile".to_string())]
        );
    }

    #[tokio::test]
    async fn call_skips_server_not_selecting_tool() {
        // Both servers advertise the tool, but the first hides it.
        let backend = StubBackend::new(&[("a", &["Shared"]), ("b", &["Shared"])]);
        let registry = ToolRegistry::new(Arc::new(backend));
        let mut a = config("a");
        a.selected_tools = vec!["SomethingElse".into()];
        let configs = vec![a, config("b")];

        let result = registry
            .call_tool(&configs, "Shared", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.message(), "Shared ran on b");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let backend = StubBackend::new(&[("home", &["HassTurnOn"])]);
        let registry = ToolRegistry::new(Arc::new(backend));
        let configs = vec![config("home")];

        let err = registry
            .call_tool(&configs, "NoSuchTool", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound { name } if name == "NoSuchTool"));
    }

    #[tokio::test]
    async fn disabled_server_cannot_receive_calls() {
        let backend = StubBackend::new(&[("home", &["HassTurnOn"])]);
        let registry = ToolRegistry::new(Arc::new(backend));
        let mut home = config("home");
        home.enabled = false;
        let configs = vec![home];

        let err = registry
            .call_tool(&configs, "HassTurnOn", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound { .. }));
    }
}
