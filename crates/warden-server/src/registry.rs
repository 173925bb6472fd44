//! Tool registry for dispatch and discovery.

use crate::traits::Tool;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of available tools, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Discovery entries, ordered by tool name.
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.parameters_schema(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::traits::{ServerContext, ToolResponse};
    use async_trait::async_trait;

    struct MockTool;

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            "mock"
        }
        fn description(&self) -> &str {
            "A mock tool for testing"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _args: serde_json::Value,
            _ctx: &ServerContext,
        ) -> Result<ToolResponse, ServerError> {
            Ok(ToolResponse::text("mock output"))
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool));

        assert!(registry.has("mock"));
        assert!(!registry.has("nonexistent"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("mock").unwrap().name(), "mock");
    }

    #[test]
    fn test_definitions_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool));

        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["name"], "mock");
        assert_eq!(defs[0]["description"], "A mock tool for testing");
        assert!(defs[0]["inputSchema"].is_object());
    }

    #[test]
    fn test_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
    }
}
