//! Tool registry: named operations whose results get signed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// An operation whose output becomes a signed record's payload.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn invoke(&self, args: &Value) -> anyhow::Result<Value>;
}

/// A tool backed by a closure.
pub struct FnTool<F> {
    name: String,
    f: F,
}

impl<F> FnTool<F>
where
    F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, args: &Value) -> anyhow::Result<Value> {
        (self.f)(args)
    }
}

/// Thread-safe registry of tools by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool of the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        if let Ok(mut tools) = self.tools.write() {
            tools.insert(tool.name().to_string(), tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().ok()?.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.tools.read() {
            Ok(tools) => tools.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}
