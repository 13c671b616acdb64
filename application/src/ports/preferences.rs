//! Chat preferences port

/// User preferences consulted during agent dispatch.
pub trait ChatPreferences: Send + Sync {
    /// Id of the agent to use when a request mentions none.
    fn default_agent(&self) -> Option<String>;
}

/// Fixed preferences, for tests and when no preference source is wired.
#[derive(Debug, Clone, Default)]
pub struct StaticPreferences {
    pub default_agent: Option<String>,
}

impl StaticPreferences {
    pub fn new(default_agent: Option<String>) -> Self {
        Self { default_agent }
    }
}

impl ChatPreferences for StaticPreferences {
    fn default_agent(&self) -> Option<String> {
        self.default_agent.clone()
    }
}
