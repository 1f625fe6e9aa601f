use serde::Serialize;
use std::fmt;

/// Lifecycle of the agent's background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Never started
    Idle,
    Initializing,
    LoggedIn,
    Running,
    ShuttingDown,
    Stopped,
    /// Terminal: transport construction or login failed
    FailedStartup,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentState::Stopped | AgentState::FailedStartup)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::Initializing => "initializing",
            AgentState::LoggedIn => "logged_in",
            AgentState::Running => "running",
            AgentState::ShuttingDown => "shutting_down",
            AgentState::Stopped => "stopped",
            AgentState::FailedStartup => "failed_startup",
        };
        f.write_str(s)
    }
}
