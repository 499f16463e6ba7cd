//! Compile-time registry of agent definitions.
//!
//! Each agent is defined in a TOML file under `agents/`. The registry
//! embeds these at compile time and exposes them via [`all_agents`] and
//! [`find_agent`].

use resonance_agents_models::AgentDefinition;

use crate::AgentError;

// ── Compile-time embedded TOML files ────────────────────────────────

const AGENT_TOMLS: &[(&str, &str)] = &[
    ("political", include_str!("../agents/political.toml")),
    ("content", include_str!("../agents/content.toml")),
    ("merchandise", include_str!("../agents/merchandise.toml")),
];

#[cfg(test)]
const EXPECTED_AGENT_COUNT: usize = 3;

/// Returns every agent definition, in declaration order.
///
/// # Panics
///
/// Panics if any TOML definition is malformed (this is a compile-time
/// guarantee since the definitions are embedded).
#[must_use]
pub fn all_agents() -> Vec<AgentDefinition> {
    AGENT_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse agent definition '{name}': {e}"))
        })
        .collect()
}

/// Looks up an agent by ID.
///
/// # Errors
///
/// Returns [`AgentError::UnknownAgent`] if no agent has this ID.
pub fn find_agent(id: &str) -> Result<AgentDefinition, AgentError> {
    all_agents()
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| AgentError::UnknownAgent { id: id.to_string() })
}
