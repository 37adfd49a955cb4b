//! Last-acting-agent resolution.
//!
//! The agent that last spoke in a session is resolved by trying named
//! strategies in a fixed order; the first one that knows the answer wins.

use std::collections::HashMap;

/// Agent required for continuation when the execution state names none.
pub const DEFAULT_AGENT: &str = "builder";

/// One way of finding the last agent for a session.
pub trait AgentStrategy {
    /// Stable name reported alongside the resolved agent.
    fn name(&self) -> &'static str;
    fn resolve(&self, session_id: &str) -> Option<String>;
}

/// Agent plus the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAgent {
    pub agent: String,
    pub strategy: &'static str,
}

/// Try `strategies` in order and return the first non-empty answer.
pub fn resolve_last_agent(
    strategies: &[&dyn AgentStrategy],
    session_id: &str,
) -> Option<ResolvedAgent> {
    strategies.iter().find_map(|strategy| {
        strategy
            .resolve(session_id)
            .map(|agent| agent.trim().to_string())
            .filter(|agent| !agent.is_empty())
            .map(|agent| ResolvedAgent {
                agent,
                strategy: strategy.name(),
            })
    })
}

/// Case-insensitive agent identity check; a leading `@` is ignored.
pub fn same_agent(left: &str, right: &str) -> bool {
    let normalize = |value: &str| {
        let value = value.trim();
        value.strip_prefix('@').unwrap_or(value).to_lowercase()
    };
    normalize(left) == normalize(right)
}

/// Agents observed on message events, held by the continuation controller.
pub struct SessionMemory<'a> {
    agents: &'a HashMap<String, String>,
}

impl<'a> SessionMemory<'a> {
    pub fn new(agents: &'a HashMap<String, String>) -> Self {
        Self { agents }
    }
}

impl AgentStrategy for SessionMemory<'_> {
    fn name(&self) -> &'static str {
        "session-memory"
    }

    fn resolve(&self, session_id: &str) -> Option<String> {
        self.agents.get(session_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, Option<&'static str>);

    impl AgentStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn resolve(&self, _session_id: &str) -> Option<String> {
            self.1.map(str::to_string)
        }
    }

    #[test]
    fn first_strategy_with_an_answer_wins() {
        let miss = Fixed("miss", None);
        let blank = Fixed("blank", Some("  "));
        let hit = Fixed("hit", Some("Builder"));
        let late = Fixed("late", Some("qa"));

        let resolved = resolve_last_agent(&[&miss, &blank, &hit, &late], "s1").expect("resolved");
        assert_eq!(
            resolved,
            ResolvedAgent {
                agent: "Builder".to_string(),
                strategy: "hit",
            }
        );
    }

    #[test]
    fn no_strategy_answers() {
        let miss = Fixed("miss", None);
        assert_eq!(resolve_last_agent(&[&miss], "s1"), None);
        assert_eq!(resolve_last_agent(&[], "s1"), None);
    }

    #[test]
    fn session_memory_reads_map() {
        let mut agents = HashMap::new();
        agents.insert("s1".to_string(), "dev".to_string());
        let memory = SessionMemory::new(&agents);
        assert_eq!(memory.resolve("s1").as_deref(), Some("dev"));
        assert_eq!(memory.resolve("s2"), None);
    }

    #[test]
    fn agent_comparison_ignores_case_and_at_sign() {
        assert!(same_agent("@Builder", "builder"));
        assert!(!same_agent("builder", "qa"));
    }
}
