//! Mutable state scoped to one search run.

use crate::prompt::PromptVariantRegistry;
use crate::tools::ToolGains;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Id of the root blueprint of every run.
pub const ROOT_BLUEPRINT_ID: &str = "bp-0000";

/// Per-run state threaded through mutation and scheduling.
///
/// Nothing here outlives the run; two runs never share gains, variants, or
/// randomness.
#[derive(Debug)]
pub struct SearchContext {
    /// Historical tool gain
    pub tool_gains: ToolGains,
    /// Every prompt variant generated so far
    pub prompts: PromptVariantRegistry,
    /// Seeded randomness for scheduling
    pub rng: StdRng,
    next_blueprint: usize,
}

impl SearchContext {
    /// Fresh context for a run with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            tool_gains: ToolGains::default(),
            prompts: PromptVariantRegistry::default(),
            rng: StdRng::seed_from_u64(seed),
            next_blueprint: 1,
        }
    }

    /// Allocate the next child blueprint id (`bp-0001`, `bp-0002`, ...).
    pub fn next_blueprint_id(&mut self) -> String {
        let id = format!("bp-{:04}", self.next_blueprint);
        self.next_blueprint += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blueprint_ids_are_sequential() {
        let mut context = SearchContext::new(0);
        assert_eq!(context.next_blueprint_id(), "bp-0001");
        assert_eq!(context.next_blueprint_id(), "bp-0002");
    }
}
