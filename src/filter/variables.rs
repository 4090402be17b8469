//! `${name}` substitution from variables captured off shell output.

use par_autorun_config::env_vars::substitute_with;

use super::{Filter, FilterTask, Immediate, StepContext};

/// Replaces `${name}` with the owner's captured variable `name`.
///
/// Unknown names keep their `:-default` or stay as written; `$${name}`
/// produces a literal `${name}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableSubstitution;

impl VariableSubstitution {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for VariableSubstitution {
    fn name(&self) -> &str {
        "variables"
    }

    fn start(&self, cx: &mut StepContext<'_>, command: &str) -> Box<dyn FilterTask> {
        let vars = cx.variables();
        Immediate::pass(substitute_with(command, |name| vars.get(name).cloned()))
    }
}
