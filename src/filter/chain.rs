//! Ordered filter chain and the per-command run state.

use std::sync::Arc;

use super::{Filter, FilterTask, NamedCommandDispatch, StepContext, VariableSubstitution};

/// Outcome of polling a command through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainPoll {
    /// A filter is still working; poll again next step
    Pending,
    /// A filter consumed the command
    Consumed,
    /// Every filter passed the command; this text goes to the shell
    Forward(String),
    /// The transition budget ran out before the next filter could start.
    /// The run keeps its place and resumes there on the next poll.
    Exhausted,
}

/// Ordered list of filters.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variable substitution followed by the built-in named commands.
    pub fn standard() -> Self {
        Self::new()
            .with_filter(VariableSubstitution::new())
            .with_filter(NamedCommandDispatch::with_builtins())
    }

    pub fn with_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.push(Arc::new(filter));
        self
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn insert(&mut self, index: usize, filter: Arc<dyn Filter>) {
        let index = index.min(self.filters.len());
        self.filters.insert(index, filter);
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Filter>> {
        self.filters.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run `command` through the chain within a single poll.
    ///
    /// Returns [`ChainPoll::Pending`] if some filter does not finish at once;
    /// use [`ChainRun`] to drive such commands across steps.
    pub fn run(&self, cx: &mut StepContext<'_>, command: &str) -> ChainPoll {
        let mut run = ChainRun::new(command);
        let mut budget = usize::MAX;
        run.poll(self, cx, &mut budget)
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Progress of one command through the chain.
///
/// Holds the command text as rewritten so far, the index of the filter
/// currently responsible for it, and that filter's task while it runs.
pub struct ChainRun {
    text: String,
    filter_index: usize,
    active: Option<Box<dyn FilterTask>>,
}

impl ChainRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filter_index: 0,
            active: None,
        }
    }

    /// Current (possibly rewritten) command text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn filter_index(&self) -> usize {
        self.filter_index
    }

    /// Whether a filter task is suspended.
    pub fn is_waiting(&self) -> bool {
        self.active.is_some()
    }

    /// Progress reported by the suspended task, 0.0 when none.
    pub fn task_progress(&self) -> f32 {
        self.active
            .as_ref()
            .map_or(0.0, |task| task.progress().clamp(0.0, 1.0))
    }

    /// Move the command through as many filters as finish right away.
    ///
    /// Every filter start and every completion spends one unit of `budget`.
    /// A completion is always recorded; a start needs budget left, otherwise
    /// the poll returns [`ChainPoll::Exhausted`] without losing its place.
    pub fn poll(
        &mut self,
        chain: &FilterChain,
        cx: &mut StepContext<'_>,
        budget: &mut usize,
    ) -> ChainPoll {
        loop {
            if let Some(task) = self.active.as_mut() {
                if !task.finished(cx) {
                    return ChainPoll::Pending;
                }
                let result = task.result();
                self.active = None;
                *budget = budget.saturating_sub(1);
                let name = chain
                    .get(self.filter_index)
                    .map_or("<removed>", |f| f.name());
                match result {
                    None => {
                        log::debug!("Filter '{}' consumed {:?}", name, self.text);
                        return ChainPoll::Consumed;
                    }
                    Some(text) => {
                        if text != self.text {
                            log::debug!("Filter '{}' rewrote {:?} -> {:?}", name, self.text, text);
                        }
                        self.text = text;
                        self.filter_index += 1;
                    }
                }
                continue;
            }

            match chain.get(self.filter_index) {
                Some(_) if *budget == 0 => return ChainPoll::Exhausted,
                Some(filter) => {
                    *budget -= 1;
                    log::trace!("Filter '{}' starting on {:?}", filter.name(), self.text);
                    self.active = Some(filter.start(cx, &self.text));
                }
                None => return ChainPoll::Forward(self.text.clone()),
            }
        }
    }

    /// Cancel the suspended task, if any.
    pub fn cancel(&mut self) {
        if let Some(mut task) = self.active.take() {
            task.cancel();
        }
    }
}

impl std::fmt::Debug for ChainRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRun")
            .field("text", &self.text)
            .field("filter_index", &self.filter_index)
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FnFilter;
    use crate::output::OutputLog;
    use crate::owner::OwnerKey;
    use std::collections::HashMap;

    /// Finishes after `remaining` extra polls, then passes the text through.
    struct Delay {
        remaining: usize,
        text: Option<String>,
    }

    impl FilterTask for Delay {
        fn finished(&mut self, _cx: &mut StepContext<'_>) -> bool {
            if self.remaining == 0 {
                return true;
            }
            self.remaining -= 1;
            false
        }

        fn result(&mut self) -> Option<String> {
            self.text.take()
        }
    }

    struct DelayFilter(usize);

    impl Filter for DelayFilter {
        fn name(&self) -> &str {
            "delay"
        }

        fn start(&self, _cx: &mut StepContext<'_>, command: &str) -> Box<dyn FilterTask> {
            Box::new(Delay {
                remaining: self.0,
                text: Some(command.to_string()),
            })
        }
    }

    fn with_cx<R>(f: impl FnOnce(&mut StepContext<'_>) -> R) -> R {
        let owner = OwnerKey::new("chain-test");
        let mut output = OutputLog::new(owner.clone(), 0, None);
        let vars = HashMap::new();
        let mut cx = StepContext::new(&owner, &mut output, &vars);
        f(&mut cx)
    }

    #[test]
    fn test_empty_chain_forwards_unchanged() {
        let chain = FilterChain::new();
        let poll = with_cx(|cx| chain.run(cx, "echo hi"));
        assert_eq!(poll, ChainPoll::Forward("echo hi".to_string()));
    }

    #[test]
    fn test_rewrites_accumulate_in_order() {
        let chain = FilterChain::new()
            .with_filter(FnFilter::new("a", |_: &mut StepContext<'_>, c: &str| {
                Some(format!("{c}-a"))
            }))
            .with_filter(FnFilter::new("b", |_: &mut StepContext<'_>, c: &str| {
                Some(format!("{c}-b"))
            }));
        let poll = with_cx(|cx| chain.run(cx, "x"));
        assert_eq!(poll, ChainPoll::Forward("x-a-b".to_string()));
    }

    #[test]
    fn test_suspended_filter_resumes_on_later_polls() {
        let chain = FilterChain::new().with_filter(DelayFilter(2));
        let mut run = ChainRun::new("cmd");
        let mut budget = 10;
        with_cx(|cx| {
            assert_eq!(run.poll(&chain, cx, &mut budget), ChainPoll::Pending);
            assert!(run.is_waiting());
            assert_eq!(run.poll(&chain, cx, &mut budget), ChainPoll::Pending);
            assert_eq!(
                run.poll(&chain, cx, &mut budget),
                ChainPoll::Forward("cmd".to_string())
            );
        });
        // One start and one completion; suspended polls are free
        assert_eq!(budget, 8);
        assert_eq!(run.filter_index(), 1);
    }

    #[test]
    fn test_exhausted_budget_keeps_place() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = FilterChain::new()
            .with_filter(FnFilter::new("upper", |_: &mut StepContext<'_>, c: &str| {
                Some(c.to_uppercase())
            }))
            .with_filter(FnFilter::new("count", move |_: &mut StepContext<'_>, _: &str| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                None
            }));
        let mut run = ChainRun::new("cmd");

        let mut budget = 2;
        let first = with_cx(|cx| run.poll(&chain, cx, &mut budget));
        assert_eq!(first, ChainPoll::Exhausted);
        assert_eq!(run.filter_index(), 1);
        assert_eq!(run.text(), "CMD");

        let mut budget = 2;
        let second = with_cx(|cx| run.poll(&chain, cx, &mut budget));
        assert_eq!(second, ChainPoll::Consumed);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_drops_active_task() {
        let chain = FilterChain::new().with_filter(DelayFilter(5));
        let mut run = ChainRun::new("cmd");
        let mut budget = usize::MAX;
        with_cx(|cx| run.poll(&chain, cx, &mut budget));
        run.cancel();
        assert!(!run.is_waiting());
    }

    #[test]
    fn test_standard_chain_order() {
        assert_eq!(
            FilterChain::standard().names(),
            vec!["variables", "named-commands"]
        );
    }
}
