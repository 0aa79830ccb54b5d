//! Deferred configuration for subsystems that have not been loaded yet.
//!
//! Code that wants to configure a subsystem registers a hook with
//! [`LazyHooks::on_load`]. The hook runs when the host first activates the
//! subsystem, receiving the activated instance. Once a subsystem has been
//! activated, new hooks run straight away.
//!
//! Each subsystem moves from *not loaded* to *activated* exactly once; there
//! is no way back.

use std::collections::HashMap;
use std::fmt;

/// Deferred configuration callback.
///
/// The registry is passed back in so a hook can register further hooks.
pub type LoadHook<I> = Box<dyn FnOnce(&I, &mut LazyHooks<I>)>;

enum SubsystemState<I> {
    NotLoaded(Vec<LoadHook<I>>),
    Activated(I),
}

/// Per-subsystem queues of deferred hooks.
pub struct LazyHooks<I> {
    subsystems: HashMap<String, SubsystemState<I>>,
}

impl<I> LazyHooks<I>
where
    I: Clone + 'static,
{
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subsystems: HashMap::new(),
        }
    }

    /// Registers `hook` for `subsystem`.
    ///
    /// The hook is queued while the subsystem is not loaded and invoked
    /// immediately once it has been activated.
    pub fn on_load<F>(&mut self, subsystem: &str, hook: F)
    where
        F: FnOnce(&I) + 'static,
    {
        self.on_load_with(subsystem, move |instance, _| hook(instance));
    }

    /// Registers a hook that also receives the registry.
    pub fn on_load_with<F>(&mut self, subsystem: &str, hook: F)
    where
        F: FnOnce(&I, &mut Self) + 'static,
    {
        let state = self
            .subsystems
            .entry(subsystem.to_owned())
            .or_insert_with(|| SubsystemState::NotLoaded(Vec::new()));
        match state {
            SubsystemState::NotLoaded(queue) => queue.push(Box::new(hook)),
            SubsystemState::Activated(instance) => {
                let instance = instance.clone();
                hook(&instance, self);
            }
        }
    }

    /// Marks `subsystem` activated and drains its queue in registration order.
    ///
    /// Returns `false` without running anything when the subsystem was
    /// already activated. Hooks registered while the queue drains run
    /// immediately.
    pub fn activate(&mut self, subsystem: &str, instance: I) -> bool {
        let state = self
            .subsystems
            .entry(subsystem.to_owned())
            .or_insert_with(|| SubsystemState::NotLoaded(Vec::new()));
        let queued = match state {
            SubsystemState::Activated(_) => return false,
            SubsystemState::NotLoaded(queue) => std::mem::take(queue),
        };
        *state = SubsystemState::Activated(instance.clone());

        tracing::debug!(
            target: "ignition::hooks",
            subsystem,
            hooks = queued.len(),
            "dispatching lazy hooks"
        );
        for hook in queued {
            hook(&instance, self);
        }
        true
    }

    /// Returns `true` once `subsystem` has been activated.
    #[must_use]
    pub fn is_activated(&self, subsystem: &str) -> bool {
        matches!(
            self.subsystems.get(subsystem),
            Some(SubsystemState::Activated(_))
        )
    }

    /// Number of hooks waiting for `subsystem` to activate.
    #[must_use]
    pub fn pending(&self, subsystem: &str) -> usize {
        match self.subsystems.get(subsystem) {
            Some(SubsystemState::NotLoaded(queue)) => queue.len(),
            _ => 0,
        }
    }

    /// The activated instance of `subsystem`, if any.
    #[must_use]
    pub fn instance(&self, subsystem: &str) -> Option<&I> {
        match self.subsystems.get(subsystem) {
            Some(SubsystemState::Activated(instance)) => Some(instance),
            _ => None,
        }
    }
}

impl<I> Default for LazyHooks<I>
where
    I: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I> fmt::Debug for LazyHooks<I> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = formatter.debug_map();
        for (name, state) in &self.subsystems {
            match state {
                SubsystemState::NotLoaded(queue) => {
                    map.entry(name, &format_args!("pending({})", queue.len()))
                }
                SubsystemState::Activated(_) => map.entry(name, &"activated"),
            };
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use rstest::{fixture, rstest};

    type Log = Rc<RefCell<Vec<String>>>;

    #[fixture]
    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn recorder(log: &Log, label: &'static str) -> impl FnOnce(&u32) + 'static {
        let log = Rc::clone(log);
        move |instance| log.borrow_mut().push(format!("{label}:{instance}"))
    }

    #[rstest]
    fn hooks_wait_for_activation(log: Log) {
        let mut hooks = LazyHooks::new();
        hooks.on_load("orm", recorder(&log, "first"));
        hooks.on_load("orm", recorder(&log, "second"));

        assert!(log.borrow().is_empty());
        assert_eq!(hooks.pending("orm"), 2);

        assert!(hooks.activate("orm", 7));
        assert_eq!(*log.borrow(), ["first:7", "second:7"]);
        assert_eq!(hooks.pending("orm"), 0);
    }

    #[rstest]
    fn hooks_after_activation_run_immediately(log: Log) {
        let mut hooks = LazyHooks::new();
        hooks.activate("orm", 3);

        hooks.on_load("orm", recorder(&log, "late"));

        assert_eq!(*log.borrow(), ["late:3"]);
    }

    #[rstest]
    fn second_activation_is_a_no_op(log: Log) {
        let mut hooks = LazyHooks::new();
        hooks.on_load("orm", recorder(&log, "once"));

        assert!(hooks.activate("orm", 1));
        assert!(!hooks.activate("orm", 2));

        assert_eq!(*log.borrow(), ["once:1"]);
        assert_eq!(hooks.instance("orm"), Some(&1));
    }

    #[rstest]
    fn subsystems_are_independent(log: Log) {
        let mut hooks = LazyHooks::new();
        hooks.on_load("orm", recorder(&log, "orm"));
        hooks.on_load("mailer", recorder(&log, "mailer"));

        hooks.activate("mailer", 9);

        assert_eq!(*log.borrow(), ["mailer:9"]);
        assert!(!hooks.is_activated("orm"));
        assert_eq!(hooks.pending("orm"), 1);
    }

    #[rstest]
    fn nested_registration_during_activation_runs_immediately(log: Log) {
        let mut hooks = LazyHooks::new();
        let outer = Rc::clone(&log);
        let inner = Rc::clone(&log);
        hooks.on_load_with("orm", move |instance: &u32, registry| {
            outer.borrow_mut().push(format!("outer:{instance}"));
            registry.on_load("orm", move |instance| {
                inner.borrow_mut().push(format!("nested:{instance}"));
            });
        });
        hooks.on_load("orm", recorder(&log, "tail"));

        hooks.activate("orm", 5);

        assert_eq!(*log.borrow(), ["outer:5", "nested:5", "tail:5"]);
        assert_eq!(hooks.pending("orm"), 0);
    }
}
