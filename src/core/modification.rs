use crate::models::mod_info::ModId;
use crate::models::modification::ModModificationState;
use std::collections::HashMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

/// Tells listeners that the on-disk library changed and should be rescanned.
#[derive(Clone)]
pub struct ReloadTrigger {
    sender: broadcast::Sender<String>,
}

impl ReloadTrigger {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    pub fn trigger(&self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("Reload triggered: {reason}");
        // No receivers is fine: nobody is displaying the library.
        let _ = self.sender.send(reason);
    }
}

impl Default for ReloadTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-mod "what is happening right now" flags, observable by a UI.
pub struct ModificationTracker {
    states: watch::Sender<HashMap<ModId, ModModificationState>>,
    reload: ReloadTrigger,
}

/// Marks mods as being modified until dropped, then returns them to `Ready`
/// and fires a reload. Dropping also happens on early return and unwinding.
#[must_use = "the mods return to Ready as soon as the scope is dropped"]
pub struct ModificationScope<'a> {
    tracker: &'a ModificationTracker,
    mod_ids: Vec<ModId>,
    reason: String,
}

impl ModificationTracker {
    pub fn new(reload: ReloadTrigger) -> Self {
        let (states, _) = watch::channel(HashMap::new());
        Self { states, reload }
    }

    pub fn reload_trigger(&self) -> &ReloadTrigger {
        &self.reload
    }

    pub fn subscribe(&self) -> watch::Receiver<HashMap<ModId, ModModificationState>> {
        self.states.subscribe()
    }

    pub fn state_of(&self, mod_id: &str) -> ModModificationState {
        self.states
            .borrow()
            .get(mod_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn begin(
        &self,
        mod_ids: impl IntoIterator<Item = ModId>,
        state: ModModificationState,
        reason: impl Into<String>,
    ) -> ModificationScope<'_> {
        let mod_ids: Vec<ModId> = mod_ids.into_iter().collect();
        self.states.send_modify(|states| {
            for id in &mod_ids {
                states.insert(id.clone(), state);
            }
        });
        trace!("{mod_ids:?} -> {state:?}");

        ModificationScope {
            tracker: self,
            mod_ids,
            reason: reason.into(),
        }
    }
}

impl ModificationScope<'_> {
    /// Moves the scoped mods on to the next phase of the operation.
    pub fn set(&self, state: ModModificationState) {
        self.tracker.states.send_modify(|states| {
            for id in &self.mod_ids {
                states.insert(id.clone(), state);
            }
        });
        trace!("{:?} -> {state:?}", self.mod_ids);
    }
}

impl Drop for ModificationScope<'_> {
    fn drop(&mut self) {
        self.tracker.states.send_modify(|states| {
            for id in &self.mod_ids {
                states.remove(id);
            }
        });
        trace!("{:?} -> Ready", self.mod_ids);
        self.tracker.reload.trigger(std::mem::take(&mut self.reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_resets_state_and_triggers_reload() {
        let reload = ReloadTrigger::new();
        let mut events = reload.subscribe();
        let tracker = ModificationTracker::new(reload);

        {
            let _scope = tracker.begin(
                ["foo".to_string()],
                ModModificationState::DisablingVariants,
                "disable foo",
            );
            assert_eq!(tracker.state_of("foo"), ModModificationState::DisablingVariants);
        }

        assert_eq!(tracker.state_of("foo"), ModModificationState::Ready);
        assert_eq!(events.try_recv().unwrap(), "disable foo");
    }

    #[test]
    fn test_scope_resets_state_on_panic() {
        let tracker = ModificationTracker::new(ReloadTrigger::new());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = tracker.begin(
                ["foo".to_string()],
                ModModificationState::DeletingVariants,
                "delete foo",
            );
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(tracker.state_of("foo"), ModModificationState::Ready);
    }
}
