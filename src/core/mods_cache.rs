use crate::models::mod_dto::ModList;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Latest library snapshot. Snapshots are never edited, only replaced.
pub struct ModsCache {
    snapshot: watch::Sender<Arc<ModList>>,
}

impl ModsCache {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(ModList::default()));
        Self { snapshot }
    }

    pub fn current(&self) -> Arc<ModList> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ModList>> {
        self.snapshot.subscribe()
    }

    /// Publishes `mods`, annotated with what changed since the previous snapshot.
    pub fn replace(&self, mods: ModList) -> Arc<ModList> {
        let mods = Arc::new(mods.with_diff(&self.current()));
        debug!(
            "New mod snapshot: {} added, {} removed.",
            mods.added.len(),
            mods.removed.len()
        );
        self.snapshot.send_replace(mods.clone());
        mods
    }
}

impl Default for ModsCache {
    fn default() -> Self {
        Self::new()
    }
}
