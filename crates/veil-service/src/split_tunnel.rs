// ── Split tunneling ──
//
// Maintains the set of apps excluded from the tunnel. The notifier
// publishes `Some(sorted apps)` while split tunneling is enabled and
// `None` while disabled. Persistence goes through the `ExclusionStore`
// trait; the on-disk format belongs to the embedder.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use veil_sync::EventNotifier;

/// Storage for the excluded-apps preference.
pub trait ExclusionStore: Send + Sync {
    fn load_enabled(&self) -> io::Result<bool>;
    fn load_apps(&self) -> io::Result<Vec<String>>;
    fn persist_enabled(&self, enabled: bool) -> io::Result<()>;
    fn persist_apps(&self, apps: &[String]) -> io::Result<()>;
}

/// File-backed store: one app per line, plus a flag file.
pub struct FileExclusionStore {
    apps_file: PathBuf,
    enabled_file: PathBuf,
}

impl FileExclusionStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            apps_file: directory.join("excluded-apps.txt"),
            enabled_file: directory.join("split-tunneling-enabled"),
        }
    }
}

impl ExclusionStore for FileExclusionStore {
    fn load_enabled(&self) -> io::Result<bool> {
        match fs::read_to_string(&self.enabled_file) {
            Ok(contents) => Ok(contents.trim() == "true"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn load_apps(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(&self.apps_file) {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn persist_enabled(&self, enabled: bool) -> io::Result<()> {
        fs::write(&self.enabled_file, if enabled { "true" } else { "false" })
    }

    fn persist_apps(&self, apps: &[String]) -> io::Result<()> {
        fs::write(&self.apps_file, apps.join("\n"))
    }
}

struct State {
    excluded: BTreeSet<String>,
    enabled: bool,
}

/// Authoritative cache for the excluded-apps set.
pub struct SplitTunneling {
    state: Mutex<State>,
    on_change: Arc<EventNotifier<Option<Vec<String>>>>,
    store: Arc<dyn ExclusionStore>,
}

impl SplitTunneling {
    pub fn new(store: Arc<dyn ExclusionStore>) -> Self {
        let enabled = store.load_enabled().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load split tunneling flag");
            false
        });
        let excluded: BTreeSet<String> = store
            .load_apps()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to load excluded apps");
                Vec::new()
            })
            .into_iter()
            .collect();

        let this = Self {
            state: Mutex::new(State { excluded, enabled }),
            on_change: Arc::new(EventNotifier::new(None)),
            store,
        };
        this.publish(&this.lock());
        this
    }

    pub fn on_change(&self) -> Arc<EventNotifier<Option<Vec<String>>>> {
        Arc::clone(&self.on_change)
    }

    pub fn is_app_excluded(&self, app: &str) -> bool {
        self.lock().excluded.contains(app)
    }

    pub fn exclude_app(&self, app: String) {
        let mut state = self.lock();
        state.excluded.insert(app);
        self.publish(&state);
    }

    pub fn include_app(&self, app: &str) {
        let mut state = self.lock();
        state.excluded.remove(app);
        self.publish(&state);
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.enabled = enabled;
        if let Err(e) = self.store.persist_enabled(enabled) {
            warn!(error = %e, "failed to persist split tunneling flag");
        }
        self.publish(&state);
    }

    /// Write the current app list through the store.
    pub fn persist(&self) {
        let apps = self.app_list(&self.lock());
        if let Err(e) = self.store.persist_apps(&apps) {
            warn!(error = %e, "failed to persist excluded apps");
        }
    }

    pub fn shutdown(&self) {
        self.on_change.unsubscribe_all();
    }

    fn publish(&self, state: &State) {
        if state.enabled {
            self.on_change.notify(Some(self.app_list(state)));
        } else {
            self.on_change.notify(None);
        }
    }

    fn app_list(&self, state: &State) -> Vec<String> {
        state.excluded.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn in_memory() -> Arc<dyn ExclusionStore> {
        let dir = tempfile::tempdir().unwrap();
        // Leak the tempdir so the files outlive the store in the test.
        let path = dir.keep();
        Arc::new(FileExclusionStore::new(path))
    }

    #[test]
    fn disabled_split_tunneling_publishes_none() {
        let tunneling = SplitTunneling::new(in_memory());
        tunneling.exclude_app("org.example.app".into());

        assert_eq!(tunneling.on_change().latest(), None);
    }

    #[test]
    fn enabled_split_tunneling_publishes_the_sorted_list() {
        let tunneling = SplitTunneling::new(in_memory());
        tunneling.set_enabled(true);
        tunneling.exclude_app("org.zeta".into());
        tunneling.exclude_app("org.alpha".into());

        assert_eq!(
            tunneling.on_change().latest(),
            Some(vec!["org.alpha".into(), "org.zeta".into()])
        );
        assert!(tunneling.is_app_excluded("org.zeta"));

        tunneling.include_app("org.zeta");
        assert_eq!(
            tunneling.on_change().latest(),
            Some(vec!["org.alpha".into()])
        );
    }

    #[test]
    fn persisted_state_survives_a_reload() {
        let store = in_memory();

        let tunneling = SplitTunneling::new(Arc::clone(&store));
        tunneling.set_enabled(true);
        tunneling.exclude_app("org.example.app".into());
        tunneling.persist();

        let reloaded = SplitTunneling::new(store);
        assert!(reloaded.is_app_excluded("org.example.app"));
        assert_eq!(
            reloaded.on_change().latest(),
            Some(vec!["org.example.app".into()])
        );
    }
}
