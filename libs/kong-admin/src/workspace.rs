use parking_lot::RwLock;

/// Workspace selection shared by every clone of a client.
///
/// Readers take the lock once per request while composing the URL, so a
/// request that has already been composed is unaffected by a later `set`.
#[derive(Debug, Default)]
pub(crate) struct WorkspaceState {
    current: RwLock<String>,
}

impl WorkspaceState {
    pub(crate) fn new(initial: Option<&str>) -> Self {
        Self {
            current: RwLock::new(initial.map(str::trim).unwrap_or_default().to_owned()),
        }
    }

    /// Select `workspace`; the empty string returns to the default workspace.
    pub(crate) fn set(&self, workspace: &str) {
        let workspace = workspace.trim();
        let mut current = self.current.write();
        if current.as_str() != workspace {
            tracing::debug!(from = %current, to = %workspace, "switching workspace");
            workspace.clone_into(&mut current);
        }
    }

    pub(crate) fn get(&self) -> String {
        self.current.read().clone()
    }

    /// Run `f` against the current value without cloning it.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(self.current.read().as_str())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_and_reset() {
        let state = WorkspaceState::new(None);
        assert_eq!(state.get(), "");

        state.set("ws1");
        assert_eq!(state.get(), "ws1");

        state.set("");
        assert_eq!(state.get(), "");
    }

    #[test]
    fn test_initial_value_is_trimmed() {
        let state = WorkspaceState::new(Some("  team-a "));
        assert_eq!(state.get(), "team-a");
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_values() {
        let state = Arc::new(WorkspaceState::new(None));
        let allowed = ["", "alpha", "a-much-longer-workspace-name"];

        let writer = {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    state.set(allowed[i % allowed.len()]);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        state.with(|ws| assert!(allowed.contains(&ws), "torn value {ws:?}"));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
