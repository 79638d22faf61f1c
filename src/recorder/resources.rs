//! Release hooks for everything a session acquires.
//!
//! Each acquired track or opened processing context registers exactly one hook
//! the moment it exists. Teardown drains the list once, newest first, so a
//! resource is released exactly once no matter which stage produced it.

use tracing::{debug, warn};

use crate::media::MediaTrack;

struct ReleaseHook {
    label: String,
    release: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
pub struct SessionResources {
    hooks: Vec<ReleaseHook>,
}

impl SessionResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arbitrary release action.
    pub fn push<F>(&mut self, label: impl Into<String>, release: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let label = label.into();
        debug!("Registered release hook: {}", label);
        self.hooks.push(ReleaseHook {
            label,
            release: Box::new(release),
        });
    }

    /// Take over a live track: it will be stopped at teardown.
    pub fn adopt_track(&mut self, track: &MediaTrack) {
        let owned = track.clone();
        self.push(
            format!("{:?} track '{}'", track.kind(), track.label()),
            move || owned.stop(),
        );
    }

    /// Run every pending hook, newest first. Returns how many ran.
    pub fn release_all(&mut self) -> usize {
        let count = self.hooks.len();
        while let Some(hook) = self.hooks.pop() {
            debug!("Releasing {}", hook.label);
            (hook.release)();
        }
        count
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        if !self.hooks.is_empty() {
            warn!(
                "Dropping session resources with {} unreleased hook(s), releasing now",
                self.hooks.len()
            );
            self.release_all();
        }
    }
}
