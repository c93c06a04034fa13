//! Cached checkouts, one per destination URL.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::error::{WriteError, io_err};
use crate::io::hg::{HgOptions, HgRepository};

/// A checkout shared by every write to the same URL.
///
/// The mutex serializes writes: hold the lock for the whole write.
pub type SharedRepository = Arc<Mutex<HgRepository>>;

/// Hands out one [`HgRepository`] per destination URL.
#[derive(Debug)]
pub struct RepoRegistry {
    cache_dir: PathBuf,
    hg_options: HgOptions,
    entries: Mutex<HashMap<String, SharedRepository>>,
}

impl RepoRegistry {
    pub fn new(cache_dir: impl Into<PathBuf>, hg_options: HgOptions) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            hg_options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checkout directory used for `url`.
    pub fn checkout_dir(&self, url: &str) -> PathBuf {
        self.cache_dir.join(cache_key(url))
    }

    /// The handle for `url`, created on first use.
    pub fn handle_for(&self, url: &str) -> Result<SharedRepository, WriteError> {
        let mut entries = self.lock_entries()?;
        if let Some(existing) = entries.get(url) {
            return Ok(Arc::clone(existing));
        }
        let dir = self.checkout_dir(url);
        debug!(dir = %dir.display(), "registering checkout");
        let handle = Arc::new(Mutex::new(HgRepository::new(dir, self.hg_options.clone())));
        entries.insert(url.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Forget the handle for `url` and delete its cached checkout.
    ///
    /// The next [`RepoRegistry::handle_for`] starts from an empty repository.
    #[instrument(skip_all, fields(url = %url))]
    pub fn evict(&self, url: &str) -> Result<bool, WriteError> {
        let removed = self.lock_entries()?.remove(url);
        // Wait for any in-flight write, then keep the checkout locked until it
        // is gone so a caller still holding the old handle cannot write into it.
        let guard = match &removed {
            Some(handle) => Some(
                handle
                    .lock()
                    .map_err(|_| WriteError::execution("repository lock poisoned"))?,
            ),
            None => None,
        };
        let dir = self.checkout_dir(url);
        let existed = remove_dir_if_present(&dir)?;
        drop(guard);
        if existed {
            info!(dir = %dir.display(), "evicted cached checkout");
        }
        Ok(existed || removed.is_some())
    }

    fn lock_entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SharedRepository>>, WriteError> {
        self.entries
            .lock()
            .map_err(|_| WriteError::execution("repository registry lock poisoned"))
    }
}

fn remove_dir_if_present(dir: &Path) -> Result<bool, WriteError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(dir, e)),
    }
}

/// Stable directory name for a URL.
fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(16);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::repository::RepositoryHandle;

    #[test]
    fn same_url_shares_a_handle() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = RepoRegistry::new(temp.path(), HgOptions::default());
        let a = registry.handle_for("https://hg/a").expect("a");
        let again = registry.handle_for("https://hg/a").expect("a again");
        let b = registry.handle_for("https://hg/b").expect("b");
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));

        let a_dir = a.lock().expect("lock").checkout_dir().to_path_buf();
        let b_dir = b.lock().expect("lock").checkout_dir().to_path_buf();
        assert_ne!(a_dir, b_dir);
        assert!(a_dir.starts_with(temp.path()));
    }

    #[test]
    fn cache_key_is_stable() {
        assert_eq!(cache_key("https://hg/a"), cache_key("https://hg/a"));
        assert_ne!(cache_key("https://hg/a"), cache_key("https://hg/b"));
        assert_eq!(cache_key("x").len(), 16);
    }

    #[test]
    fn evict_deletes_checkout_and_handle() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = RepoRegistry::new(temp.path(), HgOptions::default());
        let before = registry.handle_for("file:///r").expect("handle");
        let dir = registry.checkout_dir("file:///r");
        fs::create_dir_all(dir.join(".hg")).expect("mkdir");

        assert!(registry.evict("file:///r").expect("evict"));
        assert!(!dir.exists());
        let after = registry.handle_for("file:///r").expect("handle");
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn old_handle_never_sees_a_half_removed_checkout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = RepoRegistry::new(temp.path(), HgOptions::default());
        let old = registry.handle_for("file:///r").expect("handle");
        let dir = registry.checkout_dir("file:///r");
        for i in 0..64 {
            fs::create_dir_all(dir.join(format!("d{i}"))).expect("mkdir");
            fs::write(dir.join(format!("d{i}/f")), "x").expect("write");
        }

        let held = old.lock().expect("lock");
        std::thread::scope(|scope| {
            let evicting = scope.spawn(|| registry.evict("file:///r"));
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(dir.exists(), "evict must wait for the in-flight write");
            drop(held);

            // Whoever holds the old handle sees the checkout either whole or gone.
            while !evicting.is_finished() {
                if let Ok(_guard) = old.try_lock() {
                    if dir.exists() {
                        std::thread::sleep(std::time::Duration::from_millis(2));
                        assert!(dir.join("d63/f").exists(), "checkout removed under the lock");
                    }
                }
                std::thread::yield_now();
            }
            assert!(evicting.join().expect("join").expect("evict"));
        });
        assert!(!dir.exists());
    }

    #[test]
    fn evict_unknown_url_is_noop() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = RepoRegistry::new(temp.path(), HgOptions::default());
        assert!(!registry.evict("file:///never").expect("evict"));
    }
}
