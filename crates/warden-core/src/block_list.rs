use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared, live set of blocked package identifiers
///
/// Cloning yields another handle to the same set. Writers (IPC, settings
/// reload) replace the contents; the engine reads through the handle on every
/// lookup, so changes apply to the very next event.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl BlockList {
    #[must_use]
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = Self::default();
        list.replace(packages);
        list
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<String>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            log::warn!("BlockList: lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<String>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            log::warn!("BlockList: lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    #[must_use]
    pub fn contains(&self, package: &str) -> bool {
        self.read().contains(package)
    }

    /// Replace the whole set, returning the new size. Blank entries are dropped.
    pub fn replace<I, S>(&self, packages: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: HashSet<String> = packages
            .into_iter()
            .map(Into::into)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let mut guard = self.write();
        *guard = next;
        guard.len()
    }

    /// Sorted copy of the current contents
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        let mut packages: Vec<String> = self.read().iter().cloned().collect();
        packages.sort();
        packages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
