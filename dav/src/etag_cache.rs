// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::types::ETag;

/// Last known entity tags of the items of one collection, owned by the host.
///
/// Keys are item URLs as returned by [`crate::DavUrl::key`]. Listing only
/// reads from the cache; updating it is up to the caller.
pub trait EtagCache: Send + Sync {
    /// Returns the known tag of an item.
    fn etag(&self, url: &str) -> Option<ETag>;

    /// Returns the URLs of every known item.
    fn urls(&self) -> Vec<String>;

    /// Returns true if the item is unknown or its tag differs from `etag`.
    fn etag_changed(&self, url: &str, etag: &ETag) -> bool {
        self.etag(url).is_none_or(|known| &known != etag)
    }
}

/// [`EtagCache`] kept in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEtagCache {
    etags: HashMap<String, ETag>,
}

impl MemoryEtagCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the tag of an item.
    pub fn set_etag(&mut self, url: impl Into<String>, etag: ETag) {
        self.etags.insert(url.into(), etag);
    }

    /// Forgets an item.
    pub fn remove(&mut self, url: &str) -> Option<ETag> {
        self.etags.remove(url)
    }

    /// Returns the number of known items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.etags.len()
    }

    /// Returns true if no item is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.etags.is_empty()
    }
}

impl EtagCache for MemoryEtagCache {
    fn etag(&self, url: &str) -> Option<ETag> {
        self.etags.get(url).cloned()
    }

    fn urls(&self) -> Vec<String> {
        self.etags.keys().cloned().collect()
    }
}

impl<K: Into<String>> FromIterator<(K, ETag)> for MemoryEtagCache {
    fn from_iter<T: IntoIterator<Item = (K, ETag)>>(iter: T) -> Self {
        Self {
            etags: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_changed_and_unknown_items() {
        let mut cache = MemoryEtagCache::new();
        cache.set_etag("https://dav.example.com/cal/a.ics", ETag::from("\"1\""));

        assert!(!cache.etag_changed("https://dav.example.com/cal/a.ics", &ETag::from("\"1\"")));
        assert!(cache.etag_changed("https://dav.example.com/cal/a.ics", &ETag::from("\"2\"")));
        assert!(cache.etag_changed("https://dav.example.com/cal/b.ics", &ETag::from("\"1\"")));
        assert_eq!(cache.len(), 1);

        assert!(cache.remove("https://dav.example.com/cal/a.ics").is_some());
        assert!(cache.is_empty());
    }
}
