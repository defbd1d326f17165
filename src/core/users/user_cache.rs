// Bounded user record cache.
//
// Look-aside only: the cache never fetches anything itself. Callers check
// it, fetch from the host on a miss and put the result back.

use crate::core::moderation::UserSnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;

pub const DEFAULT_CAPACITY: usize = 50;

struct CachedUser {
    user: UserSnapshot,
    /// Logical clock value of the last read or write.
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedUser>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Least-recently-used cache of user snapshots keyed by user id.
///
/// One mutex guards both the map and the recency clock. Every operation is
/// a handful of map accesses, and no caller holds the lock across I/O.
pub struct UserRecordCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl UserRecordCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached copy of a user, marking it most recently used.
    pub fn get(&self, user_id: &str) -> Option<UserSnapshot> {
        let mut state = self.state.lock();
        let now = state.tick();
        state.entries.get_mut(user_id).map(|entry| {
            entry.last_used = now;
            entry.user.clone()
        })
    }

    /// Insert or replace. Inserting a new id into a full cache evicts the
    /// entry that has gone longest without being read or written.
    pub fn put(&self, user_id: &str, user: &UserSnapshot) {
        let mut state = self.state.lock();
        let now = state.tick();

        if let Some(entry) = state.entries.get_mut(user_id) {
            entry.user = user.clone();
            entry.last_used = now;
            return;
        }

        if state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                tracing::trace!(user_id = %oldest, "Evicted user from cache");
            }
        }

        state.entries.insert(
            user_id.to_string(),
            CachedUser {
                user: user.clone(),
                last_used: now,
            },
        );
    }

    /// Drop a user so a stale snapshot is never served again.
    pub fn remove(&self, user_id: &str) -> Option<UserSnapshot> {
        self.state
            .lock()
            .entries
            .remove(user_id)
            .map(|entry| entry.user)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UserRecordCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn user(id: &str) -> UserSnapshot {
        UserSnapshot {
            id: id.to_string(),
            username: format!("user-{id}"),
            nickname: String::new(),
            email: format!("{id}@example.com"),
            created_at: Utc::now(),
            deleted_at: None,
            roles: "system_user".to_string(),
        }
    }

    #[test]
    fn default_capacity_is_fifty() {
        let cache = UserRecordCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
        assert!(cache.is_empty());
    }

    #[test]
    fn get_miss_then_hit() {
        let cache = UserRecordCache::new(2);
        assert!(cache.get("a").is_none());

        cache.put("a", &user("a"));
        assert_eq!(cache.get("a").unwrap().username, "user-a");
    }

    #[test]
    fn put_replaces_existing_entry() {
        let cache = UserRecordCache::new(2);
        cache.put("a", &user("a"));

        let mut renamed = user("a");
        renamed.username = "renamed".into();
        cache.put("a", &renamed);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().username, "renamed");
    }

    #[test]
    fn cached_copy_is_isolated_from_caller() {
        let cache = UserRecordCache::new(2);
        let mut original = user("a");
        cache.put("a", &original);

        original.username = "mutated".into();
        let mut fetched = cache.get("a").unwrap();
        fetched.email = "mutated@example.com".into();

        let cached = cache.get("a").unwrap();
        assert_eq!(cached.username, "user-a");
        assert_eq!(cached.email, "a@example.com");
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = UserRecordCache::new(3);
        cache.put("a", &user("a"));
        cache.put("b", &user("b"));
        cache.put("c", &user("c"));

        cache.put("d", &user("d"));

        assert_eq!(cache.len(), 3);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
    }

    #[test]
    fn access_protects_entry_from_next_eviction() {
        let cache = UserRecordCache::new(3);
        cache.put("a", &user("a"));
        cache.put("b", &user("b"));
        cache.put("c", &user("c"));

        // "a" becomes most recent, so "b" is now the oldest
        assert!(cache.get("a").is_some());
        cache.put("d", &user("d"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());

        // Updating counts as use too
        cache.put("c", &user("c"));
        cache.put("e", &user("e"));
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_none());
    }

    #[test]
    fn remove_invalidates_entry() {
        let cache = UserRecordCache::new(3);
        cache.put("a", &user("a"));

        assert!(cache.remove("a").is_some());
        assert!(cache.get("a").is_none());
        assert!(cache.remove("a").is_none());
    }

    #[test]
    fn concurrent_access_never_exceeds_capacity() {
        let cache = Arc::new(UserRecordCache::new(10));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for i in 0..500 {
                        let id = format!("{}", (worker * 7 + i) % 40);
                        cache.put(&id, &user(&id));
                        if let Some(found) = cache.get(&id) {
                            assert_eq!(found.id, id);
                        }
                        if i % 11 == 0 {
                            cache.remove(&id);
                        }
                        assert!(cache.len() <= 10);
                    }
                });
            }
        });

        assert!(cache.len() <= 10);
        // Every surviving entry is intact
        for i in 0..40 {
            let id = i.to_string();
            if let Some(found) = cache.get(&id) {
                assert_eq!(found.username, format!("user-{id}"));
            }
        }
    }
}
