use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    /// A thread panicked while holding the lock, so the contents can no longer be trusted.
    #[error("store unavailable; lock poisoned")]
    Unavailable,
}

/// The Store is responsible for managing key-value pairs. Keys and values are opaque byte
/// sequences. The store is designed to be thread-safe, allowing it to be shared and cloned cheaply
/// using reference counting.
///
/// Every operation takes the single store lock for its whole duration, so each one is atomic with
/// respect to the others. No reference into the map escapes the lock.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

struct InnerStore {
    state: Mutex<State>,
}

struct State {
    keys: HashMap<Key, Bytes>,
}

type Key = Bytes;

impl Store {
    pub fn new() -> Store {
        let state = State {
            keys: HashMap::new(),
        };

        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
        });

        Self { inner }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, Error> {
        self.inner.state.lock().map_err(|_| Error::Unavailable)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Error> {
        Ok(self.lock()?.keys.get(key).cloned())
    }

    pub fn set(&self, key: Key, value: Bytes) -> Result<(), Error> {
        self.lock()?.keys.insert(key, value);
        Ok(())
    }

    /// Removes `key`, returning whether it was present.
    pub fn delete(&self, key: &[u8]) -> Result<bool, Error> {
        Ok(self.lock()?.keys.remove(key).is_some())
    }

    /// Moves the value stored at `key` to `new_key`, overwriting whatever `new_key` held. Returns
    /// `false` and leaves the store untouched when `key` does not exist.
    pub fn rename(&self, key: &[u8], new_key: Key) -> Result<bool, Error> {
        let mut state = self.lock()?;

        match state.keys.remove(key) {
            Some(value) => {
                state.keys.insert(new_key, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A point-in-time snapshot of every key, in no particular order.
    pub fn keys(&self) -> Result<Vec<Key>, Error> {
        Ok(self.lock()?.keys.keys().cloned().collect())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn set_get_and_overwrite() {
        let store = Store::new();

        assert_eq!(store.get(b"foo").unwrap(), None);

        store.set(Bytes::from("foo"), Bytes::from("bar")).unwrap();
        assert_eq!(store.get(b"foo").unwrap(), Some(Bytes::from("bar")));

        store.set(Bytes::from("foo"), Bytes::from("baz")).unwrap();
        assert_eq!(store.get(b"foo").unwrap(), Some(Bytes::from("baz")));
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn binary_keys() {
        let store = Store::new();
        let key = Bytes::from_static(b"\x00\xff\r\n");

        store.set(key.clone(), Bytes::from("v")).unwrap();

        assert_eq!(store.get(&key).unwrap(), Some(Bytes::from("v")));
        assert_eq!(store.keys().unwrap(), vec![key]);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = Store::new();
        store.set(Bytes::from("other"), Bytes::from("1")).unwrap();

        assert!(!store.delete(b"foo").unwrap());
        assert!(!store.delete(b"foo").unwrap());
        assert_eq!(store.keys().unwrap(), vec![Bytes::from("other")]);

        store.set(Bytes::from("foo"), Bytes::from("bar")).unwrap();
        assert!(store.delete(b"foo").unwrap());
        assert!(!store.delete(b"foo").unwrap());
        assert_eq!(store.get(b"foo").unwrap(), None);
    }

    #[test]
    fn rename_moves_the_value() {
        let store = Store::new();
        store.set(Bytes::from("foo"), Bytes::from("bar")).unwrap();

        assert!(store.rename(b"foo", Bytes::from("baz")).unwrap());

        assert_eq!(store.get(b"foo").unwrap(), None);
        assert_eq!(store.get(b"baz").unwrap(), Some(Bytes::from("bar")));
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn rename_overwrites_destination() {
        let store = Store::new();
        store.set(Bytes::from("foo"), Bytes::from("1")).unwrap();
        store.set(Bytes::from("baz"), Bytes::from("2")).unwrap();

        assert!(store.rename(b"foo", Bytes::from("baz")).unwrap());

        assert_eq!(store.get(b"baz").unwrap(), Some(Bytes::from("1")));
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn rename_missing_key() {
        let store = Store::new();
        store.set(Bytes::from("baz"), Bytes::from("2")).unwrap();

        assert!(!store.rename(b"foo", Bytes::from("baz")).unwrap());

        assert_eq!(store.get(b"baz").unwrap(), Some(Bytes::from("2")));
    }

    #[test]
    fn rename_to_itself() {
        let store = Store::new();
        store.set(Bytes::from("foo"), Bytes::from("bar")).unwrap();

        assert!(store.rename(b"foo", Bytes::from("foo")).unwrap());

        assert_eq!(store.get(b"foo").unwrap(), Some(Bytes::from("bar")));
    }

    #[test]
    fn concurrent_sets_leave_one_of_the_values() {
        let store = Store::new();
        let values: Vec<Bytes> = (0..16)
            .map(|i| Bytes::from(format!("value-{i}-").repeat(64)))
            .collect();

        let handles: Vec<_> = values
            .iter()
            .cloned()
            .map(|value| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.set(Bytes::from("key"), value.clone()).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let value = store.get(b"key").unwrap().unwrap();
        assert!(values.contains(&value));
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_renames_are_never_observed_half_applied() {
        let store = Store::new();
        store.set(Bytes::from("a"), Bytes::from("value")).unwrap();

        let done = Arc::new(AtomicBool::new(false));

        let renamer = {
            let store = store.clone();
            let done = done.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    // One of the two renames succeeds depending on where the value currently is.
                    let moved = store.rename(b"a", Bytes::from("b")).unwrap()
                        || store.rename(b"b", Bytes::from("a")).unwrap();
                    assert!(moved);
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            let keys = store.keys().unwrap();
            assert_eq!(keys.len(), 1, "observed keys: {:?}", keys);
        }

        renamer.join().unwrap();
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn keys_is_a_snapshot() {
        let store = Store::new();
        store.set(Bytes::from("foo"), Bytes::from("1")).unwrap();
        store.set(Bytes::from("bar"), Bytes::from("2")).unwrap();

        let mut keys = store.keys().unwrap();
        store.delete(b"foo").unwrap();
        store.set(Bytes::from("baz"), Bytes::from("3")).unwrap();

        keys.sort();
        assert_eq!(keys, vec![Bytes::from("bar"), Bytes::from("foo")]);
    }

    #[test]
    fn poisoned_lock_makes_store_unavailable() {
        let store = Store::new();

        let poisoner = store.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the store lock");
        })
        .join();

        assert_eq!(store.get(b"foo"), Err(Error::Unavailable));
        assert_eq!(
            store.set(Bytes::from("foo"), Bytes::from("bar")),
            Err(Error::Unavailable)
        );
    }
}
