//! Shared credential container.
//!
//! The session manager writes through the vault after a refresh and the header
//! builder reads from it on every request. Writes hit durable storage first,
//! then the in-memory copy, so readers never observe tokens that failed to
//! persist.

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;

use super::store::{StoredCredentials, TokenStore};
use crate::session::Session;

#[derive(Clone)]
pub struct TokenVault {
    store: Arc<dyn TokenStore>,
    current: Arc<RwLock<StoredCredentials>>,
}

impl TokenVault {
    /// Opens the vault, loading whatever the store currently holds.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn open(store: Arc<dyn TokenStore>) -> Result<Self> {
        let current = store.load()?;
        Ok(Self {
            store,
            current: Arc::new(RwLock::new(current)),
        })
    }

    /// Snapshot of the current token pair.
    pub fn current(&self) -> StoredCredentials {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Overwrites both slots.
    ///
    /// The write lock is held across the durable save, so concurrent writers
    /// leave storage and memory holding the same pair (last writer wins).
    ///
    /// # Errors
    /// Returns an error if durable storage rejects the write; memory is left as it was.
    pub fn replace(&self, creds: StoredCredentials) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.store.save(&creds)?;
        *current = creds;
        Ok(())
    }

    /// Persists the token pair of `session`.
    ///
    /// # Errors
    /// Returns an error if durable storage rejects the write.
    pub fn store_session(&self, session: &Session) -> Result<()> {
        self.replace(StoredCredentials::new(
            session.access_token.clone(),
            session.refresh_token.clone(),
        ))
    }

    /// # Errors
    /// Returns an error if durable storage rejects the write.
    pub fn clear(&self) -> Result<()> {
        self.replace(StoredCredentials::default())
    }
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, mpsc};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::auth::store::MemoryTokenStore;

    #[test]
    fn open_loads_existing_tokens() {
        let store = Arc::new(MemoryTokenStore::new(StoredCredentials::new("A", "R")));
        let vault = TokenVault::open(store).unwrap();
        assert_eq!(vault.current(), StoredCredentials::new("A", "R"));
    }

    #[test]
    fn store_session_writes_through() {
        let store = Arc::new(MemoryTokenStore::default());
        let vault = TokenVault::open(Arc::clone(&store) as Arc<dyn TokenStore>).unwrap();

        vault
            .store_session(&Session::new("A2", "R2", 10))
            .unwrap();

        assert_eq!(store.load().unwrap(), StoredCredentials::new("A2", "R2"));
        assert_eq!(vault.current(), StoredCredentials::new("A2", "R2"));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn clones_share_state() {
        let vault = TokenVault::open(Arc::new(MemoryTokenStore::default())).unwrap();
        let reader = vault.clone();
        vault.replace(StoredCredentials::new("A", "R")).unwrap();
        assert_eq!(reader.current().access_token.as_deref(), Some("A"));
        vault.clear().unwrap();
        assert!(reader.current().is_empty());
    }

    /// Store that parks inside `save` for one chosen access token.
    struct ParkingStore {
        inner: MemoryTokenStore,
        park_on: &'static str,
        parked: Mutex<Option<mpsc::Sender<()>>>,
        resume: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl TokenStore for ParkingStore {
        fn load(&self) -> Result<StoredCredentials> {
            self.inner.load()
        }

        fn save(&self, creds: &StoredCredentials) -> Result<()> {
            self.inner.save(creds)?;
            if creds.access_token.as_deref() == Some(self.park_on) {
                if let Some(parked) = self.parked.lock().unwrap().take() {
                    parked.send(()).unwrap();
                }
                if let Some(resume) = self.resume.lock().unwrap().take() {
                    resume.recv().unwrap();
                }
            }
            Ok(())
        }
    }

    #[test]
    fn concurrent_writers_leave_storage_and_memory_in_step() {
        let (parked_tx, parked_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let store = Arc::new(ParkingStore {
            inner: MemoryTokenStore::default(),
            park_on: "X",
            parked: Mutex::new(Some(parked_tx)),
            resume: Mutex::new(Some(resume_rx)),
        });
        let vault = TokenVault::open(Arc::clone(&store) as Arc<dyn TokenStore>).unwrap();

        let first = {
            let vault = vault.clone();
            thread::spawn(move || vault.replace(StoredCredentials::new("X", "RX")).unwrap())
        };
        parked_rx.recv().unwrap();

        let second = {
            let vault = vault.clone();
            thread::spawn(move || vault.replace(StoredCredentials::new("Y", "RY")).unwrap())
        };
        // Give the second writer time to overtake if it could.
        thread::sleep(Duration::from_millis(50));
        resume_tx.send(()).unwrap();

        first.join().unwrap();
        second.join().unwrap();

        assert_eq!(store.load().unwrap(), vault.current());
        assert_eq!(vault.current(), StoredCredentials::new("Y", "RY"));
    }
}
