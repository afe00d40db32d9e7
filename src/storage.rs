//! Sled-backed credential and deck stores.
//!
//! Records are stored as JSON under their id in one tree per record kind:
//! - `users`: user records
//! - `emails`: unique email -> user id index
//! - `decks`: deck records
//!
//! Updates are compare-and-swap loops over the stored bytes, so two
//! concurrent read-modify-write calls on the same record never lose a write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{abort, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use crate::error::{Result, ServiceError};
use crate::models::{Deck, DeckId, User, UserId};

/// A stored record with an optimistic-concurrency version counter.
trait Versioned: Serialize + DeserializeOwned {
    fn bump_version(&mut self);
}

impl Versioned for User {
    fn bump_version(&mut self) {
        self.version += 1;
    }
}

impl Versioned for Deck {
    fn bump_version(&mut self) {
        self.version += 1;
    }
}

#[derive(Clone)] // Sled handles are cheap to clone and thread-safe
pub struct Storage {
    db: Db,
    users: Tree,
    emails: Tree,
    decks: Tree,
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop. Used by tests and dry runs.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self> {
        let users = db.open_tree("users")?;
        let emails = db.open_tree("emails")?;
        let decks = db.open_tree("decks")?;
        Ok(Self {
            db,
            users,
            emails,
            decks,
        })
    }

    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    // --- Credential store ---

    /// Insert a new user, reserving its email in the same transaction.
    /// Fails with `Conflict` if the email is already taken.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let bytes = serde_json::to_vec(user)?;
        let email_key = user.email.as_bytes();
        let id_key = user.id.as_bytes();

        let outcome: std::result::Result<(), TransactionError<ServiceError>> =
            (&self.users, &self.emails).transaction(|(users, emails)| {
                if emails.get(email_key)?.is_some() {
                    return abort(duplicate_email());
                }
                emails.insert(email_key, id_key)?;
                users.insert(id_key, bytes.as_slice())?;
                Ok(())
            });

        match outcome {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    pub fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        read(&self.users, id.as_bytes())
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(raw_id) = self.emails.get(email.as_bytes())? else {
            return Ok(None);
        };
        let id = std::str::from_utf8(&raw_id)
            .ok()
            .and_then(UserId::parse)
            .ok_or_else(|| ServiceError::Internal(format!("corrupt email index entry for {email}")))?;
        self.get_user(&id)
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        Ok(self.emails.contains_key(email.as_bytes())?)
    }

    /// Atomically apply `apply` to the stored user. `Ok(None)` if it does not exist.
    pub fn update_user<F>(&self, id: &UserId, apply: F) -> Result<Option<User>>
    where
        F: FnMut(&mut User) -> Result<()>,
    {
        update(&self.users, id.as_bytes(), apply)
    }

    pub fn all_users(&self) -> Result<Vec<User>> {
        scan(&self.users)
    }

    // --- Deck store ---

    pub fn insert_deck(&self, deck: &Deck) -> Result<()> {
        let bytes = serde_json::to_vec(deck)?;
        self.decks.insert(deck.id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_deck(&self, id: &DeckId) -> Result<Option<Deck>> {
        read(&self.decks, id.as_bytes())
    }

    /// Atomically apply `apply` to the stored deck. `Ok(None)` if it does not exist.
    pub fn update_deck<F>(&self, id: &DeckId, apply: F) -> Result<Option<Deck>>
    where
        F: FnMut(&mut Deck) -> Result<()>,
    {
        update(&self.decks, id.as_bytes(), apply)
    }

    /// Returns whether a record was removed.
    pub fn remove_deck(&self, id: &DeckId) -> Result<bool> {
        Ok(self.decks.remove(id.as_bytes())?.is_some())
    }

    pub fn all_decks(&self) -> Result<Vec<Deck>> {
        scan(&self.decks)
    }
}

fn duplicate_email() -> ServiceError {
    ServiceError::Conflict("An account with this email already exists.".to_string())
}

fn read<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn scan<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>> {
    let mut records = vec![];
    for item in tree.iter() {
        let (_, value) = item?;
        records.push(serde_json::from_slice(&value)?);
    }
    Ok(records)
}

/// Read-modify-write closed by compare-and-swap. `apply` may run more than
/// once under contention and must not have side effects outside the record.
fn update<T, F>(tree: &Tree, key: &[u8], mut apply: F) -> Result<Option<T>>
where
    T: Versioned,
    F: FnMut(&mut T) -> Result<()>,
{
    loop {
        let Some(current) = tree.get(key)? else {
            return Ok(None);
        };
        let mut record: T = serde_json::from_slice(&current)?;
        apply(&mut record)?;
        record.bump_version();
        let next = serde_json::to_vec(&record)?;

        match tree.compare_and_swap(key, Some(current), Some(next))? {
            Ok(()) => return Ok(Some(record)),
            Err(_) => {
                tracing::debug!(key = %String::from_utf8_lossy(key), "concurrent write, retrying update");
            }
        }
    }
}
