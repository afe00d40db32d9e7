//! Deck service: ownership, limits and card mutations.
//!
//! Deck and owner reference each other (`Deck::owner`, `User::decks`). The two
//! sides are written by separate store calls in a fixed order:
//! - create: write the deck, then link it into the owner's list
//! - delete: unlink it from the owner's list, then remove the deck
//!
//! A crash between the two steps leaves a deck its owner does not list.
//! [`DeckService::reconcile`] removes such decks and any dangling references.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Result, ServiceError};
use crate::models::{validate_title, Card, Deck, DeckId, UserId, MAX_DECKS_PER_USER};
use crate::storage::Storage;

/// Answer of the permissive ownership probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owner,
    NotOwner,
    DeckNotFound,
}

/// Counts of repairs made by [`DeckService::reconcile`].
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub dangling_refs_removed: usize,
    pub orphaned_decks_removed: usize,
}

fn limit_exceeded() -> ServiceError {
    ServiceError::LimitExceeded(format!(
        "You can't exceed the limit of {MAX_DECKS_PER_USER} decks."
    ))
}

fn card_not_found() -> ServiceError {
    ServiceError::NotFound("No card was found with this card number".to_string())
}

#[derive(Clone)]
pub struct DeckService {
    storage: Arc<Storage>,
}

impl DeckService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub fn create_deck(&self, owner_id: &UserId, title: &str) -> Result<Deck> {
        validate_title(title)?;
        let owner = self
            .storage
            .get_user(owner_id)?
            .ok_or_else(ServiceError::user_not_found)?;
        if owner.decks.len() >= MAX_DECKS_PER_USER {
            return Err(limit_exceeded());
        }

        let deck = Deck::new(owner_id.clone(), title.to_string());
        self.storage.insert_deck(&deck)?;

        let linked = self.storage.update_user(owner_id, |user| {
            if user.decks.len() >= MAX_DECKS_PER_USER {
                return Err(limit_exceeded());
            }
            user.decks.push(deck.id.clone());
            Ok(())
        });

        match linked {
            Ok(Some(_)) => {
                tracing::info!(deck_id = %deck.id, owner = %owner_id, "deck created");
                Ok(deck)
            }
            Ok(None) => {
                self.storage.remove_deck(&deck.id)?;
                Err(ServiceError::user_not_found())
            }
            Err(err @ ServiceError::LimitExceeded(_)) => {
                // A concurrent create filled the last slot first.
                self.storage.remove_deck(&deck.id)?;
                Err(err)
            }
            Err(err) => {
                tracing::error!(deck_id = %deck.id, owner = %owner_id, error = %err,
                    "deck written but not linked to owner; reconcile will remove it");
                Err(err)
            }
        }
    }

    /// Decks in the order the owner's list holds them.
    pub fn list_decks_for_user(&self, user_id: &str) -> Result<Vec<Deck>> {
        let user = UserId::parse(user_id)
            .map(|id| self.storage.get_user(&id))
            .transpose()?
            .flatten()
            .ok_or_else(ServiceError::user_not_found)?;

        let mut decks = Vec::with_capacity(user.decks.len());
        for deck_id in &user.decks {
            match self.storage.get_deck(deck_id)? {
                Some(deck) => decks.push(deck),
                None => tracing::warn!(deck_id = %deck_id, user_id = %user.id, "skipping dangling deck reference"),
            }
        }
        Ok(decks)
    }

    /// Public read; no ownership check.
    pub fn get_deck(&self, deck_id: &str) -> Result<Deck> {
        let id = DeckId::parse(deck_id).ok_or_else(|| {
            ServiceError::Constraint(format!(
                "The deck Id must be {} characters long.",
                crate::models::ID_LEN
            ))
        })?;
        self.storage
            .get_deck(&id)?
            .ok_or_else(ServiceError::deck_not_found)
    }

    pub fn add_card(&self, deck_id: &str, user_id: &UserId, sides: &[String]) -> Result<Deck> {
        self.mutate_owned(deck_id, user_id, |deck| {
            let card = Card::for_insert(sides)?;
            deck.cards.push(card);
            Ok(())
        })
    }

    pub fn rename_deck(&self, deck_id: &str, user_id: &UserId, new_title: &str) -> Result<Deck> {
        self.mutate_owned(deck_id, user_id, |deck| {
            validate_title(new_title)?;
            deck.title = new_title.to_string();
            Ok(())
        })
    }

    pub fn edit_card(
        &self,
        deck_id: &str,
        user_id: &UserId,
        card_index: i64,
        sides: &[String],
    ) -> Result<Deck> {
        self.mutate_owned(deck_id, user_id, |deck| {
            let position = deck.card_position(card_index).ok_or_else(card_not_found)?;
            deck.cards[position] = Card::for_edit(sides)?;
            Ok(())
        })
    }

    pub fn remove_card(&self, deck_id: &str, user_id: &UserId, card_index: i64) -> Result<Deck> {
        self.mutate_owned(deck_id, user_id, |deck| {
            let position = deck.card_position(card_index).ok_or_else(card_not_found)?;
            deck.cards.remove(position);
            Ok(())
        })
    }

    pub fn delete_deck(&self, deck_id: &str, user_id: &UserId) -> Result<()> {
        let id = DeckId::parse(deck_id).ok_or_else(ServiceError::deck_not_found)?;
        let deck = self
            .storage
            .get_deck(&id)?
            .ok_or_else(ServiceError::deck_not_found)?;
        if !deck.is_owned_by(user_id) {
            return Err(ServiceError::unauthorized());
        }

        let unlinked = self.storage.update_user(&deck.owner, |owner| {
            owner.decks.retain(|listed| listed != &id);
            Ok(())
        })?;
        if unlinked.is_none() {
            tracing::warn!(deck_id = %id, owner = %deck.owner, "deck owner missing while deleting");
        }

        self.storage.remove_deck(&id)?;
        tracing::info!(deck_id = %id, owner = %deck.owner, "deck deleted");
        Ok(())
    }

    /// Never fails on a foreign or missing deck; only storage errors surface.
    pub fn is_owner(&self, deck_id: &str, user_id: &UserId) -> Result<Ownership> {
        let Some(id) = DeckId::parse(deck_id) else {
            return Ok(Ownership::DeckNotFound);
        };
        Ok(match self.storage.get_deck(&id)? {
            Some(deck) if deck.is_owned_by(user_id) => Ownership::Owner,
            Some(_) => Ownership::NotOwner,
            None => Ownership::DeckNotFound,
        })
    }

    /// Idempotent repair of the user/deck reference graph.
    ///
    /// Must not run concurrently with deck creation: a deck between its two
    /// writes looks orphaned.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let decks = self.storage.all_decks()?;

        let mut referenced: HashSet<DeckId> = HashSet::new();
        for user in self.storage.all_users()? {
            let valid: Vec<DeckId> = user
                .decks
                .iter()
                .filter(|deck_id| {
                    decks
                        .iter()
                        .any(|deck| &deck.id == *deck_id && deck.is_owned_by(&user.id))
                })
                .cloned()
                .collect();

            if valid.len() != user.decks.len() {
                // Counted against the list actually rewritten, which may have
                // changed since the snapshot.
                let mut removed = 0;
                self.storage.update_user(&user.id, |stored| {
                    let before = stored.decks.len();
                    stored.decks.retain(|deck_id| valid.contains(deck_id));
                    removed = before - stored.decks.len();
                    Ok(())
                })?;
                report.dangling_refs_removed += removed;
            }
            referenced.extend(valid);
        }

        for deck in &decks {
            if !referenced.contains(&deck.id) && self.storage.remove_deck(&deck.id)? {
                tracing::warn!(deck_id = %deck.id, owner = %deck.owner, "removed orphaned deck");
                report.orphaned_decks_removed += 1;
            }
        }

        Ok(report)
    }

    /// Resolve, check ownership, then validate and apply inside one atomic update.
    fn mutate_owned<F>(&self, deck_id: &str, user_id: &UserId, mut apply: F) -> Result<Deck>
    where
        F: FnMut(&mut Deck) -> Result<()>,
    {
        let id = DeckId::parse(deck_id).ok_or_else(ServiceError::deck_not_found)?;
        let deck = self
            .storage
            .update_deck(&id, |deck| {
                if !deck.is_owned_by(user_id) {
                    return Err(ServiceError::unauthorized());
                }
                apply(deck)
            })?
            .ok_or_else(ServiceError::deck_not_found)?;
        tracing::debug!(deck_id = %deck.id, version = deck.version, "deck updated");
        Ok(deck)
    }
}
