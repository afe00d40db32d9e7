use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{Result, ServiceError};

pub const NAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const TITLE_MAX_LEN: usize = 30;
pub const CARD_SIDE_MAX_LEN: usize = 30;
pub const MAX_DECKS_PER_USER: usize = 10;

/// Length of every canonical record id (simple-form UUID).
pub const ID_LEN: usize = 32;

/// Length in characters, not bytes.
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, ToSchema)]
        pub struct $name(String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// Accepts only the canonical form: 32 lowercase hex digits.
            pub fn parse(raw: &str) -> Option<Self> {
                let canonical = raw.len() == ID_LEN
                    && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
                canonical.then(|| Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a registered user.
    UserId
);
record_id!(
    /// Identifier of a deck.
    DeckId
);

/// Stored user record. Never serialized to clients: it carries the hash.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub decks: Vec<DeckId>,
    #[serde(default)]
    pub version: u64,
}

/// One flashcard: `[front, back]` on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Card(pub String, pub String);

impl Card {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Card(front.into(), back.into())
    }

    pub fn front(&self) -> &str {
        &self.0
    }

    pub fn back(&self) -> &str {
        &self.1
    }

    /// Rules for a card being added: two sides, neither empty, neither too long.
    pub fn for_insert(sides: &[String]) -> Result<Self> {
        let card = Self::from_pair(sides, "At least 2 text inputs must be given to add a card.")?;
        if card.front().is_empty() || card.back().is_empty() {
            return Err(ServiceError::Constraint("Card sides can't be empty.".to_string()));
        }
        card.check_side_lengths()?;
        Ok(card)
    }

    /// Rules for replacing an existing card. Only the length limit applies;
    /// empty sides are accepted here.
    pub fn for_edit(sides: &[String]) -> Result<Self> {
        let card = Self::from_pair(sides, "2 text inputs must be given to edit a card.")?;
        card.check_side_lengths()?;
        Ok(card)
    }

    fn from_pair(sides: &[String], message: &str) -> Result<Self> {
        match sides {
            [front, back] => Ok(Card(front.clone(), back.clone())),
            _ => Err(ServiceError::Constraint(message.to_string())),
        }
    }

    fn check_side_lengths(&self) -> Result<()> {
        if char_len(self.front()) > CARD_SIDE_MAX_LEN || char_len(self.back()) > CARD_SIDE_MAX_LEN {
            return Err(ServiceError::Constraint(format!(
                "Card sides can't have more than {CARD_SIDE_MAX_LEN} characters."
            )));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Deck {
    pub id: DeckId,
    pub title: String,
    #[schema(value_type = Vec<Vec<String>>)]
    pub cards: Vec<Card>,
    pub owner: UserId,
    #[serde(default)]
    pub version: u64,
}

impl Deck {
    pub fn new(owner: UserId, title: String) -> Self {
        Deck {
            id: DeckId::generate(),
            title,
            cards: vec![],
            owner,
            version: 0,
        }
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner == user
    }

    /// Returns the position for `index` if it addresses an existing card.
    pub fn card_position(&self, index: i64) -> Option<usize> {
        usize::try_from(index).ok().filter(|pos| *pos < self.cards.len())
    }
}

/// Deck titles are 1 to 30 characters; whitespace counts.
pub fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(ServiceError::Constraint("Title can't be empty.".to_string()));
    }
    if char_len(title) > TITLE_MAX_LEN {
        return Err(ServiceError::Constraint(format!(
            "Title can't have more than {TITLE_MAX_LEN} characters."
        )));
    }
    Ok(())
}

/// Claims embedded in every issued token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}
