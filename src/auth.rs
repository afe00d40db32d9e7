use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{Result, ServiceError};
use crate::models::{char_len, Claims, User, UserId, NAME_MAX_LEN, PASSWORD_MIN_LEN};
use crate::storage::Storage;

const WRONG_CREDENTIALS: &str = "Wrong email or password.";
const MISSING_FIELDS: &str = "Please enter all required fields.";

/// HS256 signing and verification keys derived from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    pub fn sign(&self, user: &User) -> Result<String> {
        let issued_at = Utc::now();
        let claims = Claims {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> std::result::Result<Claims, jsonwebtoken::errors::Error> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(hash(password, cost)?)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    Ok(verify(password, password_hash)?)
}

/// Registration form. Missing fields deserialize as empty strings and are
/// reported together.
#[derive(Deserialize, Serialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_verify: String,
}

impl Registration {
    fn validate(&self) -> Result<()> {
        let fields = [
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.password,
            &self.password_verify,
        ];
        if fields.iter().any(|field| field.is_empty()) {
            return Err(ServiceError::Validation(MISSING_FIELDS.to_string()));
        }
        check_name_lengths(&self.first_name, &self.last_name)?;
        if char_len(&self.password) < PASSWORD_MIN_LEN {
            return Err(ServiceError::Validation(format!(
                "Please enter a password of at least {PASSWORD_MIN_LEN} characters."
            )));
        }
        if self.password != self.password_verify {
            return Err(ServiceError::Validation(
                "Please enter the same password twice.".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_name_lengths(first_name: &str, last_name: &str) -> Result<()> {
    if char_len(first_name) > NAME_MAX_LEN || char_len(last_name) > NAME_MAX_LEN {
        return Err(ServiceError::Constraint(format!(
            "First name and last name can't have more than {NAME_MAX_LEN} characters."
        )));
    }
    Ok(())
}

/// Result of the non-failing login probe.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginStatus {
    pub is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Claims>,
}

#[derive(Clone)]
pub struct AuthService {
    storage: Arc<Storage>,
    keys: TokenKeys,
    bcrypt_cost: u32,
    // Verified against when the email is unknown so both login failures cost the same.
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(storage: Arc<Storage>, keys: TokenKeys, bcrypt_cost: u32) -> Result<Self> {
        let dummy_hash = hash_password("flashdeck-timing-equalizer", bcrypt_cost)?;
        Ok(Self {
            storage,
            keys,
            bcrypt_cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Register a new account and return it with a freshly signed token.
    pub async fn register(&self, registration: Registration) -> Result<(User, String)> {
        registration.validate()?;
        if self.storage.email_taken(&registration.email)? {
            return Err(ServiceError::Conflict(
                "An account with this email already exists.".to_string(),
            ));
        }

        let cost = self.bcrypt_cost;
        let password = registration.password;
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;

        let user = User {
            id: UserId::generate(),
            first_name: registration.first_name,
            last_name: registration.last_name,
            email: registration.email,
            password_hash,
            decks: vec![],
            version: 0,
        };
        // Re-checks the email atomically; a concurrent registration loses here.
        self.storage.create_user(&user)?;
        tracing::info!(user_id = %user.id, "user registered");

        let token = self.keys.sign(&user)?;
        Ok((user, token))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::Validation(MISSING_FIELDS.to_string()));
        }

        let user = self.storage.find_user_by_email(email)?;
        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };
        let password = password.to_string();
        let password_correct =
            tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
                .await??;

        match user {
            Some(user) if password_correct => {
                tracing::info!(user_id = %user.id, "user logged in");
                self.keys.sign(&user)
            }
            _ => {
                tracing::debug!("login rejected");
                Err(ServiceError::Unauthorized(WRONG_CREDENTIALS.to_string()))
            }
        }
    }

    /// Hard authentication gate for mutating endpoints.
    pub fn validate_token(&self, token: Option<&str>) -> Result<Claims> {
        let token = token.ok_or_else(ServiceError::unauthorized)?;
        self.keys.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "token rejected");
            ServiceError::unauthorized()
        })
    }

    /// Read-only probe; an absent or invalid token is a negative result.
    pub fn check_logged_in(&self, token: Option<&str>) -> LoginStatus {
        match self.validate_token(token) {
            Ok(claims) => LoginStatus {
                is_logged_in: true,
                user: Some(claims),
            },
            Err(_) => LoginStatus {
                is_logged_in: false,
                user: None,
            },
        }
    }

    pub fn edit_profile(&self, user_id: &UserId, first_name: &str, last_name: &str) -> Result<()> {
        if first_name.is_empty() || last_name.is_empty() {
            return Err(ServiceError::Validation(
                "First name and last name can't be empty.".to_string(),
            ));
        }
        check_name_lengths(first_name, last_name)?;

        self.storage
            .update_user(user_id, |user| {
                user.first_name = first_name.to_string();
                user.last_name = last_name.to_string();
                Ok(())
            })?
            .ok_or_else(ServiceError::user_not_found)?;
        tracing::info!(user_id = %user_id, "profile updated");
        Ok(())
    }
}
