//! Session & Authorization (§4.6): registered-identity access/refresh
//! tokens with family-rotation revocation, anonymous session tokens
//! bound to a client fingerprint, and the per-game authorization rule
//! that derives a [`Role`] from an [`Identity`].
//!
//! Issuing a registered identity's *first* access/refresh pair (i.e.
//! login/registration against a user database) is out of scope; this
//! module only mints and rotates tokens for an identity the caller
//! already has (e.g. handed to it by an external auth service) and
//! validates everything presented at the transport boundary.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

const ACCESS_TTL: ChronoDuration = ChronoDuration::minutes(15);
const REFRESH_TTL: ChronoDuration = ChronoDuration::days(30);
const ANONYMOUS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Expired,
    BadSignature,
    FingerprintMismatch,
    SessionNotFound,
    FamilyRevoked,
    RefreshReuseDetected,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "token expired"),
            Self::BadSignature => write!(f, "invalid token signature"),
            Self::FingerprintMismatch => write!(f, "client fingerprint mismatch"),
            Self::SessionNotFound => write!(f, "session not found"),
            Self::FamilyRevoked => write!(f, "refresh token family revoked"),
            Self::RefreshReuseDetected => write!(f, "retired refresh token reused"),
        }
    }
}

impl std::error::Error for SessionError {}

/// `SHA-256(userAgent || acceptLanguage || remoteAddress)`, hex-encoded.
pub fn fingerprint(user_agent: &str, accept_language: &str, remote_address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(accept_language.as_bytes());
    hasher.update(remote_address.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// The authenticated party behind a request, resolved from whichever
/// token it presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Registered(String),
    Anonymous(Uuid),
}

/// What an [`Identity`] is allowed to see/do for one game, per §4.6's
/// authorization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player(crate::model::ChessColor),
    Spectator,
}

/// `whitePlayer.id == identity` or `blackPlayer.id == identity` makes
/// this identity a player in the game; everyone else is a spectator.
pub fn authorize(identity: &Identity, white_id: Option<&str>, black_id: Option<&str>) -> Role {
    let Identity::Registered(id) = identity else {
        return Role::Spectator;
    };
    if white_id == Some(id.as_str()) {
        Role::Player(crate::model::ChessColor::WHITE)
    } else if black_id == Some(id.as_str()) {
        Role::Player(crate::model::ChessColor::BLACK)
    } else {
        Role::Spectator
    }
}

/// Discriminant carried in every claims struct's `typ` field so tokens
/// of one kind can never be decoded as another, even where their JSON
/// shapes happen to overlap. `jsonwebtoken::decode` only validates
/// signature and expiry — it has no notion of which Rust type it was
/// asked to decode into, so the discriminant has to be checked
/// explicitly by each `validate_*`/`rotate` caller.
const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";
const TOKEN_TYPE_ANONYMOUS: &str = "anonymous";

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    typ: String,
    sub: String,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    typ: String,
    sub: String,
    family: Uuid,
    generation: u32,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnonymousClaims {
    typ: String,
    session: Uuid,
    fp: String,
    exp: i64,
}

struct AnonymousSession {
    fingerprint: String,
    last_activity: chrono::DateTime<Utc>,
}

/// Tracks the live generation counter for a refresh-token family, so
/// that presenting an already-rotated-past token can be recognized as
/// reuse and revoke the whole family rather than just rejecting it.
struct FamilyState {
    current_generation: u32,
}

pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Process-wide signer/validator for every token kind this server
/// issues. Anonymous sessions are also tracked here so validation can
/// confirm Live-Store-style existence and bump `lastActivity`.
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    anonymous_sessions: RwLock<HashMap<Uuid, AnonymousSession>>,
    families: RwLock<HashMap<Uuid, FamilyState>>,
    revoked_families: RwLock<HashSet<Uuid>>,
}

impl SessionManager {
    pub fn new(hmac_secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            encoding_key: EncodingKey::from_secret(hmac_secret),
            decoding_key: DecodingKey::from_secret(hmac_secret),
            validation,
            anonymous_sessions: RwLock::new(HashMap::new()),
            families: RwLock::new(HashMap::new()),
            revoked_families: RwLock::new(HashSet::new()),
        }
    }

    fn sign<T: Serialize>(&self, claims: &T) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).expect("HS256 signing never fails")
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Result<T, SessionError> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::BadSignature,
            })
    }

    /// Mint a fresh access/refresh pair starting a brand new rotation
    /// family for `user_id`. Subsequent rotations go through
    /// [`Self::rotate`].
    pub async fn issue(&self, user_id: &str) -> TokenPair {
        let family = Uuid::new_v4();
        self.families.write().await.insert(family, FamilyState { current_generation: 0 });
        TokenPair {
            access: self.sign_access(user_id),
            refresh: self.sign_refresh(user_id, family, 0),
        }
    }

    fn sign_access(&self, user_id: &str) -> String {
        let now = Utc::now();
        self.sign(&AccessClaims {
            typ: TOKEN_TYPE_ACCESS.to_string(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ACCESS_TTL).timestamp(),
        })
    }

    fn sign_refresh(&self, user_id: &str, family: Uuid, generation: u32) -> String {
        self.sign(&RefreshClaims {
            typ: TOKEN_TYPE_REFRESH.to_string(),
            sub: user_id.to_string(),
            family,
            generation,
            exp: (Utc::now() + REFRESH_TTL).timestamp(),
        })
    }

    /// Validate a registered identity's access token, returning the
    /// user id it carries. Rejects a well-signed, unexpired token that
    /// isn't actually an access token (e.g. a refresh token presented
    /// here instead) via the `typ` discriminant.
    pub fn validate_access(&self, token: &str) -> Result<String, SessionError> {
        let claims = self.decode::<AccessClaims>(token)?;
        if claims.typ != TOKEN_TYPE_ACCESS {
            return Err(SessionError::BadSignature);
        }
        Ok(claims.sub)
    }

    /// Rotate a refresh token: if it names a generation older than the
    /// family's current one, that is reuse of a retired token and the
    /// whole family is revoked on the spot.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, SessionError> {
        let claims = self.decode::<RefreshClaims>(refresh_token)?;
        if claims.typ != TOKEN_TYPE_REFRESH {
            return Err(SessionError::BadSignature);
        }

        if self.revoked_families.read().await.contains(&claims.family) {
            return Err(SessionError::FamilyRevoked);
        }

        let mut families = self.families.write().await;
        let Some(state) = families.get_mut(&claims.family) else {
            return Err(SessionError::FamilyRevoked);
        };

        if claims.generation != state.current_generation {
            families.remove(&claims.family);
            drop(families);
            self.revoked_families.write().await.insert(claims.family);
            return Err(SessionError::RefreshReuseDetected);
        }

        state.current_generation += 1;
        let next_generation = state.current_generation;
        drop(families);

        Ok(TokenPair {
            access: self.sign_access(&claims.sub),
            refresh: self.sign_refresh(&claims.sub, claims.family, next_generation),
        })
    }

    /// Generate a new anonymous session, register it with a 24h TTL
    /// tracked by `last_activity`, and sign its binding token.
    pub async fn create_anonymous_session(&self, client_fingerprint: &str) -> (Uuid, String) {
        let session = Uuid::new_v4();
        self.anonymous_sessions.write().await.insert(
            session,
            AnonymousSession {
                fingerprint: client_fingerprint.to_string(),
                last_activity: Utc::now(),
            },
        );
        let token = self.sign(&AnonymousClaims {
            typ: TOKEN_TYPE_ANONYMOUS.to_string(),
            session,
            fp: client_fingerprint.to_string(),
            exp: (Utc::now() + ChronoDuration::from_std(ANONYMOUS_TTL).expect("fits")).timestamp(),
        });
        (session, token)
    }

    /// Validate an anonymous session token: signature, expiry,
    /// fingerprint match, and live existence in the session table. On
    /// success, bumps `lastActivity` and returns the session id.
    pub async fn validate_anonymous(&self, token: &str, client_fingerprint: &str) -> Result<Uuid, SessionError> {
        let claims = self.decode::<AnonymousClaims>(token)?;
        if claims.typ != TOKEN_TYPE_ANONYMOUS {
            return Err(SessionError::BadSignature);
        }
        if claims.fp != client_fingerprint {
            return Err(SessionError::FingerprintMismatch);
        }

        let mut sessions = self.anonymous_sessions.write().await;
        let Some(entry) = sessions.get_mut(&claims.session) else {
            return Err(SessionError::SessionNotFound);
        };
        if entry.fingerprint != client_fingerprint {
            return Err(SessionError::FingerprintMismatch);
        }
        entry.last_activity = Utc::now();
        Ok(claims.session)
    }

    /// Drop anonymous sessions idle for longer than the TTL. Intended
    /// to be called periodically alongside the Live Store sweep.
    pub async fn sweep_idle_anonymous_sessions(&self) -> usize {
        let cutoff = Utc::now() - ChronoDuration::from_std(ANONYMOUS_TTL).expect("fits");
        let mut sessions = self.anonymous_sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_activity > cutoff);
        before - sessions.len()
    }
}

pub type SharedSessionManager = Arc<SessionManager>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_and_order_sensitive() {
        let a = fingerprint("agent", "en-US", "127.0.0.1");
        let b = fingerprint("agent", "en-US", "127.0.0.1");
        let c = fingerprint("agent", "en-GB", "127.0.0.1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn authorize_matches_white_and_black_and_defaults_to_spectator() {
        let white = Identity::Registered("alice".into());
        let stranger = Identity::Registered("mallory".into());
        assert_eq!(
            authorize(&white, Some("alice"), Some("bob")),
            Role::Player(crate::model::ChessColor::WHITE)
        );
        assert_eq!(authorize(&stranger, Some("alice"), Some("bob")), Role::Spectator);
        assert_eq!(authorize(&Identity::Anonymous(Uuid::new_v4()), Some("alice"), Some("bob")), Role::Spectator);
    }

    #[tokio::test]
    async fn issued_access_token_round_trips() {
        let manager = SessionManager::new(b"test-secret");
        let pair = manager.issue("alice").await;
        assert_eq!(manager.validate_access(&pair.access).unwrap(), "alice");
    }

    #[tokio::test]
    async fn rotate_advances_the_family_generation() {
        let manager = SessionManager::new(b"test-secret");
        let pair = manager.issue("alice").await;
        let rotated = manager.rotate(&pair.refresh).await.unwrap();
        assert_eq!(manager.validate_access(&rotated.access).unwrap(), "alice");
    }

    #[tokio::test]
    async fn reusing_a_retired_refresh_token_revokes_the_family() {
        let manager = SessionManager::new(b"test-secret");
        let pair = manager.issue("alice").await;
        let rotated = manager.rotate(&pair.refresh).await.unwrap();

        // Reusing the original (now-stale) refresh token is detected...
        let reuse = manager.rotate(&pair.refresh).await;
        assert_eq!(reuse.unwrap_err(), SessionError::RefreshReuseDetected);

        // ...and the whole family, including the legitimately rotated
        // token, is now dead.
        let after = manager.rotate(&rotated.refresh).await;
        assert_eq!(after.unwrap_err(), SessionError::FamilyRevoked);
    }

    #[tokio::test]
    async fn anonymous_session_requires_matching_fingerprint() {
        let manager = SessionManager::new(b"test-secret");
        let (_, token) = manager.create_anonymous_session("fp-1").await;
        assert!(manager.validate_anonymous(&token, "fp-1").await.is_ok());
        assert_eq!(
            manager.validate_anonymous(&token, "fp-2").await.unwrap_err(),
            SessionError::FingerprintMismatch
        );
    }

    #[tokio::test]
    async fn a_refresh_token_is_rejected_as_an_access_token() {
        let manager = SessionManager::new(b"test-secret");
        let pair = manager.issue("alice").await;
        assert_eq!(manager.validate_access(&pair.refresh).unwrap_err(), SessionError::BadSignature);
    }

    #[tokio::test]
    async fn an_access_token_is_rejected_by_rotate() {
        let manager = SessionManager::new(b"test-secret");
        let pair = manager.issue("alice").await;
        assert_eq!(manager.rotate(&pair.access).await.unwrap_err(), SessionError::BadSignature);
    }
}
