//! Access token issuing and validation
//!
//! Access tokens are HMAC-signed JWTs carrying `{sub, type, iss, iat, exp}`.
//! They are stateless: nothing is stored and nothing can revoke one before
//! `exp`. Refresh secrets are opaque random strings; only their SHA-256 is
//! ever persisted.
//!
//! Expiry is checked against the injected [`Clock`] rather than the system
//! time so that boundary behaviour is testable. A token is invalid at the
//! instant `now >= exp`, with no leeway.

use butchery_core::{AuthConfig, Clock, SubjectKind, SubjectRef};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Entropy of a refresh secret in bytes (256 bits)
pub const REFRESH_SECRET_BYTES: usize = 32;

/// Claims embedded in every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier
    pub sub: String,
    /// Subject kind (`admin` or `customer`)
    #[serde(rename = "type")]
    pub subject_type: String,
    /// Token issuer
    pub iss: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

/// Token errors
///
/// Validation collapses every failure into [`TokenError::Invalid`]; callers
/// get no signal about which check failed.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign access token: {0}")]
    Signing(String),

    #[error("invalid access token")]
    Invalid,
}

/// Token signing configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC secret
    pub secret: String,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Token issuer identifier
    pub issuer: String,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_ttl_secs: config.access_token_ttl_secs,
            issuer: config.issuer.clone(),
        }
    }
}

/// Issues and validates access tokens with a secret fixed at construction
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
            clock,
        }
    }

    /// Access token lifetime reported to clients as `expires_in`
    pub fn access_ttl_secs(&self) -> u64 {
        self.config.access_ttl_secs
    }

    /// Sign a new access token for `subject`
    pub fn issue_access_token(&self, subject: SubjectRef) -> Result<String, TokenError> {
        let now = self.clock.now().timestamp();
        let ttl = i64::try_from(self.config.access_ttl_secs)
            .map_err(|_| TokenError::Signing("access token TTL out of range".to_string()))?;

        let claims = Claims {
            sub: subject.id.to_string(),
            subject_type: subject.kind.as_str().to_string(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm family, issuer and expiry, then extract the subject
    pub fn validate_access_token(&self, token: &str) -> Result<SubjectRef, TokenError> {
        let claims = self.decode_claims(token)?;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Invalid);
        }

        let id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Invalid)?;
        let kind: SubjectKind = claims.subject_type.parse().map_err(|_| TokenError::Invalid)?;

        Ok(SubjectRef::new(id, kind))
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        // Any HMAC variant is accepted; RSA/EC/none headers fail before the signature check
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[&self.config.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                TokenError::Invalid
            })
    }
}

/// Generate a refresh secret: 32 random bytes from the OS, lowercase hex
pub fn issue_refresh_secret() -> Result<String, TokenError> {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::Signing(format!("random generation failed: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Deterministic lookup key for a refresh secret (SHA-256, lowercase hex)
pub fn hash_refresh_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use butchery_core::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            access_ttl_secs: 900,
            issuer: "butchery-app".to_string(),
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_round_trip_for_every_kind() {
        let service = TokenService::new(config("secret-a"), clock());

        for subject in [SubjectRef::admin(Uuid::new_v4()), SubjectRef::customer(Uuid::new_v4())] {
            let token = service.issue_access_token(subject).unwrap();
            assert_eq!(service.validate_access_token(&token).unwrap(), subject);
        }
    }

    #[test]
    fn test_claims_layout() {
        let clock = clock();
        let service = TokenService::new(config("secret-a"), clock.clone());
        let subject = SubjectRef::customer(Uuid::new_v4());

        let claims = service
            .decode_claims(&service.issue_access_token(subject).unwrap())
            .unwrap();

        assert_eq!(claims.sub, subject.id.to_string());
        assert_eq!(claims.subject_type, "customer");
        assert_eq!(claims.iss, "butchery-app");
        assert_eq!(claims.iat, clock.now().timestamp());
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_wrong_secret() {
        let clock = clock();
        let issuer = TokenService::new(config("secret-a"), clock.clone());
        let validator = TokenService::new(config("secret-b"), clock);

        let token = issuer
            .issue_access_token(SubjectRef::admin(Uuid::new_v4()))
            .unwrap();
        assert!(matches!(
            validator.validate_access_token(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expiry_boundary() {
        let clock = clock();
        let service = TokenService::new(config("secret-a"), clock.clone());
        let subject = SubjectRef::customer(Uuid::new_v4());
        let token = service.issue_access_token(subject).unwrap();

        clock.advance(Duration::seconds(899));
        assert!(service.validate_access_token(&token).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            service.validate_access_token(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_with_valid_signature() {
        let clock = clock();
        let service = TokenService::new(config("secret-a"), clock.clone());
        let now = clock.now().timestamp();

        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            subject_type: "admin".to_string(),
            iss: "butchery-app".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret-a"),
        )
        .unwrap();

        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_other_hmac_variants_accepted() {
        let clock = clock();
        let service = TokenService::new(config("secret-a"), clock.clone());
        let now = clock.now().timestamp();
        let subject = SubjectRef::admin(Uuid::new_v4());

        let claims = Claims {
            sub: subject.id.to_string(),
            subject_type: "admin".to_string(),
            iss: "butchery-app".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"secret-a"),
        )
        .unwrap();

        assert_eq!(service.validate_access_token(&token).unwrap(), subject);
    }

    #[test]
    fn test_non_hmac_algorithms_rejected() {
        let service = TokenService::new(config("secret-a"), clock());

        // {"alg":"none","typ":"JWT"} . {}
        let unsigned = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.e30.";
        // {"alg":"RS256","typ":"JWT"} . {}
        let rsa = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.e30.c2ln";

        assert!(service.validate_access_token(unsigned).is_err());
        assert!(service.validate_access_token(rsa).is_err());
    }

    #[test]
    fn test_unknown_subject_kind_rejected() {
        let clock = clock();
        let service = TokenService::new(config("secret-a"), clock.clone());
        let now = clock.now().timestamp();

        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            subject_type: "vendor".to_string(),
            iss: "butchery-app".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret-a"),
        )
        .unwrap();

        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_malformed_token() {
        let service = TokenService::new(config("secret-a"), clock());
        assert!(service.validate_access_token("invalid.token.here").is_err());
        assert!(service.validate_access_token("").is_err());
    }

    #[test]
    fn test_refresh_secrets() {
        let secrets: HashSet<String> = (0..64).map(|_| issue_refresh_secret().unwrap()).collect();
        assert_eq!(secrets.len(), 64);

        for secret in &secrets {
            assert_eq!(secret.len(), REFRESH_SECRET_BYTES * 2);
            assert!(secret.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_refresh_secret_decodes_to_random_bytes() {
        let secret = issue_refresh_secret().unwrap();
        let bytes = hex::decode(&secret).unwrap();
        assert_eq!(bytes.len(), REFRESH_SECRET_BYTES);
        assert_eq!(hex::encode(&bytes), secret);

        let hashed = hex::decode(hash_refresh_secret(&secret)).unwrap();
        assert_eq!(hashed.len(), 32);
    }

    #[test]
    fn test_hash_refresh_secret() {
        assert_eq!(hash_refresh_secret("abc"), hash_refresh_secret("abc"));
        assert_ne!(hash_refresh_secret("abc"), hash_refresh_secret("abd"));
        assert_eq!(
            hash_refresh_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", config("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    proptest::proptest! {
        #[test]
        fn prop_arbitrary_input_is_rejected(token in ".{0,200}") {
            let service = TokenService::new(config("secret-a"), clock());
            proptest::prop_assert!(matches!(
                service.validate_access_token(&token),
                Err(TokenError::Invalid)
            ));
        }

        #[test]
        fn prop_tampered_signature_is_rejected(flip in 0usize..16) {
            let service = TokenService::new(config("secret-a"), clock());
            let token = service
                .issue_access_token(SubjectRef::customer(Uuid::new_v4()))
                .unwrap();

            let (head, signature) = token.rsplit_once('.').unwrap();
            let mut bytes = signature.as_bytes().to_vec();
            bytes[flip] = if bytes[flip] == b'A' { b'B' } else { b'A' };
            let tampered = format!("{head}.{}", String::from_utf8(bytes).unwrap());

            proptest::prop_assert!(service.validate_access_token(&tampered).is_err());
        }
    }
}
