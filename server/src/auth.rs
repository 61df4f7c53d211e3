//! Password digests and bearer tokens.

use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{Actor, Profile, ProfileId, Role};

use crate::store::Credential;

const SALT_LEN: usize = 16;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Argon2id with the crate's default cost parameters.
fn derive(password: &str, salt: &[u8]) -> WorkflowResult<[u8; 32]> {
    let mut out = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| WorkflowError::Store(format!("password derivation failed: {e}")))?;
    Ok(out)
}

/// Salt and digest a new password.
pub fn hash_password(password: &str) -> WorkflowResult<Credential> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WorkflowError::validation(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(password, &salt)?;
    Ok(Credential {
        salt: hex::encode(salt),
        digest: hex::encode(digest),
    })
}

pub fn verify_password(credential: &Credential, password: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(&credential.salt), hex::decode(&credential.digest))
    else {
        return false;
    };
    match derive(password, &salt) {
        Ok(actual) => constant_time_eq(&expected, &actual),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: ProfileId,
    pub role: Role,
    pub exp: i64,
}

/// Issues and checks HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn from_secret(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, profile: &Profile) -> WorkflowResult<String> {
        let claims = Claims {
            sub: profile.id,
            role: profile.role,
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| WorkflowError::Store(format!("token encoding failed: {e}")))
    }

    /// Any malformed, forged or expired token is `Unauthenticated`.
    pub fn verify(&self, token: &str) -> WorkflowResult<Actor> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                WorkflowError::Unauthenticated
            })?;
        Ok(Actor::new(data.claims.sub, data.claims.role))
    }
}
