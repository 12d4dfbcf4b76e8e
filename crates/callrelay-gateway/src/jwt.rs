//! Native-protocol auth: the `start` frame's bearer JWT is
//! verified against a configured PEM public key before `Streaming` begins.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[allow(dead_code)]
    sub: Option<String>,
}

pub struct JwtVerifier {
    key: DecodingKey,
}

impl JwtVerifier {
    pub fn from_pem(public_key_pem: &[u8]) -> Result<Self, JwtError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem)
            .or_else(|_| DecodingKey::from_ec_pem(public_key_pem))
            .map_err(|e| JwtError::Invalid(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn verify(&self, bearer_header: Option<&str>) -> Result<(), JwtError> {
        let token = bearer_header
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(JwtError::MissingToken)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        jsonwebtoken::decode::<Claims>(token, &self.key, &validation)
            .map(|_| ())
            .map_err(|e| JwtError::Invalid(e.to_string()))
    }
}
