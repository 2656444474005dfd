//! HS256 signing and signature verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Serialize, de::DeserializeOwned};

use super::codec::ParseError;

/// Signs and verifies compact JWS strings with a shared symmetric secret.
///
/// The secret is fixed at construction. Expiry is deliberately not checked
/// here: the codec compares `exp` at millisecond granularity itself.
#[derive(Clone)]
pub struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Serialize `claims` and produce `header.payload.signature`.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, SignError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(SignError)
    }

    /// Check the signature of `token` and decode its payload.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, ParseError> {
        jsonwebtoken::decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| classify(e.kind()))
    }
}

/// Map a `jsonwebtoken` failure onto the token-level taxonomy.
fn classify(kind: &ErrorKind) -> ParseError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => ParseError::InvalidSignature,
        ErrorKind::ExpiredSignature => ParseError::Expired,
        _ => ParseError::Malformed,
    }
}

/// Failure while encoding a token.
#[derive(Debug, thiserror::Error)]
#[error("Failed to encode token: {0}")]
pub struct SignError(#[source] jsonwebtoken::errors::Error);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        sub: String,
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = Signer::new(b"test-secret-key-for-testing");
        let token = signer
            .sign(&Payload {
                sub: "42".to_string(),
            })
            .unwrap();

        assert_eq!(token.split('.').count(), 3);

        let payload: Payload = signer.verify(&token).unwrap();
        assert_eq!(payload.sub, "42");
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = Signer::new(b"test-secret-key-for-testing");
        let payload = Payload {
            sub: "42".to_string(),
        };

        assert_eq!(signer.sign(&payload).unwrap(), signer.sign(&payload).unwrap());
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = Signer::new(b"secret-1")
            .sign(&Payload {
                sub: "42".to_string(),
            })
            .unwrap();

        let result = Signer::new(b"secret-2").verify::<Payload>(&token);
        assert_eq!(result.unwrap_err(), ParseError::InvalidSignature);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let signer = Signer::new(b"test-secret-key-for-testing");

        assert_eq!(
            signer.verify::<Payload>("not-a-token").unwrap_err(),
            ParseError::Malformed
        );
        assert_eq!(
            signer.verify::<Payload>("a.b").unwrap_err(),
            ParseError::Malformed
        );
        assert_eq!(
            signer.verify::<Payload>("").unwrap_err(),
            ParseError::Malformed
        );
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let signer = Signer::new(b"super-secret-value");
        let debug = format!("{:?}", signer);
        assert!(!debug.contains("super-secret-value"));
    }
}
