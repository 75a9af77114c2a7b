use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::AppError;

pub const SERVICE_ROLE: &str = "service_role";

#[derive(Debug, Deserialize)]
struct KeyClaims {
    role: Option<String>,
}

/// Role claim embedded in a backend API key.
///
/// Keys are JWTs signed by the backend; the signature is not checked here
/// because this process never holds the signing secret. The role only decides
/// whether admin endpoints are worth calling at all.
pub fn key_role(key: &str) -> Result<Option<String>, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<KeyClaims>(key, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims.role)
}

pub fn is_service_role(key: &str) -> bool {
    matches!(key_role(key), Ok(Some(role)) if role == SERVICE_ROLE)
}

#[cfg(test)]
pub(crate) fn make_key(role: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    encode(
        &Header::default(),
        &json!({ "iss": "supabase", "role": role, "exp": 4_102_444_800u64 }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("Failed to encode test key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_role() {
        let anon = make_key("anon");
        let service = make_key(SERVICE_ROLE);

        assert_eq!(key_role(&anon).unwrap().as_deref(), Some("anon"));
        assert_eq!(key_role(&service).unwrap().as_deref(), Some(SERVICE_ROLE));
        assert!(is_service_role(&service));
        assert!(!is_service_role(&anon));
    }

    #[test]
    fn test_garbage_key() {
        assert!(key_role("not-a-jwt").is_err());
        assert!(!is_service_role(""));
    }
}
