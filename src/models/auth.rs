use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// Claims carried by the bearer tokens this service validates. Token
/// issuance happens in the account service; here we only check signature
/// and expiry and pull out the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

pub fn authenticate_token(token: &str, key: &DecodingKey) -> Result<i64, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::JwtError(e),
        }
    })?;

    data.claims
        .sub
        .parse::<i64>()
        .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn make_token(sub: &str, exp: i64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    fn decoding_key() -> DecodingKey {
        DecodingKey::from_secret(b"test-secret")
    }

    #[test]
    fn valid_token_yields_user_id() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = make_token("42", exp);
        assert_eq!(authenticate_token(&token, &decoding_key()).unwrap(), 42);
    }

    #[test]
    fn expired_token_is_rejected() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = make_token("42", exp);
        assert!(matches!(
            authenticate_token(&token, &decoding_key()),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn non_numeric_subject_is_rejected() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = make_token("nobody", exp);
        assert!(matches!(
            authenticate_token(&token, &decoding_key()),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(authenticate_token("not-a-jwt", &decoding_key()).is_err());
    }
}
