/// JWT Validation
///
/// Verifies algorithm, signature, issuer, expiry and declared token class.
/// Every failure collapses into `TokenError::Invalid` so callers cannot
/// learn which check rejected the token.

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use crate::auth::claims::{Claims, TokenType};
use crate::configuration::JwtSettings;
use crate::error::TokenError;

#[derive(Clone)]
pub struct TokenValidator {
    access_key: DecodingKey,
    refresh_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            access_key: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_key: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            validation,
        }
    }

    /// Validate a token against `key` and require it to be of `expected` class
    pub fn parse(
        &self,
        token: &str,
        key: &DecodingKey,
        expected: TokenType,
    ) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|e| reject("header", e))?;
        if header.alg != Algorithm::HS256 {
            tracing::debug!(alg = ?header.alg, "Token rejected: unexpected algorithm");
            return Err(TokenError::Invalid);
        }

        let claims = decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| reject("decode", e))?;

        if claims.is_expired() {
            tracing::debug!("Token rejected: expired");
            return Err(TokenError::Invalid);
        }
        if claims.typ != expected {
            tracing::debug!(expected = %expected, actual = %claims.typ, "Token rejected: wrong type");
            return Err(TokenError::Invalid);
        }

        let jti_ok = match expected {
            TokenType::Access => claims.jti.is_none(),
            TokenType::Refresh => claims.jti.as_deref().map_or(false, |jti| !jti.is_empty()),
        };
        if !jti_ok {
            tracing::debug!("Token rejected: malformed jti");
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }

    pub fn parse_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse(token, &self.access_key, TokenType::Access)
    }

    pub fn parse_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse(token, &self.refresh_key, TokenType::Refresh)
    }
}

fn reject(stage: &'static str, err: jsonwebtoken::errors::Error) -> TokenError {
    tracing::debug!(stage = stage, error = %err, "Token rejected");
    TokenError::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    use crate::auth::issuer::TokenIssuer;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            issuer: "test".to_string(),
            access_secret: "access-secret-key-at-least-32-characters".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
        }
    }

    fn sign_with(claims: &Claims, alg: Algorithm, secret: &str) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("Failed to sign test token")
    }

    #[test]
    fn test_generate_and_validate_tokens() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let validator = TokenValidator::new(&config);
        let user_id = Uuid::new_v4();

        let access = issuer.issue_access_token(user_id).unwrap();
        let claims = validator.parse_access(&access).expect("Failed to validate access token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.typ, TokenType::Access);

        let refresh = issuer.issue_refresh_token(user_id).unwrap();
        let claims = validator.parse_refresh(&refresh.token).expect("Failed to validate refresh token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, Some(refresh.token_id));
    }

    #[test]
    fn test_token_classes_are_not_interchangeable() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let validator = TokenValidator::new(&config);
        let user_id = Uuid::new_v4();

        let access = issuer.issue_access_token(user_id).unwrap();
        let refresh = issuer.issue_refresh_token(user_id).unwrap();

        assert_eq!(validator.parse_refresh(&access), Err(TokenError::Invalid));
        assert_eq!(validator.parse_access(&refresh.token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_wrong_type_rejected_even_with_correct_secret() {
        let config = get_test_config();
        let validator = TokenValidator::new(&config);
        let now = Utc::now().timestamp();

        // An access-typed token signed with the refresh secret
        let forged = sign_with(
            &Claims::access("test", Uuid::new_v4(), now, now + 600),
            Algorithm::HS256,
            &config.refresh_secret,
        );
        assert_eq!(validator.parse_refresh(&forged), Err(TokenError::Invalid));

        // A refresh-typed token signed with the access secret
        let forged = sign_with(
            &Claims::refresh("test", Uuid::new_v4(), "jti".into(), now, now + 600),
            Algorithm::HS256,
            &config.access_secret,
        );
        assert_eq!(validator.parse_access(&forged), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = get_test_config();
        let validator = TokenValidator::new(&config);
        let now = Utc::now().timestamp();

        let expired = sign_with(
            &Claims::access("test", Uuid::new_v4(), now - 120, now - 1),
            Algorithm::HS256,
            &config.access_secret,
        );
        assert_eq!(validator.parse_access(&expired), Err(TokenError::Invalid));
    }

    #[test]
    fn test_other_algorithms_rejected() {
        let config = get_test_config();
        let validator = TokenValidator::new(&config);
        let now = Utc::now().timestamp();
        let claims = Claims::access("test", Uuid::new_v4(), now, now + 600);

        let hs384 = sign_with(&claims, Algorithm::HS384, &config.access_secret);
        assert_eq!(validator.parse_access(&hs384), Err(TokenError::Invalid));

        let hs512 = sign_with(&claims, Algorithm::HS512, &config.access_secret);
        assert_eq!(validator.parse_access(&hs512), Err(TokenError::Invalid));
    }

    #[test]
    fn test_alg_none_rejected() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let validator = TokenValidator::new(&config);

        let token = issuer.issue_access_token(Uuid::new_v4()).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        // {"alg":"none","typ":"JWT"}
        let unsigned = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{}.", payload);

        assert_eq!(validator.parse_access(&unsigned), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let validator = TokenValidator::new(&config);

        let token = issuer.issue_access_token(Uuid::new_v4()).unwrap();
        let tampered = format!("{}X", token);

        assert_eq!(validator.parse_access(&tampered), Err(TokenError::Invalid));
        assert_eq!(validator.parse_access("invalid.token.here"), Err(TokenError::Invalid));
        assert_eq!(validator.parse_access(""), Err(TokenError::Invalid));
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = TokenIssuer::new(&config).issue_access_token(Uuid::new_v4()).unwrap();

        config.issuer = "wrong-issuer".to_string();
        let validator = TokenValidator::new(&config);

        assert_eq!(validator.parse_access(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_refresh_without_jti_rejected() {
        let config = get_test_config();
        let validator = TokenValidator::new(&config);
        let now = Utc::now().timestamp();

        let mut claims = Claims::refresh("test", Uuid::new_v4(), String::new(), now, now + 600);
        let empty_jti = sign_with(&claims, Algorithm::HS256, &config.refresh_secret);
        assert_eq!(validator.parse_refresh(&empty_jti), Err(TokenError::Invalid));

        claims.jti = None;
        let no_jti = sign_with(&claims, Algorithm::HS256, &config.refresh_secret);
        assert_eq!(validator.parse_refresh(&no_jti), Err(TokenError::Invalid));
    }
}
