use academic_portal::{
    AppConfig,
    models::Role,
    token::{Claims, TokenError, TokenService},
};
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

const SECRET: &[u8] = b"token-test-secret";
const ISSUER: &str = "academic-portal";

fn service() -> TokenService {
    TokenService::new(SECRET, ISSUER, Duration::hours(24))
}

#[test]
fn issued_token_validates_to_the_same_subject_and_role() {
    let tokens = service();

    for role in Role::ALL {
        let token = tokens.issue("B6616052", role).unwrap();
        let claims = tokens.validate(&token).unwrap();

        assert_eq!(claims.sub, "B6616052");
        assert_eq!(claims.role, role);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }
}

#[test]
fn token_expires_exactly_at_exp() {
    let tokens = service();
    let issued_at = Utc.with_ymd_and_hms(2026, 1, 15, 8, 0, 0).unwrap();
    let token = tokens.issue_at("T1001", Role::Teacher, issued_at).unwrap();

    let just_before = issued_at + Duration::hours(24) - Duration::seconds(1);
    assert!(tokens.validate_at(&token, just_before).is_ok());

    let at_expiry = issued_at + Duration::hours(24);
    assert_eq!(tokens.validate_at(&token, at_expiry), Err(TokenError::Expired));
    assert_eq!(
        tokens.validate_at(&token, at_expiry + Duration::days(3)),
        Err(TokenError::Expired)
    );
}

#[test]
fn rotated_key_invalidates_earlier_tokens() {
    let token = service().issue("A0001", Role::Admin).unwrap();
    let rotated = TokenService::new(b"a-completely-different-secret", ISSUER, Duration::hours(24));

    assert_eq!(rotated.validate(&token), Err(TokenError::InvalidSignature));
}

#[test]
fn foreign_issuer_is_rejected_as_invalid_signature() {
    let foreign = TokenService::new(SECRET, "someone-else", Duration::hours(24));
    let token = foreign.issue("B6616052", Role::Student).unwrap();

    assert_eq!(service().validate(&token), Err(TokenError::InvalidSignature));
}

#[test]
fn other_algorithm_is_rejected_even_with_the_right_secret() {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "B6616052".to_string(),
        role: Role::Admin,
        iss: ISSUER.to_string(),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS384),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();

    assert_eq!(service().validate(&token), Err(TokenError::InvalidSignature));
}

#[test]
fn garbage_is_malformed() {
    let tokens = service();

    assert_eq!(tokens.validate(""), Err(TokenError::Malformed));
    assert_eq!(tokens.validate("not-a-token"), Err(TokenError::Malformed));
    assert_eq!(tokens.validate("a.b.c"), Err(TokenError::Malformed));
}

#[test]
fn from_config_uses_configured_issuer_and_window() {
    let config = AppConfig {
        jwt_issuer: "portal-test".to_string(),
        token_ttl_hours: 2,
        ..AppConfig::default()
    };
    let tokens = TokenService::from_config(&config);

    assert_eq!(tokens.issuer(), "portal-test");
    assert_eq!(tokens.ttl(), Duration::hours(2));

    let claims = tokens
        .validate(&tokens.issue("T1001", Role::Teacher).unwrap())
        .unwrap();
    assert_eq!(claims.iss, "portal-test");
    assert_eq!(claims.exp - claims.iat, 2 * 60 * 60);
}
