mod common;

use storefront_api::{
    dto::auth::TokenType,
    error::AppError,
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_USER, decode_claims, ensure_admin},
    services::auth_service::{hash_password, issue_tokens, verify_password},
};
use uuid::Uuid;

#[tokio::test]
async fn issued_tokens_decode_with_their_own_secret() {
    let config = common::test_config("postgres://unused");
    let user_id = Uuid::new_v4();

    let (access, refresh) = issue_tokens(&config, user_id, ROLE_USER).expect("tokens");

    let claims = decode_claims(&config.jwt_secret, &access, TokenType::Access).expect("access");
    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.role, ROLE_USER);
    assert_eq!(claims.typ, TokenType::Access);

    let claims =
        decode_claims(&config.jwt_refresh_secret, &refresh, TokenType::Refresh).expect("refresh");
    assert_eq!(claims.typ, TokenType::Refresh);
}

#[tokio::test]
async fn tokens_are_not_interchangeable() {
    let config = common::test_config("postgres://unused");
    let (access, refresh) = issue_tokens(&config, Uuid::new_v4(), ROLE_USER).expect("tokens");

    // Wrong secret.
    let err = decode_claims(&config.jwt_secret, &refresh, TokenType::Access).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Invalid or expired token"));

    // Right secret, wrong type.
    let err = decode_claims(&config.jwt_secret, &access, TokenType::Refresh).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Invalid token type"));

    let err = decode_claims(&config.jwt_secret, "not-a-jwt", TokenType::Access).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn password_hashes_verify() {
    let hash = hash_password("Secret123!").expect("hash");
    assert_ne!(hash, "Secret123!");
    assert!(verify_password("Secret123!", &hash).expect("verify"));
    assert!(!verify_password("secret123!", &hash).expect("verify"));

    let err = verify_password("Secret123!", "not-a-phc-string").unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
}

#[tokio::test]
async fn role_checks() {
    let owner = Uuid::new_v4();
    let user = AuthUser {
        user_id: owner,
        role: ROLE_USER.into(),
    };
    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: ROLE_ADMIN.into(),
    };

    assert!(matches!(ensure_admin(&user), Err(AppError::Forbidden(_))));
    assert!(ensure_admin(&admin).is_ok());

    assert!(user.ensure_owner_or_admin(owner).is_ok());
    assert!(matches!(
        user.ensure_owner_or_admin(Uuid::new_v4()),
        Err(AppError::Forbidden(_))
    ));
    assert!(admin.ensure_owner_or_admin(owner).is_ok());
}
