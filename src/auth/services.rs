use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{AuthResponse, LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_dummy_blocking, verify_password_blocking},
};
use crate::{
    error::{AppError, AppResult},
    users::{membership::generate_membership_id, repo_types::NewUser, UserStore},
};

pub const MIN_PASSWORD_CHARS: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }
    if !is_valid_email(&req.email) {
        return Err(AppError::validation("Invalid email"));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::validation(
            "Password must be at least 6 characters long",
        ));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(AppError::validation("First name and last name are required"));
    }
    Ok(())
}

pub async fn register(
    users: &dyn UserStore,
    keys: &JwtKeys,
    mut req: RegisterRequest,
) -> AppResult<AuthResponse> {
    req.email = normalize_email(&req.email);
    validate_registration(&req)?;

    if users
        .find_by_email(&req.email)
        .await
        .context("Failed to create user")?
        .is_some()
    {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::Conflict(
            "User with this email already exists".into(),
        ));
    }

    let password_hash = hash_password_blocking(req.password)
        .await
        .context("Failed to hash password")?;

    let user = users
        .create(NewUser {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            membership_id: generate_membership_id(),
        })
        .await?;

    let token = keys
        .issue(user.id, &user.email)
        .context("Failed to generate token")?;

    info!(user_id = user.id, membership_id = %user.membership_id, "user registered");
    Ok(AuthResponse { token, user })
}

pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let Some(user) = users
        .find_by_email(&email)
        .await
        .context("Failed to look up user")?
    else {
        verify_dummy_blocking(req.password)
            .await
            .context("Failed to verify password")?;
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    let ok = verify_password_blocking(req.password, user.password_hash.clone())
        .await
        .context("Failed to verify password")?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = keys
        .issue(user.id, &user.email)
        .context("Failed to generate token")?;

    info!(user_id = user.id, "user logged in");
    Ok(AuthResponse { token, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::users::memory::MemoryUserStore;
    use crate::users::repo::CreateUserError;
    use crate::users::repo_types::{ProfileChanges, User};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use regex::Regex;

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 60 * 24,
        })
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: String::new(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[tokio::test]
    async fn register_creates_gold_member_with_token() {
        let store = MemoryUserStore::new();
        let keys = keys();
        let res = register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .expect("register");

        assert_eq!(res.user.email, "a@x.com");
        assert_eq!(res.user.member_level, "Gold");
        assert_eq!(res.user.points, 0);
        assert!(Regex::new(r"^LBK\d{5}$").unwrap().is_match(&res.user.membership_id));
        assert_ne!(res.user.password_hash, "123456");

        let identity = keys.verify(&res.token).expect("token verifies");
        assert_eq!(identity.user_id, res.user.id);
        assert_eq!(identity.email, "a@x.com");
    }

    #[tokio::test]
    async fn register_normalizes_email() {
        let store = MemoryUserStore::new();
        let res = register(&store, &keys(), register_req("  A@X.com ", "123456"))
            .await
            .unwrap();
        assert_eq!(res.user.email, "a@x.com");
    }

    #[tokio::test]
    async fn short_password_is_rejected_without_persisting() {
        let store = MemoryUserStore::new();
        let err = register(&store, &keys(), register_req("a@x.com", "12345"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(store.all_rows().is_empty());
    }

    #[tokio::test]
    async fn password_length_counts_characters_not_bytes() {
        let store = MemoryUserStore::new();
        // five characters, ten bytes
        let err = register(&store, &keys(), register_req("a@x.com", "ééééé"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() {
        let store = MemoryUserStore::new();
        let keys = keys();
        for req in [
            register_req("", "123456"),
            register_req("a@x.com", ""),
            register_req("not-an-email", "123456"),
            RegisterRequest {
                first_name: "  ".into(),
                ..register_req("a@x.com", "123456")
            },
            RegisterRequest {
                last_name: String::new(),
                ..register_req("a@x.com", "123456")
            },
        ] {
            let err = register(&store, &keys, req).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
        assert!(store.all_rows().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_keeps_one_row() {
        let store = MemoryUserStore::new();
        let keys = keys();
        register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap();
        let err = register(&store, &keys, register_req("A@x.com", "abcdef"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let rows = store.all_rows();
        assert_eq!(rows.iter().filter(|u| u.email == "a@x.com").count(), 1);
    }

    #[tokio::test]
    async fn email_of_soft_deleted_user_can_register_again() {
        let store = MemoryUserStore::new();
        let keys = keys();
        let first = register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap();
        store.soft_delete(first.user.id);
        let second = register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .expect("email is free again");
        assert_ne!(first.user.id, second.user.id);
    }

    /// Store whose pre-check never sees the existing row, as happens when
    /// two registrations race.
    struct RacingStore(MemoryUserStore);

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            self.0.find_by_id(id).await
        }
        async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn create(&self, new_user: NewUser) -> Result<User, CreateUserError> {
            self.0.create(new_user).await
        }
        async fn update_profile(
            &self,
            id: i64,
            changes: &ProfileChanges,
        ) -> anyhow::Result<Option<User>> {
            self.0.update_profile(id, changes).await
        }
    }

    #[tokio::test]
    async fn storage_level_duplicate_maps_to_conflict() {
        let store = RacingStore(MemoryUserStore::new());
        let keys = keys();
        register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap();
        let err = register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "User with this email already exists");
    }

    /// Store that hands every new user the same membership id.
    struct FixedMembershipStore(MemoryUserStore);

    #[async_trait]
    impl UserStore for FixedMembershipStore {
        async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            self.0.find_by_id(id).await
        }
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            self.0.find_by_email(email).await
        }
        async fn create(&self, new_user: NewUser) -> Result<User, CreateUserError> {
            self.0
                .create(NewUser {
                    membership_id: "LBK00001".into(),
                    ..new_user
                })
                .await
        }
        async fn update_profile(
            &self,
            id: i64,
            changes: &ProfileChanges,
        ) -> anyhow::Result<Option<User>> {
            self.0.update_profile(id, changes).await
        }
    }

    #[tokio::test]
    async fn membership_id_collision_is_conflict_without_new_row() {
        let store = FixedMembershipStore(MemoryUserStore::new());
        let keys = keys();
        let first = register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap();
        assert_eq!(first.user.membership_id, "LBK00001");

        let err = register(&store, &keys, register_req("b@x.com", "123456"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Could not allocate a membership id, please retry");

        let rows = store.0.all_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].email, "a@x.com");
    }

    #[tokio::test]
    async fn login_returns_token_for_correct_password() {
        let store = MemoryUserStore::new();
        let keys = keys();
        let reg = register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap();
        let res = login(&store, &keys, login_req("A@x.com", "123456"))
            .await
            .expect("login");
        assert_eq!(res.user.id, reg.user.id);
        assert_eq!(keys.verify(&res.token).unwrap().user_id, reg.user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_identical() {
        let store = MemoryUserStore::new();
        let keys = keys();
        register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap();

        let wrong_pw = login(&store, &keys, login_req("a@x.com", "654321"))
            .await
            .unwrap_err();
        let unknown = login(&store, &keys, login_req("nobody@x.com", "123456"))
            .await
            .unwrap_err();

        assert_eq!(wrong_pw.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_email_still_pays_for_a_password_check() {
        let store = MemoryUserStore::new();
        let keys = keys();
        // warm the lazily built dummy hash so only the verify is timed
        let _ = login(&store, &keys, login_req("warm@x.com", "123456")).await;

        let hash = hash_password_blocking("123456".into()).await.unwrap();
        let started = std::time::Instant::now();
        verify_password_blocking("123456".into(), hash).await.unwrap();
        let one_verify = started.elapsed();

        let started = std::time::Instant::now();
        let err = login(&store, &keys, login_req("nobody@x.com", "123456"))
            .await
            .unwrap_err();
        let unknown = started.elapsed();

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(
            unknown * 4 >= one_verify,
            "unknown-email login took {unknown:?}, one verify takes {one_verify:?}"
        );
    }

    #[tokio::test]
    async fn login_ignores_soft_deleted_users() {
        let store = MemoryUserStore::new();
        let keys = keys();
        let reg = register(&store, &keys, register_req("a@x.com", "123456"))
            .await
            .unwrap();
        store.soft_delete(reg.user.id);
        let err = login(&store, &keys, login_req("a@x.com", "123456"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let store = MemoryUserStore::new();
        let err = login(&store, &keys(), login_req("a@x.com", ""))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
