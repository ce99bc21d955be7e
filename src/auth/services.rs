use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest},
    extractors::AuthUser,
    jwt::JwtKeys,
    password,
    repo::{NewUser, User, UserStore},
};
use crate::{error::Error, mail::Mailer};

const RESET_CODE_LEN: usize = 6;
const RESET_CODE_TTL: Duration = Duration::minutes(30);

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn generate_reset_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Create an account. All four fields are required; the email must be
/// unique (exact match, case-sensitive as stored). Never returns the hash
/// or plaintext to the caller.
pub async fn register(store: &dyn UserStore, req: RegisterRequest) -> Result<User, Error> {
    if req.first_name.trim().is_empty()
        || req.last_name.trim().is_empty()
        || req.email.trim().is_empty()
        || req.password.is_empty()
    {
        return Err(Error::Validation("please fill all the fields".into()));
    }
    if !is_valid_email(&req.email) {
        return Err(Error::Validation("invalid email address".into()));
    }

    if store.find_by_email(&req.email).await?.is_some() {
        return Err(Error::DuplicateUser);
    }

    let password_hash = password::hash_password(&req.password)?;
    let user = store
        .create(NewUser {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Validate credentials and issue a signed token embedding `{id, is_admin}`.
/// Unknown email and wrong password surface identically; a login never
/// reveals whether the account exists.
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: &LoginRequest,
) -> Result<(String, User), Error> {
    let user = store
        .find_by_email(&req.email)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(Error::InvalidCredentials);
    }

    let token = keys.sign(user.id, user.is_admin)?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

pub async fn update_profile(
    store: &dyn UserStore,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<User, Error> {
    let mut user = store
        .find_by_id(user_id)
        .await?
        .ok_or(Error::NotFound("user"))?;

    if let Some(first_name) = req.first_name.filter(|v| !v.trim().is_empty()) {
        user.first_name = first_name;
    }
    if let Some(last_name) = req.last_name.filter(|v| !v.trim().is_empty()) {
        user.last_name = last_name;
    }
    if let Some(email) = req.email.filter(|v| !v.trim().is_empty()) {
        if !is_valid_email(&email) {
            return Err(Error::Validation("invalid email address".into()));
        }
        user.email = email;
    }

    Ok(store.update(&user).await?)
}

/// Change the caller's own password after re-verifying the current one.
pub async fn change_password(
    store: &dyn UserStore,
    user_id: Uuid,
    req: &ChangePasswordRequest,
) -> Result<(), Error> {
    let mut user = store
        .find_by_id(user_id)
        .await?
        .ok_or(Error::NotFound("user"))?;

    if !password::verify_password(&req.old_password, &user.password_hash)? {
        return Err(Error::InvalidCredentials);
    }
    if req.new_password.is_empty() {
        return Err(Error::Validation("new password is required".into()));
    }

    user.password_hash = password::hash_password(&req.new_password)?;
    store.update(&user).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

/// Flip the target's admin flag. Requires an admin caller.
pub async fn toggle_role(
    store: &dyn UserStore,
    actor: &AuthUser,
    target: Uuid,
) -> Result<User, Error> {
    if !actor.is_admin {
        return Err(Error::Forbidden("admin privileges required"));
    }

    let mut user = store
        .find_by_id(target)
        .await?
        .ok_or(Error::NotFound("user"))?;
    user.is_admin = !user.is_admin;
    let user = store.update(&user).await?;
    info!(user_id = %user.id, is_admin = user.is_admin, "user role updated");
    Ok(user)
}

/// Issue a reset code, overwriting any outstanding one, and mail it out.
/// Delivery is fire-and-forget: a transport failure is logged and the
/// request still succeeds.
pub async fn request_reset_code(
    store: &dyn UserStore,
    mailer: &dyn Mailer,
    email: &str,
) -> Result<(), Error> {
    let mut user = store
        .find_by_email(email)
        .await?
        .ok_or(Error::NotFound("user"))?;

    let code = generate_reset_code();
    user.reset_code = Some(code.clone());
    user.reset_code_expires_at = Some(OffsetDateTime::now_utc() + RESET_CODE_TTL);
    store.update(&user).await?;

    if let Err(e) = mailer
        .send(
            &user.email,
            "Password Reset Code",
            &format!("Your verification code is: {code}"),
        )
        .await
    {
        warn!(error = %e, user_id = %user.id, "reset code email failed");
    }

    info!(user_id = %user.id, "reset code issued");
    Ok(())
}

/// Consume a reset code and replace the password. The stored code is
/// compared by exact string equality and cleared on success, so a code
/// works at most once; an expired code is treated like a wrong one.
pub async fn reset_password(
    store: &dyn UserStore,
    email: &str,
    code: &str,
    new_password: &str,
) -> Result<(), Error> {
    let mut user = store
        .find_by_email(email)
        .await?
        .ok_or(Error::NotFound("user"))?;

    match user.reset_code.as_deref() {
        Some(stored) if stored == code => {}
        _ => return Err(Error::InvalidCode),
    }
    if let Some(expires_at) = user.reset_code_expires_at {
        if expires_at < OffsetDateTime::now_utc() {
            return Err(Error::InvalidCode);
        }
    }
    if new_password.is_empty() {
        return Err(Error::Validation("new password is required".into()));
    }

    user.password_hash = password::hash_password(new_password)?;
    user.reset_code = None;
    user.reset_code_expires_at = None;
    store.update(&user).await?;

    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::async_trait;

    use super::*;
    use crate::config::JwtConfig;

    #[derive(Default)]
    struct MemStore {
        users: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserStore for MemStore {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }

        async fn list(&self) -> anyhow::Result<Vec<User>> {
            Ok(self.users.lock().unwrap().clone())
        }

        async fn create(&self, new: NewUser) -> anyhow::Result<User> {
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: Uuid::new_v4(),
                email: new.email,
                first_name: new.first_name,
                last_name: new.last_name,
                password_hash: new.password_hash,
                is_admin: false,
                reset_code: None,
                reset_code_expires_at: None,
                created_at: now,
                updated_at: now,
            };
            self.users.lock().unwrap().push(user.clone());
            Ok(user)
        }

        async fn update(&self, user: &User) -> anyhow::Result<User> {
            let mut users = self.users.lock().unwrap();
            let slot = users
                .iter_mut()
                .find(|u| u.id == user.id)
                .ok_or_else(|| anyhow::anyhow!("no such user"))?;
            *slot = user.clone();
            Ok(user.clone())
        }

        async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
            self.users.lock().unwrap().retain(|u| u.id != id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.into(), subject.into(), body.into()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn test_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "service-test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        })
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "A".into(),
            last_name: "B".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_rejects_missing_fields() {
        let store = MemStore::default();
        let err = register(
            &store,
            RegisterRequest {
                first_name: "".into(),
                last_name: "B".into(),
                email: "a@b.com".into(),
                password: "pw1".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_rejects_malformed_email() {
        let store = MemStore::default();
        let err = register(&store, register_req("not-an-email", "pw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_leaves_existing_record_untouched() {
        let store = MemStore::default();
        let first = register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("first registration");

        let err = register(&store, register_req("a@b.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUser));

        let stored = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.password_hash, first.password_hash);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn email_comparison_is_case_sensitive() {
        let store = MemStore::default();
        register(&store, register_req("Ada@Example.com", "pw1"))
            .await
            .expect("register");
        // A differently-cased address is a different account.
        register(&store, register_req("ada@example.com", "pw1"))
            .await
            .expect("second register");
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn login_returns_token_decoding_to_identity() {
        let store = MemStore::default();
        let keys = test_keys();
        let user = register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        let (token, _) = login(
            &store,
            &keys,
            &LoginRequest {
                email: "a@b.com".into(),
                password: "pw1".into(),
            },
        )
        .await
        .expect("login");

        let claims = keys.verify(&token).expect("decode");
        assert_eq!(claims.sub, user.id);
        assert!(!claims.admin);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let store = MemStore::default();
        register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        let err = login(
            &store,
            &test_keys(),
            &LoginRequest {
                email: "a@b.com".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_unknown_email_is_the_same_generic_failure() {
        let store = MemStore::default();
        let err = login(
            &store,
            &test_keys(),
            &LoginRequest {
                email: "nobody@b.com".into(),
                password: "pw1".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[tokio::test]
    async fn repeated_logins_yield_independently_valid_tokens() {
        let store = MemStore::default();
        let keys = test_keys();
        register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        let req = LoginRequest {
            email: "a@b.com".into(),
            password: "pw1".into(),
        };
        let (first, _) = login(&store, &keys, &req).await.expect("first login");
        let (second, _) = login(&store, &keys, &req).await.expect("second login");
        assert!(keys.verify(&first).is_ok());
        assert!(keys.verify(&second).is_ok());
    }

    #[tokio::test]
    async fn change_password_requires_correct_old_password() {
        let store = MemStore::default();
        let user = register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        let err = change_password(
            &store,
            user.id,
            &ChangePasswordRequest {
                old_password: "wrong".into(),
                new_password: "pw2".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));

        change_password(
            &store,
            user.id,
            &ChangePasswordRequest {
                old_password: "pw1".into(),
                new_password: "pw2".into(),
            },
        )
        .await
        .expect("change password");

        let (_, _) = login(
            &store,
            &test_keys(),
            &LoginRequest {
                email: "a@b.com".into(),
                password: "pw2".into(),
            },
        )
        .await
        .expect("login with new password");
    }

    #[tokio::test]
    async fn reset_code_roundtrip_is_single_use() {
        let store = MemStore::default();
        let mailer = RecordingMailer::default();
        register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        request_reset_code(&store, &mailer, "a@b.com")
            .await
            .expect("request code");

        let code = store
            .find_by_email("a@b.com")
            .await
            .unwrap()
            .unwrap()
            .reset_code
            .expect("code stored");
        assert_eq!(code.len(), RESET_CODE_LEN);

        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2.contains(&code));

        reset_password(&store, "a@b.com", &code, "pw2")
            .await
            .expect("reset");

        let stored = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert!(stored.reset_code.is_none());
        assert!(stored.reset_code_expires_at.is_none());

        login(
            &store,
            &test_keys(),
            &LoginRequest {
                email: "a@b.com".into(),
                password: "pw2".into(),
            },
        )
        .await
        .expect("login with reset password");

        // Replaying the consumed code must fail.
        let err = reset_password(&store, "a@b.com", &code, "pw3")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
    }

    #[tokio::test]
    async fn reset_rejects_wrong_code() {
        let store = MemStore::default();
        let mailer = RecordingMailer::default();
        register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");
        request_reset_code(&store, &mailer, "a@b.com")
            .await
            .expect("request code");

        let err = reset_password(&store, "a@b.com", "AAAAAA", "pw2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
    }

    #[tokio::test]
    async fn expired_reset_code_is_rejected() {
        let store = MemStore::default();
        let mailer = RecordingMailer::default();
        register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");
        request_reset_code(&store, &mailer, "a@b.com")
            .await
            .expect("request code");

        let mut user = store.find_by_email("a@b.com").await.unwrap().unwrap();
        let code = user.reset_code.clone().unwrap();
        user.reset_code_expires_at = Some(OffsetDateTime::now_utc() - Duration::minutes(1));
        store.update(&user).await.unwrap();

        let err = reset_password(&store, "a@b.com", &code, "pw2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCode));
    }

    #[tokio::test]
    async fn a_new_code_replaces_the_old_one() {
        let store = MemStore::default();
        let mailer = RecordingMailer::default();
        register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        request_reset_code(&store, &mailer, "a@b.com")
            .await
            .expect("first code");
        let first = store
            .find_by_email("a@b.com")
            .await
            .unwrap()
            .unwrap()
            .reset_code
            .unwrap();

        request_reset_code(&store, &mailer, "a@b.com")
            .await
            .expect("second code");
        let second = store
            .find_by_email("a@b.com")
            .await
            .unwrap()
            .unwrap()
            .reset_code
            .unwrap();

        if first != second {
            let err = reset_password(&store, "a@b.com", &first, "pw2")
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidCode));
        }
        reset_password(&store, "a@b.com", &second, "pw2")
            .await
            .expect("latest code works");
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_the_code_request() {
        let store = MemStore::default();
        register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        request_reset_code(&store, &FailingMailer, "a@b.com")
            .await
            .expect("request should still succeed");

        let stored = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert!(stored.reset_code.is_some());
    }

    #[tokio::test]
    async fn request_code_for_unknown_email_is_not_found() {
        let store = MemStore::default();
        let err = request_reset_code(&store, &RecordingMailer::default(), "nobody@b.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn role_toggle_requires_an_admin_caller() {
        let store = MemStore::default();
        let user = register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        let non_admin = AuthUser {
            id: Uuid::new_v4(),
            is_admin: false,
        };
        let err = toggle_role(&store, &non_admin, user.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(!store.find_by_id(user.id).await.unwrap().unwrap().is_admin);

        let admin = AuthUser {
            id: Uuid::new_v4(),
            is_admin: true,
        };
        let updated = toggle_role(&store, &admin, user.id).await.expect("toggle");
        assert!(updated.is_admin);
        let back = toggle_role(&store, &admin, user.id).await.expect("toggle back");
        assert!(!back.is_admin);
    }

    #[tokio::test]
    async fn update_profile_edits_only_provided_fields() {
        let store = MemStore::default();
        let user = register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register");

        let updated = update_profile(
            &store,
            user.id,
            UpdateProfileRequest {
                first_name: Some("Ada".into()),
                last_name: None,
                email: None,
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(updated.last_name, "B");
        assert_eq!(updated.email, "a@b.com");
    }

    /// Account lifecycle end to end: register, duplicate, bad login, good
    /// login, role escalation only via an admin.
    #[tokio::test]
    async fn account_scenario() {
        let store = MemStore::default();
        let keys = test_keys();

        let user = register(&store, register_req("a@b.com", "pw1"))
            .await
            .expect("register succeeds");

        let dup = register(&store, register_req("a@b.com", "pw1"))
            .await
            .unwrap_err();
        assert!(matches!(dup, Error::DuplicateUser));

        let bad = login(
            &store,
            &keys,
            &LoginRequest {
                email: "a@b.com".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(bad, Error::InvalidCredentials));

        let (token, _) = login(
            &store,
            &keys,
            &LoginRequest {
                email: "a@b.com".into(),
                password: "pw1".into(),
            },
        )
        .await
        .expect("login succeeds");
        let claims = keys.verify(&token).expect("token decodes");
        assert_eq!(claims.sub, user.id);
        assert!(!claims.admin);

        // Escalation is admin-gated; the caller's own token does not suffice.
        let caller = AuthUser {
            id: user.id,
            is_admin: claims.admin,
        };
        assert!(matches!(
            toggle_role(&store, &caller, user.id).await.unwrap_err(),
            Error::Forbidden(_)
        ));
    }
}
