//! Registration, password+OTP login, and account maintenance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::domain::email_service::OtpMailer;
use crate::domain::models::{User, UserValidationError};
use crate::domain::otp::{self, OtpRecord, OtpStore, MAX_OTP_ATTEMPTS, OTP_TTL_SECONDS};
use crate::domain::password;
use crate::domain::token::TokenService;
use crate::error::AppError;
use crate::storage::UserRepository;

/// Outcome of the password leg of a login: an OTP is now pending.
#[derive(Debug)]
pub struct LoginOutcome {
    pub message: String,
    pub email: String,
}

/// A fully authenticated session.
#[derive(Debug)]
pub struct AuthenticatedUser {
    pub token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    otp_store: Arc<dyn OtpStore>,
    mailer: OtpMailer,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(
        users: UserRepository,
        otp_store: Arc<dyn OtpStore>,
        mailer: OtpMailer,
        tokens: TokenService,
    ) -> Self {
        Self {
            users,
            otp_store,
            mailer,
            tokens,
        }
    }

    /// Create an account and sign the user straight in.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        plain_password: &str,
    ) -> Result<AuthenticatedUser, AppError> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() || plain_password.is_empty() {
            return Err(AppError::InvalidInput(
                UserValidationError::MissingFields.to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AppError::InvalidInput(
                "Please provide a valid email address.".to_string(),
            ));
        }
        if plain_password.len() < 6 {
            return Err(AppError::InvalidInput(
                UserValidationError::PasswordTooShort.to_string(),
            ));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::InvalidInput(
                UserValidationError::EmailTaken.to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: User::generate_id(),
            name: name.to_string(),
            email,
            password_hash: password::hash_password(plain_password)?,
            is_active: true,
            created_at: now,
            last_login: Some(now),
        };
        self.users.insert(&user).await?;
        info!(user_id = %user.id, "registered new user");

        let token = self.tokens.issue(&user.id)?;
        Ok(AuthenticatedUser { token, user })
    }

    /// Password check, then park an OTP for the second leg. The code is
    /// never returned to the caller.
    pub async fn login(
        &self,
        email: &str,
        plain_password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AppError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.users.find_by_email(&email).await? else {
            return Err(AppError::Unauthorized(
                "Invalid email or password.".to_string(),
            ));
        };
        if !user.is_active {
            return Err(AppError::Unauthorized(
                "This account has been deactivated.".to_string(),
            ));
        }
        if !password::verify_password(plain_password, &user.password_hash)? {
            return Err(AppError::Unauthorized(
                "Invalid email or password.".to_string(),
            ));
        }

        let record = OtpRecord {
            code: otp::generate_code(),
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            expires_at: now + Duration::seconds(OTP_TTL_SECONDS as i64),
        };
        self.otp_store.put(&email, &record, OTP_TTL_SECONDS).await?;

        let message = self.deliver_code(&email, &record).await;
        Ok(LoginOutcome { message, email })
    }

    /// Second leg: check the code against the pending record.
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedUser, AppError> {
        let email = email.trim().to_lowercase();
        let Some(record) = self.otp_store.get(&email).await? else {
            return Err(AppError::Unauthorized(
                "OTP expired or not found. Please login again.".to_string(),
            ));
        };

        if now > record.expires_at {
            self.otp_store.delete(&email).await?;
            return Err(AppError::Unauthorized(
                "OTP expired or not found. Please login again.".to_string(),
            ));
        }

        if record.code != code {
            let attempts = self.otp_store.record_failed_attempt(&email).await?;
            if attempts >= MAX_OTP_ATTEMPTS {
                self.otp_store.delete(&email).await?;
                return Err(AppError::Unauthorized(
                    "Too many wrong OTP attempts. Please login again.".to_string(),
                ));
            }
            return Err(AppError::Unauthorized(format!(
                "Wrong OTP. {} attempts remaining.",
                MAX_OTP_ATTEMPTS - attempts
            )));
        }

        self.otp_store.delete(&email).await?;

        let Some(user) = self.users.find_by_id(&record.user_id).await? else {
            return Err(AppError::Unauthorized(
                "Account no longer exists.".to_string(),
            ));
        };
        self.users.set_last_login(&user.id, now).await?;
        info!(user_id = %user.id, "login verified");

        let token = self.tokens.issue(&user.id)?;
        Ok(AuthenticatedUser {
            token,
            user: User {
                last_login: Some(now),
                ..user
            },
        })
    }

    /// Replace a pending code with a fresh one, resetting the attempt count.
    pub async fn resend_otp(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AppError> {
        let email = email.trim().to_lowercase();
        let Some(previous) = self.otp_store.get(&email).await? else {
            return Err(AppError::Unauthorized(
                "No pending login for this email. Please login again.".to_string(),
            ));
        };

        let record = OtpRecord {
            code: otp::generate_code(),
            expires_at: now + Duration::seconds(OTP_TTL_SECONDS as i64),
            ..previous
        };
        self.otp_store.put(&email, &record, OTP_TTL_SECONDS).await?;

        let message = self.deliver_code(&email, &record).await;
        Ok(LoginOutcome { message, email })
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        name: &str,
        email: &str,
    ) -> Result<User, AppError> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() {
            return Err(AppError::InvalidInput(
                "Name and email are required.".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AppError::InvalidInput(
                "Please provide a valid email address.".to_string(),
            ));
        }
        if self.users.email_taken_by_other(&email, user_id).await? {
            return Err(AppError::InvalidInput(
                UserValidationError::EmailTaken.to_string(),
            ));
        }

        self.users.update_profile(user_id, name, &email).await?;
        self.get_user(user_id).await
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        if new.len() < 6 {
            return Err(AppError::InvalidInput(
                UserValidationError::PasswordTooShort.to_string(),
            ));
        }
        let user = self.get_user(user_id).await?;
        if !password::verify_password(current, &user.password_hash)? {
            return Err(AppError::Unauthorized(
                "Current password is incorrect.".to_string(),
            ));
        }
        let hash = password::hash_password(new)?;
        self.users.update_password(user_id, &hash).await?;
        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// Email delivery never blocks a login; the returned message tells the
    /// client which path was taken.
    async fn deliver_code(&self, email: &str, record: &OtpRecord) -> String {
        if !self.mailer.is_configured() {
            return "OTP generated.".to_string();
        }
        match self.mailer.send_otp(email, &record.user_name, &record.code).await {
            Ok(()) => "OTP sent to your email!".to_string(),
            Err(e) => {
                warn!("OTP email delivery failed: {e}");
                "OTP generated, but email could not be sent.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email_service::EmailConfig;
    use crate::domain::otp::MemoryOtpStore;
    use crate::storage::DbConnection;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    async fn service() -> (AuthService, Arc<MemoryOtpStore>, TokenService) {
        let db = DbConnection::init_test().await.expect("test db");
        let store = Arc::new(MemoryOtpStore::new());
        let tokens = TokenService::new(SECRET, 3600).expect("tokens");
        let auth = AuthService::new(
            UserRepository::new(db),
            store.clone(),
            OtpMailer::new(EmailConfig::default()).expect("mailer"),
            tokens.clone(),
        );
        (auth, store, tokens)
    }

    #[tokio::test]
    async fn test_register_login_verify_roundtrip() {
        let (auth, store, tokens) = service().await;

        let registered = auth
            .register("Asha", "Asha@Example.com", "secret1")
            .await
            .expect("register");
        assert_eq!(registered.user.email, "asha@example.com");
        assert_eq!(tokens.verify(&registered.token).expect("token"), registered.user.id);

        let now = Utc::now();
        let outcome = auth
            .login("asha@example.com", "secret1", now)
            .await
            .expect("login");
        assert_eq!(outcome.message, "OTP generated.");

        let code = store
            .get("asha@example.com")
            .await
            .expect("get")
            .expect("pending")
            .code;
        let verified = auth
            .verify_otp("asha@example.com", &code, now)
            .await
            .expect("verify");
        assert_eq!(verified.user.id, registered.user.id);
        assert_eq!(verified.user.last_login, Some(now));

        // Code is single-use
        assert!(auth.verify_otp("asha@example.com", &code, now).await.is_err());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (auth, _, _) = service().await;
        auth.register("Asha", "a@example.com", "secret1")
            .await
            .expect("register");

        let now = Utc::now();
        assert!(matches!(
            auth.login("a@example.com", "wrong", now).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "secret1", now).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (auth, _, _) = service().await;
        assert!(auth.register("", "a@example.com", "secret1").await.is_err());
        assert!(auth.register("Asha", "not-an-email", "secret1").await.is_err());
        assert!(auth.register("Asha", "a@example.com", "short").await.is_err());

        auth.register("Asha", "a@example.com", "secret1")
            .await
            .expect("register");
        assert!(auth.register("Ravi", "a@example.com", "secret2").await.is_err());
    }

    #[tokio::test]
    async fn test_attempt_cap_discards_code() {
        let (auth, store, _) = service().await;
        auth.register("Asha", "a@example.com", "secret1")
            .await
            .expect("register");

        let now = Utc::now();
        auth.login("a@example.com", "secret1", now).await.expect("login");

        for remaining in (1..MAX_OTP_ATTEMPTS).rev() {
            let err = auth
                .verify_otp("a@example.com", "000000", now)
                .await
                .expect_err("wrong code");
            assert_eq!(
                err.to_string(),
                format!("Wrong OTP. {remaining} attempts remaining.")
            );
        }

        let err = auth
            .verify_otp("a@example.com", "000000", now)
            .await
            .expect_err("cap reached");
        assert_eq!(
            err.to_string(),
            "Too many wrong OTP attempts. Please login again."
        );
        assert!(store.get("a@example.com").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_expired_code_is_discarded() {
        let (auth, store, _) = service().await;
        auth.register("Asha", "a@example.com", "secret1")
            .await
            .expect("register");

        let issued = Utc::now();
        auth.login("a@example.com", "secret1", issued).await.expect("login");
        let code = store
            .get("a@example.com")
            .await
            .expect("get")
            .expect("pending")
            .code;

        let later = issued + Duration::seconds(OTP_TTL_SECONDS as i64 + 1);
        let err = auth
            .verify_otp("a@example.com", &code, later)
            .await
            .expect_err("expired");
        assert_eq!(
            err.to_string(),
            "OTP expired or not found. Please login again."
        );
        assert!(store.get("a@example.com").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_resend_replaces_code_and_resets_attempts() {
        let (auth, store, _) = service().await;
        auth.register("Asha", "a@example.com", "secret1")
            .await
            .expect("register");

        let now = Utc::now();
        auth.login("a@example.com", "secret1", now).await.expect("login");
        auth.verify_otp("a@example.com", "000000", now)
            .await
            .expect_err("wrong code");

        auth.resend_otp("a@example.com", now).await.expect("resend");
        let err = auth
            .verify_otp("a@example.com", "000000", now)
            .await
            .expect_err("wrong code");
        // Back to a fresh attempt budget
        assert_eq!(
            err.to_string(),
            format!("Wrong OTP. {} attempts remaining.", MAX_OTP_ATTEMPTS - 1)
        );

        // Resend without a pending login is refused
        store.delete("a@example.com").await.expect("delete");
        assert!(auth.resend_otp("a@example.com", now).await.is_err());
    }

    #[tokio::test]
    async fn test_update_profile_and_change_password() {
        let (auth, _, _) = service().await;
        let registered = auth
            .register("Asha", "a@example.com", "secret1")
            .await
            .expect("register");
        let other = auth
            .register("Ravi", "r@example.com", "secret2")
            .await
            .expect("register");

        let updated = auth
            .update_profile(&registered.user.id, "Asha K", "asha.k@example.com")
            .await
            .expect("update");
        assert_eq!(updated.name, "Asha K");
        assert_eq!(updated.email, "asha.k@example.com");

        // Cannot take someone else's email
        assert!(auth
            .update_profile(&registered.user.id, "Asha K", "r@example.com")
            .await
            .is_err());
        let _ = other;

        assert!(auth
            .change_password(&registered.user.id, "wrong", "newsecret")
            .await
            .is_err());
        auth.change_password(&registered.user.id, "secret1", "newsecret")
            .await
            .expect("change");
        assert!(auth
            .login("asha.k@example.com", "newsecret", Utc::now())
            .await
            .is_ok());
    }
}
