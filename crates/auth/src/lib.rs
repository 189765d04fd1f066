use anyhow::Context;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use rand::RngCore;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

use parley_config::{AuthConfig, GithubAuthConfig};
use parley_database::entities::{new_public_id, timestamp};
use parley_database::{AuthProvider, DatabaseError, User, UserRepository};

const GITHUB_USER_API: &str = "https://api.github.com/user";
const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

pub const MAX_USERNAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// Upper bound for session lifetimes, roughly a century.
const MAX_SESSION_TTL_SECONDS: i64 = 100 * 365 * 86_400;

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    users: UserRepository,
    session_ttl: Duration,
    default_avatar_url: String,
    github: Option<GithubOAuth>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username {0} belongs to another sign-in provider")]
    ProviderMismatch(String),
    #[error("email is already registered")]
    EmailTaken,
    #[error("github oauth is not configured")]
    GithubOauthDisabled,
    #[error("github oauth error: {0}")]
    GithubOauth(#[from] anyhow::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("repository error: {0}")]
    Repository(#[from] DatabaseError),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session token")]
    InvalidSession,
}

/// Sign-in form. Unknown usernames are signed up with the same fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(skip)]
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GithubProfile {
    pub login: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        let session_ttl = Duration::seconds(
            i64::try_from(config.session_ttl_seconds)
                .unwrap_or(i64::MAX)
                .min(MAX_SESSION_TTL_SECONDS),
        );
        let github = GithubOAuth::from_config(&config.github);

        Self {
            users: UserRepository::new(pool.clone()),
            pool,
            session_ttl,
            default_avatar_url: config.default_avatar_url,
            github,
        }
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn github_enabled(&self) -> bool {
        self.github.is_some()
    }

    pub fn github_authorization_url(
        &self,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        let github = self.github.as_ref().ok_or(AuthError::GithubOauthDisabled)?;
        github
            .authorize_url(state, redirect_uri)
            .map_err(AuthError::GithubOauth)
    }

    /// Sign in an existing credentials user, or sign up a new one when the username is free.
    pub async fn authorize_credentials(
        &self,
        credentials: Credentials,
    ) -> Result<(User, AuthSession), AuthError> {
        let credentials = validate_credentials(credentials)?;

        let user = match self.users.find_by_username(&credentials.username).await? {
            Some(user) => self.sign_in(user, &credentials.password)?,
            None => self.sign_up(credentials).await?,
        };

        let session = self.issue_session(user.id).await?;
        Ok((user, session))
    }

    fn sign_in(&self, user: User, password: &str) -> Result<User, AuthError> {
        if user.provider != AuthProvider::Credentials {
            return Err(AuthError::ProviderMismatch(user.username));
        }

        let Some(secret) = user.hashed_password.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };

        let stored_hash = PasswordHash::new(secret)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        debug!(user = %user.public_id, "credentials verified");
        Ok(user)
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<User, AuthError> {
        let email = credentials
            .email
            .ok_or_else(|| AuthError::Validation("email is required to sign up".into()))?;
        let image = credentials
            .image
            .unwrap_or_else(|| self.default_avatar_url.clone());
        let password_hash = self.hash_password(&credentials.password)?;

        let inserted = self
            .insert_user(NewUser {
                username: credentials.username.clone(),
                email,
                hashed_password: Some(password_hash),
                provider: AuthProvider::Credentials,
                image,
            })
            .await?;

        match inserted {
            Some(user) => {
                info!(user = %user.public_id, username = %user.username, "registered credentials user");
                Ok(user)
            }
            // Another request registered the same username first.
            None => {
                let user = self
                    .users
                    .find_by_username(&credentials.username)
                    .await?
                    .ok_or(AuthError::InvalidCredentials)?;
                self.sign_in(user, &credentials.password)
            }
        }
    }

    pub async fn login_with_github_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<(User, AuthSession), AuthError> {
        let github = self.github.as_ref().ok_or(AuthError::GithubOauthDisabled)?;

        let profile = github
            .exchange_code(code, redirect_uri)
            .await
            .map_err(AuthError::GithubOauth)?;

        self.login_with_github_profile(profile).await
    }

    /// Find the user named after the GitHub login, creating it on first sign-in.
    pub async fn login_with_github_profile(
        &self,
        profile: GithubProfile,
    ) -> Result<(User, AuthSession), AuthError> {
        if profile.login.trim().is_empty() {
            return Err(AuthError::Validation("github login is empty".into()));
        }

        let user = match self.users.find_by_username(&profile.login).await? {
            Some(user) => user,
            None => {
                let email = profile
                    .email
                    .filter(|email| !email.trim().is_empty())
                    .unwrap_or_else(|| format!("{}@users.noreply.github.com", profile.login));
                let image = profile
                    .avatar_url
                    .filter(|url| !url.trim().is_empty())
                    .unwrap_or_else(|| self.default_avatar_url.clone());

                let inserted = self
                    .insert_user(NewUser {
                        username: profile.login.clone(),
                        email: email.to_lowercase(),
                        hashed_password: None,
                        provider: AuthProvider::Github,
                        image,
                    })
                    .await?;

                match inserted {
                    Some(user) => {
                        info!(user = %user.public_id, username = %user.username, "registered github user");
                        user
                    }
                    None => self
                        .users
                        .find_by_username(&profile.login)
                        .await?
                        .ok_or(AuthError::InvalidCredentials)?,
                }
            }
        };
        if user.provider != AuthProvider::Github {
            return Err(AuthError::ProviderMismatch(user.username));
        }

        let session = self.issue_session(user.id).await?;
        Ok((user, session))
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let user_id: i64 = row.try_get("user_id")?;
        let expires_at: String = row.try_get("expires_at")?;

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| AuthError::InvalidSession)?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&self.pool)
                .await?;
            debug!(user_id, "removed expired session");
            return Err(AuthError::SessionExpired);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        let session = AuthSession {
            token: token.to_owned(),
            user_id,
            expires_at,
        };

        Ok((user, session))
    }

    /// Forget a session. Unknown tokens are not an error.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let removed = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!(removed, "logged out session");
        Ok(())
    }

    /// Insert a user in a single statement.
    ///
    /// Returns `None` when the username is already registered. A taken email
    /// is reported as [`AuthError::EmailTaken`].
    async fn insert_user(&self, user: NewUser) -> Result<Option<User>, AuthError> {
        let public_id = new_public_id();
        let created_at = timestamp();

        let result = sqlx::query(
            "INSERT INTO users (public_id, username, email, hashed_password, provider, image, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.hashed_password.as_deref())
        .bind(user.provider.as_str())
        .bind(&user.image)
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // SQLite reports only the first failing column, so a racing
                // sign-up with the same name and email may surface as either.
                if self.users.exists(&user.username).await? {
                    return Ok(None);
                }
                return match UniqueColumn::from_message(db_err.message()) {
                    Some(UniqueColumn::Email) => Err(AuthError::EmailTaken),
                    _ => Err(DatabaseError::Duplicate("user".into()).into()),
                };
            }
            Err(error) => return Err(DatabaseError::QueryError(error).into()),
        };

        Ok(Some(User {
            id,
            public_id,
            username: user.username,
            email: user.email,
            provider: user.provider,
            image: user.image,
            hashed_password: user.hashed_password,
            created_at,
        }))
    }

    async fn issue_session(&self, user_id: i64) -> Result<AuthSession, AuthError> {
        let token = generate_session_token();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        sqlx::query(
            "INSERT INTO sessions (user_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            token,
            user_id,
            expires_at,
        })
    }

    fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum UniqueColumn {
    Username,
    Email,
}

impl UniqueColumn {
    /// SQLite names the column as `UNIQUE constraint failed: users.<column>`.
    fn from_message(message: &str) -> Option<Self> {
        if message.contains("users.username") {
            Some(Self::Username)
        } else if message.contains("users.email") {
            Some(Self::Email)
        } else {
            None
        }
    }
}

struct NewUser {
    username: String,
    email: String,
    hashed_password: Option<String>,
    provider: AuthProvider,
    image: String,
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Trim and check a sign-in form. Empty optional fields count as absent.
pub fn validate_credentials(credentials: Credentials) -> Result<Credentials, AuthError> {
    let username = credentials.username.trim().to_string();
    if username.is_empty() {
        return Err(AuthError::Validation("username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::Validation(format!(
            "username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if credentials.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let email = credentials
        .email
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty());
    if let Some(email) = email.as_deref() {
        let valid = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'))
            .unwrap_or(false);
        if !valid {
            return Err(AuthError::Validation(format!("{email} is not a valid email")));
        }
    }

    let image = credentials
        .image
        .map(|image| image.trim().to_string())
        .filter(|image| !image.is_empty());

    Ok(Credentials {
        username,
        password: credentials.password,
        email,
        image,
    })
}

#[derive(Clone)]
struct GithubOAuth {
    client: BasicClient,
    http: reqwest::Client,
}

impl GithubOAuth {
    fn from_config(config: &GithubAuthConfig) -> Option<Self> {
        let client_id = config.client_id.clone()?;
        let client_secret = config.client_secret.clone()?;
        match Self::new(client_id, client_secret) {
            Ok(github) => Some(github),
            Err(error) => {
                warn!(error = %error, "github oauth disabled");
                None
            }
        }
    }

    fn new(client_id: String, client_secret: String) -> anyhow::Result<Self> {
        let client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new(GITHUB_AUTHORIZE_URL.to_string()).context("invalid github auth url")?,
            Some(TokenUrl::new(GITHUB_TOKEN_URL.to_string()).context("invalid github token url")?),
        )
        .set_auth_type(oauth2::AuthType::RequestBody);

        let http = reqwest::Client::builder()
            .user_agent("parley-backend")
            .build()
            .context("failed to build github http client")?;

        Ok(Self { client, http })
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> anyhow::Result<String> {
        let redirect = RedirectUrl::new(redirect_uri.to_owned())
            .context("invalid redirect uri for github oauth")?;

        let (url, _) = self
            .client
            .clone()
            .set_redirect_uri(redirect)
            .authorize_url(|| CsrfToken::new(state.to_owned()))
            .add_scope(Scope::new("read:user".to_string()))
            .add_scope(Scope::new("user:email".to_string()))
            .url();

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> anyhow::Result<GithubProfile> {
        let redirect = RedirectUrl::new(redirect_uri.to_owned())
            .context("invalid redirect uri for github oauth")?;

        let token_response = self
            .client
            .clone()
            .set_redirect_uri(redirect)
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .request_async(async_http_client)
            .await
            .context("failed to exchange github oauth code")?;

        let access_token = token_response.access_token().secret();

        let user: GithubUserResponse = self
            .http
            .get(GITHUB_USER_API)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .context("failed to call github user api")?
            .error_for_status()
            .context("github user api returned error")?
            .json()
            .await
            .context("failed to decode github user response")?;

        debug!(login = %user.login, id = user.id, "fetched github user profile");

        Ok(GithubProfile {
            login: user.login,
            email: user.email,
            avatar_url: user.avatar_url,
        })
    }
}

#[derive(Deserialize)]
struct GithubUserResponse {
    id: i64,
    login: String,
    email: Option<String>,
    avatar_url: Option<String>,
}
