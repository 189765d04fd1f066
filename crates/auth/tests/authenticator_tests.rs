use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use parley_auth::{AuthError, Authenticator, Credentials, GithubProfile};
use parley_config::{AuthConfig, DatabaseConfig, GithubAuthConfig, DEFAULT_AVATAR_URL};
use parley_database::AuthProvider;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn default_auth_config() -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
        ..AuthConfig::default()
    }
}

fn github_auth_config() -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
        github: GithubAuthConfig {
            client_id: Some("test-client-id".into()),
            client_secret: Some("test-client-secret".into()),
        },
        ..AuthConfig::default()
    }
}

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new(config: AuthConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let database = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("auth.sqlite").display()),
            max_connections: 5,
        };

        let pool = parley_database::initialize_database(&database).await?;
        let authenticator = Authenticator::new(pool.clone(), config);

        Ok(Self {
            pool,
            authenticator,
            _temp_dir: temp_dir,
        })
    }

    async fn new_default() -> TestResult<Self> {
        Self::new(default_auth_config()).await
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

fn sign_up_form(username: &str, password: &str, email: &str) -> Credentials {
    Credentials {
        username: username.into(),
        password: password.into(),
        email: Some(email.into()),
        image: None,
    }
}

fn sign_in_form(username: &str, password: &str) -> Credentials {
    Credentials {
        username: username.into(),
        password: password.into(),
        ..Credentials::default()
    }
}

#[tokio::test]
async fn unknown_username_signs_up_with_argon2_hash() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let (user, session) = ctx
        .authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "Alice@Example.com"))
        .await?;

    assert_eq!(user.username, "alice");
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.provider, AuthProvider::Credentials);
    assert_eq!(user.image, DEFAULT_AVATAR_URL);
    assert_eq!(session.user_id, user.id);

    let row = sqlx::query("SELECT hashed_password, provider FROM users WHERE id = ?")
        .bind(user.id)
        .fetch_one(ctx.pool())
        .await?;
    let hash: String = row.get("hashed_password");
    let provider: String = row.get("provider");
    assert!(hash.starts_with("$argon2"), "secret must be an argon2 hash");
    assert_eq!(provider, "credentials");

    Ok(())
}

#[tokio::test]
async fn sign_up_requires_an_email() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let err = ctx
        .authenticator()
        .authorize_credentials(Credentials {
            email: Some(String::new()),
            ..sign_in_form("alice", "s3cret")
        })
        .await
        .expect_err("sign-up without email must fail");
    assert!(matches!(err, AuthError::Validation(_)));

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(users, 0);
    Ok(())
}

#[tokio::test]
async fn sign_up_keeps_a_custom_image() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let (user, _) = ctx
        .authenticator()
        .authorize_credentials(Credentials {
            image: Some("https://example.com/me.png".into()),
            ..sign_up_form("alice", "s3cret", "alice@example.com")
        })
        .await?;

    assert_eq!(user.image, "https://example.com/me.png");
    Ok(())
}

#[tokio::test]
async fn existing_username_signs_in_with_correct_password() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (registered, _) = ctx
        .authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "alice@example.com"))
        .await?;

    let (user, session) = ctx
        .authenticator()
        .authorize_credentials(sign_in_form("alice", "s3cret"))
        .await?;

    assert_eq!(user.public_id, registered.public_id);
    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
        .bind(user.id)
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(sessions, 2);
    assert!(!session.token.is_empty());
    Ok(())
}

#[tokio::test]
async fn sign_in_rejects_wrong_password() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "alice@example.com"))
        .await?;

    let err = ctx
        .authenticator()
        .authorize_credentials(sign_in_form("alice", "wrong-password"))
        .await
        .expect_err("wrong password must be rejected");
    assert!(matches!(err, AuthError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn sign_up_rejects_an_email_already_in_use() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "shared@example.com"))
        .await?;

    let err = ctx
        .authenticator()
        .authorize_credentials(sign_up_form("bob", "s3cret", "SHARED@example.com"))
        .await
        .expect_err("duplicate email must be rejected");
    assert!(matches!(err, AuthError::EmailTaken));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sign_ups_with_distinct_names_all_succeed() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let authenticator = ctx.authenticator().clone();
            tokio::spawn(async move {
                authenticator
                    .authorize_credentials(sign_up_form(
                        &format!("user{i}"),
                        "s3cret",
                        &format!("user{i}@example.com"),
                    ))
                    .await
                    .map(|(user, _)| user.username)
                    .map_err(|err| format!("{err:?}"))
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await?;
        assert!(outcome.is_ok(), "sign-up failed: {outcome:?}");
    }

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(users, 12);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sign_ups_with_the_same_name_converge_on_one_user() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let authenticator = ctx.authenticator().clone();
            tokio::spawn(async move {
                authenticator
                    .authorize_credentials(sign_up_form("samename", "s3cret", "same@example.com"))
                    .await
                    .map(|(user, _)| user.public_id)
                    .map_err(|err| format!("{err:?}"))
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        match handle.await? {
            Ok(id) => ids.push(id),
            Err(err) => panic!("sign-up failed: {err}"),
        }
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every request should resolve to the same user");

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(sessions, 4);
    Ok(())
}

#[tokio::test]
async fn github_user_cannot_sign_in_with_a_password() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator()
        .login_with_github_profile(GithubProfile {
            login: "octocat".into(),
            email: Some("octocat@github.com".into()),
            avatar_url: None,
        })
        .await?;

    let err = ctx
        .authenticator()
        .authorize_credentials(sign_in_form("octocat", "anything"))
        .await
        .expect_err("github users have no password");
    assert!(matches!(err, AuthError::ProviderMismatch(_)));
    Ok(())
}

#[tokio::test]
async fn github_profile_creates_user_once() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let profile = GithubProfile {
        login: "octocat".into(),
        email: None,
        avatar_url: Some("https://avatars.example/octocat".into()),
    };

    let (first, _) = ctx
        .authenticator()
        .login_with_github_profile(profile.clone())
        .await?;
    let (second, _) = ctx.authenticator().login_with_github_profile(profile).await?;

    assert_eq!(first.public_id, second.public_id);
    assert_eq!(first.provider, AuthProvider::Github);
    assert_eq!(first.email, "octocat@users.noreply.github.com");
    assert_eq!(first.image, "https://avatars.example/octocat");
    assert!(first.hashed_password.is_none());
    Ok(())
}

#[tokio::test]
async fn github_profile_rejects_credentials_username() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator()
        .authorize_credentials(sign_up_form("octocat", "s3cret", "octo@example.com"))
        .await?;

    let err = ctx
        .authenticator()
        .login_with_github_profile(GithubProfile {
            login: "octocat".into(),
            email: None,
            avatar_url: None,
        })
        .await
        .expect_err("credentials account must not be taken over");
    assert!(matches!(err, AuthError::ProviderMismatch(_)));
    Ok(())
}

#[tokio::test]
async fn login_with_github_code_requires_github_configuration() -> TestResult {
    let ctx = TestContext::new_default().await?;
    assert!(!ctx.authenticator().github_enabled());

    let err = ctx
        .authenticator()
        .login_with_github_code("code", "https://example.com/callback")
        .await
        .expect_err("github disabled");
    assert!(matches!(err, AuthError::GithubOauthDisabled));
    Ok(())
}

#[tokio::test]
async fn github_exchange_code_rejects_invalid_redirect_before_network() -> TestResult {
    let ctx = TestContext::new(github_auth_config()).await?;
    let err = ctx
        .authenticator()
        .login_with_github_code("invalid-code", "not-a-valid-url")
        .await
        .expect_err("invalid redirect URI should fail before network request");
    assert!(matches!(err, AuthError::GithubOauth(_)));
    Ok(())
}

#[tokio::test]
async fn github_authorization_url_includes_required_scopes_and_state() -> TestResult {
    let ctx = TestContext::new(github_auth_config()).await?;
    assert!(ctx.authenticator().github_enabled());

    let state = "state-token-123";
    let url = ctx
        .authenticator()
        .github_authorization_url(state, "https://example.com/callback")?;

    let parsed = reqwest::Url::parse(&url)?;
    let query = parsed.query_pairs().collect::<Vec<_>>();

    assert!(query.iter().any(|(k, v)| k == "state" && v == state));
    assert!(query
        .iter()
        .any(|(k, v)| k == "scope" && v.contains("read:user")));
    assert!(query
        .iter()
        .any(|(k, v)| k == "scope" && v.contains("user:email")));
    Ok(())
}

#[tokio::test]
async fn authenticate_token_returns_user_and_session_for_active_token() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (user, session) = ctx
        .authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "alice@example.com"))
        .await?;

    let (found, found_session) = ctx.authenticator().authenticate_token(&session.token).await?;
    assert_eq!(found.public_id, user.public_id);
    assert_eq!(found_session.user_id, user.id);

    let remaining = found_session.expires_at - Utc::now();
    assert!(remaining > Duration::seconds(3_500));
    assert!(remaining <= Duration::seconds(3_600));
    Ok(())
}

#[tokio::test]
async fn authenticate_token_deletes_expired_sessions() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (_, session) = ctx
        .authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "alice@example.com"))
        .await?;

    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE token = ?")
        .bind(&past)
        .bind(&session.token)
        .execute(ctx.pool())
        .await?;

    let err = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await
        .expect_err("expired session must be rejected");
    assert!(matches!(err, AuthError::SessionExpired));

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token = ?")
        .bind(&session.token)
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(remaining, 0);
    Ok(())
}

#[tokio::test]
async fn authenticate_token_rejects_unknown_token() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let err = ctx
        .authenticator()
        .authenticate_token("missing-token")
        .await
        .expect_err("unknown token");
    assert!(matches!(err, AuthError::SessionNotFound));
    Ok(())
}

#[tokio::test]
async fn logout_removes_the_session() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (_, session) = ctx
        .authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "alice@example.com"))
        .await?;

    ctx.authenticator().logout(&session.token).await?;
    ctx.authenticator().logout(&session.token).await?;

    let err = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await
        .expect_err("logged out session");
    assert!(matches!(err, AuthError::SessionNotFound));
    Ok(())
}

#[tokio::test]
async fn session_serializes_token_and_expiry_only() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let (_, session) = ctx
        .authenticator()
        .authorize_credentials(sign_up_form("alice", "s3cret", "alice@example.com"))
        .await?;

    let json = serde_json::to_value(&session)?;
    assert_eq!(json["token"], session.token.as_str());
    assert!(json.get("expires_at").is_some());
    assert!(json.get("user_id").is_none());
    Ok(())
}
