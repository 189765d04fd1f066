//! Drives the full router the way an HTTP client would.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use http_body_util::BodyExt;
use parley_config::{AppConfig, DatabaseConfig};
use parley_gateway::{create_gateway_state, create_router, GatewayState};
use parley_realtime::{channel_name, Broadcaster, LocalBroadcaster};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestApp {
    router: Router,
    state: Arc<GatewayState>,
    _temp_dir: TempDir,
}

struct Session {
    token: String,
    user_id: String,
}

impl TestApp {
    async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.database = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("gateway.db").display()),
            max_connections: 4,
        };
        config.realtime.channel_secret = "test-secret".to_string();

        let pool = parley_database::initialize_database(&config.database)
            .await
            .unwrap();
        let broadcaster: Arc<dyn Broadcaster> = Arc::new(LocalBroadcaster::new(16));
        let state = create_gateway_state(pool, &config, broadcaster);

        Self {
            router: create_router(state.clone()),
            state,
            _temp_dir: temp_dir,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn sign_up(&self, username: &str) -> Session {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/credentials",
                None,
                Some(json!({
                    "username": username,
                    "password": "hunter22",
                    "email": format!("{username}@example.com"),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        Session {
            token: body["token"].as_str().unwrap().to_string(),
            user_id: body["user"]["id"].as_str().unwrap().to_string(),
        }
    }

    /// Alice invites bob and both get a session.
    async fn pair(&self) -> (Session, Session, String) {
        let alice = self.sign_up("alice").await;
        let bob = self.sign_up("bob").await;
        let (status, body) = self
            .send(
                Method::POST,
                "/api/chatrooms/invite",
                Some(&alice.token),
                Some(json!({ "toUser": "bob" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let chatroom_id = body["id"].as_str().unwrap().to_string();
        (alice, bob, chatroom_id)
    }

    async fn authorize_channel(&self, channel: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/pusher")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "socket_id=123.456&channel_name={channel}"
            )))
            .unwrap();
        self.dispatch(request).await
    }

    /// Serve the router on an ephemeral port for WebSocket clients.
    async fn listen(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }
}

async fn open_channel(
    addr: SocketAddr,
    channel: &str,
    channel_token: &str,
    session_token: &str,
) -> Result<Socket, tungstenite::Error> {
    let url = format!(
        "ws://{addr}/ws?channel={channel}&auth={channel_token}&token={session_token}"
    );
    connect_async(url).await.map(|(socket, _)| socket)
}

async fn next_frame(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("no frame within two seconds")
            .expect("socket closed")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn rejected_with(result: Result<Socket, tungstenite::Error>, expected: StatusCode) {
    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), expected.as_u16())
        }
        Err(other) => panic!("unexpected handshake error: {other}"),
        Ok(_) => panic!("handshake should have been refused"),
    }
}

fn message(sender_id: &str, content: &str) -> Value {
    json!({
        "senderId": sender_id,
        "content": content,
        "highlight": false,
        "visible": true,
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/chatrooms", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "401");

    let (status, _) = app
        .send(Method::GET, "/api/auth/me", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn credentials_sign_up_then_sign_in() {
    let app = TestApp::new().await;
    let first = app.sign_up("alice").await;

    let (status, me) = app
        .send(Method::GET, "/api/auth/me", Some(&first.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["provider"], "credentials");
    assert_eq!(me["id"], first.user_id.as_str());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/credentials",
            None,
            Some(json!({ "username": "alice", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/credentials",
            None,
            Some(json!({ "username": "alice", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], first.user_id.as_str());
    assert_ne!(body["token"], first.token.as_str());
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = TestApp::new().await;
    let alice = app.sign_up("alice").await;

    let (status, _) = app
        .send(Method::POST, "/api/auth/logout", Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::GET, "/api/auth/me", Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn github_login_is_unavailable_without_client_credentials() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::GET,
            "/api/auth/github/login?redirect_uri=http://localhost/callback",
            None,
            None,
        )
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "503");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/credentials")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\":"))
        .unwrap();

    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "400");
}

#[tokio::test]
async fn chatroom_lifecycle() {
    let app = TestApp::new().await;
    let alice = app.sign_up("alice").await;
    let token = Some(alice.token.as_str());

    let (status, _) = app
        .send(Method::GET, "/api/chatrooms/latest", token, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, created) = app.send(Method::POST, "/api/chatrooms", token, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (_, list) = app.send(Method::GET, "/api/chatrooms", token, None).await;
    assert_eq!(list["chatrooms"][0]["id"], id.as_str());

    let (_, latest) = app
        .send(Method::GET, "/api/chatrooms/latest", token, None)
        .await;
    assert_eq!(latest["id"], id.as_str());

    let (status, details) = app
        .send(Method::GET, &format!("/api/chatrooms/{id}"), token, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["users"][0]["username"], "alice");

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/chatrooms/{id}"),
            token,
            Some(json!({ "image": "not a url" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .send(
            Method::PUT,
            &format!("/api/chatrooms/{id}"),
            token,
            Some(json!({ "image": "https://example.com/new.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated, json!({ "id": id, "image": "https://example.com/new.png" }));

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/chatrooms/{id}"), token, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::GET, &format!("/api/chatrooms/{id}"), token, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invite_and_search() {
    let app = TestApp::new().await;
    let (alice, bob, chatroom_id) = app.pair().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/chatrooms/invite",
            Some(&bob.token),
            Some(json!({ "toUser": "alice" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["id"], chatroom_id.as_str());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/chatrooms/invite",
            Some(&alice.token),
            Some(json!({ "toUser": "carol" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            Method::GET,
            "/api/chatrooms/search?username=bob",
            Some(&alice.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], chatroom_id.as_str());

    let (status, _) = app
        .send(
            Method::GET,
            "/api/chatrooms/search?username=carol",
            Some(&alice.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, overview) = app
        .send(Method::GET, "/api/chatrooms/overview", Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview[0]["id"], chatroom_id.as_str());
    assert_eq!(overview[0]["users"][0]["username"], "bob");
    assert_eq!(overview[0]["lastMessage"], Value::Null);
}

#[tokio::test]
async fn messages_round_trip_through_the_channel() {
    let app = TestApp::new().await;
    let (alice, bob, chatroom_id) = app.pair().await;
    let uri = format!("/api/messages/{chatroom_id}");

    let (status, body) = app.send(Method::GET, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let mut events = app
        .state
        .broadcaster()
        .subscribe(&channel_name(&chatroom_id))
        .await
        .unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            Some(&alice.token),
            Some(message(&alice.user_id, "hello bob")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));

    let envelope = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.event, "message:update");
    assert_eq!(envelope.data["senderId"], alice.user_id.as_str());
    assert_eq!(envelope.data["messages"]["messages"][0]["content"], "hello bob");

    let (_, history) = app.send(Method::GET, &uri, Some(&bob.token), None).await;
    assert_eq!(history["id"], chatroom_id.as_str());
    let message_id = history["messages"][0]["displayId"]
        .as_str()
        .unwrap()
        .to_string();

    let mut change = message(&alice.user_id, "hello bob");
    change["messageId"] = json!(message_id);
    change["highlight"] = json!(true);
    let (status, _) = app
        .send(Method::PUT, &uri, Some(&bob.token), Some(change.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = app.send(Method::GET, &uri, Some(&alice.token), None).await;
    assert_eq!(history["messages"][0]["highlight"], true);

    let (status, _) = app
        .send(Method::DELETE, &uri, Some(&alice.token), Some(change))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = app.send(Method::GET, &uri, Some(&alice.token), None).await;
    assert_eq!(history, Value::Null);
}

#[tokio::test]
async fn message_writes_are_checked() {
    let app = TestApp::new().await;
    let (alice, bob, chatroom_id) = app.pair().await;
    let carol = app.sign_up("carol").await;
    let uri = format!("/api/messages/{chatroom_id}");

    let (status, _) = app
        .send(
            Method::POST,
            &uri,
            Some(&alice.token),
            Some(message(&bob.user_id, "pretending")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            &uri,
            Some(&alice.token),
            Some(message(&alice.user_id, &"x".repeat(281))),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            &uri,
            Some(&carol.token),
            Some(message(&carol.user_id, "let me in")),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut change = message(&alice.user_id, "ghost");
    change["messageId"] = json!("missing");
    let (status, _) = app
        .send(Method::DELETE, &uri, Some(&alice.token), Some(change))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn channel_authorization_checks_membership() {
    let app = TestApp::new().await;
    let (alice, _bob, chatroom_id) = app.pair().await;
    let carol = app.sign_up("carol").await;
    let channel = channel_name(&chatroom_id);

    let (status, body) = app.authorize_channel(&channel, &alice.token).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["channel_data"], r#"{"user_id":"alice@example.com"}"#);
    let claims = app
        .state
        .channel_authorizer()
        .verify(body["auth"].as_str().unwrap(), &channel)
        .unwrap();
    assert_eq!(claims.sub, alice.user_id);
    assert_eq!(claims.socket_id, "123.456");

    let (status, _) = app.authorize_channel(&channel, &carol.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.authorize_channel("presence-lobby", &alice.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn websocket_route_needs_a_session() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(Method::GET, "/ws?channel=private-x&auth=y", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn websocket_relays_channel_events() {
    let app = TestApp::new().await;
    let (alice, bob, chatroom_id) = app.pair().await;
    let channel = channel_name(&chatroom_id);
    let addr = app.listen().await;

    let (status, grant) = app.authorize_channel(&channel, &bob.token).await;
    assert_eq!(status, StatusCode::OK, "{grant}");
    let mut socket = open_channel(addr, &channel, grant["auth"].as_str().unwrap(), &bob.token)
        .await
        .unwrap();

    let subscribed = next_frame(&mut socket).await;
    assert_eq!(subscribed["event"], "subscription:succeeded");
    assert_eq!(subscribed["data"]["channel"], channel.as_str());

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/messages/{chatroom_id}"),
            Some(&alice.token),
            Some(message(&alice.user_id, "over the wire")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let update = next_frame(&mut socket).await;
    assert_eq!(update["event"], "message:update");
    assert_eq!(update["data"]["senderId"], alice.user_id.as_str());
    assert_eq!(
        update["data"]["messages"]["messages"][0]["content"],
        "over the wire"
    );

    socket.close(None).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn websocket_rejects_a_token_granted_to_another_user() {
    let app = TestApp::new().await;
    let (alice, bob, chatroom_id) = app.pair().await;
    let channel = channel_name(&chatroom_id);
    let addr = app.listen().await;

    let (status, grant) = app.authorize_channel(&channel, &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    let alice_grant = grant["auth"].as_str().unwrap();

    rejected_with(
        open_channel(addr, &channel, alice_grant, &bob.token).await,
        StatusCode::UNAUTHORIZED,
    );
    rejected_with(
        open_channel(addr, &channel, "not-a-jwt", &alice.token).await,
        StatusCode::UNAUTHORIZED,
    );
    rejected_with(
        open_channel(addr, "private-elsewhere", alice_grant, &alice.token).await,
        StatusCode::UNAUTHORIZED,
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn websocket_rejects_non_members() {
    let app = TestApp::new().await;
    let (_alice, _bob, chatroom_id) = app.pair().await;
    let carol = app.sign_up("carol").await;
    let channel = channel_name(&chatroom_id);
    let addr = app.listen().await;

    // A correctly signed token does not outlive membership.
    let grant = app
        .state
        .channel_authorizer()
        .authorize("1.1", &channel, &carol.user_id, "carol@example.com")
        .unwrap();

    rejected_with(
        open_channel(addr, &channel, &grant.auth, &carol.token).await,
        StatusCode::UNAUTHORIZED,
    );
}
