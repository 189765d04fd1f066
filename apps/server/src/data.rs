//! Maintenance commands that work on the database directly.

use anyhow::Context;
use parley_auth::Credentials;
use parley_chats::{ChatroomService, InviteOutcome, MessageService, PostMessage};
use parley_config::AppConfig;
use parley_database::{ChatroomRepository, MessageRepository, User, UserRepository};
use parley_runtime::BackendServices;
use tracing::info;

const SEED_PASSWORD: &str = "parley";

pub async fn dump(services: &BackendServices) -> anyhow::Result<()> {
    let users = UserRepository::new(services.db_pool.clone())
        .list()
        .await
        .context("failed to fetch users")?;

    println!("=== USERS ===");
    if users.is_empty() {
        println!("No users found in database");
    } else {
        println!("Found {} users:", users.len());
        println!(
            "{:<5} {:<28} {:<20} {:<30} {:<12} {:<30}",
            "ID", "Public ID", "Username", "Email", "Provider", "Created At"
        );
        println!("{}", "-".repeat(130));
        for user in users {
            println!(
                "{:<5} {:<28} {:<20} {:<30} {:<12} {:<30}",
                user.id,
                user.public_id,
                user.username,
                user.email,
                user.provider.as_str(),
                user.created_at
            );
        }
    }

    let chatrooms = ChatroomRepository::new(services.db_pool.clone());
    let messages = MessageRepository::new(services.db_pool.clone());
    let rooms = chatrooms.list().await.context("failed to fetch chatrooms")?;

    println!("\n=== CHATROOMS ===");
    if rooms.is_empty() {
        println!("No chatrooms found in database");
        return Ok(());
    }

    for room in rooms {
        let members = chatrooms
            .members(room.id)
            .await
            .with_context(|| format!("failed to fetch members of {}", room.public_id))?;
        let history = messages
            .list_for_chatroom(room.id)
            .await
            .with_context(|| format!("failed to fetch messages of {}", room.public_id))?;

        let usernames: Vec<_> = members.iter().map(|m| m.username.as_str()).collect();
        println!(
            "{} ({} members: {}, created {})",
            room.public_id,
            members.len(),
            usernames.join(", "),
            room.created_at
        );

        for message in history {
            let flags = match (message.highlight, message.visible) {
                (true, _) => "*",
                (false, false) => "-",
                (false, true) => " ",
            };
            println!(
                "  {flags} {:<28} {:<28} {}",
                message.created_at,
                message.sender_id,
                truncate(&message.content, 60)
            );
        }
    }

    Ok(())
}

pub async fn clear(services: &BackendServices) -> anyhow::Result<()> {
    let messages = MessageRepository::new(services.db_pool.clone())
        .count()
        .await
        .context("failed to count messages")?;

    parley_database::clear_all(&services.db_pool)
        .await
        .context("failed to clear database")?;

    println!("Database cleared ({messages} messages removed)");
    Ok(())
}

/// Seed two users who share a chatroom. Returns that chatroom's id.
///
/// Running it again signs the same users in and leaves existing messages alone.
pub async fn seed(services: &BackendServices, config: &AppConfig) -> anyhow::Result<String> {
    let alice = seed_user(services, "alice").await?;
    let bob = seed_user(services, "bob").await?;

    let chatrooms = ChatroomService::new(
        services.db_pool.clone(),
        services.broadcaster.clone(),
        config.auth.default_avatar_url.clone(),
    );
    let chatroom_id = match chatrooms
        .invite(&alice, &bob.username)
        .await
        .context("failed to open seed chatroom")?
    {
        InviteOutcome::Created(id) => id,
        InviteOutcome::AlreadyShared(id) => {
            println!("Seed users already share chatroom {id}");
            return Ok(id);
        }
        InviteOutcome::UserNotFound => anyhow::bail!("seed user {} vanished", bob.username),
    };

    let messages = MessageService::new(services.db_pool.clone(), services.broadcaster.clone());
    let script = [
        (&alice, "Hey Bob, welcome to Parley!", false),
        (&bob, "Thanks! Messages show up for both of us right away.", false),
        (&alice, "Highlight this one so it stays on top.", true),
    ];
    for (sender, content, highlight) in script {
        messages
            .post(
                &chatroom_id,
                sender,
                PostMessage {
                    sender_id: sender.public_id.clone(),
                    content: content.to_string(),
                    highlight,
                    visible: true,
                },
            )
            .await
            .context("failed to seed message")?;
    }

    info!(chatroom = %chatroom_id, "seeded database");
    println!("Seeded users alice and bob (password '{SEED_PASSWORD}') in chatroom {chatroom_id}");
    Ok(chatroom_id)
}

async fn seed_user(services: &BackendServices, name: &str) -> anyhow::Result<User> {
    let (user, _session) = services
        .authenticator
        .authorize_credentials(Credentials {
            username: name.to_string(),
            password: SEED_PASSWORD.to_string(),
            email: Some(format!("{name}@parley.local")),
            image: None,
        })
        .await
        .with_context(|| format!("failed to seed user {name}"))?;
    Ok(user)
}

fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let kept: String = content.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
