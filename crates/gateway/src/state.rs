//! Shared application state for the gateway

use std::sync::Arc;

use parley_auth::Authenticator;
use parley_chats::{ChatroomService, MessageService};
use parley_config::AppConfig;
use parley_database::SqlitePool;
use parley_realtime::{Broadcaster, ChannelAuthorizer};

/// Services shared by every handler.
#[derive(Clone)]
pub struct GatewayState {
    authenticator: Authenticator,
    chatroom_service: ChatroomService,
    message_service: MessageService,
    broadcaster: Arc<dyn Broadcaster>,
    channel_authorizer: ChannelAuthorizer,
}

impl GatewayState {
    /// Wire the services over one pool and one broadcaster.
    pub fn new(pool: SqlitePool, config: &AppConfig, broadcaster: Arc<dyn Broadcaster>) -> Self {
        let authenticator = Authenticator::new(pool.clone(), config.auth.clone());
        let chatroom_service = ChatroomService::new(
            pool.clone(),
            broadcaster.clone(),
            config.auth.default_avatar_url.clone(),
        );
        let message_service = MessageService::new(pool, broadcaster.clone());
        let channel_authorizer = ChannelAuthorizer::new(
            &config.realtime.channel_secret,
            config.realtime.channel_token_ttl_seconds,
        );

        Self {
            authenticator,
            chatroom_service,
            message_service,
            broadcaster,
            channel_authorizer,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn chatroom_service(&self) -> &ChatroomService {
        &self.chatroom_service
    }

    pub fn message_service(&self) -> &MessageService {
        &self.message_service
    }

    pub fn broadcaster(&self) -> &Arc<dyn Broadcaster> {
        &self.broadcaster
    }

    pub fn channel_authorizer(&self) -> &ChannelAuthorizer {
        &self.channel_authorizer
    }
}

/// Build the state shared by the router.
pub fn create_gateway_state(
    pool: SqlitePool,
    config: &AppConfig,
    broadcaster: Arc<dyn Broadcaster>,
) -> Arc<GatewayState> {
    Arc::new(GatewayState::new(pool, config, broadcaster))
}
