//! Signed permission for a socket to listen on a private channel.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{RealtimeError, RealtimeResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelClaims {
    /// Public id of the user the channel was granted to.
    pub sub: String,
    pub channel: String,
    pub socket_id: String,
    pub iat: usize,
    pub exp: usize,
}

/// Response body handed back to the client library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAuthorization {
    pub auth: String,
    pub channel_data: String,
}

#[derive(Clone)]
pub struct ChannelAuthorizer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: u64,
}

impl ChannelAuthorizer {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    /// Sign a token that lets `socket_id` subscribe to `channel` on behalf of a user.
    ///
    /// Membership must already have been checked by the caller.
    pub fn authorize(
        &self,
        socket_id: &str,
        channel: &str,
        user_id: &str,
        user_email: &str,
    ) -> RealtimeResult<ChannelAuthorization> {
        let now = usize::try_from(Utc::now().timestamp()).unwrap_or(0);
        let ttl = usize::try_from(self.ttl_seconds).unwrap_or(usize::MAX);

        let claims = ChannelClaims {
            sub: user_id.to_string(),
            channel: channel.to_string(),
            socket_id: socket_id.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        let auth = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        let channel_data = serde_json::json!({ "user_id": user_email }).to_string();

        Ok(ChannelAuthorization { auth, channel_data })
    }

    /// Check signature and expiry, and that the token was issued for `channel`.
    pub fn verify(&self, token: &str, channel: &str) -> RealtimeResult<ChannelClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<ChannelClaims>(token, &self.decoding_key, &validation)?.claims;
        if claims.channel != channel {
            return Err(RealtimeError::ChannelMismatch);
        }
        Ok(claims)
    }
}
