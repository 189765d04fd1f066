//! Validation utilities.

use crate::ChatError;

pub const MAX_SENDER_ID_LENGTH: usize = 100;
pub const MAX_CONTENT_LENGTH: usize = 280;
pub const MAX_IMAGE_URL_LENGTH: usize = 2048;

/// Validation utilities
pub struct Validator;

impl Validator {
    pub fn sender_id(sender_id: &str) -> Result<(), ChatError> {
        Self::length("senderId", sender_id, 1, MAX_SENDER_ID_LENGTH)
    }

    /// Message text, counted in characters rather than bytes
    pub fn message_content(content: &str) -> Result<(), ChatError> {
        Self::length("content", content, 1, MAX_CONTENT_LENGTH)
    }

    pub fn message_id(message_id: &str) -> Result<(), ChatError> {
        if message_id.trim().is_empty() {
            return Err(ChatError::validation("messageId cannot be empty"));
        }
        Ok(())
    }

    pub fn username(username: &str) -> Result<(), ChatError> {
        if username.trim().is_empty() {
            return Err(ChatError::validation("username cannot be empty"));
        }
        Ok(())
    }

    pub fn image_url(image: &str) -> Result<(), ChatError> {
        let image = image.trim();
        Self::length("image", image, 1, MAX_IMAGE_URL_LENGTH)?;
        if !(image.starts_with("http://") || image.starts_with("https://")) {
            return Err(ChatError::validation("image must be an http(s) URL"));
        }
        Ok(())
    }

    fn length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ChatError> {
        let count = value.chars().count();
        if count < min {
            return Err(ChatError::validation(format!(
                "{field} must be at least {min} characters"
            )));
        }
        if count > max {
            return Err(ChatError::validation(format!(
                "{field} too long (max {max} characters)"
            )));
        }
        Ok(())
    }
}
