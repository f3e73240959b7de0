pub mod auth;
pub mod health;
pub mod notifications;
pub mod profile;
pub mod social;
pub mod wearables;

use serde::Serialize;
use utoipa::ToSchema;
use wellzo_social::PageRequest;

/// Plain acknowledgement returned by operations without a payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

pub(crate) fn page_request(page: Option<u32>, page_size: Option<u32>) -> PageRequest {
    PageRequest { page, page_size }
}
