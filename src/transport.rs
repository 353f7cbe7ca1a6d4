// src/transport.rs
//! Delivery transport seam. The real chat backend lives outside this crate;
//! everything here only needs "send text/image to a chat id, tell me if it
//! failed".

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
    async fn send_image(&self, chat_id: i64, image: &[u8], caption: &str) -> Result<()>;
}

/// Logs outgoing messages instead of talking to a chat backend. Used for
/// local runs and as the wiring default until a real transport is plugged in.
pub struct ConsoleTransport;

#[async_trait]
impl DeliveryTransport for ConsoleTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        info!(target: "delivery", chat_id, "\n{text}");
        Ok(())
    }

    async fn send_image(&self, chat_id: i64, image: &[u8], caption: &str) -> Result<()> {
        info!(target: "delivery", chat_id, bytes = image.len(), caption, "image");
        Ok(())
    }
}
