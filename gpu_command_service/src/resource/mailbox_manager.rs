/// Process-wide texture mailboxes.
///
/// A mailbox maps a 64-byte name to a texture's service object and definition.
/// The mailbox holds the service object weakly: once every group has deleted
/// the texture, consuming the name fails.

use super::texture_manager::{ServiceTexture, Texture, TextureDefinition};
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, Weak};

pub const MAILBOX_NAME_LENGTH: usize = 64;

pub type MailboxName = [u8; MAILBOX_NAME_LENGTH];

struct MailboxEntry {
    service: Weak<ServiceTexture>,
    definition: TextureDefinition,
}

/// Shared between context groups; construct one and hand it to each group
#[derive(Default)]
pub struct MailboxManager {
    entries: Mutex<FxHashMap<MailboxName, MailboxEntry>>,
}

impl MailboxManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish `texture` under `name`, replacing any previous entry
    pub fn produce_texture(&self, name: &MailboxName, texture: &Texture) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| crate::gpu_err!("gpu::MailboxManager", "mailbox table poisoned"))?;
        entries.retain(|_, entry| entry.service.strong_count() > 0);
        entries.insert(
            *name,
            MailboxEntry {
                service: Arc::downgrade(texture.service()),
                definition: texture.definition(),
            },
        );
        Ok(())
    }

    /// Look up `name` for a texture bound to `target`
    ///
    /// Fails when the name is unknown, the texture is gone or it was produced
    /// for another target.
    pub fn consume_texture(
        &self,
        target: u32,
        name: &MailboxName,
    ) -> Result<(Arc<ServiceTexture>, TextureDefinition)> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| crate::gpu_err!("gpu::MailboxManager", "mailbox table poisoned"))?;
        let entry = entries
            .get(name)
            .ok_or_else(|| Error::InvalidResource("unknown mailbox".to_string()))?;
        let service = entry
            .service
            .upgrade()
            .ok_or_else(|| Error::InvalidResource("mailbox texture was destroyed".to_string()))?;
        if entry.definition.target != target {
            return Err(Error::InvalidResource(format!(
                "mailbox holds a texture for target {:#x}",
                entry.definition.target
            )));
        }
        Ok((service, entry.definition.clone()))
    }

    /// Number of names whose texture is still alive
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.service.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "mailbox_manager_tests.rs"]
mod tests;
