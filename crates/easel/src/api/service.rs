use crate::asset_registry::AssetRegistry;
use crate::comfy::ComfyClient;
use crate::defaults::DefaultsManager;
use std::sync::Arc;

/// Inline previews above this size are dropped from responses; the asset URL
/// is always present regardless.
pub const DEFAULT_INLINE_PREVIEW_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct EaselServer {
    pub comfy: Arc<ComfyClient>,
    pub registry: Arc<AssetRegistry>,
    pub defaults: Arc<DefaultsManager>,
    pub inline_preview_limit: usize,
}

impl std::fmt::Debug for EaselServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EaselServer")
            .field("comfy", &self.comfy.base_url())
            .finish()
    }
}

impl EaselServer {
    pub fn new(
        comfy: Arc<ComfyClient>,
        registry: Arc<AssetRegistry>,
        defaults: Arc<DefaultsManager>,
    ) -> Self {
        Self {
            comfy,
            registry,
            defaults,
            inline_preview_limit: DEFAULT_INLINE_PREVIEW_LIMIT,
        }
    }

    /// Cap on inline preview payloads (bytes, pre-base64)
    pub fn with_inline_preview_limit(mut self, limit: usize) -> Self {
        self.inline_preview_limit = limit;
        self
    }
}
