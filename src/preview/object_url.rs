use base64::Engine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const SCHEME: &str = "blob:doclens/";

struct Blob {
    mime_type: String,
    bytes: Arc<[u8]>,
}

#[derive(Default)]
struct Inner {
    live: HashMap<String, Blob>,
    minted: u64,
    revoked: u64,
    stale_revocations: u64,
}

/// Page-lifetime table of ephemeral URIs pointing at in-memory bytes.
///
/// URIs are only handed out wrapped in an [`ObjectUrl`], and only dropping
/// that handle revokes them.
#[derive(Clone, Default)]
pub struct ObjectUrlRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, bytes: Arc<[u8]>, mime_type: &str) -> ObjectUrl {
        let uri = format!("{SCHEME}{}", Uuid::new_v4());
        let mut inner = self.inner.lock();
        inner.live.insert(
            uri.clone(),
            Blob {
                mime_type: mime_type.to_string(),
                bytes,
            },
        );
        inner.minted += 1;
        debug!(%uri, "minted object url");
        ObjectUrl {
            uri,
            registry: self.clone(),
        }
    }

    /// Content behind a live URI, as a renderer would fetch it.
    pub fn resolve(&self, uri: &str) -> Option<(String, Arc<[u8]>)> {
        self.inner
            .lock()
            .live
            .get(uri)
            .map(|b| (b.mime_type.clone(), Arc::clone(&b.bytes)))
    }

    pub fn is_live(&self, uri: &str) -> bool {
        self.inner.lock().live.contains_key(uri)
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn minted(&self) -> u64 {
        self.inner.lock().minted
    }

    pub fn revoked(&self) -> u64 {
        self.inner.lock().revoked
    }

    /// Revocations of URIs that were no longer live. Always zero unless a handle leaked.
    pub fn stale_revocations(&self) -> u64 {
        self.inner.lock().stale_revocations
    }

    fn revoke(&self, uri: &str) {
        let mut inner = self.inner.lock();
        if inner.live.remove(uri).is_some() {
            inner.revoked += 1;
            debug!(%uri, "revoked object url");
        } else {
            inner.stale_revocations += 1;
            warn!(%uri, "revoking an object url that is not live");
        }
    }
}

/// Owning handle for one ephemeral URI. Revoked exactly once, on drop.
pub struct ObjectUrl {
    uri: String,
    registry: ObjectUrlRegistry,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Inline `data:` form, for surfaces that cannot dereference object URIs.
    pub fn data_uri(&self) -> Option<String> {
        let (mime_type, bytes) = self.registry.resolve(&self.uri)?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Some(format!("data:{mime_type};base64,{b64}"))
    }
}

impl std::fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.uri).finish()
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.uri);
    }
}
