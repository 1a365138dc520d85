//! Asset state shared between engine-side loaders and the finalizer.
//!
//! One [`AssetState`] exists per build invocation (per watch session in watch
//! mode). Loaders running during graph traversal claim output names, emit
//! auxiliary assets (native addon payloads, relocated files) and record
//! permission bits; the finalizer reads a snapshot once traversal is done.

use dashmap::{DashMap, DashSet};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Thread-safe, append-only asset state.
///
/// Cloning is cheap and every clone refers to the same state.
#[derive(Debug, Clone, Default)]
pub struct AssetState {
    inner: Arc<AssetStateInner>,
}

#[derive(Debug, Default)]
struct AssetStateInner {
    /// The finalizer's own output names, fixed for the whole session
    configured: Vec<String>,

    /// Output names that are taken, either by the finalizer or by a loader
    reserved_names: DashSet<String>,

    /// Emitted auxiliary assets: relative output path → content
    assets: DashMap<String, Vec<u8>>,

    /// Relative output path → Unix mode bits
    permissions: DashMap<String, u32>,
}

/// Immutable copy of the state taken after a compilation finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSnapshot {
    pub assets: BTreeMap<String, Vec<u8>>,
    pub permissions: BTreeMap<String, u32>,
}

impl AssetState {
    /// Create state with the finalizer's own output names already reserved.
    pub fn new(reserved: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let configured: Vec<String> = reserved.into_iter().map(Into::into).collect();
        let reserved_names = configured.iter().cloned().collect();
        Self {
            inner: Arc::new(AssetStateInner {
                configured,
                reserved_names,
                ..AssetStateInner::default()
            }),
        }
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.inner.reserved_names.contains(name)
    }

    /// Reserve an output name that does not collide with any taken name.
    ///
    /// Returns `name` itself when free, otherwise the first free
    /// `stem-N.ext` variant. Reservation is atomic, so two loaders racing
    /// for the same name always end up with distinct names.
    pub fn claim_name(&self, name: &str) -> String {
        if self.inner.reserved_names.insert(name.to_string()) {
            return name.to_string();
        }

        let (stem, ext) = split_extension(name);
        let mut counter = 1usize;
        loop {
            let candidate = format!("{stem}-{counter}{ext}");
            if self.inner.reserved_names.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Record an auxiliary asset under an already claimed name.
    pub fn emit_asset(&self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        let name = name.into();
        tracing::debug!("emitting asset {}", name);
        self.inner.reserved_names.insert(name.clone());
        self.inner.assets.insert(name, content.into());
    }

    /// Record the mode bits an output file must be written with.
    pub fn set_permissions(&self, name: impl Into<String>, mode: u32) {
        self.inner.permissions.insert(name.into(), mode);
    }

    pub fn permissions(&self, name: &str) -> Option<u32> {
        self.inner.permissions.get(name).map(|mode| *mode)
    }

    /// Reset per-cycle data at the start of a compilation.
    ///
    /// Names claimed by loaders are released; the configured output names
    /// stay reserved.
    pub fn begin_cycle(&self) {
        let configured = &self.inner.configured;
        self.inner
            .reserved_names
            .retain(|name| configured.contains(name));
        self.inner.assets.clear();
        self.inner.permissions.clear();
    }

    pub fn snapshot(&self) -> AssetSnapshot {
        AssetSnapshot {
            assets: self
                .inner
                .assets
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            permissions: self
                .inner
                .permissions
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }
}

/// Split `lib/addon.node` into (`lib/addon`, `.node`).
fn split_extension(name: &str) -> (&str, &str) {
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => name.split_at(file_start + dot),
        _ => (name, ""),
    }
}
