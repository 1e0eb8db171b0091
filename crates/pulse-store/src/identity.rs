//! Participant identity.
//!
//! Authentication is an external collaborator. The engine only needs a
//! stable [`ParticipantId`] per device, obtained through
//! [`IdentityProvider::ensure_identity`].

use std::sync::OnceLock;

use pulse_types::ParticipantId;
use tracing::debug;

/// Source of the local participant's identity.
pub trait IdentityProvider: Send + Sync {
    /// Return the participant ID, establishing it on first use.
    ///
    /// Idempotent: every call returns the same ID.
    fn ensure_identity(&self) -> ParticipantId;
}

/// Anonymous identity minted lazily and kept for the provider's lifetime.
#[derive(Debug, Default)]
pub struct AnonymousIdentity {
    id: OnceLock<ParticipantId>,
}

impl AnonymousIdentity {
    /// Create a provider with no identity yet.
    pub const fn new() -> Self {
        Self { id: OnceLock::new() }
    }

    /// Create a provider that reuses a previously issued identity.
    pub fn restore(id: ParticipantId) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(id);
        Self { id: cell }
    }
}

impl IdentityProvider for AnonymousIdentity {
    fn ensure_identity(&self) -> ParticipantId {
        *self.id.get_or_init(|| {
            let id = ParticipantId::new();
            debug!(participant = %id, "anonymous identity issued");
            id
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_stable() {
        let provider = AnonymousIdentity::new();
        assert_eq!(provider.ensure_identity(), provider.ensure_identity());
    }

    #[test]
    fn restored_identity_is_reused() {
        let id = ParticipantId::new();
        let provider = AnonymousIdentity::restore(id);
        assert_eq!(provider.ensure_identity(), id);
    }

    #[test]
    fn separate_providers_differ() {
        assert_ne!(
            AnonymousIdentity::new().ensure_identity(),
            AnonymousIdentity::new().ensure_identity()
        );
    }
}
