// Opsvault: Reveal Workflow
//
// fetch ciphertext -> record VIEW_SECRET -> decrypt -> return once.
//
// The audit row is written and committed before decryption is attempted,
// so a failed decrypt (corrupted blob, changed application secret) still
// leaves a record that someone tried to read the secret. If the audit row
// cannot be written the reveal fails and no plaintext is returned.

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{decrypt, KeyProvider};
use crate::store::{AccessAuditLog, AccessContext, AuditAction, CredentialStore, StoreError};

pub struct RevealWorkflow<'a> {
    store: &'a dyn CredentialStore,
    audit: &'a dyn AccessAuditLog,
    keys: &'a dyn KeyProvider,
}

impl<'a> RevealWorkflow<'a> {
    pub fn new(
        store: &'a dyn CredentialStore,
        audit: &'a dyn AccessAuditLog,
        keys: &'a dyn KeyProvider,
    ) -> Self {
        Self { store, audit, keys }
    }

    /// Decrypt and return the secret of an active credential.
    ///
    /// Nothing is cached: each call fetches, records and decrypts again, and
    /// concurrent calls each leave their own audit row.
    pub fn reveal(
        &self,
        ctx: &AccessContext,
        credential_id: &Uuid,
    ) -> Result<Zeroizing<String>, StoreError> {
        ctx.validate()?;

        let blob = self
            .store
            .secret_ciphertext(credential_id)?
            .ok_or_else(|| StoreError::credential_not_found(credential_id))?;

        self.audit
            .append(credential_id, AuditAction::ViewSecret, ctx)?;

        let plaintext = decrypt(blob.as_str(), self.keys.cipher_key()).map_err(|e| {
            tracing::warn!(
                credential_id = %credential_id,
                actor_id = %ctx.actor_id,
                "Reveal attempt recorded but the stored secret could not be opened"
            );
            StoreError::from(e)
        })?;

        tracing::info!(
            credential_id = %credential_id,
            actor_id = %ctx.actor_id,
            "Secret revealed"
        );

        Ok(Zeroizing::new(plaintext))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
