//! Client use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for client and phone use-cases.
//! - Delegate persistence to repository implementations.
//! - Emit metadata-only `event=client_*` log records (ids, counts, durations).
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Repository errors are returned unchanged.
//! - Names, emails and numbers never appear in log records.

use crate::model::client::{
    ClientChanges, ClientId, ClientRecord, ClientSearch, NewClient, Phone, PhoneId,
};
use crate::repo::client_repo::{ClientCreated, ClientRepository, RepoError, RepoResult};
use log::{error, info, warn};
use std::time::Instant;

/// Use-case service wrapper for client operations.
pub struct ClientService<R: ClientRepository> {
    repo: R,
}

impl<R: ClientRepository> ClientService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a client with optional phones.
    ///
    /// # Contract
    /// - Fails with `DuplicateEmail` without creating anything when the email
    ///   is taken.
    /// - Invalid phones are skipped, logged at `warn` and returned in
    ///   `ClientCreated::skipped_phones`; the client is still created.
    pub fn add_client(&mut self, client: &NewClient) -> RepoResult<ClientCreated> {
        let started_at = Instant::now();
        let result = self.repo.add_client(client);
        match &result {
            Ok(created) => {
                for skipped in &created.skipped_phones {
                    warn!(
                        "event=client_add_phone module=service status=skipped client_id={} reason={}",
                        created.id,
                        reason_code(&skipped.reason)
                    );
                }
                info!(
                    "event=client_add module=service status=ok client_id={} phones_requested={} phones_skipped={} duration_ms={}",
                    created.id,
                    client.phones.len(),
                    created.skipped_phones.len(),
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => log_failure("client_add", None, err),
        }
        result
    }

    /// Attaches one phone to an existing client.
    pub fn add_phone(&mut self, client_id: ClientId, number: &str) -> RepoResult<PhoneId> {
        let result = self.repo.add_phone(client_id, number);
        match &result {
            Ok(phone_id) => info!(
                "event=phone_add module=service status=ok client_id={} phone_id={}",
                client_id, phone_id
            ),
            Err(err) => log_failure("phone_add", Some(client_id), err),
        }
        result
    }

    /// Applies a partial client update.
    ///
    /// # Contract
    /// - Unset fields are left untouched.
    /// - `phones: Some(list)` replaces all phones atomically; any invalid
    ///   number fails the whole update.
    pub fn change_client(&mut self, client_id: ClientId, changes: &ClientChanges) -> RepoResult<()> {
        let result = self.repo.change_client(client_id, changes);
        match &result {
            Ok(()) => info!(
                "event=client_change module=service status=ok client_id={} name={} surname={} email={} phones={}",
                client_id,
                changes.name.is_some(),
                changes.surname.is_some(),
                changes.email.is_some(),
                changes
                    .phones
                    .as_ref()
                    .map_or_else(|| "unchanged".to_string(), |phones| phones.len().to_string())
            ),
            Err(err) => log_failure("client_change", Some(client_id), err),
        }
        result
    }

    /// Removes one phone number from a client.
    pub fn delete_phone(&mut self, client_id: ClientId, number: &str) -> RepoResult<()> {
        let result = self.repo.delete_phone(client_id, number.trim());
        match &result {
            Ok(()) => info!(
                "event=phone_delete module=service status=ok client_id={}",
                client_id
            ),
            Err(err) => log_failure("phone_delete", Some(client_id), err),
        }
        result
    }

    /// Deletes a client and, by cascade, all of its phones.
    pub fn delete_client(&mut self, client_id: ClientId) -> RepoResult<()> {
        let result = self.repo.delete_client(client_id);
        match &result {
            Ok(()) => info!(
                "event=client_delete module=service status=ok client_id={}",
                client_id
            ),
            Err(err) => log_failure("client_delete", Some(client_id), err),
        }
        result
    }

    /// Finds clients matching every set criterion.
    pub fn find_clients(&self, search: &ClientSearch) -> RepoResult<Vec<ClientRecord>> {
        let records = self.repo.find_clients(search)?;
        info!(
            "event=client_find module=service status=ok matches={}",
            records.len()
        );
        Ok(records)
    }

    /// Lists every client ordered by id.
    pub fn list_clients(&self) -> RepoResult<Vec<ClientRecord>> {
        self.find_clients(&ClientSearch::default())
    }

    /// Gets one client by id.
    pub fn get_client(&self, client_id: ClientId) -> RepoResult<Option<ClientRecord>> {
        self.repo.get_client(client_id)
    }

    /// Lists phone rows of one client.
    pub fn list_phones(&self, client_id: ClientId) -> RepoResult<Vec<Phone>> {
        self.repo.list_phones(client_id)
    }
}

fn log_failure(event: &str, client_id: Option<ClientId>, err: &RepoError) {
    let client_id = client_id.map_or_else(|| "-".to_string(), |id| id.to_string());
    match err {
        RepoError::Db(_)
        | RepoError::UninitializedConnection { .. }
        | RepoError::MissingRequiredTable(_)
        | RepoError::MissingRequiredColumn { .. } => error!(
            "event={} module=service status=error client_id={} error_code={} error={}",
            event,
            client_id,
            reason_code(err),
            err
        ),
        _ => warn!(
            "event={} module=service status=rejected client_id={} error_code={}",
            event,
            client_id,
            reason_code(err)
        ),
    }
}

/// Stable, data-free code for a repository error.
fn reason_code(err: &RepoError) -> &'static str {
    match err {
        RepoError::DuplicateEmail(_) => "duplicate_email",
        RepoError::DuplicateNumber(_) => "duplicate_number",
        RepoError::ClientNotFound(_) => "client_not_found",
        RepoError::PhoneNotFound { .. } => "phone_not_found",
        RepoError::InvalidEmailFormat(_) => "invalid_email_format",
        RepoError::Validation(_) => "validation_failed",
        RepoError::Db(_) => "db_error",
        RepoError::UninitializedConnection { .. } => "uninitialized_connection",
        RepoError::MissingRequiredTable(_) | RepoError::MissingRequiredColumn { .. } => {
            "schema_mismatch"
        }
    }
}
