//! Client repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/update/delete and search APIs over `clients` and
//!   `telephones` storage.
//! - Translate store-level constraint failures into typed domain errors.
//!
//! # Invariants
//! - Every write API runs in one `IMMEDIATE` transaction; dropping it without
//!   commit rolls back, so no write is partially visible on failure.
//! - Uniqueness pre-checks are an early exit only. The UNIQUE/FK constraints
//!   decide lost races and are mapped to the same error variants.
//! - `add_client` is the one exception to all-or-nothing: invalid phones are
//!   skipped (rolled back to a savepoint) and reported, the client stays.
//! - Text search is exact and case-insensitive (Unicode `casefold`).

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{register_sql_functions, DbError};
use crate::model::client::{
    normalize_criterion, normalize_phone_number, validate_email, validate_name,
    validate_surname, Client, ClientChanges, ClientId, ClientRecord, ClientSearch,
    ClientValidationError, NewClient, Phone, PhoneId,
};
use rusqlite::types::Value;
use rusqlite::{
    ffi, params, params_from_iter, Connection, ErrorCode, OptionalExtension, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error taxonomy for client and phone operations.
#[derive(Debug)]
pub enum RepoError {
    /// Another client already uses this email.
    DuplicateEmail(String),
    /// This phone number is already registered (to any client).
    DuplicateNumber(String),
    ClientNotFound(ClientId),
    /// No phone with this number belongs to the client.
    PhoneNotFound { client_id: ClientId, number: String },
    InvalidEmailFormat(String),
    Validation(ClientValidationError),
    Db(DbError),
    /// Connection schema is not at the version this build expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Returns whether this error rejects a single phone number, as opposed
    /// to a failure of the whole operation.
    pub fn is_phone_rejection(&self) -> bool {
        matches!(
            self,
            Self::DuplicateNumber(_) | Self::Validation(ClientValidationError::EmptyPhoneNumber)
        )
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEmail(email) => write!(f, "client with email `{email}` already exists"),
            Self::DuplicateNumber(number) => {
                write!(f, "phone number `{number}` is already registered")
            }
            Self::ClientNotFound(id) => write!(f, "client not found: {id}"),
            Self::PhoneNotFound { client_id, number } => {
                write!(f, "phone `{number}` not found for client {client_id}")
            }
            Self::InvalidEmailFormat(email) => write!(f, "invalid email address: `{email}`"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "client repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "client repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "client repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ClientValidationError> for RepoError {
    fn from(value: ClientValidationError) -> Self {
        match value {
            ClientValidationError::InvalidEmailFormat(email) => Self::InvalidEmailFormat(email),
            other => Self::Validation(other),
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// A phone number dropped while creating a client.
#[derive(Debug)]
pub struct SkippedPhone {
    pub number: String,
    pub reason: RepoError,
}

/// Outcome of `add_client`.
#[derive(Debug)]
pub struct ClientCreated {
    pub id: ClientId,
    /// Requested phones that were not stored, in request order.
    pub skipped_phones: Vec<SkippedPhone>,
}

/// Repository interface for client CRUD and search operations.
pub trait ClientRepository {
    /// Creates a client and as many of its requested phones as are valid.
    fn add_client(&mut self, client: &NewClient) -> RepoResult<ClientCreated>;
    /// Attaches one phone number to an existing client.
    fn add_phone(&mut self, client_id: ClientId, number: &str) -> RepoResult<PhoneId>;
    /// Applies a partial update, optionally replacing the whole phone set.
    fn change_client(&mut self, client_id: ClientId, changes: &ClientChanges) -> RepoResult<()>;
    /// Deletes the phone matching both client id and number.
    fn delete_phone(&mut self, client_id: ClientId, number: &str) -> RepoResult<()>;
    /// Deletes a client together with all of its phones.
    fn delete_client(&mut self, client_id: ClientId) -> RepoResult<()>;
    /// Returns matching clients ordered by id, each with all of its phones.
    fn find_clients(&self, search: &ClientSearch) -> RepoResult<Vec<ClientRecord>>;
    /// Loads one client by id.
    fn get_client(&self, client_id: ClientId) -> RepoResult<Option<ClientRecord>>;
    /// Lists phone rows owned by one client in insertion order.
    fn list_phones(&self, client_id: ClientId) -> RepoResult<Vec<Phone>>;
}

/// SQLite-backed client repository.
pub struct SqliteClientRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteClientRepository<'conn> {
    /// Constructs a repository from a connection with the client schema applied.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_client_connection_ready(conn)?;
        register_sql_functions(conn)?;
        Ok(Self { conn })
    }
}

impl ClientRepository for SqliteClientRepository<'_> {
    fn add_client(&mut self, client: &NewClient) -> RepoResult<ClientCreated> {
        let name = validate_name(&client.name)?;
        let surname = validate_surname(&client.surname)?;
        let email = validate_email(&client.email)?;

        let mut tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if email_owner(&tx, &email)?.is_some() {
            return Err(RepoError::DuplicateEmail(email));
        }

        tx.execute(
            "INSERT INTO clients (name, surname, email) VALUES (?1, ?2, ?3);",
            params![name, surname, email],
        )
        .map_err(|err| translate_write_error(err, WriteTarget::Client { email: &email }))?;
        let id = tx.last_insert_rowid();

        let mut skipped_phones = Vec::new();
        for number in &client.phones {
            let savepoint = tx.savepoint()?;
            match insert_phone(&savepoint, id, number) {
                Ok(_) => savepoint.commit()?,
                Err(reason) if reason.is_phone_rejection() => skipped_phones.push(SkippedPhone {
                    number: number.clone(),
                    reason,
                }),
                Err(other) => return Err(other),
            }
        }

        tx.commit()?;
        Ok(ClientCreated { id, skipped_phones })
    }

    fn add_phone(&mut self, client_id: ClientId, number: &str) -> RepoResult<PhoneId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let phone_id = insert_phone(&tx, client_id, number)?;
        tx.commit()?;
        Ok(phone_id)
    }

    fn change_client(&mut self, client_id: ClientId, changes: &ClientChanges) -> RepoResult<()> {
        let name = changes.name.as_deref().map(validate_name).transpose()?;
        let surname = changes.surname.as_deref().map(validate_surname).transpose()?;
        let email = changes.email.as_deref().map(validate_email).transpose()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !client_exists(&tx, client_id)? {
            return Err(RepoError::ClientNotFound(client_id));
        }

        let target = WriteTarget::Client {
            email: email.as_deref().unwrap_or_default(),
        };
        if let Some(name) = &name {
            tx.execute(
                "UPDATE clients SET name = ?1 WHERE id = ?2;",
                params![name, client_id],
            )
            .map_err(|err| translate_write_error(err, target))?;
        }
        if let Some(surname) = &surname {
            tx.execute(
                "UPDATE clients SET surname = ?1 WHERE id = ?2;",
                params![surname, client_id],
            )
            .map_err(|err| translate_write_error(err, target))?;
        }
        if let Some(email) = &email {
            match email_owner(&tx, email)? {
                Some(owner) if owner != client_id => {
                    return Err(RepoError::DuplicateEmail(email.clone()));
                }
                _ => {}
            }
            tx.execute(
                "UPDATE clients SET email = ?1 WHERE id = ?2;",
                params![email, client_id],
            )
            .map_err(|err| translate_write_error(err, target))?;
        }

        if let Some(phones) = &changes.phones {
            tx.execute("DELETE FROM telephones WHERE client = ?1;", [client_id])?;
            for number in phones {
                insert_phone(&tx, client_id, number)?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_phone(&mut self, client_id: ClientId, number: &str) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "DELETE FROM telephones WHERE client = ?1 AND number = ?2;",
            params![client_id, number],
        )?;
        if changed == 0 {
            return Err(RepoError::PhoneNotFound {
                client_id,
                number: number.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_client(&mut self, client_id: ClientId) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Telephones go with it through ON DELETE CASCADE.
        let changed = tx.execute("DELETE FROM clients WHERE id = ?1;", [client_id])?;
        if changed == 0 {
            return Err(RepoError::ClientNotFound(client_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn find_clients(&self, search: &ClientSearch) -> RepoResult<Vec<ClientRecord>> {
        let mut sql = String::from(
            "SELECT
                c.id AS id,
                c.name AS name,
                c.surname AS surname,
                c.email AS email,
                t.number AS number
             FROM clients c
             LEFT JOIN telephones t ON t.client = c.id
             WHERE 1 = 1",
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(id) = search.id {
            sql.push_str(" AND c.id = ?");
            bind_values.push(Value::Integer(id));
        }
        for (column, criterion) in [
            ("c.name", &search.name),
            ("c.surname", &search.surname),
            ("c.email", &search.email),
        ] {
            if let Some(value) = normalize_criterion(criterion.as_deref()) {
                sql.push_str(&format!(" AND casefold({column}) = casefold(?)"));
                bind_values.push(Value::Text(value));
            }
        }
        if let Some(number) = normalize_criterion(search.phone.as_deref()) {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM telephones p
                    WHERE p.client = c.id
                      AND casefold(p.number) = casefold(?)
                )",
            );
            bind_values.push(Value::Text(number));
        }

        sql.push_str(" ORDER BY c.id ASC, t.id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records: Vec<ClientRecord> = Vec::new();
        while let Some(row) = rows.next()? {
            let id: ClientId = row.get("id")?;
            let number: Option<String> = row.get("number")?;

            let is_same_client = records
                .last()
                .map_or(false, |record| record.client.id == id);
            if !is_same_client {
                records.push(ClientRecord {
                    client: Client {
                        id,
                        name: row.get("name")?,
                        surname: row.get("surname")?,
                        email: row.get("email")?,
                    },
                    phones: Vec::new(),
                });
            }
            if let (Some(number), Some(record)) = (number, records.last_mut()) {
                record.phones.push(number);
            }
        }

        Ok(records)
    }

    fn get_client(&self, client_id: ClientId) -> RepoResult<Option<ClientRecord>> {
        Ok(self
            .find_clients(&ClientSearch::by_id(client_id))?
            .into_iter()
            .next())
    }

    fn list_phones(&self, client_id: ClientId) -> RepoResult<Vec<Phone>> {
        if !client_exists(self.conn, client_id)? {
            return Err(RepoError::ClientNotFound(client_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, number, client
             FROM telephones
             WHERE client = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([client_id])?;
        let mut phones = Vec::new();
        while let Some(row) = rows.next()? {
            phones.push(Phone {
                id: row.get("id")?,
                number: row.get("number")?,
                client_id: row.get("client")?,
            });
        }
        Ok(phones)
    }
}

/// What a failed write statement was trying to store.
#[derive(Debug, Clone, Copy)]
enum WriteTarget<'a> {
    Client { email: &'a str },
    Phone { client_id: ClientId, number: &'a str },
}

/// Maps constraint violations onto the typed taxonomy; other errors pass
/// through as `RepoError::Db`.
fn translate_write_error(err: rusqlite::Error, target: WriteTarget<'_>) -> RepoError {
    let violated = match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Some((failure.extended_code, message.clone().unwrap_or_default()))
        }
        _ => None,
    };
    let Some((extended_code, message)) = violated else {
        return err.into();
    };

    match (extended_code, target) {
        (ffi::SQLITE_CONSTRAINT_UNIQUE, WriteTarget::Client { email })
            if message.contains("clients.email") =>
        {
            RepoError::DuplicateEmail(email.to_string())
        }
        (ffi::SQLITE_CONSTRAINT_UNIQUE, WriteTarget::Phone { number, .. })
            if message.contains("telephones.number") =>
        {
            RepoError::DuplicateNumber(number.to_string())
        }
        (ffi::SQLITE_CONSTRAINT_CHECK, WriteTarget::Client { email })
            if message.contains("clients_email_format") =>
        {
            RepoError::InvalidEmailFormat(email.to_string())
        }
        (ffi::SQLITE_CONSTRAINT_CHECK, _) if message.contains("clients_name_present") => {
            RepoError::Validation(ClientValidationError::EmptyName)
        }
        (ffi::SQLITE_CONSTRAINT_CHECK, _) if message.contains("clients_surname_present") => {
            RepoError::Validation(ClientValidationError::EmptySurname)
        }
        (ffi::SQLITE_CONSTRAINT_CHECK, WriteTarget::Phone { .. }) => {
            RepoError::Validation(ClientValidationError::EmptyPhoneNumber)
        }
        (ffi::SQLITE_CONSTRAINT_FOREIGNKEY, WriteTarget::Phone { client_id, .. }) => {
            RepoError::ClientNotFound(client_id)
        }
        _ => err.into(),
    }
}

fn insert_phone(conn: &Connection, client_id: ClientId, number: &str) -> RepoResult<PhoneId> {
    let number = normalize_phone_number(number)?;
    if !client_exists(conn, client_id)? {
        return Err(RepoError::ClientNotFound(client_id));
    }
    if phone_exists(conn, &number)? {
        return Err(RepoError::DuplicateNumber(number));
    }

    conn.execute(
        "INSERT INTO telephones (number, client) VALUES (?1, ?2);",
        params![number, client_id],
    )
    .map_err(|err| {
        translate_write_error(
            err,
            WriteTarget::Phone {
                client_id,
                number: &number,
            },
        )
    })?;
    Ok(conn.last_insert_rowid())
}

fn client_exists(conn: &Connection, client_id: ClientId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?1);",
        [client_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn phone_exists(conn: &Connection, number: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM telephones WHERE number = ?1);",
        [number],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn email_owner(conn: &Connection, email: &str) -> RepoResult<Option<ClientId>> {
    let owner = conn
        .query_row(
            "SELECT id FROM clients WHERE email = ?1;",
            [email],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner)
}

fn ensure_client_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        ("clients", &["id", "name", "surname", "email"]),
        ("telephones", &["id", "number", "client"]),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
