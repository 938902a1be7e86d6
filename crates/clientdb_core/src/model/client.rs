//! Client and phone domain model.
//!
//! # Responsibility
//! - Define `Client`, `Phone` and the aggregated `ClientRecord` read model.
//! - Define write requests (`NewClient`, `ClientChanges`) and search criteria.
//! - Validate names, emails and phone numbers before persistence.
//!
//! # Invariants
//! - `email` is unique across clients and matches `local@domain.tld`.
//! - `number` is unique across all phones, not only per client.
//! - `ClientChanges` distinguishes "leave unchanged" (`None`) from
//!   "set to value" (`Some`), including `Some(vec![])` for clearing phones.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Store-generated client identifier.
pub type ClientId = i64;

/// Store-generated phone identifier.
pub type PhoneId = i64;

/// Persisted client row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    /// Given name.
    pub name: String,
    /// Family name.
    pub surname: String,
    pub email: String,
}

/// Persisted phone row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub id: PhoneId,
    pub number: String,
    pub client_id: ClientId,
}

/// One client with every phone number it owns.
///
/// Search results are grouped into this shape, one record per client, even
/// when the underlying query yields one row per phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(flatten)]
    pub client: Client,
    /// Phone numbers in insertion order.
    pub phones: Vec<String>,
}

/// Request model for creating a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phones: Vec<String>,
}

impl NewClient {
    pub fn new(
        name: impl Into<String>,
        surname: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
            email: email.into(),
            phones: Vec::new(),
        }
    }

    /// Adds phone numbers to be created together with the client.
    pub fn with_phones<I, S>(mut self, phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phones.extend(phones.into_iter().map(Into::into));
        self
    }
}

/// Partial update for an existing client.
///
/// `None` leaves a field untouched. `phones: Some(list)` replaces the whole
/// phone set, so `Some(Vec::new())` removes every phone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientChanges {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phones: Option<Vec<String>>,
}

impl ClientChanges {
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    pub fn surname(mut self, value: impl Into<String>) -> Self {
        self.surname = Some(value.into());
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = Some(value.into());
        self
    }

    pub fn phones<I, S>(mut self, phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phones = Some(phones.into_iter().map(Into::into).collect());
        self
    }

    /// Returns whether applying this change would modify nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.surname.is_none() && self.email.is_none() && self.phones.is_none()
    }
}

/// Search criteria for `find_clients`.
///
/// Set criteria are combined with AND. Text criteria match whole values,
/// case-insensitively (Unicode-aware). Unset or blank criteria match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSearch {
    pub id: Option<ClientId>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    /// Matches clients owning this number; all of their numbers are returned.
    pub phone: Option<String>,
}

impl ClientSearch {
    pub fn by_id(id: ClientId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn by_phone(number: impl Into<String>) -> Self {
        Self {
            phone: Some(number.into()),
            ..Self::default()
        }
    }

    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    pub fn surname(mut self, value: impl Into<String>) -> Self {
        self.surname = Some(value.into());
        self
    }
}

/// Input validation failures detected before touching storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientValidationError {
    EmptyName,
    EmptySurname,
    InvalidEmailFormat(String),
    EmptyPhoneNumber,
}

impl Display for ClientValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "client name cannot be empty"),
            Self::EmptySurname => write!(f, "client surname cannot be empty"),
            Self::InvalidEmailFormat(email) => write!(f, "invalid email address: `{email}`"),
            Self::EmptyPhoneNumber => write!(f, "phone number cannot be empty"),
        }
    }
}

impl Error for ClientValidationError {}

/// Trims a given name, rejecting blank values.
pub fn validate_name(value: &str) -> Result<String, ClientValidationError> {
    non_blank(value).ok_or(ClientValidationError::EmptyName)
}

/// Trims a family name, rejecting blank values.
pub fn validate_surname(value: &str) -> Result<String, ClientValidationError> {
    non_blank(value).ok_or(ClientValidationError::EmptySurname)
}

/// Trims an email address and checks its `local@domain.tld` shape.
pub fn validate_email(value: &str) -> Result<String, ClientValidationError> {
    let trimmed = value.trim();
    if EMAIL_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ClientValidationError::InvalidEmailFormat(trimmed.to_string()))
    }
}

/// Trims a phone number, rejecting blank values.
pub fn normalize_phone_number(value: &str) -> Result<String, ClientValidationError> {
    non_blank(value).ok_or(ClientValidationError::EmptyPhoneNumber)
}

/// Normalizes an optional search criterion; blank means "no filter".
pub fn normalize_criterion(value: Option<&str>) -> Option<String> {
    value.and_then(non_blank)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
