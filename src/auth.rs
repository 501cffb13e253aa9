//! # Feature: Account Domains
//!
//! Creators and brands sign in against two independent credential domains.
//! Each domain keeps its own accounts and sessions, so a session token from one
//! is meaningless to the other. Passwords are stored as Argon2id PHC strings.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Argon2 password hashing
//! - 1.0.0: Creator and brand authenticators behind a shared trait

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

const MIN_PASSWORD_CHARS: usize = 8;

/// Consumer mail providers a brand account may not register with
const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "icloud.com", "aol.com", "proton.me",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("password must be at least 8 characters")]
    WeakPassword,
    #[error("a company name is required for brand accounts")]
    MissingCompany,
    #[error("brand accounts need a company email, not {0}")]
    FreeMailNotAllowed(String),
    #[error("an account already exists for {0}")]
    AccountExists(String),
    #[error("email or password is incorrect")]
    InvalidCredentials,
    #[error("session is not signed in")]
    UnknownSession,
    #[error("could not secure the password: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountDomain {
    Creator,
    Brand,
}

impl AccountDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountDomain::Creator => "creator",
            AccountDomain::Brand => "brand",
        }
    }
}

impl FromStr for AccountDomain {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creator" => Ok(AccountDomain::Creator),
            "brand" => Ok(AccountDomain::Brand),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub domain: AccountDomain,
    pub email: String,
    pub display_name: String,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub account: Account,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    fn domain(&self) -> AccountDomain;
    async fn sign_up(&self, request: SignUp) -> Result<Session, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;
    async fn current_account(&self, token: &str) -> Result<Account, AuthError>;
}

struct StoredAccount {
    account: Account,
    password_hash: String,
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            error!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

/// Account and session tables for one domain.
struct CredentialVault {
    domain: AccountDomain,
    accounts: DashMap<String, StoredAccount>,
    sessions: DashMap<String, String>,
}

impl CredentialVault {
    fn new(domain: AccountDomain) -> Self {
        CredentialVault {
            domain,
            accounts: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    fn open_session(&self, account: Account) -> Session {
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), account.email.clone());
        Session { token, account }
    }

    fn register(&self, email: String, password: &str, account: Account) -> Result<Session, AuthError> {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::WeakPassword);
        }

        if self.accounts.contains_key(&email) {
            warn!("Duplicate {} sign-up for {}", self.domain.as_str(), email);
            return Err(AuthError::AccountExists(email));
        }

        let stored = StoredAccount {
            account: account.clone(),
            password_hash: hash_password(password)?,
        };

        match self.accounts.entry(email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                warn!("Duplicate {} sign-up for {}", self.domain.as_str(), email);
                Err(AuthError::AccountExists(email))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(stored);
                info!("Registered {} account {}", self.domain.as_str(), email);
                Ok(self.open_session(account))
            }
        }
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = {
            let stored = self.accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;
            if !verify_password(password, &stored.password_hash) {
                return Err(AuthError::InvalidCredentials);
            }
            stored.account.clone()
        };
        Ok(self.open_session(account))
    }

    fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.sessions
            .remove(token)
            .map(|_| ())
            .ok_or(AuthError::UnknownSession)
    }

    fn current_account(&self, token: &str) -> Result<Account, AuthError> {
        let email = self
            .sessions
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(AuthError::UnknownSession)?;
        self.accounts
            .get(&email)
            .map(|stored| stored.account.clone())
            .ok_or(AuthError::UnknownSession)
    }
}

/// Consumer-side accounts for creators.
pub struct CreatorAuthenticator {
    vault: CredentialVault,
}

impl CreatorAuthenticator {
    pub fn new() -> Self {
        CreatorAuthenticator {
            vault: CredentialVault::new(AccountDomain::Creator),
        }
    }
}

impl Default for CreatorAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for CreatorAuthenticator {
    fn domain(&self) -> AccountDomain {
        AccountDomain::Creator
    }

    async fn sign_up(&self, request: SignUp) -> Result<Session, AuthError> {
        let email = normalize_email(&request.email)?;
        let display_name = match request.display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };
        let account = Account {
            domain: AccountDomain::Creator,
            email: email.clone(),
            display_name,
            company: None,
        };
        self.vault.register(email, &request.password, account)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.vault.sign_in(email, password)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.vault.sign_out(token)
    }

    async fn current_account(&self, token: &str) -> Result<Account, AuthError> {
        self.vault.current_account(token)
    }
}

/// Business-side accounts for brands; requires a company and a company email.
pub struct BrandAuthenticator {
    vault: CredentialVault,
}

impl BrandAuthenticator {
    pub fn new() -> Self {
        BrandAuthenticator {
            vault: CredentialVault::new(AccountDomain::Brand),
        }
    }
}

impl Default for BrandAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for BrandAuthenticator {
    fn domain(&self) -> AccountDomain {
        AccountDomain::Brand
    }

    async fn sign_up(&self, request: SignUp) -> Result<Session, AuthError> {
        let email = normalize_email(&request.email)?;
        let mail_domain = email.split('@').nth(1).unwrap_or_default();
        if FREE_MAIL_DOMAINS.contains(&mail_domain) {
            return Err(AuthError::FreeMailNotAllowed(mail_domain.to_string()));
        }

        let company = request
            .company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCompany)?
            .to_string();
        let display_name = match request.display_name.trim() {
            "" => company.clone(),
            name => name.to_string(),
        };

        let account = Account {
            domain: AccountDomain::Brand,
            email: email.clone(),
            display_name,
            company: Some(company),
        };
        self.vault.register(email, &request.password, account)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.vault.sign_in(email, password)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.vault.sign_out(token)
    }

    async fn current_account(&self, token: &str) -> Result<Account, AuthError> {
        self.vault.current_account(token)
    }
}
