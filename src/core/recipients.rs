use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

use crate::core::report::ReportParameters;

/// User lookups the resolver needs. The dispatching identity and the
/// super user are part of the directory so the engine never reaches into
/// host globals.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fallible lookup by login; errors for deleted/unknown users.
    async fn user_email(&self, login: &str) -> Result<String>;

    fn current_user_login(&self) -> String;
    fn current_user_email(&self) -> String;
    fn super_user_login(&self) -> String;
    fn super_user_email(&self) -> String;
}

/// Derive the final destination addresses for one report instance.
///
/// `additionalEmails` come first in their stored order; the owner's own
/// address is appended when `emailMe` is set. A failed owner lookup is not
/// an error: the dispatch is silently skipped (`None`), matching the
/// behavior callers rely on when a report outlives its owner.
///
/// Side-effect-free, so it doubles as the recipient preview for UIs.
pub async fn resolve_recipients(
    parameters: &ReportParameters,
    owner_login: &str,
    users: &dyn UserDirectory,
) -> Option<Vec<String>> {
    let mut emails: Vec<String> = parameters
        .additional_emails
        .iter()
        .filter(|e| !e.trim().is_empty())
        .cloned()
        .collect();

    if parameters.email_me {
        if users.current_user_login() == owner_login {
            emails.push(users.current_user_email());
        } else if owner_login == users.super_user_login() {
            emails.push(users.super_user_email());
        } else {
            match users.user_email(owner_login).await {
                Ok(email) => emails.push(email),
                Err(e) => {
                    info!("Owner '{}' could not be resolved, skipping delivery: {}", owner_login, e);
                    return None;
                }
            }
        }
    }

    emails.retain(|e| !e.trim().is_empty());
    Some(emails)
}

/// Configuration-backed directory for the standalone binary.
pub struct StaticUserDirectory {
    current_login: String,
    current_email: String,
    super_login: String,
    super_email: String,
    users: HashMap<String, String>,
}

impl StaticUserDirectory {
    pub fn new(
        current_login: String,
        current_email: String,
        super_login: String,
        super_email: String,
        users: HashMap<String, String>,
    ) -> Self {
        Self {
            current_login,
            current_email,
            super_login,
            super_email,
            users,
        }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn user_email(&self, login: &str) -> Result<String> {
        self.users
            .get(login)
            .cloned()
            .ok_or_else(|| anyhow!("unknown user '{login}'"))
    }

    fn current_user_login(&self) -> String {
        self.current_login.clone()
    }

    fn current_user_email(&self) -> String {
        self.current_email.clone()
    }

    fn super_user_login(&self) -> String {
        self.super_login.clone()
    }

    fn super_user_email(&self) -> String {
        self.super_email.clone()
    }
}
