use serde::{Deserialize, Serialize};

use addressbook_core::{require_present, DomainError, DomainResult, UserId};

use crate::Role;

pub const MIN_PASSWORD_LEN: usize = 8;

/// A registered account as held by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the service layer.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }
}

/// Raw registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// A validated registration, ready to be hashed and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Registration {
    /// Normalize and validate the input.
    ///
    /// Username and names are trimmed, email is trimmed and lowercased. The
    /// password is returned untouched alongside the normalized user.
    pub fn validated(self) -> DomainResult<(NewUser, String)> {
        let username = self.username.trim().to_string();
        let email = self.email.trim().to_lowercase();
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();

        require_present("username", &username)?;
        require_present("email", &email)?;
        require_present("password", &self.password)?;

        if username.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("username must not contain whitespace"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(DomainError::validation("email must be a valid address")),
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        Ok((
            NewUser {
                username,
                email,
                first_name,
                last_name,
            },
            self.password,
        ))
    }
}
