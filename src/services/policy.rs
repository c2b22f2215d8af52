//! Authorization policy for book actions.
//!
//! A single pure decision function shared by every `/books` handler. Rules,
//! in order:
//!
//! 1. admins may do anything;
//! 2. reads (list, search, retrieve) are open to any authenticated actor;
//! 3. borrow and return are open to any authenticated actor;
//! 4. everything else (create, update, delete) is denied.

use crate::{
    error::{AppError, AppResult},
    models::Actor,
};

/// Everything a caller can ask to do with the catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Search,
    Retrieve,
    Create,
    Update,
    Delete,
    Borrow,
    Return,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::List,
        Action::Search,
        Action::Retrieve,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Borrow,
        Action::Return,
    ];

    /// Safe actions that never change state
    pub fn is_read(&self) -> bool {
        matches!(self, Action::List | Action::Search | Action::Retrieve)
    }

    pub fn is_lending(&self) -> bool {
        matches!(self, Action::Borrow | Action::Return)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Search => "search",
            Action::Retrieve => "retrieve",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Borrow => "borrow",
            Action::Return => "return",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn authorize(actor: &Actor, action: Action) -> Decision {
    if actor.is_admin || action.is_read() || action.is_lending() {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// [`authorize`] as an error: a denial becomes [`AppError::Authorization`]
pub fn require(actor: &Actor, action: Action) -> AppResult<()> {
    match authorize(actor, action) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::debug!(actor = actor.id, action = %action, "action denied");
            Err(AppError::Authorization(format!(
                "You do not have permission to {} a book.",
                action
            )))
        }
    }
}
