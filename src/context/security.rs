//! Security principals that may travel with a task.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, SystemTime};

/// Lifecycle state of a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenState {
    Normal,
    Expired,
    Offline,
    Deny,
    Locked,
}

impl Default for TokenState {
    fn default() -> Self {
        TokenState::Normal
    }
}

/// A signed-in user's session token.
#[derive(Debug, Clone, PartialEq)]
pub struct UserToken {
    pub token: String,
    pub user_id: String,
    pub token_type: String,
    pub state: TokenState,
    pub sign_in_time: SystemTime,
    /// `None` means the token never expires from inactivity.
    pub max_inactive_interval: Option<Duration>,
}

impl UserToken {
    pub fn new<T: Into<String>, U: Into<String>>(token: T, user_id: U) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            token_type: "default".to_string(),
            state: TokenState::Normal,
            sign_in_time: SystemTime::now(),
            max_inactive_interval: None,
        }
    }

    pub fn with_type<S: Into<String>>(mut self, token_type: S) -> Self {
        self.token_type = token_type.into();
        self
    }

    pub fn with_max_inactive_interval(mut self, interval: Duration) -> Self {
        self.max_inactive_interval = Some(interval);
        self
    }

    pub fn is_normal(&self) -> bool {
        self.state == TokenState::Normal
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        if self.state == TokenState::Expired {
            return true;
        }
        match self.max_inactive_interval {
            Some(interval) => now
                .duration_since(self.sign_in_time)
                .map(|elapsed| elapsed > interval)
                .unwrap_or(false),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub user_type: String,
}

impl User {
    pub fn new<I: Into<String>, U: Into<String>>(id: I, username: U) -> Self {
        let username = username.into();
        Self {
            id: id.into(),
            name: username.clone(),
            username,
            user_type: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub id: String,
    pub actions: BTreeSet<String>,
}

impl Permission {
    pub fn new<S, I, A>(id: S, actions: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }
}

/// An authenticated principal: the user, what they may do, and free-form
/// attributes attached at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub user: User,
    pub permissions: Vec<Permission>,
    pub attributes: HashMap<String, String>,
}

impl Authentication {
    pub fn new(user: User) -> Self {
        Self {
            user,
            permissions: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn has_permission(&self, id: &str, action: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.id == id && p.actions.contains(action))
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
