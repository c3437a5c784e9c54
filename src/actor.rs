//! Actor identity.
//!
//! Every mutation records who made it. Identity is trusted as supplied.
//!
//! Resolution order for the CLI:
//! 1) `--user` / `--name`
//! 2) `HIVE_USER` / `HIVE_USER_NAME` environment variables
//! 3) Persisted value in `.hive/actor`
//! 4) Config defaults (`actor.default_id`, `actor.default_name`)

use serde::{Deserialize, Serialize};

use crate::config::ActorConfig;
use crate::error::{Error, Result};
use crate::storage::Storage;

pub const USER_ENV: &str = "HIVE_USER";
pub const USER_NAME_ENV: &str = "HIVE_USER_NAME";

/// The user performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
}

impl Actor {
    /// Build an actor; a blank display name falls back to the user id
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let display_name = display_name.into();
        let display_name = if display_name.trim().is_empty() {
            user_id.clone()
        } else {
            display_name
        };
        Self {
            user_id,
            display_name,
        }
    }
}

/// Resolve the current actor from CLI flags, environment, persisted value and config.
pub fn resolve_actor(
    storage: &Storage,
    config: &ActorConfig,
    cli_user: Option<&str>,
    cli_name: Option<&str>,
) -> Actor {
    let env_user = std::env::var(USER_ENV).ok();
    let env_name = std::env::var(USER_NAME_ENV).ok();
    let persisted = storage.read_actor().and_then(|line| parse_actor_line(&line));

    let user_id = non_empty(cli_user)
        .or_else(|| non_empty(env_user.as_deref()))
        .map(str::to_string)
        .or_else(|| persisted.as_ref().map(|actor| actor.user_id.clone()))
        .unwrap_or_else(|| config.default_id.clone());

    let display_name = non_empty(cli_name)
        .or_else(|| non_empty(env_name.as_deref()))
        .map(str::to_string)
        .or_else(|| {
            persisted
                .as_ref()
                .filter(|actor| actor.user_id == user_id)
                .map(|actor| actor.display_name.clone())
        })
        .unwrap_or_else(|| {
            if user_id == config.default_id {
                config.default_name.clone()
            } else {
                user_id.clone()
            }
        });

    Actor::new(user_id, display_name)
}

/// Persist the actor identity in `.hive/actor`.
pub fn persist_actor(storage: &Storage, user_id: &str, display_name: Option<&str>) -> Result<Actor> {
    let user_id = non_empty(Some(user_id))
        .ok_or_else(|| Error::InvalidArgument("user id cannot be empty".to_string()))?;
    if user_id.contains('\t') {
        return Err(Error::InvalidArgument(
            "user id cannot contain tabs".to_string(),
        ));
    }
    let actor = Actor::new(user_id, non_empty(display_name).unwrap_or(user_id));
    storage.write_actor(&format!("{}\t{}", actor.user_id, actor.display_name))?;
    Ok(actor)
}

fn parse_actor_line(line: &str) -> Option<Actor> {
    let mut parts = line.splitn(2, '\t');
    let user_id = non_empty(parts.next())?;
    let display_name = non_empty(parts.next()).unwrap_or(user_id);
    Some(Actor::new(user_id, display_name))
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
