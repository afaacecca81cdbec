//! User record storage
//!
//! The engine never keeps user records between calls. Callers hand the
//! service a [`UserStore`] and every operation loads, mutates and writes back
//! a single record through it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::UserRecord;

/// Key-value access to user records by id
pub trait UserStore {
    /// Insert a new record; replaces any record already stored under its id.
    fn create(&mut self, record: UserRecord) -> Result<(), ComputeError>;

    /// Fetch a copy of the record for `user_id`.
    fn get(&self, user_id: &str) -> Result<UserRecord, ComputeError>;

    /// Write back a record that already exists.
    fn update(&mut self, record: UserRecord) -> Result<(), ComputeError>;

    /// Ids of all stored records, sorted.
    fn user_ids(&self) -> Vec<String>;
}

/// HashMap-backed store, serializable for snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryUserStore {
    users: HashMap<String, UserRecord>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Load a store snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl UserStore for InMemoryUserStore {
    fn create(&mut self, record: UserRecord) -> Result<(), ComputeError> {
        self.users.insert(record.user_id.clone(), record);
        Ok(())
    }

    fn get(&self, user_id: &str) -> Result<UserRecord, ComputeError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| ComputeError::UserNotFound(user_id.to_string()))
    }

    fn update(&mut self, record: UserRecord) -> Result<(), ComputeError> {
        match self.users.get_mut(&record.user_id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(ComputeError::UserNotFound(record.user_id)),
        }
    }

    fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.users.keys().cloned().collect();
        ids.sort();
        ids
    }
}
