//! User record persistence.
//!
//! The protocol core never touches storage directly; resource and tool
//! handlers go through [`UserStore`].

pub mod json_file;

pub use json_file::JsonFileStore;

use crate::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
}

/// User fields supplied by a caller; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
}

impl NewUser {
    pub fn with_id(self, id: u64) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            address: self.address,
            phone: self.phone,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Every record, in insertion order.
    async fn all(&self) -> StoreResult<Vec<User>>;

    /// One record by id; `StoreError::UserNotFound` when absent.
    async fn find(&self, id: u64) -> StoreResult<User>;

    /// Append a record and return its assigned id.
    async fn create(&self, user: NewUser) -> StoreResult<u64>;
}
