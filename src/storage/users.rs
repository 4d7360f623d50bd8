use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::UserRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Insert a new user, enforcing username uniqueness.
    ///
    /// Returns `false` without writing anything if the username is already
    /// taken. The check and the insert share one write transaction, so two
    /// concurrent registrations cannot both claim the same name.
    pub fn create_user(&self, user: &UserRecord) -> Result<bool, DatabaseError> {
        debug_assert!(!user.id.is_empty(), "user id must not be empty");
        debug_assert!(!user.username.is_empty(), "username must not be empty");

        let write_txn = self.begin_write()?;
        let created = {
            let mut usernames = write_txn.open_table(USERNAMES)?;
            if usernames.get(user.username.as_str())?.is_some() {
                false
            } else {
                usernames.insert(user.username.as_str(), user.id.as_str())?;
                drop(usernames);

                let mut users = write_txn.open_table(USERS)?;
                let data = rmp_serde::to_vec_named(user)?;
                users.insert(user.id.as_str(), data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(created)
    }

    /// Get a user by uuid
    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        match table.get(id)? {
            Some(data) => {
                let user: UserRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Get a user by username (resolves username -> uuid -> user)
    pub fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let usernames = read_txn.open_table(USERNAMES)?;

        let id = match usernames.get(username)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(id.as_str())? {
            Some(data) => {
                let user: UserRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Check if a username is already registered
    pub fn username_exists(&self, username: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERNAMES)?;
        Ok(table.get(username)?.is_some())
    }
}
