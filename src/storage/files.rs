use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a file record and update the ownership index
    pub fn put_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.hash.is_empty(), "file hash must not be empty");
        debug_assert!(!file.user_id.is_empty(), "file user_id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.hash.as_str(), data.as_slice())?;

            let mut owner_table = write_txn.open_table(USER_FILES)?;
            let mut hashes: Vec<String> = match owner_table.get(file.user_id.as_str())? {
                Some(data) => rmp_serde::from_slice(data.value())?,
                None => Vec::new(),
            };

            if !hashes.contains(&file.hash) {
                hashes.push(file.hash.clone());
                let index_data = rmp_serde::to_vec_named(&hashes)?;
                owner_table.insert(file.user_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its content hash
    pub fn get_file(&self, hash: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(hash)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get a file by hash only if it is owned by the given user
    pub fn get_file_owned(
        &self,
        hash: &str,
        user_id: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        match self.get_file(hash)? {
            Some(file) if file.user_id == user_id => Ok(Some(file)),
            _ => Ok(None),
        }
    }

    /// Get all files owned by a user
    pub fn list_files_by_user(&self, user_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(USER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let hashes: Vec<String> = match owner_table.get(user_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for hash in hashes {
            if let Some(data) = files_table.get(hash.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// Delete a file by hash and clean up the ownership index.
    ///
    /// Returns `false` if no record existed for the hash.
    pub fn delete_file(&self, hash: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        // Get the file for index cleanup
        let owner: Option<String> = {
            let table = write_txn.open_table(FILES)?;
            let owner = match table.get(hash)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file.user_id)
                }
                None => None,
            };
            owner
        };

        let deleted = match owner {
            Some(user_id) => {
                {
                    let mut table = write_txn.open_table(FILES)?;
                    table.remove(hash)?;
                }
                // Remove from ownership index
                let hashes: Option<Vec<String>> = {
                    let owner_table = write_txn.open_table(USER_FILES)?;
                    let hashes = match owner_table.get(user_id.as_str())? {
                        Some(data) => Some(rmp_serde::from_slice(data.value())?),
                        None => None,
                    };
                    hashes
                };

                if let Some(mut hashes) = hashes {
                    hashes.retain(|h| h != hash);
                    let mut owner_table = write_txn.open_table(USER_FILES)?;
                    if hashes.is_empty() {
                        owner_table.remove(user_id.as_str())?;
                    } else {
                        let new_data = rmp_serde::to_vec_named(&hashes)?;
                        owner_table.insert(user_id.as_str(), new_data.as_slice())?;
                    }
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Get all files (for admin/purge reporting)
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        Ok(files)
    }
}
