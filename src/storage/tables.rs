use redb::TableDefinition;

/// User records: uuid -> UserRecord (msgpack)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Username index: username -> uuid (uniqueness constraint + login lookups)
pub const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// File records: content hash (fid) -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Ownership index: user uuid -> msgpack Vec of file hashes
pub const USER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("user_files");
