//! Well-known principals, zones, and storage defaults.

/// Administrative sentinel; always granted everything, never resolved.
pub const ADMIN_USER: &str = "admin";
/// Unauthenticated principal. Resolved like any other principal.
pub const ANON_USER: &str = "anonymous";
/// Universal group every principal chain ends with.
pub const EVERYONE: &str = "everyone";

/// Content tree zone.
pub const ZONE_CONTENT: &str = "CO";
/// Authorizable (user/group) record zone.
pub const ZONE_AUTHORIZABLES: &str = "AU";

/// Normalized key of the repository root.
pub const ROOT_PATH: &str = "";

/// Suffix marking a grant entry key (`<id>@g`).
pub const GRANT_SUFFIX: &str = "@g";
/// Suffix marking a deny entry key (`<id>@d`).
pub const DENY_SUFFIX: &str = "@d";

/// Separates zone and path inside a storage row key.
pub const ROW_KEY_SEPARATOR: char = ';';
/// Separates a principal kind prefix from the rest of the id (`kind:rest`).
pub const PRINCIPAL_KIND_SEPARATOR: char = ':';

pub const DEFAULT_KEYSPACE: &str = "n";
pub const DEFAULT_ACL_COLUMN_FAMILY: &str = "ac";
/// Decoded ACLs kept in memory by default.
pub const DEFAULT_ACL_CACHE_CAPACITY: usize = 4096;

/// Magic prefix of an ACL log file.
pub const ACL_LOG_MAGIC: [u8; 8] = *b"ARBORLG\x01";
