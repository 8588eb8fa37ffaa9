use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = backend_common::id::prefixed_ulid("cmt");
/// assert!(id.starts_with("cmt_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const COMMENT: &str = "cmt";
    pub const CONNECTION: &str = "ws";
}
