pub mod comments;
pub mod kv;
pub mod pool;
pub mod schema;
