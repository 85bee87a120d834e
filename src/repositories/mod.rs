//! External key-value storage.

pub mod redis_repo;

pub use redis_repo::RedisRepository;
