pub mod auth;
pub mod dao;
pub mod feed;
pub mod storage;

pub use auth::AuthService;
pub use dao::*;
pub use feed::{ChangeFeed, Subscription, Topic};
pub use storage::{LocalObjectStore, ObjectStore};
