pub mod bulletin_post;
pub mod chat;
pub mod message;
pub mod package_entry;
pub mod user;
pub mod visitor_entry;

pub use bulletin_post::{BulletinPost, Category};
pub use chat::{ChatThread, ThreadId, ThreadIdError};
pub use message::Message;
pub use package_entry::PackageEntry;
pub use user::{Role, User};
pub use visitor_entry::VisitorEntry;
