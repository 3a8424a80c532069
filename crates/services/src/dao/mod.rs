pub mod base;
pub mod bulletin;
pub mod chat;
pub mod log;
pub mod user;

pub use base::{BaseDao, DaoError, DaoResult};
pub use bulletin::BulletinDao;
pub use chat::ChatDao;
pub use log::{LogDao, PackageLogDao, VisitorLogDao};
pub use user::UserDao;
