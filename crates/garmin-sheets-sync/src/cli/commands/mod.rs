pub mod auth;
pub mod sync;

pub use auth::{export_session, login, logout, status};
pub use sync::{run as sync_run, SyncArgs};
