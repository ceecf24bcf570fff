mod session_purge;
mod user;

pub use session_purge::purge_sessions_periodically;
pub use user::{IssuedSession, UserService};
