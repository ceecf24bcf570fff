mod user;

pub use user::{validate_name, validate_password};
