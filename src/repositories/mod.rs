mod user;

pub use user::{UserRepository, UserRepositoryTrait};

#[cfg(test)]
pub use user::MockUserRepositoryTrait;
