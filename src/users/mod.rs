pub mod membership;
pub mod repo;
pub mod repo_types;

#[cfg(test)]
pub mod memory;

pub use repo::{PgUserStore, UserStore};
pub use repo_types::User;
