use rand::Rng;
use time::{macros::format_description, OffsetDateTime};

use super::repo_types::User;

pub const MEMBERSHIP_PREFIX: &str = "LBK";
pub const DEFAULT_MEMBER_LEVEL: &str = "Gold";

/// `LBK` followed by five random digits. Uniqueness is left to the
/// storage-level index.
pub fn generate_membership_id() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{MEMBERSHIP_PREFIX}{n:05}")
}

/// Day/month/year with no zero padding, e.g. `5/3/2024`.
pub fn member_since(created_at: OffsetDateTime) -> Result<String, time::error::Format> {
    created_at.format(format_description!(
        "[day padding:none]/[month padding:none]/[year]"
    ))
}

pub fn full_name(user: &User) -> String {
    format!("{} {}", user.first_name, user.last_name)
}
