//! Terms of service versions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::error::StoreResult;
use crate::shared::ids::{get_millis, new_id};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TermsOfService {
    #[validate(length(min = 1, max = 26))]
    pub id: String,
    pub create_at: i64,
    #[validate(length(min = 1, max = 26))]
    pub user_id: String,
    #[validate(length(max = 16383))]
    pub text: String,
}

impl TermsOfService {
    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        self.create_at = get_millis();
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TermsOfServiceStore: Send + Sync {
    /// Insert only; a version is never edited.
    async fn save(&self, terms: &TermsOfService) -> StoreResult<TermsOfService>;

    async fn get(&self, id: &str) -> StoreResult<TermsOfService>;

    /// The version with the greatest `CreateAt`.
    async fn get_latest(&self) -> StoreResult<TermsOfService>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_save_always_stamps_create_at() {
        let mut terms = TermsOfService {
            id: "t1".into(),
            create_at: 5,
            user_id: "u1".into(),
            text: "be nice".into(),
        };
        terms.pre_save();
        assert_eq!(terms.id, "t1");
        assert!(terms.create_at > 5);
        assert!(terms.validate().is_ok());
    }
}
