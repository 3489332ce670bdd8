//! Lifecycle policy documents
//!
//! Only one rule is ever installed. The registry accepts a single rule with
//! `tagStatus: any`, so the policy is overwritten rather than merged.

use crate::error::CacheResult;
use serde::Serialize;

/// Registry lifecycle policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecyclePolicy {
    pub rules: Vec<LifecycleRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub rule_priority: u32,
    pub description: String,
    pub selection: Selection,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub tag_status: TagStatus,
    pub count_type: CountType,
    pub count_unit: CountUnit,
    pub count_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStatus {
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CountType {
    SinceImagePushed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountUnit {
    Days,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
}

impl LifecyclePolicy {
    /// Expire every image pushed more than `days` days ago
    pub fn expire_after_days(days: u32) -> Self {
        Self {
            rules: vec![LifecycleRule {
                rule_priority: 1,
                description: format!("Expire images older than {} days", days),
                selection: Selection {
                    tag_status: TagStatus::Any,
                    count_type: CountType::SinceImagePushed,
                    count_unit: CountUnit::Days,
                    count_number: days,
                },
                action: Action {
                    kind: "expire".to_string(),
                },
            }],
        }
    }

    /// Policy text as accepted by the registry API
    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
