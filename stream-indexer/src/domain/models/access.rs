//! System status and role documents

use super::Document;
use crate::core::Collection;
use serde::{Deserialize, Serialize};

/// Global pause switch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStatus {
    pub paused: bool,
    pub updated_by: String,
    pub updated_at_block: u64,
}

impl SystemStatus {
    pub const KEY: &'static str = "global";
}

impl Document for SystemStatus {
    const COLLECTION: Collection = Collection::SystemStatus;

    fn key(&self) -> String {
        Self::KEY.to_string()
    }
}

/// Last approval threshold announced on-chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdRecord {
    pub threshold: u64,
    pub updated_at_block: u64,
}

impl ThresholdRecord {
    pub const KEY: &'static str = "treasury-threshold";
}

impl Document for ThresholdRecord {
    const COLLECTION: Collection = Collection::SystemStatus;

    fn key(&self) -> String {
        Self::KEY.to_string()
    }
}

/// Role held by an account, keyed by `account:role`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleAssignment {
    pub account: String,
    pub role: String,
    pub active: bool,
    pub granted_by: Option<String>,
    pub revoked_by: Option<String>,
    pub updated_at_block: u64,
}

impl RoleAssignment {
    /// Role recorded for treasury admins added through treasury events
    pub const TREASURY_ADMIN: &'static str = "treasury-admin";

    pub fn key_for(account: &str, role: &str) -> String {
        format!("{}:{}", account, role)
    }
}

impl Document for RoleAssignment {
    const COLLECTION: Collection = Collection::Roles;

    fn key(&self) -> String {
        Self::key_for(&self.account, &self.role)
    }
}
