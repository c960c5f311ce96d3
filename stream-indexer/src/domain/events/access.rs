//! Access-control events: global pause switch and role assignments

use super::{DomainEvent, Fields};
use crate::core::{DecodeError, Domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseToggled {
    pub by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGranted {
    pub account: String,
    pub role: String,
    pub granted_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRevoked {
    pub account: String,
    pub role: String,
    pub revoked_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessControlEvent {
    SystemPaused(PauseToggled),
    SystemUnpaused(PauseToggled),
    RoleGranted(RoleGranted),
    RoleRevoked(RoleRevoked),
}

impl DomainEvent for AccessControlEvent {
    const DOMAIN: Domain = Domain::AccessControl;

    const TAGS: &'static [&'static str] = &[
        "system-paused",
        "system-unpaused",
        "role-granted",
        "role-revoked",
    ];

    fn decode(tag: &str, f: &Fields<'_>) -> Result<Self, DecodeError> {
        let event = match tag {
            "system-paused" => AccessControlEvent::SystemPaused(PauseToggled {
                by: f.principal("paused-by")?,
            }),
            "system-unpaused" => AccessControlEvent::SystemUnpaused(PauseToggled {
                by: f.principal("unpaused-by")?,
            }),
            "role-granted" => AccessControlEvent::RoleGranted(RoleGranted {
                account: f.principal("account")?,
                role: f.string("role")?,
                granted_by: f.principal("granted-by")?,
            }),
            "role-revoked" => AccessControlEvent::RoleRevoked(RoleRevoked {
                account: f.principal("account")?,
                role: f.string("role")?,
                revoked_by: f.principal("revoked-by")?,
            }),
            other => return Err(DecodeError::UnknownTag(other.to_string())),
        };
        Ok(event)
    }

    fn tag(&self) -> &'static str {
        match self {
            AccessControlEvent::SystemPaused(_) => "system-paused",
            AccessControlEvent::SystemUnpaused(_) => "system-unpaused",
            AccessControlEvent::RoleGranted(_) => "role-granted",
            AccessControlEvent::RoleRevoked(_) => "role-revoked",
        }
    }
}
