//! Access-control processor: global pause switch and role assignments

use super::DomainProcessor;
use crate::adapters::chain::AdminDirectory;
use crate::adapters::fanout::FanOut;
use crate::adapters::storage::Projection;
use crate::core::{Domain, HandleOutcome, IndexerResult, ProcessingContext};
use crate::domain::events::{AccessControlEvent, DomainEvent, PauseToggled, RoleGranted, RoleRevoked};
use crate::domain::models::{NotificationDraft, Priority, RealtimeEvent, RoleAssignment, SystemStatus, SYSTEM_TOPIC};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const DOMAIN: Domain = Domain::AccessControl;

pub struct AccessControlProcessor {
    projection: Projection,
    fanout: FanOut,
    admins: Arc<AdminDirectory>,
}

impl AccessControlProcessor {
    pub fn new(projection: Projection, fanout: FanOut, admins: Arc<AdminDirectory>) -> Self {
        Self {
            projection,
            fanout,
            admins,
        }
    }

    async fn pause_toggled(&self, e: PauseToggled, paused: bool, context: &ProcessingContext) -> IndexerResult<()> {
        let status = SystemStatus {
            paused,
            updated_by: e.by.clone(),
            updated_at_block: context.block_height(),
        };
        self.projection.upsert(DOMAIN, &context.scope(), &status).await?;
        info!(paused, by = %e.by, block = context.block_height(), "system pause switched");

        let draft = if paused {
            NotificationDraft::new("System paused", format!("{} paused the protocol", e.by)).priority(Priority::High)
        } else {
            NotificationDraft::new("System resumed", format!("{} resumed the protocol", e.by))
        };
        for admin in self.admins.admins().await {
            self.fanout.notify(DOMAIN, &admin, draft.clone(), Some(context)).await;
        }

        self.fanout
            .broadcast(
                RealtimeEvent::new(
                    SYSTEM_TOPIC,
                    if paused { "system-paused" } else { "system-unpaused" },
                    json!({ "paused": paused, "by": e.by }),
                )
                .at(context),
            )
            .await;
        Ok(())
    }

    async fn role_changed(
        &self,
        account: String,
        role: String,
        actor: String,
        granted: bool,
        context: &ProcessingContext,
    ) -> IndexerResult<()> {
        let key = RoleAssignment::key_for(&account, &role);
        let mut assignment = self
            .projection
            .get::<RoleAssignment>(&key)
            .await?
            .unwrap_or_else(|| RoleAssignment {
                account: account.clone(),
                role: role.clone(),
                active: granted,
                granted_by: None,
                revoked_by: None,
                updated_at_block: context.block_height(),
            });
        assignment.active = granted;
        if granted {
            assignment.granted_by = Some(actor.clone());
        } else {
            assignment.revoked_by = Some(actor.clone());
        }
        assignment.updated_at_block = context.block_height();
        self.projection.upsert(DOMAIN, &context.scope(), &assignment).await?;

        // Role changes may move treasury admins
        self.admins.invalidate().await;

        let draft = if granted {
            NotificationDraft::new("Role granted", format!("{} granted you the {} role", actor, role))
        } else {
            NotificationDraft::new("Role revoked", format!("{} revoked your {} role", actor, role))
        };
        self.fanout
            .notify(DOMAIN, &account, draft.priority(Priority::High), Some(context))
            .await;
        self.fanout
            .broadcast(
                RealtimeEvent::new(
                    SYSTEM_TOPIC,
                    if granted { "role-granted" } else { "role-revoked" },
                    json!({ "account": account, "role": role, "by": actor }),
                )
                .at(context),
            )
            .await;
        Ok(())
    }
}

#[async_trait]
impl DomainProcessor for AccessControlProcessor {
    type Event = AccessControlEvent;

    async fn handle(&self, event: AccessControlEvent, context: &ProcessingContext) -> IndexerResult<HandleOutcome> {
        if !self.projection.claim(DOMAIN, context).await? {
            return Ok(HandleOutcome::Duplicate);
        }
        debug!(event = %event.tag(), tx = %context.tx_hash, "applying access-control event");

        match event {
            AccessControlEvent::SystemPaused(e) => self.pause_toggled(e, true, context).await?,
            AccessControlEvent::SystemUnpaused(e) => self.pause_toggled(e, false, context).await?,
            AccessControlEvent::RoleGranted(RoleGranted {
                account,
                role,
                granted_by,
            }) => self.role_changed(account, role, granted_by, true, context).await?,
            AccessControlEvent::RoleRevoked(RoleRevoked {
                account,
                role,
                revoked_by,
            }) => self.role_changed(account, role, revoked_by, false, context).await?,
        }
        Ok(HandleOutcome::Applied)
    }
}
