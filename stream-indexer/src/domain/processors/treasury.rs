//! Treasury processor: fee ledger and multi-sig withdrawal proposals
//!
//! Proposal readiness is recomputed on every approval against the threshold
//! read from the chain for that approval. The threshold is never cached; when
//! the chain read fails the last announced threshold is used, then the
//! configured fallback.

use super::DomainProcessor;
use crate::adapters::chain::AdminDirectory;
use crate::adapters::fanout::FanOut;
use crate::adapters::storage::Projection;
use crate::core::{
    BlockRef, ChainReader, Domain, HandleOutcome, IndexerResult, ProcessingContext, WriteScope,
    UNKNOWN_PRINCIPAL,
};
use crate::domain::events::{
    AdminChanged, DomainEvent, FeeCollected, ThresholdUpdated, TreasuryEvent, WithdrawalApproved,
    WithdrawalCancelled, WithdrawalExecuted, WithdrawalProposed,
};
use crate::domain::models::{
    NotificationDraft, Priority, Proposal, ProposalStatus, RealtimeEvent, RoleAssignment, ThresholdRecord,
    TreasuryFee, TreasuryStats, TreasuryWithdrawal, TREASURY_TOPIC,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DOMAIN: Domain = Domain::Treasury;

pub struct TreasuryProcessor {
    projection: Projection,
    fanout: FanOut,
    admins: Arc<AdminDirectory>,
    chain: Arc<dyn ChainReader>,
    fallback_threshold: u64,
}

impl TreasuryProcessor {
    pub fn new(
        projection: Projection,
        fanout: FanOut,
        admins: Arc<AdminDirectory>,
        chain: Arc<dyn ChainReader>,
        fallback_threshold: u64,
    ) -> Self {
        Self {
            projection,
            fanout,
            admins,
            chain,
            fallback_threshold,
        }
    }

    /// Threshold in force for the event being handled
    async fn approval_threshold(&self) -> IndexerResult<u64> {
        match self.chain.approval_threshold().await {
            Ok(threshold) => Ok(threshold),
            Err(e) => {
                let recorded = self.projection.get::<ThresholdRecord>(ThresholdRecord::KEY).await?;
                let threshold = recorded.map(|r| r.threshold).unwrap_or(self.fallback_threshold);
                warn!(error = %e, threshold, "threshold read failed, using fallback");
                Ok(threshold)
            }
        }
    }

    async fn notify_admins(&self, draft: NotificationDraft, except: Option<&str>, context: Option<&ProcessingContext>) {
        for admin in self.admins.admins().await {
            if Some(admin.as_str()) == except {
                continue;
            }
            self.fanout.notify(DOMAIN, &admin, draft.clone(), context).await;
        }
    }

    async fn announce(&self, event: &str, context: &ProcessingContext, payload: serde_json::Value) {
        self.fanout
            .broadcast(RealtimeEvent::new(TREASURY_TOPIC, event, payload).at(context))
            .await;
    }

    /// Bump the running totals in one atomic step
    async fn update_stats(
        &self,
        scope: &WriteScope,
        height: u64,
        update: impl FnOnce(&mut TreasuryStats) + Send + 'static,
    ) -> IndexerResult<()> {
        self.projection
            .update::<TreasuryStats, _>(DOMAIN, scope, TreasuryStats::KEY, move |stats| {
                update(stats);
                stats.updated_at_block = height;
            })
            .await
    }

    async fn fee_collected(&self, e: FeeCollected, context: &ProcessingContext) -> IndexerResult<()> {
        let fee = TreasuryFee {
            event_key: context.event_key(),
            amount: e.amount,
            source: e.source.clone(),
            payer: e.payer.clone(),
            stream_id: e.stream_id,
            block_height: context.block_height(),
            tx_hash: context.tx_hash.clone(),
        };
        self.projection.upsert(DOMAIN, &context.scope(), &fee).await?;
        let amount = e.amount;
        self.update_stats(&context.scope(), context.block_height(), move |stats| {
            stats.total_fees = stats.total_fees.saturating_add(amount);
            stats.fee_count += 1;
        })
        .await?;

        self.notify_admins(
            NotificationDraft::new("Fee collected", format!("{} collected from {}", e.amount, e.source))
                .priority(Priority::Low),
            None,
            Some(context),
        )
        .await;
        self.announce("fee-collected", context, serde_json::to_value(&fee)?).await;
        Ok(())
    }

    async fn withdrawal_proposed(&self, e: WithdrawalProposed, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let approvals = e.approval_count.unwrap_or(0);
        let proposal = Proposal {
            proposal_id: e.proposal_id,
            proposer: e.proposer.clone(),
            recipient: e.recipient.clone(),
            amount: e.amount,
            expiry_block: e.expiry_block,
            approvals,
            approvers: if approvals > 0 { vec![e.proposer.clone()] } else { Vec::new() },
            threshold: None,
            status: if approvals > 0 {
                ProposalStatus::Approving
            } else {
                ProposalStatus::Proposed
            },
            executed_by: None,
            cancelled_by: None,
            proposed_at_block: height,
            updated_at_block: height,
        };
        self.projection.upsert(DOMAIN, &context.scope(), &proposal).await?;

        self.notify_admins(
            NotificationDraft::new(
                "Withdrawal proposed",
                format!(
                    "{} proposed withdrawing {} to {} (proposal #{}, expires at block {})",
                    e.proposer, e.amount, e.recipient, e.proposal_id, e.expiry_block
                ),
            )
            .priority(Priority::High)
            .action_url(format!("/treasury/proposals/{}", e.proposal_id)),
            Some(&e.proposer),
            Some(context),
        )
        .await;
        self.announce("proposal-created", context, serde_json::to_value(&proposal)?)
            .await;
        Ok(())
    }

    async fn withdrawal_approved(&self, e: WithdrawalApproved, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let threshold = self.approval_threshold().await?;

        let mut proposal = match self.projection.get::<Proposal>(&Proposal::key_for(e.proposal_id)).await? {
            Some(proposal) => proposal,
            None => {
                warn!(proposal_id = %e.proposal_id, "approval for unknown proposal");
                Proposal {
                    proposal_id: e.proposal_id,
                    proposer: UNKNOWN_PRINCIPAL.to_string(),
                    recipient: UNKNOWN_PRINCIPAL.to_string(),
                    amount: 0,
                    expiry_block: u64::MAX,
                    approvals: 0,
                    approvers: Vec::new(),
                    threshold: None,
                    status: ProposalStatus::Proposed,
                    executed_by: None,
                    cancelled_by: None,
                    proposed_at_block: height,
                    updated_at_block: height,
                }
            }
        };

        proposal.approvals = e.approval_count;
        if !proposal.approvers.contains(&e.approver) {
            proposal.approvers.push(e.approver.clone());
        }
        proposal.threshold = Some(threshold);
        proposal.status = proposal.status.after_approval(e.approval_count, threshold);
        proposal.updated_at_block = height;
        self.projection.upsert(DOMAIN, &context.scope(), &proposal).await?;

        let draft = if proposal.status == ProposalStatus::Ready {
            NotificationDraft::new(
                "Proposal ready to execute",
                format!(
                    "Proposal #{} reached {}/{} approvals and is ready to execute",
                    e.proposal_id, e.approval_count, threshold
                ),
            )
            .priority(Priority::High)
        } else {
            NotificationDraft::new(
                "Proposal approval pending",
                format!(
                    "{} approved proposal #{} ({}/{} approvals)",
                    e.approver, e.proposal_id, e.approval_count, threshold
                ),
            )
        };
        let draft = draft.action_url(format!("/treasury/proposals/{}", e.proposal_id));
        self.fanout
            .notify(DOMAIN, &proposal.proposer, draft, Some(context))
            .await;

        self.announce(
            "proposal-approved",
            context,
            json!({
                "proposal_id": e.proposal_id.to_string(),
                "approver": e.approver,
                "approvals": e.approval_count,
                "threshold": threshold,
                "status": proposal.status,
            }),
        )
        .await;
        Ok(())
    }

    async fn withdrawal_executed(&self, e: WithdrawalExecuted, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let withdrawal = TreasuryWithdrawal {
            proposal_id: e.proposal_id,
            executor: e.executor.clone(),
            recipient: e.recipient.clone(),
            amount: e.amount,
            block_height: height,
            tx_hash: context.tx_hash.clone(),
        };
        self.projection.upsert(DOMAIN, &context.scope(), &withdrawal).await?;

        let mut proposer = UNKNOWN_PRINCIPAL.to_string();
        match self.projection.get::<Proposal>(&Proposal::key_for(e.proposal_id)).await? {
            Some(mut proposal) => {
                proposal.status = ProposalStatus::Executed;
                proposal.executed_by = Some(e.executor.clone());
                proposal.updated_at_block = height;
                self.projection.upsert(DOMAIN, &context.scope(), &proposal).await?;
                proposer = proposal.proposer;
            }
            None => warn!(proposal_id = %e.proposal_id, "execution of unknown proposal"),
        }

        let amount = e.amount;
        self.update_stats(&context.scope(), height, move |stats| {
            stats.total_withdrawn = stats.total_withdrawn.saturating_add(amount);
            stats.withdrawal_count += 1;
        })
        .await?;

        self.fanout
            .notify(
                DOMAIN,
                &e.recipient,
                NotificationDraft::new(
                    "Treasury withdrawal received",
                    format!("{} was sent to you from the treasury", e.amount),
                )
                .priority(Priority::High),
                Some(context),
            )
            .await;
        if proposer != e.recipient {
            self.fanout
                .notify(
                    DOMAIN,
                    &proposer,
                    NotificationDraft::new(
                        "Proposal executed",
                        format!("Proposal #{} was executed by {}", e.proposal_id, e.executor),
                    ),
                    Some(context),
                )
                .await;
        }
        self.announce("proposal-executed", context, serde_json::to_value(&withdrawal)?)
            .await;
        Ok(())
    }

    async fn withdrawal_cancelled(&self, e: WithdrawalCancelled, context: &ProcessingContext) -> IndexerResult<()> {
        let mut proposer = UNKNOWN_PRINCIPAL.to_string();
        match self.projection.get::<Proposal>(&Proposal::key_for(e.proposal_id)).await? {
            Some(mut proposal) => {
                proposal.status = ProposalStatus::Cancelled;
                proposal.cancelled_by = Some(e.cancelled_by.clone());
                proposal.updated_at_block = context.block_height();
                self.projection.upsert(DOMAIN, &context.scope(), &proposal).await?;
                proposer = proposal.proposer;
            }
            None => warn!(proposal_id = %e.proposal_id, "cancellation of unknown proposal"),
        }

        self.fanout
            .notify(
                DOMAIN,
                &proposer,
                NotificationDraft::new(
                    "Proposal cancelled",
                    format!("Proposal #{} was cancelled by {}", e.proposal_id, e.cancelled_by),
                ),
                Some(context),
            )
            .await;
        self.announce(
            "proposal-cancelled",
            context,
            json!({ "proposal_id": e.proposal_id.to_string(), "cancelled_by": e.cancelled_by }),
        )
        .await;
        Ok(())
    }

    async fn admin_changed(&self, e: AdminChanged, added: bool, context: &ProcessingContext) -> IndexerResult<()> {
        let key = RoleAssignment::key_for(&e.admin, RoleAssignment::TREASURY_ADMIN);
        let mut role = self
            .projection
            .get::<RoleAssignment>(&key)
            .await?
            .unwrap_or_else(|| RoleAssignment {
                account: e.admin.clone(),
                role: RoleAssignment::TREASURY_ADMIN.to_string(),
                active: added,
                granted_by: None,
                revoked_by: None,
                updated_at_block: context.block_height(),
            });
        role.active = added;
        role.updated_at_block = context.block_height();
        self.projection.upsert(DOMAIN, &context.scope(), &role).await?;
        self.admins.invalidate().await;

        let (title, body) = if added {
            ("Treasury admin added", "You are now a treasury admin")
        } else {
            ("Treasury admin removed", "You are no longer a treasury admin")
        };
        self.fanout
            .notify(DOMAIN, &e.admin, NotificationDraft::new(title, body).priority(Priority::High), Some(context))
            .await;
        self.announce(
            if added { "admin-added" } else { "admin-removed" },
            context,
            json!({ "admin": e.admin }),
        )
        .await;
        Ok(())
    }

    async fn threshold_updated(&self, e: ThresholdUpdated, context: &ProcessingContext) -> IndexerResult<()> {
        let record = ThresholdRecord {
            threshold: e.threshold,
            updated_at_block: context.block_height(),
        };
        self.projection.upsert(DOMAIN, &context.scope(), &record).await?;

        self.notify_admins(
            NotificationDraft::new(
                "Approval threshold changed",
                format!("Withdrawals now need {} approvals", e.threshold),
            ),
            None,
            Some(context),
        )
        .await;
        self.announce("threshold-updated", context, json!({ "threshold": e.threshold }))
            .await;
        Ok(())
    }

    /// Mark open proposals whose expiry block has been reached
    async fn expire_proposals(&self, block: &BlockRef) -> IndexerResult<usize> {
        let scope = WriteScope::Block(block.clone());
        let mut expired = 0;

        for status in [ProposalStatus::Proposed, ProposalStatus::Approving] {
            let open = self.projection.find::<Proposal>("status", json!(status.as_str())).await?;
            for mut proposal in open.into_iter().filter(|p| p.is_expired_at(block.index)) {
                proposal.status = ProposalStatus::Expired;
                proposal.updated_at_block = block.index;
                self.projection.upsert(DOMAIN, &scope, &proposal).await?;
                expired += 1;

                self.fanout
                    .notify(
                        DOMAIN,
                        &proposal.proposer,
                        NotificationDraft::new(
                            "Proposal expired",
                            format!(
                                "Proposal #{} expired with {} approvals",
                                proposal.proposal_id, proposal.approvals
                            ),
                        ),
                        None,
                    )
                    .await;
                self.fanout
                    .broadcast(RealtimeEvent::new(
                        TREASURY_TOPIC,
                        "proposal-expired",
                        json!({ "proposal_id": proposal.proposal_id.to_string(), "block": block.index }),
                    ))
                    .await;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl DomainProcessor for TreasuryProcessor {
    type Event = TreasuryEvent;

    async fn handle(&self, event: TreasuryEvent, context: &ProcessingContext) -> IndexerResult<HandleOutcome> {
        if !self.projection.claim(DOMAIN, context).await? {
            return Ok(HandleOutcome::Duplicate);
        }
        debug!(event = %event.tag(), tx = %context.tx_hash, "applying treasury event");

        match event {
            TreasuryEvent::FeeCollected(e) => self.fee_collected(e, context).await?,
            TreasuryEvent::WithdrawalProposed(e) => self.withdrawal_proposed(e, context).await?,
            TreasuryEvent::WithdrawalApproved(e) => self.withdrawal_approved(e, context).await?,
            TreasuryEvent::WithdrawalExecuted(e) => self.withdrawal_executed(e, context).await?,
            TreasuryEvent::WithdrawalCancelled(e) => self.withdrawal_cancelled(e, context).await?,
            TreasuryEvent::AdminAdded(e) => self.admin_changed(e, true, context).await?,
            TreasuryEvent::AdminRemoved(e) => self.admin_changed(e, false, context).await?,
            TreasuryEvent::ThresholdUpdated(e) => self.threshold_updated(e, context).await?,
        }
        Ok(HandleOutcome::Applied)
    }

    async fn after_block(&self, block: &BlockRef) -> IndexerResult<()> {
        let expired = self.expire_proposals(block).await?;
        if expired > 0 {
            info!(block = block.index, expired, "expired withdrawal proposals");
        }
        Ok(())
    }
}
