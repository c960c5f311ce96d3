//! Treasury proposal lifecycle and access-control projection

mod common;

use anyhow::Result;
use common::*;
use serde_json::{json, Value};
use stream_indexer::adapters::storage::Projection;
use stream_indexer::core::Domain;
use stream_indexer::domain::models::{
    Proposal, ProposalStatus, RoleAssignment, SystemStatus, ThresholdRecord, TreasuryStats,
};

const ADMINS: [&str; 3] = ["SP_ADMIN1", "SP_ADMIN2", "SP_ADMIN3"];

fn treasury_block(index: u64, events: Vec<Value>) -> Value {
    apply(vec![block(
        index,
        &format!("0xt{}", index),
        vec![tx(&format!("0xtx{}", index), true, events)],
    )])
}

fn proposed(id: u64, expiry: u64) -> Value {
    print(json!({
        "event": "treasury-withdrawal-proposed",
        "proposal-id": id,
        "proposer": "SP_ADMIN1",
        "recipient": "SP_VENDOR",
        "amount": 5000,
        "expiry-block": expiry
    }))
}

fn approved(id: u64, approver: &str, count: u64) -> Value {
    print(json!({
        "event": "treasury-withdrawal-approved",
        "proposal-id": id,
        "approver": approver,
        "approval-count": count
    }))
}

async fn proposal(harness: &Harness, id: u128) -> Result<Proposal> {
    Projection::new(harness.store.clone())
        .get::<Proposal>(&Proposal::key_for(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("proposal {} missing", id))
}

#[tokio::test]
async fn test_three_approvals_with_threshold_three() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, Some(3)));
    harness.ingest(Domain::Treasury, treasury_block(1, vec![proposed(1, 500)])).await;

    // Everyone but the proposer hears about the new proposal
    assert!(harness.notifications_for("SP_ADMIN1").await.is_empty());
    assert_eq!(harness.notifications_for("SP_ADMIN2").await.len(), 1);

    let result = harness
        .ingest(
            Domain::Treasury,
            treasury_block(
                2,
                vec![
                    approved(1, "SP_ADMIN1", 1),
                    approved(1, "SP_ADMIN2", 2),
                    approved(1, "SP_ADMIN3", 3),
                ],
            ),
        )
        .await;
    assert!(result.success(), "{:?}", result.errors);
    assert_eq!(result.processed, 3);

    let proposal = proposal(&harness, 1).await?;
    assert_eq!(proposal.status, ProposalStatus::Ready);
    assert_eq!(proposal.approvals, 3);
    assert_eq!(proposal.threshold, Some(3));
    assert_eq!(proposal.approvers.len(), 3);

    let mut titles: Vec<String> = harness
        .notifications_for("SP_ADMIN1")
        .await
        .into_iter()
        .map(|n| n.title)
        .collect();
    titles.sort();
    assert_eq!(
        titles,
        vec![
            "Proposal approval pending".to_string(),
            "Proposal approval pending".to_string(),
            "Proposal ready to execute".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_threshold_read_per_approval() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, Some(3)));
    harness.ingest(Domain::Treasury, treasury_block(1, vec![proposed(1, 500)])).await;
    harness
        .ingest(Domain::Treasury, treasury_block(2, vec![approved(1, "SP_ADMIN2", 2)]))
        .await;
    assert_eq!(proposal(&harness, 1).await?.status, ProposalStatus::Approving);

    // Threshold lowered on-chain between approvals
    *harness.chain.threshold.lock().unwrap() = Some(2);
    harness
        .ingest(Domain::Treasury, treasury_block(3, vec![approved(1, "SP_ADMIN3", 2)]))
        .await;
    assert_eq!(proposal(&harness, 1).await?.status, ProposalStatus::Ready);
    Ok(())
}

#[tokio::test]
async fn test_threshold_falls_back_to_last_announced() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, None));
    harness
        .ingest(
            Domain::Treasury,
            treasury_block(
                1,
                vec![
                    print(json!({ "event": "treasury-threshold-updated", "threshold": 1 })),
                    proposed(1, 500),
                    approved(1, "SP_ADMIN2", 1),
                ],
            ),
        )
        .await;

    let projection = Projection::new(harness.store.clone());
    let record = projection
        .get::<ThresholdRecord>(ThresholdRecord::KEY)
        .await?
        .expect("threshold recorded");
    assert_eq!(record.threshold, 1);
    assert_eq!(proposal(&harness, 1).await?.status, ProposalStatus::Ready);
    Ok(())
}

#[tokio::test]
async fn test_threshold_falls_back_to_config() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, None));
    harness
        .ingest(
            Domain::Treasury,
            treasury_block(1, vec![proposed(1, 500), approved(1, "SP_ADMIN2", 1)]),
        )
        .await;

    // Configured fallback is 2
    let proposal = proposal(&harness, 1).await?;
    assert_eq!(proposal.status, ProposalStatus::Approving);
    assert_eq!(proposal.threshold, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_open_proposal_expires_at_expiry_block() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, Some(3)));
    harness
        .ingest(Domain::Treasury, treasury_block(5, vec![proposed(1, 10), proposed(2, 50)]))
        .await;

    harness.ingest(Domain::Treasury, treasury_block(9, vec![])).await;
    assert_eq!(proposal(&harness, 1).await?.status, ProposalStatus::Proposed);

    harness.ingest(Domain::Treasury, treasury_block(10, vec![])).await;
    assert_eq!(proposal(&harness, 1).await?.status, ProposalStatus::Expired);
    assert_eq!(proposal(&harness, 2).await?.status, ProposalStatus::Proposed);

    let expired = harness
        .notifications_for("SP_ADMIN1")
        .await
        .into_iter()
        .filter(|n| n.title == "Proposal expired")
        .count();
    assert_eq!(expired, 1);
    assert_eq!(harness.recorder.on_channel("treasury").iter().filter(|e| e.event == "proposal-expired").count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_execution_updates_totals() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, Some(1)));
    harness
        .ingest(
            Domain::Treasury,
            treasury_block(
                1,
                vec![
                    print(json!({ "event": "treasury-fee-collected", "amount": 250, "source": "stream-fee" })),
                    proposed(1, 500),
                    approved(1, "SP_ADMIN2", 1),
                    print(json!({
                        "event": "treasury-withdrawal-executed",
                        "proposal-id": 1,
                        "executor": "SP_ADMIN3",
                        "recipient": "SP_VENDOR",
                        "amount": 5000
                    })),
                ],
            ),
        )
        .await;

    let projection = Projection::new(harness.store.clone());
    let stats = projection
        .get::<TreasuryStats>(TreasuryStats::KEY)
        .await?
        .expect("stats");
    assert_eq!(stats.total_fees, 250);
    assert_eq!(stats.total_withdrawn, 5000);
    assert_eq!(stats.fee_count, 1);
    assert_eq!(stats.withdrawal_count, 1);

    let proposal = proposal(&harness, 1).await?;
    assert_eq!(proposal.status, ProposalStatus::Executed);
    assert_eq!(proposal.executed_by.as_deref(), Some("SP_ADMIN3"));
    assert_eq!(harness.notifications_for("SP_VENDOR").await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_added_admin_is_notified_without_waiting_for_cache() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&["SP_ADMIN1"], Some(1)));
    harness
        .ingest(
            Domain::Treasury,
            treasury_block(
                1,
                vec![print(json!({ "event": "treasury-fee-collected", "amount": 1, "source": "fee" }))],
            ),
        )
        .await;
    assert_eq!(harness.notifications_for("SP_ADMIN1").await.len(), 1);

    harness.chain.admins.lock().unwrap().push("SP_NEW".to_string());
    harness
        .ingest(
            Domain::Treasury,
            treasury_block(
                2,
                vec![
                    print(json!({ "event": "treasury-admin-added", "admin": "SP_NEW" })),
                    print(json!({ "event": "treasury-fee-collected", "amount": 2, "source": "fee" })),
                ],
            ),
        )
        .await;

    let role = Projection::new(harness.store.clone())
        .get::<RoleAssignment>(&RoleAssignment::key_for("SP_NEW", RoleAssignment::TREASURY_ADMIN))
        .await?
        .expect("role recorded");
    assert!(role.active);

    let titles: Vec<String> = harness
        .notifications_for("SP_NEW")
        .await
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert!(titles.contains(&"Fee collected".to_string()), "{:?}", titles);
    Ok(())
}

#[tokio::test]
async fn test_pause_switch_and_roles() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, Some(2)));
    let result = harness
        .ingest(
            Domain::AccessControl,
            treasury_block(
                1,
                vec![
                    print(json!({ "event": "system-paused", "paused-by": "SP_ADMIN1" })),
                    print(json!({
                        "event": "role-granted",
                        "account": "SP_OPERATOR",
                        "role": "operator",
                        "granted-by": "SP_ADMIN1"
                    })),
                ],
            ),
        )
        .await;
    assert_eq!(result.processed, 2);

    let projection = Projection::new(harness.store.clone());
    let status = projection
        .get::<SystemStatus>(SystemStatus::KEY)
        .await?
        .expect("status");
    assert!(status.paused);
    assert_eq!(status.updated_by, "SP_ADMIN1");

    let role = projection
        .get::<RoleAssignment>(&RoleAssignment::key_for("SP_OPERATOR", "operator"))
        .await?
        .expect("role");
    assert!(role.active);
    assert_eq!(role.granted_by.as_deref(), Some("SP_ADMIN1"));

    for admin in ADMINS {
        assert_eq!(harness.notifications_for(admin).await.len(), 1, "{}", admin);
    }
    assert_eq!(harness.notifications_for("SP_OPERATOR").await.len(), 1);
    assert_eq!(harness.recorder.on_channel("system").len(), 2);

    harness
        .ingest(
            Domain::AccessControl,
            treasury_block(
                2,
                vec![print(json!({ "event": "system-unpaused", "unpaused-by": "SP_ADMIN2" }))],
            ),
        )
        .await;
    let status = projection
        .get::<SystemStatus>(SystemStatus::KEY)
        .await?
        .expect("status");
    assert!(!status.paused);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_proposal_is_final() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, Some(3)));
    harness.ingest(Domain::Treasury, treasury_block(1, vec![proposed(1, 10)])).await;
    harness
        .ingest(Domain::Treasury, treasury_block(2, vec![approved(1, "SP_ADMIN2", 1)]))
        .await;

    let result = harness
        .ingest(
            Domain::Treasury,
            treasury_block(
                3,
                vec![print(json!({
                    "event": "treasury-withdrawal-cancelled",
                    "proposal-id": 1,
                    "cancelled-by": "SP_ADMIN3"
                }))],
            ),
        )
        .await;
    assert!(result.success(), "{:?}", result.errors);
    assert_eq!(result.processed, 1);

    // Passing the expiry block leaves a cancelled proposal alone
    harness.ingest(Domain::Treasury, treasury_block(10, vec![])).await;

    let proposal = proposal(&harness, 1).await?;
    assert_eq!(proposal.status, ProposalStatus::Cancelled);
    assert_eq!(proposal.cancelled_by.as_deref(), Some("SP_ADMIN3"));
    assert_eq!(proposal.updated_at_block, 3);

    let titles: Vec<String> = harness
        .notifications_for("SP_ADMIN1")
        .await
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert!(titles.contains(&"Proposal cancelled".to_string()), "{:?}", titles);
    assert!(!titles.contains(&"Proposal expired".to_string()), "{:?}", titles);

    let announced: Vec<String> = harness
        .recorder
        .on_channel("treasury")
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(announced.iter().filter(|e| *e == "proposal-cancelled").count(), 1);
    assert!(!announced.contains(&"proposal-expired".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_fee_batches_keep_every_fee() -> Result<()> {
    let harness = Harness::with_chain(FakeChain::new(&ADMINS, Some(2)));
    let fee = |index: u64, amount: u64| {
        treasury_block(
            index,
            vec![print(json!({ "event": "treasury-fee-collected", "amount": amount, "source": "stream-fee" }))],
        )
    };

    let (a, b, c) = tokio::join!(
        harness.ingest(Domain::Treasury, fee(1, 100)),
        harness.ingest(Domain::Treasury, fee(2, 20)),
        harness.ingest(Domain::Treasury, fee(3, 3)),
    );
    assert!(a.success() && b.success() && c.success());

    let stats = Projection::new(harness.store.clone())
        .get::<TreasuryStats>(TreasuryStats::KEY)
        .await?
        .expect("stats");
    assert_eq!(stats.total_fees, 123);
    assert_eq!(stats.fee_count, 3);
    Ok(())
}
