//! Block walker
//!
//! Turns one applied block into the ordered events of one domain. Iteration is
//! lazy and holds no state besides the block itself, so any block can be
//! walked again from the start.

use super::payload::{Block, EventRecord};
use crate::core::{BlockRef, ProcessingContext};
use crate::domain::events::{decode_print, DomainEvent};
use tracing::debug;

pub struct BlockWalker<'a> {
    block: &'a Block,
    block_ref: BlockRef,
}

impl<'a> BlockWalker<'a> {
    pub fn new(block: &'a Block) -> Self {
        Self {
            block,
            block_ref: block.block_ref(),
        }
    }

    pub fn block_ref(&self) -> &BlockRef {
        &self.block_ref
    }

    /// Every record of every successful transaction, in emission order
    pub fn records(&self) -> impl Iterator<Item = (ProcessingContext, EventRecord<'a>)> + 'a {
        let block: &'a Block = self.block;
        let block_ref = self.block_ref.clone();
        block
            .transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| {
                if !tx.metadata.success {
                    debug!(
                        block = block.block_identifier.index,
                        tx = %tx.transaction_identifier.hash,
                        "skipping failed transaction"
                    );
                }
                tx.metadata.success
            })
            .flat_map(move |(tx_index, tx)| {
                let block_ref = block_ref.clone();
                tx.metadata
                    .receipt
                    .events
                    .iter()
                    .enumerate()
                    .map(move |(position, raw)| {
                        let context = ProcessingContext {
                            block: block_ref.clone(),
                            tx_hash: tx.transaction_identifier.hash.clone(),
                            tx_index,
                            event_index: raw.position.as_ref().map(|p| p.index).unwrap_or(position),
                            contract_identifier: raw.contract_identifier().unwrap_or_default().to_string(),
                        };
                        (context, raw.classify())
                    })
            })
    }

    /// Print events decoded against the vocabulary of `E`; undecodable ones are dropped
    pub fn print_events<E: DomainEvent>(&self) -> impl Iterator<Item = (ProcessingContext, E)> + 'a {
        self.records().filter_map(|(context, record)| match record {
            EventRecord::Print(print) => match decode_print::<E>(&print) {
                Ok(event) => Some((context, event)),
                Err(e) => {
                    debug!(
                        domain = %E::DOMAIN,
                        block = context.block.index,
                        tx = %context.tx_hash,
                        event_index = context.event_index,
                        error = %e,
                        "dropping print event"
                    );
                    None
                }
            },
            EventRecord::Native(_) | EventRecord::Other => None,
        })
    }

    /// Native asset events the domain `E` tracks
    pub fn native_events<E: DomainEvent>(&self) -> impl Iterator<Item = (ProcessingContext, E)> + 'a {
        self.records().filter_map(|(context, record)| match record {
            EventRecord::Native(native) => E::from_native(&native).map(|event| (context, event)),
            EventRecord::Print(_) | EventRecord::Other => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{MarketplaceEvent, NftEvent, StreamEvent};
    use serde_json::json;

    fn block() -> Block {
        serde_json::from_value(json!({
            "block_identifier": { "index": 12, "hash": "0xabc" },
            "timestamp": 1700000000,
            "transactions": [
                {
                    "transaction_identifier": { "hash": "0xfailed" },
                    "metadata": {
                        "success": false,
                        "receipt": { "events": [{
                            "type": "SmartContractEvent",
                            "data": {
                                "contract_identifier": "SP000000000000000000002Q6VF78.market",
                                "topic": "print",
                                "value": { "event": "market-nft-listed", "stream-id": 1, "seller": "SP_A", "price": 5 }
                            }
                        }]}
                    }
                },
                {
                    "transaction_identifier": { "hash": "0xok" },
                    "metadata": {
                        "success": true,
                        "receipt": { "events": [
                            {
                                "type": "SmartContractEvent",
                                "position": { "index": 4 },
                                "data": {
                                    "contract_identifier": "SP000000000000000000002Q6VF78.market",
                                    "topic": "print",
                                    "value": { "event": "market-unused-event", "stream-id": 2 }
                                }
                            },
                            {
                                "type": "SmartContractEvent",
                                "position": { "index": 5 },
                                "data": {
                                    "contract_identifier": "SP000000000000000000002Q6VF78.market",
                                    "topic": "print",
                                    "value": { "event": "market-nft-listed", "stream-id": "u7", "seller": "SP_A", "price": "u950000" }
                                }
                            },
                            {
                                "type": "NFTMintEvent",
                                "data": {
                                    "asset_class_identifier": "SP000000000000000000002Q6VF78.obligation::obligation",
                                    "asset_identifier": "u7",
                                    "recipient": "SP_A"
                                }
                            }
                        ]}
                    }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_failed_transactions_and_unknown_tags_are_skipped() {
        let block = block();
        let walker = BlockWalker::new(&block);

        let events: Vec<_> = walker.print_events::<MarketplaceEvent>().collect();
        assert_eq!(events.len(), 1);

        let (context, event) = &events[0];
        assert_eq!(context.tx_hash, "0xok");
        assert_eq!(context.tx_index, 1);
        assert_eq!(context.event_index, 5);
        assert_eq!(context.block.timestamp, Some(1700000000));
        assert_eq!(event.tag(), "market-nft-listed");
    }

    #[test]
    fn test_walk_is_restartable() {
        let block = block();
        let walker = BlockWalker::new(&block);
        assert_eq!(walker.print_events::<MarketplaceEvent>().count(), 1);
        assert_eq!(walker.print_events::<MarketplaceEvent>().count(), 1);
        assert_eq!(walker.print_events::<StreamEvent>().count(), 0);
    }

    #[test]
    fn test_native_events_only_reach_tracking_domains() {
        let block = block();
        let walker = BlockWalker::new(&block);

        let native: Vec<_> = walker.native_events::<NftEvent>().collect();
        assert_eq!(native.len(), 1);
        assert_eq!(native[0].1.tag(), "native-asset");
        assert_eq!(native[0].0.event_index, 2);
        assert_eq!(walker.native_events::<StreamEvent>().count(), 0);
    }
}
