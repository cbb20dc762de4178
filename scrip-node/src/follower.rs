//! The single writer: follows the chain, detects reorganisations, applies
//! each block atomically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scrip_chain::{extract, ChainRpc, ExtractParams};
use scrip_ledger::{schema, BlockRow, Ledger, Store, TransactionRow, DB_VERSION_MINOR};
use scrip_protocol::{parse_block, reparse, ProtocolParams};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::NetworkParams;

/// How far back a reorganisation is looked for.
const REORG_DEPTH: u32 = 10;

/// Wait before retrying after a chain RPC failure.
const BACKOFF: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] scrip_ledger::Error),

    #[error(transparent)]
    Protocol(#[from] scrip_protocol::Error),

    #[error("chain rpc: {0}")]
    Chain(#[from] scrip_chain::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub struct Follower<C> {
    chain: C,
    store: Store,
    network: NetworkParams,
    protocol: ProtocolParams,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<C: ChainRpc> Follower<C> {
    pub fn new(
        chain: C,
        store: Store,
        network: NetworkParams,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let protocol = ProtocolParams {
            unspendable: network.unspendable.clone(),
            burn_start: network.burn_start,
            burn_end: network.burn_end,
        };
        Follower {
            chain,
            store,
            network,
            protocol,
            poll_interval,
            shutdown,
        }
    }

    /// Runs until the shutdown flag is raised. Chain failures back off and
    /// retry without advancing; store failures are fatal.
    pub fn run(&mut self) -> Result<(), Error> {
        info!("follower starting");

        schema::initialise(self.store.conn())?;
        schema::purge_before(self.store.conn(), self.network.block_first)?;

        // A client with newer parsing rules reinterprets the stored chain.
        if self.store.minor_version()? != DB_VERSION_MINOR {
            info!("database minor version mismatch");
            reparse(&mut self.store, &self.protocol, None)?;
        }

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("follower shutting down");
                return Ok(());
            }

            match self.step() {
                Ok(()) => {}
                Err(Error::Chain(err)) => {
                    warn!(%err, "chain rpc failed; backing off");
                    std::thread::sleep(BACKOFF);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One pass: catch up to the node's tip, then look for a reorg; sleeps
    /// for the poll interval when there is nothing to do.
    pub fn step(&mut self) -> Result<(), Error> {
        let mut count = self.chain.get_block_count()?;
        let mut next = self.next_height()?;
        let mut advanced = false;

        while next <= count {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            self.apply_block(next)?;
            advanced = true;
            next += 1;
            count = self.chain.get_block_count()?;
        }

        if let Some(height) = self.detect_reorg()? {
            warn!(height, "blockchain reorganisation");
            reparse(&mut self.store, &self.protocol, Some(height.saturating_sub(1)))?;
            return Ok(());
        }

        if !advanced {
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    fn next_height(&self) -> Result<u32, Error> {
        let ledger = Ledger::new(self.store.conn());
        Ok(match ledger.last_block()? {
            Some(block) => block.block_index + 1,
            None => {
                warn!("new database");
                self.network.block_first
            }
        })
    }

    /// Fetches, lists and parses one block inside a single store
    /// transaction.
    pub fn apply_block(&mut self, height: u32) -> Result<(), Error> {
        let block_hash = self.chain.get_block_hash(height)?;
        let block = self.chain.get_block(&block_hash)?;
        info!(height, "block");

        let extract_params = ExtractParams {
            prefix: self.network.prefix.clone(),
            unspendable: self.network.unspendable.clone(),
            address_version: self.network.address_version,
        };

        let txn = self.store.block_transaction()?;
        {
            let ledger = Ledger::new(&txn);
            ledger.insert_block(&BlockRow {
                block_index: height,
                block_hash,
                block_time: block.time,
            })?;

            let mut tx_index = ledger.next_tx_index()?;
            for tx_hash in &block.tx {
                if ledger.has_transaction(tx_hash)? {
                    continue;
                }

                let raw = self.chain.get_raw_transaction(tx_hash)?;
                debug!(%tx_hash, "examining transaction");

                let info = match extract(&self.chain, &raw, &extract_params)? {
                    Some(info) => info,
                    None => continue,
                };

                let is_burn =
                    info.destination.as_deref() == Some(self.network.unspendable.as_str());
                if info.data.is_empty() && !is_burn {
                    continue;
                }

                ledger.insert_transaction(&TransactionRow {
                    tx_index,
                    tx_hash: tx_hash.clone(),
                    block_index: height,
                    block_time: block.time,
                    source: info.source,
                    destination: info.destination,
                    btc_amount: info.btc_amount,
                    fee: info.fee,
                    data: info.data,
                    supported: true,
                })?;
                tx_index += 1;
            }

            parse_block(&ledger, &self.protocol, height, block.time)?;
        }
        txn.commit()?;

        Ok(())
    }

    /// First height within the last [`REORG_DEPTH`] blocks whose stored
    /// hash disagrees with the chain.
    pub fn detect_reorg(&self) -> Result<Option<u32>, Error> {
        let ledger = Ledger::new(self.store.conn());
        let last = match ledger.last_block()? {
            Some(block) => block.block_index,
            None => return Ok(None),
        };

        let start = last.saturating_sub(REORG_DEPTH).max(self.network.block_first);
        for height in start..=last {
            let stored = match ledger.block_at(height)? {
                Some(block) => block.block_hash,
                None => continue,
            };
            if self.chain.get_block_hash(height)? != stored {
                return Ok(Some(height));
            }
        }
        Ok(None)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use scrip_chain::client::{Block, RawTransaction, ScriptPubKey, TxIn, TxOut};
    use scrip_ledger::query::{self, SelectSpec};

    use super::*;

    /// In-memory chain the tests can extend and fork.
    #[derive(Default)]
    struct ScriptedChain {
        inner: Mutex<ChainState>,
    }

    #[derive(Default)]
    struct ChainState {
        // height -> (hash, time, txids)
        blocks: HashMap<u32, (String, u32, Vec<String>)>,
        txs: HashMap<String, RawTransaction>,
        tip: u32,
    }

    impl ChainRpc for &ScriptedChain {
        fn get_block_count(&self) -> Result<u32, scrip_chain::Error> {
            Ok(self.inner.lock().unwrap().tip)
        }

        fn get_block_hash(&self, height: u32) -> Result<String, scrip_chain::Error> {
            self.inner
                .lock()
                .unwrap()
                .blocks
                .get(&height)
                .map(|(hash, _, _)| hash.clone())
                .ok_or(scrip_chain::Error::MissingResult)
        }

        fn get_block(&self, hash: &str) -> Result<Block, scrip_chain::Error> {
            let state = self.inner.lock().unwrap();
            state
                .blocks
                .values()
                .find(|(h, _, _)| h == hash)
                .map(|(_, time, txids)| Block {
                    time: *time,
                    tx: txids.clone(),
                })
                .ok_or(scrip_chain::Error::MissingResult)
        }

        fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, scrip_chain::Error> {
            self.inner
                .lock()
                .unwrap()
                .txs
                .get(txid)
                .cloned()
                .ok_or(scrip_chain::Error::MissingResult)
        }

        fn send_raw_transaction(&self, _hex: &str) -> Result<String, scrip_chain::Error> {
            unimplemented!()
        }
    }

    fn network() -> NetworkParams {
        NetworkParams {
            block_first: 1,
            burn_start: 1,
            burn_end: 1000,
            prefix: b"SCRIPTAG".to_vec(),
            unspendable: scrip_chain::address::encode(0x00, &[0u8; 20]),
            address_version: 0x00,
        }
    }

    fn p2pkh_out(value: f64, hash: &[u8; 20]) -> TxOut {
        TxOut {
            value,
            script_pub_key: ScriptPubKey {
                asm: format!(
                    "OP_DUP OP_HASH160 {} OP_EQUALVERIFY OP_CHECKSIG",
                    hex::encode(hash)
                ),
            },
        }
    }

    impl ScriptedChain {
        /// Adds a block at the tip containing one burn of `btc` from the
        /// address behind `source_hash`, on fork `fork`.
        fn push_burn_block(&self, height: u32, fork: u8, source_hash: [u8; 20], btc: f64) {
            let mut state = self.inner.lock().unwrap();

            let funding_txid = format!("{:064x}", height as u128 * 1000 + fork as u128 * 10 + 1);
            state.txs.insert(
                funding_txid.clone(),
                RawTransaction {
                    vin: vec![],
                    vout: vec![p2pkh_out(btc + 0.001, &source_hash)],
                },
            );

            let burn_txid = format!("{:064x}", height as u128 * 1000 + fork as u128 * 10 + 2);
            state.txs.insert(
                burn_txid.clone(),
                RawTransaction {
                    vin: vec![TxIn {
                        txid: Some(funding_txid),
                        vout: Some(0),
                        coinbase: None,
                    }],
                    vout: vec![p2pkh_out(btc, &[0u8; 20])],
                },
            );

            state.blocks.insert(
                height,
                (
                    format!("{height:08}-{fork:02}"),
                    1_000_000 + height * 60,
                    vec![burn_txid],
                ),
            );
            state.tip = state.tip.max(height);
        }

        fn push_empty_block(&self, height: u32, fork: u8) {
            let mut state = self.inner.lock().unwrap();
            state.blocks.insert(
                height,
                (format!("{height:08}-{fork:02}"), 1_000_000 + height * 60, vec![]),
            );
            state.tip = state.tip.max(height);
        }
    }

    fn make_follower(chain: &ScriptedChain) -> Follower<&ScriptedChain> {
        Follower::new(
            chain,
            Store::open_in_memory().unwrap(),
            network(),
            Duration::from_millis(1),
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn dump(store: &Store) -> Vec<(String, Vec<serde_json::Value>)> {
        query::entity_names()
            .map(|entity| {
                let rows = query::select(store.conn(), entity, &SelectSpec::default()).unwrap();
                (entity.to_owned(), rows)
            })
            .collect()
    }

    #[test]
    fn catches_up_and_records_burns() {
        let chain = ScriptedChain::default();
        chain.push_burn_block(1, 0, [1u8; 20], 0.5);
        chain.push_empty_block(2, 0);
        chain.push_burn_block(3, 0, [2u8; 20], 0.25);

        let mut follower = make_follower(&chain);
        follower.step().unwrap();

        let ledger = Ledger::new(follower.store().conn());
        assert_eq!(ledger.last_block().unwrap().unwrap().block_index, 3);

        let burners: i64 = follower
            .store()
            .conn()
            .query_row("SELECT COUNT(*) FROM burns WHERE validity = 'valid'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(burners, 2);
    }

    #[test]
    fn reorg_rolls_back_and_rebuilds() {
        let chain = ScriptedChain::default();
        chain.push_burn_block(1, 0, [1u8; 20], 0.5);
        chain.push_burn_block(2, 0, [2u8; 20], 0.5);
        chain.push_burn_block(3, 0, [3u8; 20], 0.5);

        let mut follower = make_follower(&chain);
        follower.step().unwrap();

        // The chain forks at height 2: different burner, different hashes.
        chain.push_burn_block(2, 1, [7u8; 20], 0.5);
        chain.push_burn_block(3, 1, [8u8; 20], 0.5);

        // One step detects and rolls back, the next re-applies the fork.
        follower.step().unwrap();
        follower.step().unwrap();

        // A follower that only ever saw the forked chain must agree.
        let fresh_chain = ScriptedChain::default();
        fresh_chain.push_burn_block(1, 0, [1u8; 20], 0.5);
        fresh_chain.push_burn_block(2, 1, [7u8; 20], 0.5);
        fresh_chain.push_burn_block(3, 1, [8u8; 20], 0.5);

        let mut fresh = make_follower(&fresh_chain);
        fresh.step().unwrap();

        assert_eq!(dump(follower.store()), dump(fresh.store()));
    }

    #[test]
    fn shutdown_flag_stops_mid_catchup() {
        let chain = ScriptedChain::default();
        chain.push_empty_block(1, 0);
        chain.push_empty_block(2, 0);

        let shutdown = Arc::new(AtomicBool::new(true));
        let mut follower = Follower::new(
            &chain,
            Store::open_in_memory().unwrap(),
            network(),
            Duration::from_millis(1),
            shutdown,
        );

        follower.step().unwrap();
        let ledger = Ledger::new(follower.store().conn());
        assert!(ledger.last_block().unwrap().is_none());
    }
}
