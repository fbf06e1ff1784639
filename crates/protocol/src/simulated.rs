//! In-memory FAsset network.
//!
//! `SimulatedNetwork` keeps one shared ledger covering the native chain,
//! the underlying chain, the asset manager, the collateral pools and the
//! attestation services. [`SimulatedClient`] is a per-identity handle
//! implementing every boundary trait on behalf of that identity.
//!
//! Time follows the tokio clock, so paused-clock tests advance the
//! underlying chain and the voting rounds deterministically.

use alloy_primitives::U256;
use async_trait::async_trait;
use fasset_flow_attestation::{
    keccak256_text, pad_0x, pad_to_64_hex, unpad_0x, zero_bytes32, AttestationClient, AttestationConfig,
    AttestationError, AttestationHub, AttestationResponse, AttestationType, BlockRange, DataAvailabilityApi,
    HubSubmission, NonPaymentProof, PaymentProof, PaymentResponseBody, PreparedRequest, RawProof, RequestBody,
    ReferencedPaymentNonexistenceResponseBody, TransactionLookup, VerifierApi,
};
use fasset_flow_types::{FeeTracker, RequestId, TokenSet, UserIdentity};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::context::{ProtocolClients, UserContext};
use crate::contracts::{
    AgentDetails, AssetManager, CollateralPools, CollateralReservation, NativeNetwork, OnChainRedemptionStatus,
    PoolTotals, RedeemOutcome, RedemptionRequest, TxReceipt, UnderlyingNetwork, UnderlyingPayment,
};
use crate::error::{ProtocolError, Result};

const WEI_PER_NATIVE: u128 = 1_000_000_000_000_000_000;
const UBA_PER_UNDERLYING: u128 = 1_000_000;
const MINT_REFERENCE_PREFIX: &str = "4642505266410001";
const REDEMPTION_REFERENCE_PREFIX: &str = "4642505266410002";

/// `a * b / c` with a 256-bit intermediate; wei products overflow u128
fn mul_div(a: u128, b: u128, c: u128, what: &str) -> Result<u128> {
    if c == 0 {
        return Err(ProtocolError::Overflow(format!("{what}: division by zero")));
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(c);
    u128::try_from(quotient).map_err(|_| ProtocolError::Overflow(what.to_string()))
}

/// Protocol parameters of the simulated network, in smallest units
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub lot_size_uba: u128,
    pub asset_unit_uba: u128,
    pub redemption_fee_bips: u32,
    pub pool_token_timelock_secs: u64,
    /// Gas charged for every native write
    pub native_gas_wei: u128,
    /// Network fee of an underlying payment
    pub underlying_fee_uba: u128,
    /// Collateral reservation fee as bips of the reserved value
    pub reservation_fee_bips: u32,
    pub attestation_fee_wei: u128,
    /// Asset price: native wei per underlying UBA
    pub wei_per_uba: u128,
    /// Share of the minting fee paid into the agent's collateral pool
    pub pool_fee_share_bips: u32,
    pub exit_collateral_ratio_bips: u32,
    pub min_nat_to_enter_wei: u128,
    /// Underlying blocks an agent has to pay a redemption
    pub redemption_window_blocks: u64,
    pub underlying_block_secs: u64,
    pub voting_round_secs: u64,
    /// Blocks the verifier keeps indexed
    pub indexer_history_blocks: u64,
    /// Most redemption tickets one redeem call can close
    pub max_redeemed_tickets: usize,
    pub genesis_timestamp: u64,
    pub genesis_underlying_block: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            lot_size_uba: 10 * UBA_PER_UNDERLYING,
            asset_unit_uba: UBA_PER_UNDERLYING,
            redemption_fee_bips: 200,
            pool_token_timelock_secs: 30,
            native_gas_wei: WEI_PER_NATIVE / 1_000,
            underlying_fee_uba: 12,
            reservation_fee_bips: 10,
            attestation_fee_wei: WEI_PER_NATIVE / 100,
            wei_per_uba: 50 * (WEI_PER_NATIVE / UBA_PER_UNDERLYING),
            pool_fee_share_bips: 4_000,
            exit_collateral_ratio_bips: 13_000,
            min_nat_to_enter_wei: WEI_PER_NATIVE,
            redemption_window_blocks: 10,
            underlying_block_secs: 4,
            voting_round_secs: 10,
            indexer_history_blocks: 10_000,
            max_redeemed_tickets: 20,
            genesis_timestamp: 1_700_000_000,
            genesis_underlying_block: 1_000_000,
        }
    }
}

/// Agent registered on the simulated network
#[derive(Debug, Clone)]
pub struct AgentSetup {
    pub vault: String,
    pub collateral_pool: String,
    pub payment_address: String,
    pub fee_bips: u32,
    pub free_lots: u64,
    /// Whether the agent pays redemptions or lets them default
    pub pays_redemptions: bool,
    /// Collateral the agent deposits into its own pool
    pub pool_collateral_wei: u128,
}

impl AgentSetup {
    pub fn new(index: usize, fee_bips: u32, free_lots: u64) -> Self {
        Self {
            vault: format!("0x{:040x}", 0xA6E0_0000_u64 + index as u64),
            collateral_pool: format!("0x{:040x}", 0xC0_0000_u64 + index as u64),
            payment_address: format!("rAgentPayment{index}"),
            fee_bips,
            free_lots,
            pays_redemptions: true,
            pool_collateral_wei: 100_000 * WEI_PER_NATIVE,
        }
    }

    pub fn with_pays_redemptions(mut self, pays: bool) -> Self {
        self.pays_redemptions = pays;
        self
    }
}

#[derive(Debug, Default)]
struct Account {
    native_wei: u128,
    fasset_uba: u128,
}

#[derive(Debug)]
struct Agent {
    setup: AgentSetup,
    free_lots: u64,
    minted_uba: u128,
}

#[derive(Debug, Default)]
struct Holder {
    tokens_wei: u128,
    fees_uba: u128,
    /// (unlock timestamp, amount) of recently entered tokens
    timelocked: Vec<(u64, u128)>,
}

impl Holder {
    fn locked(&self, now: u64) -> u128 {
        self.timelocked
            .iter()
            .filter(|(unlock, _)| *unlock > now)
            .map(|(_, amount)| amount)
            .sum()
    }

    fn transferable(&self, now: u64) -> u128 {
        self.tokens_wei.saturating_sub(self.locked(now))
    }

    fn is_empty(&self) -> bool {
        self.tokens_wei == 0 && self.fees_uba == 0
    }
}

#[derive(Debug)]
struct Pool {
    agent_vault: String,
    total_collateral_wei: u128,
    total_tokens_wei: u128,
    total_fees_uba: u128,
    holders: BTreeMap<String, Holder>,
}

#[derive(Debug, Clone)]
struct Reservation {
    agent_vault: String,
    minter: String,
    value_uba: u128,
    fee_uba: u128,
    payment_reference: String,
}

#[derive(Debug, Clone)]
struct Redemption {
    agent_vault: String,
    redeemer: String,
    underlying_address: String,
    value_uba: u128,
    fee_uba: u128,
    payment_reference: String,
    first_block: u64,
    last_block: u64,
    status: OnChainRedemptionStatus,
}

#[derive(Debug, Clone)]
struct UnderlyingTx {
    from: String,
    to: String,
    amount_uba: u128,
    fee_uba: u128,
    memo: String,
    block: u64,
}

#[derive(Debug, Clone)]
struct SubmittedRequest {
    attestation_type: AttestationType,
    source_id: String,
    body: RequestBody,
    round: Option<u64>,
}

#[derive(Debug)]
struct SimState {
    params: SimulationParams,
    accounts: HashMap<String, Account>,
    underlying_balances: HashMap<String, u128>,
    agents: Vec<Agent>,
    pools: BTreeMap<String, Pool>,
    reservations: BTreeMap<RequestId, Reservation>,
    redemptions: BTreeMap<RequestId, Redemption>,
    underlying_txs: HashMap<String, UnderlyingTx>,
    requests: HashMap<String, SubmittedRequest>,
    native_block: u64,
    native_block_timestamps: BTreeMap<u64, u64>,
    extra_underlying_blocks: u64,
    next_request_id: RequestId,
    tx_counter: u64,
    failing_executions: u32,
}

impl SimState {
    fn new(params: SimulationParams) -> Self {
        Self {
            params,
            accounts: HashMap::new(),
            underlying_balances: HashMap::new(),
            agents: Vec::new(),
            pools: BTreeMap::new(),
            reservations: BTreeMap::new(),
            redemptions: BTreeMap::new(),
            underlying_txs: HashMap::new(),
            requests: HashMap::new(),
            native_block: 0,
            native_block_timestamps: BTreeMap::new(),
            extra_underlying_blocks: 0,
            next_request_id: 1,
            tx_counter: 0,
            failing_executions: 0,
        }
    }

    fn timestamp(&self, elapsed_secs: u64) -> u64 {
        self.params.genesis_timestamp + elapsed_secs
    }

    fn underlying_block(&self, elapsed_secs: u64) -> u64 {
        self.params.genesis_underlying_block
            + elapsed_secs / self.params.underlying_block_secs.max(1)
            + self.extra_underlying_blocks
    }

    fn underlying_block_timestamp(&self, block: u64) -> u64 {
        self.params.genesis_timestamp
            + block.saturating_sub(self.params.genesis_underlying_block) * self.params.underlying_block_secs
    }

    fn voting_round(&self, timestamp: u64) -> u64 {
        timestamp.saturating_sub(self.params.genesis_timestamp) / self.params.voting_round_secs.max(1)
    }

    fn next_id(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn agent(&self, vault: &str) -> Result<&Agent> {
        self.agents
            .iter()
            .find(|agent| agent.setup.vault == vault)
            .ok_or_else(|| ProtocolError::unknown("agent", vault))
    }

    fn agent_mut(&mut self, vault: &str) -> Result<&mut Agent> {
        self.agents
            .iter_mut()
            .find(|agent| agent.setup.vault == vault)
            .ok_or_else(|| ProtocolError::unknown("agent", vault))
    }

    fn pool(&self, address: &str) -> Result<&Pool> {
        self.pools
            .get(address)
            .ok_or_else(|| ProtocolError::unknown("collateral pool", address))
    }

    fn pool_mut(&mut self, address: &str) -> Result<&mut Pool> {
        self.pools
            .get_mut(address)
            .ok_or_else(|| ProtocolError::unknown("collateral pool", address))
    }

    fn account(&mut self, address: &str) -> &mut Account {
        self.accounts.entry(address.to_string()).or_default()
    }

    fn native_balance(&self, address: &str) -> u128 {
        self.accounts.get(address).map_or(0, |account| account.native_wei)
    }

    fn debit_native(&mut self, address: &str, amount: u128) -> Result<()> {
        let account = self.account(address);
        if account.native_wei < amount {
            return Err(ProtocolError::InsufficientBalance {
                token: "native".to_string(),
                needed: amount,
                available: account.native_wei,
            });
        }
        account.native_wei -= amount;
        Ok(())
    }

    /// Charge gas for a native write and mine it into a new block
    fn mine(&mut self, sender: &str, elapsed_secs: u64) -> Result<TxReceipt> {
        let gas = self.params.native_gas_wei;
        self.debit_native(sender, gas)?;
        self.native_block += 1;
        self.tx_counter += 1;
        let timestamp = self.timestamp(elapsed_secs);
        self.native_block_timestamps.insert(self.native_block, timestamp);
        Ok(TxReceipt {
            tx_hash: format!("0x{:064x}", self.tx_counter),
            block_number: self.native_block,
            gas_fee_wei: gas,
        })
    }

    fn record_underlying_tx(&mut self, tx: UnderlyingTx) -> String {
        self.tx_counter += 1;
        let hash = format!("{:064X}", self.tx_counter);
        self.underlying_txs.insert(hash.clone(), tx);
        hash
    }

    fn find_underlying_tx(&self, transaction_id: &str) -> Option<(&String, &UnderlyingTx)> {
        let wanted = unpad_0x(transaction_id);
        self.underlying_txs
            .iter()
            .find(|(hash, _)| hash.eq_ignore_ascii_case(wanted))
    }

    fn pays_reference(tx: &UnderlyingTx, reference: &str) -> bool {
        pad_0x(&tx.memo).eq_ignore_ascii_case(&pad_0x(reference))
    }

    /// Let paying agents settle redemptions up to `current_block`
    fn settle_redemptions(&mut self, current_block: u64) {
        let due: Vec<RequestId> = self
            .redemptions
            .iter()
            .filter(|(_, r)| r.status == OnChainRedemptionStatus::Active)
            .filter(|(_, r)| current_block > r.first_block && current_block <= r.last_block)
            .filter(|(_, r)| {
                self.agents
                    .iter()
                    .any(|agent| agent.setup.vault == r.agent_vault && agent.setup.pays_redemptions)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            let Some(redemption) = self.redemptions.get(&id).cloned() else {
                continue;
            };
            let Ok(agent) = self.agent(&redemption.agent_vault) else {
                continue;
            };
            let amount = redemption.value_uba.saturating_sub(redemption.fee_uba);
            let tx = UnderlyingTx {
                from: agent.setup.payment_address.clone(),
                to: redemption.underlying_address.clone(),
                amount_uba: amount,
                fee_uba: self.params.underlying_fee_uba,
                memo: unpad_0x(&redemption.payment_reference).to_string(),
                block: redemption.first_block + 1,
            };
            self.record_underlying_tx(tx);
            *self
                .underlying_balances
                .entry(redemption.underlying_address.clone())
                .or_default() += amount;
            if let Some(r) = self.redemptions.get_mut(&id) {
                r.status = OnChainRedemptionStatus::Successful;
            }
            debug!(request_id = id, amount, "Agent paid redemption");
        }
    }

    fn block_range(&self, current_block: u64) -> BlockRange {
        BlockRange {
            first: current_block
                .saturating_sub(self.params.indexer_history_blocks)
                .max(self.params.genesis_underlying_block),
            last: current_block,
        }
    }

    /// Whether the verifier can attest `body` right now
    fn attestable(&self, body: &RequestBody) -> bool {
        match body {
            RequestBody::Payment(request) => self.find_underlying_tx(&request.transaction_id).is_some(),
            RequestBody::ReferencedPaymentNonexistence(request) => {
                let amount: u128 = request.amount.parse().unwrap_or(0);
                let first: u64 = request.minimal_block_number.parse().unwrap_or(0);
                let last: u64 = request.deadline_block_number.parse().unwrap_or(0);
                !self.underlying_txs.values().any(|tx| {
                    keccak256_text(&tx.to) == request.destination_address_hash
                        && Self::pays_reference(tx, &request.standard_payment_reference)
                        && tx.amount_uba >= amount
                        && (first..=last).contains(&tx.block)
                })
            }
        }
    }

    fn attested_response(&self, request: &SubmittedRequest, round: u64) -> std::result::Result<serde_json::Value, AttestationError> {
        let lowest_used_timestamp = self.params.genesis_timestamp + round * self.params.voting_round_secs;
        match &request.body {
            RequestBody::Payment(body) => {
                let (_, tx) = self
                    .find_underlying_tx(&body.transaction_id)
                    .ok_or_else(|| AttestationError::Decode(format!("unknown transaction {}", body.transaction_id)))?;
                let spent = i128::try_from(tx.amount_uba + tx.fee_uba).unwrap_or(i128::MAX);
                let received = i128::try_from(tx.amount_uba).unwrap_or(i128::MAX);
                let reference = pad_to_64_hex(&tx.memo).unwrap_or_else(|_| zero_bytes32());
                let response = AttestationResponse {
                    attestation_type: request.attestation_type.encoded(),
                    source_id: request.source_id.clone(),
                    voting_round: round,
                    lowest_used_timestamp,
                    request_body: body.clone(),
                    response_body: PaymentResponseBody {
                        block_number: tx.block,
                        block_timestamp: self.underlying_block_timestamp(tx.block),
                        source_address_hash: keccak256_text(&tx.from),
                        source_addresses_root: keccak256_text(&tx.from),
                        receiving_address_hash: keccak256_text(&tx.to),
                        intended_receiving_address_hash: keccak256_text(&tx.to),
                        spent_amount: spent,
                        intended_spent_amount: spent,
                        received_amount: received,
                        intended_received_amount: received,
                        standard_payment_reference: reference,
                        one_to_one: true,
                        status: 0,
                    },
                };
                Ok(serde_json::to_value(response)?)
            }
            RequestBody::ReferencedPaymentNonexistence(body) => {
                let first: u64 = body.minimal_block_number.parse().unwrap_or(0);
                let deadline: u64 = body.deadline_block_number.parse().unwrap_or(0);
                let response = AttestationResponse {
                    attestation_type: request.attestation_type.encoded(),
                    source_id: request.source_id.clone(),
                    voting_round: round,
                    lowest_used_timestamp,
                    request_body: body.clone(),
                    response_body: ReferencedPaymentNonexistenceResponseBody {
                        minimal_block_timestamp: self.underlying_block_timestamp(first),
                        first_overflow_block_number: deadline + 1,
                        first_overflow_block_timestamp: self.underlying_block_timestamp(deadline + 1),
                    },
                };
                Ok(serde_json::to_value(response)?)
            }
        }
    }

    /// Distribute the pool share of a minting fee over the pool's holders
    fn accrue_pool_fees(&mut self, pool_address: &str, fee_uba: u128) -> Result<()> {
        let share = fee_uba * u128::from(self.params.pool_fee_share_bips) / 10_000;
        let pool = self.pool_mut(pool_address)?;
        pool.total_fees_uba += share;
        let total_tokens = pool.total_tokens_wei;
        if total_tokens == 0 {
            return Ok(());
        }
        for holder in pool.holders.values_mut() {
            holder.fees_uba += mul_div(share, holder.tokens_wei, total_tokens, "pool fee share")?;
        }
        Ok(())
    }

    fn backed_value_wei(&self, pool_address: &str) -> Result<u128> {
        let pool = self.pool(pool_address)?;
        let agent = self.agent(&pool.agent_vault)?;
        Ok(agent.minted_uba * self.params.wei_per_uba)
    }
}

/// Shared simulated network; clone freely
#[derive(Clone)]
pub struct SimulatedNetwork {
    state: Arc<Mutex<SimState>>,
    started: Instant,
}

impl SimulatedNetwork {
    pub fn new(params: SimulationParams) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(params))),
            started: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Lock the ledger with paying agents settled up to now
    async fn synced(&self) -> (MutexGuard<'_, SimState>, u64) {
        let elapsed = self.elapsed_secs();
        let mut state = self.state.lock().await;
        let block = state.underlying_block(elapsed);
        state.settle_redemptions(block);
        (state, elapsed)
    }

    pub async fn params(&self) -> SimulationParams {
        self.state.lock().await.params.clone()
    }

    /// Register an agent and seed its collateral pool
    pub async fn add_agent(&self, setup: AgentSetup) {
        let mut state = self.state.lock().await;
        state.pools.insert(
            setup.collateral_pool.clone(),
            Pool {
                agent_vault: setup.vault.clone(),
                total_collateral_wei: setup.pool_collateral_wei,
                total_tokens_wei: setup.pool_collateral_wei,
                total_fees_uba: 0,
                holders: BTreeMap::new(),
            },
        );
        state.agents.push(Agent {
            free_lots: setup.free_lots,
            minted_uba: 0,
            setup,
        });
    }

    /// Credit an identity on both chains
    pub async fn fund(&self, identity: &UserIdentity, native_wei: u128, underlying_uba: u128) {
        let mut state = self.state.lock().await;
        state.account(&identity.native_address).native_wei += native_wei;
        *state
            .underlying_balances
            .entry(identity.underlying_address.clone())
            .or_default() += underlying_uba;
    }

    /// Mine `blocks` extra underlying blocks
    pub async fn advance_underlying_blocks(&self, blocks: u64) {
        let elapsed = self.elapsed_secs();
        let mut state = self.state.lock().await;
        state.extra_underlying_blocks += blocks;
        let block = state.underlying_block(elapsed);
        state.settle_redemptions(block);
    }

    /// Make the next `count` minting executions revert
    pub async fn fail_next_executions(&self, count: u32) {
        self.state.lock().await.failing_executions = count;
    }

    pub async fn set_agent_pays_redemptions(&self, vault: &str, pays: bool) -> Result<()> {
        self.state.lock().await.agent_mut(vault)?.setup.pays_redemptions = pays;
        Ok(())
    }

    pub async fn redemption_status_of(&self, request_id: RequestId) -> Option<OnChainRedemptionStatus> {
        let (state, _) = self.synced().await;
        state.redemptions.get(&request_id).map(|r| r.status)
    }

    pub fn client_for(&self, identity: &UserIdentity) -> SimulatedClient {
        SimulatedClient {
            network: self.clone(),
            identity: identity.clone(),
        }
    }

    pub fn clients_for(&self, identity: &UserIdentity) -> ProtocolClients {
        let client = Arc::new(self.client_for(identity));
        ProtocolClients {
            asset_manager: client.clone(),
            pools: client.clone(),
            native: client.clone(),
            underlying: client,
        }
    }

    /// Fully wired context for `identity` with a fresh fee tracker
    pub fn user_context(
        &self,
        identity: &UserIdentity,
        tokens: TokenSet,
        config: AttestationConfig,
    ) -> Result<Arc<UserContext>> {
        let fees = Arc::new(FeeTracker::new());
        let attestation = AttestationClient::builder()
            .with_verifier(Arc::new(self.clone()))
            .with_data_availability(Arc::new(self.clone()))
            .with_hub(Arc::new(self.client_for(identity)))
            .with_config(config)
            .with_native_token(tokens.native.clone())
            .with_fee_tracker(fees.clone())
            .build()?;
        Ok(Arc::new(UserContext::new(
            identity.clone(),
            tokens,
            self.clients_for(identity),
            Arc::new(attestation),
            fees,
        )))
    }
}

#[async_trait]
impl VerifierApi for SimulatedNetwork {
    async fn transaction(&self, tx_hash: &str) -> fasset_flow_attestation::Result<TransactionLookup> {
        let (state, _) = self.synced().await;
        Ok(match state.find_underlying_tx(tx_hash) {
            Some((hash, _)) => TransactionLookup::Found {
                transaction_id: hash.clone(),
            },
            None => TransactionLookup::NotFound,
        })
    }

    async fn prepare_request(
        &self,
        attestation_type: AttestationType,
        source_id: &str,
        body: &RequestBody,
    ) -> fasset_flow_attestation::Result<PreparedRequest> {
        let (mut state, _) = self.synced().await;
        if !state.attestable(body) {
            return Ok(PreparedRequest {
                status: "INVALID".to_string(),
                abi_encoded_request: None,
            });
        }
        let encoded = serde_json::to_string(body)?;
        let abi = keccak256_text(&format!("{attestation_type}:{source_id}:{encoded}"));
        state.requests.entry(abi.clone()).or_insert(SubmittedRequest {
            attestation_type,
            source_id: source_id.to_string(),
            body: body.clone(),
            round: None,
        });
        Ok(PreparedRequest::valid(abi))
    }

    async fn block_range(&self) -> fasset_flow_attestation::Result<BlockRange> {
        let (state, elapsed) = self.synced().await;
        Ok(state.block_range(state.underlying_block(elapsed)))
    }
}

#[async_trait]
impl DataAvailabilityApi for SimulatedNetwork {
    async fn latest_voting_round(&self) -> fasset_flow_attestation::Result<u64> {
        let (state, elapsed) = self.synced().await;
        Ok(state.voting_round(state.timestamp(elapsed)).saturating_sub(1))
    }

    async fn proof_by_request_bytes(&self, voting_round: u64, request_bytes: &str) -> fasset_flow_attestation::Result<RawProof> {
        let (state, elapsed) = self.synced().await;
        let current_round = state.voting_round(state.timestamp(elapsed));
        let Some(request) = state.requests.get(request_bytes) else {
            return Ok(RawProof::default());
        };
        if request.round != Some(voting_round) || voting_round >= current_round {
            return Ok(RawProof::default());
        }
        Ok(RawProof {
            proof: vec![keccak256_text(&format!("{voting_round}:{request_bytes}"))],
            response: Some(state.attested_response(request, voting_round)?),
        })
    }
}

/// Network handle acting as one identity
#[derive(Clone)]
pub struct SimulatedClient {
    network: SimulatedNetwork,
    identity: UserIdentity,
}

impl SimulatedClient {
    fn address(&self) -> &str {
        &self.identity.native_address
    }
}

#[async_trait]
impl AttestationHub for SimulatedClient {
    async fn request_fee(&self, _abi_encoded_request: &str) -> fasset_flow_attestation::Result<u128> {
        Ok(self.network.state.lock().await.params.attestation_fee_wei)
    }

    async fn request_attestation(&self, abi_encoded_request: &str, fee_wei: u128) -> fasset_flow_attestation::Result<HubSubmission> {
        let (mut state, elapsed) = self.network.synced().await;
        if fee_wei < state.params.attestation_fee_wei {
            return Err(AttestationError::Hub(format!(
                "fee {fee_wei} below required {}",
                state.params.attestation_fee_wei
            )));
        }
        if !state.requests.contains_key(abi_encoded_request) {
            return Err(AttestationError::Hub("request was not prepared".to_string()));
        }
        state
            .debit_native(self.address(), fee_wei)
            .map_err(|e| AttestationError::Hub(e.to_string()))?;
        let receipt = state
            .mine(self.address(), elapsed)
            .map_err(|e| AttestationError::Hub(e.to_string()))?;
        let round = state.voting_round(state.timestamp(elapsed));
        if let Some(request) = state.requests.get_mut(abi_encoded_request) {
            request.round = Some(round);
        }
        Ok(HubSubmission {
            block_number: receipt.block_number,
            tx_hash: receipt.tx_hash,
            gas_fee_wei: receipt.gas_fee_wei,
        })
    }

    async fn voting_round_id(&self, block_number: u64) -> fasset_flow_attestation::Result<u64> {
        let state = self.network.state.lock().await;
        let timestamp = state
            .native_block_timestamps
            .get(&block_number)
            .copied()
            .ok_or_else(|| AttestationError::Hub(format!("unknown block {block_number}")))?;
        Ok(state.voting_round(timestamp))
    }
}

#[async_trait]
impl AssetManager for SimulatedClient {
    async fn lot_size_uba(&self) -> Result<u128> {
        Ok(self.network.state.lock().await.params.lot_size_uba)
    }

    async fn asset_unit_uba(&self) -> Result<u128> {
        Ok(self.network.state.lock().await.params.asset_unit_uba)
    }

    async fn redemption_fee_bips(&self) -> Result<u32> {
        Ok(self.network.state.lock().await.params.redemption_fee_bips)
    }

    async fn pool_token_timelock_seconds(&self) -> Result<u64> {
        Ok(self.network.state.lock().await.params.pool_token_timelock_secs)
    }

    async fn available_agents(&self, start: usize, end: usize) -> Result<Vec<AgentDetails>> {
        let state = self.network.state.lock().await;
        Ok(state
            .agents
            .iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .map(|agent| AgentDetails {
                agent_vault: agent.setup.vault.clone(),
                collateral_pool: agent.setup.collateral_pool.clone(),
                free_collateral_lots: agent.free_lots,
                fee_bips: agent.setup.fee_bips,
            })
            .collect())
    }

    async fn reserve_collateral(
        &self,
        agent_vault: &str,
        lots: u64,
        executor: &str,
    ) -> Result<(CollateralReservation, TxReceipt)> {
        let (mut state, elapsed) = self.network.synced().await;
        let agent = state.agent(agent_vault)?;
        if lots == 0 || agent.free_lots < lots {
            return Err(ProtocolError::reverted("reserveCollateral", "not enough free collateral"));
        }
        let payment_address = agent.setup.payment_address.clone();
        let fee_bips = agent.setup.fee_bips;

        let value_uba = u128::from(lots) * state.params.lot_size_uba;
        let fee_uba = value_uba * u128::from(fee_bips) / 10_000;
        let reservation_fee_wei = mul_div(
            value_uba * state.params.wei_per_uba,
            u128::from(state.params.reservation_fee_bips),
            10_000,
            "reserveCollateral",
        )?;
        if state.native_balance(self.address()) < reservation_fee_wei + state.params.native_gas_wei {
            return Err(ProtocolError::reverted("reserveCollateral", "inappropriate fee amount"));
        }
        state.debit_native(self.address(), reservation_fee_wei)?;
        let receipt = state.mine(self.address(), elapsed)?;

        state.agent_mut(agent_vault)?.free_lots -= lots;
        let id = state.next_id();
        let payment_reference = format!("0x{MINT_REFERENCE_PREFIX}{id:048x}");
        state.reservations.insert(
            id,
            Reservation {
                agent_vault: agent_vault.to_string(),
                minter: self.address().to_string(),
                value_uba,
                fee_uba,
                payment_reference: payment_reference.clone(),
            },
        );

        Ok((
            CollateralReservation {
                reservation_id: id,
                agent_vault: agent_vault.to_string(),
                payment_address,
                value_uba,
                fee_uba,
                payment_reference,
                executor: executor.to_string(),
                reservation_fee_wei,
            },
            receipt,
        ))
    }

    async fn execute_minting(&self, proof: &PaymentProof, reservation_id: RequestId) -> Result<TxReceipt> {
        let (mut state, elapsed) = self.network.synced().await;
        let reservation = state
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or_else(|| ProtocolError::unknown("collateral reservation", reservation_id))?;
        if reservation.minter != self.address() {
            return Err(ProtocolError::reverted("executeMinting", "only minter or executor"));
        }
        if state.failing_executions > 0 {
            state.failing_executions -= 1;
            return Err(ProtocolError::reverted("executeMinting", "simulated execution failure"));
        }

        let payment_address = state.agent(&reservation.agent_vault)?.setup.payment_address.clone();
        let (_, tx) = state
            .find_underlying_tx(&proof.response.request_body.transaction_id)
            .ok_or_else(|| ProtocolError::reverted("executeMinting", "legal payment not proved"))?;
        if tx.to != payment_address
            || !SimState::pays_reference(tx, &reservation.payment_reference)
            || tx.amount_uba < reservation.value_uba + reservation.fee_uba
        {
            return Err(ProtocolError::reverted("executeMinting", "invalid minting payment"));
        }

        let receipt = state.mine(self.address(), elapsed)?;
        state.account(self.address()).fasset_uba += reservation.value_uba;
        state.agent_mut(&reservation.agent_vault)?.minted_uba += reservation.value_uba;
        let pool_address = state.agent(&reservation.agent_vault)?.setup.collateral_pool.clone();
        state.accrue_pool_fees(&pool_address, reservation.fee_uba)?;
        state.reservations.remove(&reservation_id);
        Ok(receipt)
    }

    async fn redeem(&self, lots: u64, underlying_address: &str, _executor: &str) -> Result<RedeemOutcome> {
        let (mut state, elapsed) = self.network.synced().await;
        let lot_size = state.params.lot_size_uba;
        let needed = u128::from(lots) * lot_size;
        let balance = state.accounts.get(self.address()).map_or(0, |a| a.fasset_uba);
        if lots == 0 || balance < needed {
            return Err(ProtocolError::reverted("redeem", "f-asset balance too low"));
        }

        let receipt = state.mine(self.address(), elapsed)?;
        let current_block = state.underlying_block(elapsed);
        let window = state.params.redemption_window_blocks;
        let fee_bips = u128::from(state.params.redemption_fee_bips);
        let max_tickets = state.params.max_redeemed_tickets;

        let mut remaining = lots;
        let mut requests = Vec::new();
        let vaults: Vec<String> = state.agents.iter().map(|a| a.setup.vault.clone()).collect();
        for vault in vaults {
            if remaining == 0 || requests.len() >= max_tickets {
                break;
            }
            let minted_lots = u64::try_from(state.agent(&vault)?.minted_uba / lot_size).unwrap_or(u64::MAX);
            let taken = remaining.min(minted_lots);
            if taken == 0 {
                continue;
            }
            remaining -= taken;

            let value_uba = u128::from(taken) * lot_size;
            let agent = state.agent_mut(&vault)?;
            agent.minted_uba -= value_uba;
            agent.free_lots += taken;

            let id = state.next_id();
            let redemption = Redemption {
                agent_vault: vault.clone(),
                redeemer: self.address().to_string(),
                underlying_address: underlying_address.to_string(),
                value_uba,
                fee_uba: value_uba * fee_bips / 10_000,
                payment_reference: format!("0x{REDEMPTION_REFERENCE_PREFIX}{id:048x}"),
                first_block: current_block,
                last_block: current_block + window,
                status: OnChainRedemptionStatus::Active,
            };
            requests.push(RedemptionRequest {
                request_id: id,
                agent_vault: vault,
                value_uba,
                fee_uba: redemption.fee_uba,
                payment_reference: redemption.payment_reference.clone(),
                first_underlying_block: redemption.first_block,
                last_underlying_block: redemption.last_block,
                last_underlying_timestamp: state.underlying_block_timestamp(redemption.last_block),
            });
            state.redemptions.insert(id, redemption);
        }

        let redeemed = u128::from(lots - remaining) * lot_size;
        state.account(self.address()).fasset_uba -= redeemed;
        Ok(RedeemOutcome {
            requests,
            remaining_lots: remaining,
            receipt,
        })
    }

    async fn redemption_request_status(&self, request_id: RequestId) -> Result<OnChainRedemptionStatus> {
        let (state, _) = self.network.synced().await;
        state
            .redemptions
            .get(&request_id)
            .map(|r| r.status)
            .ok_or_else(|| ProtocolError::unknown("redemption request", request_id))
    }

    async fn redemption_payment_default(&self, proof: &NonPaymentProof, request_id: RequestId) -> Result<TxReceipt> {
        let (mut state, elapsed) = self.network.synced().await;
        let redemption = state
            .redemptions
            .get(&request_id)
            .cloned()
            .ok_or_else(|| ProtocolError::unknown("redemption request", request_id))?;
        if redemption.redeemer != self.address() {
            return Err(ProtocolError::reverted("redemptionPaymentDefault", "only redeemer or executor"));
        }
        if redemption.status != OnChainRedemptionStatus::Active {
            return Err(ProtocolError::reverted("redemptionPaymentDefault", "invalid redemption status"));
        }
        if state.underlying_block(elapsed) <= redemption.last_block {
            return Err(ProtocolError::reverted("redemptionPaymentDefault", "redemption default too early"));
        }
        let proved_reference = &proof.response.request_body.standard_payment_reference;
        if pad_to_64_hex(&redemption.payment_reference).ok().as_deref() != Some(proved_reference.as_str()) {
            return Err(ProtocolError::reverted("redemptionPaymentDefault", "redemption non-payment mismatch"));
        }

        let receipt = state.mine(self.address(), elapsed)?;
        let amount = redemption.value_uba.saturating_sub(redemption.fee_uba);
        *state
            .underlying_balances
            .entry(redemption.underlying_address.clone())
            .or_default() += amount;
        if let Some(r) = state.redemptions.get_mut(&request_id) {
            r.status = OnChainRedemptionStatus::DefaultedUnconfirmed;
        }
        Ok(receipt)
    }

    async fn fasset_balance(&self) -> Result<u128> {
        let state = self.network.state.lock().await;
        Ok(state.accounts.get(self.address()).map_or(0, |a| a.fasset_uba))
    }
}

#[async_trait]
impl CollateralPools for SimulatedClient {
    async fn enter(&self, pool: &str, collateral_wei: u128) -> Result<TxReceipt> {
        let (mut state, elapsed) = self.network.synced().await;
        if collateral_wei < state.params.min_nat_to_enter_wei {
            return Err(ProtocolError::reverted("enter", "amount of nat sent is too low"));
        }
        state.pool(pool)?;
        state.debit_native(self.address(), collateral_wei)?;
        let receipt = state.mine(self.address(), elapsed)?;

        let unlock = state.timestamp(elapsed) + state.params.pool_token_timelock_secs;
        let address = self.address().to_string();
        let pool = state.pool_mut(pool)?;
        let tokens = if pool.total_collateral_wei == 0 || pool.total_tokens_wei == 0 {
            collateral_wei
        } else {
            mul_div(pool.total_tokens_wei, collateral_wei, pool.total_collateral_wei, "enter")?
        };
        pool.total_collateral_wei += collateral_wei;
        pool.total_tokens_wei += tokens;
        let holder = pool.holders.entry(address).or_default();
        holder.tokens_wei += tokens;
        holder.timelocked.push((unlock, tokens));
        Ok(receipt)
    }

    async fn exit(&self, pool: &str, tokens_wei: u128) -> Result<TxReceipt> {
        let (mut state, elapsed) = self.network.synced().await;
        let now = state.timestamp(elapsed);
        let exit_cr = u128::from(state.params.exit_collateral_ratio_bips);
        let backed = state.backed_value_wei(pool)?;
        {
            let pool = state.pool(pool)?;
            let available = pool.holders.get(self.address()).map_or(0, |h| h.transferable(now));
            if tokens_wei == 0 || tokens_wei > available {
                return Err(ProtocolError::reverted("exit", "pool token balance too low"));
            }
            let collateral = mul_div(pool.total_collateral_wei, tokens_wei, pool.total_tokens_wei, "exit")?;
            let remaining = U256::from(pool.total_collateral_wei - collateral) * U256::from(10_000u32);
            if remaining < U256::from(backed) * U256::from(exit_cr) {
                return Err(ProtocolError::reverted("exit", "collateral ratio falls below exitCR"));
            }
        }
        let receipt = state.mine(self.address(), elapsed)?;

        let address = self.address().to_string();
        let pool = state.pool_mut(pool)?;
        let collateral = mul_div(pool.total_collateral_wei, tokens_wei, pool.total_tokens_wei, "exit")?;
        pool.total_collateral_wei -= collateral;
        pool.total_tokens_wei -= tokens_wei;
        if let Some(holder) = pool.holders.get_mut(&address) {
            holder.tokens_wei -= tokens_wei;
            holder.timelocked.retain(|(unlock, _)| *unlock > now);
            if holder.is_empty() {
                pool.holders.remove(&address);
            }
        }
        state.account(&address).native_wei += collateral;
        Ok(receipt)
    }

    async fn withdraw_fees(&self, pool: &str, fees_uba: u128) -> Result<TxReceipt> {
        let (mut state, elapsed) = self.network.synced().await;
        let accrued = state
            .pool(pool)?
            .holders
            .get(self.address())
            .map_or(0, |h| h.fees_uba);
        if fees_uba == 0 || fees_uba > accrued {
            return Err(ProtocolError::reverted("withdrawFees", "free f-asset balance too small"));
        }
        let receipt = state.mine(self.address(), elapsed)?;

        let address = self.address().to_string();
        let pool = state.pool_mut(pool)?;
        pool.total_fees_uba = pool.total_fees_uba.saturating_sub(fees_uba);
        if let Some(holder) = pool.holders.get_mut(&address) {
            holder.fees_uba -= fees_uba;
            if holder.is_empty() {
                pool.holders.remove(&address);
            }
        }
        state.account(&address).fasset_uba += fees_uba;
        Ok(receipt)
    }

    async fn transfer_tokens(&self, pool: &str, to: &str, tokens_wei: u128) -> Result<TxReceipt> {
        let (mut state, elapsed) = self.network.synced().await;
        let now = state.timestamp(elapsed);
        let available = state
            .pool(pool)?
            .holders
            .get(self.address())
            .map_or(0, |h| h.transferable(now));
        if tokens_wei == 0 || tokens_wei > available {
            return Err(ProtocolError::reverted("transfer", "insufficient transferable balance"));
        }
        let receipt = state.mine(self.address(), elapsed)?;

        let address = self.address().to_string();
        let pool = state.pool_mut(pool)?;
        if let Some(holder) = pool.holders.get_mut(&address) {
            holder.tokens_wei -= tokens_wei;
            if holder.is_empty() {
                pool.holders.remove(&address);
            }
        }
        pool.holders.entry(to.to_string()).or_default().tokens_wei += tokens_wei;
        Ok(receipt)
    }

    async fn totals(&self, pool: &str) -> Result<PoolTotals> {
        let state = self.network.state.lock().await;
        let pool = state.pool(pool)?;
        Ok(PoolTotals {
            total_collateral_wei: pool.total_collateral_wei,
            total_pool_tokens_wei: pool.total_tokens_wei,
            total_fasset_fees_uba: pool.total_fees_uba,
        })
    }

    async fn debt_free_tokens(&self, pool: &str) -> Result<u128> {
        let (state, elapsed) = self.network.synced().await;
        let now = state.timestamp(elapsed);
        Ok(state
            .pool(pool)?
            .holders
            .get(self.address())
            .map_or(0, |h| h.transferable(now)))
    }

    async fn debt_locked_tokens(&self, pool: &str) -> Result<u128> {
        let (state, elapsed) = self.network.synced().await;
        let now = state.timestamp(elapsed);
        Ok(state
            .pool(pool)?
            .holders
            .get(self.address())
            .map_or(0, |h| h.tokens_wei.min(h.locked(now))))
    }

    async fn fasset_fees(&self, pool: &str) -> Result<u128> {
        let state = self.network.state.lock().await;
        Ok(state
            .pool(pool)?
            .holders
            .get(self.address())
            .map_or(0, |h| h.fees_uba))
    }

    async fn min_nat_to_enter(&self, pool: &str) -> Result<u128> {
        let state = self.network.state.lock().await;
        state.pool(pool)?;
        Ok(state.params.min_nat_to_enter_wei)
    }

    async fn exit_collateral_ratio_bips(&self, pool: &str) -> Result<u32> {
        let state = self.network.state.lock().await;
        state.pool(pool)?;
        Ok(state.params.exit_collateral_ratio_bips)
    }

    async fn backed_value_wei(&self, pool: &str) -> Result<u128> {
        self.network.state.lock().await.backed_value_wei(pool)
    }
}

#[async_trait]
impl NativeNetwork for SimulatedClient {
    async fn balance(&self) -> Result<u128> {
        Ok(self.network.state.lock().await.native_balance(self.address()))
    }

    async fn current_timestamp(&self) -> Result<u64> {
        let elapsed = self.network.elapsed_secs();
        Ok(self.network.state.lock().await.timestamp(elapsed))
    }
}

#[async_trait]
impl UnderlyingNetwork for SimulatedClient {
    async fn balance(&self) -> Result<u128> {
        let (state, _) = self.network.synced().await;
        Ok(state
            .underlying_balances
            .get(&self.identity.underlying_address)
            .copied()
            .unwrap_or(0))
    }

    async fn send_payment(&self, to: &str, amount_uba: u128, memo: &str) -> Result<UnderlyingPayment> {
        let (mut state, elapsed) = self.network.synced().await;
        let fee_uba = state.params.underlying_fee_uba;
        let from = self.identity.underlying_address.clone();
        let available = state.underlying_balances.get(&from).copied().unwrap_or(0);
        if available < amount_uba + fee_uba {
            return Err(ProtocolError::InsufficientBalance {
                token: "underlying".to_string(),
                needed: amount_uba + fee_uba,
                available,
            });
        }
        *state.underlying_balances.entry(from.clone()).or_default() -= amount_uba + fee_uba;
        *state.underlying_balances.entry(to.to_string()).or_default() += amount_uba;
        let block = state.underlying_block(elapsed);
        let tx_hash = state.record_underlying_tx(UnderlyingTx {
            from,
            to: to.to_string(),
            amount_uba,
            fee_uba,
            memo: memo.to_string(),
            block,
        });
        Ok(UnderlyingPayment {
            tx_hash,
            amount_uba,
            fee_uba,
        })
    }

    async fn current_block(&self) -> Result<u64> {
        let (state, elapsed) = self.network.synced().await;
        Ok(state.underlying_block(elapsed))
    }

    async fn block_of_tx(&self, tx_hash: &str) -> Result<u64> {
        let state = self.network.state.lock().await;
        state
            .find_underlying_tx(tx_hash)
            .map(|(_, tx)| tx.block)
            .ok_or_else(|| ProtocolError::unknown("underlying transaction", tx_hash))
    }
}
