//! Shared fakes for the integration tests: a scriptable gateway, a balance
//! table, an owner-key store, and a simulated hardware wallet.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use vela_wallet::config::{PipelineConfig, HARDWARE_CHANNEL_CAPACITY, NETWORK_ID_STOKENET};
use vela_wallet::crypto::{Keypair, PublicKeyHash};
use vela_wallet::gateway::{BalanceSource, GatewayError, LedgerGateway, OwnerKeysSource};
use vela_wallet::manifest::{
    Amount, EntityAddress, Instruction, ManifestValue, TransactionManifest, OWNER_KEYS_METADATA_KEY,
};
use vela_wallet::profile::{Profile, ProfileEntity};
use vela_wallet::signing::{
    FactorInstance, FactorSourceId, FactorSourceKind, HardwareLink, HardwareRequest,
    HardwareResponse, HardwareSignature, InMemoryKeystore, LedgerErrorCode, SigningCoordinator,
};
use vela_wallet::transaction::{
    decompile, Epoch, NotarizedTransaction, SubmitResponse, TransactionId, TransactionStatus,
};
use vela_wallet::TransactionClient;

pub const NETWORK: u8 = NETWORK_ID_STOKENET;

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct FakeGateway {
    pub epoch: Mutex<Result<Epoch, GatewayError>>,
    /// When set, `ledger_epoch` waits for a notification before answering.
    pub epoch_gate: Mutex<Option<Arc<Notify>>>,
    pub submit_answer: Mutex<Result<SubmitResponse, GatewayError>>,
    pub status: Mutex<TransactionStatus>,
    pub submitted: Mutex<Vec<String>>,
    pub epoch_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            epoch: Mutex::new(Ok(1_000)),
            epoch_gate: Mutex::new(None),
            submit_answer: Mutex::new(Ok(SubmitResponse { duplicate: false })),
            status: Mutex::new(TransactionStatus::CommittedSuccess),
            submitted: Mutex::new(Vec::new()),
            epoch_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeGateway {
    pub fn submissions(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Decodes the most recent submission.
    pub fn last_submitted(&self) -> Option<(TransactionId, NotarizedTransaction)> {
        let payload = hex::decode(self.submitted.lock().last()?).ok()?;
        let notarized = decompile(&payload).ok()?;
        Some((TransactionId::of_payload(&payload), notarized))
    }
}

#[async_trait]
impl LedgerGateway for FakeGateway {
    async fn ledger_epoch(&self) -> Result<Epoch, GatewayError> {
        self.epoch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.epoch_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.epoch.lock().clone()
    }

    async fn submit_transaction(&self, payload_hex: &str) -> Result<SubmitResponse, GatewayError> {
        let answer = self.submit_answer.lock().clone();
        if answer.is_ok() {
            self.submitted.lock().push(payload_hex.to_string());
        }
        answer
    }

    async fn transaction_status(&self, _id: &TransactionId) -> Result<TransactionStatus, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.status.lock())
    }
}

// ---------------------------------------------------------------------------
// Balances & owner keys
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeBalances {
    amounts: Mutex<HashMap<EntityAddress, Amount>>,
}

impl FakeBalances {
    pub fn set(&self, account: &EntityAddress, whole: u128) {
        self.amounts.lock().insert(account.clone(), Amount::from_whole(whole));
    }
}

#[async_trait]
impl BalanceSource for FakeBalances {
    async fn balance_of(
        &self,
        account: &EntityAddress,
        _resource: &EntityAddress,
    ) -> Result<Amount, GatewayError> {
        Ok(self.amounts.lock().get(account).copied().unwrap_or(Amount::ZERO))
    }
}

#[derive(Default)]
pub struct FakeOwnerKeys {
    keys: Mutex<HashMap<EntityAddress, Vec<PublicKeyHash>>>,
}

impl FakeOwnerKeys {
    pub fn set(&self, entity: &EntityAddress, hashes: Vec<PublicKeyHash>) {
        self.keys.lock().insert(entity.clone(), hashes);
    }

    pub fn get(&self, entity: &EntityAddress) -> Vec<PublicKeyHash> {
        self.keys.lock().get(entity).cloned().unwrap_or_default()
    }

    /// Plays the ledger: applies every `owner_keys` metadata update.
    pub fn execute(&self, manifest: &TransactionManifest) {
        for instruction in manifest.parsed_instructions().unwrap_or_default() {
            if let Instruction::SetMetadata {
                entity_address,
                key,
                value: ManifestValue::Array(values),
            } = instruction
            {
                if key != OWNER_KEYS_METADATA_KEY {
                    continue;
                }
                let hashes = values
                    .iter()
                    .filter_map(|v| match v {
                        ManifestValue::PublicKeyHash(hash) => Some(*hash),
                        _ => None,
                    })
                    .collect();
                self.set(entity_address, hashes);
            }
        }
    }
}

#[async_trait]
impl OwnerKeysSource for FakeOwnerKeys {
    async fn owner_key_hashes(&self, entity: &EntityAddress) -> Result<Vec<PublicKeyHash>, GatewayError> {
        Ok(self.get(entity))
    }
}

// ---------------------------------------------------------------------------
// Profile entities
// ---------------------------------------------------------------------------

pub fn instance(keypair: &Keypair, source: &str, kind: FactorSourceKind, index: u32) -> FactorInstance {
    FactorInstance {
        factor_source_id: FactorSourceId::new(source),
        kind,
        public_key: keypair.public_key(),
        derivation_path: format!("m/44H/1022H/2H/525H/1460H/{index}H"),
    }
}

/// An account whose key lives in `keystore`.
pub fn device_entity(keystore: &InMemoryKeystore, address: &str, seed: u8) -> ProfileEntity {
    let keypair = Keypair::from_seed(&[seed; 32]);
    keystore.insert(keypair.clone());
    ProfileEntity {
        address: EntityAddress::new(address),
        display_name: address.to_string(),
        transaction_signing: instance(&keypair, "device", FactorSourceKind::Device, seed as u32),
        auth_signing: None,
    }
}

/// An account whose key lives on the hardware wallet `source`.
pub fn hardware_entity(keypair: &Keypair, address: &str, source: &str) -> ProfileEntity {
    ProfileEntity {
        address: EntityAddress::new(address),
        display_name: address.to_string(),
        transaction_signing: instance(keypair, source, FactorSourceKind::Hardware, 0),
        auth_signing: None,
    }
}

// ---------------------------------------------------------------------------
// Simulated hardware wallet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum DeviceBehaviour {
    Sign,
    Fail(LedgerErrorCode),
    /// Holds every request and never answers.
    Silent,
}

/// Spawns a task answering hardware requests with `keys`. Requests and
/// answers cross the task boundary as JSON, like a companion transport.
/// Returns the link and a counter of requests received.
pub fn spawn_hardware_device(
    keys: Vec<Keypair>,
    behaviour: DeviceBehaviour,
) -> (HardwareLink, Arc<AtomicUsize>) {
    let (link, mut inbox) = HardwareLink::channel(HARDWARE_CHANNEL_CAPACITY);
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();

    tokio::spawn(async move {
        let mut parked = Vec::new();
        while let Some(envelope) = inbox.recv().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let wire = envelope.request.to_json().expect("request encodes");
            let request = HardwareRequest::from_json(&wire).expect("request decodes");
            let interaction_id = request.interaction_id();
            let answer = match behaviour {
                DeviceBehaviour::Sign => {
                    let message = request.message().expect("hex message");
                    let signatures = request
                        .keys()
                        .iter()
                        .filter_map(|key| {
                            keys.iter()
                                .find(|kp| kp.public_key().to_hex() == key.public_key)
                                .map(|kp| HardwareSignature {
                                    public_key: key.public_key.clone(),
                                    derivation_path: key.derivation_path.clone(),
                                    signature: kp.sign(&message).to_hex(),
                                })
                        })
                        .collect();
                    HardwareResponse::Signatures {
                        interaction_id,
                        signatures,
                    }
                }
                DeviceBehaviour::Fail(code) => HardwareResponse::Failure {
                    interaction_id,
                    code,
                    message: None,
                },
                DeviceBehaviour::Silent => {
                    parked.push(envelope);
                    continue;
                }
            };
            let wire = answer.to_json().expect("response encodes");
            let _ = envelope
                .reply
                .send(HardwareResponse::from_json(&wire).expect("response decodes"));
        }
    });

    (link, requests)
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub balances: Arc<FakeBalances>,
    pub coordinator: Arc<SigningCoordinator>,
    pub invalidations: Arc<AtomicUsize>,
    pub client: TransactionClient,
}

impl Harness {
    pub fn new(profile: Profile, keystore: Arc<InMemoryKeystore>, hardware: Option<HardwareLink>) -> Self {
        let profile = Arc::new(profile);
        let gateway = Arc::new(FakeGateway::default());
        let balances = Arc::new(FakeBalances::default());

        let mut coordinator = SigningCoordinator::new(keystore);
        if let Some(link) = hardware {
            coordinator = coordinator.with_hardware_link(link);
        }
        let coordinator = Arc::new(coordinator);

        let invalidations = Arc::new(AtomicUsize::new(0));
        let counter = invalidations.clone();
        let cache = move || {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        let client = TransactionClient::new(
            PipelineConfig::default(),
            gateway.clone(),
            balances.clone(),
            profile.clone(),
            profile,
            coordinator.clone(),
        )
        .with_cache_invalidator(Arc::new(cache));

        Self {
            gateway,
            balances,
            coordinator,
            invalidations,
            client,
        }
    }

    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}
