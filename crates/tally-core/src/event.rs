// crates/tally-core/src/event.rs
//
// Hash-chained ledger events.
//
// Every event links to its predecessor through `previous_event_hash`, and its
// own `event_hash` is SHA-256(canonical(event) || previous_event_hash). The
// canonical form is the compact JSON encoding of every field except the hash
// and the signature fields, in declaration order, with object keys sorted.
//
// On the wire an event is a flat JSON object whose `event_type` selects how
// `inputs` and `outcome` are decoded. Known types decode into typed payloads
// with camelCase keys; keys a payload does not interpret ride along in its
// `extra` map, so every wire field is hashed and written back. Anything else
// is kept verbatim as `EventPayload::Unrecognized`.

use std::fmt;

use serde::de::{self, Visitor};
use serde::ser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::amount::DecimalText;
use crate::crypto::hash_parts;
use crate::error::EventError;
use crate::identity::ActorId;

pub const CONTENT_CREATED: &str = "ContentCreated";
pub const INTERACTION_CREATED: &str = "InteractionCreated";
pub const REWARD_ALLOCATED: &str = "RewardAllocated";

/// 32-byte SHA-256 digest linking events together. Hex-encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventHash(pub [u8; 32]);

/// Previous-hash marker of the first event in a ledger.
pub const GENESIS_HASH: EventHash = EventHash([0u8; 32]);

impl EventHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, EventError> {
        let bytes = hex::decode(s).map_err(|e| EventError::InvalidHash(e.to_string()))?;
        let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            EventError::InvalidHash(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(array))
    }

    pub fn is_genesis(&self) -> bool {
        *self == GENESIS_HASH
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for EventHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

struct EventHashVisitor;

impl<'de> Visitor<'de> for EventHashVisitor {
    type Value = EventHash;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a 64-character hex digest")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<EventHash, E> {
        EventHash::from_hex(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for EventHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(EventHashVisitor)
    }
}

/// Version of the policy rule table an event was created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyVersion(pub u32);

impl PolicyVersion {
    pub const V1: PolicyVersion = PolicyVersion(1);
}

impl fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Payload keys this build does not interpret, kept verbatim so they are
/// still hashed and written back unchanged.
pub type RawFields = Map<String, Value>;

/// Inputs of a `ContentCreated` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentInputs {
    #[serde(alias = "content_id", skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(flatten)]
    pub extra: RawFields,
}

/// Outcome of a `ContentCreated` event, scored upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentOutcome {
    /// Quality multiplier in [0, 1].
    #[serde(alias = "coherence_score", skip_serializing_if = "Option::is_none")]
    pub coherence_score: Option<DecimalText>,
    #[serde(flatten)]
    pub extra: RawFields,
}

/// Inputs of an `InteractionCreated` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionInputs {
    /// e.g. "like".
    #[serde(alias = "interaction_type", skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    #[serde(alias = "target_id", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(flatten)]
    pub extra: RawFields,
}

/// Inputs of a `RewardAllocated` event: an allocation approved upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AllocationInputs {
    /// Defaults to the event actor when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<DecimalText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: RawFields,
}

/// The type-specific part of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    ContentCreated {
        inputs: ContentInputs,
        outcome: ContentOutcome,
    },
    InteractionCreated {
        inputs: InteractionInputs,
        /// No rule reads it.
        outcome: RawFields,
    },
    RewardAllocated {
        inputs: AllocationInputs,
        /// No rule reads it.
        outcome: RawFields,
    },
    /// Any event type this build does not know, kept as received.
    Unrecognized {
        event_type: String,
        inputs: Value,
        outcome: Value,
    },
}

impl EventPayload {
    /// A `ContentCreated` payload with the given coherence score.
    pub fn content_created(coherence_score: &str) -> Self {
        EventPayload::ContentCreated {
            inputs: ContentInputs::default(),
            outcome: ContentOutcome {
                coherence_score: Some(DecimalText::new(coherence_score)),
                extra: RawFields::new(),
            },
        }
    }

    /// An `InteractionCreated` payload of the given kind (e.g. "like").
    pub fn interaction(interaction_type: &str) -> Self {
        EventPayload::InteractionCreated {
            inputs: InteractionInputs {
                interaction_type: Some(interaction_type.to_string()),
                ..Default::default()
            },
            outcome: RawFields::new(),
        }
    }

    /// A `RewardAllocated` payload paying `amount` to `recipient`.
    pub fn reward_allocated(recipient: &str, amount: &str) -> Self {
        EventPayload::RewardAllocated {
            inputs: AllocationInputs {
                recipient: Some(ActorId::from(recipient)),
                amount: Some(DecimalText::new(amount)),
                ..Default::default()
            },
            outcome: RawFields::new(),
        }
    }

    /// An event type with no typed decoding and empty inputs/outcome.
    pub fn unrecognized(event_type: &str) -> Self {
        EventPayload::Unrecognized {
            event_type: event_type.to_string(),
            inputs: Value::Object(Map::new()),
            outcome: Value::Object(Map::new()),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            EventPayload::ContentCreated { .. } => CONTENT_CREATED,
            EventPayload::InteractionCreated { .. } => INTERACTION_CREATED,
            EventPayload::RewardAllocated { .. } => REWARD_ALLOCATED,
            EventPayload::Unrecognized { event_type, .. } => event_type,
        }
    }

    fn decode(event_type: String, inputs: Value, outcome: Value) -> Result<Self, serde_json::Error> {
        let inputs = empty_if_null(inputs);
        let outcome = empty_if_null(outcome);
        Ok(match event_type.as_str() {
            CONTENT_CREATED => EventPayload::ContentCreated {
                inputs: serde_json::from_value(inputs)?,
                outcome: serde_json::from_value(outcome)?,
            },
            INTERACTION_CREATED => EventPayload::InteractionCreated {
                inputs: serde_json::from_value(inputs)?,
                outcome: serde_json::from_value(outcome)?,
            },
            REWARD_ALLOCATED => EventPayload::RewardAllocated {
                inputs: serde_json::from_value(inputs)?,
                outcome: serde_json::from_value(outcome)?,
            },
            _ => EventPayload::Unrecognized {
                event_type,
                inputs,
                outcome,
            },
        })
    }

    // Going through `Value` sorts every object key, flattened extras included.
    fn inputs_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            EventPayload::ContentCreated { inputs, .. } => serde_json::to_value(inputs),
            EventPayload::InteractionCreated { inputs, .. } => serde_json::to_value(inputs),
            EventPayload::RewardAllocated { inputs, .. } => serde_json::to_value(inputs),
            EventPayload::Unrecognized { inputs, .. } => Ok(inputs.clone()),
        }
    }

    fn outcome_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            EventPayload::ContentCreated { outcome, .. } => serde_json::to_value(outcome),
            EventPayload::InteractionCreated { outcome, .. }
            | EventPayload::RewardAllocated { outcome, .. } => Ok(Value::Object(outcome.clone())),
            EventPayload::Unrecognized { outcome, .. } => Ok(outcome.clone()),
        }
    }
}

fn empty_if_null(value: Value) -> Value {
    if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    }
}

/// One immutable economic fact from the ledger of record.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    /// Unique identifier; the idempotency key.
    pub event_id: String,
    pub payload: EventPayload,
    /// Logical clock value assigned upstream.
    pub timestamp: u64,
    /// Position in the ledger, starting at 0.
    pub sequence_number: u64,
    pub actor: ActorId,
    /// Rule set pinned at creation time.
    pub policy_version: PolicyVersion,
    pub previous_event_hash: EventHash,
    pub event_hash: EventHash,
    /// Opaque; verified before the event reaches the engine.
    pub signature: Option<String>,
    pub signer_did: Option<String>,
}

/// Hashed fields of an event, in hashing order.
#[derive(Serialize)]
struct CanonicalEvent<'a> {
    event_id: &'a str,
    event_type: &'a str,
    timestamp: u64,
    sequence_number: u64,
    actor: &'a ActorId,
    inputs: Value,
    outcome: Value,
    policy_version: PolicyVersion,
    previous_event_hash: &'a EventHash,
}

#[derive(Serialize)]
struct WireEventRef<'a> {
    #[serde(flatten)]
    canonical: CanonicalEvent<'a>,
    event_hash: &'a EventHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signer_did: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireEvent {
    event_id: String,
    event_type: String,
    timestamp: u64,
    sequence_number: u64,
    actor: ActorId,
    #[serde(default)]
    inputs: Value,
    #[serde(default)]
    outcome: Value,
    policy_version: PolicyVersion,
    previous_event_hash: EventHash,
    event_hash: EventHash,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    signer_did: Option<String>,
}

impl LedgerEvent {
    pub fn event_type(&self) -> &str {
        self.payload.event_type()
    }

    fn canonical(&self) -> Result<CanonicalEvent<'_>, serde_json::Error> {
        Ok(CanonicalEvent {
            event_id: &self.event_id,
            event_type: self.payload.event_type(),
            timestamp: self.timestamp,
            sequence_number: self.sequence_number,
            actor: &self.actor,
            inputs: self.payload.inputs_value()?,
            outcome: self.payload.outcome_value()?,
            policy_version: self.policy_version,
            previous_event_hash: &self.previous_event_hash,
        })
    }

    /// Compact JSON of the hashed fields.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EventError> {
        Ok(serde_json::to_vec(&self.canonical()?)?)
    }

    /// SHA-256(canonical bytes || previous_event_hash).
    pub fn compute_hash(&self) -> Result<EventHash, EventError> {
        let canonical = self.canonical_bytes()?;
        Ok(EventHash(hash_parts(&[
            &canonical,
            self.previous_event_hash.as_bytes(),
        ])))
    }

    /// Whether the declared `event_hash` matches the event's content.
    pub fn has_valid_hash(&self) -> Result<bool, EventError> {
        Ok(self.compute_hash()? == self.event_hash)
    }

    /// Recompute and store `event_hash`.
    pub fn seal(&mut self) -> Result<(), EventError> {
        self.event_hash = self.compute_hash()?;
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.signature) && present(&self.signer_did)
    }
}

impl Serialize for LedgerEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEventRef {
            canonical: self.canonical().map_err(ser::Error::custom)?,
            event_hash: &self.event_hash,
            signature: self.signature.as_deref(),
            signer_did: self.signer_did.as_deref(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LedgerEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEvent::deserialize(deserializer)?;
        let payload = EventPayload::decode(wire.event_type, wire.inputs, wire.outcome)
            .map_err(de::Error::custom)?;
        Ok(LedgerEvent {
            event_id: wire.event_id,
            payload,
            timestamp: wire.timestamp,
            sequence_number: wire.sequence_number,
            actor: wire.actor,
            policy_version: wire.policy_version,
            previous_event_hash: wire.previous_event_hash,
            event_hash: wire.event_hash,
            signature: wire.signature,
            signer_did: wire.signer_did,
        })
    }
}

/// Builds sealed events, chaining them onto a predecessor when given one.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: LedgerEvent,
}

impl EventBuilder {
    /// Start a genesis event (sequence 0, previous hash all-zero, policy v1).
    pub fn new(event_id: impl Into<String>, actor: impl Into<ActorId>, payload: EventPayload) -> Self {
        Self {
            event: LedgerEvent {
                event_id: event_id.into(),
                payload,
                timestamp: 0,
                sequence_number: 0,
                actor: actor.into(),
                policy_version: PolicyVersion::V1,
                previous_event_hash: GENESIS_HASH,
                event_hash: GENESIS_HASH,
                signature: None,
                signer_did: None,
            },
        }
    }

    /// Link after `previous`: takes its hash and the next sequence number.
    pub fn follows(mut self, previous: &LedgerEvent) -> Self {
        self.event.previous_event_hash = previous.event_hash;
        self.event.sequence_number = previous.sequence_number.saturating_add(1);
        self
    }

    pub fn previous_hash(mut self, hash: EventHash) -> Self {
        self.event.previous_event_hash = hash;
        self
    }

    pub fn sequence(mut self, sequence_number: u64) -> Self {
        self.event.sequence_number = sequence_number;
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    pub fn policy_version(mut self, version: PolicyVersion) -> Self {
        self.event.policy_version = version;
        self
    }

    pub fn signed(mut self, signature: impl Into<String>, signer_did: impl Into<String>) -> Self {
        self.event.signature = Some(signature.into());
        self.event.signer_did = Some(signer_did.into());
        self
    }

    /// Seal the event with its computed hash.
    pub fn build(self) -> Result<LedgerEvent, EventError> {
        let mut event = self.event;
        event.seal()?;
        Ok(event)
    }
}
