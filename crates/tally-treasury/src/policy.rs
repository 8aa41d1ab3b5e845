// crates/tally-treasury/src/policy.rs
//
// Versioned reward rules.
//
// Each event pins the policy version it was created under, and the table maps
// (event type, policy version) to a reward. Rule sets are constant once
// registered, so replaying an old event always yields the reward it earned
// originally. Evaluation is pure: it reads only the event and the table.
//
// Version 1:
//   ContentCreated      BASE_CONTENT_REWARD (10) * outcome.coherence_score
//   InteractionCreated  fixed amount per interaction type (like = 0.1)
//   RewardAllocated     the stated amount, paid to inputs.recipient or the actor
//   anything else       no monetary effect
//
// Caps and guard vetoes are applied before events reach this engine. The
// breakdown keeps `bonus`, `cap_adjustment`, and `guards` so explanations have
// somewhere to show them; under version 1 they are always empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tally_core::amount::{Amount, MICROS_PER_UNIT};
use tally_core::error::{ArithmeticError, ParseAmountError};
use tally_core::event::{EventPayload, LedgerEvent, PolicyVersion};
use tally_core::identity::ActorId;

/// Version 1 base reward for a ContentCreated event: 10 units.
pub const BASE_CONTENT_REWARD_V1: Amount = Amount::from_micros(10 * MICROS_PER_UNIT);

/// Version 1 reward for a "like" interaction: 0.1 units.
pub const LIKE_REWARD_V1: Amount = Amount::from_micros(MICROS_PER_UNIT / 10);

/// Constant reward table for one policy version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: PolicyVersion,
    /// Multiplied by the coherence score of ContentCreated events.
    pub base_content_reward: Amount,
    /// Fixed reward per interaction type.
    #[serde(default)]
    pub interaction_rewards: BTreeMap<String, Amount>,
}

impl RuleSet {
    /// The version 1 rule set.
    pub fn v1() -> Self {
        let mut interaction_rewards = BTreeMap::new();
        interaction_rewards.insert("like".to_string(), LIKE_REWARD_V1);
        Self {
            version: PolicyVersion::V1,
            base_content_reward: BASE_CONTENT_REWARD_V1,
            interaction_rewards,
        }
    }

    pub fn interaction_reward(&self, interaction_type: &str) -> Option<Amount> {
        self.interaction_rewards.get(interaction_type).copied()
    }

    /// Every rate must be zero or positive.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let negative = |rule: &str, rate: Amount| PolicyError::NegativeRate {
            version: self.version,
            rule: rule.to_string(),
            rate,
        };
        if self.base_content_reward.is_negative() {
            return Err(negative("base_content_reward", self.base_content_reward));
        }
        match self
            .interaction_rewards
            .iter()
            .find(|(_, rate)| rate.is_negative())
        {
            Some((kind, rate)) => Err(negative(kind, *rate)),
            None => Ok(()),
        }
    }
}

/// How a reward amount was formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Rule base amount before any multiplier.
    pub base: Amount,
    /// Quality multiplier, when the rule uses one.
    pub multiplier: Option<Amount>,
    pub bonus: Amount,
    /// Amount removed by a cap (subtracted from the total).
    pub cap_adjustment: Amount,
    /// Guards that adjusted or annotated this reward.
    pub guards: Vec<String>,
    /// `base * multiplier + bonus - cap_adjustment`.
    pub total: Amount,
}

impl RewardBreakdown {
    fn flat(base: Amount) -> Self {
        Self {
            base,
            multiplier: None,
            bonus: Amount::ZERO,
            cap_adjustment: Amount::ZERO,
            guards: Vec::new(),
            total: base,
        }
    }

    fn scaled(base: Amount, multiplier: Amount) -> Result<Self, ArithmeticError> {
        Ok(Self {
            base,
            multiplier: Some(multiplier),
            bonus: Amount::ZERO,
            cap_adjustment: Amount::ZERO,
            guards: Vec::new(),
            total: base.checked_mul(multiplier)?,
        })
    }
}

/// Result of evaluating the rules for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardDecision {
    /// The event moves no tokens.
    NoEffect,
    /// Credit `amount` to `recipient`.
    Reward {
        recipient: ActorId,
        amount: Amount,
        breakdown: RewardBreakdown,
    },
}

/// Errors from evaluating or registering policy rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The event pins a version this table does not know.
    #[error("Unknown policy version {0}")]
    UnknownVersion(PolicyVersion),

    /// Registering a version that already exists; rule sets are immutable.
    #[error("Policy version {0} is already registered")]
    VersionExists(PolicyVersion),

    /// A field the rule needs is absent.
    #[error("Missing field `{field}` required by {event_type} rule")]
    MissingField {
        event_type: &'static str,
        field: &'static str,
    },

    /// A numeric field could not be parsed.
    #[error("Malformed number in `{field}`: {source}")]
    MalformedNumber {
        field: &'static str,
        source: ParseAmountError,
    },

    #[error("Coherence score {0} is outside [0, 1]")]
    ScoreOutOfRange(Amount),

    #[error("Allocation amount {0} is negative")]
    NegativeAmount(Amount),

    /// A rule set pays a negative amount; rules may only credit.
    #[error("Policy version {version} sets a negative rate {rate} for {rule}")]
    NegativeRate {
        version: PolicyVersion,
        rule: String,
        rate: Amount,
    },

    #[error("Computed reward {0} is negative")]
    NegativeReward(Amount),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),
}

/// All known rule sets, keyed by version.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    rule_sets: BTreeMap<PolicyVersion, RuleSet>,
}

impl PolicyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shipped with this build (version 1).
    pub fn builtin() -> Self {
        let mut rule_sets = BTreeMap::new();
        rule_sets.insert(PolicyVersion::V1, RuleSet::v1());
        Self { rule_sets }
    }

    /// Add a new rule set.
    ///
    /// # Errors
    /// Returns `PolicyError::VersionExists` if the version is already present
    /// and `PolicyError::NegativeRate` if any rate is negative.
    pub fn register(&mut self, rule_set: RuleSet) -> Result<(), PolicyError> {
        if self.rule_sets.contains_key(&rule_set.version) {
            return Err(PolicyError::VersionExists(rule_set.version));
        }
        rule_set.validate()?;
        self.rule_sets.insert(rule_set.version, rule_set);
        Ok(())
    }

    pub fn rule_set(&self, version: PolicyVersion) -> Option<&RuleSet> {
        self.rule_sets.get(&version)
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> Vec<PolicyVersion> {
        self.rule_sets.keys().copied().collect()
    }

    /// Evaluate the reward for an event under its pinned policy version.
    ///
    /// Unknown event types have no monetary effect and need no rule set.
    pub fn reward_for(&self, event: &LedgerEvent) -> Result<RewardDecision, PolicyError> {
        if let EventPayload::Unrecognized { .. } = event.payload {
            return Ok(RewardDecision::NoEffect);
        }

        let rules = self
            .rule_set(event.policy_version)
            .ok_or(PolicyError::UnknownVersion(event.policy_version))?;

        let (recipient, breakdown) = match &event.payload {
            EventPayload::ContentCreated { outcome, .. } => {
                let text = outcome.coherence_score.as_ref().ok_or(PolicyError::MissingField {
                    event_type: "ContentCreated",
                    field: "coherence_score",
                })?;
                let score = text.parse().map_err(|source| PolicyError::MalformedNumber {
                    field: "coherence_score",
                    source,
                })?;
                if score.is_negative() || score > Amount::from_micros(MICROS_PER_UNIT) {
                    return Err(PolicyError::ScoreOutOfRange(score));
                }
                (
                    event.actor.clone(),
                    RewardBreakdown::scaled(rules.base_content_reward, score)?,
                )
            }
            EventPayload::InteractionCreated { inputs, .. } => {
                let kind = inputs.interaction_type.as_deref().ok_or(PolicyError::MissingField {
                    event_type: "InteractionCreated",
                    field: "interaction_type",
                })?;
                match rules.interaction_reward(kind) {
                    Some(reward) => (event.actor.clone(), RewardBreakdown::flat(reward)),
                    None => return Ok(RewardDecision::NoEffect),
                }
            }
            EventPayload::RewardAllocated { inputs, .. } => {
                let text = inputs.amount.as_ref().ok_or(PolicyError::MissingField {
                    event_type: "RewardAllocated",
                    field: "amount",
                })?;
                let amount: Amount = text.parse().map_err(|source| PolicyError::MalformedNumber {
                    field: "amount",
                    source,
                })?;
                if amount.is_negative() {
                    return Err(PolicyError::NegativeAmount(amount));
                }
                let recipient = inputs.recipient.clone().unwrap_or_else(|| event.actor.clone());
                (recipient, RewardBreakdown::flat(amount))
            }
            EventPayload::Unrecognized { .. } => return Ok(RewardDecision::NoEffect),
        };

        if breakdown.total.is_negative() {
            return Err(PolicyError::NegativeReward(breakdown.total));
        }
        if breakdown.total.is_zero() {
            return Ok(RewardDecision::NoEffect);
        }
        Ok(RewardDecision::Reward {
            recipient,
            amount: breakdown.total,
            breakdown,
        })
    }
}
