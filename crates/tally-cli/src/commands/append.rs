// crates/tally-cli/src/commands/append.rs
//
// `tally append <kind> ...` - build a new event chained onto the journal's
// tail, run it through the engine, and only then persist it.

use clap::{Args, Subcommand};
use uuid::Uuid;

use tally_core::amount::DecimalText;
use tally_core::event::{
    AllocationInputs, ContentInputs, ContentOutcome, EventBuilder, EventPayload,
    InteractionInputs, PolicyVersion, RawFields,
};
use tally_core::identity::ActorId;
use tally_treasury::append_to_journal;

use crate::commands::load_engine;
use crate::config::TallyConfig;
use crate::output::{format_json, OutputFormat};

/// Event kinds that can be appended.
#[derive(Debug, Subcommand)]
pub enum AppendCmd {
    /// A piece of content was published and scored.
    Content {
        #[command(flatten)]
        common: CommonArgs,

        /// Coherence score in [0, 1].
        #[arg(long)]
        coherence_score: String,

        #[arg(long)]
        content_id: Option<String>,
    },

    /// An actor interacted with content (e.g. a like).
    Interaction {
        #[command(flatten)]
        common: CommonArgs,

        /// Interaction kind, e.g. "like".
        #[arg(long, default_value = "like")]
        interaction_type: String,

        #[arg(long)]
        target_id: Option<String>,
    },

    /// A reward allocation approved upstream.
    Allocation {
        #[command(flatten)]
        common: CommonArgs,

        /// Recipient; defaults to the event actor.
        #[arg(long)]
        recipient: Option<String>,

        /// Amount to credit, as a decimal string.
        #[arg(long)]
        amount: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// An event type the treasury records but does not reward.
    Other {
        #[command(flatten)]
        common: CommonArgs,

        /// Event type label.
        #[arg(long)]
        event_type: String,
    },
}

/// Fields shared by every appended event.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Actor that emitted the event.
    #[arg(long)]
    pub actor: String,

    /// Event id; a fresh UUIDv7 when omitted.
    #[arg(long)]
    pub event_id: Option<String>,

    /// Logical timestamp; one past the last event's when omitted.
    #[arg(long)]
    pub timestamp: Option<u64>,

    /// Policy version the event is evaluated under.
    #[arg(long, default_value_t = 1)]
    pub policy_version: u32,

    /// Signature produced upstream.
    #[arg(long, requires = "signer_did")]
    pub signature: Option<String>,

    /// DID of the signer.
    #[arg(long, requires = "signature")]
    pub signer_did: Option<String>,
}

impl AppendCmd {
    fn common(&self) -> &CommonArgs {
        match self {
            AppendCmd::Content { common, .. }
            | AppendCmd::Interaction { common, .. }
            | AppendCmd::Allocation { common, .. }
            | AppendCmd::Other { common, .. } => common,
        }
    }

    fn payload(&self) -> EventPayload {
        match self {
            AppendCmd::Content {
                coherence_score,
                content_id,
                ..
            } => EventPayload::ContentCreated {
                inputs: ContentInputs {
                    content_id: content_id.clone(),
                    ..Default::default()
                },
                outcome: ContentOutcome {
                    coherence_score: Some(DecimalText::new(coherence_score.as_str())),
                    ..Default::default()
                },
            },
            AppendCmd::Interaction {
                interaction_type,
                target_id,
                ..
            } => EventPayload::InteractionCreated {
                inputs: InteractionInputs {
                    interaction_type: Some(interaction_type.clone()),
                    target_id: target_id.clone(),
                    ..Default::default()
                },
                outcome: RawFields::new(),
            },
            AppendCmd::Allocation {
                recipient,
                amount,
                reason,
                ..
            } => EventPayload::RewardAllocated {
                inputs: AllocationInputs {
                    recipient: recipient.as_deref().map(ActorId::from),
                    amount: Some(DecimalText::new(amount.as_str())),
                    reason: reason.clone(),
                    ..Default::default()
                },
                outcome: RawFields::new(),
            },
            AppendCmd::Other { event_type, .. } => EventPayload::unrecognized(event_type),
        }
    }
}

/// Run the append command.
pub fn run(
    config: &TallyConfig,
    format: &OutputFormat,
    cmd: &AppendCmd,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = load_engine(config)?;
    let common = cmd.common();

    let event_id = common
        .event_id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let timestamp = common.timestamp.unwrap_or_else(|| {
        engine
            .events()
            .last()
            .map(|last| last.timestamp.saturating_add(1))
            .unwrap_or(0)
    });

    let mut builder = EventBuilder::new(event_id, common.actor.as_str(), cmd.payload())
        .previous_hash(engine.last_event_hash())
        .sequence(engine.next_sequence())
        .timestamp(timestamp)
        .policy_version(PolicyVersion(common.policy_version));
    if let (Some(signature), Some(signer_did)) = (&common.signature, &common.signer_did) {
        builder = builder.signed(signature.as_str(), signer_did.as_str());
    }
    let event = builder.build()?;

    // Nothing reaches the journal unless the engine accepts it.
    let outcome = engine.process_ledger_event(&event)?;
    let journal_path = config.journal_path();
    append_to_journal(&journal_path, &event)?;
    tracing::info!("Appended {} to {}", event.event_id, journal_path);

    match format {
        OutputFormat::Json => println!(
            "{}",
            format_json(&serde_json::json!({ "event": event, "outcome": outcome }))
        ),
        OutputFormat::Table => {
            println!("Appended event {}", event.event_id);
            println!("  Type:     {}", event.event_type());
            println!("  Sequence: {}", event.sequence_number);
            println!("  Hash:     {}", event.event_hash);
            match &outcome {
                tally_treasury::EngineOutcome::Applied { recipient, amount } => {
                    println!("  Credited: {} {} to {}", amount, engine.currency(), recipient)
                }
                tally_treasury::EngineOutcome::NoOp => println!("  No balance change"),
                tally_treasury::EngineOutcome::Duplicate => println!("  Already applied"),
            }
        }
    }
    Ok(())
}
