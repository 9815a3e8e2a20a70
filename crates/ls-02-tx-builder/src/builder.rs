//! # Transaction Builder
//!
//! One method per intent. Each validates and canonicalizes its input,
//! assembles the Move call and encodes it for `sender`.

use serde::Serialize;
use shared_types::{ChainAddress, ProposalType};

use crate::config::TxBuilderConfig;
use crate::domain::intents::limits;
use crate::domain::{
    parse_amount, AddFundsIntent, AddMemberIntent, ApproveMilestoneIntent, BuildError,
    BuiltTransaction, CallArg, CreateEscrowIntent, CreateProposalIntent, ExecuteProposalIntent,
    MoveCall, PureArg, RefundEscrowIntent, ReleaseMilestoneIntent, SubmitDataIntent,
    TransactionData, UpdateThresholdIntent, VoteIntent,
};

/// Stateless builder bound to one deployment.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    config: TxBuilderConfig,
}

// =============================================================================
// INPUT CHECKS
// =============================================================================

fn address(field: &'static str, input: &str) -> Result<ChainAddress, BuildError> {
    ChainAddress::parse(input).map_err(|e| BuildError::InvalidAddress {
        field,
        reason: e.to_string(),
    })
}

fn text(field: &'static str, value: &str, max: usize, required: bool) -> Result<String, BuildError> {
    if required && value.trim().is_empty() {
        return Err(BuildError::Empty(field));
    }
    let len = value.chars().count();
    if len > max {
        return Err(BuildError::TooLong { field, max, len });
    }
    Ok(value.to_string())
}

fn sensor_type(value: u64) -> Result<u8, BuildError> {
    u8::try_from(value).map_err(|_| BuildError::OutOfRange {
        field: "sensorType",
        reason: format!("{value} is not in 0..=255"),
    })
}

fn threshold(min: u64, max: u64) -> Result<(), BuildError> {
    if min >= max {
        return Err(BuildError::InvalidThreshold { min, max });
    }
    Ok(())
}

fn hex_bytes(field: &'static str, input: &str) -> Result<(String, Vec<u8>), BuildError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
        .to_ascii_lowercase();
    if digits.is_empty() {
        return Err(BuildError::Empty(field));
    }
    if digits.len() > limits::DATA_HASH_HEX_MAX {
        return Err(BuildError::TooLong {
            field,
            max: limits::DATA_HASH_HEX_MAX,
            len: digits.len(),
        });
    }
    let bytes = hex::decode(&digits).map_err(|_| BuildError::InvalidHex { field })?;
    Ok((digits, bytes))
}

impl TxBuilder {
    /// Create a builder.
    pub fn new(config: TxBuilderConfig) -> Self {
        Self { config }
    }

    /// Deployment coordinates.
    pub fn config(&self) -> &TxBuilderConfig {
        &self.config
    }

    fn dao(&self) -> CallArg {
        CallArg::Shared {
            id: self.config.dao_object_id.clone(),
            mutable: true,
        }
    }

    fn clock(&self) -> CallArg {
        CallArg::Shared {
            id: self.config.clock_object_id.clone(),
            mutable: false,
        }
    }

    fn finish<I: Serialize>(
        &self,
        sender: ChainAddress,
        module: &str,
        function: &str,
        arguments: Vec<CallArg>,
        inputs: &I,
    ) -> Result<BuiltTransaction, BuildError> {
        let call = MoveCall {
            package: self.config.package_id.clone(),
            module: module.to_string(),
            function: function.to_string(),
            type_arguments: Vec::new(),
            arguments,
        };
        let tx_bytes = TransactionData::from_call(&sender, self.config.gas_budget, &call)?.to_base64()?;
        let inputs =
            serde_json::to_value(inputs).map_err(|e| BuildError::Serialization(e.to_string()))?;

        Ok(BuiltTransaction {
            tx_bytes,
            call,
            sender,
            gas_budget: self.config.gas_budget,
            inputs,
        })
    }

    // =========================================================================
    // DAO INTENTS
    // =========================================================================

    /// `dao::add_member(dao, member, name, voting_power)`
    pub fn add_member(&self, intent: &AddMemberIntent) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let member = address("member", &intent.member)?;
        let name = text("name", &intent.name, limits::NAME_MAX, true)?;

        let canonical = AddMemberIntent {
            sender: sender.to_string(),
            member: member.to_string(),
            name: name.clone(),
            voting_power: intent.voting_power,
        };
        let args = vec![
            self.dao(),
            CallArg::Pure(PureArg::Address(member)),
            CallArg::Pure(PureArg::String(name)),
            CallArg::Pure(PureArg::U64(intent.voting_power)),
        ];
        self.finish(sender, &self.config.dao_module, "add_member", args, &canonical)
    }

    /// `dao::submit_data(dao, sensor_type, value, data_hash, metadata, clock)`
    pub fn submit_data(&self, intent: &SubmitDataIntent) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let sensor = sensor_type(intent.sensor_type)?;
        let (hash_hex, hash_bytes) = hex_bytes("dataHash", &intent.data_hash)?;
        let metadata = text("metadata", &intent.metadata, limits::METADATA_MAX, false)?;

        let canonical = SubmitDataIntent {
            sender: sender.to_string(),
            sensor_type: intent.sensor_type,
            value: intent.value,
            data_hash: hash_hex,
            metadata: metadata.clone(),
        };
        let args = vec![
            self.dao(),
            CallArg::Pure(PureArg::U8(sensor)),
            CallArg::Pure(PureArg::U64(intent.value)),
            CallArg::Pure(PureArg::Bytes(hash_bytes)),
            CallArg::Pure(PureArg::String(metadata)),
            self.clock(),
        ];
        self.finish(sender, &self.config.dao_module, "submit_data", args, &canonical)
    }

    /// `dao::create_proposal` for general proposals,
    /// `dao::create_config_proposal` for threshold changes.
    ///
    /// Alert proposals are rejected: only the contract opens them.
    pub fn create_proposal(
        &self,
        intent: &CreateProposalIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let proposal_type = ProposalType::try_from(intent.proposal_type)
            .map_err(|_| BuildError::UnknownProposalType(intent.proposal_type))?;
        if !proposal_type.is_user_creatable() {
            return Err(BuildError::AlertNotUserCreatable);
        }
        let title = text("title", &intent.title, limits::TITLE_MAX, true)?;
        let description = text(
            "description",
            &intent.description,
            limits::DESCRIPTION_MAX,
            false,
        )?;
        if !(limits::VOTING_PERIOD_MIN_MS..=limits::VOTING_PERIOD_MAX_MS)
            .contains(&intent.voting_period_ms)
        {
            return Err(BuildError::OutOfRange {
                field: "votingPeriodMs",
                reason: format!(
                    "{} not in {}..={}",
                    intent.voting_period_ms,
                    limits::VOTING_PERIOD_MIN_MS,
                    limits::VOTING_PERIOD_MAX_MS
                ),
            });
        }

        let canonical = CreateProposalIntent {
            sender: sender.to_string(),
            title: title.clone(),
            description: description.clone(),
            ..intent.clone()
        };

        let mut args = vec![self.dao()];
        let function = match (proposal_type, intent.config_change) {
            (ProposalType::Configuration, Some(change)) => {
                let sensor = sensor_type(change.sensor_type)?;
                threshold(change.min_value, change.max_value)?;
                args.extend([
                    CallArg::Pure(PureArg::String(title)),
                    CallArg::Pure(PureArg::String(description)),
                    CallArg::Pure(PureArg::U64(intent.voting_period_ms)),
                    CallArg::Pure(PureArg::U8(sensor)),
                    CallArg::Pure(PureArg::U64(change.min_value)),
                    CallArg::Pure(PureArg::U64(change.max_value)),
                ]);
                "create_config_proposal"
            }
            (ProposalType::Configuration, None) => {
                return Err(BuildError::OutOfRange {
                    field: "configChange",
                    reason: "configuration proposals need a threshold change".to_string(),
                })
            }
            (_, Some(_)) => {
                return Err(BuildError::OutOfRange {
                    field: "configChange",
                    reason: "only configuration proposals carry a threshold change".to_string(),
                })
            }
            (_, None) => {
                args.extend([
                    CallArg::Pure(PureArg::U8(proposal_type.as_u8())),
                    CallArg::Pure(PureArg::String(title)),
                    CallArg::Pure(PureArg::String(description)),
                    CallArg::Pure(PureArg::U64(intent.voting_period_ms)),
                ]);
                "create_proposal"
            }
        };
        args.push(self.clock());

        self.finish(sender, &self.config.dao_module, function, args, &canonical)
    }

    /// `dao::vote(dao, proposal, vote, clock)`
    pub fn vote(&self, intent: &VoteIntent) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let proposal = address("proposalId", &intent.proposal_id)?;

        let canonical = VoteIntent {
            sender: sender.to_string(),
            proposal_id: proposal.to_string(),
            vote: intent.vote,
        };
        let args = vec![
            self.dao(),
            CallArg::Shared {
                id: proposal,
                mutable: true,
            },
            CallArg::Pure(PureArg::Bool(intent.vote)),
            self.clock(),
        ];
        self.finish(sender, &self.config.dao_module, "vote", args, &canonical)
    }

    /// `dao::execute_proposal(dao, proposal, clock)`
    pub fn execute_proposal(
        &self,
        intent: &ExecuteProposalIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let proposal = address("proposalId", &intent.proposal_id)?;

        let canonical = ExecuteProposalIntent {
            sender: sender.to_string(),
            proposal_id: proposal.to_string(),
        };
        let args = vec![
            self.dao(),
            CallArg::Shared {
                id: proposal,
                mutable: true,
            },
            self.clock(),
        ];
        self.finish(sender, &self.config.dao_module, "execute_proposal", args, &canonical)
    }

    /// `dao::update_threshold(dao, sensor_type, min, max)`
    pub fn update_threshold(
        &self,
        intent: &UpdateThresholdIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let sensor = sensor_type(intent.sensor_type)?;
        threshold(intent.min_value, intent.max_value)?;

        let canonical = UpdateThresholdIntent {
            sender: sender.to_string(),
            ..intent.clone()
        };
        let args = vec![
            self.dao(),
            CallArg::Pure(PureArg::U8(sensor)),
            CallArg::Pure(PureArg::U64(intent.min_value)),
            CallArg::Pure(PureArg::U64(intent.max_value)),
        ];
        self.finish(sender, &self.config.dao_module, "update_threshold", args, &canonical)
    }

    /// `dao::add_funds(dao, coin, amount)`
    pub fn add_funds(&self, intent: &AddFundsIntent) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let coin = address("coinObjectId", &intent.coin_object_id)?;
        let amount = parse_amount(&intent.amount)?;
        if amount == 0 {
            return Err(BuildError::OutOfRange {
                field: "amount",
                reason: "must be positive".to_string(),
            });
        }

        let canonical = AddFundsIntent {
            sender: sender.to_string(),
            coin_object_id: coin.to_string(),
            amount: amount.to_string(),
        };
        let args = vec![
            self.dao(),
            CallArg::Owned(coin),
            CallArg::Pure(PureArg::U64(amount)),
        ];
        self.finish(sender, &self.config.dao_module, "add_funds", args, &canonical)
    }

    // =========================================================================
    // ESCROW INTENTS
    // =========================================================================

    /// `escrow::create_escrow(coin, beneficiary, total, descriptions, amounts, clock)`
    pub fn create_escrow(
        &self,
        intent: &CreateEscrowIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let beneficiary = address("beneficiary", &intent.beneficiary)?;
        let coin = address("coinObjectId", &intent.coin_object_id)?;
        let total = parse_amount(&intent.amount)?;

        if intent.milestones.is_empty() {
            return Err(BuildError::Empty("milestones"));
        }
        if intent.milestones.len() > limits::MILESTONES_MAX {
            return Err(BuildError::TooLong {
                field: "milestones",
                max: limits::MILESTONES_MAX,
                len: intent.milestones.len(),
            });
        }

        let mut descriptions = Vec::with_capacity(intent.milestones.len());
        let mut amounts = Vec::with_capacity(intent.milestones.len());
        for milestone in &intent.milestones {
            descriptions.push(text(
                "milestones.description",
                &milestone.description,
                limits::MILESTONE_DESCRIPTION_MAX,
                true,
            )?);
            amounts.push(parse_amount(&milestone.amount)?);
        }
        let sum = amounts
            .iter()
            .try_fold(0u64, |acc, a| acc.checked_add(*a))
            .ok_or_else(|| BuildError::InvalidAmount("milestone sum overflows".to_string()))?;
        if sum != total {
            return Err(BuildError::MilestoneMismatch { total, sum });
        }

        let canonical = CreateEscrowIntent {
            sender: sender.to_string(),
            beneficiary: beneficiary.to_string(),
            coin_object_id: coin.to_string(),
            amount: total.to_string(),
            milestones: intent
                .milestones
                .iter()
                .zip(&amounts)
                .map(|(m, a)| crate::domain::MilestoneInput {
                    description: m.description.clone(),
                    amount: a.to_string(),
                })
                .collect(),
        };
        let args = vec![
            CallArg::Owned(coin),
            CallArg::Pure(PureArg::Address(beneficiary)),
            CallArg::Pure(PureArg::U64(total)),
            CallArg::Pure(PureArg::StringVec(descriptions)),
            CallArg::Pure(PureArg::U64Vec(amounts)),
            self.clock(),
        ];
        self.finish(sender, &self.config.escrow_module, "create_escrow", args, &canonical)
    }

    /// `escrow::approve_milestone(escrow, index, clock)`
    pub fn approve_milestone(
        &self,
        intent: &ApproveMilestoneIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let escrow = address("escrowId", &intent.escrow_id)?;
        let canonical = ApproveMilestoneIntent {
            sender: sender.to_string(),
            escrow_id: escrow.to_string(),
            milestone_index: intent.milestone_index,
        };
        let args = vec![
            CallArg::Shared {
                id: escrow,
                mutable: true,
            },
            CallArg::Pure(PureArg::U64(intent.milestone_index)),
            self.clock(),
        ];
        self.finish(sender, &self.config.escrow_module, "approve_milestone", args, &canonical)
    }

    /// `escrow::release_milestone(escrow, index, clock)`
    pub fn release_milestone(
        &self,
        intent: &ReleaseMilestoneIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let escrow = address("escrowId", &intent.escrow_id)?;
        let canonical = ReleaseMilestoneIntent {
            sender: sender.to_string(),
            escrow_id: escrow.to_string(),
            milestone_index: intent.milestone_index,
        };
        let args = vec![
            CallArg::Shared {
                id: escrow,
                mutable: true,
            },
            CallArg::Pure(PureArg::U64(intent.milestone_index)),
            self.clock(),
        ];
        self.finish(sender, &self.config.escrow_module, "release_milestone", args, &canonical)
    }

    /// `escrow::refund(escrow, clock)`
    pub fn refund_escrow(
        &self,
        intent: &RefundEscrowIntent,
    ) -> Result<BuiltTransaction, BuildError> {
        let sender = address("sender", &intent.sender)?;
        let escrow = address("escrowId", &intent.escrow_id)?;
        let canonical = RefundEscrowIntent {
            sender: sender.to_string(),
            escrow_id: escrow.to_string(),
        };
        let args = vec![
            CallArg::Shared {
                id: escrow,
                mutable: true,
            },
            self.clock(),
        ];
        self.finish(sender, &self.config.escrow_module, "refund", args, &canonical)
    }
}
