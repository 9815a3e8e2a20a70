//! # Command Service
//!
//! Turns user actions into unsigned transactions for the caller's wallet.
//!
//! ## Command Flow
//!
//! ```text
//! intent ──→ TxBuilder (canonicalize + validate)
//!               │
//!               ▼
//!        role check against the mirror (admin / member)
//!               │
//!               ▼
//!        optional dry run ──→ gas estimate (never fails the command)
//!               │
//!               ▼
//!        PreparedTransaction
//! ```
//!
//! `link_address` is the one command that writes: it records the link in
//! the mirror directly, since no chain transaction backs it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use shared_types::{ChainAddress, Clock};

use ls_01_chain_client::ChainClient;
use ls_02_tx_builder::{
    AddFundsIntent, AddMemberIntent, ApproveMilestoneIntent, BuiltTransaction, CreateEscrowIntent,
    CreateProposalIntent, ExecuteProposalIntent, RefundEscrowIntent, ReleaseMilestoneIntent,
    SubmitDataIntent, TxBuilder, UpdateThresholdIntent, VoteIntent,
};
use ls_03_mirror_store::{MemberLink, MirrorBatch, MirrorStore, MirrorWrite, StoreError};

use crate::errors::ServiceError;
use crate::handlers::query::parse_id;

/// Read-then-commit passes `link_address` makes before giving up on a
/// conflicting mirror write.
const LINK_ATTEMPTS: u32 = 3;

/// An unsigned transaction ready for signing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTransaction {
    /// Builder output.
    #[serde(flatten)]
    pub transaction: BuiltTransaction,
    /// Net gas from a dry run, when one succeeded.
    pub gas_estimate: Option<u64>,
}

/// Unsigned-transaction commands.
pub struct CommandService {
    builder: Arc<TxBuilder>,
    store: Arc<dyn MirrorStore>,
    chain: Arc<dyn ChainClient>,
    clock: Arc<dyn Clock>,
    estimate_gas: bool,
}

impl CommandService {
    /// Create the service. With `estimate_gas` every built transaction is
    /// dry-run through the chain client.
    pub fn new(
        builder: Arc<TxBuilder>,
        store: Arc<dyn MirrorStore>,
        chain: Arc<dyn ChainClient>,
        clock: Arc<dyn Clock>,
        estimate_gas: bool,
    ) -> Self {
        Self {
            builder,
            store,
            chain,
            clock,
            estimate_gas,
        }
    }

    /// Link a chain address to an application user.
    ///
    /// Both sides are unique. A pending member entry for the address (the
    /// member was added on chain before the user linked) is absorbed in the
    /// same commit, making the link a member and raising `memberCount`.
    /// A commit that races the applier is re-read and retried.
    pub async fn link_address(&self, user_id: &str, addr: &str) -> Result<MemberLink, ServiceError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ServiceError::InvalidInput {
                field: "userId",
                reason: "must not be empty".to_string(),
            });
        }
        let addr = parse_id("addr", addr)?;

        let mut attempt = 1;
        let absorbed = loop {
            match self.try_link(user_id, &addr).await {
                Err(ServiceError::Store(StoreError::Conflict { entity, reason, .. }))
                    if attempt < LINK_ATTEMPTS =>
                {
                    debug!(addr = %addr, attempt, entity, reason = %reason, "Link raced a mirror write; retrying");
                    attempt += 1;
                }
                other => break other?,
            }
        };

        info!(user = %user_id, addr = %addr, absorbed, "Address linked");
        self.store
            .get_member(&addr)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "member",
                key: addr.to_string(),
            })
    }

    /// One read-then-commit pass of [`Self::link_address`]. Returns whether
    /// a pending member entry was absorbed.
    async fn try_link(&self, user_id: &str, addr: &ChainAddress) -> Result<bool, ServiceError> {
        if self.store.get_member(addr).await?.is_some() {
            return Err(ServiceError::AlreadyLinked {
                what: "address",
                key: addr.to_string(),
            });
        }
        if self.store.get_member_by_user(user_id).await?.is_some() {
            return Err(ServiceError::AlreadyLinked {
                what: "user",
                key: user_id.to_string(),
            });
        }

        let mut link = MemberLink::new(user_id, addr.clone(), self.clock.now_ms());
        let mut batch = MirrorBatch::new();
        if let Some(pending) = self.store.get_pending_member(addr).await? {
            let mut dao = self.store.get_dao().await?.ok_or(ServiceError::NotBootstrapped)?;
            dao.member_count = dao.member_count.saturating_add(1);
            link.is_member = true;
            link.member_details = Some(pending.details);
            batch
                .push(MirrorWrite::Dao(dao))
                .push(MirrorWrite::ClearPendingMember(addr.clone()));
        }
        let absorbed = link.is_member;
        batch.push(MirrorWrite::Member(link));
        self.store.commit(batch).await?;
        Ok(absorbed)
    }

    /// Admin adds a member.
    pub async fn add_member(&self, intent: &AddMemberIntent) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.add_member(intent)?;
        self.require_admin("addMember", &tx.sender).await?;
        Ok(self.prepare("addMember", tx).await)
    }

    /// Member submits a sensor reading.
    pub async fn submit_data(&self, intent: &SubmitDataIntent) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.submit_data(intent)?;
        self.require_member("submitData", &tx.sender).await?;
        Ok(self.prepare("submitData", tx).await)
    }

    /// Member opens a general or configuration proposal. Alert proposals
    /// are rejected.
    pub async fn create_proposal(
        &self,
        intent: &CreateProposalIntent,
    ) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.create_proposal(intent)?;
        self.require_member("createProposal", &tx.sender).await?;
        Ok(self.prepare("createProposal", tx).await)
    }

    /// Member votes. A second vote by the same address is refused when the
    /// mirror already records the first.
    pub async fn vote(&self, intent: &VoteIntent) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.vote(intent)?;
        self.require_member("vote", &tx.sender).await?;

        let proposal_id = parse_id("proposalId", &intent.proposal_id)?;
        if let Some(proposal) = self.store.get_proposal(&proposal_id).await? {
            if proposal.executed {
                return Err(already_executed(&proposal_id));
            }
            if proposal.has_voter(&tx.sender) {
                return Err(ServiceError::AlreadyVoted {
                    proposal: proposal_id.to_string(),
                    voter: tx.sender.clone(),
                });
            }
        }
        Ok(self.prepare("vote", tx).await)
    }

    /// Anyone executes a proposal whose window closed.
    pub async fn execute_proposal(
        &self,
        intent: &ExecuteProposalIntent,
    ) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.execute_proposal(intent)?;
        let proposal_id = parse_id("proposalId", &intent.proposal_id)?;
        if let Some(proposal) = self.store.get_proposal(&proposal_id).await? {
            if proposal.executed {
                return Err(already_executed(&proposal_id));
            }
        }
        Ok(self.prepare("executeProposal", tx).await)
    }

    /// Admin sets a sensor threshold.
    pub async fn update_threshold(
        &self,
        intent: &UpdateThresholdIntent,
    ) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.update_threshold(intent)?;
        self.require_admin("updateThreshold", &tx.sender).await?;
        Ok(self.prepare("updateThreshold", tx).await)
    }

    /// Deposit into the treasury.
    pub async fn add_funds(&self, intent: &AddFundsIntent) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.add_funds(intent)?;
        Ok(self.prepare("addFunds", tx).await)
    }

    /// Fund a milestone escrow.
    pub async fn create_escrow(
        &self,
        intent: &CreateEscrowIntent,
    ) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.create_escrow(intent)?;
        Ok(self.prepare("createEscrow", tx).await)
    }

    /// Payer approves a milestone.
    pub async fn approve_milestone(
        &self,
        intent: &ApproveMilestoneIntent,
    ) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.approve_milestone(intent)?;
        Ok(self.prepare("approveMilestone", tx).await)
    }

    /// Release an approved milestone.
    pub async fn release_milestone(
        &self,
        intent: &ReleaseMilestoneIntent,
    ) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.release_milestone(intent)?;
        Ok(self.prepare("releaseMilestone", tx).await)
    }

    /// Return unreleased escrow funds.
    pub async fn refund_escrow(
        &self,
        intent: &RefundEscrowIntent,
    ) -> Result<PreparedTransaction, ServiceError> {
        let tx = self.builder.refund_escrow(intent)?;
        Ok(self.prepare("refundEscrow", tx).await)
    }

    async fn require_admin(&self, action: &'static str, sender: &ChainAddress) -> Result<(), ServiceError> {
        let dao = self.store.get_dao().await?.ok_or(ServiceError::NotBootstrapped)?;
        if &dao.admin == sender {
            return Ok(());
        }
        Err(ServiceError::Unauthorized {
            action,
            role: "admin",
            sender: sender.clone(),
        })
    }

    /// Members and the admin pass.
    async fn require_member(&self, action: &'static str, sender: &ChainAddress) -> Result<(), ServiceError> {
        if let Some(link) = self.store.get_member(sender).await? {
            if link.is_member {
                return Ok(());
            }
        }
        if let Some(dao) = self.store.get_dao().await? {
            if &dao.admin == sender {
                return Ok(());
            }
        }
        Err(ServiceError::Unauthorized {
            action,
            role: "member",
            sender: sender.clone(),
        })
    }

    async fn prepare(&self, action: &'static str, transaction: BuiltTransaction) -> PreparedTransaction {
        let gas_estimate = if self.estimate_gas {
            self.estimate(action, &transaction).await
        } else {
            None
        };
        debug!(
            action,
            sender = %transaction.sender,
            function = %transaction.call.function,
            gas_estimate = ?gas_estimate,
            "Prepared transaction"
        );
        PreparedTransaction {
            transaction,
            gas_estimate,
        }
    }

    async fn estimate(&self, action: &'static str, transaction: &BuiltTransaction) -> Option<u64> {
        match self.chain.dry_run(&transaction.tx_bytes).await {
            Ok(effects) if effects.success => Some(effects.gas_used.net()),
            Ok(effects) => {
                warn!(action, error = ?effects.error, "Dry run aborted; no gas estimate");
                None
            }
            Err(e) => {
                warn!(action, error = %e, "Dry run failed; no gas estimate");
                None
            }
        }
    }
}

fn already_executed(proposal_id: &ChainAddress) -> ServiceError {
    ServiceError::InvalidInput {
        field: "proposalId",
        reason: format!("proposal {proposal_id} is already executed"),
    }
}
