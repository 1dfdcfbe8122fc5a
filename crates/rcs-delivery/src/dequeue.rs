// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dequeue scheduler.
//!
//! Resubmits outgoing items left `QUEUED`, plus uploaded HTTP transfers whose
//! file info was never sent, to the transport layer. Items of one scope are
//! handed over oldest first while the scope lock is held. A failure on one
//! item is logged and counted; the pass always moves on to the next item.

use std::collections::HashSet;
use std::sync::Arc;

use rcs_config::model::DeliveryConfig;
use rcs_core::{
    Admission, ChatMessage, Clock, DeliveryStore, DeliveryTransport, DequeueItem, Direction,
    FileTransfer, FileTransferReasonCode, FileTransferState, ItemKind, MessageReasonCode,
    MessageStatus, Predicate, RcsError, Timestamp, TransportError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::expiration::{participant_of, ExpirationMonitor};
use crate::file_transfers::FileTransferStateMachine;
use crate::locks::OperationLocks;
use crate::messages::MessageStateMachine;

/// Tally of one dequeue pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DequeueReport {
    /// Handed to the transport and persisted as in flight.
    pub dequeued: usize,
    /// Admission said "not now"; left queued.
    pub deferred: usize,
    /// Marked `FAILED` because sending is not allowed.
    pub failed: usize,
    /// Transport temporarily unavailable; left queued.
    pub transient: usize,
    /// Unexpected per-item or per-scope errors.
    pub errors: usize,
    /// The pass stopped early on shutdown.
    pub cancelled: bool,
}

impl DequeueReport {
    pub fn merge(&mut self, other: DequeueReport) {
        self.dequeued += other.dequeued;
        self.deferred += other.deferred;
        self.failed += other.failed;
        self.transient += other.transient;
        self.errors += other.errors;
        self.cancelled |= other.cancelled;
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Dequeued => self.dequeued += 1,
            Outcome::Deferred => self.deferred += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Transient => self.transient += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Dequeued,
    Deferred,
    Failed,
    Transient,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    NotAllowed,
    Unexpected,
}

/// Exclusive section an item belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    OneToOne(String),
    Group(String),
}

impl Scope {
    fn key(&self) -> &str {
        match self {
            Self::OneToOne(id) | Self::Group(id) => id,
        }
    }

    fn of(conversation_id: &str, one_to_one: bool) -> Self {
        if one_to_one {
            Self::OneToOne(conversation_id.to_string())
        } else {
            Self::Group(conversation_id.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Selection {
    messages: bool,
    transfers: bool,
}

impl Selection {
    const ALL: Self = Self {
        messages: true,
        transfers: true,
    };
    const FILE_TRANSFERS: Self = Self {
        messages: false,
        transfers: true,
    };
}

enum GroupReadiness {
    Ready,
    NotReady,
    Unusable,
}

#[derive(Clone)]
pub struct DequeueScheduler {
    store: Arc<dyn DeliveryStore>,
    transport: Arc<dyn DeliveryTransport>,
    messages: MessageStateMachine,
    transfers: FileTransferStateMachine,
    expiration: ExpirationMonitor,
    locks: Arc<OperationLocks>,
    clock: Arc<dyn Clock>,
    config: DeliveryConfig,
    cancel: CancellationToken,
}

impl DequeueScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        transport: Arc<dyn DeliveryTransport>,
        messages: MessageStateMachine,
        transfers: FileTransferStateMachine,
        expiration: ExpirationMonitor,
        locks: Arc<OperationLocks>,
        clock: Arc<dyn Clock>,
        config: DeliveryConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            transport,
            messages,
            transfers,
            expiration,
            locks,
            clock,
            config,
            cancel,
        }
    }

    /// Dequeue everything pending for one one-to-one peer.
    pub async fn dequeue_one_to_one(&self, peer: &str) -> Result<DequeueReport, RcsError> {
        if !self.registered() {
            return Ok(DequeueReport::default());
        }
        self.run_scope(&Scope::OneToOne(peer.to_string()), Selection::ALL)
            .await
    }

    /// Dequeue everything pending for one group conversation.
    pub async fn dequeue_group(&self, conversation_id: &str) -> Result<DequeueReport, RcsError> {
        if !self.registered() {
            return Ok(DequeueReport::default());
        }
        self.run_scope(&Scope::Group(conversation_id.to_string()), Selection::ALL)
            .await
    }

    /// Dequeue pending file transfers and file infos of every conversation.
    pub async fn dequeue_file_transfers(&self) -> Result<DequeueReport, RcsError> {
        if !self.registered() {
            return Ok(DequeueReport::default());
        }
        self.run_scopes(Selection::FILE_TRANSFERS).await
    }

    /// Dequeue everything pending in every conversation.
    pub async fn dequeue_all(&self) -> Result<DequeueReport, RcsError> {
        if !self.registered() {
            return Ok(DequeueReport::default());
        }
        self.run_scopes(Selection::ALL).await
    }

    /// Fail every queued outgoing item of a group that can never carry
    /// traffic again. Returns the number of items failed.
    pub async fn fail_queued_group_items(&self, conversation_id: &str) -> Result<usize, RcsError> {
        let messages = self.messages.fail_queued_in_group(conversation_id).await?;
        let transfers = self.transfers.fail_queued_in_group(conversation_id).await?;
        if messages + transfers > 0 {
            info!(
                conversation_id,
                messages, transfers, "queued group items failed"
            );
        }
        Ok(messages + transfers)
    }

    fn registered(&self) -> bool {
        let registered = self.transport.is_registered();
        if !registered {
            debug!("not registered, dequeue skipped");
        }
        registered
    }

    async fn run_scopes(&self, selection: Selection) -> Result<DequeueReport, RcsError> {
        let mut report = DequeueReport::default();
        for scope in self.pending_scopes(selection).await? {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !self.registered() {
                break;
            }
            match self.run_scope(&scope, selection).await {
                Ok(scoped) => report.merge(scoped),
                Err(e) => {
                    error!(scope = scope.key(), error = %e, "dequeue pass failed for scope");
                    report.errors += 1;
                }
            }
        }
        info!(
            dequeued = report.dequeued,
            deferred = report.deferred,
            failed = report.failed,
            transient = report.transient,
            errors = report.errors,
            cancelled = report.cancelled,
            "dequeue pass complete"
        );
        Ok(report)
    }

    async fn run_scope(
        &self,
        scope: &Scope,
        selection: Selection,
    ) -> Result<DequeueReport, RcsError> {
        let _guard = self.locks.lock_scope(scope.key()).await;
        let mut report = DequeueReport::default();

        if let Scope::Group(conversation_id) = scope {
            match self.group_readiness(conversation_id).await? {
                GroupReadiness::Ready => {}
                GroupReadiness::NotReady => return Ok(report),
                GroupReadiness::Unusable => {
                    report.failed += self.fail_queued_group_items(conversation_id).await?;
                    return Ok(report);
                }
            }
        }

        let items = self.pending_items(scope, selection).await?;
        for item in items {
            if self.cancel.is_cancelled() {
                info!(scope = scope.key(), "dequeue pass cancelled");
                report.cancelled = true;
                break;
            }
            if !self.transport.is_registered() {
                debug!(scope = scope.key(), "registration lost, dequeue stopped");
                break;
            }
            let item_id = item.id().to_string();
            match self.process(scope, item).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(item_id = %item_id, error = %e, "dequeue failed for item, continuing");
                    report.errors += 1;
                }
            }
        }
        debug!(scope = scope.key(), ?report, "scope dequeued");
        Ok(report)
    }

    async fn group_readiness(&self, conversation_id: &str) -> Result<GroupReadiness, RcsError> {
        if !self.config.group_chat_enabled {
            debug!(conversation_id, "group chat disabled, dequeue skipped");
            return Ok(GroupReadiness::NotReady);
        }
        let chat = self
            .store
            .get_group_chat(conversation_id)
            .await?
            .ok_or_else(|| RcsError::group_chat_not_found(conversation_id))?;
        if chat.state.is_terminal() {
            return Ok(GroupReadiness::Unusable);
        }
        if chat.rejoin_token.is_some()
            || self.transport.group_session_available(conversation_id).await
        {
            Ok(GroupReadiness::Ready)
        } else {
            debug!(conversation_id, "no group session available, dequeue skipped");
            Ok(GroupReadiness::NotReady)
        }
    }

    /// Conversations with pending items, in order of their oldest item.
    async fn pending_scopes(&self, selection: Selection) -> Result<Vec<Scope>, RcsError> {
        let mut pending: Vec<(Timestamp, Scope)> = Vec::new();
        if selection.messages {
            for m in self.messages.query(&queued_messages(Predicate::True)).await? {
                pending.push((m.created_at, Scope::of(&m.conversation_id, m.is_one_to_one())));
            }
        }
        if selection.transfers {
            for ft in self
                .transfers
                .query(&pending_transfers(Predicate::True))
                .await?
            {
                pending.push((ft.created_at, Scope::of(&ft.conversation_id, ft.is_one_to_one())));
            }
        }
        pending.sort_by_key(|(created_at, _)| *created_at);

        let mut seen = HashSet::new();
        Ok(pending
            .into_iter()
            .filter_map(|(_, scope)| seen.insert(scope.clone()).then_some(scope))
            .collect())
    }

    /// Pending items of one scope, oldest first.
    async fn pending_items(
        &self,
        scope: &Scope,
        selection: Selection,
    ) -> Result<Vec<DequeueItem>, RcsError> {
        let (shape_m, shape_ft) = match scope {
            Scope::OneToOne(peer) => (
                Predicate::OneToOne.and(Predicate::ConversationIs(peer.clone())),
                Predicate::OneToOne.and(Predicate::ConversationIs(peer.clone())),
            ),
            Scope::Group(conversation_id) => (
                Predicate::Group.and(Predicate::ConversationIs(conversation_id.clone())),
                Predicate::Group.and(Predicate::ConversationIs(conversation_id.clone())),
            ),
        };

        let mut items: Vec<(Timestamp, DequeueItem)> = Vec::new();
        if selection.messages {
            for m in self.messages.query(&queued_messages(shape_m)).await? {
                items.push((m.created_at, DequeueItem::Message(m)));
            }
        }
        if selection.transfers {
            for ft in self.transfers.query(&pending_transfers(shape_ft)).await? {
                let created_at = ft.created_at;
                let item = if ft.state == FileTransferState::Started {
                    DequeueItem::FileInfo(ft)
                } else {
                    DequeueItem::FileTransfer(ft)
                };
                items.push((created_at, item));
            }
        }
        items.sort_by(|(a_ts, a), (b_ts, b)| a_ts.cmp(b_ts).then_with(|| a.id().cmp(b.id())));
        Ok(items.into_iter().map(|(_, item)| item).collect())
    }

    async fn process(&self, scope: &Scope, item: DequeueItem) -> Result<Outcome, RcsError> {
        match self.transport.admission(&item).await {
            Admission::Allowed => {}
            Admission::Deferred => {
                debug!(item_id = %item.id(), "admission deferred");
                return Ok(Outcome::Deferred);
            }
            Admission::Forbidden => {
                warn!(item_id = %item.id(), "admission forbidden, failing item");
                self.fail(&item, Failure::NotAllowed).await?;
                return Ok(Outcome::Failed);
            }
        }

        let now = self.clock.now_millis();
        let item = retimestamp(item, now);
        let sent = match scope {
            Scope::OneToOne(_) => self.transport.dequeue_one_to_one(&item).await,
            Scope::Group(conversation_id) => {
                self.transport.dequeue_group(conversation_id, &item).await
            }
        };

        match sent {
            Ok(()) => {
                self.commit(&item, now).await?;
                Ok(Outcome::Dequeued)
            }
            Err(TransportError::Transient(reason)) => {
                debug!(item_id = %item.id(), %reason, "transient transport failure, left queued");
                Ok(Outcome::Transient)
            }
            Err(TransportError::Terminal { message }) => {
                warn!(item_id = %item.id(), %message, "sending not allowed, failing item");
                self.fail(&item, Failure::NotAllowed).await?;
                Ok(Outcome::Failed)
            }
            Err(e @ TransportError::Unexpected(_)) => {
                if let Err(fail_err) = self.fail(&item, Failure::Unexpected).await {
                    error!(item_id = %item.id(), error = %fail_err, "could not fail item");
                }
                Err(e.into())
            }
        }
    }

    /// Persist the in-flight state after a successful hand-over.
    async fn commit(&self, item: &DequeueItem, now: Timestamp) -> Result<(), RcsError> {
        match item {
            DequeueItem::Message(m) => {
                let rows = self.messages.dequeue(&m.id, now, now).await?;
                if rows > 0 && m.is_one_to_one() {
                    self.arm_deadline(ItemKind::Message, &m.id, m_participant(m), now)
                        .await?;
                }
            }
            DequeueItem::FileTransfer(ft) => {
                self.transfers.dequeue(&ft.id, now, now).await?;
            }
            DequeueItem::FileInfo(ft) => {
                let deadline = if ft.is_one_to_one() {
                    self.expiration.deadline_for(now)
                } else {
                    0
                };
                let rows = self.transfers.file_info_dequeued(&ft.id, deadline).await?;
                if rows > 0 && deadline > 0 {
                    self.expiration
                        .schedule_deadline(
                            ItemKind::FileTransfer,
                            &ft.id,
                            ft_participant(ft),
                            deadline,
                        )
                        .await?;
                }
            }
        }
        debug!(item_id = %item.id(), "item dequeued");
        Ok(())
    }

    async fn arm_deadline(
        &self,
        kind: ItemKind,
        item_id: &str,
        participant: &str,
        sent_at: Timestamp,
    ) -> Result<(), RcsError> {
        let deadline = self.expiration.deadline_for(sent_at);
        if deadline > 0 {
            self.expiration
                .schedule_deadline(kind, item_id, participant, deadline)
                .await?;
        }
        Ok(())
    }

    async fn fail(&self, item: &DequeueItem, failure: Failure) -> Result<usize, RcsError> {
        match item {
            DequeueItem::Message(m) => {
                self.messages
                    .transition_from(
                        &m.id,
                        &[MessageStatus::Queued],
                        MessageStatus::Failed,
                        MessageReasonCode::FailedSend,
                    )
                    .await
            }
            DequeueItem::FileTransfer(ft) | DequeueItem::FileInfo(ft) => {
                let from = if matches!(item, DequeueItem::FileInfo(_)) {
                    FileTransferState::Started
                } else {
                    FileTransferState::Queued
                };
                let reason = match failure {
                    Failure::NotAllowed => FileTransferReasonCode::FailedNotAllowedToSend,
                    Failure::Unexpected => FileTransferReasonCode::FailedInitiation,
                };
                self.transfers
                    .transition_from(&ft.id, &[from], FileTransferState::Failed, reason)
                    .await
            }
        }
    }
}

fn queued_messages(shape: Predicate<MessageStatus>) -> Predicate<MessageStatus> {
    shape
        .and(Predicate::DirectionIs(Direction::Outgoing))
        .and(Predicate::state(MessageStatus::Queued))
}

/// Queued transfers plus uploaded HTTP transfers awaiting their file info.
fn pending_transfers(shape: Predicate<FileTransferState>) -> Predicate<FileTransferState> {
    shape
        .and(Predicate::DirectionIs(Direction::Outgoing))
        .and(Predicate::Any(vec![
            Predicate::state(FileTransferState::Queued),
            Predicate::state(FileTransferState::Started).and(Predicate::DownloadUriSet),
        ]))
}

/// Items are handed over with their queue time replaced by the send time.
fn retimestamp(item: DequeueItem, now: Timestamp) -> DequeueItem {
    match item {
        DequeueItem::Message(m) => DequeueItem::Message(ChatMessage {
            created_at: now,
            sent_at: now,
            ..m
        }),
        DequeueItem::FileTransfer(ft) => DequeueItem::FileTransfer(FileTransfer {
            created_at: now,
            sent_at: now,
            ..ft
        }),
        info @ DequeueItem::FileInfo(_) => info,
    }
}

fn m_participant(m: &ChatMessage) -> &str {
    participant_of(&m.remote_participant, &m.conversation_id)
}

fn ft_participant(ft: &FileTransfer) -> &str {
    participant_of(&ft.remote_participant, &ft.conversation_id)
}
