//! Player cancel requests and their admin review.
//!
//! A request never moves money on its own. Approval runs the refund primitive
//! and the request's status write in one unit of work, so an approved request
//! always comes with its refund and vice versa.

use serde::{Deserialize, Serialize};
use serde_json::json;
use stakematch_settlement::{RefundCause, RefundOutcome, refund};
use stakematch_types::{
    Actor, AdminActionDraft, AdminActionKind, CancelDecision, CancelReason, CancelRequest,
    CancelRequestId, CancelRequestStatus, DisputeEntry, DisputeType, EvidenceRef, MatchId,
    Notification, NotificationEvent, Result, StakematchError, TargetType, UserId, risk_score,
};

use crate::engine::Engine;

/// The reviewed request plus the refund approval triggered, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResolution {
    pub request: CancelRequest,
    /// `None` for rejections and for approvals of an already-finished match.
    pub refund: Option<RefundOutcome>,
}

impl Engine {
    /// File a cancel request for `match_id`.
    ///
    /// # Errors
    /// - `NotParticipant` if `requested_by` is not seated in the match
    /// - `MatchAlreadyTerminal` if the match already finished
    /// - `DuplicatePendingRequest` if another request is still pending
    pub fn request_cancellation(
        &self,
        match_id: MatchId,
        requested_by: UserId,
        reason: CancelReason,
        details: Option<String>,
        evidence: Option<EvidenceRef>,
    ) -> Result<CancelRequest> {
        let evidence = evidence.filter(|e| !e.is_blank());
        let request = self.transact("request_cancellation", |uow| {
            let mut game = uow.load_match(match_id)?;
            if !game.is_participant(requested_by) {
                return Err(StakematchError::NotParticipant {
                    match_id,
                    user: requested_by,
                });
            }
            if game.status.is_terminal() {
                return Err(StakematchError::MatchAlreadyTerminal {
                    match_id,
                    status: game.status,
                });
            }
            if game.pending_cancel.is_some() {
                return Err(StakematchError::DuplicatePendingRequest(match_id));
            }
            let request = CancelRequest::pending(
                match_id,
                requested_by,
                reason,
                details.clone(),
                evidence.clone(),
                uow.now(),
            );
            game.pending_cancel = Some(request.id);
            uow.put_match(game)?;
            uow.insert_cancel_request(request.clone());
            Ok(request)
        })?;

        tracing::info!(
            %match_id,
            user = %requested_by,
            request_id = %request.id,
            %reason,
            "cancel request filed"
        );

        let severity = reason.severity();
        self.best_effort("record_cancel_dispute", |uow| {
            let prior = uow.store().dispute_count_for(requested_by)?;
            uow.insert_dispute(DisputeEntry::open(
                requested_by,
                DisputeType::CancelRequest,
                Some(match_id),
                severity,
                risk_score(severity, prior),
                json!({
                    "request_id": request.id,
                    "reason": reason,
                    "details": request.details,
                    "evidence": request.evidence,
                }),
                uow.now(),
            ));
            Ok(())
        });
        Ok(request)
    }

    /// Approve or reject a pending cancel request.
    ///
    /// # Errors
    /// - `Forbidden` unless `actor` is an admin
    /// - `CancelRequestNotPending` if it was already reviewed
    pub fn resolve_cancel_request(
        &self,
        actor: &Actor,
        request_id: CancelRequestId,
        decision: CancelDecision,
        note: Option<String>,
    ) -> Result<CancelResolution> {
        let admin = actor.require_admin("resolving a cancel request")?;
        let resolution = self.transact("resolve_cancel_request", |uow| {
            let mut request = uow.load_cancel_request(request_id)?;
            if !request.is_pending() {
                return Err(StakematchError::CancelRequestNotPending {
                    request_id,
                    status: request.status,
                });
            }
            let game = uow.load_match(request.match_id)?;

            let refunded = match decision {
                CancelDecision::Approve if !game.status.is_terminal() => Some(refund(
                    uow,
                    game.id,
                    RefundCause::CancelApproved { request_id },
                )?),
                CancelDecision::Approve | CancelDecision::Reject => None,
            };

            let mut game = uow.load_match(request.match_id)?;
            if game.pending_cancel == Some(request_id) {
                game.pending_cancel = None;
                uow.put_match(game)?;
            }

            request.status = match decision {
                CancelDecision::Approve => CancelRequestStatus::Approved,
                CancelDecision::Reject => CancelRequestStatus::Rejected,
            };
            request.reviewed_by = Some(admin);
            request.review_note.clone_from(&note);
            request.reviewed_at = Some(uow.now());
            uow.put_cancel_request(request.clone())?;
            uow.notify(Notification::new(
                request.requested_by,
                NotificationEvent::CancelRequestResolved,
                None,
                request_id,
            ));
            Ok(CancelResolution {
                request,
                refund: refunded,
            })
        })?;

        let request = &resolution.request;
        tracing::info!(
            %request_id,
            match_id = %request.match_id,
            admin = %admin,
            status = %request.status,
            refunded = resolution.refund.as_ref().map(|r| r.total().get()),
            "cancel request resolved"
        );

        let action = match decision {
            CancelDecision::Approve => AdminActionKind::ApproveCancelRequest,
            CancelDecision::Reject => AdminActionKind::RejectCancelRequest,
        };
        let details = json!({
            "match_id": request.match_id,
            "note": note,
            "refund": resolution.refund,
        });
        self.best_effort("audit_cancel_resolution", |uow| {
            uow.record_admin_action(AdminActionDraft {
                admin_id: admin,
                action,
                target_type: TargetType::CancelRequest,
                target_id: request_id.to_string(),
                details: details.clone(),
                timestamp: uow.now(),
            });
            Ok(())
        });
        Ok(resolution)
    }
}
