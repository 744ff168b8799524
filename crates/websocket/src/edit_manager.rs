use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

use domain::errors::{DomainError, DomainResult};
use domain::models::draft::{DraftState, Side};
use domain::models::pending_edit::{EditSlot, PendingEdit, EDIT_TTL_SECS};

use crate::draft_room::RoomRequest;

/// Owns the single pending slot edit of a paused draft room, including its
/// one-shot expiry timer. All calls come from the room's event loop.
pub struct EditManager {
    pending: Option<PendingEdit>,
    expiry_task: Option<JoinHandle<()>>,
    requests: mpsc::Sender<RoomRequest>,
}

impl EditManager {
    pub fn new(requests: mpsc::Sender<RoomRequest>) -> Self {
        Self {
            pending: None,
            expiry_task: None,
            requests,
        }
    }

    pub fn pending(&self) -> Option<&PendingEdit> {
        self.pending.as_ref()
    }

    /// Register a new edit proposal against the current lists. The slot must
    /// exist and the replacement champion may not occupy any other slot.
    pub fn propose(
        &mut self,
        state: &DraftState,
        proposer_user_id: Uuid,
        proposer_side: Side,
        slot: EditSlot,
        new_champion_id: String,
    ) -> DomainResult<PendingEdit> {
        if self.pending.is_some() {
            return Err(DomainError::EditPending);
        }
        let old_champion_id = state.slot_champion(&slot)?;
        state.validate_edit_target(&slot, &new_champion_id)?;

        let edit = PendingEdit::new(
            proposer_user_id,
            proposer_side,
            slot,
            old_champion_id,
            new_champion_id,
        );

        let edit_id = edit.id;
        let requests = self.requests.clone();
        self.expiry_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(EDIT_TTL_SECS as u64)).await;
            let _ = requests.send(RoomRequest::EditExpired { edit_id }).await;
        }));

        self.pending = Some(edit.clone());
        Ok(edit)
    }

    /// Validate a response and take the edit out of the manager. Only the
    /// opposing side may respond, and never the proposer themselves.
    pub fn take_for_response(
        &mut self,
        responder_user_id: Uuid,
        responder_side: Side,
        accept: bool,
    ) -> DomainResult<PendingEdit> {
        let pending = self.pending.as_ref().ok_or(DomainError::NoEdit)?;
        let allowed = responder_user_id != pending.proposer_user_id
            && responder_side == pending.proposer_side.opposite();
        if !allowed {
            return Err(if accept {
                DomainError::InvalidConfirm
            } else {
                DomainError::InvalidReject
            });
        }
        self.cancel_expiry();
        Ok(self.pending.take().expect("checked above"))
    }

    /// Drop the edit if the expired id still matches (a response may have
    /// raced the expiry through the loop).
    pub fn expire(&mut self, edit_id: Uuid) -> Option<PendingEdit> {
        if self.pending.as_ref().map(|e| e.id) == Some(edit_id) {
            self.cancel_expiry();
            return self.pending.take();
        }
        None
    }

    /// Unconditionally clear, e.g. when the draft resumes.
    pub fn clear(&mut self) -> Option<PendingEdit> {
        self.cancel_expiry();
        self.pending.take()
    }

    fn cancel_expiry(&mut self) {
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
    }
}

impl Drop for EditManager {
    fn drop(&mut self) {
        self.cancel_expiry();
    }
}
