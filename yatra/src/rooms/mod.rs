//! Room allotment.
//!
//! [`board`] classifies travellers, [`allotment`] plans rooms, and
//! [`RoomAllotmentService`] writes plans back one registration at a time.
//! The per-registration updates of a batch run concurrently and are not
//! atomic as a whole: when some fail, the rest stay applied and the caller
//! gets [`YatraError::BatchIncomplete`].

pub mod allotment;
pub mod board;
pub mod naming;

pub use allotment::{PlanKind, PlannedRoom, RoomPlan, plan_removal, plan_standard, plan_two_sharing};
pub use board::{AssignedRoom, BoardMember, FamilyGroup, RoomBoard};

use crate::context::YatraContext;
use crate::error::{Result, YatraError};
use crate::repository::value_of;
use crate::types::MemberKey;
use futures::future::join_all;
use serde_json::Value;
use yatra_core::document::{Collection, DocumentId, Fields};

/// Loads the board and commits room plans for one tenant.
pub struct RoomAllotmentService<'c> {
    ctx: &'c YatraContext,
}

impl<'c> RoomAllotmentService<'c> {
    /// Service bound to `ctx`
    #[must_use]
    pub const fn new(ctx: &'c YatraContext) -> Self {
        Self { ctx }
    }

    /// Current board, built from a fresh registrations read
    ///
    /// # Errors
    ///
    /// Store failures, or [`YatraError::Decode`] when any registration is
    /// unreadable.
    pub async fn board(&self) -> Result<RoomBoard> {
        let registrations = self.ctx.repository().registrations_complete().await?;
        Ok(RoomBoard::from_registrations(&registrations))
    }

    /// Put the selected travellers into standard rooms of three.
    ///
    /// # Errors
    ///
    /// See [`plan_standard`]; nothing is written on those errors. Failed
    /// writes yield [`YatraError::BatchIncomplete`].
    pub async fn assign_standard(
        &self,
        selection: &[MemberKey],
        base_name: Option<&str>,
    ) -> Result<RoomPlan> {
        let board = self.board().await?;
        let plan = plan_standard(&board, selection, base_name)?;
        self.commit(&plan).await?;
        Ok(plan)
    }

    /// Pair every waiting two-sharing traveller.
    ///
    /// # Errors
    ///
    /// Store failures, or [`YatraError::BatchIncomplete`].
    pub async fn auto_assign_two_sharing(&self) -> Result<RoomPlan> {
        let board = self.board().await?;
        let plan = plan_two_sharing(&board);
        if plan.is_empty() {
            tracing::info!("No two-sharing travellers waiting for a room");
            return Ok(plan);
        }
        self.commit(&plan).await?;
        Ok(plan)
    }

    /// Take one traveller out of their room.
    ///
    /// # Errors
    ///
    /// [`YatraError::Validation`] for an unknown or roomless traveller, or
    /// the store error.
    pub async fn remove_from_room(&self, key: &MemberKey) -> Result<()> {
        let board = self.board().await?;
        let plan = plan_removal(&board, key)?;
        self.commit(&plan).await
    }

    async fn commit(&self, plan: &RoomPlan) -> Result<()> {
        let now = Value::String(self.ctx.clock.now().to_rfc3339());
        let mut writes = Vec::with_capacity(plan.updates.len());
        for (id, members) in &plan.updates {
            let mut fields = Fields::new();
            fields.insert("members".into(), value_of(members)?);
            fields.insert("updatedAt".into(), now.clone());
            writes.push(async move {
                let outcome = self
                    .ctx
                    .store
                    .update(Collection::REGISTRATIONS, id, fields)
                    .await;
                (id.clone(), outcome)
            });
        }

        let mut applied: Vec<DocumentId> = Vec::new();
        let mut failed = Vec::new();
        for (id, outcome) in join_all(writes).await {
            match outcome {
                Ok(()) => applied.push(id),
                Err(err) => {
                    tracing::error!(registration_id = %id, error = %err, "Room update failed");
                    failed.push((id, err));
                },
            }
        }

        let kind = plan.kind.as_str();
        if !failed.is_empty() {
            metrics::counter!("yatra_room_update_failures_total", "kind" => kind)
                .increment(failed.len() as u64);
            return Err(YatraError::BatchIncomplete { applied, failed });
        }

        metrics::counter!("yatra_rooms_assigned_total", "kind" => kind)
            .increment(plan.rooms.len() as u64);
        tracing::info!(
            kind,
            rooms = plan.rooms.len(),
            travellers = plan.placed(),
            registrations = applied.len(),
            "Room plan committed"
        );
        Ok(())
    }
}
