//! Room allotment planning.
//!
//! Planning is pure: it reads a [`RoomBoard`] and produces a [`RoomPlan`]
//! listing the rooms to fill and, per registration, the member list to
//! write. [`crate::rooms::RoomAllotmentService`] commits plans.

use super::board::{BoardMember, RoomBoard};
use super::naming::{self, STANDARD_PREFIX, TWO_SHARING_PREFIX};
use crate::error::{Result, YatraError};
use crate::types::{Member, MemberKey};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap, HashSet};
use yatra_core::document::DocumentId;

/// Travellers per standard room.
pub const STANDARD_ROOM_SIZE: usize = 3;

/// Travellers per two-sharing room.
pub const TWO_SHARING_ROOM_SIZE: usize = 2;

/// Occupants of one planned room.
pub type Occupants = SmallVec<[MemberKey; STANDARD_ROOM_SIZE]>;

/// Which packer produced a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanKind {
    /// Admin-selected groups of three
    Standard,
    /// Automatic pairing of two-sharing travellers
    TwoSharing,
    /// Clearing one traveller's room
    Removal,
}

impl PlanKind {
    /// Metric/log label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::TwoSharing => "two_sharing",
            Self::Removal => "removal",
        }
    }
}

/// A room to be filled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedRoom {
    /// Room name
    pub room_number: String,
    /// Package of its occupants
    pub package: String,
    /// Travellers going in
    pub occupants: Occupants,
}

/// Rooms to fill plus the resulting member list of every touched registration.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomPlan {
    /// Which packer produced the plan
    pub kind: PlanKind,
    /// Rooms, in name order of generation
    pub rooms: Vec<PlannedRoom>,
    /// New `members` for each touched registration
    pub updates: BTreeMap<DocumentId, Vec<Member>>,
}

impl RoomPlan {
    fn new(kind: PlanKind) -> Self {
        Self {
            kind,
            rooms: Vec::new(),
            updates: BTreeMap::new(),
        }
    }

    /// Nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Travellers placed by the plan
    #[must_use]
    pub fn placed(&self) -> usize {
        self.rooms.iter().map(|r| r.occupants.len()).sum()
    }

    /// Set (or clear, with `None`) the room of `key`.
    fn assign(&mut self, board: &RoomBoard, key: &MemberKey, room: Option<&str>) -> Result<()> {
        if !self.updates.contains_key(&key.registration_id) {
            let registration = board.registration(&key.registration_id).ok_or_else(|| {
                YatraError::validation(format!("registration {} is not on the board", key.registration_id))
            })?;
            self.updates
                .insert(key.registration_id.clone(), registration.members.clone());
        }
        let member = self
            .updates
            .get_mut(&key.registration_id)
            .and_then(|members| members.get_mut(key.index))
            .ok_or_else(|| YatraError::validation(format!("traveller {key} is not on the board")))?;
        member.room_number = room.map(str::to_string);
        Ok(())
    }
}

/// Plan standard rooms for an admin selection.
///
/// The selection is split in order into rooms of three. Without a
/// `base_name` rooms continue the `RM-NN` sequence; with one they are named
/// after it (see [`naming::from_base`]).
///
/// # Errors
///
/// - [`YatraError::Validation`] if the selection is empty, not a multiple
///   of three, repeats or misses a traveller, or spans packages
/// - [`YatraError::Conflict`] if a target room holds another package
pub fn plan_standard(
    board: &RoomBoard,
    selection: &[MemberKey],
    base_name: Option<&str>,
) -> Result<RoomPlan> {
    if selection.is_empty() || selection.len() % STANDARD_ROOM_SIZE != 0 {
        return Err(YatraError::validation(format!(
            "select a multiple of {STANDARD_ROOM_SIZE} travellers (selected {})",
            selection.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut selected: Vec<&BoardMember> = Vec::with_capacity(selection.len());
    for key in selection {
        if !seen.insert(key) {
            return Err(YatraError::validation(format!("traveller {key} selected twice")));
        }
        let member = board
            .member(key)
            .ok_or_else(|| YatraError::validation(format!("traveller {key} is not on the board")))?;
        selected.push(member);
    }

    let package = selected[0].package().to_string();
    if let Some(other) = selected.iter().find(|m| m.package() != package) {
        return Err(YatraError::validation(format!(
            "cannot mix packages in one batch: '{package}' and '{}'",
            other.package()
        )));
    }

    let room_count = selection.len() / STANDARD_ROOM_SIZE;
    let names = match base_name.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => naming::from_base(base, room_count),
        None => naming::next_sequential(board.room_numbers(), STANDARD_PREFIX, room_count),
    };

    for name in &names {
        if let Some(existing) = board.room(name).and_then(|room| room.package()) {
            if existing != package {
                return Err(YatraError::Conflict {
                    room: name.clone(),
                    existing_package: existing.to_string(),
                    incoming_package: package,
                });
            }
        }
    }

    let mut plan = RoomPlan::new(PlanKind::Standard);
    for (name, group) in names.into_iter().zip(selection.chunks(STANDARD_ROOM_SIZE)) {
        for key in group {
            plan.assign(board, key, Some(&name))?;
        }
        plan.rooms.push(PlannedRoom {
            room_number: name,
            package: package.clone(),
            occupants: group.iter().cloned().collect(),
        });
    }
    Ok(plan)
}

/// Plan rooms for every waiting two-sharing traveller.
///
/// Travellers are grouped by family and package in board order. Each group
/// is paired in order; an odd one out gets a room alone. Groups never
/// share a room. Rooms continue the `2SH-NN` sequence.
#[must_use]
pub fn plan_two_sharing(board: &RoomBoard) -> RoomPlan {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), Vec<&BoardMember>> = HashMap::new();
    for member in board.unassigned_two_sharing() {
        let key = (member.family_id.clone(), member.package().to_string());
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(member);
    }

    let pairs: Vec<(&str, Vec<&BoardMember>)> = order
        .iter()
        .filter_map(|key| groups.get(key).map(|members| (key.1.as_str(), members)))
        .flat_map(|(package, members)| {
            members
                .chunks(TWO_SHARING_ROOM_SIZE)
                .map(move |pair| (package, pair.to_vec()))
        })
        .collect();

    let names = naming::next_sequential(board.room_numbers(), TWO_SHARING_PREFIX, pairs.len());

    let mut plan = RoomPlan::new(PlanKind::TwoSharing);
    for (name, (package, pair)) in names.into_iter().zip(pairs) {
        for member in &pair {
            // Keys come from the board itself, so assignment cannot miss.
            if plan.assign(board, &member.key, Some(&name)).is_err() {
                tracing::warn!(member = %member.key, "Two-sharing traveller vanished from board");
            }
        }
        plan.rooms.push(PlannedRoom {
            room_number: name,
            package: package.to_string(),
            occupants: pair.iter().map(|m| m.key.clone()).collect(),
        });
    }
    plan
}

/// Plan clearing the room of one traveller.
///
/// # Errors
///
/// [`YatraError::Validation`] if the traveller is not on the board or has
/// no room.
pub fn plan_removal(board: &RoomBoard, key: &MemberKey) -> Result<RoomPlan> {
    let member = board
        .member(key)
        .ok_or_else(|| YatraError::validation(format!("traveller {key} is not on the board")))?;
    if member.member.room().is_none() {
        return Err(YatraError::validation(format!(
            "{} has no room to leave",
            member.member.name
        )));
    }
    let mut plan = RoomPlan::new(PlanKind::Removal);
    plan.assign(board, key, None)?;
    Ok(plan)
}
