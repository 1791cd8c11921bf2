//! Room board: every traveller classified as assigned, waiting for a
//! standard room, or waiting for a two-sharing room.

use crate::types::{Member, MemberKey, RegistrationRecord};
use std::cmp::Ordering;
use std::collections::HashMap;
use yatra_core::document::DocumentId;

/// A traveller as seen by the board.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardMember {
    /// Position of the traveller
    pub key: MemberKey,
    /// Traveller data
    pub member: Member,
    /// Registration's primary contact
    pub primary_contact: String,
    /// Registration's family key
    pub family_id: String,
}

impl BoardMember {
    /// Package label, or "Unknown"
    #[must_use]
    pub fn package(&self) -> &str {
        self.member.package()
    }
}

/// An occupied room.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignedRoom {
    /// Room name
    pub room_number: String,
    /// Occupants, in board order
    pub members: Vec<BoardMember>,
    /// At least one occupant opted into two-sharing
    pub is_two_sharing: bool,
}

impl AssignedRoom {
    /// Package of the room: that of its first occupant
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.members.first().map(BoardMember::package)
    }
}

/// Unassigned standard travellers of one registration.
#[derive(Clone, Debug, PartialEq)]
pub struct FamilyGroup {
    /// Registration id
    pub registration_id: DocumentId,
    /// Primary contact
    pub primary_contact: String,
    /// Family key
    pub family_id: String,
    /// Waiting travellers
    pub members: Vec<BoardMember>,
}

/// Snapshot of room assignments across all registrations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomBoard {
    assigned: Vec<AssignedRoom>,
    unassigned_standard: Vec<FamilyGroup>,
    unassigned_two_sharing: Vec<BoardMember>,
    members: HashMap<MemberKey, BoardMember>,
    registrations: HashMap<DocumentId, RegistrationRecord>,
}

impl RoomBoard {
    /// Classify every member of `registrations`.
    ///
    /// Registration order is kept for the waiting lists; rooms are sorted by
    /// name in natural order (`RM-2` before `RM-10`).
    #[must_use]
    pub fn from_registrations(registrations: &[RegistrationRecord]) -> Self {
        let mut board = Self::default();
        let mut room_index: HashMap<String, usize> = HashMap::new();
        let mut group_index: HashMap<DocumentId, usize> = HashMap::new();

        for registration in registrations {
            for (index, member) in registration.members.iter().enumerate() {
                let entry = BoardMember {
                    key: MemberKey::new(registration.id.clone(), index),
                    member: member.clone(),
                    primary_contact: registration.name.clone(),
                    family_id: registration.family_key().to_string(),
                };
                board.members.insert(entry.key.clone(), entry.clone());

                if let Some(room) = member.room() {
                    let slot = *room_index.entry(room.to_string()).or_insert_with(|| {
                        board.assigned.push(AssignedRoom {
                            room_number: room.to_string(),
                            members: Vec::new(),
                            is_two_sharing: false,
                        });
                        board.assigned.len() - 1
                    });
                    let target = &mut board.assigned[slot];
                    target.is_two_sharing |= member.is_two_sharing;
                    target.members.push(entry);
                } else if member.is_two_sharing {
                    board.unassigned_two_sharing.push(entry);
                } else {
                    let slot = *group_index.entry(registration.id.clone()).or_insert_with(|| {
                        board.unassigned_standard.push(FamilyGroup {
                            registration_id: registration.id.clone(),
                            primary_contact: registration.name.clone(),
                            family_id: registration.family_key().to_string(),
                            members: Vec::new(),
                        });
                        board.unassigned_standard.len() - 1
                    });
                    board.unassigned_standard[slot].members.push(entry);
                }
            }
            board
                .registrations
                .insert(registration.id.clone(), registration.clone());
        }

        board
            .assigned
            .sort_by(|a, b| natural_cmp(&a.room_number, &b.room_number));
        board
    }

    /// Occupied rooms, natural order
    #[must_use]
    pub fn assigned_rooms(&self) -> &[AssignedRoom] {
        &self.assigned
    }

    /// Standard travellers without a room, grouped by registration
    #[must_use]
    pub fn unassigned_standard(&self) -> &[FamilyGroup] {
        &self.unassigned_standard
    }

    /// Two-sharing travellers without a room
    #[must_use]
    pub fn unassigned_two_sharing(&self) -> &[BoardMember] {
        &self.unassigned_two_sharing
    }

    /// Look a traveller up
    #[must_use]
    pub fn member(&self, key: &MemberKey) -> Option<&BoardMember> {
        self.members.get(key)
    }

    /// Look a room up by name
    #[must_use]
    pub fn room(&self, room_number: &str) -> Option<&AssignedRoom> {
        self.assigned.iter().find(|r| r.room_number == room_number)
    }

    /// Names of all occupied rooms
    pub fn room_numbers(&self) -> impl Iterator<Item = &str> {
        self.assigned.iter().map(|r| r.room_number.as_str())
    }

    /// Registration as captured by this board
    #[must_use]
    pub fn registration(&self, id: &DocumentId) -> Option<&RegistrationRecord> {
        self.registrations.get(id)
    }
}

/// Compare strings treating digit runs as numbers.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = take_digits(&mut left);
                let rhs = take_digits(&mut right);
                let lhs_trimmed = lhs.trim_start_matches('0');
                let rhs_trimmed = rhs.trim_start_matches('0');
                let ord = lhs_trimmed
                    .len()
                    .cmp(&rhs_trimmed.len())
                    .then_with(|| lhs_trimmed.cmp(rhs_trimmed))
                    .then_with(|| lhs.len().cmp(&rhs.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            },
            (Some(x), Some(y)) => {
                let ord = x
                    .to_lowercase()
                    .cmp(y.to_lowercase())
                    .then_with(|| x.cmp(&y));
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            },
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn member(name: &str, room: Option<&str>, two_sharing: bool) -> Member {
        Member {
            room_number: room.map(str::to_string),
            is_two_sharing: two_sharing,
            package_name: Some("Standard".into()),
            ..Member::named(name)
        }
    }

    fn registration(id: &str, members: Vec<Member>) -> RegistrationRecord {
        RegistrationRecord {
            id: id.into(),
            name: format!("Contact {id}"),
            members,
            ..RegistrationRecord::default()
        }
    }

    #[test]
    fn natural_order_compares_numbers_by_value() {
        let mut rooms = vec!["RM-10", "RM-2", "2SH-01", "RM-01"];
        rooms.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(rooms, vec!["2SH-01", "RM-01", "RM-2", "RM-10"]);
    }

    #[test]
    fn classifies_every_member() {
        let board = RoomBoard::from_registrations(&[
            registration(
                "r1",
                vec![
                    member("A", Some("RM-10"), false),
                    member("B", None, false),
                    member("C", None, true),
                ],
            ),
            registration("r2", vec![member("D", Some("RM-2"), true), member("E", Some(""), false)]),
        ]);

        let rooms: Vec<_> = board.room_numbers().collect();
        assert_eq!(rooms, vec!["RM-2", "RM-10"]);
        assert!(board.room("RM-2").unwrap().is_two_sharing);
        assert!(!board.room("RM-10").unwrap().is_two_sharing);

        let groups: Vec<_> = board
            .unassigned_standard()
            .iter()
            .map(|g| (g.registration_id.as_str(), g.members.len()))
            .collect();
        assert_eq!(groups, vec![("r1", 1), ("r2", 1)]);

        assert_eq!(board.unassigned_two_sharing().len(), 1);
        assert_eq!(board.unassigned_two_sharing()[0].key, MemberKey::new("r1", 2));
        assert_eq!(board.member(&MemberKey::new("r2", 1)).unwrap().member.name, "E");
    }

    #[test]
    fn family_id_defaults_to_registration_id() {
        let mut with_family = registration("r2", vec![member("B", None, false)]);
        with_family.family_id = Some("fam".into());
        let board =
            RoomBoard::from_registrations(&[registration("r1", vec![member("A", None, false)]), with_family]);
        assert_eq!(board.unassigned_standard()[0].family_id, "r1");
        assert_eq!(board.unassigned_standard()[1].family_id, "fam");
    }
}
