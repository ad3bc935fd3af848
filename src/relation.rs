use crate::error::{SimError, SimResult};
use crate::network::PersonId;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerKind {
    Casual,
    Stable,
}

/// One side of a partnership, held by each of the two partners.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub kind: PartnerKind,
    /// Time at which the partnership is scheduled to end.
    pub end: u32,
    /// Whether the holder initiated the partnership.
    pub initiator: bool,
    /// Last pass that processed this edge, shared by both records.
    pub visited: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PartnerList {
    map: IndexMap<PersonId, Relation>,
}

impl PartnerList {
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, id: PersonId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn get(&self, id: PersonId) -> Option<&Relation> {
        self.map.get(&id)
    }

    /// Partner at position `index` in insertion order.
    pub fn get_index(&self, index: usize) -> SimResult<(PersonId, &Relation)> {
        self.map
            .get_index(index)
            .map(|(&id, rel)| (id, rel))
            .ok_or(SimError::IndexOutOfRange {
                index,
                len: self.map.len(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonId, &Relation)> + '_ {
        self.map.iter().map(|(&id, rel)| (id, rel))
    }

    pub fn ids(&self) -> impl Iterator<Item = PersonId> + '_ {
        self.map.keys().copied()
    }

    pub fn count(&self, kind: PartnerKind) -> usize {
        self.map.values().filter(|rel| rel.kind == kind).count()
    }

    pub(crate) fn get_mut(&mut self, id: PersonId) -> Option<&mut Relation> {
        self.map.get_mut(&id)
    }

    /// Returns `false` without side effects if `id` is already present.
    pub(crate) fn insert(&mut self, id: PersonId, rel: Relation) -> bool {
        if self.map.contains_key(&id) {
            return false;
        }
        self.map.insert(id, rel);
        true
    }

    pub(crate) fn remove(&mut self, id: PersonId) -> Option<Relation> {
        self.map.shift_remove(&id)
    }

    pub(crate) fn drain(&mut self) -> Vec<(PersonId, Relation)> {
        self.map.drain(..).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FriendList {
    set: IndexSet<PersonId>,
}

impl FriendList {
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, id: PersonId) -> bool {
        self.set.contains(&id)
    }

    pub fn get_index(&self, index: usize) -> SimResult<PersonId> {
        self.set
            .get_index(index)
            .copied()
            .ok_or(SimError::IndexOutOfRange {
                index,
                len: self.set.len(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = PersonId> + '_ {
        self.set.iter().copied()
    }

    pub(crate) fn insert(&mut self, id: PersonId) -> bool {
        self.set.insert(id)
    }

    pub(crate) fn remove(&mut self, id: PersonId) -> bool {
        self.set.shift_remove(&id)
    }

    pub(crate) fn drain(&mut self) -> Vec<PersonId> {
        self.set.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(kind: PartnerKind) -> Relation {
        Relation {
            kind,
            end: 10,
            initiator: true,
            visited: 0,
        }
    }

    #[test]
    fn partner_list_has_set_semantics() {
        let mut list = PartnerList::default();
        assert!(list.insert(PersonId(3), rel(PartnerKind::Casual)));
        assert!(!list.insert(PersonId(3), rel(PartnerKind::Stable)));
        assert!(list.insert(PersonId(1), rel(PartnerKind::Stable)));

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(PersonId(3)).map(|r| r.kind), Some(PartnerKind::Casual));
        assert_eq!(list.count(PartnerKind::Stable), 1);
        assert_eq!(list.get_index(1).map(|(id, _)| id), Ok(PersonId(1)));
        assert!(list.get_index(2).is_err());

        assert!(list.remove(PersonId(3)).is_some());
        assert!(list.remove(PersonId(3)).is_none());
        assert_eq!(list.ids().collect::<Vec<_>>(), vec![PersonId(1)]);
    }

    #[test]
    fn friend_list_keeps_insertion_order() {
        let mut list = FriendList::default();
        for id in [5, 2, 9] {
            assert!(list.insert(PersonId(id)));
        }
        assert!(!list.insert(PersonId(2)));
        assert!(list.remove(PersonId(2)));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![PersonId(5), PersonId(9)]);
        assert_eq!(list.get_index(1), Ok(PersonId(9)));
    }
}
