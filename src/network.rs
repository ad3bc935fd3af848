use crate::person::Person;
use crate::relation::{PartnerKind, Relation};
use serde::{Deserialize, Serialize};

/// Slot of a person in the network arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(pub usize);

/// Arena of persons. Every edge is stored on both endpoints, and only these
/// methods create or destroy edges.
#[derive(Debug, Default)]
pub struct Network {
    people: Vec<Person>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            people: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn push(&mut self, person: Person) -> PersonId {
        self.people.push(person);
        PersonId(self.people.len() - 1)
    }

    /// Put a new person in an existing slot. The previous occupant must have
    /// said goodbye already.
    pub fn replace(&mut self, id: PersonId, person: Person) {
        let old = &self.people[id.0];
        debug_assert!(old.partners.is_empty() && old.friends.is_empty());
        self.people[id.0] = person;
    }

    pub fn get(&self, id: PersonId) -> &Person {
        &self.people[id.0]
    }

    pub fn get_mut(&mut self, id: PersonId) -> &mut Person {
        &mut self.people[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonId, &Person)> + '_ {
        self.people.iter().enumerate().map(|(i, p)| (PersonId(i), p))
    }

    pub fn clear(&mut self) {
        self.people.clear();
    }

    pub fn are_partners(&self, a: PersonId, b: PersonId) -> bool {
        self.people[a.0].partners.contains(b)
    }

    pub fn are_friends(&self, a: PersonId, b: PersonId) -> bool {
        self.people[a.0].friends.contains(b)
    }

    /// Create the mirrored partnership `a -> b`, with `a` as initiator.
    ///
    /// Returns `false` without touching either endpoint if `a == b` or the
    /// two are already partners.
    pub fn link(&mut self, a: PersonId, b: PersonId, kind: PartnerKind, end: u32) -> bool {
        if a == b {
            return false;
        }
        let rel = Relation {
            kind,
            end,
            initiator: true,
            visited: 0,
        };
        if !self.people[a.0].partners.insert(b, rel) {
            return false;
        }
        let mirror = Relation {
            kind,
            end,
            initiator: false,
            visited: 0,
        };
        if !self.people[b.0].partners.insert(a, mirror) {
            self.people[a.0].partners.remove(b);
            return false;
        }
        true
    }

    /// Remove the partnership between `a` and `b`, returning `a`'s record.
    pub fn unlink(&mut self, a: PersonId, b: PersonId) -> Option<Relation> {
        let rel = self.people[a.0].partners.remove(b)?;
        self.people[b.0].partners.remove(a);
        Some(rel)
    }

    pub fn befriend(&mut self, a: PersonId, b: PersonId) -> bool {
        if a == b || !self.people[a.0].friends.insert(b) {
            return false;
        }
        if !self.people[b.0].friends.insert(a) {
            self.people[a.0].friends.remove(b);
            return false;
        }
        true
    }

    pub fn unfriend(&mut self, a: PersonId, b: PersonId) -> bool {
        if !self.people[a.0].friends.remove(b) {
            return false;
        }
        self.people[b.0].friends.remove(a);
        true
    }

    /// Stamp both records of the partnership `a - b` with `pass`.
    ///
    /// Returns `false` if the edge was already stamped with `pass`.
    pub fn visit(&mut self, a: PersonId, b: PersonId, pass: u64) -> bool {
        let Some(rel) = self.people[a.0].partners.get_mut(b) else {
            return false;
        };
        if rel.visited == pass {
            return false;
        }
        rel.visited = pass;
        if let Some(mirror) = self.people[b.0].partners.get_mut(a) {
            mirror.visited = pass;
        }
        true
    }

    /// Sever every edge of `id`, leaving no record of it on any neighbour.
    ///
    /// Partnerships are closed without turning into friendships. Returns the
    /// former partners and the kind of each partnership.
    pub fn say_goodbye(&mut self, id: PersonId) -> Vec<(PersonId, PartnerKind)> {
        let partners = self.people[id.0].partners.drain();
        for &(other, _) in &partners {
            self.people[other.0].partners.remove(id);
        }
        for other in self.people[id.0].friends.drain() {
            self.people[other.0].friends.remove(id);
        }
        partners
            .into_iter()
            .map(|(other, rel)| (other, rel.kind))
            .collect()
    }

    /// Sever every partnership in the network, keeping friendships.
    pub fn sever_partnerships(&mut self) {
        for person in &mut self.people {
            person.partners.drain();
        }
    }
}
