/// Allocates unique identifiers for the entities of one simulation session.
///
/// Owned by the engine of a run, so every run starts counting from zero and
/// concurrent runs never share counters.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    person: u64,
    group: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_person(&mut self) -> u64 {
        let id = self.person;
        self.person += 1;
        id
    }

    pub fn next_group(&mut self) -> u32 {
        let id = self.group;
        self.group += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_independently() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_person(), 0);
        assert_eq!(ids.next_person(), 1);
        assert_eq!(ids.next_group(), 0);
        assert_eq!(IdAllocator::new().next_person(), 0);
    }
}
