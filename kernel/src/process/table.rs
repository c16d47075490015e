use common::limits::MAX_TASK;
use common::{KError, KResult};

use super::{Pcb, Pid};

/// Fixed-size process table; a pid is an index into it.
pub struct ProcessTable {
    slots: [Option<Pcb>; MAX_TASK],
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Claim the lowest free slot.
    pub fn allocate(&mut self) -> KResult<Pid> {
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(KError::OutOfTasks)?;
        Ok(Pid(free))
    }

    pub fn insert(&mut self, pcb: Pcb) {
        let slot = &mut self.slots[pcb.pid.0];
        assert!(slot.is_none(), "pid {} already in use", pcb.pid.0);
        *slot = Some(pcb);
    }

    /// Release a slot, returning its PCB.
    pub fn remove(&mut self, pid: Pid) -> Option<Pcb> {
        self.slots[pid.0].take()
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.slots.get(pid.0)?.as_ref()
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.slots.get_mut(pid.0)?.as_mut()
    }

    pub fn in_use(&self, pid: Pid) -> bool {
        self.slots.get(pid.0).is_some_and(Option::is_some)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcb(pid: Pid) -> Pcb {
        Pcb::new(pid, pid, 0, "shell".into(), String::new())
    }

    #[test]
    fn allocates_lowest_free_slot() {
        let mut table = ProcessTable::new();
        for i in 0..MAX_TASK {
            let pid = table.allocate().unwrap();
            assert_eq!(pid, Pid(i));
            table.insert(pcb(pid));
        }
        assert_eq!(table.allocate().unwrap_err(), KError::OutOfTasks);
        table.remove(Pid(2)).unwrap();
        assert_eq!(table.allocate().unwrap(), Pid(2));
    }

    #[test]
    fn remove_frees_exactly_once() {
        let mut table = ProcessTable::new();
        let pid = table.allocate().unwrap();
        table.insert(pcb(pid));
        assert!(table.in_use(pid));
        assert!(table.remove(pid).is_some());
        assert!(table.remove(pid).is_none());
        assert!(!table.in_use(pid));
        assert_eq!(table.live_count(), 0);
    }
}
