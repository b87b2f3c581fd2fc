//! Module handles change observers,
//! which store which parts of the machine changed during the last execution.
//!
//! You would typically access an observer via the [`Simulator::observer`] field.
//! The [`ChangeObserver`] records every memory cell that was modified and whether the registers changed.
//! It also forwards those changes as [`SimEvent`]s to anyone who subscribed through
//! [`Simulator::subscribe`].
//!
//! [`Simulator::observer`]: crate::sim::Simulator::observer
//! [`Simulator::subscribe`]: crate::sim::Simulator::subscribe

use std::collections::BTreeSet;

use crossbeam_channel::{Receiver, Sender};

/// A notification that part of the machine state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// The listed memory cells were modified (in address order).
    MemoryChanged(Vec<usize>),
    /// The accumulator or the instruction pointer changed.
    RegistersChanged {
        /// The new accumulator value.
        acu: i32,
        /// The new instruction pointer.
        pc: usize
    },
    /// A new set of labels was loaded.
    LabelsChanged,
}

/// A struct that tracks changes in the simulator.
///
/// ## Example
///
/// ```
/// use acu_ensemble::sim::observer::{ChangeObserver, SimEvent};
///
/// let mut observer = ChangeObserver::new();
/// let rx = observer.subscribe();
///
/// observer.set_mem_changed(4);
/// observer.set_mem_changed(2);
/// assert!(observer.mem_changed(4));
/// assert_eq!(observer.mem_changes().collect::<Vec<_>>(), [2, 4]);
///
/// observer.notify(SimEvent::LabelsChanged);
/// assert_eq!(rx.try_recv(), Ok(SimEvent::LabelsChanged));
/// ```
#[derive(Debug, Default)]
pub struct ChangeObserver {
    mem: BTreeSet<usize>,
    regs: bool,
    subscribers: Vec<Sender<SimEvent>>,
}
impl ChangeObserver {
    /// Creates a new change observer.
    pub fn new() -> Self {
        Default::default()
    }

    /// Clears all recorded changes.
    ///
    /// Subscribers are kept.
    pub fn clear(&mut self) {
        self.mem.clear();
        self.regs = false;
    }

    /// Records that the given memory cell was modified.
    pub fn set_mem_changed(&mut self, addr: usize) {
        self.mem.insert(addr);
    }

    /// Checks whether the given memory cell was modified.
    pub fn mem_changed(&self, addr: usize) -> bool {
        self.mem.contains(&addr)
    }

    /// Gets every modified memory cell, in address order.
    pub fn mem_changes(&self) -> impl Iterator<Item=usize> + '_ {
        self.mem.iter().copied()
    }

    /// Records that the registers changed.
    pub fn set_regs_changed(&mut self) {
        self.regs = true;
    }

    /// Checks whether the registers changed.
    pub fn regs_changed(&self) -> bool {
        self.regs
    }

    /// Creates a new receiver which gets every event sent after this call.
    pub fn subscribe(&mut self) -> Receiver<SimEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Sends an event to every subscriber.
    ///
    /// Subscribers whose receivers were dropped are removed.
    pub fn notify(&mut self, event: SimEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Sends an event for every change recorded since the last clear.
    pub(super) fn publish(&mut self, acu: i32, pc: usize) {
        if !self.mem.is_empty() {
            let cells = self.mem.iter().copied().collect();
            self.notify(SimEvent::MemoryChanged(cells));
        }
        if self.regs {
            self.notify(SimEvent::RegistersChanged { acu, pc });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeObserver, SimEvent};

    #[test]
    fn test_publish() {
        let mut obs = ChangeObserver::new();
        let rx = obs.subscribe();

        obs.publish(0, 0);
        assert!(rx.try_recv().is_err());

        obs.set_mem_changed(9);
        obs.set_mem_changed(3);
        obs.set_regs_changed();
        obs.publish(5, 2);
        assert_eq!(rx.try_recv(), Ok(SimEvent::MemoryChanged(vec![3, 9])));
        assert_eq!(rx.try_recv(), Ok(SimEvent::RegistersChanged { acu: 5, pc: 2 }));

        obs.clear();
        assert!(!obs.regs_changed());
        assert!(!obs.mem_changed(3));
    }

    #[test]
    fn test_dropped_subscriber() {
        let mut obs = ChangeObserver::new();
        let rx = obs.subscribe();
        drop(obs.subscribe());

        obs.notify(SimEvent::LabelsChanged);
        assert_eq!(obs.subscribers.len(), 1);
        assert_eq!(rx.try_recv(), Ok(SimEvent::LabelsChanged));
    }
}
