//! Memory handling for the simulator.
//!
//! This module consists of:
//! - [`MemArray`]: The memory.
//! - [`RegFile`]: The register file.
//! - [`MachineInitStrategy`]: How memory is filled before a program is loaded.

use rand::rngs::StdRng;
use rand::Rng;

use super::SimErr;

/// Trait that describes types that can be used to fill memory cells
/// which have not been written by a program.
pub trait WordFiller {
    /// Generate the data.
    fn generate(&mut self) -> i32;
}
impl WordFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> i32 {
        rand::random()
    }
}
impl WordFiller for i32 {
    /// Sets each cell to the given value.
    fn generate(&mut self) -> i32 {
        *self
    }
}
impl WordFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> i32 {
        self.gen()
    }
}

/// Strategy used to initialize the `mem` of the [`Simulator`].
///
/// The default strategy fills every cell with 0 (which also happens to be `HLT`).
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Initializes each cell to a known value.
    Known {
        /// The value to initialize each cell to.
        value: i32
    },

    /// Initializes each cell randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each cell randomly and non-deterministically.
    Unseeded,
}
impl Default for MachineInitStrategy {
    fn default() -> Self {
        MachineInitStrategy::Known { value: 0 }
    }
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl WordFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Known { value } => MIGenerator::Known(*value),
            MachineInitStrategy::Seeded { seed } => MIGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Unseeded => MIGenerator::Unseeded,
        }
    }
}

enum MIGenerator {
    Known(i32),
    Seeded(Box<StdRng>),
    Unseeded,
}
impl WordFiller for MIGenerator {
    fn generate(&mut self) -> i32 {
        match self {
            MIGenerator::Known(k)  => k.generate(),
            MIGenerator::Seeded(r) => r.generate(),
            MIGenerator::Unseeded  => ().generate(),
        }
    }
}

/// Memory.
///
/// Memory has a fixed number of cells (its capacity) which can be changed with [`MemArray::resize`].
///
/// This struct provides two methods of accessing memory:
/// - indexing (`mem[addr]`): direct access which panics if the address is out of range
/// - [`MemArray::read`] and [`MemArray::write`]: access which errors if the address is out of range
///
/// ```
/// use acu_ensemble::sim::mem::MemArray;
///
/// let mut mem = MemArray::new(100, &mut 0);
/// mem[40] = 11;
/// assert_eq!(mem.read(40), Ok(11));
/// assert!(mem.read(100).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemArray(Vec<i32>);
impl MemArray {
    /// Creates a new memory with the given number of cells,
    /// filled using the given filler.
    pub fn new(capacity: usize, filler: &mut impl WordFiller) -> Self {
        Self(std::iter::repeat_with(|| filler.generate()).take(capacity).collect())
    }

    /// The number of cells in memory.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether memory has no cells.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads the cell at the given address, erroring if it is out of range.
    pub fn read(&self, addr: usize) -> Result<i32, SimErr> {
        self.0.get(addr)
            .copied()
            .ok_or_else(|| SimErr::out_of_range(addr))
    }

    /// Writes to the cell at the given address, erroring if it is out of range.
    ///
    /// This returns whether the cell's value changed.
    pub fn write(&mut self, addr: usize, value: i32) -> Result<bool, SimErr> {
        let cell = self.0.get_mut(addr).ok_or_else(|| SimErr::out_of_range(addr))?;
        let changed = *cell != value;
        *cell = value;
        Ok(changed)
    }

    /// Changes the number of cells in memory.
    ///
    /// Cells within the new capacity keep their values and any new cells are filled with the filler.
    pub fn resize(&mut self, capacity: usize, filler: &mut impl WordFiller) {
        let old_len = self.0.len();
        self.0.truncate(capacity);
        self.0.extend(std::iter::repeat_with(|| filler.generate()).take(capacity.saturating_sub(old_len)));
    }

    /// Gets an immutable reference to the cells.
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    /// Gets a mutable reference to the cells.
    pub fn as_slice_mut(&mut self) -> &mut [i32] {
        &mut self.0
    }
}
impl std::ops::Index<usize> for MemArray {
    type Output = i32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}
impl std::ops::IndexMut<usize> for MemArray {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

/// The register file.
///
/// The machine has a single register: the accumulator (`ACU`).
/// The instruction pointer is held separately on the simulator (as `pc`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegFile {
    /// The accumulator.
    pub acu: i32,
}
impl RegFile {
    /// The names of the registers, in display order.
    pub const NAMES: [&'static str; 1] = ["ACU"];

    /// Creates a new register file with every register cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets an iterator over each register's name and value.
    ///
    /// ```
    /// use acu_ensemble::sim::mem::RegFile;
    ///
    /// let regs = RegFile { acu: 12 };
    /// assert_eq!(regs.iter().collect::<Vec<_>>(), [("ACU", 12)]);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item=(&'static str, i32)> {
        Self::NAMES.into_iter().zip([self.acu])
    }
}

#[cfg(test)]
mod tests {
    use super::{MachineInitStrategy, MemArray};

    #[test]
    fn test_known_fill() {
        let mem = MemArray::new(5, &mut MachineInitStrategy::Known { value: 7 }.generator());
        assert_eq!(mem.as_slice(), [7; 5]);

        let mem = MemArray::new(3, &mut MachineInitStrategy::default().generator());
        assert_eq!(mem.as_slice(), [0; 3]);
    }

    #[test]
    fn test_seeded_fill() {
        let strat = MachineInitStrategy::Seeded { seed: 2110 };
        let a = MemArray::new(64, &mut strat.generator());
        let b = MemArray::new(64, &mut strat.generator());
        assert_eq!(a, b);
    }

    #[test]
    fn test_resize_preserves() {
        let mut mem = MemArray::new(4, &mut 0);
        mem.as_slice_mut().copy_from_slice(&[1, 2, 3, 4]);

        mem.resize(6, &mut 9);
        assert_eq!(mem.as_slice(), [1, 2, 3, 4, 9, 9]);

        mem.resize(2, &mut 9);
        assert_eq!(mem.as_slice(), [1, 2]);
        assert!(mem.read(2).is_err());
    }

    #[test]
    fn test_write_reports_change() {
        let mut mem = MemArray::new(2, &mut 0);
        assert_eq!(mem.write(1, 0), Ok(false));
        assert_eq!(mem.write(1, 5), Ok(true));
        assert_eq!(mem[1], 5);
        assert!(mem.write(2, 5).is_err());
    }
}
