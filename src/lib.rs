//! An assembler and simulator for a single-accumulator teaching machine.
//!
//! The machine's memory is a flat array of integer cells. Each cell is either data
//! or an instruction word, where the opcode, addressing mode, and (small) operand
//! are packed together into a single decimal number. Operands too large to pack
//! are stored in a second cell after a marker word.
//!
//! # Usage
//!
//! To convert source code to an object file, it must be assembled:
//! ```
//! use acu_ensemble::asm::{assemble, ObjectFile};
//!
//! let code = "
//!     .code 0
//!     CPA $5
//!     ADD $3
//!     HLT
//! ";
//! let obj_file: ObjectFile = assemble(code).unwrap();
//! assert_eq!(obj_file.addr_iter().collect::<Vec<_>>(), [(0, 9115), (1, 9133), (2, 0)]);
//! ```
//!
//! Once an object file has been created, it can be executed with the simulator:
//! ```
//! # use acu_ensemble::asm::assemble;
//! # let obj_file = assemble(".code 0\nCPA $5\nADD $3\nHLT").unwrap();
//! use acu_ensemble::sim::Simulator;
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_obj_file(&obj_file).unwrap();
//! simulator.run().unwrap(); // <-- Result can be handled accordingly
//!
//! assert!(simulator.hit_halt());
//! assert_eq!(simulator.reg_file.acu, 8);
//! ```
//!
//! If more granularity is needed for simulation, there are also step functions.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
