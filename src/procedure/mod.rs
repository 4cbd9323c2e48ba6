//! Test procedures: file format, lookup table, comparison policies and
//! the step interpreter

pub mod file;
pub mod interpreter;
pub mod lookup;
pub mod policy;

pub use file::{StepKind, TestFile, TestStep};
pub use interpreter::{FileVerdict, Interpreter, RunContext, StepResult};
pub use lookup::{Identity, LookupEntry, LookupTable};
pub use policy::Verdict;
