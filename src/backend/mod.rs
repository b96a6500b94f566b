//! Prover abstraction.
//!
//! `Prover` is the seam between the pipeline and the external proof engine:
//! `KrtProver` shells out to `krt`, `MockProver` scripts the observable side
//! effects for tests.

pub mod krt;
pub mod mock;
pub mod process;
pub mod traits;

// Re-export key types
pub use krt::{KrtProver, outcome_from_report};
pub use mock::{MockProver, MockStage};
pub use process::{ProcessExit, ProcessReport, run_bounded};
pub use traits::{Prover, StageInvocation, StageRun};
