// trustbucket - deploy, seed and tear down a trusted S3 bucket stack
//
// The binary wires three workflows (deploy, seed, teardown) to clap
// subcommands. Each workflow has a pure core taking trait objects from
// `cloud` and an `OutputsStore`, plus a `run` function that resolves
// options, talks to the user and picks the real backends.

pub mod cloud;
pub mod deploy;
pub mod error;
mod init;
pub mod outputs;
pub mod preflight;
pub mod runner;
pub mod seed;
pub mod teardown;

pub use error::{Error, Result, StackOperation};
pub use init::init_tracing;
pub use outputs::{FileOutputsStore, MemoryOutputsStore, OutputsStore};
pub use runner::{CommandOutcome, CommandRunner};
