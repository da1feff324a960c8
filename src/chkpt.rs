//! The on-disk checkpoint tree rooted at `$VSC_SCRATCH/chkpt`
//!
//! One directory per job holds the job script, the pro/epilogue, and a `checkpoint`
//! subdirectory with the generated scripts and the checkpoint payload. The tree is the only state
//! shared between submissions; creating a job directory is the only lock.

/// Paths inside a job checkpoint directory and creation of a new one
pub mod layout;
/// Run metadata persisted next to the generated scripts
pub mod meta;
/// Packing the job directory into the checkpoint tarball
pub mod archive;

pub use layout::CheckpointDirectory;
pub use meta::JobMeta;
