//! Result artifact storage for the Trellis job result gateway.
//!
//! A result store holds at most one published artifact per job id. Uploads
//! are staged into uniquely named temporary files, hashed incrementally as
//! bytes arrive, and only become visible under the final path through an
//! atomic rename at publish time.

pub mod error;
pub mod fs;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FilesystemStore;
pub use traits::{ByteStream, ResultMeta, ResultStore, SealedResult, StagedResult};
