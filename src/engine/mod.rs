pub mod applicator;
pub mod backup;
pub mod orchestrate;

pub use applicator::{
    apply_patches, preview_patches, Direction, FileOutcome, FilePreview, FileStatus, PatchResult,
};
pub use backup::{backup_path, backup_status, remove_stale_backups, BackupState, SweepReport};
pub use orchestrate::{disable, enable, Outcome, Report};
