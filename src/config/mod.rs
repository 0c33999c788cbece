/// Configuration subsystem - settings loaded from .richeditrc files
pub mod rc;

pub use rc::{RcConfig, RcLoader};
