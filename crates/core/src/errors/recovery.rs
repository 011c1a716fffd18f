//! Recovery classification for errors

use super::types::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Suggested caller reaction to an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Retry the operation after a delay
    Retry { after: Duration },

    /// The entry is unreadable; treat it as absent (it has already been removed)
    UseDefault,

    /// Check file permissions and free space
    CheckPermissions { path: PathBuf },

    /// Verify connectivity to the storage server
    CheckNetwork,

    /// Fix the configuration and rebuild the instance
    UpdateConfiguration,

    /// No automated recovery possible
    NoRecovery,
}

impl Error {
    /// Get the recovery hint for this error
    #[must_use]
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            Self::Configuration { .. }
            | Self::UnsupportedCodec { .. }
            | Self::InvalidCompressionLevel { .. } => RecoveryHint::UpdateConfiguration,
            Self::Encode { .. } | Self::InvalidValue { .. } | Self::NotImplemented { .. } => {
                RecoveryHint::NoRecovery
            }
            Self::Decode { .. } | Self::UnknownRecordType { .. } => RecoveryHint::UseDefault,
            Self::Compression { operation, .. } => {
                if *operation == "decompress" {
                    RecoveryHint::UseDefault
                } else {
                    RecoveryHint::NoRecovery
                }
            }
            Self::FileSystem { path, source, .. } => match source.kind() {
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted => {
                    RecoveryHint::Retry {
                        after: Duration::from_millis(50),
                    }
                }
                _ => RecoveryHint::CheckPermissions { path: path.clone() },
            },
            Self::Json { .. } => RecoveryHint::NoRecovery,
            Self::Backend { .. } => RecoveryHint::CheckNetwork,
            Self::Runtime { .. } => RecoveryHint::NoRecovery,
        }
    }

    /// Check if this error means a stored payload could not be read back
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self.recovery_hint(), RecoveryHint::UseDefault)
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.recovery_hint(),
            RecoveryHint::Retry { .. } | RecoveryHint::CheckNetwork
        )
    }
}
