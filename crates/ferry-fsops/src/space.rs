//! Free-space probing and the preflight margin.

use std::path::Path;

use crate::error::{FsOpsError, FsOpsResult};

/// Default safety margin in basis points (110%).
pub const DEFAULT_MARGIN_BP: u32 = 11_000;

const BASIS: u128 = 10_000;

/// Reports free bytes on the volume holding a path.
pub trait SpaceProbe: Send + Sync {
    /// Bytes available to unprivileged writers.
    ///
    /// # Errors
    ///
    /// Returns an error when the volume cannot be queried.
    fn available_bytes(&self, path: &Path) -> FsOpsResult<u64>;
}

/// Queries the kernel with `statvfs`.
///
/// Paths that do not exist yet are resolved to their nearest existing ancestor.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl SpaceProbe for StatvfsProbe {
    #[allow(
        clippy::useless_conversion,
        reason = "statvfs field widths differ between platforms"
    )]
    fn available_bytes(&self, path: &Path) -> FsOpsResult<u64> {
        let target = path
            .ancestors()
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| Path::new("."));
        let stat = nix::sys::statvfs::statvfs(target).map_err(|source| FsOpsError::Nix {
            operation: "statvfs",
            path: target.to_path_buf(),
            source,
        })?;
        Ok(u64::from(stat.blocks_available()).saturating_mul(u64::from(stat.fragment_size())))
    }
}

/// Reports a constant figure.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpace(pub u64);

impl SpaceProbe for FixedSpace {
    fn available_bytes(&self, _path: &Path) -> FsOpsResult<u64> {
        Ok(self.0)
    }
}

/// `required` scaled by `margin_bp`, rounded up.
#[must_use]
pub fn with_margin(required: u64, margin_bp: u32) -> u64 {
    let scaled = (u128::from(required) * u128::from(margin_bp)).div_ceil(BASIS);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Whether `available` covers `required` times the margin. Equality passes.
#[must_use]
pub fn has_room(required: u64, available: u64, margin_bp: u32) -> bool {
    u128::from(available) * BASIS >= u128::from(required) * u128::from(margin_bp)
}
