//! Platform abstraction layer: system trust-store access backing
//! [`crate::traits::PlatformAbstraction`], implemented per OS with the
//! crates the workspace already links against for it (`winapi` on Windows,
//! `security-framework` on macOS, a PEM bundle read on Linux).

pub mod abstraction;

pub use abstraction::PlatformAbstractionImpl;

use crate::error::Result;

/// Initialize platform-specific resources. No-op today; kept as the single
/// place a future platform backend would set up process-wide state.
pub fn initialize_platform() -> Result<()> {
    Ok(())
}

/// Cleanup platform-specific resources.
pub fn cleanup_platform() -> Result<()> {
    Ok(())
}
