//! What was built, from which commit, and when.

/// `git describe` of the source tree (`-dirty` if it had local changes), or
/// `unknown` when built outside a checkout.
pub const GIT_COMMIT: &str = env!("MODSWITCH_GIT_COMMIT");

/// Unix time of the build, in seconds.
pub const BUILT_AT: &str = env!("MODSWITCH_BUILT_AT");

pub const BUILD_PROFILE: &str = env!("MODSWITCH_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `0.1.0 (abc1234, release)`, printed by `-v`.
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_COMMIT}, {BUILD_PROFILE})")
}
