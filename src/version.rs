//! Version Translator
//!
//! The store exposes 1-based versions where 0 means "absent". The service
//! counts modifications from 0 and uses -1 for "any version".

/// User-visible key version
pub type Version = u64;

/// The service's own per-node modification counter
pub type NativeVersion = i64;

/// Native expected-version value that matches every node
pub const ANY_VERSION: NativeVersion = -1;

/// Returned by `set` when the key was overwritten but deleted by someone else
/// before its resulting version could be read back.
///
/// No real key reaches this version, so callers that care about exact
/// versions must compare against it explicitly.
pub const SET_RACE_VERSION: Version = 1 << 62;

/// Native version to user version
pub fn to_user(native: NativeVersion) -> Version {
    (native + 1) as Version
}

/// User version to the native expected version.
///
/// `0` becomes `ANY_VERSION`. Versions too large for the native counter
/// become `NativeVersion::MAX`, which never matches a real node.
pub fn to_native(version: Version) -> NativeVersion {
    match NativeVersion::try_from(version) {
        Ok(v) => v - 1,
        Err(_) => NativeVersion::MAX,
    }
}
