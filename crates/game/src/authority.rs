//! The authority policy: host-only mutations.
//!
//! Damage, score changes and ammo consumption are computed only inside
//! host-side logic; clients wait for the next authoritative delta. A
//! non-host write is surfaced as a debug-build diagnostic only — the
//! mutation is not blocked. Whether it should be a hard error in a
//! production build is deliberately left open; [`AuthorityPolicy`] is the
//! extension point for a stricter policy.

/// How a detected non-host write to host-only state is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorityPolicy {
    /// Log a diagnostic in debug builds and let the mutation proceed.
    /// Matches the established behavior; currently the only policy.
    #[default]
    DiagnosticOnly,
}

/// Check a host-only write. Call sites pass whether this process is the
/// host and a short label for the state being written.
///
/// Under [`AuthorityPolicy::DiagnosticOnly`] this never blocks anything;
/// in release builds it compiles down to nothing.
pub fn host_write_check(policy: AuthorityPolicy, is_host: bool, what: &str) {
    match policy {
        AuthorityPolicy::DiagnosticOnly => {
            #[cfg(debug_assertions)]
            if !is_host {
                tracing::warn!("Authority violation: non-host write to {what}");
            }
            #[cfg(not(debug_assertions))]
            {
                let _ = (is_host, what);
            }
        }
    }
}
