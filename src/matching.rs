//! Label-wise DNS name matching with single-label wildcards.
//!
//! Shared by the record store lookup path and static zone handling. A
//! pattern label of exactly `*` absorbs one label of the candidate, never
//! more, so `*.foo.example.com` matches `bar.foo.example.com` but neither
//! `a.b.foo.example.com` nor `foo.example.com`.

/// Returns true when `pattern` names `domain` (fully qualified, no trailing
/// dot) or its zone-relative form `host`.
pub fn matches(pattern: &str, domain: &str, host: &str) -> bool {
    if pattern == domain || pattern == host {
        return true;
    }

    if pattern.strip_suffix('.') == Some(domain) {
        return true;
    }

    if pattern.split('.').count() != domain.split('.').count() {
        return false;
    }

    pattern
        .split('.')
        .zip(domain.split('.'))
        .all(|(want, got)| want == "*" || want == got)
}
