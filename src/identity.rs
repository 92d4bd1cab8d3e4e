// 🔑 Identity - name-derived UUIDs and timestamps
//
// "Process name is the IDENTITY": the same name must always yield the same
// UUID, across runs and machines, so re-imports update instead of duplicate.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Deterministic UUID for a name (v3, OID namespace).
///
/// The name is trimmed and lower-cased first, so `"Coal "` and `"coal"`
/// share an identity.
pub fn uuid_of(name: &str) -> String {
    uuid_of_parts(&[name])
}

/// Deterministic UUID for a multi-part key, parts joined with `/`
pub fn uuid_of_parts(parts: &[&str]) -> String {
    let path = parts
        .iter()
        .map(|p| p.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("/");
    Uuid::new_v3(&Uuid::NAMESPACE_OID, path.as_bytes()).to_string()
}

/// `lastChange` stamp: UTC, RFC 3339, `Z` suffix
pub fn last_change_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Local creation date with seconds precision (documentation default)
pub fn creation_date_now() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_is_stable() {
        let a = uuid_of("Coal extraction");
        let b = uuid_of("Coal extraction");
        assert_eq!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a, a.to_lowercase());
    }

    #[test]
    fn test_uuid_normalizes_name() {
        assert_eq!(uuid_of("  Coal extraction "), uuid_of("coal extraction"));
        assert_ne!(uuid_of("Coal extraction"), uuid_of("Coal processing"));
    }

    #[test]
    fn test_uuid_parts_joined() {
        assert_eq!(uuid_of_parts(&["a", "b"]), uuid_of("a/b"));
    }

    #[test]
    fn test_uuid_is_version_3() {
        let id = Uuid::parse_str(&uuid_of("Diesel, combusted")).unwrap();
        assert_eq!(id.get_version_num(), 3);
    }

    #[test]
    fn test_last_change_format() {
        let ts = last_change_now();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }
}
