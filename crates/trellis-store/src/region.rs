//! Region and jurisdiction subsumption
//!
//! Geographic filtering is table-driven: a region subsumes itself and the
//! jurisdictions the static table grants it. Anything absent from the table
//! subsumes only itself.

/// Region → subsumed jurisdictions
const SUBSUMPTION: [(&str, &[&str]); 3] = [
    (
        "EU",
        &[
            "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE",
            "IT", "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
        ],
    ),
    ("EEA", &["IS", "LI", "NO"]),
    ("NORDIC", &["DK", "FI", "IS", "NO", "SE"]),
];

/// Whether `region` subsumes `jurisdiction`
pub fn subsumes(region: &str, jurisdiction: &str) -> bool {
    if region == jurisdiction {
        return true;
    }
    SUBSUMPTION
        .iter()
        .any(|(r, set)| *r == region && set.contains(&jurisdiction))
}

/// Whether a node tag passes a query restriction; an unset side never
/// restricts.
pub fn admits(restriction: Option<&str>, tag: Option<&str>) -> bool {
    match (restriction, tag) {
        (None, _) | (_, None) => true,
        (Some(restriction), Some(tag)) => subsumes(restriction, tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_always_subsumes() {
        assert!(subsumes("SE", "SE"));
        assert!(subsumes("XX", "XX"));
    }

    #[test]
    fn eu_subsumes_members_only() {
        assert!(subsumes("EU", "FI"));
        assert!(subsumes("EU", "SE"));
        assert!(!subsumes("EU", "NO"));
        assert!(!subsumes("SE", "FI"));
    }

    #[test]
    fn unset_is_unrestricted() {
        assert!(admits(None, Some("FI")));
        assert!(admits(Some("EU"), None));
        assert!(!admits(Some("SE"), Some("FI")));
    }
}
