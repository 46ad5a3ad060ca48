//! Deterministic sample identifiers.

use sha2::{Digest, Sha256};

use crate::interval::TimeInterval;
use crate::refsys::GridShape;
use crate::timestamp::format_timestamp;

/// Number of hex characters kept from the digest.
pub const IDENTIFIER_LEN: usize = 10;

/// Derive a base identifier from the request parameters.
///
/// The digest covers the canonical JSON array
/// `[area_wkt, t0, t1, refsys, [rows, cols]]` with RFC 3339 UTC times, so any
/// change in one field changes the identifier.
pub fn derive_identifier(
    area_wkt: &str,
    window: &TimeInterval,
    refsys_descriptor: &str,
    shape: GridShape,
) -> String {
    let canonical = serde_json::json!([
        area_wkt,
        format_timestamp(window.start()),
        format_timestamp(window.end()),
        refsys_descriptor,
        [shape.rows, shape.cols],
    ])
    .to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(IDENTIFIER_LEN);
    hex
}

/// Identifier of pair `index` out of `total` found for one request.
///
/// A single pair keeps the base identifier; several pairs get a zero-padded
/// sequence suffix (`base_00`, `base_01`, ...).
pub fn suffix_identifier(base: &str, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{base}_{index:02}")
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const AREA: &str = "POLYGON((10 60,10.02 60,10.02 60.02,10 60.02,10 60))";

    fn window() -> TimeInterval {
        TimeInterval::new(
            datetime!(2020-01-01 0:00 UTC),
            datetime!(2020-01-02 0:00 UTC),
        )
        .unwrap()
    }

    fn shape() -> GridShape {
        GridShape::new(512, 512).unwrap()
    }

    #[test]
    fn identical_inputs_give_identical_identifiers() {
        let a = derive_identifier(AREA, &window(), "EPSG:32632", shape());
        let b = derive_identifier(AREA, &window(), "EPSG:32632", shape());
        assert_eq!(a, b);
        assert_eq!(a.len(), IDENTIFIER_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn every_field_changes_the_identifier() {
        let base = derive_identifier(AREA, &window(), "EPSG:32632", shape());
        let other_window = TimeInterval::new(
            datetime!(2020-01-01 0:00 UTC),
            datetime!(2020-01-03 0:00 UTC),
        )
        .unwrap();
        let variants = [
            derive_identifier(
                "POLYGON((10 60,10.03 60,10.03 60.02,10 60.02,10 60))",
                &window(),
                "EPSG:32632",
                shape(),
            ),
            derive_identifier(AREA, &other_window, "EPSG:32632", shape()),
            derive_identifier(AREA, &window(), "EPSG:32633", shape()),
            derive_identifier(AREA, &window(), "EPSG:32632", GridShape::new(512, 256).unwrap()),
            derive_identifier(AREA, &window(), "EPSG:32632", GridShape::new(256, 512).unwrap()),
        ];
        for v in &variants {
            assert_ne!(v, &base);
        }
    }

    #[test]
    fn digest_is_over_canonical_json() {
        let canonical = r#"["POLYGON((10 60,10.02 60,10.02 60.02,10 60.02,10 60))","2020-01-01T00:00:00Z","2020-01-02T00:00:00Z","EPSG:32632",[512,512]]"#;
        let expected = format!("{:x}", Sha256::digest(canonical.as_bytes()));
        assert_eq!(
            derive_identifier(AREA, &window(), "EPSG:32632", shape()),
            expected[..IDENTIFIER_LEN]
        );
    }

    #[test]
    fn single_pair_is_unsuffixed() {
        assert_eq!(suffix_identifier("abc", 0, 1), "abc");
    }

    #[test]
    fn multiple_pairs_are_zero_padded() {
        let ids: Vec<_> = (0..3).map(|i| suffix_identifier("abc", i, 3)).collect();
        assert_eq!(ids, ["abc_00", "abc_01", "abc_02"]);
        assert_eq!(suffix_identifier("abc", 12, 13), "abc_12");
    }
}
