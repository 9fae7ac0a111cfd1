use std::time::Duration;

use pkiproxy::issuers::encoding::{decode_sans, encode_sans, format_duration, parse_duration};
use pkiproxy::issuers::vault::VaultCertificateRequest;
use proptest::prelude::*;

proptest! {
    #[test]
    fn encoding_preserves_order(sans in proptest::collection::vec("[a-z0-9:/._-]{1,24}", 1..8)) {
        let encoded = encode_sans(&sans).unwrap();
        prop_assert_eq!(decode_sans(&encoded), sans);
    }

    #[test]
    fn encoded_list_is_comma_joined(sans in proptest::collection::vec("[a-z]{1,8}", 1..8)) {
        let encoded = encode_sans(&sans).unwrap();
        prop_assert_eq!(encoded.matches(',').count(), sans.len() - 1);
        prop_assert!(encoded.starts_with(&sans[0]));
    }

    #[test]
    fn whole_second_durations_round_trip(secs in 0u64..10_000_000) {
        let duration = Duration::from_secs(secs);
        prop_assert_eq!(parse_duration(&format_duration(duration)).unwrap(), duration);
    }

    #[test]
    fn sub_second_durations_round_trip(millis in 1u64..1000) {
        let duration = Duration::from_millis(millis);
        prop_assert_eq!(parse_duration(&format_duration(duration)).unwrap(), duration);
    }
}

#[test]
fn empty_san_list_is_omitted() {
    assert_eq!(encode_sans(&[]), None);

    let request = VaultCertificateRequest {
        common_name: "svc.example.com".to_string(),
        exclude_cn_from_sans: false,
        format: "pem".to_string(),
        csr: None,
        uri_sans: encode_sans(&[]),
        other_sans: encode_sans(&[]),
        ttl: format_duration(Duration::from_secs(3600)),
    };
    let json = serde_json::to_value(&request).unwrap();
    assert!(json.get("uri_sans").is_none());
    assert!(json.get("other_sans").is_none());
    assert_eq!(json["ttl"], "1h0m0s");
}

#[test]
fn canonical_duration_strings() {
    assert_eq!(format_duration(Duration::from_secs(720 * 3600)), "720h0m0s");
    assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    assert_eq!(format_duration(Duration::ZERO), "0s");
}
