use std::collections::HashMap;
use std::time::Duration;

use pkiproxy::config::{AuthMethodKind, IssuerConfig, IssuerKind, Settings, ENV_PREFIX};
use proptest::prelude::*;

/// Randomly upper-case characters of `word`.
fn any_case(word: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), word.len()).prop_map(move |upper| {
        word.chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect()
    })
}

const ISSUER_ALIASES: &[(&str, IssuerKind)] = &[
    ("vault", IssuerKind::Vault),
    ("hashicorp", IssuerKind::Vault),
    ("cfssl", IssuerKind::Cfssl),
    ("cloudflare", IssuerKind::Cfssl),
    ("aws", IssuerKind::Aws),
    ("amazon", IssuerKind::Aws),
    ("acmpca", IssuerKind::Aws),
    ("awscmpca", IssuerKind::Aws),
];

fn is_issuer_alias(s: &str) -> bool {
    ISSUER_ALIASES.iter().any(|(alias, _)| alias.eq_ignore_ascii_case(s.trim()))
}

fn is_auth_alias(s: &str) -> bool {
    ["constant", "token", "constant_token", "renewing", "renewing_token"]
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(s.trim()))
}

proptest! {
    #[test]
    fn issuer_aliases_parse_in_any_case(
        alias in proptest::sample::select(ISSUER_ALIASES),
        mask in proptest::collection::vec(any::<bool>(), 8),
    ) {
        let (alias, kind) = alias;
        let mixed: String = alias
            .chars()
            .zip(mask.into_iter().cycle())
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect();
        prop_assert_eq!(mixed.parse::<IssuerKind>().unwrap(), kind);
    }

    #[test]
    fn unknown_issuers_list_the_supported_ones(name in "[a-zA-Z0-9_]{0,16}") {
        prop_assume!(!is_issuer_alias(&name));
        let err = name.parse::<IssuerKind>().unwrap_err();
        prop_assert!(err.is_config());
        prop_assert!(err.to_string().contains(r#""vault", "cfssl" and "aws""#));
    }

    #[test]
    fn auth_method_parsing_never_fails(name in "[a-zA-Z_ ]{0,24}") {
        let kind = AuthMethodKind::parse(&name);
        if !is_auth_alias(&name) {
            prop_assert_eq!(kind, AuthMethodKind::Unknown);
        }
    }

    #[test]
    fn renewing_aliases_parse_in_any_case(name in any_case("renewing_token")) {
        prop_assert_eq!(AuthMethodKind::parse(&name), AuthMethodKind::RenewingToken);
    }
}

fn settings(pairs: &[(&str, &str)]) -> pkiproxy::Result<Settings> {
    let env: HashMap<String, String> =
        pairs.iter().map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string())).collect();
    Settings::from_lookup(|key| env.get(key).cloned())
}

#[test]
fn vault_defaults_match_documented_values() {
    let settings = settings(&[
        ("ISSUER", "hashicorp"),
        ("VAULT_URL", "https://vault.internal:8200"),
        ("VAULT_AUTH_METHOD", "renewing"),
        ("VAULT_AUTH_METHOD_RENEWING_TOKEN_INITIAL", "hvs.initial"),
        ("VAULT_ROLE", "proxy"),
    ])
    .unwrap();

    let IssuerConfig::Vault(vault) = settings.issuer else { panic!("expected vault settings") };
    assert_eq!(vault.mount, "pki");
    assert_eq!(vault.time_to_live, Duration::from_secs(720 * 3600));
    assert_eq!(vault.renewing_token.renew_before, Duration::from_secs(30 * 60));
    assert_eq!(vault.renewing_token.time_to_live, Duration::from_secs(24 * 3600));
    assert!(vault.validate().is_ok());
}

#[test]
fn unknown_auth_method_loads_but_fails_validation() {
    let settings = settings(&[
        ("ISSUER", "vault"),
        ("VAULT_URL", "https://vault.internal:8200"),
        ("VAULT_AUTH_METHOD", "approle"),
        ("VAULT_ROLE", "proxy"),
    ])
    .unwrap();

    assert!(settings.issuer.validate().unwrap_err().is_config());
}

#[test]
fn missing_issuer_is_a_config_error() {
    assert!(settings(&[]).unwrap_err().is_config());
}

#[test]
fn aws_lifetime_is_in_days() {
    let settings = settings(&[
        ("ISSUER", "amazon"),
        ("AWS_REGION", "eu-west-1"),
        ("AWS_CERTIFICATE_AUTHORITY_ARN", "arn:aws:acm-pca:eu-west-1:1:certificate-authority/ca"),
        ("AWS_TIME_TO_LIVE", "7"),
    ])
    .unwrap();

    let IssuerConfig::Aws(aws) = settings.issuer else { panic!("expected aws settings") };
    assert_eq!(aws.time_to_live_days, 7);
}
