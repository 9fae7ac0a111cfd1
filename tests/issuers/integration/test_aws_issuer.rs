use std::sync::Arc;
use std::time::Duration;

use pkiproxy::config::AwsConfig;
use pkiproxy::{CertificateRequest, Issuer, IssuerError};

use crate::support::{FakeAcmPca, TEST_CSR};

const HOUR: Duration = Duration::from_secs(3600);
const CA_ARN: &str = "arn:aws:acm-pca:eu-west-1:111122223333:certificate-authority/ca-1";

fn config() -> AwsConfig {
    AwsConfig {
        region: "eu-west-1".to_string(),
        certificate_authority_arn: CA_ARN.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn ttl_is_truncated_to_whole_days() {
    let ca = Arc::new(FakeAcmPca::default());
    let issuer = Issuer::aws(config(), ca.clone()).unwrap();

    for ttl in [25 * HOUR, 47 * HOUR, 48 * HOUR, HOUR, Duration::ZERO] {
        let request = CertificateRequest::new("svc.example.com").with_csr(TEST_CSR).with_ttl(ttl);
        issuer.issue(&request).await.unwrap();
    }

    let days: Vec<u32> = ca.requests.lock().unwrap().iter().map(|r| r.validity_days).collect();
    assert_eq!(days, vec![1, 1, 2, 1, 30]);
}

#[tokio::test]
async fn certificate_is_normalized() {
    let ca = Arc::new(FakeAcmPca::default());
    let issuer = Issuer::aws(config(), ca.clone()).unwrap();

    let certificate = issuer
        .issue(&CertificateRequest::new("svc.example.com").with_csr(TEST_CSR))
        .await
        .unwrap();

    assert!(certificate.certificate.contains("LEAF"));
    assert_eq!(certificate.ca_chain.len(), 1);
    assert!(certificate.private_key.is_none());
    assert_eq!(certificate.serial_number.as_deref(), Some("00000000000000000000000000000001"));

    let requests = ca.requests.lock().unwrap();
    assert_eq!(requests[0].certificate_authority_arn, CA_ARN);
    assert_eq!(requests[0].csr, TEST_CSR);
}

#[tokio::test]
async fn csr_is_required() {
    let ca = Arc::new(FakeAcmPca::default());
    let issuer = Issuer::aws(config(), ca.clone()).unwrap();

    let err = issuer.issue(&CertificateRequest::new("svc.example.com")).await.unwrap_err();
    assert!(matches!(err, IssuerError::InvalidRequest { .. }));
    assert!(ca.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn access_denied_is_an_authorization_error() {
    let ca = Arc::new(FakeAcmPca { reject_with_status: Some(403), ..Default::default() });
    let issuer = Issuer::aws(config(), ca).unwrap();

    let err = issuer
        .issue(&CertificateRequest::new("svc.example.com").with_csr(TEST_CSR))
        .await
        .unwrap_err();
    assert!(err.is_authorization());
}

#[test]
fn invalid_arn_fails_construction() {
    let err = Issuer::aws(
        AwsConfig { certificate_authority_arn: "ca-1".to_string(), ..config() },
        Arc::new(FakeAcmPca::default()),
    )
    .unwrap_err();
    assert!(err.is_config());
}
