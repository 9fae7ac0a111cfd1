mod test_aws_issuer;
mod test_renewing_token;
mod test_vault_transport;
