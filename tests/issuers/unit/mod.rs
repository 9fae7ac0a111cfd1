mod test_config_parsing;
mod test_san_encoding;
