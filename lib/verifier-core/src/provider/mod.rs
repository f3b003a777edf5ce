pub mod caching_loader;
pub mod credential_format;
pub mod http_client;
pub mod key_resolver;
pub mod signature;
pub mod status_check;
