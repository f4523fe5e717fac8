pub mod cli;
pub mod client;
pub mod config;
pub mod fetch;
pub mod login;
pub mod prompt;
pub mod proxy;
#[cfg(feature = "snatch")]
pub mod snatch;

pub use client::{ClientError, EzClient, Fetched};
pub use config::{Config, ConfigError};
pub use fetch::{FetchError, fetch_pdf, resolve_pdf, save_file};
pub use login::{Credentials, LoginAdaptor, LoginError, adaptor_by_name};
pub use prompt::{Prompter, TerminalPrompter};
pub use proxy::{ProxyError, is_proxied, rewrite};
