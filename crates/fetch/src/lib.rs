#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod provider;
pub use provider::{FetchWindow, SeriesPoint, SeriesProvider};

mod fred;
pub use fred::FredClient;

mod worldbank;
pub use worldbank::WorldBankClient;

mod yahoo;
pub use yahoo::YahooClient;

mod fetcher;
pub use fetcher::{FetchOutcome, Fetcher};

mod error;
pub use error::FetchError;
