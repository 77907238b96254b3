pub mod analysis_fetch;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http_api;
pub mod http_cache;
pub mod http_client;
pub mod ledger;
pub mod live_poll;
pub mod logging;
pub mod quota_gate;
pub mod session;
pub mod state;
pub mod value_rank;
