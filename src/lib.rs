pub mod driver;
pub mod fetcher;
pub mod limiter;
pub mod output;
pub mod reconcile;
pub mod scraper;
pub mod settings;
pub mod utils;
pub mod validator;
