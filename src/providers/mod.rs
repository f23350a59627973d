pub mod github;
pub mod local;
pub mod util;
pub mod yahoo_finance;

pub use github::GithubDocumentStore;
pub use local::LocalDocumentStore;
pub use yahoo_finance::{RetryPolicy, YahooFinanceProvider};
