//! HTTP clients for the external services condition evaluators consult.
//!
//! - `ChatOracle` implements `ReasoningOracle` over a chat completions API.
//! - `WeatherDataSource` implements `DataSource` over a forecast API.
//!
//! Both retry rate limiting and 5xx responses with exponential backoff
//! (`RetryConfig`) and surface final failures as `EvaluationError`.

pub mod chat;
pub mod retry;
pub mod weather;

pub use chat::ChatOracle;
pub use retry::RetryConfig;
pub use weather::WeatherDataSource;
