pub mod admin;
pub mod api_client;
pub mod dispatch;
pub mod generation;
pub mod metrics;
pub mod progress;
pub mod quota_guard;
pub mod results;

pub use admin::*;
pub use api_client::ApiClient;
pub use dispatch::*;
pub use generation::*;
pub use metrics::*;
pub use progress::*;
pub use quota_guard::*;
pub use results::*;
