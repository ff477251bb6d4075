//! Per-window asset loading
//!
//! A load window is the current asset plus a small lookahead. The coordinator
//! fetches every kind of data for each asset in the window concurrently and
//! reports once the whole window is ready (or gives up after the tick ceiling).

pub mod coordinator;
pub mod detail;
pub mod status;
pub mod window;

pub use coordinator::{CompletionCallback, FetchOutcome, LoadCoordinator, LoaderConfig, LoaderMsg};
pub use detail::AssetDetail;
pub use status::{FetchKind, FetchState, LoadStatus};
pub use window::LoadWindow;
