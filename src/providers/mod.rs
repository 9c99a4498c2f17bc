pub mod echo;
pub mod fake;
pub mod http;
pub mod router;
pub mod traits;
pub mod types;

pub use router::BackendRouter;
pub use traits::ChatBackend;
pub use types::{BackendError, BackendId, StreamEvent};
