//! Kiteform State Management
//!
//! Persists what kiteform knows about the pipelines it manages, so that a
//! later run can refresh, update or delete them by their remote identifier.
//!
//! # Overview
//!
//! - **StateFile**: versioned snapshot of every managed resource
//! - **StateBackend**: storage trait; `LocalBackend` keeps a JSON file on disk
//! - **LockInfo**: expiring lock guarding concurrent `apply`/`destroy` runs
//!
//! # Example
//!
//! ```ignore
//! use kiteform_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::default()).await?;
//!
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... apply effects, upserting or removing resources ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
