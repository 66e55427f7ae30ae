//! Kernel helpers shared by the feature crates and the server.
//!
//! ## Entry ids
//! ```rust
//! use vanish_kernel::ids;
//!
//! let id = ids::new_id();
//! assert_eq!(id.len(), 36);
//! assert!(ids::is_entry_id(&id));
//! ```
//!
//! ## Config loading
//! ```rust,no_run
//! use vanish_kernel::config::load_config;
//! use vanish_kernel::domain::config::AppConfig;
//!
//! let cfg: AppConfig = load_config(Some("server")).unwrap_or_default();
//! ```
pub mod config;
pub mod guard;
pub mod ids;

pub use guard::{Guard, GuardError, Rule};
pub use vanish_domain as domain;
