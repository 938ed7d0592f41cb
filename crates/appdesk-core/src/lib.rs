//! Appdesk core
//!
//! The Applications workspace: a single-owner state engine over a REST collaborator that
//! keeps unsaved work safe across refreshes and drives the review lock workflow.
//!
//! # Core Concepts
//!
//! - [`Workspace`]: owns rows, access policy, catalogue and edit session; every mutation is
//!   confirmed by the server before it is applied
//! - [`ApplicationsApi`]: the REST collaborator, with [`HttpApplicationsApi`] for live servers
//! - [`EditSession`]: edit mode, the active editor token and reset snapshots
//! - [`plan_check`]: guards for the `pending → in_review → reviewed` workflow
//! - [`WorkspaceError`]: validation, permission, conflict and transport failures, none fatal
//!
//! # Example
//!
//! ```rust,no_run
//! use appdesk_access::Identity;
//! use appdesk_core::{HttpApplicationsApi, Workspace, WorkspaceConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkspaceConfig::new().with_base_url("https://ops.example.com/api");
//! let api = HttpApplicationsApi::new(&config.api)?;
//! let workspace = Workspace::new(api, Identity::new("u1"), config);
//!
//! workspace.refresh().await?;
//! for row in workspace.rows() {
//!     println!("{} {}", row.record.company, row.record.check_status.label());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod api;
pub mod check;
pub mod config;
pub mod error;
pub mod meta;
pub mod session;
pub mod workspace;

pub use api::{ApplicationsApi, HttpApplicationsApi, ListResponse};
pub use check::{
    allowed_transitions, available_actions, ensure_can_stage_review, plan_check, CheckAction,
    CheckContext,
};
pub use config::{ApiConfig, RefreshConfig, ReviewConfig, WorkspaceConfig};
pub use error::{ApiError, ConfigError, ErrorKind, Result, WorkspaceError, DEFAULT_SERVER_MESSAGE};
pub use meta::{WireMeta, WorkspaceMeta};
pub use session::{EditSession, EditorToken, SavePlan};
pub use workspace::{Notice, NoticeScope, SaveOutcome, Workspace};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
