//! PDFCP Validation Workflow
//!
//! Multi-step approval of multi-year forestry programs (PDFCP), from draft to
//! lock:
//!
//! - **State machine**: five statuses, static role tables
//! - **Cancellation**: justified revert to draft, by the step's owners
//! - **Lock / unlock**: admin-only, with a mandatory motif
//! - **Audit trail**: exactly one history event per accepted action
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      WorkflowService                         │
//! │                                                              │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │  Scope   │──▶│  Status  │──▶│  Apply   │──▶│  Store   │  │
//! │  │(territory)│  │  tables  │   │          │   │ + event  │  │
//! │  └──────────┘   └──────────┘   └──────────┘   └──────────┘  │
//! │                                                     │        │
//! │                                             ┌───────▼─────┐ │
//! │                                             │ AuditTrail  │ │
//! │                                             └─────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every rejection happens before the store is touched, so a denied request
//! leaves neither a program change nor a history event behind.

pub mod audit;
pub mod config;
pub mod notice;
pub mod program;
pub mod service;
pub mod status;
pub mod store;
pub mod types;
pub mod unlock;

// Re-export main types
pub use audit::{AuditTrail, HistoryAction, Performer, RetiredStep, ValidationHistoryEvent};
pub use config::{JustificationConfig, WorkflowConfig};
pub use notice::{CancellationNotice, NoticeRecipients, NoticeSeverity};
pub use program::{Program, ProgramDraft, ProgramEdit};
pub use service::WorkflowService;
pub use status::{available_actions, can_advance, can_cancel, can_unlock, AvailableAction, ValidationStatus};
pub use store::{InMemoryProgramStore, ProgramStore, StoreError};
pub use types::*;
pub use unlock::{UnlockRequest, UnlockRequestBook, UnlockRequestStatus};
