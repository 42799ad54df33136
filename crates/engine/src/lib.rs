// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ductile-engine: the Durable Store, Work Queue, Scheduler, Dispatcher,
//! Router, Sync Bridge, Event Hub, and Retention Pruner, composed behind
//! the `EngineFacade` trait an HTTP/webhook/CLI front end is written
//! against.

mod context_ledger;
mod dispatcher;
mod error;
mod event_hub;
mod facade;
mod protocol;
mod pruner;
mod router;
mod scheduler;
mod store;
mod sync_bridge;
mod work_queue;
mod workspace_manager;

pub use context_ledger::{is_origin_key, ContextLedger};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::EngineError;
pub use event_hub::EventHub;
pub use facade::{Engine, EngineFacade, EngineTuning, EnqueueRequest, HealthStatus, PipelineTrigger};
pub use protocol::{
    parse_response, LogLine, ProtocolError, RequestEnvelope, ResponseEnvelope, ResponseStatus, CONFIG_ERROR_EXIT_CODE,
    PROTOCOL_VERSION,
};
pub use pruner::{Pruner, PruneReport};
pub use router::Router;
pub use scheduler::{jitter_ms, parse_schedule_expr, ScheduleEntry, Scheduler};
pub use store::{default_paths, Store};
pub use sync_bridge::{SyncBridge, SyncOutcome, SyncResult, TreeNode};
pub use work_queue::{Completion, EnqueueParams, JobFilter, WorkQueue};
pub use workspace_manager::{WorkspaceError, WorkspaceManager};
