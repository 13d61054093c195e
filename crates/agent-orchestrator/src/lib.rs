pub mod agent_actor;
pub mod agent_handle;
pub mod commands;
pub mod decision_loop;
pub mod events;
pub mod policy;
pub mod status;
pub mod watchlist;

pub use agent_actor::AgentActor;
pub use agent_handle::AgentHandle;
pub use commands::AgentCommand;
pub use decision_loop::{DecisionLoop, FillTarget, LedgerWrite, LoopSettings, PendingRecord};
pub use events::AgentEvent;
pub use policy::{Decision, DecisionPolicy};
pub use status::{
    AgentState, AgentStatus, ExecutionReport, FailureRecord, InstrumentOutcome, Phase, TickReport,
};
pub use watchlist::{Snapshot, Watchlist};
