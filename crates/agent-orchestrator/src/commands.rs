use crate::policy::DecisionPolicy;
use crate::status::TickReport;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum AgentCommand {
    /// Begin periodic ticking; the first tick runs immediately.
    Start,
    /// Stop periodic ticking after the tick in progress, if any.
    Stop,
    /// Run one tick now, regardless of state.
    Tick(oneshot::Sender<TickReport>),
    UpdatePolicy(DecisionPolicy),
    Shutdown,
}
