//! The agent engine: a bounded call → parse → dispatch → continue loop.
//!
//! 1. **Assemble** the system message (persona + tool catalog)
//! 2. **Call** the model with the transcript
//! 3. **Parse** `<tool>{...}</tool>` directives out of the reply
//! 4. **If directives**: run each tool, append the results, loop back to 2
//! 5. **Otherwise**: return (or stream) the reply with directives removed
//!
//! The loop ends when a reply carries no directives or the round budget is
//! spent.

pub mod directive;
pub mod dispatch;
pub mod engine;
pub mod invocation;
pub mod persona;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use directive::{ToolDirective, parse, parse_directives, strip_directives};
pub use dispatch::{Dispatched, SourceSet, ToolSet};
pub use engine::{AgentEngine, EngineResult, EventStream, LIMIT_MESSAGE};
pub use invocation::Invocation;
pub use persona::build_system_prompt;
pub use stream_event::AgentEvent;
pub use toolwright_config::StreamStrategy;
