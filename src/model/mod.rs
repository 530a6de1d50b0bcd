mod connection;
mod node;
mod workflow;

pub use connection::{Connection, ConnectionTarget, Connections, MAIN, OutputSlots};
pub use node::{ERROR_OUTPUT_MODE, NodeModel, normalize_name};
pub use workflow::WorkflowModel;
