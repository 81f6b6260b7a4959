//! Integration test crate root.

mod mock_agents;
mod session;
