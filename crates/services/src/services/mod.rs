pub mod board_api;
pub mod board_session;
pub mod claude_api;
pub mod creation_workflow;
pub mod drag_controller;
pub mod project_store;
pub mod project_suggestions;
pub mod stage_registry;
pub mod stage_transition;

#[cfg(test)]
pub(crate) mod test_support;
