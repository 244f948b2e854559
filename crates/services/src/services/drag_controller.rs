//! Transient drag-and-drop state for the board.

use tracing::debug;
use uuid::Uuid;

use super::project_store::BoardState;

/// The value carried in the platform drag data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    text: String,
}

impl DragPayload {
    pub const MIME_TYPE: &'static str = "text/plain";

    pub fn for_project(project_id: Uuid) -> Self {
        Self {
            text: project_id.to_string(),
        }
    }

    /// Wrap whatever text the platform handed back on drop.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn project_id(&self) -> Option<Uuid> {
        Uuid::parse_str(self.text.trim()).ok()
    }
}

/// A resolved drop that needs a stage transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropRequest {
    pub project_id: Uuid,
    pub from_stage: String,
    pub to_stage: String,
}

#[derive(Debug, Default)]
pub struct DragController {
    dragged_project_id: Option<Uuid>,
    drag_over_column: Option<String>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dragged_project_id(&self) -> Option<Uuid> {
        self.dragged_project_id
    }

    pub fn drag_over_column(&self) -> Option<&str> {
        self.drag_over_column.as_deref()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragged_project_id.is_some()
    }

    pub fn drag_start(&mut self, project_id: Uuid) -> DragPayload {
        self.dragged_project_id = Some(project_id);
        DragPayload::for_project(project_id)
    }

    pub fn drag_enter(&mut self, column: &str) {
        self.drag_over_column = Some(column.to_string());
    }

    pub fn drag_leave(&mut self) {
        self.drag_over_column = None;
    }

    /// Resolve the dropped project and its current column.
    ///
    /// The payload wins over in-memory state, since a re-render may have cleared the
    /// latter. Transient state is cleared either way. Returns `None` when nothing
    /// resolves or the project is already in `column`.
    pub fn drop(
        &mut self,
        column: &str,
        payload: Option<&DragPayload>,
        board: &BoardState,
    ) -> Option<DropRequest> {
        let project_id = payload
            .and_then(DragPayload::project_id)
            .or(self.dragged_project_id);
        self.clear();

        let project_id = project_id?;
        let Some(from_stage) = board.find_stage_of(project_id) else {
            debug!(%project_id, "Dropped project is no longer on the board");
            return None;
        };
        if from_stage == column {
            return None;
        }

        Some(DropRequest {
            project_id,
            from_stage: from_stage.to_string(),
            to_stage: column.to_string(),
        })
    }

    /// Always runs after a drag, dropped or not.
    pub fn drag_end(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.dragged_project_id = None;
        self.drag_over_column = None;
    }
}
