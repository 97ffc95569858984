use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events delivered to everyone viewing a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkspaceEvent {
    TaskCreated {
        task: Value,
    },
    TaskUpdated {
        task_id: String,
    },
    TaskDeleted {
        task_id: String,
    },
    DraftCreated {
        draft: Value,
    },
    DraftUpdated {
        draft: Value,
    },
    DraftDeleted {
        #[serde(rename = "draftId")]
        draft_id: String,
    },
    DraftPublished {
        #[serde(rename = "draftId")]
        draft_id: String,
    },
    MediaUploaded {
        media: Value,
    },
    MemberAdded {
        user_id: String,
    },
    MemberRemoved {
        user_id: String,
    },
    MemberRoleChanged {
        user_id: String,
        role: String,
    },
}

/// Events delivered to one person, across all of their open sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserEvent {
    InvitationCreated { invitation: Value },
    RemovedFromWorkspace { workspace_id: String },
}
