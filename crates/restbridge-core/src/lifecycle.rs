use crate::CoreError;
use restbridge_schema::PropertyMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a managed resource instance stands between lifecycle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Unmanaged,
    PendingCreate,
    Active,
    PendingUpdate,
    PendingDelete,
    Gone,
}

impl ResourceState {
    /// State implied by what the engine persisted for an instance: nothing
    /// persisted means the instance is not managed yet.
    pub fn of_persisted(properties: &PropertyMap) -> Self {
        if properties.is_empty() {
            ResourceState::Unmanaged
        } else {
            ResourceState::Active
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceState::Unmanaged => "unmanaged",
            ResourceState::PendingCreate => "pending-create",
            ResourceState::Active => "active",
            ResourceState::PendingUpdate => "pending-update",
            ResourceState::PendingDelete => "pending-delete",
            ResourceState::Gone => "gone",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: ResourceState, to: ResourceState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (ResourceState::Unmanaged, ResourceState::PendingCreate | ResourceState::Active)
            | (
                ResourceState::PendingCreate,
                ResourceState::Active | ResourceState::Unmanaged
            )
            | (
                ResourceState::Active,
                ResourceState::Active | ResourceState::PendingUpdate | ResourceState::PendingDelete
            )
            | (ResourceState::PendingUpdate, ResourceState::Active)
            | (
                ResourceState::PendingDelete,
                ResourceState::Gone | ResourceState::Active
            )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
