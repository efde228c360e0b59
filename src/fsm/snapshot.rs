//! Snapshots of FSM execution state.
//!
//! Lets a caller park an FSM instance (current state, context, history) and
//! resume it later, possibly in another process.

use super::error::SnapshotError;
use super::executor::FsmExecutionState;
use super::model::FsmSubcontract;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version identifier for the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable capture of an [`FsmExecutionState`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FsmSnapshot {
    pub version: u32,
    pub id: Uuid,
    pub fsm_name: String,
    pub taken_at: DateTime<Utc>,
    pub state: FsmExecutionState,
}

// bincode cannot carry a free-form JSON value, so the binary form keeps the
// context as JSON text.
#[derive(Serialize, Deserialize)]
struct BinarySnapshot {
    version: u32,
    id: Uuid,
    fsm_name: String,
    taken_at: DateTime<Utc>,
    current_state: String,
    context_json: String,
    history: Vec<String>,
}

impl FsmSnapshot {
    pub fn capture(fsm: &FsmSubcontract, state: &FsmExecutionState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4(),
            fsm_name: fsm.fsm_name().to_string(),
            taken_at: Utc::now(),
            state: state.clone(),
        }
    }

    /// Check the snapshot belongs to `fsm` and hand back the execution state.
    pub fn restore(self, fsm: &FsmSubcontract) -> Result<FsmExecutionState, SnapshotError> {
        if self.fsm_name != fsm.fsm_name() {
            return Err(SnapshotError::FsmMismatch {
                expected: fsm.fsm_name().to_string(),
                found: self.fsm_name,
            });
        }
        if !fsm.has_state(&self.state.current_state) {
            return Err(SnapshotError::UnknownState(self.state.current_state));
        }
        Ok(self.state)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        check_version(snapshot.version)?;
        Ok(snapshot)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let context_json = serde_json::to_string(&self.state.context)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))?;
        let binary = BinarySnapshot {
            version: self.version,
            id: self.id,
            fsm_name: self.fsm_name.clone(),
            taken_at: self.taken_at,
            current_state: self.state.current_state.clone(),
            context_json,
            history: self.state.history.clone(),
        };
        bincode::serialize(&binary).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let binary: BinarySnapshot = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        check_version(binary.version)?;
        let context = serde_json::from_str(&binary.context_json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;

        Ok(Self {
            version: binary.version,
            id: binary.id,
            fsm_name: binary.fsm_name,
            taken_at: binary.taken_at,
            state: FsmExecutionState {
                current_state: binary.current_state,
                context,
                history: binary.history,
            },
        })
    }
}

fn check_version(found: u32) -> Result<(), SnapshotError> {
    if found == SNAPSHOT_VERSION {
        Ok(())
    } else {
        Err(SnapshotError::UnsupportedVersion {
            found,
            supported: SNAPSHOT_VERSION,
        })
    }
}
