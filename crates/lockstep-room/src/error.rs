//! Error types for the room layer.

/// Errors from room creation.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A room with this id is already registered.
    #[error("room id {0} exists")]
    Exists(u64),
}
