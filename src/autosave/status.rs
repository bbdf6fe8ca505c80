use crate::error::SaveError;

/// Save state surfaced to the host for UI feedback. Lives as long as the
/// mounted component; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Nothing to save.
    #[default]
    Idle,
    /// An edit arrived; a timer is armed.
    Pending,
    /// The save target is working on a snapshot.
    Saving,
    /// Last save succeeded.
    Saved,
    /// Last save failed. Cleared by the next edit.
    Failed(SaveError),
}

impl SaveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "IDLE",
            SaveStatus::Pending => "PENDING",
            SaveStatus::Saving => "SAVING",
            SaveStatus::Saved => "SAVED",
            SaveStatus::Failed(_) => "ERROR",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SaveStatus::Failed(_))
    }
}
