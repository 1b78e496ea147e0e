//! Display projection of non-chat plan tasks, re-emitted on every status change.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Whether `next` is a legal successor of `self` under the monotonic
    /// `pending -> in_progress -> done` property (spec §8).
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, InProgress)
                | (Pending, Done)
                | (InProgress, InProgress)
                | (InProgress, Done)
                | (Done, Done)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransparencyTask {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    /// Index into `ExecutionPlan::tasks`; injective across all transparency
    /// tasks for one plan (spec §3 invariant).
    #[serde(rename = "_planIndex")]
    pub plan_index: usize,
}

impl TransparencyTask {
    pub fn new(id: impl Into<String>, description: impl Into<String>, plan_index: usize) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            plan_index,
        }
    }

    /// Advances status in place; panics (caller bug, not a runtime error) if
    /// the transition would violate monotonicity.
    pub fn advance(&mut self, next: TaskStatus) {
        assert!(
            self.status.can_advance_to(next),
            "illegal transparency status transition: {:?} -> {:?}",
            self.status,
            next
        );
        self.status = next;
    }
}
