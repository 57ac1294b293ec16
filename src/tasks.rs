//! Task dispatch (C9, spec §4.9): small records piggy-backed on data
//! exchanges — remote commands relayed proxy→agent with results flowing
//! back, and acknowledgements relayed server→proxy. Grounded on the
//! teacher's `api/models` request/response pairing style, generalized to a
//! tagged `TaskKind` enum instead of one struct per wire shape.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteOn {
    Agent,
    Server,
    Proxy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub execute_on: ExecuteOn,
    pub port: Option<u16>,
    pub auth_user: Option<String>,
    pub auth_password: Option<String>,
    pub command: String,
    pub parent_task_id: u64,
    pub host_id: u64,
    pub alert_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommandResult {
    pub parent_task_id: u64,
    pub success: bool,
    pub info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub acknowledge_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    RemoteCommand(RemoteCommand),
    RemoteCommandResult(RemoteCommandResult),
    Acknowledgement(Acknowledgement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    InProgress,
    Done,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub payload: TaskPayload,
    pub status: TaskStatus,
    pub clock: i64,
    pub ttl: u32,
}

impl Task {
    pub fn new(id: u64, payload: TaskPayload, created_at: Timestamp, ttl: u32) -> Self {
        Self { id, payload, status: TaskStatus::New, clock: created_at.secs, ttl }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.status != TaskStatus::Done && now.secs >= self.clock + self.ttl as i64
    }

    /// Advances `status` to `Expired` if the ttl has elapsed and the task
    /// has not already finished; returns whether a transition happened.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        if self.status == TaskStatus::New || self.status == TaskStatus::InProgress {
            if self.is_expired(now) {
                self.status = TaskStatus::Expired;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_command() -> TaskPayload {
        TaskPayload::RemoteCommand(RemoteCommand {
            execute_on: ExecuteOn::Agent,
            port: Some(10050),
            auth_user: None,
            auth_password: None,
            command: "systemctl restart app".to_string(),
            parent_task_id: 1,
            host_id: 42,
            alert_id: None,
        })
    }

    #[test]
    fn new_task_starts_in_new_status() {
        let task = Task::new(1, sample_command(), Timestamp::from_secs(1000), 60);
        assert_eq!(task.status, TaskStatus::New);
    }

    #[test]
    fn tick_expires_after_ttl() {
        let mut task = Task::new(1, sample_command(), Timestamp::from_secs(1000), 60);
        assert!(!task.tick(Timestamp::from_secs(1030)));
        assert_eq!(task.status, TaskStatus::New);
        assert!(task.tick(Timestamp::from_secs(1061)));
        assert_eq!(task.status, TaskStatus::Expired);
    }

    #[test]
    fn done_tasks_never_expire() {
        let mut task = Task::new(1, sample_command(), Timestamp::from_secs(1000), 60);
        task.status = TaskStatus::Done;
        assert!(!task.tick(Timestamp::from_secs(5000)));
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let payload = TaskPayload::Acknowledgement(Acknowledgement { acknowledge_id: 9 });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "acknowledgement");
        assert_eq!(json["acknowledge_id"], 9);
    }
}
