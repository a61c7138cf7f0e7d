//! Plan, Level and Task records
//!
//! A Plan is an ordered list of Levels; a Level is a set of mutually
//! independent Tasks. Levels run one after another, Tasks inside a Level run
//! concurrently. The whole tree is serialized as one record per Plan id.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArcaneError, Result};
use crate::id::{generate_level_id, generate_plan_id, generate_task_id};

/// Progress of a Plan, Level or Task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Failed => "Failed",
        }
    }

    /// Returns true once no further transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work executed by one disposable worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Kind of worker the task wants
    pub agent_type: String,
    pub status: Status,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// What the worker reported
    pub output_message: Option<String>,
    #[serde(default)]
    pub input_files: Vec<String>,
    /// Files this task promises to write; disjoint from its siblings' by convention
    #[serde(default)]
    pub output_files: Vec<String>,
    /// `order` of the owning Level
    pub level: u32,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            id: generate_task_id(),
            name: name.into(),
            description: description.into(),
            agent_type: agent_type.into(),
            status: Status::Pending,
            start_time: None,
            end_time: None,
            output_message: None,
            input_files: Vec::new(),
            output_files: Vec::new(),
            level: 0,
        }
    }

    pub fn with_files(mut self, input_files: Vec<String>, output_files: Vec<String>) -> Self {
        self.input_files = input_files;
        self.output_files = output_files;
        self
    }

    pub fn start(&mut self) {
        self.status = Status::InProgress;
        self.start_time = Some(Utc::now());
    }

    /// Record the terminal state and what the worker reported
    pub fn finish(&mut self, success: bool, output: impl Into<String>) {
        self.status = if success { Status::Completed } else { Status::Failed };
        self.end_time = Some(Utc::now());
        self.output_message = Some(output.into());
    }

    /// Forget any earlier run so the task executes again
    pub fn reset(&mut self) {
        self.status = Status::Pending;
        self.start_time = None;
        self.end_time = None;
        self.output_message = None;
    }

    /// Replace the previous level's context in the description.
    ///
    /// Anything after `header` is dropped first, so folding again after a
    /// re-run leaves exactly one context block.
    pub fn fold_context(&mut self, header: &str, context: &str) {
        if let Some(at) = self.description.find(header) {
            self.description.truncate(at);
        }
        self.description.push_str(header);
        self.description.push_str(context);
    }
}

/// A barrier-separated stage of a Plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: String,
    pub order: u32,
    pub tasks: Vec<Task>,
    pub status: Status,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Level {
    pub fn new(order: u32) -> Self {
        Self {
            id: generate_level_id(),
            order,
            tasks: Vec::new(),
            status: Status::Pending,
            start_time: None,
            end_time: None,
        }
    }

    /// Append a task, pointing its back-reference at this level
    pub fn add_task(&mut self, mut task: Task) {
        task.level = self.order;
        self.tasks.push(task);
    }

    pub fn start(&mut self) {
        self.status = Status::InProgress;
        self.start_time = Some(Utc::now());
    }

    /// Put the level and all its tasks back to `Pending`
    pub fn reset(&mut self) {
        self.status = Status::Pending;
        self.start_time = None;
        self.end_time = None;
        for task in &mut self.tasks {
            task.reset();
        }
    }

    /// Mark the level terminal from its tasks' results
    pub fn finish(&mut self) {
        self.status = self.derive_status();
        self.end_time = Some(Utc::now());
    }

    /// `Failed` if any task failed, `Completed` if all completed, otherwise
    /// `In Progress` once anything has started
    pub fn derive_status(&self) -> Status {
        if self.tasks.iter().any(|t| t.status == Status::Failed) {
            Status::Failed
        } else if self.tasks.iter().all(|t| t.status == Status::Completed) {
            Status::Completed
        } else if self.start_time.is_some() || self.tasks.iter().any(|t| t.status != Status::Pending) {
            Status::InProgress
        } else {
            Status::Pending
        }
    }

    /// Task outputs joined in task order
    pub fn output(&self) -> String {
        self.tasks
            .iter()
            .filter_map(|t| t.output_message.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A decomposed piece of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Sorted by `order`
    pub levels: Vec<Level>,
    pub status: Status,
    pub creation_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Shared directory all workers of this plan operate in
    pub work_directory: PathBuf,
}

impl Plan {
    pub fn new(name: impl Into<String>, description: impl Into<String>, work_directory: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_plan_id(),
            name: name.into(),
            description: description.into(),
            levels: Vec::new(),
            status: Status::Pending,
            creation_time: now,
            last_updated: now,
            work_directory: work_directory.into(),
        }
    }

    /// Insert a level at its position by `order`; orders must be unique
    pub fn add_level(&mut self, level: Level) -> Result<()> {
        match self.levels.binary_search_by_key(&level.order, |l| l.order) {
            Ok(_) => Err(ArcaneError::InvalidState(format!(
                "plan {} already has a level with order {}",
                self.id, level.order
            ))),
            Err(pos) => {
                self.levels.insert(pos, level);
                Ok(())
            }
        }
    }

    pub fn level(&self, order: u32) -> Option<&Level> {
        self.levels.iter().find(|l| l.order == order)
    }

    pub fn task_count(&self) -> usize {
        self.levels.iter().map(|l| l.tasks.len()).sum()
    }

    /// `Completed` iff every level completed, `Failed` iff any level failed,
    /// otherwise `In Progress`
    pub fn derive_status(&self) -> Status {
        if self.levels.iter().all(|l| l.status == Status::Completed) {
            Status::Completed
        } else if self.levels.iter().any(|l| l.status == Status::Failed) {
            Status::Failed
        } else {
            Status::InProgress
        }
    }

    /// Recompute status and bump `last_updated`
    pub fn refresh_status(&mut self) {
        self.status = self.derive_status();
        self.last_updated = Utc::now();
    }

    /// Static description of the plan's structure, for worker prompts
    pub fn overview(&self) -> String {
        let mut out = format!("Plan: {}\nDescription: {}\n", self.name, self.description);
        for level in &self.levels {
            out.push_str(&format!("Level {}:\n", level.order));
            for task in &level.tasks {
                out.push_str(&format!("  - {}: {}\n", task.name, first_line(&task.description)));
            }
        }
        out
    }

    /// Live status of every level and task
    pub fn status_report(&self) -> String {
        let mut out = format!("Plan status: {}\n", self.status);
        for level in &self.levels {
            out.push_str(&format!("Level {} [{}]\n", level.order, level.status));
            for task in &level.tasks {
                out.push_str(&format!("  - {} [{}]\n", task.name, task.status));
            }
        }
        out
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
