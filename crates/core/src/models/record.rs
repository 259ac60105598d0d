use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::field::DataSource;

/// Priority assigned to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "OPEN",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

/// What earned (or cost) a batch of XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XpSource {
    Task,
    Calendar,
    Streak,
    Bonus,
    Penalty,
}

impl XpSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            XpSource::Task => "TASK",
            XpSource::Calendar => "CALENDAR",
            XpSource::Streak => "STREAK",
            XpSource::Bonus => "BONUS",
            XpSource::Penalty => "PENALTY",
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,

    /// Owning category, if the task was filed under one
    pub category_id: Option<Uuid>,

    /// Denormalized category name for grouping
    pub category_name: Option<String>,

    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,

    /// Set once the task is marked done
    pub completion_date: Option<DateTime<Utc>>,

    /// XP granted on completion
    pub xp_reward: f64,
    pub estimated_minutes: Option<f64>,
}

impl Task {
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            category_id: None,
            category_name: None,
            priority: TaskPriority::Medium,
            status: TaskStatus::Open,
            created_at,
            due_date: None,
            completion_date: None,
            xp_reward: 0.0,
            estimated_minutes: None,
        }
    }

    /// Mark the task done at `at`.
    #[must_use]
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.status = TaskStatus::Done;
        self.completion_date = Some(at);
        self
    }

    #[must_use]
    pub fn in_category(mut self, id: Uuid, name: impl Into<String>) -> Self {
        self.category_id = Some(id);
        self.category_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_xp(mut self, xp: f64) -> Self {
        self.xp_reward = xp;
        self
    }
}

/// A single XP gain or loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpTransaction {
    pub id: Uuid,

    /// Positive for gains, negative for penalties
    pub amount: f64,
    pub source: XpSource,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl XpTransaction {
    pub fn new(amount: f64, source: XpSource, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            source,
            category_id: None,
            description: None,
            timestamp,
        }
    }
}

/// A user-defined category with its rolled-up counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub task_count: u32,
    pub completed_task_count: u32,
    pub total_xp: f64,
}

impl Category {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at,
            task_count: 0,
            completed_task_count: 0,
            total_xp: 0.0,
        }
    }
}

/// An event linked from the device calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub calendar_name: String,
    pub category_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
}

impl CalendarEvent {
    pub fn new(
        title: impl Into<String>,
        calendar_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            calendar_name: calendar_name.into(),
            category_id: None,
            start_time,
            end_time,
            all_day: false,
        }
    }

    /// Length in minutes; never negative.
    #[must_use]
    pub fn duration_minutes(&self) -> f64 {
        let minutes = (self.end_time - self.start_time).num_seconds() as f64 / 60.0;
        minutes.max(0.0)
    }
}

/// A raw record as handed over by a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Task(Task),
    XpTransaction(XpTransaction),
    Category(Category),
    CalendarEvent(CalendarEvent),
}

impl Record {
    #[must_use]
    pub fn data_source(&self) -> DataSource {
        match self {
            Record::Task(_) => DataSource::Tasks,
            Record::XpTransaction(_) => DataSource::XpTransactions,
            Record::Category(_) => DataSource::Categories,
            Record::CalendarEvent(_) => DataSource::CalendarEvents,
        }
    }

    /// Category this record belongs to; a category record is its own.
    #[must_use]
    pub fn category_id(&self) -> Option<Uuid> {
        match self {
            Record::Task(t) => t.category_id,
            Record::XpTransaction(x) => x.category_id,
            Record::Category(c) => Some(c.id),
            Record::CalendarEvent(e) => e.category_id,
        }
    }
}

impl From<Task> for Record {
    fn from(t: Task) -> Self {
        Record::Task(t)
    }
}

impl From<XpTransaction> for Record {
    fn from(x: XpTransaction) -> Self {
        Record::XpTransaction(x)
    }
}

impl From<Category> for Record {
    fn from(c: Category) -> Self {
        Record::Category(c)
    }
}

impl From<CalendarEvent> for Record {
    fn from(e: CalendarEvent) -> Self {
        Record::CalendarEvent(e)
    }
}
