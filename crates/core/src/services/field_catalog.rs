use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::errors::CoreError;
use crate::models::field::{DataField, DataSource, DataType, FieldValue};
use crate::models::record::{CalendarEvent, Category, Record, Task, XpTransaction};

/// Reads one field out of a record. Returns `None` for absent attributes
/// and for records of another data source.
pub type Extractor = fn(&Record) -> Option<FieldValue>;

/// A resolved field together with its extraction function.
#[derive(Clone, Copy)]
pub struct FieldAccessor {
    field: DataField,
    extract: Extractor,
}

impl FieldAccessor {
    #[must_use]
    pub fn field(&self) -> &DataField {
        &self.field
    }

    #[must_use]
    pub fn extract(&self, record: &Record) -> Option<FieldValue> {
        (self.extract)(record)
    }
}

impl std::fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("field", &self.field)
            .finish()
    }
}

static CATALOG: Lazy<FieldCatalog> = Lazy::new(FieldCatalog::build);

/// Static registry of queryable fields per data source.
///
/// Built once on first use and immutable afterwards. Lookups by
/// `(data source, field id)` are O(1).
pub struct FieldCatalog {
    accessors: Vec<FieldAccessor>,
    index: HashMap<DataSource, HashMap<&'static str, usize>>,
}

impl FieldCatalog {
    /// The process-wide catalog.
    pub fn global() -> &'static FieldCatalog {
        &CATALOG
    }

    /// All fields of `data_source`, in declaration order.
    pub fn fields_for(&self, data_source: DataSource) -> Vec<DataField> {
        self.accessors
            .iter()
            .filter(|a| a.field.data_source == data_source)
            .map(|a| a.field)
            .collect()
    }

    /// Look up a field descriptor.
    pub fn resolve(&self, data_source: DataSource, field_id: &str) -> Result<DataField, CoreError> {
        self.accessor(data_source, field_id).map(|a| a.field)
    }

    /// Look up a field descriptor together with its extraction function.
    pub fn accessor(
        &self,
        data_source: DataSource,
        field_id: &str,
    ) -> Result<FieldAccessor, CoreError> {
        self.index
            .get(&data_source)
            .and_then(|fields| fields.get(field_id))
            .map(|&i| self.accessors[i])
            .ok_or_else(|| CoreError::MissingField {
                data_source,
                field_id: field_id.to_string(),
            })
    }

    /// Extract `field_id` from `record`. An unknown id is an error,
    /// an absent attribute is `Ok(None)`.
    pub fn extract(
        &self,
        data_source: DataSource,
        field_id: &str,
        record: &Record,
    ) -> Result<Option<FieldValue>, CoreError> {
        Ok(self.accessor(data_source, field_id)?.extract(record))
    }

    /// Occurrence timestamp used for time filtering when the X axis is
    /// not a DATE field.
    pub fn timestamp_field(data_source: DataSource) -> &'static str {
        match data_source {
            DataSource::Tasks => "created_at",
            DataSource::XpTransactions => "timestamp",
            DataSource::Categories => "created_at",
            DataSource::CalendarEvents => "start_time",
        }
    }

    fn build() -> Self {
        let mut catalog = Self {
            accessors: Vec::new(),
            index: HashMap::new(),
        };

        use DataSource::*;
        use DataType::*;

        // Tasks
        catalog.register(Tasks, "title", "Title", String, |r| {
            task(r).map(|t| FieldValue::Text(t.title.clone()))
        });
        catalog.register(Tasks, "category", "Category", String, |r| {
            task(r).and_then(|t| t.category_name.clone()).map(FieldValue::Text)
        });
        catalog.register(Tasks, "priority", "Priority", Enum, |r| {
            task(r).map(|t| FieldValue::Enum(t.priority.as_str()))
        });
        catalog.register(Tasks, "status", "Status", Enum, |r| {
            task(r).map(|t| FieldValue::Enum(t.status.as_str()))
        });
        catalog.register(Tasks, "is_completed", "Completed", Boolean, |r| {
            task(r).map(|t| FieldValue::Boolean(t.completion_date.is_some()))
        });
        catalog.register(Tasks, "created_at", "Created", Date, |r| {
            task(r).map(|t| FieldValue::Date(t.created_at))
        });
        catalog.register(Tasks, "due_date", "Due date", Date, |r| {
            task(r).and_then(|t| t.due_date).map(FieldValue::Date)
        });
        catalog.register(Tasks, "completion_date", "Completed on", Date, |r| {
            task(r).and_then(|t| t.completion_date).map(FieldValue::Date)
        });
        catalog.register(Tasks, "xp_reward", "XP reward", Number, |r| {
            task(r).map(|t| FieldValue::Number(t.xp_reward))
        });
        catalog.register(Tasks, "estimated_minutes", "Estimated minutes", Number, |r| {
            task(r).and_then(|t| t.estimated_minutes).map(FieldValue::Number)
        });

        // XP transactions
        catalog.register(XpTransactions, "amount", "Amount", Number, |r| {
            xp(r).map(|x| FieldValue::Number(x.amount))
        });
        catalog.register(XpTransactions, "source", "Source", Enum, |r| {
            xp(r).map(|x| FieldValue::Enum(x.source.as_str()))
        });
        catalog.register(XpTransactions, "description", "Description", String, |r| {
            xp(r).and_then(|x| x.description.clone()).map(FieldValue::Text)
        });
        catalog.register(XpTransactions, "timestamp", "Date", Date, |r| {
            xp(r).map(|x| FieldValue::Date(x.timestamp))
        });

        // Categories
        catalog.register(Categories, "name", "Name", String, |r| {
            category(r).map(|c| FieldValue::Text(c.name.clone()))
        });
        catalog.register(Categories, "created_at", "Created", Date, |r| {
            category(r).map(|c| FieldValue::Date(c.created_at))
        });
        catalog.register(Categories, "task_count", "Tasks", Number, |r| {
            category(r).map(|c| FieldValue::Number(f64::from(c.task_count)))
        });
        catalog.register(Categories, "completed_task_count", "Completed tasks", Number, |r| {
            category(r).map(|c| FieldValue::Number(f64::from(c.completed_task_count)))
        });
        catalog.register(Categories, "total_xp", "Total XP", Number, |r| {
            category(r).map(|c| FieldValue::Number(c.total_xp))
        });

        // Calendar events
        catalog.register(CalendarEvents, "title", "Title", String, |r| {
            calendar_event(r).map(|e| FieldValue::Text(e.title.clone()))
        });
        catalog.register(CalendarEvents, "calendar_name", "Calendar", String, |r| {
            calendar_event(r).map(|e| FieldValue::Text(e.calendar_name.clone()))
        });
        catalog.register(CalendarEvents, "start_time", "Start", Date, |r| {
            calendar_event(r).map(|e| FieldValue::Date(e.start_time))
        });
        catalog.register(CalendarEvents, "end_time", "End", Date, |r| {
            calendar_event(r).map(|e| FieldValue::Date(e.end_time))
        });
        catalog.register(CalendarEvents, "duration_minutes", "Duration (min)", Number, |r| {
            calendar_event(r).map(|e| FieldValue::Number(e.duration_minutes()))
        });
        catalog.register(CalendarEvents, "is_all_day", "All day", Boolean, |r| {
            calendar_event(r).map(|e| FieldValue::Boolean(e.all_day))
        });

        catalog
    }

    fn register(
        &mut self,
        data_source: DataSource,
        id: &'static str,
        label: &'static str,
        data_type: DataType,
        extract: Extractor,
    ) {
        let previous = self
            .index
            .entry(data_source)
            .or_default()
            .insert(id, self.accessors.len());
        debug_assert!(previous.is_none(), "duplicate field {data_source}.{id}");
        self.accessors.push(FieldAccessor {
            field: DataField {
                data_source,
                id,
                label,
                data_type,
            },
            extract,
        });
    }
}

fn task(r: &Record) -> Option<&Task> {
    match r {
        Record::Task(t) => Some(t),
        _ => None,
    }
}

fn xp(r: &Record) -> Option<&XpTransaction> {
    match r {
        Record::XpTransaction(x) => Some(x),
        _ => None,
    }
}

fn category(r: &Record) -> Option<&Category> {
    match r {
        Record::Category(c) => Some(c),
        _ => None,
    }
}

fn calendar_event(r: &Record) -> Option<&CalendarEvent> {
    match r {
        Record::CalendarEvent(e) => Some(e),
        _ => None,
    }
}
