//! Persistence of sales records keyed by task name.
//!
//! A task is always written as a whole: [`TaskStore::replace_task`] deletes
//! the previous records and inserts the new ones atomically, so readers see
//! either the old or the new record set and never a mixture.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Mutex, MutexGuard, RwLock},
};

use log::debug;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ReportError, Result},
    schema::SalesRecord,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_name: String,
    pub record_count: usize,
}

pub trait TaskStore: Send + Sync {
    fn replace_task(&self, task_name: &str, records: &[SalesRecord]) -> Result<usize>;
    /// Records in insertion order, or [`ReportError::NotFound`].
    fn get_task(&self, task_name: &str) -> Result<Vec<SalesRecord>>;
    /// Tasks sorted by name.
    fn list_tasks(&self) -> Result<Vec<TaskSummary>>;
}

impl<T: TaskStore + ?Sized> TaskStore for &T {
    fn replace_task(&self, task_name: &str, records: &[SalesRecord]) -> Result<usize> {
        (**self).replace_task(task_name, records)
    }

    fn get_task(&self, task_name: &str) -> Result<Vec<SalesRecord>> {
        (**self).get_task(task_name)
    }

    fn list_tasks(&self) -> Result<Vec<TaskSummary>> {
        (**self).list_tasks()
    }
}

const CREATE_SALES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sales (
    task_name          TEXT NOT NULL,
    sale_id            TEXT NOT NULL,
    company            TEXT,
    car_model          TEXT,
    manufacturing_year INTEGER,
    price              REAL,
    sales_location     TEXT,
    date_of_sale       TEXT,
    CONSTRAINT pk_sale PRIMARY KEY (task_name, sale_id)
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                ReportError::PersistenceState(format!("Creating directory {parent:?}: {err}"))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_SALES_TABLE)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ReportError::PersistenceState("connection lock poisoned".into()))
    }
}

impl TaskStore for SqliteStore {
    fn replace_task(&self, task_name: &str, records: &[SalesRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        // Dropping the transaction without commit rolls back both statements.
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM sales WHERE task_name = ?1", params![task_name])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO sales (task_name, sale_id, company, car_model, manufacturing_year, \
                 price, sales_location, date_of_sale) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for record in records {
                insert.execute(params![
                    task_name,
                    record.sale_id,
                    record.company,
                    record.car_model,
                    record.manufacturing_year,
                    record.price,
                    record.sales_location,
                    record.date_of_sale,
                ])?;
            }
        }
        tx.commit()?;
        debug!(
            "Replaced task '{task_name}': removed {removed} row(s), inserted {}",
            records.len()
        );
        Ok(records.len())
    }

    fn get_task(&self, task_name: &str) -> Result<Vec<SalesRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT task_name, sale_id, company, car_model, manufacturing_year, price, \
             sales_location, date_of_sale FROM sales WHERE task_name = ?1 ORDER BY rowid",
        )?;
        let records = stmt
            .query_map(params![task_name], |row| {
                Ok(SalesRecord {
                    task_name: row.get(0)?,
                    sale_id: row.get(1)?,
                    company: row.get(2)?,
                    car_model: row.get(3)?,
                    manufacturing_year: row.get(4)?,
                    price: row.get(5)?,
                    sales_location: row.get(6)?,
                    date_of_sale: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if records.is_empty() {
            return Err(ReportError::NotFound(task_name.to_string()));
        }
        Ok(records)
    }

    fn list_tasks(&self) -> Result<Vec<TaskSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT task_name, COUNT(*) FROM sales GROUP BY task_name ORDER BY task_name",
        )?;
        let tasks = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok(TaskSummary {
                    task_name: row.get(0)?,
                    record_count: count as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}

/// Process-local store. Each task's records are swapped in one write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RwLock<BTreeMap<String, Vec<SalesRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> ReportError {
    ReportError::PersistenceState("task map lock poisoned".into())
}

impl TaskStore for MemoryStore {
    fn replace_task(&self, task_name: &str, records: &[SalesRecord]) -> Result<usize> {
        let mut stored = records.to_vec();
        for record in &mut stored {
            record.task_name = task_name.to_string();
        }
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        if stored.is_empty() {
            tasks.remove(task_name);
        } else {
            tasks.insert(task_name.to_string(), stored);
        }
        Ok(records.len())
    }

    fn get_task(&self, task_name: &str) -> Result<Vec<SalesRecord>> {
        let tasks = self.tasks.read().map_err(poisoned)?;
        tasks
            .get(task_name)
            .cloned()
            .ok_or_else(|| ReportError::NotFound(task_name.to_string()))
    }

    fn list_tasks(&self) -> Result<Vec<TaskSummary>> {
        let tasks = self.tasks.read().map_err(poisoned)?;
        Ok(tasks
            .iter()
            .map(|(name, records)| TaskSummary {
                task_name: name.clone(),
                record_count: records.len(),
            })
            .collect())
    }
}
