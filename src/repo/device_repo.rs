use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;

use crate::{
    db::Pool,
    entity::device::{Device, DeviceInput, NewDevice},
    schema::devices,
};

/// Aggregate counts reported by `GET /api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub total: i64,
    pub available: i64,
    pub in_use: i64,
}

/// Row timestamps use the same shape SQLite's CURRENT_TIMESTAMP produces.
fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

struct DeviceRepoImpl {
    pool: Pool,
}

impl DeviceRepoImpl {
    fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>> {
        Ok(self.pool.get()?)
    }

    fn insert(&self, input: &DeviceInput) -> Result<Device> {
        let mut conn = self.conn()?;
        let now = now_timestamp();
        let new_row = NewDevice {
            name: input.name.as_deref().unwrap_or(""),
            device_type: input.device_type.as_deref().unwrap_or(""),
            serial_number: input.serial_number.as_deref(),
            manufacturer: input.manufacturer.as_deref(),
            model: input.model.as_deref(),
            status: input.status.as_deref().unwrap_or(""),
            location: input.location.as_deref(),
            assigned_to: input.assigned_to.as_deref(),
            notes: input.notes.as_deref(),
            date_added: &now,
            date_updated: &now,
        };
        // Insert and read back the assigned row in one transaction so a
        // concurrent insert cannot slip in between.
        let created = conn.immediate_transaction(|c| {
            diesel::insert_into(devices::table)
                .values(&new_row)
                .execute(c)?;
            devices::table
                .order(devices::id.desc())
                .first::<Device>(c)
        })?;
        Ok(created)
    }

    fn get(&self, id: i32) -> Result<Option<Device>> {
        let mut conn = self.conn()?;
        let row = devices::table
            .find(id)
            .first::<Device>(&mut conn)
            .optional()?;
        Ok(row)
    }

    fn list(&self, search: Option<&str>) -> Result<Vec<Device>> {
        let mut conn = self.conn()?;
        let mut query = devices::table.into_boxed();
        if let Some(term) = search {
            // SQLite LIKE is case-insensitive for ASCII, matching the
            // search contract for every text field a user can fill in.
            let pattern = format!("%{}%", term.trim());
            query = query.filter(
                devices::name
                    .like(pattern.clone())
                    .or(devices::device_type.like(pattern.clone()))
                    .or(devices::serial_number.like(pattern.clone()))
                    .or(devices::manufacturer.like(pattern.clone()))
                    .or(devices::model.like(pattern.clone()))
                    .or(devices::location.like(pattern.clone()))
                    .or(devices::assigned_to.like(pattern)),
            );
        }
        let rows = query
            .order((devices::date_added.desc(), devices::id.desc()))
            .load::<Device>(&mut conn)?;
        Ok(rows)
    }

    fn update(&self, id: i32, input: &DeviceInput) -> Result<Option<Device>> {
        let mut conn = self.conn()?;
        let now = now_timestamp();
        let affected = diesel::update(devices::table.find(id))
            .set((
                devices::name.eq(input.name.as_deref().unwrap_or("")),
                devices::device_type.eq(input.device_type.as_deref().unwrap_or("")),
                devices::serial_number.eq(input.serial_number.as_deref()),
                devices::manufacturer.eq(input.manufacturer.as_deref()),
                devices::model.eq(input.model.as_deref()),
                devices::status.eq(input.status.as_deref().unwrap_or("")),
                devices::location.eq(input.location.as_deref()),
                devices::assigned_to.eq(input.assigned_to.as_deref()),
                devices::notes.eq(input.notes.as_deref()),
                devices::date_updated.eq(now.as_str()),
            ))
            .execute(&mut conn)?;
        if affected == 0 {
            return Ok(None);
        }
        Self::get(self, id)
    }

    fn delete(&self, id: i32) -> Result<usize> {
        let mut conn = self.conn()?;
        Ok(diesel::delete(devices::table.find(id)).execute(&mut conn)?)
    }

    fn stats(&self) -> Result<InventoryStats> {
        let mut conn = self.conn()?;
        let total: i64 = devices::table.count().get_result(&mut conn)?;
        let available: i64 = devices::table
            .filter(devices::status.eq("Available"))
            .count()
            .get_result(&mut conn)?;
        let in_use: i64 = devices::table
            .filter(devices::status.eq("In Use"))
            .count()
            .get_result(&mut conn)?;
        Ok(InventoryStats {
            total,
            available,
            in_use,
        })
    }
}

/// Repository interface for device records.
/// Public trait; concrete implementation is private to this module.
pub trait DeviceRepo: Send + Sync + 'static {
    /// Insert a row with the given fields (validated by the caller) and
    /// return the created record including assigned id and timestamps.
    fn insert(&self, input: &DeviceInput) -> Result<Device>;

    fn get(&self, id: i32) -> Result<Option<Device>>;

    /// All records newest-first; with a search term, only records where any
    /// searchable text field contains the term (case-insensitive).
    fn list(&self, search: Option<&str>) -> Result<Vec<Device>>;

    /// Overwrite all mutable fields and refresh `date_updated`. Returns
    /// `None` when no record has that id.
    fn update(&self, id: i32, input: &DeviceInput) -> Result<Option<Device>>;

    /// Returns the number of rows removed (0 means not found).
    fn delete(&self, id: i32) -> Result<usize>;

    fn stats(&self) -> Result<InventoryStats>;
}

impl DeviceRepo for DeviceRepoImpl {
    fn insert(&self, input: &DeviceInput) -> Result<Device> {
        Self::insert(self, input)
    }

    fn get(&self, id: i32) -> Result<Option<Device>> {
        Self::get(self, id)
    }

    fn list(&self, search: Option<&str>) -> Result<Vec<Device>> {
        Self::list(self, search)
    }

    fn update(&self, id: i32, input: &DeviceInput) -> Result<Option<Device>> {
        Self::update(self, id, input)
    }

    fn delete(&self, id: i32) -> Result<usize> {
        Self::delete(self, id)
    }

    fn stats(&self) -> Result<InventoryStats> {
        Self::stats(self)
    }
}

/// Create a new device repository instance. The concrete type is hidden; callers only see the trait.
pub fn new_device_repo(pool: Pool) -> impl DeviceRepo {
    DeviceRepoImpl::new(pool)
}

/// Insert a handful of sample devices when the table is empty so a fresh
/// install has something to show. Returns how many rows were inserted.
pub fn seed_sample_devices<R: DeviceRepo>(repo: &R) -> Result<usize> {
    if repo.stats()?.total > 0 {
        return Ok(0);
    }
    let samples = [
        DeviceInput {
            name: Some("MacBook Pro 16\"".into()),
            device_type: Some("Laptop".into()),
            serial_number: Some("MBP2023001".into()),
            manufacturer: Some("Apple".into()),
            model: Some("MacBook Pro".into()),
            status: Some("In Use".into()),
            location: Some("Office 201".into()),
            assigned_to: Some("John Doe".into()),
            notes: Some("Primary work laptop".into()),
        },
        DeviceInput {
            name: Some("Dell Monitor 27\"".into()),
            device_type: Some("Monitor".into()),
            serial_number: Some("DM27001".into()),
            manufacturer: Some("Dell".into()),
            model: Some("UltraSharp 27".into()),
            status: Some("Available".into()),
            location: Some("Storage Room".into()),
            assigned_to: None,
            notes: Some("Secondary monitor for developers".into()),
        },
        DeviceInput {
            name: Some("HP Printer LaserJet".into()),
            device_type: Some("Printer".into()),
            serial_number: Some("HP2023LJ001".into()),
            manufacturer: Some("HP".into()),
            model: Some("LaserJet Pro".into()),
            status: Some("Maintenance".into()),
            location: Some("Office Floor 1".into()),
            assigned_to: None,
            notes: Some("Needs toner replacement".into()),
        },
    ];
    for sample in &samples {
        repo.insert(sample)?;
    }
    Ok(samples.len())
}
