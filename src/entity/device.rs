use crate::schema::devices;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// One equipment record as stored in the `devices` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Serialize)]
#[diesel(table_name = devices)]
pub struct Device {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub status: String,
    pub location: Option<String>,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
    pub date_added: String,
    pub date_updated: String,
}

#[derive(Insertable)]
#[diesel(table_name = devices)]
pub struct NewDevice<'a> {
    pub name: &'a str,
    pub device_type: &'a str,
    pub serial_number: Option<&'a str>,
    pub manufacturer: Option<&'a str>,
    pub model: Option<&'a str>,
    pub status: &'a str,
    pub location: Option<&'a str>,
    pub assigned_to: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub date_added: &'a str,
    pub date_updated: &'a str,
}

/// Mutable device fields as submitted by a client (JSON body or CSV row).
/// Everything is optional at the wire level; `has_required` is the gate the
/// API applies before handing the fields to the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DeviceInput {
    /// True when `name`, `type` and `status` are all present and non-blank.
    pub fn has_required(&self) -> bool {
        fn filled(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        filled(&self.name) && filled(&self.device_type) && filled(&self.status)
    }
}
