//! Target modules and the tables each one may write into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical grouping of whitelisted tables a form or mapping dataset may write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetModule {
    Registratura,
    GeneralRegister,
    Events,
    Partners,
}

const REGISTRATURA_TABLES: &[&str] = &[
    "document_registry",
    "document_attachments",
    "registry_contacts",
];
const GENERAL_REGISTER_TABLES: &[&str] = &["general_register", "general_register_entries"];
const EVENTS_TABLES: &[&str] = &["events", "event_participants"];
const PARTNERS_TABLES: &[&str] = &["partners", "partner_contacts"];

impl TargetModule {
    pub const ALL: [TargetModule; 4] = [
        TargetModule::Registratura,
        TargetModule::GeneralRegister,
        TargetModule::Events,
        TargetModule::Partners,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetModule::Registratura => "registratura",
            TargetModule::GeneralRegister => "general_register",
            TargetModule::Events => "events",
            TargetModule::Partners => "partners",
        }
    }

    /// Tables this module's mappings and SQL fragments may reference.
    pub fn available_tables(&self) -> &'static [&'static str] {
        match self {
            TargetModule::Registratura => REGISTRATURA_TABLES,
            TargetModule::GeneralRegister => GENERAL_REGISTER_TABLES,
            TargetModule::Events => EVENTS_TABLES,
            TargetModule::Partners => PARTNERS_TABLES,
        }
    }

    /// Case-insensitive whitelist membership.
    pub fn allows_table(&self, table: &str) -> bool {
        self.available_tables()
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table))
    }
}

impl FromStr for TargetModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "registratura" => Ok(TargetModule::Registratura),
            "general_register" => Ok(TargetModule::GeneralRegister),
            "events" => Ok(TargetModule::Events),
            "partners" => Ok(TargetModule::Partners),
            _ => Err(format!("Invalid target module: {}", s)),
        }
    }
}

impl fmt::Display for TargetModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
