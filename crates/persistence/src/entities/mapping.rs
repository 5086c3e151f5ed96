//! Field mapping entities shared by dataset rules and form mappings.

use domain::models::{FieldMapping, MappingType, Transformation};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for mapping_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "mapping_type", rename_all = "lowercase")]
pub enum MappingTypeDb {
    Direct,
    Sql,
    Transform,
}

impl From<MappingTypeDb> for MappingType {
    fn from(db: MappingTypeDb) -> Self {
        match db {
            MappingTypeDb::Direct => MappingType::Direct,
            MappingTypeDb::Sql => MappingType::Sql,
            MappingTypeDb::Transform => MappingType::Transform,
        }
    }
}

impl From<MappingType> for MappingTypeDb {
    fn from(mapping_type: MappingType) -> Self {
        match mapping_type {
            MappingType::Direct => MappingTypeDb::Direct,
            MappingType::Sql => MappingTypeDb::Sql,
            MappingType::Transform => MappingTypeDb::Transform,
        }
    }
}

/// Row of mapping_dataset_rules or form_field_mappings.
#[derive(Debug, Clone, FromRow)]
pub struct FieldMappingEntity {
    pub id: Uuid,
    pub field_key: String,
    pub target_table: String,
    pub target_column: String,
    pub mapping_type: MappingTypeDb,
    pub sql_query: Option<String>,
    pub transformation: Option<Json<Transformation>>,
    pub position: i32,
}

impl From<FieldMappingEntity> for FieldMapping {
    fn from(entity: FieldMappingEntity) -> Self {
        Self {
            id: entity.id,
            field_key: entity.field_key,
            target_table: entity.target_table,
            target_column: entity.target_column,
            mapping_type: entity.mapping_type.into(),
            sql_query: entity.sql_query,
            transformation: entity.transformation.map(|t| t.0),
            position: entity.position,
        }
    }
}
