//! Mapping dataset entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::mapping_dataset::MappingDatasetSummary;
use domain::models::MappingDataset;
use sqlx::FromRow;
use uuid::Uuid;

use super::form::TargetModuleDb;
use super::mapping::FieldMappingEntity;

/// Database row mapping for the mapping_datasets table.
#[derive(Debug, Clone, FromRow)]
pub struct MappingDatasetEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_module: TargetModuleDb,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MappingDatasetEntity {
    pub fn into_dataset(self, rules: Vec<FieldMappingEntity>) -> MappingDataset {
        MappingDataset {
            id: self.id,
            name: self.name,
            description: self.description,
            target_module: self.target_module.into(),
            created_by: self.created_by,
            mappings: rules.into_iter().map(Into::into).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Dataset row with its rule count, for listings.
#[derive(Debug, Clone, FromRow)]
pub struct MappingDatasetSummaryEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_module: TargetModuleDb,
    pub mapping_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<MappingDatasetSummaryEntity> for MappingDatasetSummary {
    fn from(entity: MappingDatasetSummaryEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            target_module: entity.target_module.into(),
            mapping_count: entity.mapping_count,
            updated_at: entity.updated_at,
        }
    }
}
