//! Collection row mapping, one repository value per `CollectionKind`.

use super::codec::{decode_members, encode_members};
use super::{EntityRepository, RepoResult, COMMON_KEY, NAMESPACE};
use crate::model::collection::{Collection, CollectionKind, NewCollection};
use crate::model::EntityKind;
use crate::store::{Columns, Row, RowKey, ScanSpec, COMMON_KEY_COLUMN};

/// Repository for group or movie rows.
#[derive(Debug, Clone, Copy)]
pub struct CollectionRepository {
    kind: CollectionKind,
}

impl CollectionRepository {
    pub fn new(kind: CollectionKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }
}

impl EntityRepository for CollectionRepository {
    type Entity = Collection;
    type Fields = NewCollection;

    fn entity_kind(&self) -> EntityKind {
        self.kind.entity_kind()
    }

    fn row_key(&self, id: &str) -> RowKey {
        RowKey::new(NAMESPACE, self.kind.table(), id)
    }

    fn scan_spec(&self) -> ScanSpec {
        ScanSpec::new(NAMESPACE, self.kind.table(), COMMON_KEY)
    }

    fn entity_id<'a>(&self, entity: &'a Collection) -> &'a str {
        &entity.id
    }

    fn build(&self, id: &str, fields: NewCollection) -> Collection {
        Collection {
            id: id.to_string(),
            kind: self.kind,
            name: fields.name,
            members: fields.members,
        }
    }

    fn encode(&self, collection: &Collection) -> RepoResult<Columns> {
        let mut columns = Columns::new();
        columns.insert(
            self.kind.name_column().to_string(),
            collection.name.clone(),
        );
        columns.insert(
            self.kind.members_column().to_string(),
            encode_members(&collection.members)?,
        );
        columns.insert(COMMON_KEY_COLUMN.to_string(), COMMON_KEY.to_string());
        Ok(columns)
    }

    fn decode(&self, row: &Row) -> RepoResult<Collection> {
        Ok(Collection {
            id: row.key.id.clone(),
            kind: self.kind,
            name: row.text(self.kind.name_column()).to_string(),
            members: decode_members(row.text(self.kind.members_column()))?,
        })
    }
}
