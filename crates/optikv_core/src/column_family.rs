//! Column family handles.

use crate::types::{ColumnFamilyId, DatabaseId};
use std::sync::Arc;

/// Name of the column family every database has.
pub const DEFAULT_COLUMN_FAMILY_NAME: &str = "default";

/// An opaque reference to one keyspace of an open database.
///
/// Handles are cheap to clone and safe to share between threads. A handle
/// is only accepted by the database instance that produced it, and only
/// while that instance is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnFamilyHandle {
    db: DatabaseId,
    id: ColumnFamilyId,
    name: Arc<str>,
}

impl ColumnFamilyHandle {
    pub(crate) fn new(db: DatabaseId, id: ColumnFamilyId, name: &str) -> Self {
        Self {
            db,
            id,
            name: Arc::from(name),
        }
    }

    /// Returns the column family name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column family id.
    #[must_use]
    pub fn id(&self) -> ColumnFamilyId {
        self.id
    }

    /// Returns true for the default column family.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.id == ColumnFamilyId::DEFAULT
    }

    pub(crate) fn database(&self) -> DatabaseId {
        self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_accessors() {
        let db = DatabaseId::allocate();
        let handle = ColumnFamilyHandle::new(db, ColumnFamilyId::new(2), "users");
        assert_eq!(handle.name(), "users");
        assert_eq!(handle.id(), ColumnFamilyId::new(2));
        assert!(!handle.is_default());
        assert_eq!(handle.database(), db);

        let default = ColumnFamilyHandle::new(db, ColumnFamilyId::DEFAULT, DEFAULT_COLUMN_FAMILY_NAME);
        assert!(default.is_default());
        assert_eq!(handle.clone(), handle);
    }
}
