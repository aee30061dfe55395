use async_trait::async_trait;
use fleettrack_shared::domain::{LocationFields, LocationRecord};
use sled::{
    transaction::{ConflictableTransactionError, TransactionError},
    Db, Transactional, Tree,
};
use tracing::info;

use super::LocationStore;
use crate::errors::StoreError;

const RECORDS_TREE: &str = "vehicle_locations";
const INDEX_TREE: &str = "vehicle_index";

/// Locations kept in sled: records keyed by `location_id`, plus an index
/// from `vehicle_id` to `location_id`.
pub struct SledLocationStore {
    db: Db,
    records: Tree,
    index: Tree,
}

impl SledLocationStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::with_db(sled::open(path)?)
    }

    pub fn with_db(db: Db) -> Result<Self, StoreError> {
        let records = db.open_tree(RECORDS_TREE)?;
        let index = db.open_tree(INDEX_TREE)?;
        info!("{} vehicle locations in db", records.len());
        Ok(Self { db, records, index })
    }

    /// Record and index land in one transaction, so a vehicle never has a
    /// row the index cannot find.
    fn write(&self, record: &LocationRecord) -> Result<(), StoreError> {
        let value = postcard::to_stdvec(record)?;
        let location_key = record.location_id.to_be_bytes();
        let vehicle_key = record.vehicle_id.to_be_bytes();

        (&self.records, &self.index)
            .transaction(|(records, index)| {
                let _old = records.insert(&location_key[..], value.as_slice())?;
                let _old = index.insert(&vehicle_key[..], &location_key[..])?;
                Ok::<_, ConflictableTransactionError<StoreError>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => StoreError::Sled(e),
            })
    }

    #[cfg(test)]
    pub(crate) fn tree_lens(&self) -> (usize, usize) {
        (self.records.len(), self.index.len())
    }

    fn read(&self, location_id: u64) -> Result<Option<LocationRecord>, StoreError> {
        match self.records.get(location_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LocationStore for SledLocationStore {
    async fn find_by_vehicle(&self, vehicle_id: i64) -> Result<Option<LocationRecord>, StoreError> {
        let Some(id) = self.index.get(vehicle_id.to_be_bytes())? else {
            return Ok(None);
        };
        let id: [u8; 8] = id
            .as_ref()
            .try_into()
            .map_err(|_| StoreError::Unavailable("corrupt vehicle index".into()))?;
        self.read(u64::from_be_bytes(id))
    }

    async fn create(&self, fields: LocationFields) -> Result<LocationRecord, StoreError> {
        let record = fields.into_record(self.db.generate_id()?);
        self.write(&record)?;
        Ok(record)
    }

    async fn update(
        &self,
        location_id: u64,
        fields: LocationFields,
    ) -> Result<LocationRecord, StoreError> {
        if !self.records.contains_key(location_id.to_be_bytes())? {
            return Err(StoreError::NotFound(location_id));
        }
        let record = fields.into_record(location_id);
        self.write(&record)?;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<LocationRecord>, StoreError> {
        self.records
            .iter()
            .values()
            .map(|v| Ok(postcard::from_bytes(&v?)?))
            .collect()
    }
}
