//! Durable upsert-by-vehicle storage of the latest known locations.

mod sled_store;
pub use sled_store::*;

use async_trait::async_trait;
use fleettrack_shared::domain::{LocationFields, LocationRecord};
#[cfg(test)]
use mockall::automock;

use crate::errors::StoreError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LocationStore: Send + Sync + 'static {
    async fn find_by_vehicle(&self, vehicle_id: i64) -> Result<Option<LocationRecord>, StoreError>;

    async fn create(&self, fields: LocationFields) -> Result<LocationRecord, StoreError>;

    async fn update(
        &self,
        location_id: u64,
        fields: LocationFields,
    ) -> Result<LocationRecord, StoreError>;

    async fn list(&self) -> Result<Vec<LocationRecord>, StoreError>;
}
