//! Mutation orchestration on top of the coordinator.
//!
//! # Design
//! Mutations go straight to the remote client; the cache is never edited
//! in place. Instead every mutation, successful or not, triggers a forced
//! refresh so the next committed snapshot reflects the remote truth. That
//! makes the engine eventually consistent: reads between a mutation and
//! its refresh may still observe the pre-mutation snapshot.

use tracing::{debug, error};
use uuid::Uuid;

use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::types::{EntryPatch, ItemStatus, NewItem};

impl Coordinator {
    /// Create a task item and return its client-generated uid.
    ///
    /// The uid is a fresh v4 uuid, assigned before the remote ever sees the
    /// entry, and never reused. Only active items may be created. The title
    /// is the only field the remote's naming conventions let us write
    /// today; a supplied description or due date is accepted but not
    /// applied (see `fields::resolve_update`).
    pub fn create_item(&self, list_short_id: &str, item: NewItem) -> Result<Uuid, Error> {
        if item.status == ItemStatus::Completed {
            return Err(Error::Validation(
                "only active items may be created".to_string(),
            ));
        }
        if item.description.is_some() || item.due.is_some() {
            debug!("description and due date are not applied on create");
        }

        let uid = Uuid::new_v4();
        let result = self
            .client
            .create_entry(list_short_id, uid, &EntryPatch::name(item.title));
        if let Err(err) = &result {
            error!("error creating item {uid} in list {list_short_id}: {err}");
        }
        self.refresh_after_mutation();
        result.map(|()| uid)
    }

    /// Update one logical field of an item addressed by uid.
    pub fn update_item(
        &self,
        list_short_id: &str,
        uid: Uuid,
        patch: &EntryPatch,
    ) -> Result<(), Error> {
        let result = self
            .client
            .update_entry(list_short_id, &uid.to_string(), patch);
        if let Err(err) = &result {
            error!("error updating item {uid}: {err}");
        }
        self.refresh_after_mutation();
        result
    }

    /// Soft-delete items by uid. Uids that no longer resolve remotely are
    /// skipped inside the client; the batch succeeds with the rest.
    pub fn delete_items(&self, list_any_id: &str, uids: &[Uuid]) -> Result<(), Error> {
        let result = self.client.deprecate_entries(list_any_id, uids);
        if let Err(err) = &result {
            error!("error deleting items {uids:?}: {err}");
        }
        self.refresh_after_mutation();
        result
    }
}
