//! Shared write helpers for the orchestrators
//!
//! Creating an entity, linking two entities and remembering an alternate
//! name are the same operation whether the entity was found as a holding,
//! an investor or a declared portfolio item.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;

use super::entity::{Entity, EntityRole};
use super::event::IngestionEvent;
use super::identifier::OrgNumber;
use super::relationship::OwnershipEdge;
use super::repository::OwnershipGraphRepository;
use super::traversal::TraversalContext;

pub struct EntityRegistry<R: OwnershipGraphRepository + ?Sized> {
    repository: Arc<R>,
    country_code: String,
}

impl<R: OwnershipGraphRepository + ?Sized> Clone for EntityRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            country_code: self.country_code.clone(),
        }
    }
}

impl<R: OwnershipGraphRepository + ?Sized> EntityRegistry<R> {
    pub fn new(repository: Arc<R>, country_code: impl Into<String>) -> Self {
        Self {
            repository,
            country_code: country_code.into(),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Load an entity, creating a minimal record when it does not exist
    pub async fn ensure(
        &self,
        id: &OrgNumber,
        name: &str,
        role: EntityRole,
        ctx: &mut TraversalContext,
    ) -> Result<Entity> {
        if let Some(existing) = self.repository.get_entity(id).await? {
            return Ok(existing);
        }

        let entity = Entity::new(id.clone(), name)
            .with_role(role)
            .with_country_code(self.country_code.clone());
        self.repository.upsert_entity(&entity).await?;

        info!(entity_id = %id, name = %entity.name, role = %role, "Entity created");
        ctx.record(IngestionEvent::entity_created(id, &entity.name));
        Ok(entity)
    }

    /// Store `alias` on the entity if it is a new alternate name
    pub async fn remember_alias(&self, entity: &mut Entity, alias: &str) -> Result<()> {
        if entity.add_alias(alias) {
            self.repository.upsert_entity(entity).await?;
            debug!(entity_id = %entity.entity_id, alias, "Alias recorded");
        }
        Ok(())
    }

    /// Upsert the edge `owner -> target`
    ///
    /// Callers check for self-ownership first; a self-loop here is an error.
    pub async fn link(
        &self,
        owner_id: &OrgNumber,
        target_id: &OrgNumber,
        share_percentage: Option<f64>,
        ctx: &mut TraversalContext,
    ) -> Result<OwnershipEdge> {
        let edge = OwnershipEdge::new(owner_id.clone(), target_id.clone())?
            .with_share_percentage(share_percentage);
        self.repository.upsert_edge(&edge).await?;

        info!(
            owner_id = %owner_id,
            target_id = %target_id,
            share_percentage = ?edge.share_percentage,
            "Ownership edge recorded"
        );
        ctx.record(IngestionEvent::edge_recorded(
            owner_id,
            target_id,
            edge.share_percentage,
        ));
        Ok(edge)
    }
}
