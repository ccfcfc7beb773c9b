use std::sync::Arc;

use crate::application::catalog::CatalogService;
use crate::application::engagement::EngagementService;
use crate::application::identity::IdentityService;
use crate::application::repos::StoreHealth;

#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<CatalogService>,
    pub engagement: Arc<EngagementService>,
    pub identity: Arc<IdentityService>,
    pub health: Arc<dyn StoreHealth>,
}
