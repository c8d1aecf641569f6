use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A finite resource pool (switches, fiber runs, access points...).
///
/// `quantity_available` never leaves the `0..=quantity_total` range; the
/// inventory is the only writer of either counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ResourceType {
    pub resource_id: i32,
    pub resource_name: String,
    pub quantity_total: u32,
    pub quantity_available: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewResource {
    pub resource_name: String,
    pub quantity_total: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateResource {
    pub resource_name: Option<String>,
    pub quantity_total: Option<u32>,
}

impl UpdateResource {
    pub fn is_empty(&self) -> bool {
        self.resource_name.is_none() && self.quantity_total.is_none()
    }
}
