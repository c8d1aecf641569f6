use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub location_id: i32,
    pub area_name: String,
    pub is_network_available: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewLocation {
    pub area_name: String,
    #[serde(default = "default_available")]
    pub is_network_available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLocation {
    pub area_name: Option<String>,
    pub is_network_available: Option<bool>,
}

impl UpdateLocation {
    pub fn is_empty(&self) -> bool {
        self.area_name.is_none() && self.is_network_available.is_none()
    }
}
