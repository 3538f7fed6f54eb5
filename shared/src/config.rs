/// Proximity filtering configuration, shared with clients in the welcome message.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ProximityConfig {
    /// Radius for `*Proximity` frames
    pub proximity_distance: f64,
    /// Suppressed evaluations between two keep-alive frames to an out-of-range
    /// recipient. 0 means out-of-range recipients never get proximity frames.
    pub update_frequency: u32,
    /// Edge length of a cell for `*ProximityGrid` frames
    pub grid_cell_size: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            proximity_distance: 50.0,
            update_frequency: 10,
            grid_cell_size: 25.0,
        }
    }
}

impl ProximityConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.proximity_distance.is_finite() || self.proximity_distance <= 0.0 {
            return Err("proximity_distance must be finite and > 0".to_string());
        }
        if !self.grid_cell_size.is_finite() || self.grid_cell_size <= 0.0 {
            return Err("grid_cell_size must be finite and > 0".to_string());
        }
        Ok(())
    }
}
