// App state for Axum server
use std::sync::Arc;

use agora_votes_service::{RoomRegistry, VoteService};

use crate::config::Dependencies;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VoteService>,
    pub rooms: RoomRegistry,
}

impl From<&Dependencies> for AppState {
    fn from(dependencies: &Dependencies) -> Self {
        Self {
            service: dependencies.service.clone(),
            rooms: dependencies.rooms.clone(),
        }
    }
}
