pub mod items;
pub mod liveness;
pub mod prices;
pub mod readiness;
pub mod search;
