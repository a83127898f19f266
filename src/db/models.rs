use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::helpers::UnitSystem;

/// A registered trip route, owned by one phone number.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; some accessed only via replies
pub struct Route {
    pub id: Uuid,
    /// Hiker's satellite phone number in E.164 form (e.g. "+14155550100").
    pub phone: String,
    pub name: String,
    /// "metric" or "imperial"; parse via `unit_system()`.
    pub units: String,
    pub trip_start: DateTime<Utc>,
    pub trip_end: DateTime<Utc>,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    /// Unit preference, defaulting to metric for unrecognized stored values.
    pub fn unit_system(&self) -> UnitSystem {
        UnitSystem::parse(&self.units).unwrap_or(UnitSystem::Metric)
    }

    /// A route is active when the trip window covers `now` and it isn't done.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.done && self.trip_start <= now && now <= self.trip_end
    }
}

/// Terrain category of a waypoint. Sheltered kinds cap the danger rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointKind {
    Camp,
    Peak,
    Hut,
    Trailhead,
    Endpoint,
}

impl WaypointKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "camp" => Some(WaypointKind::Camp),
            "peak" => Some(WaypointKind::Peak),
            "hut" => Some(WaypointKind::Hut),
            "trailhead" => Some(WaypointKind::Trailhead),
            "endpoint" => Some(WaypointKind::Endpoint),
            _ => None,
        }
    }

    /// Camps and huts are not exposed terrain: their rating caps at D2.
    pub fn is_sheltered(&self) -> bool {
        matches!(self, WaypointKind::Camp | WaypointKind::Hut)
    }
}

/// A named point along a route, immutable once the route is published.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; some accessed only via replies
pub struct Waypoint {
    pub id: Uuid,
    pub route_id: Uuid,
    /// 5-character uppercase alphanumeric code, unique within the route.
    pub code: String,
    pub name: String,
    /// "camp" | "peak" | "hut" | "trailhead" | "endpoint"; parse via `kind()`.
    pub kind: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub elevation_m: Decimal,
    /// Weather-zone id, derived from lat/lon at registration and cached.
    pub zone_id: String,
    pub sort_order: i32,
}

impl Waypoint {
    /// Terrain kind, defaulting to Camp (the conservative, capped category)
    /// for unrecognized stored values.
    pub fn waypoint_kind(&self) -> WaypointKind {
        WaypointKind::parse(&self.kind).unwrap_or(WaypointKind::Camp)
    }
}

/// An emergency contact notified when the hiker checks in at a waypoint.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct SafeCheckContact {
    pub id: Uuid,
    pub route_id: Uuid,
    pub phone: String,
    pub display_name: String,
}
