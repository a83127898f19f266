use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Route, SafeCheckContact, Waypoint};

const ROUTE_COLUMNS: &str =
    "id, phone, name, units, trip_start, trip_end, done, created_at, updated_at";

const WAYPOINT_COLUMNS: &str =
    "id, route_id, code, name, kind, latitude, longitude, elevation_m, zone_id, sort_order";

/// Get the route registered for a phone number, if any.
pub async fn get_route_by_phone(pool: &PgPool, phone: &str) -> Result<Option<Route>, sqlx::Error> {
    sqlx::query_as::<_, Route>(&format!(
        "SELECT {ROUTE_COLUMNS} FROM routes WHERE phone = $1"
    ))
    .bind(phone)
    .fetch_optional(pool)
    .await
}

/// All routes whose trip window covers `now` and which are not done.
pub async fn get_active_routes(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Route>, sqlx::Error> {
    sqlx::query_as::<_, Route>(&format!(
        "SELECT {ROUTE_COLUMNS} FROM routes
         WHERE NOT done AND trip_start <= $1 AND trip_end >= $1
         ORDER BY created_at"
    ))
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Routes due for the scheduled push. Identical to `get_active_routes` today;
/// kept separate so per-route push windows can be added without touching callers.
pub async fn get_active_routes_due_for_push(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<Route>, sqlx::Error> {
    get_active_routes(pool, now).await
}

/// Re-read a route's done flag. Used to drop pending sends for trips that
/// ended between scheduling and execution.
pub async fn is_route_done(pool: &PgPool, route_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT done FROM routes WHERE id = $1")
        .bind(route_id)
        .fetch_optional(pool)
        .await
        .map(|v| v.unwrap_or(true))
}

/// All waypoints of a route, in trail order.
pub async fn get_waypoints(pool: &PgPool, route_id: Uuid) -> Result<Vec<Waypoint>, sqlx::Error> {
    sqlx::query_as::<_, Waypoint>(&format!(
        "SELECT {WAYPOINT_COLUMNS} FROM waypoints WHERE route_id = $1 ORDER BY sort_order"
    ))
    .bind(route_id)
    .fetch_all(pool)
    .await
}

/// Look up a waypoint of a route by its 5-char code.
pub async fn find_waypoint_by_code(
    pool: &PgPool,
    route_id: Uuid,
    code: &str,
) -> Result<Option<Waypoint>, sqlx::Error> {
    sqlx::query_as::<_, Waypoint>(&format!(
        "SELECT {WAYPOINT_COLUMNS} FROM waypoints WHERE route_id = $1 AND code = $2"
    ))
    .bind(route_id)
    .bind(code)
    .fetch_optional(pool)
    .await
}

/// Advance the trip end date. The new end must be later than the stored one —
/// end dates only ever move forward. Returns the updated route.
pub async fn update_trip_end(
    pool: &PgPool,
    route_id: Uuid,
    new_end: DateTime<Utc>,
) -> Result<Route, sqlx::Error> {
    sqlx::query_as::<_, Route>(&format!(
        "UPDATE routes
         SET trip_end = GREATEST(trip_end, $2), updated_at = NOW()
         WHERE id = $1
         RETURNING {ROUTE_COLUMNS}"
    ))
    .bind(route_id)
    .bind(new_end)
    .fetch_one(pool)
    .await
}

/// Mark a trip finished. Freezes the end date and stops all scheduled sends.
pub async fn mark_done(pool: &PgPool, route_id: Uuid) -> Result<Route, sqlx::Error> {
    sqlx::query_as::<_, Route>(&format!(
        "UPDATE routes SET done = TRUE, updated_at = NOW()
         WHERE id = $1
         RETURNING {ROUTE_COLUMNS}"
    ))
    .bind(route_id)
    .fetch_one(pool)
    .await
}

/// Store the user's unit preference.
pub async fn update_units(
    pool: &PgPool,
    route_id: Uuid,
    units: &str,
) -> Result<Route, sqlx::Error> {
    sqlx::query_as::<_, Route>(&format!(
        "UPDATE routes SET units = $2, updated_at = NOW()
         WHERE id = $1
         RETURNING {ROUTE_COLUMNS}"
    ))
    .bind(route_id)
    .bind(units)
    .fetch_one(pool)
    .await
}

/// SafeCheck contacts for a route (at most 5, enforced at registration).
pub async fn get_contacts(
    pool: &PgPool,
    route_id: Uuid,
) -> Result<Vec<SafeCheckContact>, sqlx::Error> {
    sqlx::query_as::<_, SafeCheckContact>(
        "SELECT id, route_id, phone, display_name
         FROM safecheck_contacts
         WHERE route_id = $1
         ORDER BY display_name
         LIMIT 5",
    )
    .bind(route_id)
    .fetch_all(pool)
    .await
}
