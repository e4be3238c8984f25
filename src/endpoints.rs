//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/connections/{item_id}', use [format_endpoint].

/// The route for syncing an item, or fetching the changes for an access token.
pub const SYNC: &str = "/api/sync";
/// The route Plaid sends webhooks to.
pub const PLAID_WEBHOOK: &str = "/api/webhooks/plaid";
/// The route for reading or unlinking a bank connection.
pub const CONNECTION: &str = "/api/connections/{item_id}";
/// The route for resyncing a bank connection from the beginning.
pub const CONNECTION_RESYNC: &str = "/api/connections/{item_id}/resync";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// The parameter is the first part of the path wrapped in braces, e.g.
/// `{item_id}`. Paths without a parameter are returned unchanged.
///
/// # Examples
/// ```ignore
/// assert_eq!(
///     format_endpoint("/api/connections/{item_id}/resync", "item-1"),
///     "/api/connections/item-1/resync"
/// );
/// ```
pub fn format_endpoint(endpoint_path: &str, id: &str) -> String {
    let Some(start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let Some(end) = endpoint_path[start..].find('}') else {
        return endpoint_path.to_owned();
    };

    format!(
        "{}{}{}",
        &endpoint_path[..start],
        id,
        &endpoint_path[start + end + 1..]
    )
}
