//! Key Namespacing Module

/// Separator placed between a namespace and the raw key.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Builds the store key for `key` under `namespace`.
///
/// Without a namespace the raw key is used unchanged. For a fixed raw key,
/// distinct namespaces always yield distinct store keys.
pub fn namespace_key(key: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(namespace) => {
            let mut namespaced = String::with_capacity(namespace.len() + 1 + key.len());
            namespaced.push_str(namespace);
            namespaced.push(NAMESPACE_SEPARATOR);
            namespaced.push_str(key);
            namespaced
        }
        None => key.to_string(),
    }
}
