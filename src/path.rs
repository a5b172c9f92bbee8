use serde_json::Value;

/// Walks a dot-separated path (`labels.service`) through nested JSON objects.
///
/// Every segment must be a direct key of an object; arrays, scalars and
/// missing keys all end the walk with `None`.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Last path segment, used as the key of a summary field.
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
