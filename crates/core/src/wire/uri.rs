//! Mount-path extraction from a request URI.

/// The first path segment of an RTSP URL, with its leading `/` stripped and
/// any further `/...` suffix removed — the publisher-slot key.
///
/// `rtsp://host:8554/cam1/trackID=0` → `cam1`. A URI with no path component
/// (e.g. the `*` OPTIONS may legally use) yields an empty string.
pub fn mount_path(uri: &str) -> String {
    let after_scheme = uri.split("://").nth(1).unwrap_or(uri);
    let path = match after_scheme.find('/') {
        Some(i) => &after_scheme[i + 1..],
        None => "",
    };
    path.split('/').next().unwrap_or("").to_string()
}
