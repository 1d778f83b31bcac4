use crate::sanitize::key_segment;

/// Builds `{owner}/{category}/{stem}-{uuid}.{ext}`.
///
/// Every call yields a fresh key, so two uploads never share a blob even
/// when their filenames match. The stem is dropped when nothing usable is
/// left after sanitizing.
pub fn blob_key(owner: &str, category: &str, filename: &str) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, ext.to_ascii_lowercase()),
        _ => (filename, "bin".to_string()),
    };

    let id = uuid::Uuid::new_v4();
    let stem = sanitize_stem(stem);
    let name = if stem.is_empty() {
        id.to_string()
    } else {
        format!("{}-{}", stem, id)
    };

    format!(
        "{}/{}/{}.{}",
        key_segment(owner),
        key_segment(category),
        name,
        sanitize_stem(&ext)
    )
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('_').to_string()
}

pub fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{}/{}", bucket, key)
}

/// Inverse of [`public_url`]. `None` for URLs outside the bucket or keys
/// that try to leave the storage root.
pub fn key_from_url(bucket: &str, url: &str) -> Option<String> {
    let prefix = format!("https://{}/", bucket);
    let key = url.strip_prefix(&prefix)?;
    if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
        return None;
    }
    Some(key.to_string())
}
