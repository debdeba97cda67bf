//! Object naming shared by every backend.
//!
//! Local layout:  `<collection>/<user_hash>_<millis>_<suffix>`
//! Remote layout: `<collection>/<user_hash>/<millis>_<suffix>`
//!
//! `suffix` is `<nonce>_<stem>.png`; the nonce keeps two uploads made in the
//! same millisecond apart.

use super::types::{ContributionUpload, DEFAULT_UPLOAD_NAME};

const MAX_STEM_LEN: usize = 64;

/// Hex md5 of the user id, so stored names do not expose raw ids.
pub fn user_hash(user_id: i64) -> String {
    format!("{:x}", md5::compute(user_id.to_string()))
}

/// Reduce a client file name to a safe stem (no directories, no extension).
pub fn sanitize_stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(idx) => &base[..idx],
    };

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        DEFAULT_UPLOAD_NAME.to_owned()
    } else {
        cleaned
    }
}

fn suffix(upload: &ContributionUpload) -> String {
    let stem = upload
        .original_name
        .as_deref()
        .map(sanitize_stem)
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_owned());
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}.png", &nonce[..8], stem)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// File name inside the collection directory for the local layout.
pub fn local_file_name(upload: &ContributionUpload) -> String {
    format!(
        "{}_{}_{}",
        user_hash(upload.user_id),
        now_millis(),
        suffix(upload)
    )
}

/// Object key for the remote layout.
pub fn remote_key(upload: &ContributionUpload) -> String {
    format!(
        "{}/{}/{}_{}",
        upload.collection_id,
        user_hash(upload.user_id),
        now_millis(),
        suffix(upload)
    )
}

/// Last `/`-separated segment of a key or URL.
pub fn last_segment(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_hash_is_stable_md5_hex() {
        assert_eq!(user_hash(1), "c4ca4238a0b923820dcc509a6f75849b");
        assert_eq!(user_hash(1), user_hash(1));
        assert_ne!(user_hash(1), user_hash(2));
    }

    #[test]
    fn sanitize_stem_strips_directories_and_extension() {
        assert_eq!(sanitize_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_stem("C:\\photos\\beach day.jpg"), "beach_day");
        assert_eq!(sanitize_stem("photo.tar.gz"), "photo_tar");
        assert_eq!(sanitize_stem(".hidden"), "_hidden");
    }

    #[test]
    fn sanitize_stem_falls_back_to_canvas() {
        assert_eq!(sanitize_stem(""), "canvas");
        assert_eq!(sanitize_stem("..."), "canvas");
        assert_eq!(sanitize_stem("///"), "canvas");
    }

    #[test]
    fn local_file_name_layout() {
        let upload = ContributionUpload::new(7, 1, vec![]).with_original_name("cat.jpeg");
        let name = local_file_name(&upload);
        let parts: Vec<&str> = name.splitn(4, '_').collect();

        assert_eq!(parts[0], user_hash(1));
        assert!(parts[1].parse::<i64>().is_ok(), "timestamp segment: {name}");
        assert_eq!(parts[2].len(), 8);
        assert_eq!(parts[3], "cat.png");
    }

    #[test]
    fn remote_key_layout() {
        let upload = ContributionUpload::new(7, 1, vec![]);
        let key = remote_key(&upload);
        let segments: Vec<&str> = key.split('/').collect();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "7");
        assert_eq!(segments[1], user_hash(1));
        assert!(segments[2].ends_with("_canvas.png"));
    }

    #[test]
    fn names_differ_for_identical_uploads() {
        let upload = ContributionUpload::new(7, 1, b"same".to_vec());
        assert_ne!(local_file_name(&upload), local_file_name(&upload));
        assert_ne!(remote_key(&upload), remote_key(&upload));
    }

    #[test]
    fn last_segment_of_url() {
        assert_eq!(
            last_segment("https://b.s3.eu-west-1.amazonaws.com/7/abc/1_x_canvas.png"),
            "1_x_canvas.png"
        );
        assert_eq!(last_segment("plain"), "plain");
    }
}
