/// Strip directory components and collapse whitespace runs to underscores.
///
/// Uploaded file names come straight from the admin's filesystem picker and
/// may carry path separators (or be crafted to). Only the base name survives
/// into the object key.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();

    let mut out = String::with_capacity(base.len());
    let mut in_whitespace = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}

/// Trim trailing slashes from a caller-supplied folder; empty folders fall
/// back to the default prefix.
pub fn normalize_folder(folder: Option<&str>) -> Option<String> {
    let folder = folder?.trim().trim_end_matches('/');
    if folder.is_empty() {
        None
    } else {
        Some(folder.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("/tmp/evil/../clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("C:\\Users\\coach\\drill.mov"), "drill.mov");
        assert_eq!(sanitize_file_name("plain.mp4"), "plain.mp4");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(
            sanitize_file_name("face off   breakdown.mp4"),
            "face_off_breakdown.mp4"
        );
        assert_eq!(sanitize_file_name("tab\tseparated clip.mp4"), "tab_separated_clip.mp4");
    }

    #[test]
    fn test_normalize_folder() {
        assert_eq!(normalize_folder(Some("courses/")), Some("courses".to_string()));
        assert_eq!(
            normalize_folder(Some("courses/offense///")),
            Some("courses/offense".to_string())
        );
        assert_eq!(normalize_folder(Some("")), None);
        assert_eq!(normalize_folder(Some("///")), None);
        assert_eq!(normalize_folder(None), None);
    }
}
