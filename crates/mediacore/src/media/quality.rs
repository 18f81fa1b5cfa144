//! Compression quality catalog

/// One compression target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionQuality {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// Video bitrate as passed to `-b:v`
    pub bitrate: &'static str,
}

/// Every supported quality, best first
pub const CATALOG: &[CompressionQuality] = &[
    CompressionQuality {
        label: "1080p",
        width: 1920,
        height: 1080,
        bitrate: "3000k",
    },
    CompressionQuality {
        label: "720p",
        width: 1280,
        height: 720,
        bitrate: "2000k",
    },
    CompressionQuality {
        label: "576p",
        width: 1024,
        height: 576,
        bitrate: "1500k",
    },
    CompressionQuality {
        label: "480p",
        width: 854,
        height: 480,
        bitrate: "1000k",
    },
    CompressionQuality {
        label: "360p",
        width: 640,
        height: 360,
        bitrate: "500k",
    },
];

/// Keyword selecting the whole catalog
pub const ALL: &str = "all";

/// Looks up a quality by label (case-insensitive)
pub fn find(label: &str) -> Option<&'static CompressionQuality> {
    let label = label.trim();
    CATALOG.iter().find(|q| q.label.eq_ignore_ascii_case(label))
}

/// Every catalog label
pub fn all_labels() -> Vec<String> {
    CATALOG.iter().map(|q| q.label.to_string()).collect()
}

/// Parses `all` or a comma separated label list.
///
/// Returns the normalized labels in input order without duplicates, or the
/// offending labels when any of them is unknown.
pub fn parse_list(input: &str) -> Result<Vec<String>, Vec<String>> {
    if input.trim().eq_ignore_ascii_case(ALL) {
        return Ok(all_labels());
    }

    let mut labels = Vec::new();
    let mut invalid = Vec::new();
    for raw in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match find(raw) {
            Some(q) if !labels.iter().any(|l: &String| l == q.label) => labels.push(q.label.to_string()),
            Some(_) => {}
            None => invalid.push(raw.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(invalid);
    }
    if labels.is_empty() {
        return Err(vec![input.trim().to_string()]);
    }
    Ok(labels)
}
