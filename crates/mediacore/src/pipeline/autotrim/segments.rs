//! Keep-segments derived from intro card positions.
//!
//! Hits are numbered from 1:
//!
//! ```text
//! hits >= 2 : [0,            hit2 - margin]
//! hits == 4 : [hit3 + skip,  end]
//! hits >= 5 : [hit3 + skip,  hit4 - margin]
//! hits >= 6 : [hit5 + skip,  hit6 - margin]
//! ```

use super::detect::Hit;
use crate::core::config::autotrim::{END_MARGIN_SECS, INTRO_SKIP_SECS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Segments to keep, in order. Empty or inverted segments are dropped.
pub fn keep_segments(hits: &[Hit], duration: f64) -> Vec<Segment> {
    let at = |n: usize| hits[n - 1].timestamp;
    let mut segments = Vec::new();
    if hits.len() < 2 {
        return segments;
    }

    segments.push(Segment {
        start: 0.0,
        end: at(2) - END_MARGIN_SECS,
    });

    if hits.len() == 4 {
        segments.push(Segment {
            start: at(3) + INTRO_SKIP_SECS,
            end: duration,
        });
    } else if hits.len() >= 5 {
        segments.push(Segment {
            start: at(3) + INTRO_SKIP_SECS,
            end: at(4) - END_MARGIN_SECS,
        });
    }

    if hits.len() >= 6 {
        segments.push(Segment {
            start: at(5) + INTRO_SKIP_SECS,
            end: at(6) - END_MARGIN_SECS,
        });
    }

    segments.retain(|s| {
        let valid = s.end > s.start && s.start >= 0.0;
        if !valid {
            log::warn!("Skipping invalid segment {:.1}s - {:.1}s", s.start, s.end);
        }
        valid
    });
    segments
}
