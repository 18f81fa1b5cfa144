//! Intro card detection over sampled grayscale frames.
//!
//! Frames and the reference have the same size, so the template-match
//! coefficient reduces to the zero-mean normalized cross-correlation of the
//! two pixel vectors.

/// One intro card sighting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Seconds into the scanned video
    pub timestamp: f64,
    pub score: f64,
}

/// Zero-mean normalized cross-correlation in `[-1, 1]`.
/// Mismatched lengths or a flat image score 0.
pub fn ncc(a: &[u8], b: &[u8]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n;

    let (mut cross, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cross += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        0.0
    } else {
        cross / denom
    }
}

/// Thresholding with debounce: a score at or above `threshold` counts when no
/// hit was recorded in the last `debounce` seconds of video.
#[derive(Debug, Clone)]
pub struct HitFilter {
    fps: f64,
    threshold: f64,
    debounce: f64,
    frame: usize,
    hits: Vec<Hit>,
}

impl HitFilter {
    pub fn new(fps: f64, threshold: f64, debounce: f64) -> Self {
        Self {
            fps,
            threshold,
            debounce,
            frame: 0,
            hits: Vec::new(),
        }
    }

    pub fn push(&mut self, score: f64) {
        let timestamp = self.frame as f64 / self.fps;
        self.frame += 1;
        if score < self.threshold {
            return;
        }
        let clear = self
            .hits
            .last()
            .is_none_or(|last| timestamp - last.timestamp > self.debounce);
        if clear {
            log::info!("🎯 Intro card #{} at {:.1}s (score {:.3})", self.hits.len() + 1, timestamp, score);
            self.hits.push(Hit { timestamp, score });
        }
    }

    pub fn frames(&self) -> usize {
        self.frame
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.hits
    }
}

/// Frame-by-frame detector against a fixed reference frame
#[derive(Debug, Clone)]
pub struct IntroDetector {
    reference: Vec<u8>,
    filter: HitFilter,
    best: f64,
}

impl IntroDetector {
    pub fn new(reference: Vec<u8>, fps: f64, threshold: f64, debounce: f64) -> Self {
        Self {
            reference,
            filter: HitFilter::new(fps, threshold, debounce),
            best: f64::MIN,
        }
    }

    pub fn push_frame(&mut self, frame: &[u8]) {
        let score = ncc(&self.reference, frame);
        self.best = self.best.max(score);
        self.filter.push(score);
    }

    /// Highest score seen, for diagnostics when nothing matched
    pub fn best_score(&self) -> Option<f64> {
        (self.filter.frames() > 0).then_some(self.best)
    }

    pub fn frames(&self) -> usize {
        self.filter.frames()
    }

    pub fn hits(&self) -> &[Hit] {
        self.filter.hits()
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.filter.into_hits()
    }
}

/// Runs the filter over a precomputed score sequence
pub fn find_hits(scores: impl IntoIterator<Item = f64>, fps: f64, threshold: f64, debounce: f64) -> Vec<Hit> {
    let mut filter = HitFilter::new(fps, threshold, debounce);
    scores.into_iter().for_each(|s| filter.push(s));
    filter.into_hits()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ncc_identical_and_inverted() {
        let a: Vec<u8> = (0..100).map(|v| v as u8).collect();
        let inverted: Vec<u8> = a.iter().map(|v| 255 - v).collect();
        assert!((ncc(&a, &a) - 1.0).abs() < 1e-9);
        assert!((ncc(&a, &inverted) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ncc_ignores_brightness_offset() {
        let a: Vec<u8> = (0..100).map(|v| v as u8).collect();
        let brighter: Vec<u8> = a.iter().map(|v| v + 50).collect();
        assert!((ncc(&a, &brighter) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ncc_degenerate_inputs() {
        assert_eq!(ncc(&[7; 10], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]), 0.0);
        assert_eq!(ncc(&[1, 2], &[1, 2, 3]), 0.0);
        assert_eq!(ncc(&[], &[]), 0.0);
    }

    #[test]
    fn test_find_hits_debounces() {
        // 5 fps: frames 0..=4 are the first second
        let mut scores = vec![0.0; 100];
        scores[10] = 0.9; // 2.0s
        scores[11] = 0.95; // 2.2s, inside debounce
        scores[25] = 0.8; // 5.0s, exactly 3s later: still inside
        scores[26] = 0.8; // 5.2s
        scores[60] = 0.69; // below threshold
        let hits = find_hits(scores, 5.0, 0.70, 3.0);
        let times: Vec<f64> = hits.iter().map(|h| h.timestamp).collect();
        assert_eq!(times, vec![2.0, 5.2]);
    }

    #[test]
    fn test_detector_tracks_best_score() {
        let reference: Vec<u8> = (0..16).map(|v| v as u8 * 10).collect();
        let mut detector = IntroDetector::new(reference.clone(), 1.0, 0.7, 3.0);
        assert_eq!(detector.best_score(), None);
        detector.push_frame(&[5; 16]);
        detector.push_frame(&reference);
        assert_eq!(detector.frames(), 2);
        assert_eq!(detector.hits().len(), 1);
        assert!((detector.best_score().unwrap() - 1.0).abs() < 1e-9);
    }
}
