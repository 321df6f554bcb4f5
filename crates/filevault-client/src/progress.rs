//! Progress reporting for uploads and file encryption

use std::time::Instant;
use tokio::sync::mpsc;

/// Integer percentage `round(100 * done / total)`, halves rounding up.
///
/// Only `done >= total` reports 100; anything short of it is capped at 99.
/// An empty total counts as complete.
pub fn percent_complete(done: u64, total: u64) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    let rounded = (200 * done as u128 + total as u128) / (2 * total as u128);
    rounded.min(99) as u8
}

/// Upload progress, emitted once per acknowledged chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadProgress {
    /// Whole-number percentage of chunks acknowledged
    pub percent: u8,
    /// Chunks acknowledged so far
    pub chunks_sent: u64,
    /// Total number of chunks
    pub total_chunks: u64,
    /// Bytes acknowledged so far
    pub bytes_sent: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Progress after `chunks_sent` of `total_chunks` chunks
    pub fn new(chunks_sent: u64, total_chunks: u64, bytes_sent: u64, total_bytes: u64) -> Self {
        Self {
            percent: percent_complete(chunks_sent, total_chunks),
            chunks_sent,
            total_chunks,
            bytes_sent,
            total_bytes,
        }
    }

    /// Whether the upload has sent everything
    pub fn is_complete(&self) -> bool {
        self.chunks_sent == self.total_chunks
    }
}

/// Receives upload progress events
pub trait ProgressObserver: Send + Sync {
    /// Called after each acknowledged chunk
    fn on_progress(&self, progress: &UploadProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&UploadProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &UploadProgress) {
        self(progress)
    }
}

/// Forwards progress events into a channel
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<UploadProgress>,
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, progress: &UploadProgress) {
        // A dropped receiver only means nobody is watching
        let _ = self.tx.send(progress.clone());
    }
}

/// Create an observer and the receiving end of its channel
pub fn progress_channel() -> (ChannelObserver, mpsc::UnboundedReceiver<UploadProgress>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelObserver { tx }, rx)
}

/// Progress of reading a file for encryption or decryption
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CryptoProgress {
    /// Bytes processed so far
    pub loaded: u64,
    /// Total bytes
    pub total: u64,
    /// Whole-number percentage
    pub percentage: u8,
}

impl CryptoProgress {
    /// Progress after `loaded` of `total` bytes
    pub fn new(loaded: u64, total: u64) -> Self {
        Self {
            loaded,
            total,
            percentage: percent_complete(loaded, total),
        }
    }
}

/// Callback for [`CryptoProgress`] events
pub type CryptoProgressCallback<'a> = &'a (dyn Fn(CryptoProgress) + Send + Sync);

/// Throughput snapshot of a running transfer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransferRate {
    /// Bytes transferred
    pub loaded: u64,
    /// Total bytes
    pub total: u64,
    /// Whole-number percentage
    pub percentage: u8,
    /// Bytes per second since the tracker started
    pub speed: f64,
    /// Estimated seconds until done (infinite while speed is zero)
    pub remaining_secs: f64,
}

impl TransferRate {
    /// Speed formatted with [`format_speed`]
    pub fn formatted_speed(&self) -> String {
        format_speed(self.speed)
    }

    /// Remaining time formatted with [`format_time`]
    pub fn formatted_time(&self) -> String {
        format_time(self.remaining_secs)
    }
}

/// Estimates speed and time remaining for one transfer
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    total: u64,
    started: Instant,
}

impl ProgressTracker {
    /// Start tracking a transfer of `total` bytes
    pub fn start(total: u64) -> Self {
        Self::start_at(total, Instant::now())
    }

    /// Start tracking at a given instant
    pub fn start_at(total: u64, started: Instant) -> Self {
        Self { total, started }
    }

    /// Snapshot after `loaded` bytes
    pub fn update(&self, loaded: u64) -> TransferRate {
        self.update_at(loaded, Instant::now())
    }

    /// Snapshot after `loaded` bytes as of `now`
    pub fn update_at(&self, loaded: u64, now: Instant) -> TransferRate {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let speed = if elapsed > 0.0 { loaded as f64 / elapsed } else { 0.0 };
        let remaining_bytes = self.total.saturating_sub(loaded) as f64;
        let remaining_secs = if speed > 0.0 {
            remaining_bytes / speed
        } else {
            f64::INFINITY
        };

        TransferRate {
            loaded,
            total: self.total,
            percentage: percent_complete(loaded, self.total),
            speed,
            remaining_secs,
        }
    }
}

/// Format a byte rate as `B/s`, `KB/s`, `MB/s` or `GB/s` with two decimals
pub fn format_speed(bytes_per_second: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
    if !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        return "0 B/s".to_string();
    }
    let exponent = (bytes_per_second.ln() / 1024f64.ln())
        .floor()
        .clamp(0.0, (UNITS.len() - 1) as f64) as usize;
    let value = bytes_per_second / 1024f64.powi(exponent as i32);
    format!("{:.2} {}", value, UNITS[exponent])
}

/// Format seconds as `m:ss`; zero or unknown shows `--:--`
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "--:--".to_string();
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case(0, 0, 100)]
    #[case(0, 3, 0)]
    #[case(1, 3, 33)]
    #[case(2, 3, 67)]
    #[case(3, 3, 100)]
    #[case(1, 8, 13)]
    #[case(199, 200, 99)]
    #[case(1, 201, 0)]
    #[case(5, 3, 100)]
    fn test_percent_complete(#[case] done: u64, #[case] total: u64, #[case] expected: u8) {
        assert_eq!(percent_complete(done, total), expected);
    }

    #[test]
    fn test_percent_never_overshoots() {
        for total in 1..500u64 {
            let mut last = 0;
            for done in 0..=total {
                let p = percent_complete(done, total);
                assert!(p >= last);
                assert!(p <= 100);
                if done < total {
                    assert!(p < 100);
                }
                last = p;
            }
            assert_eq!(last, 100);
        }
    }

    #[test]
    fn test_crypto_progress() {
        let p = CryptoProgress::new(199, 200);
        assert_eq!((p.loaded, p.total, p.percentage), (199, 200, 99));
        assert_eq!(CryptoProgress::new(0, 0).percentage, 100);
    }

    #[test]
    fn test_closure_observer() {
        let seen = std::sync::Mutex::new(Vec::new());
        let observer = |p: &UploadProgress| seen.lock().unwrap().push(p.percent);
        observer.on_progress(&UploadProgress::new(1, 2, 10, 20));
        assert_eq!(*seen.lock().unwrap(), vec![50]);
    }

    #[tokio::test]
    async fn test_channel_observer() {
        let (observer, mut rx) = progress_channel();
        observer.on_progress(&UploadProgress::new(2, 2, 20, 20));
        let event = rx.recv().await.unwrap();
        assert!(event.is_complete());
        assert_eq!(event.percent, 100);

        drop(rx);
        observer.on_progress(&UploadProgress::new(2, 2, 20, 20));
    }

    #[test]
    fn test_tracker_estimates() {
        let start = Instant::now();
        let tracker = ProgressTracker::start_at(4096, start);
        let rate = tracker.update_at(1024, start + Duration::from_secs(2));
        assert_eq!(rate.percentage, 25);
        assert!((rate.speed - 512.0).abs() < 1e-9);
        assert!((rate.remaining_secs - 6.0).abs() < 1e-9);
        assert_eq!(rate.formatted_speed(), "512.00 B/s");
        assert_eq!(rate.formatted_time(), "0:06");

        let at_start = tracker.update_at(0, start);
        assert_eq!(at_start.speed, 0.0);
        assert_eq!(at_start.formatted_time(), "--:--");
    }

    #[rstest]
    #[case(0.0, "0 B/s")]
    #[case(0.5, "0.50 B/s")]
    #[case(1023.0, "1023.00 B/s")]
    #[case(1536.0, "1.50 KB/s")]
    #[case(5.0 * 1024.0 * 1024.0, "5.00 MB/s")]
    #[case(3.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0, "3072.00 GB/s")]
    fn test_format_speed(#[case] speed: f64, #[case] expected: &str) {
        assert_eq!(format_speed(speed), expected);
    }

    #[rstest]
    #[case(0.0, "--:--")]
    #[case(f64::INFINITY, "--:--")]
    #[case(f64::NAN, "--:--")]
    #[case(5.7, "0:05")]
    #[case(65.0, "1:05")]
    #[case(3600.0, "60:00")]
    fn test_format_time(#[case] seconds: f64, #[case] expected: &str) {
        assert_eq!(format_time(seconds), expected);
    }
}
