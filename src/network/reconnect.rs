use std::time::Duration;

use rand::Rng;

/// Chính sách kết nối lại: backoff lũy thừa có jitter, số lần thử bị chặn.
///
/// attempt 1 chờ `initial_delay`, mỗi lần sau gấp đôi cho tới `max_delay`;
/// quá `max_attempts` lần thất bại liên tiếp thì bỏ cuộc (`GivenUp`).
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    /// Tỷ lệ jitter hai phía, ví dụ 0.25 nghĩa là ±25%
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 8,
            jitter: 0.25,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let exponential =
            self.initial_delay.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1).min(30) as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());

        let spread = capped * self.jitter;
        if spread <= 0.0 {
            return Duration::from_secs_f64(capped);
        }
        let jittered = capped + rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64(jittered.max(0.0))
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}
