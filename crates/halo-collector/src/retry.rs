//! 선형 백오프 재시도.
//!
//! 실패한 비동기 작업을 최대 `max_retries`번까지 시도하며,
//! n번째 실패 후 `base_delay × n` 만큼 대기합니다.
//! 모든 시도가 실패한 경우에만 에러를 반환합니다.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// 재시도 소진 에러.
#[derive(Debug)]
pub struct RetryError<E> {
    /// 실제 수행한 시도 횟수
    pub attempts: u32,
    /// 마지막 시도의 에러
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempts: {}", self.attempts, self.last_error)
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

/// 재시도 정책.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// 기본 백오프 단위 (1초).
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// 최대 시도 횟수. 0은 1로 취급합니다.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// `attempt`번째 실패 후 대기 시간.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// 작업을 재시도하며 실행합니다.
    ///
    /// `op`는 1부터 시작하는 시도 번호를 받아 매번 새 future를 만듭니다.
    pub async fn attempt<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "재시도 성공");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= max_attempts => {
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    let wait = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "시도 실패, 재시도 대기"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Self::DEFAULT_BASE_DELAY)
    }
}
