//! 청크 단위 실행기.
//!
//! 작업 목록을 고정 크기 청크로 나누어 순서대로 처리합니다.
//!
//! - 청크 안의 항목은 동시에 실행되고, 모두 끝나야 다음 청크로 넘어갑니다.
//! - 청크 사이에는 고정 딜레이를 둡니다 (마지막 청크 뒤에는 없음).
//! - 결과는 입력 순서를 유지합니다.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

/// 현재 처리 중인 청크 정보.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// 0부터 시작하는 청크 번호
    pub index: usize,
    /// 전체 청크 수
    pub total: usize,
    /// 청크 첫 항목의 전체 목록 내 위치
    pub offset: usize,
    /// 청크 항목 수
    pub len: usize,
}

impl std::fmt::Display for ChunkInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} (items {}-{})",
            self.index + 1,
            self.total,
            self.offset + 1,
            self.offset + self.len
        )
    }
}

/// 청크 단위 실행기.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    batch_size: usize,
    delay: Duration,
}

impl BatchRunner {
    /// `batch_size`가 0이면 1로 취급합니다.
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// `len`개 항목의 청크 수.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }

    /// `len`개 항목 처리 시 청크 간 딜레이 횟수 (`ceil(len / batch_size) - 1`).
    pub fn delay_count(&self, len: usize) -> usize {
        self.chunk_count(len).saturating_sub(1)
    }

    /// 청크마다 `f`를 호출하고 완료를 기다린 뒤 다음 청크로 넘어갑니다.
    pub async fn for_each_chunk<'a, I, R, F, Fut>(&self, items: &'a [I], mut f: F) -> Vec<R>
    where
        F: FnMut(ChunkInfo, &'a [I]) -> Fut,
        Fut: Future<Output = R>,
    {
        let total = self.chunk_count(items.len());
        let mut results = Vec::with_capacity(total);

        for (index, chunk) in items.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.delay.is_zero() {
                debug!(delay_ms = self.delay.as_millis() as u64, "청크 간 대기");
                tokio::time::sleep(self.delay).await;
            }

            let info = ChunkInfo {
                index,
                total,
                offset: index * self.batch_size,
                len: chunk.len(),
            };
            debug!(chunk = %info, "청크 처리 시작");
            results.push(f(info, chunk).await);
        }

        results
    }

    /// 모든 항목에 `f`를 청크 단위로 실행하고 입력 순서대로 결과를 반환합니다.
    pub async fn run<'a, I, T, F, Fut>(&self, items: &'a [I], f: F) -> Vec<T>
    where
        F: Fn(&'a I) -> Fut,
        Fut: Future<Output = T>,
    {
        let f = &f;
        self.for_each_chunk(items, move |_, chunk| Self::settle(chunk, f))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// 청크 하나의 모든 항목을 동시에 실행하고 전부 끝날 때까지 기다립니다.
    pub async fn settle<'a, I, T, F, Fut>(chunk: &'a [I], f: F) -> Vec<T>
    where
        F: FnMut(&'a I) -> Fut,
        Fut: Future<Output = T>,
    {
        join_all(chunk.iter().map(f)).await
    }
}
