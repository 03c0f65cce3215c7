use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// 一次等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Cancelled,
}

/// 策略中所有的等待都通过该trait完成，测试时可以替换成不真正睡眠的实现。
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = Wake> + Send;

    /// 是否已经收到停止信号，不等待
    fn is_cancelled(&self) -> bool;
}

/// 基于 tokio 定时器的等待，`token` 被取消时立即返回。
#[derive(Debug, Clone, Default)]
pub struct TokioSleeper {
    token: CancellationToken,
}

impl TokioSleeper {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = Wake> + Send {
        let token = self.token.clone();

        async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => Wake::Elapsed,
                _ = token.cancelled() => Wake::Cancelled,
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_elapses() {
        let sleeper = TokioSleeper::default();

        assert_eq!(sleeper.sleep(Duration::from_secs(5)).await, Wake::Elapsed);
    }

    #[tokio::test]
    async fn cancelled_token_interrupts_sleep() {
        let token = CancellationToken::new();
        let sleeper = TokioSleeper::new(token.clone());
        assert!(!sleeper.is_cancelled());
        token.cancel();

        assert!(sleeper.is_cancelled());

        assert_eq!(sleeper.sleep(Duration::from_secs(3600)).await, Wake::Cancelled);
    }
}
