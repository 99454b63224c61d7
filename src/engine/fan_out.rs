// ==========================================
// 班次生产数据采集 - 并发扇出/汇聚
// ==========================================
// 职责: 同时发起 N 个独立异步操作，全部结束后统一汇总
// 规则: 单项失败记录日志并计数，不中断其他操作
// ==========================================

use futures::future::join_all;
use std::fmt::{Debug, Display};
use std::future::Future;
use tracing::warn;

/// 扇出汇总结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutReport<K, T> {
    pub succeeded: Vec<(K, T)>,
    pub failed: Vec<(K, String)>,
}

impl<K, T> FanOutReport<K, T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// 对每个 key 并发执行 op，返回逐项结果
pub async fn fan_out<K, T, E, F, Fut>(keys: Vec<K>, op: F) -> FanOutReport<K, T>
where
    K: Clone + Debug,
    E: Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let tasks = keys.into_iter().map(|key| {
        let fut = op(key.clone());
        async move { (key, fut.await) }
    });

    let results = join_all(tasks).await;

    let mut report = FanOutReport {
        succeeded: Vec::with_capacity(results.len()),
        failed: Vec::new(),
    };
    for (key, result) in results {
        match result {
            Ok(value) => report.succeeded.push((key, value)),
            Err(e) => {
                warn!(key = ?key, error = %e, "扇出操作失败");
                report.failed.push((key, e.to_string()));
            }
        }
    }

    tracing::debug!(
        total = report.total(),
        succeeded = report.success_count(),
        failed = report.failure_count(),
        "扇出操作全部结束"
    );

    report
}

// ==========================================
// 班组恢复策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamResolution {
    /// 以远端结果为准
    TrustRemote,
    /// 远端无记录而本地有，保留本地缓存
    KeepLocal,
    /// 远端少于本地记录，合并后提示
    PartialWarning { found: usize, expected: usize },
}

impl TeamResolution {
    /// found: 远端找到的分配记录总数；expected: 本地已记录人数
    pub fn decide(found: usize, expected: usize) -> Self {
        if found == 0 && expected > 0 {
            TeamResolution::KeepLocal
        } else if found < expected {
            TeamResolution::PartialWarning { found, expected }
        } else {
            TeamResolution::TrustRemote
        }
    }
}
