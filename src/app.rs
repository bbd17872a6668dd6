use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use orchestrator_api::{create_app, AppState};
use orchestrator_config::AppConfig;
use orchestrator_core::{Datastore, MessageQueue, SystemClock};
use orchestrator_dispatcher::{BeatScheduler, QueueRouter};
use orchestrator_domain::{PipelineManager, Registry};
use orchestrator_gateway::InferenceGateway;
use orchestrator_infrastructure::{InMemoryDatastore, InMemoryMessageQueue, InMemoryQueueConfig};
use orchestrator_worker::{HandlerRegistry, LoggingNotifier, WorkerPool};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tracing::{error, info};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行周期调度
    Beat,
    /// 仅运行Worker
    Worker,
    /// 仅运行API服务器
    Api,
    /// 运行所有组件
    All,
}

impl AppMode {
    fn runs_beat(self) -> bool {
        matches!(self, AppMode::Beat | AppMode::All)
    }

    fn runs_worker(self) -> bool {
        matches!(self, AppMode::Worker | AppMode::All)
    }

    fn runs_api(self) -> bool {
        matches!(self, AppMode::Api | AppMode::All)
    }
}

/// 主应用程序
///
/// 同一进程内的组件共享一个内存消息代理和一个文档存储。
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    broker: Arc<dyn MessageQueue>,
    datastore: Arc<dyn Datastore>,
    router: Arc<QueueRouter>,
    beat: Option<Arc<BeatScheduler>>,
    manager: Arc<PipelineManager>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let broker: Arc<dyn MessageQueue> =
            Arc::new(InMemoryMessageQueue::with_config(InMemoryQueueConfig {
                max_queue_size: config.broker.max_queue_size,
            }));
        let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());

        let router = Arc::new(
            QueueRouter::default_topology(config.broker.default_queue.clone())
                .context("创建队列路由失败")?,
        );
        router
            .declare_queues(broker.as_ref())
            .await
            .context("声明队列失败")?;

        let beat = if mode.runs_beat() && config.beat.enabled {
            let beat = BeatScheduler::with_default_schedule(
                Arc::clone(&router),
                Arc::clone(&broker),
                Arc::new(SystemClock),
            )
            .await
            .context("加载默认周期任务表失败")?;
            Some(Arc::new(beat))
        } else {
            None
        };

        let gateway = Arc::new(InferenceGateway::new(&config.gateway));
        let manager = Arc::new(PipelineManager::new(Arc::new(Registry::new()), gateway));

        Ok(Self {
            config,
            mode,
            broker,
            datastore,
            router,
            beat,
            manager,
        })
    }

    /// 启动当前模式下的所有组件，等待它们在关闭信号后退出
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        let mut handles: Vec<(&'static str, JoinHandle<Result<()>>)> = Vec::new();

        if let Some(beat) = &self.beat {
            handles.push(("beat", self.spawn_beat(Arc::clone(beat), shutdown_rx.resubscribe())));
        }
        if self.mode.runs_worker() && self.config.worker.enabled {
            handles.push(("worker", self.spawn_worker(shutdown_rx.resubscribe())));
        }
        if self.mode.runs_api() && self.config.api.enabled {
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定API地址失败: {}", self.config.api.bind_address))?;
            handles.push(("api", self.spawn_api(listener, shutdown_rx.resubscribe())));
        }

        if handles.is_empty() {
            anyhow::bail!("模式 {:?} 下没有启用任何组件，请检查配置", self.mode);
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => info!("{name} 组件已停止"),
                Ok(Err(e)) => error!("{name} 组件运行失败: {e:#}"),
                Err(e) => error!("{name} 组件任务异常退出: {e}"),
            }
        }

        Ok(())
    }

    fn spawn_beat(
        &self,
        beat: Arc<BeatScheduler>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<Result<()>> {
        let tick_interval = Duration::from_millis(self.config.beat.tick_interval_ms);
        tokio::spawn(async move {
            beat.run(tick_interval, shutdown_rx).await?;
            Ok(())
        })
    }

    fn spawn_worker(&self, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<Result<()>> {
        let handlers = Arc::new(HandlerRegistry::with_default_handlers(
            Arc::clone(&self.datastore),
            Arc::new(LoggingNotifier),
        ));
        let pool = Arc::new(WorkerPool::from_config(
            &self.config.worker,
            Arc::clone(&self.broker),
            handlers,
        ));
        info!(
            worker_id = %pool.worker_id(),
            queues = ?pool.queues(),
            concurrency = pool.concurrency(),
            default_queue = %self.router.default_queue(),
            "启动Worker"
        );

        tokio::spawn(async move {
            pool.run(shutdown_rx).await?;
            Ok(())
        })
    }

    fn spawn_api(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<Result<()>> {
        let mut state = AppState::new(Arc::clone(&self.manager));
        if let Some(beat) = &self.beat {
            state = state.with_beat(Arc::clone(beat));
        }
        let app = create_app(state, &self.config.api);
        let bind_address = self.config.api.bind_address.clone();

        tokio::spawn(async move {
            info!("API服务器监听 {bind_address}");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("API服务器收到关闭信号");
                })
                .await
                .context("API服务器运行失败")?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.api.bind_address = "127.0.0.1:0".to_string();
        config.beat.tick_interval_ms = 20;
        config.worker.poll_interval_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_beat_only_mode_skips_worker_and_api() {
        let app = Application::new(test_config(), AppMode::Beat).await.unwrap();
        assert!(app.beat.is_some());

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { app.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_api_mode_has_no_beat() {
        let app = Application::new(test_config(), AppMode::Api).await.unwrap();
        assert!(app.beat.is_none());
    }

    #[tokio::test]
    async fn test_disabled_components_fail_fast() {
        let mut config = test_config();
        config.worker.enabled = false;
        let app = Application::new(config, AppMode::Worker).await.unwrap();

        let (_tx, rx) = broadcast::channel(1);
        assert!(app.run(rx).await.is_err());
    }

    #[tokio::test]
    async fn test_all_mode_runs_default_schedule_through_workers() {
        let mut config = test_config();
        config.worker.concurrency = 2;
        let app = Arc::new(Application::new(config, AppMode::All).await.unwrap());

        let (tx, rx) = broadcast::channel(1);
        let runner = Arc::clone(&app);
        let handle = tokio::spawn(async move { runner.run(rx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
