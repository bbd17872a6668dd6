use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use orchestrator_config::GatewayConfig;
use orchestrator_core::{
    CodedError, ErrorCode, InferenceBackend, InferenceDispatcher, OrchestratorResult,
    ProtocolKind,
};

use crate::http_adapter::HttpAdapter;
use crate::tensor::codec::{decode_response, encode_request};
use crate::tensor::{KServeClientFactory, TensorClient, TensorClientFactory};

/// 每个张量后端地址缓存的客户端及其并发许可
#[derive(Clone)]
struct CachedClient {
    client: Arc<dyn TensorClient>,
    permits: Arc<Semaphore>,
}

/// 推理网关：按协议把请求分发到通用 HTTP 或张量 RPC 后端
pub struct InferenceGateway {
    http: HttpAdapter,
    factory: Arc<dyn TensorClientFactory>,
    clients: Mutex<HashMap<String, CachedClient>>,
    shared_tensor_endpoint: Option<String>,
    probe_timeout: Duration,
}

impl InferenceGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_factory(config, Arc::new(KServeClientFactory::new()))
    }

    pub fn with_factory(config: &GatewayConfig, factory: Arc<dyn TensorClientFactory>) -> Self {
        Self {
            http: HttpAdapter::new(),
            factory,
            clients: Mutex::new(HashMap::new()),
            shared_tensor_endpoint: config.tensor_override().map(str::to_string),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }

    /// 张量调用实际使用的地址；开启共享地址后忽略任务自身的配置
    pub fn resolve_tensor_address<'a>(&'a self, backend: &'a InferenceBackend) -> &'a str {
        self.shared_tensor_endpoint
            .as_deref()
            .unwrap_or(backend.address.as_str())
    }

    /// 已缓存的客户端数量
    pub async fn cached_clients(&self) -> usize {
        self.clients.lock().await.len()
    }

    async fn client_for(
        &self,
        address: &str,
        max_concurrency: usize,
    ) -> Result<CachedClient, CodedError> {
        let mut clients = self.clients.lock().await;
        if let Some(cached) = clients.get(address) {
            return Ok(cached.clone());
        }

        let cached = CachedClient {
            client: self.factory.create(address)?,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        };
        clients.insert(address.to_string(), cached.clone());
        info!(address, max_concurrency, "创建张量推理客户端");
        Ok(cached)
    }

    /// 就绪探测：结果只记录日志，不影响后续调用
    async fn probe(&self, client: &dyn TensorClient, address: &str) {
        match tokio::time::timeout(self.probe_timeout, client.is_server_ready()).await {
            Ok(Ok(true)) => debug!(address, "张量后端已就绪"),
            Ok(Ok(false)) => warn!(
                code = %ErrorCode::NotReady,
                address,
                "张量后端未就绪，继续发送推理请求"
            ),
            Ok(Err(e)) => warn!(
                code = %ErrorCode::NotReady,
                address,
                error = %e,
                "就绪探测失败，继续发送推理请求"
            ),
            Err(_) => warn!(
                code = %ErrorCode::NotReady,
                address,
                "就绪探测超时，继续发送推理请求"
            ),
        }
    }

    async fn dispatch_tensor(
        &self,
        request: &Value,
        backend: &InferenceBackend,
    ) -> OrchestratorResult<Value> {
        let address = self.resolve_tensor_address(backend);
        let cached = self.client_for(address, backend.max_concurrency).await?;

        // 超出并发上限的调用在本地排队
        let _permit = cached
            .permits
            .acquire()
            .await
            .map_err(|_| CodedError::connection(format!("张量客户端已关闭: {address}")))?;

        self.probe(cached.client.as_ref(), address).await;

        let infer_request = encode_request(request, backend)?;
        let call = cached.client.infer(
            &backend.model_name,
            &backend.model_version,
            infer_request,
            &backend.headers,
        );
        let response = tokio::time::timeout(backend.timeout(), call)
            .await
            .map_err(|_| {
                CodedError::timeout(format!(
                    "张量推理超过 {}ms: {}/{}",
                    backend.timeout_ms, address, backend.model_name
                ))
            })??;

        Ok(decode_response(response)?)
    }
}

#[async_trait]
impl InferenceDispatcher for InferenceGateway {
    async fn dispatch(
        &self,
        request: Value,
        backend: &InferenceBackend,
    ) -> OrchestratorResult<Value> {
        match backend.protocol {
            ProtocolKind::GenericHttp => {
                info!(protocol = %backend.protocol, address = %backend.address, "分发推理请求");
                Ok(self.http.call(&request, backend).await?)
            }
            ProtocolKind::TensorRpc => {
                info!(
                    protocol = %backend.protocol,
                    address = %self.resolve_tensor_address(backend),
                    model = %backend.model_name,
                    "分发推理请求"
                );
                self.dispatch_tensor(&request, backend).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::codec::{InferResponse, InferTensor, OUTPUT_JSON};
    use crate::tensor::MockTensorClient;
    use orchestrator_core::OrchestratorError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingFactory {
        client: Arc<dyn TensorClient>,
        created: StdMutex<Vec<String>>,
    }

    impl RecordingFactory {
        fn new(client: MockTensorClient) -> Self {
            Self {
                client: Arc::new(client),
                created: StdMutex::new(Vec::new()),
            }
        }

        fn created(&self) -> Vec<String> {
            self.created.lock().unwrap().clone()
        }
    }

    impl TensorClientFactory for RecordingFactory {
        fn create(&self, address: &str) -> Result<Arc<dyn TensorClient>, CodedError> {
            self.created.lock().unwrap().push(address.to_string());
            Ok(self.client.clone())
        }
    }

    fn echo_response() -> InferResponse {
        InferResponse {
            model_name: "asr".to_string(),
            model_version: None,
            outputs: vec![InferTensor {
                name: OUTPUT_JSON.to_string(),
                shape: vec![1],
                datatype: "BYTES".to_string(),
                data: vec![json!("{\"output\":[{\"source\":\"ok\"}]}")],
            }],
        }
    }

    #[tokio::test]
    async fn test_failed_probe_does_not_block_inference() {
        let mut client = MockTensorClient::new();
        client
            .expect_is_server_ready()
            .times(1)
            .returning(|| Err(CodedError::connection("probe refused")));
        client
            .expect_infer()
            .times(1)
            .returning(|_, _, _, _| Ok(echo_response()));

        let factory = Arc::new(RecordingFactory::new(client));
        let gateway = InferenceGateway::with_factory(&GatewayConfig::default(), factory);
        let backend = InferenceBackend::tensor_rpc("http://triton:8000", "asr");

        let output = gateway.dispatch(json!({"audio": []}), &backend).await.unwrap();
        assert_eq!(output, json!({"output": [{"source": "ok"}]}));
    }

    #[tokio::test]
    async fn test_client_is_cached_per_address() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut client = MockTensorClient::new();
        client.expect_is_server_ready().returning(|| Ok(true));
        client.expect_infer().returning(move |model, version, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(model, "asr");
            assert_eq!(version, "1");
            Ok(echo_response())
        });

        let factory = Arc::new(RecordingFactory::new(client));
        let gateway = InferenceGateway::with_factory(&GatewayConfig::default(), factory.clone());
        let backend = InferenceBackend::tensor_rpc("http://triton:8000", "asr");

        for _ in 0..3 {
            gateway.dispatch(json!({}), &backend).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(factory.created(), vec!["http://triton:8000".to_string()]);
        assert_eq!(gateway.cached_clients().await, 1);
    }

    #[tokio::test]
    async fn test_shared_endpoint_overrides_task_address() {
        let mut client = MockTensorClient::new();
        client.expect_is_server_ready().returning(|| Ok(true));
        client
            .expect_infer()
            .returning(|_, _, _, _| Ok(echo_response()));

        let config = GatewayConfig {
            use_shared_tensor_endpoint: true,
            shared_tensor_endpoint: "http://shared:8000".to_string(),
            ..GatewayConfig::default()
        };
        let factory = Arc::new(RecordingFactory::new(client));
        let gateway = InferenceGateway::with_factory(&config, factory.clone());

        let first = InferenceBackend::tensor_rpc("http://task-a:8000", "asr");
        let second = InferenceBackend::tensor_rpc("http://task-b:8000", "asr");
        gateway.dispatch(json!({}), &first).await.unwrap();
        gateway.dispatch(json!({}), &second).await.unwrap();

        assert_eq!(factory.created(), vec!["http://shared:8000".to_string()]);
    }

    #[tokio::test]
    async fn test_infer_error_keeps_its_code() {
        let mut client = MockTensorClient::new();
        client.expect_is_server_ready().returning(|| Ok(true));
        client
            .expect_infer()
            .returning(|_, _, _, _| Err(CodedError::upstream("model not found")));

        let factory = Arc::new(RecordingFactory::new(client));
        let gateway = InferenceGateway::with_factory(&GatewayConfig::default(), factory);
        let backend = InferenceBackend::tensor_rpc("http://triton:8000", "missing");

        let err = gateway.dispatch(json!({}), &backend).await.unwrap_err();
        match err {
            OrchestratorError::Gateway(coded) => assert_eq!(coded.code, ErrorCode::Upstream),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
