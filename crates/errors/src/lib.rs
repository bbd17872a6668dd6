use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
mod tests;

/// 推理后端错误码
///
/// 所有面向后端的失败都归入这几个错误码，调用方不需要了解具体后端协议就能区分失败类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 传输层失败：连接被拒绝、DNS 解析失败等
    #[serde(rename = "GATEWAY-101")]
    Connection,
    /// 后端返回了非成功状态码
    #[serde(rename = "GATEWAY-102")]
    Upstream,
    /// 调用超过了配置的超时时间
    #[serde(rename = "GATEWAY-103")]
    Timeout,
    /// 就绪探测失败，仅用于日志，从不返回给调用方
    #[serde(rename = "GATEWAY-107")]
    NotReady,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Connection => "GATEWAY-101",
            ErrorCode::Upstream => "GATEWAY-102",
            ErrorCode::Timeout => "GATEWAY-103",
            ErrorCode::NotReady => "GATEWAY-107",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 带错误码的后端错误信封：{code, message, trace}
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct CodedError {
    pub code: ErrorCode,
    pub message: String,
    /// 诊断信息：底层错误链，以及在 RUST_BACKTRACE 开启时捕获的调用栈
    pub trace: String,
}

impl CodedError {
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            trace: String::new(),
        }
    }

    /// 根据底层错误构造信封，并记录完整的错误链
    pub fn capture<S: Into<String>>(
        code: ErrorCode,
        message: S,
        cause: &(dyn std::error::Error + 'static),
    ) -> Self {
        let mut trace = format!("{cause:?}");
        let mut source = cause.source();
        while let Some(inner) = source {
            trace.push_str("\ncaused by: ");
            trace.push_str(&inner.to_string());
            source = inner.source();
        }

        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            trace.push_str("\n\n");
            trace.push_str(&backtrace.to_string());
        }

        Self {
            code,
            message: message.into(),
            trace,
        }
    }

    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::Connection, message)
    }

    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::Upstream, message)
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn with_trace<S: Into<String>>(mut self, trace: S) -> Self {
        self.trace = trace.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// 路由永远不会失败（未映射的任务进入默认队列），保留该类型仅为完整的错误分类
    #[error("路由错误: {0}")]
    Routing(String),
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("流水线已存在: {id}")]
    DuplicatePipeline { id: String },
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("任务未注册: {id}")]
    TaskNotFound { id: String },
    #[error("流水线未找到: {id}")]
    PipelineNotFound { id: String },
    #[error("推理后端错误: {0}")]
    Gateway(#[from] CodedError),
    #[error("流水线第 {step_index} 步 ({task_type}) 执行失败: {source}")]
    StepFailed {
        step_index: usize,
        task_type: String,
        #[source]
        source: Box<OrchestratorError>,
    },
    #[error("非法的状态转换: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("消息队列错误: {0}")]
    MessageQueue(String),
    #[error("数据存储错误: {0}")]
    Datastore(String),
    #[error("任务执行错误: {0}")]
    TaskExecution(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn duplicate_pipeline<S: Into<String>>(id: S) -> Self {
        Self::DuplicatePipeline { id: id.into() }
    }

    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskNotFound { id: id.into() }
    }

    pub fn pipeline_not_found<S: Into<String>>(id: S) -> Self {
        Self::PipelineNotFound { id: id.into() }
    }

    /// 为流水线步骤失败附加步骤序号和任务类型
    pub fn at_step<S: Into<String>>(self, step_index: usize, task_type: S) -> Self {
        Self::StepFailed {
            step_index,
            task_type: task_type.into(),
            source: Box::new(self),
        }
    }

    /// 去掉步骤注解后的根本错误
    pub fn root(&self) -> &OrchestratorError {
        match self {
            OrchestratorError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// 如果根本错误来自推理后端，返回其错误信封
    pub fn coded(&self) -> Option<&CodedError> {
        match self.root() {
            OrchestratorError::Gateway(coded) => Some(coded),
            _ => None,
        }
    }

    /// 调用方的请求本身有问题（对应 4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.root(),
            OrchestratorError::Validation(_)
                | OrchestratorError::DuplicatePipeline { .. }
                | OrchestratorError::TaskNotFound { .. }
                | OrchestratorError::PipelineNotFound { .. }
        )
    }

    pub fn user_message(&self) -> &str {
        match self.root() {
            OrchestratorError::Validation(_) => "输入数据验证失败",
            OrchestratorError::DuplicatePipeline { .. } => "流水线ID已被占用",
            OrchestratorError::TaskNotFound { .. } => "请求的任务类型未注册",
            OrchestratorError::PipelineNotFound { .. } => "请求的流水线不存在",
            OrchestratorError::Gateway(coded) => match coded.code {
                ErrorCode::Timeout => "推理后端响应超时",
                ErrorCode::Connection => "无法连接推理后端",
                _ => "推理后端返回错误",
            },
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}
