//! JSON 请求与张量之间的转换（KServe v2 推理协议的 JSON 形式）

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use orchestrator_core::{CodedError, InferenceBackend, OrchestratorError, OrchestratorResult};

/// 未声明输入张量时，整个请求以该名称作为单个 BYTES 张量发送
pub const INPUT_JSON: &str = "INPUT_JSON";
/// 只有这一个字符串输出时，把它解析回 JSON
pub const OUTPUT_JSON: &str = "OUTPUT_JSON";

pub const DATATYPE_BYTES: &str = "BYTES";
pub const DATATYPE_FP64: &str = "FP64";
pub const DATATYPE_BOOL: &str = "BOOL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub datatype: String,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestedOutput {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferRequest {
    pub inputs: Vec<InferTensor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<RequestedOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferResponse {
    #[serde(default)]
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default)]
    pub outputs: Vec<InferTensor>,
}

impl InferTensor {
    fn bytes<S: Into<String>>(name: S, data: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            shape: vec![data.len()],
            datatype: DATATYPE_BYTES.to_string(),
            data,
        }
    }

    /// 把一个 JSON 字段编码为张量：字符串 → BYTES，数字 → FP64，布尔 → BOOL，
    /// 同类数组保留形状，其余结构序列化为 JSON 字符串后按 BYTES 发送
    fn from_value(name: &str, value: &Value) -> Self {
        let (datatype, data) = match value {
            Value::String(_) => (DATATYPE_BYTES, vec![value.clone()]),
            Value::Number(_) => (DATATYPE_FP64, vec![value.clone()]),
            Value::Bool(_) => (DATATYPE_BOOL, vec![value.clone()]),
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
                (DATATYPE_BYTES, items.clone())
            }
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_number) => {
                (DATATYPE_FP64, items.clone())
            }
            other => (DATATYPE_BYTES, vec![Value::String(other.to_string())]),
        };

        Self {
            name: name.to_string(),
            shape: vec![data.len()],
            datatype: datatype.to_string(),
            data,
        }
    }
}

/// 按后端声明的输入输出名把 JSON 请求编码为推理请求
pub fn encode_request(request: &Value, backend: &InferenceBackend) -> OrchestratorResult<InferRequest> {
    let inputs = if backend.inputs.is_empty() {
        vec![InferTensor::bytes(
            INPUT_JSON,
            vec![Value::String(request.to_string())],
        )]
    } else {
        let fields = request.as_object().ok_or_else(|| {
            OrchestratorError::validation("张量后端声明了输入名，请求必须是JSON对象")
        })?;
        backend
            .inputs
            .iter()
            .map(|name| {
                fields
                    .get(name)
                    .map(|value| InferTensor::from_value(name, value))
                    .ok_or_else(|| OrchestratorError::validation(format!("请求缺少输入字段: {name}")))
            })
            .collect::<OrchestratorResult<Vec<_>>>()?
    };

    let outputs = backend
        .outputs
        .iter()
        .map(|name| RequestedOutput { name: name.clone() })
        .collect();

    Ok(InferRequest { inputs, outputs })
}

/// 把推理响应解码为以输出名为键的 JSON 对象
///
/// 单元素张量展开为标量；唯一的 `OUTPUT_JSON` 字符串输出被解析回原始 JSON。
pub fn decode_response(response: InferResponse) -> Result<Value, CodedError> {
    if let [only] = response.outputs.as_slice() {
        if only.name == OUTPUT_JSON {
            let text = only
                .data
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| CodedError::upstream("OUTPUT_JSON 输出不是字符串"))?;
            return serde_json::from_str(text).map_err(|e| {
                CodedError::capture(
                    orchestrator_core::ErrorCode::Upstream,
                    "OUTPUT_JSON 输出不是合法JSON",
                    &e,
                )
            });
        }
    }

    let mut decoded = Map::new();
    for tensor in response.outputs {
        let value = if tensor.data.len() == 1 && tensor.shape.iter().product::<usize>() <= 1 {
            tensor.data.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(tensor.data)
        };
        decoded.insert(tensor.name, value);
    }
    Ok(Value::Object(decoded))
}
