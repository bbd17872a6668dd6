use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::TaskKind;
use orchestrator_errors::{CodedError, OrchestratorResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceText {
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationPair {
    #[serde(default)]
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransliterationCandidates {
    #[serde(default)]
    pub source: String,
    pub target: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioContent {
    #[serde(rename = "audioContent")]
    pub audio_content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputList<T> {
    output: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct AudioList {
    audio: Vec<AudioContent>,
}

/// 步骤输出，按任务类别区分
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Asr(Vec<SourceText>),
    Translation(Vec<TranslationPair>),
    Transliteration(Vec<TransliterationCandidates>),
    Tts(Vec<AudioContent>),
    Generic(Value),
}

impl StepOutput {
    /// 按任务类别解码后端响应；响应不符合该类别的格式时返回上游错误
    pub fn decode(kind: TaskKind, raw: Value) -> OrchestratorResult<Self> {
        let output = match kind {
            TaskKind::Asr => StepOutput::Asr(decode_output(kind, raw)?),
            TaskKind::Translation => StepOutput::Translation(decode_output(kind, raw)?),
            TaskKind::Transliteration => StepOutput::Transliteration(decode_output(kind, raw)?),
            TaskKind::Tts => {
                let list: AudioList = serde_json::from_value(raw).map_err(|e| {
                    CodedError::upstream(format!("响应不符合 {kind} 输出格式: {e}"))
                })?;
                StepOutput::Tts(list.audio)
            }
            TaskKind::Generic => StepOutput::Generic(raw),
        };
        Ok(output)
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            StepOutput::Asr(_) => TaskKind::Asr,
            StepOutput::Translation(_) => TaskKind::Translation,
            StepOutput::Transliteration(_) => TaskKind::Transliteration,
            StepOutput::Tts(_) => TaskKind::Tts,
            StepOutput::Generic(_) => TaskKind::Generic,
        }
    }

    /// 把本步输出转换为下一步的请求体
    pub fn into_next_input(self) -> Value {
        match self {
            StepOutput::Asr(items) => json!({
                "input": items
                    .into_iter()
                    .map(|t| json!({"source": t.source}))
                    .collect::<Vec<_>>()
            }),
            StepOutput::Translation(pairs) => json!({
                "input": pairs
                    .into_iter()
                    .map(|p| json!({"source": p.target}))
                    .collect::<Vec<_>>()
            }),
            StepOutput::Transliteration(candidates) => json!({
                "input": candidates
                    .into_iter()
                    .map(|c| json!({"source": c.target.into_iter().next().unwrap_or_default()}))
                    .collect::<Vec<_>>()
            }),
            StepOutput::Tts(audio) => json!({
                "audio": audio
                    .into_iter()
                    .map(|a| json!({"audioContent": a.audio_content}))
                    .collect::<Vec<_>>()
            }),
            StepOutput::Generic(value) => value,
        }
    }
}

fn decode_output<T: serde::de::DeserializeOwned>(
    kind: TaskKind,
    raw: Value,
) -> OrchestratorResult<Vec<T>> {
    let list: OutputList<T> = serde_json::from_value(raw)
        .map_err(|e| CodedError::upstream(format!("响应不符合 {kind} 输出格式: {e}")))?;
    Ok(list.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_errors::{ErrorCode, OrchestratorError};

    #[test]
    fn test_asr_transcript_becomes_source() {
        let raw = json!({"output": [{"source": "namaste duniya"}], "config": {}});
        let output = StepOutput::decode(TaskKind::Asr, raw).unwrap();
        assert_eq!(output.kind(), TaskKind::Asr);
        assert_eq!(
            output.into_next_input(),
            json!({"input": [{"source": "namaste duniya"}]})
        );
    }

    #[test]
    fn test_translation_target_becomes_source() {
        let raw = json!({"output": [{"source": "hello", "target": "नमस्ते"}]});
        let next = StepOutput::decode(TaskKind::Translation, raw)
            .unwrap()
            .into_next_input();
        assert_eq!(next, json!({"input": [{"source": "नमस्ते"}]}));
    }

    #[test]
    fn test_transliteration_takes_first_candidate() {
        let raw = json!({"output": [{"source": "namaste", "target": ["नमस्ते", "नमसते"]}]});
        let next = StepOutput::decode(TaskKind::Transliteration, raw)
            .unwrap()
            .into_next_input();
        assert_eq!(next, json!({"input": [{"source": "नमस्ते"}]}));
    }

    #[test]
    fn test_tts_audio_passed_on() {
        let raw = json!({"audio": [{"audioContent": "UklGRg=="}]});
        let next = StepOutput::decode(TaskKind::Tts, raw).unwrap().into_next_input();
        assert_eq!(next, json!({"audio": [{"audioContent": "UklGRg=="}]}));
    }

    #[test]
    fn test_generic_passthrough() {
        let raw = json!({"anything": [1, 2, 3]});
        let next = StepOutput::decode(TaskKind::Generic, raw.clone())
            .unwrap()
            .into_next_input();
        assert_eq!(next, raw);
    }

    #[test]
    fn test_malformed_response_is_upstream_error() {
        let err = StepOutput::decode(TaskKind::Asr, json!({"unexpected": true})).unwrap_err();
        match err {
            OrchestratorError::Gateway(coded) => assert_eq!(coded.code, ErrorCode::Upstream),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
