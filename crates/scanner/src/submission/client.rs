//! 영속화 엔드포인트 클라이언트
//!
//! `POST <endpoint>`에 `{"qr_text": ..., "operator"?: ...}` JSON을 보내고
//! `{"success": bool, "error"?: string}` 응답을 해석합니다.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SubmissionError;

/// 서버가 에러 메시지 없이 실패를 보고했을 때의 기본 메시지
pub const UNKNOWN_SERVER_ERROR: &str = "unknown server error";

/// 저장 요청 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveRequest {
    /// 디코드된 텍스트
    pub qr_text: String,
    /// 운영자 식별자 (없으면 필드 생략)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

/// 저장 응답 본문
#[derive(Debug, Clone, Deserialize)]
pub struct SaveResponse {
    /// 저장 성공 여부
    #[serde(default)]
    pub success: bool,
    /// 실패 사유
    #[serde(default)]
    pub error: Option<String>,
}

/// 저장 요청을 보내는 클라이언트 trait
///
/// 재시도는 하지 않습니다. 겹치는 요청은 허용됩니다.
pub trait PersistClient: Send + Sync + 'static {
    /// 스캔 텍스트를 저장합니다.
    fn save(
        &self,
        request: &SaveRequest,
    ) -> impl Future<Output = Result<(), SubmissionError>> + Send;
}

/// reqwest 기반 HTTP 클라이언트
#[derive(Debug, Clone)]
pub struct HttpPersistClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPersistClient {
    /// 엔드포인트와 요청 타임아웃으로 클라이언트를 생성합니다.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// 엔드포인트 URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PersistClient for HttpPersistClient {
    async fn save(&self, request: &SaveRequest) -> Result<(), SubmissionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), bytes = body.len(), "save response received");

        interpret_response(status.as_u16(), status.is_success(), &body)
    }
}

/// 상태 코드와 본문을 제출 결과로 해석합니다.
fn interpret_response(code: u16, is_success: bool, body: &[u8]) -> Result<(), SubmissionError> {
    match serde_json::from_slice::<SaveResponse>(body) {
        Ok(parsed) if parsed.success && is_success => Ok(()),
        Ok(parsed) if !parsed.success => Err(SubmissionError::Rejected(
            parsed
                .error
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SERVER_ERROR.to_owned()),
        )),
        Ok(_) => Err(SubmissionError::Status(code)),
        Err(_) if !is_success => Err(SubmissionError::Status(code)),
        Err(e) => Err(SubmissionError::Transport(format!("invalid response body: {e}"))),
    }
}

// --- 테스트용 mock ---

#[cfg(test)]
type ScriptedResponse = (Duration, Result<(), SubmissionError>);

/// 미리 정한 결과를 돌려주는 테스트용 클라이언트
#[cfg(test)]
pub struct MockPersistClient {
    responses: std::sync::Mutex<std::collections::VecDeque<ScriptedResponse>>,
    requests: std::sync::Mutex<Vec<SaveRequest>>,
}

#[cfg(test)]
impl MockPersistClient {
    /// 항상 성공하는 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// 다음 요청의 결과와 지연을 추가합니다.
    pub fn with_response(self, delay: Duration, result: Result<(), SubmissionError>) -> Self {
        self.responses.lock().unwrap().push_back((delay, result));
        self
    }

    /// 받은 요청 목록
    pub fn requests(&self) -> Vec<SaveRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl PersistClient for MockPersistClient {
    async fn save(&self, request: &SaveRequest) -> Result<(), SubmissionError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(()),
        }
    }
}
