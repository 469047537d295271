use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Transport double that records every request and replays scripted replies.
///
/// Once the script runs out the last reply is repeated.
#[derive(Debug)]
pub(crate) struct RecordingHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    last: Mutex<Result<HttpResponse, HttpError>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingHttpClient {
    pub(crate) fn replying(body: &str) -> Self {
        Self::scripted(vec![Ok(HttpResponse::ok_json(body))])
    }

    pub(crate) fn scripted(script: Vec<Result<HttpResponse, HttpError>>) -> Self {
        let last = script
            .last()
            .cloned()
            .unwrap_or_else(|| Err(HttpError::new("no scripted response")));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.recorded_requests().len()
    }
}

impl HttpClient for RecordingHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        let response = self
            .script
            .lock()
            .expect("script should not be poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                self.last
                    .lock()
                    .expect("script should not be poisoned")
                    .clone()
            });
        Box::pin(async move { response })
    }
}
