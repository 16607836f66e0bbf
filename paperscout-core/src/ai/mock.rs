use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::ai::error::CompletionError;
use crate::ai::provider::{CompletionProvider, CompletionRequest};

/// Mock behavior for the mock provider
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Return a fixed successful response
    #[default]
    Success,
    /// Return the given text
    Respond(String),
    /// Return the request's user prompt verbatim
    EchoUserPrompt,
    /// Always return an auth error
    AlwaysAuthError,
    /// Always return a network error
    AlwaysNetworkError,
    /// Return a network error N times, then succeed
    NetworkErrorThenSuccess { remaining_errors: usize },
    /// Work through a list of behaviors, one per call (falls back to Success
    /// when exhausted)
    BehaviorQueue { behaviors: Vec<MockBehavior> },
}

/// Mock completion provider for testing
#[derive(Clone)]
pub struct MockProvider {
    behavior: Arc<Mutex<MockBehavior>>,
    call_count: Arc<Mutex<usize>>,
    captured_requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(Mutex::new(0)),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn pop_behavior_from_queue(behavior: &mut MockBehavior) -> MockBehavior {
        if let MockBehavior::BehaviorQueue { behaviors } = behavior {
            if behaviors.is_empty() {
                return MockBehavior::Success;
            }
            return behaviors.remove(0);
        }
        behavior.clone()
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn captured_requests(&self) -> Vec<CompletionRequest> {
        self.captured_requests.lock().unwrap().clone()
    }

    pub fn last_captured_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        {
            let mut requests = self.captured_requests.lock().unwrap();
            requests.push(request.clone());
        }

        {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
        }

        let effective = {
            let mut behavior = self.behavior.lock().unwrap();
            Self::pop_behavior_from_queue(&mut behavior)
        };

        match effective {
            MockBehavior::Success => Ok("Mock response".to_string()),
            MockBehavior::Respond(text) => Ok(text),
            MockBehavior::EchoUserPrompt => Ok(request.user_prompt),
            MockBehavior::AlwaysAuthError => {
                Err(CompletionError::Auth(anyhow!("Mock auth error")))
            }
            MockBehavior::AlwaysNetworkError => {
                Err(CompletionError::Network(anyhow!("Mock network error")))
            }
            MockBehavior::NetworkErrorThenSuccess {
                mut remaining_errors,
            } => {
                if remaining_errors > 0 {
                    remaining_errors -= 1;
                    self.set_behavior(MockBehavior::NetworkErrorThenSuccess { remaining_errors });
                    Err(CompletionError::Network(anyhow!(
                        "Mock network error (remaining: {remaining_errors})"
                    )))
                } else {
                    Ok("Success after errors".to_string())
                }
            }
            MockBehavior::BehaviorQueue { .. } => {
                panic!("Bug: nested BehaviorQueue detected. Test setup error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_success() {
        let provider = MockProvider::new(MockBehavior::Success);

        let response = provider
            .complete(CompletionRequest::new("system", "user"))
            .await
            .unwrap();

        assert_eq!(response, "Mock response");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            provider.last_captured_request().unwrap().system_prompt,
            "system"
        );
    }

    #[tokio::test]
    async fn test_mock_provider_error_then_success() {
        let provider =
            MockProvider::new(MockBehavior::NetworkErrorThenSuccess { remaining_errors: 2 });
        let request = CompletionRequest::new("s", "u");

        let result1 = provider.complete(request.clone()).await;
        assert!(matches!(result1, Err(CompletionError::Network(_))));

        let result2 = provider.complete(request.clone()).await;
        assert!(matches!(result2, Err(CompletionError::Network(_))));

        let result3 = provider.complete(request).await;
        assert_eq!(result3.unwrap(), "Success after errors");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_behavior_queue() {
        let provider = MockProvider::new(MockBehavior::BehaviorQueue {
            behaviors: vec![
                MockBehavior::Respond("first".to_string()),
                MockBehavior::AlwaysNetworkError,
            ],
        });
        let request = CompletionRequest::new("s", "u");

        assert_eq!(provider.complete(request.clone()).await.unwrap(), "first");
        assert!(provider.complete(request.clone()).await.is_err());
        // Queue exhausted, falls back to Success
        assert_eq!(
            provider.complete(request).await.unwrap(),
            "Mock response"
        );
    }
}
