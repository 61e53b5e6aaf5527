//! Integration tests against the live Gemini API.
//! These tests require an API key in the environment to run.

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use geminius::{Content, GenerateContentRequest, Gemini, KnownModel, Model};

    fn client() -> Option<Gemini> {
        let api_key = std::env::var("GOOGLE_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test: GOOGLE_API_KEY not set");
            return None;
        }
        Some(Gemini::new(api_key).expect("Failed to create client"))
    }

    #[tokio::test]
    async fn test_simple_request() {
        let Some(client) = client() else {
            return;
        };

        let request = GenerateContentRequest::new(vec![Content::user("Say 'test passed'")]);
        let response = client
            .send(&Model::Known(KnownModel::Gemini20Flash), &request)
            .await;
        assert!(
            response.is_ok(),
            "Request should succeed with valid API key"
        );
    }

    #[tokio::test]
    async fn test_streaming_response() {
        let Some(client) = client() else {
            return;
        };

        let request = GenerateContentRequest::new(vec![Content::user("Count to 3")]);
        let mut stream = client
            .stream(&Model::Known(KnownModel::Gemini20Flash), &request)
            .await
            .expect("Stream request should succeed");
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk.expect("chunk should parse").text());
        }
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn test_bad_key_is_rejected() {
        if std::env::var("GOOGLE_API_KEY").is_err() {
            eprintln!("Skipping test: GOOGLE_API_KEY not set");
            return;
        }

        let client = Gemini::new(Some("not-a-real-key".to_string())).unwrap();
        let request = GenerateContentRequest::new(vec![Content::user("hi")]);
        let err = client
            .send(&Model::Known(KnownModel::Gemini20Flash), &request)
            .await
            .unwrap_err();
        assert!(err.is_bad_request() || err.is_authentication(), "{err}");
    }
}
