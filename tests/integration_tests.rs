use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;

use artefact_gen::config::{AuthScheme, CredentialSpec, StaticCredentials};
use artefact_gen::providers::ollama::list_local_models;
use artefact_gen::{
  Error, Failure, GenerationRequest, Generator, GeneratorConfig, HttpTransport, ImageInput,
  ProjectContext, ProviderConfig, ProviderKind, RetryPolicy, SamplingOverrides, TransportError,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn init_logging()
{   let _ = env_logger::builder().is_test(true).try_init();
}

fn context() -> ProjectContext
{   ProjectContext
    {   description: "A community boathouse built from reclaimed timber".to_string()
      , location: "Bristol harbourside".to_string()
      , date: "2035".to_string()
      , user_bios: "Rowing club volunteer, harbour ecologist".to_string()
      , themes: "repair, shared ownership".to_string()
      , category: "Club newsletter".to_string()
      , closing_instruction: None
    }
}

fn anthropic(server: &MockServer) -> ProviderConfig
{   ProviderConfig
    {   name: "anthropic".to_string()
      , kind: ProviderKind::CloudVision
      , model: "claude-sonnet-4-20250514".to_string()
      , endpoint: format!("{}/v1/messages", server.uri())
      , headers: BTreeMap::from([
          ("anthropic-version".to_string(), "2023-06-01".to_string())
        ])
      , credential: Some(CredentialSpec
        {   env_var: "ANTHROPIC_API_KEY".to_string()
          , header: "x-api-key".to_string()
          , scheme: AuthScheme::Raw
        })
      , max_tokens: 4000
      , temperature: 0.7
      , top_p: 0.9
      , presence_penalty: None
      , frequency_penalty: None
      , supports_vision: true
      , max_image_bytes: None
      , timeout_secs: Some(5)
    }
}

fn perplexity(server: &MockServer) -> ProviderConfig
{   ProviderConfig
    {   name: "perplexity".to_string()
      , kind: ProviderKind::CloudText
      , model: "sonar".to_string()
      , endpoint: format!("{}/chat/completions", server.uri())
      , headers: BTreeMap::new()
      , credential: Some(CredentialSpec
        {   env_var: "PERPLEXITY_API_KEY".to_string()
          , header: "Authorization".to_string()
          , scheme: AuthScheme::Bearer
        })
      , presence_penalty: Some(0.1)
      , supports_vision: false
      , ..anthropic(server)
    }
}

fn generator() -> Generator<HttpTransport, StaticCredentials>
{   let creds = StaticCredentials::new()
      .with("ANTHROPIC_API_KEY", "sk-ant-test")
      .with("PERPLEXITY_API_KEY", "pplx-test");
    let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40));
    Generator::new(HttpTransport::new().unwrap(), creds, policy)
}

fn png(width: u32, height: u32) -> Vec<u8>
{   let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn anthropic_reply(text: &str) -> Value
{   json!({
      "id": "msg_01",
      "type": "message",
      "role": "assistant",
      "content": [ { "type": "text", "text": text } ],
      "stop_reason": "end_turn"
    })
}

#[tokio::test]
async fn vision_generation_end_to_end()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/messages"))
      .and(header("x-api-key", "sk-ant-test"))
      .and(header("anthropic-version", "2023-06-01"))
      .and(header("content-type", "application/json"))
      .and(body_partial_json(json!({ "model": "claude-sonnet-4-20250514", "max_tokens": 4000 })))
      .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply(
        "<think>The plan shows a slipway.</think>\n\n# Boathouse Bulletin\nIssue 1"
      )))
      .expect(1)
      .mount(&server)
      .await;

    let request = GenerationRequest::new(context())
      .with_image(ImageInput::new("plan.png", png(2000, 1000)))
      .with_image(ImageInput::new("site.png", png(300, 200)));
    let result = generator().generate(&anthropic(&server), &request).await.unwrap();

    assert!(result.success);
    assert_eq!(result.text, "# Boathouse Bulletin\nIssue 1");
    assert_eq!(result.reasoning.as_deref(), Some("The plan shows a slipway."));
    assert_eq!(result.provider, "anthropic");

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    let content = body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(content.len(), 3);
    assert_eq!(content[0]["type"], "image");
    assert_eq!(content[0]["source"]["media_type"], "image/png");
    assert_eq!(content[1]["type"], "image");
    assert_eq!(content[2]["type"], "text");
    assert!(content[2]["text"].as_str().unwrap().contains("2 image(s)"));
    assert!(body["system"].as_str().unwrap().contains("<think>"));
}

#[tokio::test]
async fn text_generation_uses_chat_shape_and_overrides()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer pplx-test"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [ { "message": { "role": "assistant", "content": "Newsletter body" } } ]
      })))
      .expect(1)
      .mount(&server)
      .await;

    let request = GenerationRequest::new(context())
      .with_overrides(SamplingOverrides
      {   temperature: Some(1.2)
        , ..Default::default()
      });
    let result = generator().generate(&perplexity(&server), &request).await.unwrap();
    assert_eq!(result.text, "Newsletter body");

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["temperature"], json!(1.2));
    // short project description gets the larger completion budget
    assert_eq!(body["max_tokens"], 1600);
}

#[tokio::test]
async fn transient_failures_are_retried_until_success()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
      .up_to_n_times(2)
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply("Done")))
      .expect(1)
      .mount(&server)
      .await;

    let result = generator()
      .generate(&anthropic(&server), &GenerationRequest::new(context()))
      .await
      .unwrap();
    assert_eq!(result.text, "Done");

    // every attempt carried the identical payload
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
    assert!(received.windows(2).all(|w| w[0].body == w[1].body));
}

#[tokio::test]
async fn unauthorized_is_not_retried()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
      .expect(1)
      .mount(&server)
      .await;

    let err = generator()
      .generate(&anthropic(&server), &GenerationRequest::new(context()))
      .await
      .unwrap_err();
    assert_eq!(err, Error::Client { status: 401, body: "invalid x-api-key".to_string() });
}

#[tokio::test]
async fn exhausted_retries_report_attempts()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(500).set_body_string("down"))
      .expect(4)
      .mount(&server)
      .await;

    let err = generator()
      .generate(&anthropic(&server), &GenerationRequest::new(context()))
      .await
      .unwrap_err();
    assert_eq!(err, Error::RetryExhausted
    {   attempts: 4
      , last: Failure::RetryableStatus { status: 500, body: "down".to_string() }
    });
}

#[tokio::test]
async fn slow_provider_times_out_and_is_retried()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(anthropic_reply("too late"))
          .set_delay(Duration::from_secs(3))
      )
      .expect(2)
      .mount(&server)
      .await;

    let provider = ProviderConfig
    {   timeout_secs: Some(1)
      , ..anthropic(&server)
    };
    let generator = Generator::new(
      HttpTransport::new().unwrap(),
      StaticCredentials::new().with("ANTHROPIC_API_KEY", "sk-ant-test"),
      RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(10))
    );

    let err = generator
      .generate(&provider, &GenerationRequest::new(context()))
      .await
      .unwrap_err();
    assert_eq!(err, Error::RetryExhausted
    {   attempts: 2
      , last: Failure::Network(TransportError::Timeout)
    });
}

#[tokio::test]
async fn vision_request_to_text_provider_never_hits_network()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let request = GenerationRequest::new(context())
      .with_image(ImageInput::new("plan.png", png(10, 10)));
    let err = generator().generate(&perplexity(&server), &request).await.unwrap_err();
    assert_eq!(err.kind(), "config");
}

#[tokio::test]
async fn invalid_image_never_hits_network()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let request = GenerationRequest::new(context())
      .with_image(ImageInput::new("notes.txt", b"not an image".to_vec()));
    let err = generator().generate(&anthropic(&server), &request).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn error_object_in_success_body_is_a_parse_error()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "type": "error",
        "error": { "type": "invalid_request_error", "message": "bad" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let err = generator()
      .generate(&anthropic(&server), &GenerationRequest::new(context()))
      .await
      .unwrap_err();
    assert_eq!(err.kind(), "parse");
}

#[tokio::test]
async fn local_provider_sends_no_credentials()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/generate"))
      .and(|req: &Request| {
        !req.headers.contains_key("authorization") && !req.headers.contains_key("x-api-key")
      })
      .and(body_partial_json(json!({ "stream": false, "options": { "num_predict": 2000 } })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "response": "Local artefact",
        "done": true
      })))
      .expect(1)
      .mount(&server)
      .await;

    let json = format!(r#"{{
      "current_provider": "ollama",
      "providers": {{
        "ollama": {{ "kind": "local", "model": "llama3.1",
                     "endpoint": "{}/api/generate", "max_tokens": 2000 }}
      }}
    }}"#, server.uri());
    let config = GeneratorConfig::from_json_str(&json).unwrap();

    let result = generator()
      .generate(config.current().unwrap(), &GenerationRequest::new(context()))
      .await
      .unwrap();
    assert_eq!(result.text, "Local artefact");
}

#[tokio::test]
async fn lists_local_models()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/tags"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "models": [ { "name": "llama3.1:latest" }, { "name": "mistral:7b" } ]
      })))
      .mount(&server)
      .await;

    let transport = HttpTransport::new().unwrap();
    let models = list_local_models(&transport, &RetryPolicy::default(), &server.uri())
      .await
      .unwrap();
    assert_eq!(models, vec!["llama3.1:latest".to_string(), "mistral:7b".to_string()]);
}

#[tokio::test]
async fn content_type_header_is_always_sent()
{   init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(header_exists("content-type"))
      .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply("ok")))
      .expect(1)
      .mount(&server)
      .await;

    generator()
      .generate(&anthropic(&server), &GenerationRequest::new(context()))
      .await
      .unwrap();
}
