//! Relay hot-path benchmarks: prompt estimation and request conversion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relaygate::config::ChannelConfig;
use relaygate::models::openai::*;
use relaygate::providers::{anthropic, gemini};
use relaygate::services::meta::{ChannelType, RelayMeta, RelayMode, TokenContext};
use relaygate::services::usage::{TiktokenCounter, UsageEstimator};
use std::collections::HashMap;
use std::sync::Arc;

fn create_meta(channel_type: ChannelType) -> RelayMeta {
    let channel = ChannelConfig {
        id: 1,
        channel_type,
        base_url: String::new(),
        api_key: "bench".to_string(),
        model_mapping: HashMap::new(),
        config: None,
    };
    let token = TokenContext { token_id: "bench".to_string(), group: "default".to_string() };
    let mut meta = RelayMeta::new(&channel, &token, RelayMode::ChatCompletions);
    meta.actual_model = "gpt-4o".to_string();
    meta
}

/// Chat request with `count` alternating user/assistant turns
fn create_chat_request(count: usize) -> TextRequest {
    let mut messages = vec![OpenAIMessage {
        role: "system".to_string(),
        content: Some(OpenAIContent::Text("You are a helpful assistant.".to_string())),
        ..Default::default()
    }];
    for i in 0..count {
        let role = if i % 2 == 0 { "user" } else { "assistant" };
        messages.push(OpenAIMessage {
            role: role.to_string(),
            content: Some(OpenAIContent::Text(format!(
                "Message {} talks about the weather in several cities and asks follow-up questions.",
                i
            ))),
            ..Default::default()
        });
    }

    TextRequest {
        model: "gpt-4o".to_string(),
        messages,
        max_tokens: Some(512),
        temperature: Some(0.7),
        ..Default::default()
    }
}

fn bench_prompt_estimation(c: &mut Criterion) {
    TiktokenCounter::preload();
    let estimator = UsageEstimator::new(Arc::new(TiktokenCounter::new()));

    let mut group = c.benchmark_group("prompt_estimation");
    for count in [1usize, 10, 50].iter() {
        let request = create_chat_request(*count);
        group.bench_with_input(BenchmarkId::new("chat", count), count, |b, _| {
            b.iter(|| black_box(estimator.estimate_prompt_tokens(black_box(&request), RelayMode::ChatCompletions)))
        });
    }
    group.finish();
}

fn bench_request_conversion(c: &mut Criterion) {
    let request = create_chat_request(10);
    let anthropic_meta = create_meta(ChannelType::Anthropic);
    let gemini_meta = create_meta(ChannelType::Gemini);

    let mut group = c.benchmark_group("request_conversion");
    group.bench_function("anthropic", |b| {
        b.iter(|| black_box(anthropic::convert_chat_request(black_box(&request), &anthropic_meta)))
    });
    group.bench_function("gemini", |b| {
        b.iter(|| black_box(gemini::convert_chat_request(black_box(&request), &gemini_meta)))
    });
    group.bench_function("native_reserialize", |b| {
        b.iter(|| black_box(serde_json::to_vec(black_box(&request))))
    });
    group.finish();
}

fn bench_request_parsing(c: &mut Criterion) {
    let raw = serde_json::to_vec(&create_chat_request(10)).unwrap_or_default();

    c.bench_function("text_request_parse", |b| {
        b.iter(|| black_box(serde_json::from_slice::<TextRequest>(black_box(&raw))))
    });
}

criterion_group!(benches, bench_prompt_estimation, bench_request_conversion, bench_request_parsing);
criterion_main!(benches);
