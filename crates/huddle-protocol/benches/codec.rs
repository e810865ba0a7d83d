//! Codec benchmarks for huddle-protocol.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use huddle_protocol::{codec, Frame};

fn chat_body(len: usize) -> Vec<u8> {
    let text = "가".repeat(len / 3);
    format!(r#"{{"nickname":"relay","message":"{text}","characterId":3,"timestamp":1700000000000}}"#)
        .into_bytes()
}

fn bench_encode_send(c: &mut Criterion) {
    let body = chat_body(96);
    let frame = Frame::send("/app/chat", body.clone());

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("send_chat", |b| b.iter(|| codec::encode(black_box(&frame))));
    group.finish();
}

fn bench_decode_message(c: &mut Criterion) {
    let frame = Frame::message("/topic/chat", "sub-0", "m-1", chat_body(96));
    let encoded = codec::encode(&frame).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("message_chat", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_decode_batch(c: &mut Criterion) {
    let mut batch = BytesMut::new();
    for i in 0..32 {
        let frame = Frame::message("/topic/chat", "sub-0", format!("m-{i}"), chat_body(64));
        codec::encode_into(&frame, &mut batch).unwrap();
        batch.extend_from_slice(b"\n");
    }

    c.bench_function("decode_batch_32", |b| {
        b.iter(|| {
            let mut buf = batch.clone();
            let mut count = 0;
            while let Some(frame) = codec::decode_from(&mut buf).unwrap() {
                black_box(frame);
                count += 1;
            }
            count
        })
    });
}

criterion_group!(
    benches,
    bench_encode_send,
    bench_decode_message,
    bench_decode_batch
);
criterion_main!(benches);
