use std::{env, hint::black_box, sync::Arc, time::Duration};

use criterion::Criterion;
use tributary_buffer::BoundedBufferPool;
use tributary_channel::{ChannelContext, InputChannelBroker, InputChannelContext};
use tributary_core::{
    ChannelConfig, ChannelEvent, ChannelId, Envelope, JobId, PoolConfig,
    test_stubs::{
        channel::RecordingDispatcher,
        observability::NoopLogger,
    },
};

/// 通道热路径基准：池分配 -> 写入 -> 入队 -> 获取 -> 读取 -> 释放。
///
/// # 设计背景（Why）
/// - 队列锁是通道唯一的竞争点，入队、借出、读取与释放都会经过它；该基准用于检测加锁路径上的回归。
///
/// # 逻辑解析（How）
/// - 每轮从有界池取出 1 KiB 缓冲并写满，封装为信封入队，再由同一线程取出租约、读完并释放；
/// - 另一组用纯控制信封测量事件重放与自动剔除的成本。
fn bench_buffer_roundtrip(c: &mut Criterion) {
    let pool = Arc::new(
        BoundedBufferPool::new(PoolConfig {
            buffer_size: 1024,
            capacity: 4,
            shared: false,
            interrupt_poll_interval_ms: 1,
        })
        .expect("合法配置"),
    );
    let context = channel(pool.clone());
    let payload = [7u8; 1024];
    let mut sink = [0u8; 1024];
    let mut sequence = 0u64;

    c.bench_function("envelope_queue/buffer_roundtrip", |b| {
        b.iter(|| {
            sequence += 1;
            let mut buffer = pool
                .try_acquire(payload.len())
                .expect("池未关闭")
                .expect("每轮都会归还缓冲");
            buffer.put_slice(&payload).expect("容量内写入");
            context.queue_envelope(
                Envelope::new(sequence, JobId::from(1), ChannelId::from(1))
                    .with_buffer(buffer.into_boxed()),
            );
            let lease = context.fetch_next_buffer().expect("队首携带缓冲");
            black_box(lease.read(&mut sink));
            lease.release();
        });
    });
}

fn bench_event_only_elimination(c: &mut Criterion) {
    let pool = Arc::new(BoundedBufferPool::new(PoolConfig::default()).expect("合法配置"));
    let context = channel(pool);

    c.bench_function("envelope_queue/event_only", |b| {
        b.iter(|| {
            context.queue_envelope(
                Envelope::new(1, JobId::from(1), ChannelId::from(1))
                    .with_event(ChannelEvent::Close),
            );
            black_box(context.fetch_next_buffer().is_none())
        });
    });
}

fn channel(pool: Arc<BoundedBufferPool>) -> InputChannelContext {
    InputChannelContext::new(
        ChannelConfig {
            activate_upstream_on_create: false,
            report_unconsumed_bytes: true,
        },
        Arc::new(NullEndpoint),
        Arc::new(RecordingDispatcher::new()),
        pool,
        Arc::new(NoopLogger),
    )
}

/// 不记录任何回调的消费端，避免记录型桩的内存增长干扰测量。
struct NullEndpoint;

impl tributary_core::InputChannelEndpoint for NullEndpoint {
    fn on_event(&self, event: &ChannelEvent) {
        black_box(event);
    }

    fn on_data_may_be_available(&self) {}

    fn on_transport_error(&self, _error: &tributary_core::ChannelError) {}

    fn channel_id(&self) -> ChannelId {
        ChannelId::from(1)
    }

    fn connected_channel_id(&self) -> ChannelId {
        ChannelId::from(2)
    }

    fn job_id(&self) -> JobId {
        JobId::from(1)
    }
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_buffer_roundtrip(&mut criterion);
    bench_event_only_elimination(&mut criterion);
    criterion.final_summary();
}
