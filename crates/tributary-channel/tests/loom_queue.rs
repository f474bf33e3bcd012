#![cfg(loom)]

use loom::{model, sync::Arc, thread};
use tributary_channel::{EnvelopeQueue, PeekedHead};
use tributary_core::{
    ChannelEvent, ChannelId, Envelope, JobId,
    test_stubs::channel::{RecycleLedger, TrackedBuffer},
};

fn envelope(seq: u64) -> Envelope {
    Envelope::new(seq, JobId::from(1), ChannelId::from(1))
}

#[test]
fn concurrent_push_and_consume_recycle_each_buffer_once() {
    //
    // 教案级说明：两个生产者并发入队，主线程同时尝试借出并释放队首。
    // - **Why**：借出标记与出队必须和入队串行化，否则消费者可能释放一个从未借出的信封；
    // - **How**：Loom 穷举三方交错，最后排空队列回收剩余缓冲；
    // - **What**：每个缓冲恰好回收一次，队列最终为空。
    model(|| {
        let ledger = RecycleLedger::new();
        let queue = Arc::new(EnvelopeQueue::new());

        let producers: Vec<_> = (1..=2u64)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let ledger = ledger.clone();
                thread::spawn(move || {
                    queue.push(envelope(id).with_buffer(TrackedBuffer::boxed(&ledger, id, 4)));
                })
            })
            .collect();

        if let PeekedHead::Lent { .. } = queue.peek_or_drop_if_empty_payload() {
            let released = queue.release_head().expect("借出的队首必须可出队");
            released
                .into_parts()
                .0
                .expect("借出的信封携带缓冲")
                .recycle();
        }

        for producer in producers {
            producer.join().expect("生产者不应 panic");
        }
        for envelope in queue.drain_all() {
            if let (Some(buffer), _) = envelope.into_parts() {
                buffer.recycle();
            }
        }

        assert_eq!(ledger.times_recycled(1), 1);
        assert_eq!(ledger.times_recycled(2), 1);
        assert_eq!(ledger.leaked_count(), 0);
        assert!(queue.is_empty());
    });
}

#[test]
fn event_only_head_is_dropped_by_exactly_one_peeker() {
    //
    // 教案级说明：两个线程同时窥视同一个纯控制队首。
    // - **Why**：“窥视并按需丢弃”必须在一次加锁内完成，否则两个线程都会认为自己移除了它；
    // - **What**：恰好一个线程拿到 `Dropped`，另一个看到空队列。
    model(|| {
        let queue = Arc::new(EnvelopeQueue::new());
        queue.push(envelope(1).with_event(ChannelEvent::Activate));

        let peekers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    matches!(queue.peek_or_drop_if_empty_payload(), PeekedHead::Dropped(_))
                })
            })
            .collect();

        let dropped = peekers
            .into_iter()
            .map(|peeker| peeker.join().expect("窥视线程不应 panic"))
            .filter(|dropped| *dropped)
            .count();
        assert_eq!(dropped, 1);
        assert_eq!(queue.len(), 0);
    });
}
