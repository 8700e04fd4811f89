//! ByteRingQueue のプロパティテスト
//!
//! 任意の append / read / peek / prepend 列について `VecDeque` をモデルとして比較する。

use std::collections::VecDeque;

use proptest::prelude::*;
use secpump_queue::ByteRingQueue;

#[derive(Debug, Clone)]
enum Op {
    Append(Vec<u8>),
    Read(usize),
    Peek(usize, usize),
    Prepend(Vec<u8>),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => proptest::collection::vec(any::<u8>(), 0..64).prop_map(Op::Append),
        3 => (0usize..80).prop_map(Op::Read),
        1 => (0usize..40, 0usize..40).prop_map(|(o, c)| Op::Peek(o, c)),
        2 => proptest::collection::vec(any::<u8>(), 0..24).prop_map(Op::Prepend),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn prop_matches_deque_model(
        initial_capacity in 1usize..32,
        ops in proptest::collection::vec(op_strategy(), 0..64),
    ) {
        let mut q = ByteRingQueue::with_capacity(initial_capacity);
        let mut model: VecDeque<u8> = VecDeque::new();
        let mut last_capacity = q.capacity();

        for op in ops {
            match op {
                Op::Append(bytes) => {
                    q.append(&bytes);
                    model.extend(bytes.iter().copied());
                }
                Op::Read(n) => {
                    let got = q.read(n);
                    let take = n.min(model.len());
                    let expected: Vec<u8> = model.drain(..take).collect();
                    prop_assert_eq!(got, expected);
                }
                Op::Peek(offset, count) => {
                    let got = q.peek(offset, count);
                    let expected: Vec<u8> =
                        model.iter().skip(offset).take(count).copied().collect();
                    prop_assert_eq!(got, expected);
                }
                Op::Prepend(bytes) => {
                    q.prepend(&bytes);
                    for &b in bytes.iter().rev() {
                        model.push_front(b);
                    }
                }
                Op::Clear => {
                    q.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(q.pending_count(), model.len());
            prop_assert_eq!(
                q.pending_count() as u64,
                q.total_appended() - q.total_read()
            );
            // 容量は減らない
            prop_assert!(q.capacity() >= last_capacity);
            prop_assert!(q.capacity() >= q.pending_count());
            last_capacity = q.capacity();
        }

        let rest = q.read(usize::MAX);
        let expected: Vec<u8> = model.into_iter().collect();
        prop_assert_eq!(rest, expected);
    }

    #[test]
    fn prop_chunked_reads_concatenate(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        chunk in 1usize..50,
    ) {
        let mut q = ByteRingQueue::with_capacity(4);
        q.append(&data);

        let mut out = Vec::new();
        loop {
            let part = q.read(chunk);
            if part.is_empty() {
                break;
            }
            prop_assert!(part.len() <= chunk);
            out.extend_from_slice(&part);
        }
        prop_assert_eq!(out, data);
    }
}
