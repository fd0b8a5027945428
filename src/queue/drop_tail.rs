//! DropTail（尾丢弃）队列
//!
//! 以 packet 个数计容量；缓冲已满时直接拒绝新到达的 packet。

use std::collections::VecDeque;

use crate::net::Packet;

use super::PacketQueue;

#[derive(Debug)]
pub struct DropTailQueue {
    max_pkts: u64,
    q: VecDeque<Packet>,
}

impl DropTailQueue {
    pub fn new(max_pkts: u64) -> Self {
        Self {
            max_pkts,
            q: VecDeque::new(),
        }
    }

    /// 调整容量；已缓冲的 packet 不受影响
    pub fn set_capacity(&mut self, max_pkts: u64) {
        self.max_pkts = max_pkts;
    }
}

impl PacketQueue for DropTailQueue {
    fn enqueue(&mut self, pkt: Packet) -> Result<(), Packet> {
        if self.is_full() {
            return Err(pkt);
        }
        self.q.push_back(pkt);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<Packet> {
        self.q.pop_front()
    }

    fn len(&self) -> usize {
        self.q.len()
    }

    fn capacity(&self) -> u64 {
        self.max_pkts
    }
}
