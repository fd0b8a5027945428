//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。
//!
//! 所有"处理中"的状态都表示为逻辑时钟上的待触发事件，
//! 暂停即冻结时钟，取消即清空事件队列。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Debug, Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    paused: bool,
    q: BinaryHeap<ScheduledEvent>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件数
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// 待执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// 冻结时钟：暂停期间 `run`/`run_until` 不执行任何事件，也不推进时间。
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// 丢弃所有待执行事件（关卡结束/重置时使用）。
    pub fn cancel_all(&mut self) {
        let dropped = self.q.len();
        self.q.clear();
        debug!(dropped, now = ?self.now, "🧹 取消全部待执行事件");
    }

    /// 调度事件在指定时间执行
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        // 不允许调度到过去
        let at = at.max(self.now);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });

        trace!(queue_size = self.q.len(), "事件已加入队列");
    }

    /// 在当前时间之后 `delay` 调度事件
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev);
    }

    /// 运行直到事件队列为空或到达 `until`。暂停时直接返回。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        if self.paused {
            debug!(now = ?self.now, "⏸️  仿真已暂停，忽略 run_until");
            return;
        }
        while self.q.peek().is_some_and(|top| top.at <= until) {
            let Some(item) = self.q.pop() else {
                break;
            };
            self.step(item, world);
            if self.paused {
                // 事件内部请求暂停：时钟停在当前事件时刻
                return;
            }
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        let start = self.executed;
        while !self.paused {
            let Some(item) = self.q.pop() else {
                break;
            };
            self.step(item, world);
        }

        info!(
            total_events = self.executed - start,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }

    fn step(&mut self, item: ScheduledEvent, world: &mut dyn World) {
        self.executed += 1;
        self.now = item.at;
        trace!(
            event_num = self.executed,
            now = ?self.now,
            seq = item.seq,
            event = item.ev.name(),
            remaining_queue = self.q.len(),
            "执行事件"
        );
        item.ev.execute(self, world);
        world.on_tick(self);
    }
}
