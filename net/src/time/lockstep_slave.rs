use std::any::Any;

use log::warn;

use tern_host::TimeController;
use tern_shared::{
    DataReader, DataSample, DataWriter, FrameAck, FrameOrder, GlobalTime, NodeId, Payload,
    TimeMode,
};

/// Deterministic lockstep slave: executes exactly one frame per
/// next-in-sequence `FrameOrder` and acknowledges it. Out-of-order orders
/// are stashed; a missing order stalls the slave, which is the point of
/// lockstep.
pub struct DeterministicSlaveController {
    node_id: NodeId,
    reader: Box<dyn DataReader>,
    writer: Box<dyn DataWriter>,
    state: GlobalTime,
    next_frame_id: u64,
    stash: Vec<FrameOrder>,
    stalled_since_log: bool,
}

impl DeterministicSlaveController {
    pub fn new(
        node_id: NodeId,
        reader: Box<dyn DataReader>,
        writer: Box<dyn DataWriter>,
    ) -> Self {
        Self {
            node_id,
            reader,
            writer,
            state: GlobalTime::zero(),
            next_frame_id: 1,
            stash: Vec::new(),
            stalled_since_log: false,
        }
    }

    pub fn stashed_orders(&self) -> usize {
        self.stash.len()
    }

    fn collect_orders(&mut self) {
        for sample in self.reader.take_samples() {
            let Payload::Order(order) = sample.payload else {
                continue;
            };
            if order.frame_id < self.next_frame_id {
                // Already executed; duplicate delivery.
                continue;
            }
            if self.stash.iter().any(|stashed| stashed.frame_id == order.frame_id) {
                continue;
            }
            self.stash.push(order);
        }
    }
}

impl TimeController for DeterministicSlaveController {
    fn advance(&mut self, _raw_delta: f32) -> Option<GlobalTime> {
        self.collect_orders();

        let position = self
            .stash
            .iter()
            .position(|order| order.frame_id == self.next_frame_id);
        let Some(position) = position else {
            if !self.stash.is_empty() && !self.stalled_since_log {
                warn!(
                    "lockstep stalled: holding {} future orders while frame {} is missing",
                    self.stash.len(),
                    self.next_frame_id
                );
                self.stalled_since_log = true;
            }
            return None;
        };
        let order = self.stash.swap_remove(position);
        self.stalled_since_log = false;
        self.next_frame_id += 1;

        let delta = order.fixed_delta;
        self.state.frame = order.frame_id;
        self.state.delta = delta;
        self.state.total += delta as f64;
        self.state.scale = 1.0;
        self.state.unscaled_delta = delta;
        self.state.unscaled_total += delta as f64;

        let ack = FrameAck {
            frame_id: order.frame_id,
            node_id: self.node_id,
        };
        if let Err(error) = self.writer.write(DataSample::alive(Payload::Ack(ack))) {
            warn!("frame ack {} dropped by transport: {}", order.frame_id, error);
        }

        Some(self.state)
    }

    fn set_time_scale(&mut self, _scale: f32) {
        warn!("time scale has no meaning in deterministic lockstep; ignoring");
    }

    fn time_scale(&self) -> f32 {
        1.0
    }

    fn mode(&self) -> TimeMode {
        TimeMode::Deterministic
    }

    fn current_state(&self) -> GlobalTime {
        self.state
    }

    fn seed_state(&mut self, state: GlobalTime) {
        self.state = state;
        self.next_frame_id = state.frame + 1;
        self.stash.clear();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod lockstep_slave_tests {
    use super::*;
    use tern_shared::{memory_channel, MemoryWriter};

    fn order(writer: &mut MemoryWriter, frame_id: u64, seq: u16) {
        writer
            .write(DataSample::alive(Payload::Order(FrameOrder {
                frame_id,
                fixed_delta: 0.5,
                seq,
            })))
            .unwrap();
    }

    #[test]
    fn executes_orders_in_frame_order() {
        let (mut order_writer, order_reader) = memory_channel();
        let (ack_writer, mut ack_reader) = memory_channel();
        let mut slave =
            DeterministicSlaveController::new(2, Box::new(order_reader), Box::new(ack_writer));

        order(&mut order_writer, 1, 1);
        order(&mut order_writer, 2, 2);

        assert_eq!(slave.advance(0.0).unwrap().frame, 1);
        assert_eq!(slave.advance(0.0).unwrap().frame, 2);
        assert!(slave.advance(0.0).is_none());

        let acks: Vec<u64> = ack_reader
            .take_samples()
            .into_iter()
            .filter_map(|sample| match sample.payload {
                Payload::Ack(ack) => Some(ack.frame_id),
                _ => None,
            })
            .collect();
        assert_eq!(acks, vec![1, 2]);
    }

    #[test]
    fn out_of_order_orders_are_stashed_until_the_gap_fills() {
        let (mut order_writer, order_reader) = memory_channel();
        let (ack_writer, _ack_reader) = memory_channel();
        let mut slave =
            DeterministicSlaveController::new(2, Box::new(order_reader), Box::new(ack_writer));

        order(&mut order_writer, 2, 2);
        assert!(slave.advance(0.0).is_none());
        assert_eq!(slave.stashed_orders(), 1);

        order(&mut order_writer, 1, 1);
        assert_eq!(slave.advance(0.0).unwrap().frame, 1);
        assert_eq!(slave.advance(0.0).unwrap().frame, 2);
    }

    #[test]
    fn duplicate_orders_execute_once() {
        let (mut order_writer, order_reader) = memory_channel();
        let (ack_writer, mut ack_reader) = memory_channel();
        let mut slave =
            DeterministicSlaveController::new(2, Box::new(order_reader), Box::new(ack_writer));

        order(&mut order_writer, 1, 1);
        order(&mut order_writer, 1, 1);
        assert_eq!(slave.advance(0.0).unwrap().frame, 1);
        order(&mut order_writer, 1, 1);
        assert!(slave.advance(0.0).is_none());
        assert_eq!(ack_reader.take_samples().len(), 1);
    }

    #[test]
    fn fixed_delta_accumulates_into_total() {
        let (mut order_writer, order_reader) = memory_channel();
        let (ack_writer, _ack_reader) = memory_channel();
        let mut slave =
            DeterministicSlaveController::new(2, Box::new(order_reader), Box::new(ack_writer));

        order(&mut order_writer, 1, 1);
        order(&mut order_writer, 2, 2);
        slave.advance(0.0);
        let time = slave.advance(0.0).unwrap();
        assert!((time.total - 1.0).abs() < 1e-6);
    }
}
