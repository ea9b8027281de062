//! In-process transport: one thread per worker, one channel per ordered pair.
//!
//! Sends are buffered and never block; receives block until the peer's
//! message arrives. Messages between a given pair of workers are delivered
//! in the order they were sent, which is what lets a lockstep protocol match
//! sends to receives without a mailbox search.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::backend::{Tag, Transport, TransportError, TransportInfo, TransportKind};

/// Tag reserved for the max all-reduce.
pub const REDUCE_TAG: Tag = Tag::MAX;

struct Envelope {
    tag: Tag,
    payload: Vec<f64>,
}

/// One worker's end of a fully connected in-process group.
///
/// Create a whole group with [`LocalTransport::group`] and move each element
/// into its worker thread. Dropping a transport disconnects it from its
/// peers, so a worker that exits early surfaces as
/// [`TransportError::Disconnected`] instead of a hang.
pub struct LocalTransport {
    rank: usize,
    size: usize,
    /// Indexed by destination rank; `None` at our own rank.
    outboxes: Vec<Option<Sender<Envelope>>>,
    /// Indexed by source rank; `None` at our own rank.
    inboxes: Vec<Option<Receiver<Envelope>>>,
}

impl LocalTransport {
    /// Build a group of `size` connected transports, ordered by rank.
    pub fn group(size: usize) -> Vec<LocalTransport> {
        let mut outboxes: Vec<Vec<Option<Sender<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = unbounded();
                outboxes[src][dst] = Some(tx);
                inboxes[dst][src] = Some(rx);
            }
        }

        log::debug!("Created local transport group of {} workers", size);
        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalTransport {
                rank,
                size,
                outboxes,
                inboxes,
            })
            .collect()
    }

    fn outbox(&self, dest: usize) -> Result<&Sender<Envelope>, TransportError> {
        self.outboxes
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or(TransportError::InvalidRank {
                rank: dest,
                size: self.size,
            })
    }

    fn inbox(&self, source: usize) -> Result<&Receiver<Envelope>, TransportError> {
        self.inboxes
            .get(source)
            .and_then(Option::as_ref)
            .ok_or(TransportError::InvalidRank {
                rank: source,
                size: self.size,
            })
    }

    fn next_envelope(&self, source: usize, tag: Tag) -> Result<Envelope, TransportError> {
        let envelope = self
            .inbox(source)?
            .recv()
            .map_err(|_| TransportError::Disconnected { peer: source })?;
        if envelope.tag != tag {
            return Err(TransportError::TagMismatch {
                peer: source,
                expected: tag,
                found: envelope.tag,
            });
        }
        Ok(envelope)
    }
}

impl Transport for LocalTransport {
    fn info(&self) -> TransportInfo {
        TransportInfo {
            name: format!("local ({} worker threads)", self.size),
            kind: TransportKind::Local,
            rank: self.rank,
            size: self.size,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<(), TransportError> {
        self.outbox(dest)?
            .send(Envelope {
                tag,
                payload: data.to_vec(),
            })
            .map_err(|_| TransportError::Disconnected { peer: dest })
    }

    fn receive(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<(), TransportError> {
        let envelope = self.next_envelope(source, tag)?;
        if envelope.payload.len() != buf.len() {
            return Err(TransportError::LengthMismatch {
                peer: source,
                expected: buf.len(),
                found: envelope.payload.len(),
            });
        }
        buf.copy_from_slice(&envelope.payload);
        Ok(())
    }

    fn all_reduce_max(&self, value: f64) -> Result<f64, TransportError> {
        // Gather-to-all: per-pair FIFO ordering keeps successive reductions
        // from mixing even when a worker runs one collective ahead.
        for peer in (0..self.size).filter(|&p| p != self.rank) {
            self.send(peer, REDUCE_TAG, &[value])?;
        }

        let mut result = value;
        let mut incoming = [0.0];
        for peer in (0..self.size).filter(|&p| p != self.rank) {
            self.receive(peer, REDUCE_TAG, &mut incoming)?;
            result = result.max(incoming[0]);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_group_ranks_and_size() {
        let group = LocalTransport::group(3);
        assert_eq!(group.len(), 3);
        for (i, t) in group.iter().enumerate() {
            assert_eq!(t.rank(), i);
            assert_eq!(t.size(), 3);
            assert_eq!(t.info().kind, TransportKind::Local);
        }
    }

    #[test]
    fn test_single_worker_all_reduce_is_identity() {
        let group = LocalTransport::group(1);
        assert_eq!(group[0].all_reduce_max(4.5).unwrap(), 4.5);
    }

    #[test]
    fn test_point_to_point_preserves_order() {
        let mut group = LocalTransport::group(2);
        let b = group.pop().unwrap();
        let a = group.pop().unwrap();

        a.send(1, 7, &[1.0, 2.0]).unwrap();
        a.send(1, 8, &[3.0, 4.0]).unwrap();

        let mut buf = [0.0; 2];
        b.receive(0, 7, &mut buf).unwrap();
        assert_eq!(buf, [1.0, 2.0]);
        b.receive(0, 8, &mut buf).unwrap();
        assert_eq!(buf, [3.0, 4.0]);
    }

    #[test]
    fn test_tag_mismatch_is_reported() {
        let mut group = LocalTransport::group(2);
        let b = group.pop().unwrap();
        let a = group.pop().unwrap();

        a.send(1, 0, &[1.0]).unwrap();
        let mut buf = [0.0];
        match b.receive(0, 1, &mut buf) {
            Err(TransportError::TagMismatch { peer, expected, found }) => {
                assert_eq!((peer, expected, found), (0, 1, 0));
            }
            other => panic!("expected tag mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_short_payload_is_reported() {
        let mut group = LocalTransport::group(2);
        let b = group.pop().unwrap();
        let a = group.pop().unwrap();

        a.send(1, 0, &[1.0, 2.0]).unwrap();
        let mut buf = [0.0; 3];
        assert!(matches!(
            b.receive(0, 0, &mut buf),
            Err(TransportError::LengthMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_send_to_self_is_invalid() {
        let group = LocalTransport::group(2);
        assert!(matches!(
            group[0].send(0, 0, &[1.0]),
            Err(TransportError::InvalidRank { rank: 0, size: 2 })
        ));
        assert!(matches!(
            group[0].send(5, 0, &[1.0]),
            Err(TransportError::InvalidRank { rank: 5, size: 2 })
        ));
    }

    #[test]
    fn test_dropped_peer_disconnects() {
        let mut group = LocalTransport::group(2);
        let b = group.pop().unwrap();
        drop(group);

        let mut buf = [0.0];
        assert!(matches!(
            b.receive(0, 0, &mut buf),
            Err(TransportError::Disconnected { peer: 0 })
        ));
    }

    #[test]
    fn test_all_reduce_max_agrees_across_workers() {
        let group = LocalTransport::group(4);
        let results: Vec<f64> = thread::scope(|s| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|t| {
                    s.spawn(move || {
                        let local = [0.5, 3.25, -1.0, 2.0][t.rank()];
                        let first = t.all_reduce_max(local).unwrap();
                        // A second round must not see values from the first.
                        let second = t.all_reduce_max(-local).unwrap();
                        first + second
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for r in results {
            assert_eq!(r, 3.25 + 1.0);
        }
    }
}
