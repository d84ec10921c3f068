//! Collective steps that every worker must take together.
//!
//! Every cross-worker exchange made while building a hierarchy goes through
//! [`HierarchySynchronizer`]. A worker that owns nothing at a level still
//! calls the same collective and contributes the identity value (zero,
//! `false`, an empty payload); skipping the call would leave the others
//! blocked forever.
//!
//! Each collective walks `Entered → Contributed → Completed`:
//! - **Entered**: the epoch is bumped and recorded.
//! - **Contributed**: the worker's `(header, payload)` has been handed to the
//!   root (rank 0). The header carries the op kind and epoch.
//! - **Completed**: the root has heard from every worker, checked that all
//!   headers agree, and sent back either every contribution or an abort.
//!
//! A header mismatch means two workers are inside different collectives. The
//! root aborts the step for everyone, so each worker returns a
//! [`CoordinationFailure`] instead of proceeding on a divergent view.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{
    STATUS_ABORT, STATUS_OK, WireCount, WireHeader, cast_slice, decode_boxes, encode_boxes,
};
use crate::geometry::IndexBox;
use crate::hierarchy_error::CoordinationFailure;
use std::fmt;
use std::mem::size_of;

/// Base tag for hierarchy collectives; `+0` carries worker→root traffic,
/// `+1` root→worker.
pub const HIERARCHY_TAG: CommTag = CommTag::new(0xA3C0);

const ROOT: usize = 0;

/// Kind of collective step; must match across workers at each epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CollectiveOp {
    /// "Does any worker request a finer level?"
    AnyBoxes = 1,
    /// Sum of locally owned patches on a level.
    PatchCount = 2,
    /// Every worker's view of a level's boxes.
    BoxDigest = 3,
    /// Tagged cells of every owned patch.
    GatherTags = 4,
    /// End of a level.
    LevelComplete = 5,
    /// Explicit user barrier.
    Barrier = 6,
    /// Generic reduction.
    Reduce = 7,
    /// Data sent from the root to everyone.
    Broadcast = 8,
}

impl CollectiveOp {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        use CollectiveOp::*;
        [
            AnyBoxes,
            PatchCount,
            BoxDigest,
            GatherTags,
            LevelComplete,
            Barrier,
            Reduce,
            Broadcast,
        ]
        .into_iter()
        .find(|op| op.code() == code)
    }
}

impl fmt::Display for CollectiveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn op_name(code: u16) -> String {
    CollectiveOp::from_code(code).map_or_else(|| format!("op#{code}"), |op| op.to_string())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollectivePhase {
    Entered,
    Contributed,
    Completed,
    Aborted,
}

/// One collective step as seen by this worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectiveRecord {
    pub epoch: u64,
    pub op: CollectiveOp,
    pub phase: CollectivePhase,
    /// Bytes this worker contributed.
    pub contributed: usize,
}

pub struct HierarchySynchronizer<'c, C: Communicator> {
    comm: &'c C,
    tag: CommTag,
    epoch: u64,
    log: Vec<CollectiveRecord>,
}

impl<'c, C: Communicator> HierarchySynchronizer<'c, C> {
    pub fn new(comm: &'c C) -> Self {
        Self::with_tag(comm, HIERARCHY_TAG)
    }

    pub fn with_tag(comm: &'c C, tag: CommTag) -> Self {
        Self {
            comm,
            tag,
            epoch: 0,
            log: Vec::new(),
        }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Number of collectives entered so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn log(&self) -> &[CollectiveRecord] {
        &self.log
    }

    /// True when every entered collective reached `Completed`.
    pub fn all_completed(&self) -> bool {
        self.log
            .iter()
            .all(|r| r.phase == CollectivePhase::Completed)
    }

    fn set_phase(&mut self, phase: CollectivePhase) {
        if let Some(rec) = self.log.last_mut() {
            debug_assert!(
                matches!(
                    (rec.phase, phase),
                    (CollectivePhase::Entered, CollectivePhase::Contributed)
                        | (CollectivePhase::Contributed, CollectivePhase::Completed)
                        | (CollectivePhase::Contributed, CollectivePhase::Aborted)
                ),
                "illegal collective transition {:?} -> {:?}",
                rec.phase,
                phase
            );
            rec.phase = phase;
        }
    }

    /// Core step: every worker contributes `payload`; everyone receives all
    /// contributions ordered by rank.
    pub fn all_gather(
        &mut self,
        op: CollectiveOp,
        payload: &[u8],
    ) -> Result<Vec<Vec<u8>>, CoordinationFailure> {
        self.epoch += 1;
        let epoch = self.epoch;
        self.log.push(CollectiveRecord {
            epoch,
            op,
            phase: CollectivePhase::Entered,
            contributed: payload.len(),
        });
        log::debug!(
            "[rank {}] collective {op} epoch {epoch}: {} bytes",
            self.rank(),
            payload.len()
        );

        let result = if self.size() == 1 {
            self.set_phase(CollectivePhase::Contributed);
            Ok(vec![payload.to_vec()])
        } else if self.rank() == ROOT {
            self.set_phase(CollectivePhase::Contributed);
            self.gather_at_root(op, epoch, payload)
        } else {
            self.send_to_root(op, epoch, payload);
            self.set_phase(CollectivePhase::Contributed);
            self.receive_from_root(op, epoch)
        };

        match &result {
            Ok(_) => self.set_phase(CollectivePhase::Completed),
            Err(e) => {
                log::warn!("[rank {}] collective {op} epoch {epoch} failed: {e}", self.rank());
                self.set_phase(CollectivePhase::Aborted);
            }
        }
        result
    }

    fn send_to_root(&self, op: CollectiveOp, epoch: u64, payload: &[u8]) {
        let hdr = WireHeader::new(op.code(), epoch, payload.len(), STATUS_OK);
        let up = self.tag.as_u16();
        let s1 = self.comm.isend(ROOT, up, cast_slice(std::slice::from_ref(&hdr)));
        let s2 = self.comm.isend(ROOT, up, payload);
        Self::complete_sends([s1, s2]);
    }

    /// Block until every send has left this worker. Send handles never carry
    /// data back.
    fn complete_sends(sends: impl IntoIterator<Item = C::SendHandle>) {
        for send in sends {
            let echoed = send.wait();
            debug_assert!(echoed.is_none(), "send handle returned data");
        }
    }

    fn recv_exact(&self, peer: usize, tag: u16, len: usize) -> Result<Vec<u8>, CoordinationFailure> {
        let mut buf = vec![0u8; len];
        let data = self
            .comm
            .irecv(peer, tag, &mut buf)
            .wait()
            .ok_or_else(|| CoordinationFailure::Transport {
                peer,
                reason: format!("no message on tag {tag:#x}"),
            })?;
        if data.len() != len {
            return Err(CoordinationFailure::MalformedMessage {
                peer,
                reason: format!("expected {len} bytes, got {}", data.len()),
            });
        }
        Ok(data)
    }

    fn recv_header(&self, peer: usize, tag: u16) -> Result<WireHeader, CoordinationFailure> {
        let bytes = self.recv_exact(peer, tag, size_of::<WireHeader>())?;
        WireHeader::decode(&bytes)
            .map_err(|reason| CoordinationFailure::MalformedMessage { peer, reason })
    }

    fn gather_at_root(
        &self,
        op: CollectiveOp,
        epoch: u64,
        payload: &[u8],
    ) -> Result<Vec<Vec<u8>>, CoordinationFailure> {
        let up = self.tag.as_u16();
        let mut parts = vec![payload.to_vec()];
        let mut failure = None;
        // Hear from every worker before deciding, so nobody is left with an
        // unread message in its channel.
        for peer in 1..self.size() {
            let hdr = match self.recv_header(peer, up) {
                Ok(h) => h,
                Err(e) => {
                    failure.get_or_insert(e);
                    parts.push(Vec::new());
                    continue;
                }
            };
            let body = match self.recv_exact(peer, up, hdr.len()) {
                Ok(b) => b,
                Err(e) => {
                    failure.get_or_insert(e);
                    Vec::new()
                }
            };
            if hdr.op() != op.code() || hdr.epoch() != epoch {
                failure.get_or_insert(CoordinationFailure::MismatchedCollective {
                    rank: peer,
                    expected_op: op.to_string(),
                    expected_epoch: epoch,
                    found_op: op_name(hdr.op()),
                    found_epoch: hdr.epoch(),
                });
            }
            parts.push(body);
        }

        let down = self.tag.offset(1).as_u16();
        match failure {
            Some(err) => {
                let hdr = WireHeader::new(op.code(), epoch, 0, STATUS_ABORT);
                Self::complete_sends((1..self.size()).map(|peer| {
                    self.comm
                        .isend(peer, down, cast_slice(std::slice::from_ref(&hdr)))
                }));
                Err(err)
            }
            None => {
                let packed = pack(&parts);
                let hdr = WireHeader::new(op.code(), epoch, packed.len(), STATUS_OK);
                for peer in 1..self.size() {
                    let s1 = self
                        .comm
                        .isend(peer, down, cast_slice(std::slice::from_ref(&hdr)));
                    let s2 = self.comm.isend(peer, down, &packed);
                    Self::complete_sends([s1, s2]);
                }
                Ok(parts)
            }
        }
    }

    fn receive_from_root(
        &self,
        op: CollectiveOp,
        epoch: u64,
    ) -> Result<Vec<Vec<u8>>, CoordinationFailure> {
        let down = self.tag.offset(1).as_u16();
        let hdr = self.recv_header(ROOT, down)?;
        if hdr.status() == STATUS_ABORT {
            return Err(CoordinationFailure::Aborted {
                op: op.to_string(),
                epoch,
            });
        }
        if hdr.op() != op.code() || hdr.epoch() != epoch {
            return Err(CoordinationFailure::MismatchedCollective {
                rank: self.rank(),
                expected_op: op.to_string(),
                expected_epoch: epoch,
                found_op: op_name(hdr.op()),
                found_epoch: hdr.epoch(),
            });
        }
        let packed = self.recv_exact(ROOT, down, hdr.len())?;
        let parts = unpack(&packed)
            .map_err(|reason| CoordinationFailure::MalformedMessage { peer: ROOT, reason })?;
        if parts.len() != self.size() {
            return Err(CoordinationFailure::MalformedMessage {
                peer: ROOT,
                reason: format!("{} contributions for {} workers", parts.len(), self.size()),
            });
        }
        Ok(parts)
    }

    pub fn all_reduce_sum(&mut self, op: CollectiveOp, local: u64) -> Result<u64, CoordinationFailure> {
        let parts = self.all_gather(op, &local.to_le_bytes())?;
        parts.iter().enumerate().try_fold(0u64, |acc, (rank, p)| {
            Ok(acc.wrapping_add(decode_u64(rank, p)?))
        })
    }

    pub fn all_reduce_max(&mut self, op: CollectiveOp, local: u64) -> Result<u64, CoordinationFailure> {
        let parts = self.all_gather(op, &local.to_le_bytes())?;
        parts.iter().enumerate().try_fold(0u64, |acc, (rank, p)| {
            Ok(acc.max(decode_u64(rank, p)?))
        })
    }

    /// Logical OR across workers.
    pub fn any(&mut self, op: CollectiveOp, local: bool) -> Result<bool, CoordinationFailure> {
        Ok(self.all_reduce_max(op, u64::from(local))? != 0)
    }

    pub fn barrier(&mut self, op: CollectiveOp) -> Result<(), CoordinationFailure> {
        self.all_gather(op, &[]).map(|_| ())
    }

    /// Everyone receives the root's `payload`; other workers' payloads are
    /// ignored (they still take part in the step).
    pub fn broadcast_from_root(
        &mut self,
        op: CollectiveOp,
        payload: &[u8],
    ) -> Result<Vec<u8>, CoordinationFailure> {
        let contribution = if self.rank() == ROOT { payload } else { &[] };
        let mut parts = self.all_gather(op, contribution)?;
        Ok(parts.swap_remove(ROOT))
    }

    /// Check that every worker derived the same boxes for `level`.
    ///
    /// Every worker sees every view, so all of them reach the same verdict.
    pub fn agree_on_boxes(
        &mut self,
        level: usize,
        boxes: &[IndexBox],
    ) -> Result<(), CoordinationFailure> {
        let parts = self.all_gather(CollectiveOp::BoxDigest, &encode_boxes(boxes))?;
        let reference = &parts[ROOT];
        for (rank, part) in parts.iter().enumerate().skip(1) {
            if part != reference {
                let reason = decode_boxes(part).err();
                if let Some(reason) = reason {
                    return Err(CoordinationFailure::MalformedMessage { peer: rank, reason });
                }
                return Err(CoordinationFailure::DivergentBoxes { level, rank });
            }
        }
        Ok(())
    }
}

fn decode_u64(peer: usize, bytes: &[u8]) -> Result<u64, CoordinationFailure> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| CoordinationFailure::MalformedMessage {
            peer,
            reason: format!("expected 8 bytes, got {}", bytes.len()),
        })?;
    Ok(u64::from_le_bytes(arr))
}

/// `[count][len₀][bytes₀][len₁][bytes₁]…`
fn pack(parts: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = parts.iter().map(|p| p.len() + size_of::<WireCount>()).sum();
    let mut out = Vec::with_capacity(total + size_of::<WireCount>());
    out.extend_from_slice(cast_slice(&[WireCount::new(parts.len() as u64)]));
    for p in parts {
        out.extend_from_slice(cast_slice(&[WireCount::new(p.len() as u64)]));
        out.extend_from_slice(p);
    }
    out
}

fn unpack(bytes: &[u8]) -> Result<Vec<Vec<u8>>, String> {
    let word = size_of::<WireCount>();
    let read_count = |at: usize| -> Result<usize, String> {
        let chunk = bytes
            .get(at..at + word)
            .ok_or_else(|| format!("truncated length prefix at byte {at}"))?;
        Ok(bytemuck::pod_read_unaligned::<WireCount>(chunk).get() as usize)
    };
    let n = read_count(0)?;
    let mut at = word;
    let mut parts = Vec::with_capacity(n);
    for _ in 0..n {
        let len = read_count(at)?;
        at += word;
        let body = bytes
            .get(at..at + len)
            .ok_or_else(|| format!("truncated payload at byte {at}"))?;
        parts.push(body.to_vec());
        at += len;
    }
    if at != bytes.len() {
        return Err(format!("{} trailing bytes", bytes.len() - at));
    }
    Ok(parts)
}
