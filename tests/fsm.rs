use acesim_lite::axi::fsm::*;
use acesim_lite::axi::pending::{PendingAddress, PendingQueue};
use acesim_lite::axi::signals::AwSignals;
use acesim_lite::axi::{AxiAttributes, BridgeError, Command, SharedTxn, Transaction};

fn txn(cmd: Command) -> SharedTxn {
    SharedTxn::new(Transaction::new(cmd, 0x100, AxiAttributes::default()))
}

fn walk(cmd: Command, tps: &[TimePoint]) -> Option<FsmState> {
    tps.iter().try_fold(FsmState::Created, |state, &tp| state.advance(tp, cmd))
}

#[test]
fn write_sequence_with_partial_requests() {
    use TimePoint::*;
    let seq = [
        RequestPhaseBeg,
        BegPartReq,
        EndPartReq,
        BegPartReq,
        EndPartReq,
        BegReq,
        EndReq,
        BegResp,
        EndResp,
    ];
    assert_eq!(walk(Command::Write, &seq), Some(FsmState::Finished));
}

#[test]
fn read_sequence_with_partial_responses() {
    use TimePoint::*;
    let seq = [
        RequestPhaseBeg,
        BegReq,
        EndReq,
        BegPartResp,
        EndPartResp,
        BegPartResp,
        EndPartResp,
        BegResp,
        EndResp,
    ];
    assert_eq!(walk(Command::Read, &seq), Some(FsmState::Finished));
}

#[test]
fn illegal_transitions_are_rejected() {
    use TimePoint::*;
    // partial requests are write only, partial responses read only
    assert_eq!(walk(Command::Read, &[RequestPhaseBeg, BegPartReq]), None);
    assert_eq!(walk(Command::Write, &[RequestPhaseBeg, BegReq, EndReq, BegPartResp]), None);
    // no response before the request ended
    assert_eq!(FsmState::Request.advance(BegResp, Command::Read), None);
    // nothing after the end
    assert_eq!(FsmState::Finished.advance(EndResp, Command::Read), None);
    assert_eq!(FsmState::Created.advance(BegReq, Command::Write), None);
}

#[test]
fn arena_detects_stale_handles() {
    let mut arena = HandleArena::new();
    let a = arena.insert(FsmHandle::new(txn(Command::Read), Command::Read));
    assert_eq!(arena.len(), 1);
    arena.remove(a).expect("live handle");
    assert!(arena.is_empty());
    assert_eq!(arena.get(a).err(), Some(BridgeError::StaleHandle(a)));

    // the entry is reused under a new generation
    let b = arena.insert(FsmHandle::new(txn(Command::Write), Command::Write));
    assert_ne!(a, b);
    assert!(arena.get(a).is_err());
    assert_eq!(arena.get(b).map(|h| h.command).ok(), Some(Command::Write));
}

#[test]
fn arena_finds_by_identity() {
    let mut arena = HandleArena::new();
    let t1 = txn(Command::Read);
    let t2 = txn(Command::Read);
    let id1 = arena.insert(FsmHandle::new(t1.clone(), Command::Read));
    let id2 = arena.insert(FsmHandle::new(t2.clone(), Command::Read));
    assert_eq!(arena.find(&t1), Some(id1));
    assert_eq!(arena.find(&t2), Some(id2));
    // equal content, different transaction
    assert_eq!(arena.find(&txn(Command::Read)), None);
}

#[test]
fn slots_hold_one_handle() {
    let mut arena = HandleArena::new();
    let a = arena.insert(FsmHandle::new(txn(Command::Write), Command::Write));
    let b = arena.insert(FsmHandle::new(txn(Command::Write), Command::Write));
    let mut slots = Slots::default();

    slots.occupy(SlotKind::Req, Command::Write, a).expect("free slot");
    slots.occupy(SlotKind::Req, Command::Write, a).expect("same owner");
    assert_eq!(
        slots.occupy(SlotKind::Req, Command::Write, b),
        Err(BridgeError::SlotBusy {
            kind: SlotKind::Req,
            cmd: Command::Write,
            held: a
        })
    );
    // other kinds and commands are independent
    slots.occupy(SlotKind::ReqBeat, Command::Write, b).expect("free slot");
    slots.occupy(SlotKind::Req, Command::Read, b).expect("free slot");

    assert_eq!(slots.release(SlotKind::Req, Command::Write), Some(a));
    assert_eq!(slots.get(SlotKind::Req, Command::Write), None);
    slots.occupy(SlotKind::Req, Command::Write, b).expect("released");
}

fn pending(id: u32) -> PendingAddress {
    PendingAddress::sample(
        &AwSignals {
            valid: true,
            id,
            addr: 0x100 * u64::from(id),
            burst: 1,
            ..AwSignals::default()
        },
        0,
    )
}

#[test]
fn pending_queue_is_fifo_and_bounded() {
    let mut q = PendingQueue::new(2);
    assert!(q.push(pending(1)).is_ok());
    assert!(q.push(pending(2)).is_ok());
    assert!(q.is_full());
    let rejected = q.push(pending(3)).expect_err("queue is full");
    assert_eq!(rejected.id, 3);
    assert_eq!(q.pop().map(|p| p.id), Some(1));
    assert_eq!(q.pop().map(|p| p.id), Some(2));
    assert!(q.pop().is_none());
}

#[test]
fn stash_and_user_sampling() {
    let aw = AwSignals {
        valid: true,
        burst: 1,
        unique: true,
        stash_nid: 0x12,
        stash_nid_en: true,
        stash_lpid: 7,
        stash_lpid_en: false,
        user: 0xffff,
        ..AwSignals::default()
    };
    let p = PendingAddress::sample(&aw, 4);
    assert_eq!(p.stash_nid, Some(0x12));
    assert_eq!(p.stash_lpid, None);
    assert_eq!(p.user, 0xf);
    assert!(p.unique);

    let attrs = p.attributes().expect("valid encoding");
    assert_eq!(attrs.stash_nid, Some(0x12));
    assert_eq!(attrs.user, 0xf);

    let bad = PendingAddress { burst: 3, ..p };
    assert!(matches!(bad.attributes(), Err(BridgeError::InvalidEncoding { field: "burst", .. })));
}
