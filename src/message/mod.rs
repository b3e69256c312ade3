//! Typed, directional control messages.
//!
//! Control messages travel alongside buffers to signal stream boundaries,
//! timelines, metadata and requests. Every message carries an immutable
//! [`TypeCode`] that says which way it may travel and how a connection point
//! treats it:
//!
//! - **Downstream** messages flow with the data (EOS, segment, tags).
//! - **Upstream** messages flow against the data (seek, QoS, latency).
//! - **Serialized** messages keep their position relative to buffers and go
//!   through queues; the others are handled out of band.
//! - **Sticky** messages are cached at a connection point and replayed to
//!   consumers that attach later.
//!
//! # Example
//!
//! ```rust
//! use sluice::clock::ClockTime;
//! use sluice::message::{ControlMessage, MessageType, Segment};
//!
//! let segment = Segment::new_time(ClockTime::ZERO, Some(ClockTime::from_secs(10)));
//! let msg = ControlMessage::new_segment(segment.clone()).unwrap();
//!
//! assert_eq!(msg.message_type(), MessageType::Segment);
//! assert!(msg.is_downstream());
//! assert!(msg.is_serialized());
//! assert!(msg.is_sticky());
//! assert_eq!(msg.parse_segment(), Some(&segment));
//! ```

mod payload;
mod structure;
mod tags;

pub use payload::{
    BufferSize, Format, Gap, Qos, QosType, Seek, SeekFlags, SeekPosition, SeekType, Segment, Step,
    StreamFlags, StreamStart,
};
pub use structure::{Structure, Value};
pub use tags::{TagList, TagMergeMode, tag_names};

use crate::clock::{ClockTime, ClockTimeDiff};
use crate::error::{Error, Result};
use crate::object::{MiniObject, MiniObjectImpl};
use std::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// Type codes
// ============================================================================

/// Direction and queueing behaviour of a message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageTypeFlags(u32);

impl MessageTypeFlags {
    /// Travels toward the feeder.
    pub const UPSTREAM: Self = Self(1 << 0);
    /// Travels toward the consumer.
    pub const DOWNSTREAM: Self = Self(1 << 1);
    /// Keeps its order relative to buffers.
    pub const SERIALIZED: Self = Self(1 << 2);
    /// Cached at connection points and replayed.
    pub const STICKY: Self = Self(1 << 3);
    /// Both directions.
    pub const BOTH: Self = Self::UPSTREAM.union(Self::DOWNSTREAM);

    const D_SERIAL: Self = Self::DOWNSTREAM.union(Self::SERIALIZED);
    const D_STICKY: Self = Self::D_SERIAL.union(Self::STICKY);

    /// Create empty flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if contains a flag.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Kind of a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    /// Discard all queued data and unblock waiters.
    FlushStart,
    /// End a flush; optionally reset running time.
    FlushStop,
    /// Start of a new stream.
    StreamStart,
    /// New playback segment.
    Segment,
    /// Stream metadata.
    Tags,
    /// Buffering hint.
    BufferSize,
    /// Message to be posted once the sink renders up to this point.
    SinkMessage,
    /// No more data follows.
    Eos,
    /// No data for a stretch of time.
    Gap,
    /// Quality-of-service feedback.
    Qos,
    /// Reposition request.
    Seek,
    /// User interaction (key, mouse).
    Navigation,
    /// Configure the latency of the stream.
    Latency,
    /// Skip an amount of data.
    Step,
    /// Renegotiate the connection.
    Reconfigure,
    /// Application-defined, upstream.
    CustomUpstream,
    /// Application-defined, downstream, serialized.
    CustomDownstream,
    /// Application-defined, downstream, out of band.
    CustomDownstreamOob,
    /// Application-defined, downstream, sticky.
    CustomDownstreamSticky,
    /// Application-defined, both directions, serialized.
    CustomBoth,
    /// Application-defined, both directions, out of band.
    CustomBothOob,
}

/// Immutable header of a message type: ordinal, flags and sticky slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeCode {
    ty: MessageType,
    flags: MessageTypeFlags,
    sticky_index: Option<u8>,
}

impl TypeCode {
    const fn new(ty: MessageType, flags: MessageTypeFlags, sticky_index: Option<u8>) -> Self {
        Self {
            ty,
            flags,
            sticky_index,
        }
    }

    /// Message kind.
    pub const fn message_type(self) -> MessageType {
        self.ty
    }

    /// Direction and queueing flags.
    pub const fn flags(self) -> MessageTypeFlags {
        self.flags
    }

    /// Slot in the sticky cache, for sticky types.
    pub const fn sticky_index(self) -> Option<u8> {
        self.sticky_index
    }
}

/// Number of sticky cache slots.
pub const STICKY_SLOTS: usize = 7;

const TYPE_CODES: [TypeCode; 21] = {
    use MessageType as T;
    use MessageTypeFlags as F;
    [
        TypeCode::new(T::FlushStart, F::BOTH, None),
        TypeCode::new(T::FlushStop, F::BOTH.union(F::SERIALIZED), None),
        TypeCode::new(T::StreamStart, F::D_STICKY, Some(0)),
        TypeCode::new(T::Segment, F::D_STICKY, Some(1)),
        TypeCode::new(T::Tags, F::D_STICKY, Some(2)),
        TypeCode::new(T::BufferSize, F::D_STICKY, Some(3)),
        TypeCode::new(T::SinkMessage, F::D_STICKY, Some(4)),
        TypeCode::new(T::Eos, F::D_STICKY, Some(6)),
        TypeCode::new(T::Gap, F::D_SERIAL, None),
        TypeCode::new(T::Qos, F::UPSTREAM, None),
        TypeCode::new(T::Seek, F::UPSTREAM, None),
        TypeCode::new(T::Navigation, F::UPSTREAM, None),
        TypeCode::new(T::Latency, F::UPSTREAM, None),
        TypeCode::new(T::Step, F::UPSTREAM, None),
        TypeCode::new(T::Reconfigure, F::UPSTREAM, None),
        TypeCode::new(T::CustomUpstream, F::UPSTREAM, None),
        TypeCode::new(T::CustomDownstream, F::D_SERIAL, None),
        TypeCode::new(T::CustomDownstreamOob, F::DOWNSTREAM, None),
        TypeCode::new(T::CustomDownstreamSticky, F::D_STICKY, Some(5)),
        TypeCode::new(T::CustomBoth, F::BOTH.union(F::SERIALIZED), None),
        TypeCode::new(T::CustomBothOob, F::BOTH, None),
    ]
};

impl MessageType {
    /// Every message type, in ordinal order.
    pub const ALL: [MessageType; 21] = {
        let mut all = [MessageType::FlushStart; 21];
        let mut i = 0;
        while i < 21 {
            all[i] = TYPE_CODES[i].ty;
            i += 1;
        }
        all
    };

    /// The immutable type code of this kind.
    pub const fn code(self) -> TypeCode {
        TYPE_CODES[self as usize]
    }

    /// Direction and queueing flags.
    pub const fn flags(self) -> MessageTypeFlags {
        self.code().flags
    }

    /// Whether this is an application-defined kind.
    pub const fn is_custom(self) -> bool {
        matches!(
            self,
            MessageType::CustomUpstream
                | MessageType::CustomDownstream
                | MessageType::CustomDownstreamOob
                | MessageType::CustomDownstreamSticky
                | MessageType::CustomBoth
                | MessageType::CustomBothOob
        )
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            MessageType::FlushStart => "flush-start",
            MessageType::FlushStop => "flush-stop",
            MessageType::StreamStart => "stream-start",
            MessageType::Segment => "segment",
            MessageType::Tags => "tag",
            MessageType::BufferSize => "buffersize",
            MessageType::SinkMessage => "sink-message",
            MessageType::Eos => "eos",
            MessageType::Gap => "gap",
            MessageType::Qos => "qos",
            MessageType::Seek => "seek",
            MessageType::Navigation => "navigation",
            MessageType::Latency => "latency",
            MessageType::Step => "step",
            MessageType::Reconfigure => "reconfigure",
            MessageType::CustomUpstream => "custom-upstream",
            MessageType::CustomDownstream => "custom-downstream",
            MessageType::CustomDownstreamOob => "custom-downstream-oob",
            MessageType::CustomDownstreamSticky => "custom-downstream-sticky",
            MessageType::CustomBoth => "custom-both",
            MessageType::CustomBothOob => "custom-both-oob",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Message
// ============================================================================

fn next_seqnum() -> u32 {
    static SEQNUM: AtomicU32 = AtomicU32::new(1);
    loop {
        let seqnum = SEQNUM.fetch_add(1, Ordering::Relaxed);
        // 0 is reserved for "no sequence number"
        if seqnum != 0 {
            return seqnum;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    None,
    FlushStop { reset_time: bool },
    StreamStart(StreamStart),
    Segment(Segment),
    Tags(TagList),
    BufferSize(BufferSize),
    SinkMessage { name: String, message: Structure },
    Gap(Gap),
    Qos(Qos),
    Seek(Seek),
    Latency(ClockTime),
    Step(Step),
    Structure(Structure),
}

/// Contents of a [`ControlMessage`].
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    code: TypeCode,
    timestamp: ClockTime,
    seqnum: u32,
    payload: Payload,
}

/// A reference-counted control message.
pub type ControlMessage = MiniObject<Message>;

impl MiniObjectImpl for Message {
    const TYPE_NAME: &'static str = "ControlMessage";

    fn copy(&self) -> Option<Self> {
        Some(self.clone())
    }
}

impl Message {
    /// A message of kind `ty` without payload.
    ///
    /// The timestamp starts at zero and a fresh sequence number is assigned.
    pub fn new(ty: MessageType) -> Self {
        Self::with_payload(ty, Payload::None)
    }

    fn with_payload(ty: MessageType, payload: Payload) -> Self {
        Self {
            code: ty.code(),
            timestamp: ClockTime::ZERO,
            seqnum: next_seqnum(),
            payload,
        }
    }

    /// Message kind.
    pub fn message_type(&self) -> MessageType {
        self.code.ty
    }

    /// Immutable type code.
    pub fn type_code(&self) -> TypeCode {
        self.code
    }

    /// Human-readable name of the kind.
    pub fn type_name(&self) -> &'static str {
        self.code.ty.name()
    }

    /// Creation timestamp.
    pub fn timestamp(&self) -> ClockTime {
        self.timestamp
    }

    /// Set the timestamp.
    pub fn set_timestamp(&mut self, timestamp: ClockTime) {
        self.timestamp = timestamp;
    }

    /// Sequence number; related messages share one.
    pub fn seqnum(&self) -> u32 {
        self.seqnum
    }

    /// Make this message part of the sequence `seqnum`.
    pub fn set_seqnum(&mut self, seqnum: u32) {
        if seqnum == 0 {
            tracing::warn!(kind = self.type_name(), "ignoring invalid seqnum 0");
            return;
        }
        self.seqnum = seqnum;
    }

    /// Travels toward the feeder.
    pub fn is_upstream(&self) -> bool {
        self.code.flags.contains(MessageTypeFlags::UPSTREAM)
    }

    /// Travels toward the consumer.
    pub fn is_downstream(&self) -> bool {
        self.code.flags.contains(MessageTypeFlags::DOWNSTREAM)
    }

    /// Keeps its order relative to buffers.
    pub fn is_serialized(&self) -> bool {
        self.code.flags.contains(MessageTypeFlags::SERIALIZED)
    }

    /// Cached and replayed at connection points.
    pub fn is_sticky(&self) -> bool {
        self.code.flags.contains(MessageTypeFlags::STICKY)
    }

    /// Sticky cache slot.
    pub fn sticky_index(&self) -> Option<u8> {
        self.code.sticky_index
    }

    /// Structure carried by custom, navigation and sink messages.
    pub fn structure(&self) -> Option<&Structure> {
        match &self.payload {
            Payload::Structure(s) => Some(s),
            Payload::SinkMessage { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Mutable access to the carried structure.
    pub fn structure_mut(&mut self) -> Option<&mut Structure> {
        match &mut self.payload {
            Payload::Structure(s) => Some(s),
            Payload::SinkMessage { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether the carried structure is called `name`.
    pub fn has_name(&self, name: &str) -> bool {
        self.structure().is_some_and(|s| s.has_name(name))
    }

    // ------------------------------------------------------------------------
    // Parsers
    // ------------------------------------------------------------------------

    /// Reset-time flag of a flush-stop message.
    pub fn parse_flush_stop(&self) -> Option<bool> {
        match self.payload {
            Payload::FlushStop { reset_time } => Some(reset_time),
            _ => None,
        }
    }

    /// Stream start payload.
    pub fn parse_stream_start(&self) -> Option<&StreamStart> {
        match &self.payload {
            Payload::StreamStart(s) => Some(s),
            _ => None,
        }
    }

    /// Segment payload.
    pub fn parse_segment(&self) -> Option<&Segment> {
        match &self.payload {
            Payload::Segment(s) => Some(s),
            _ => None,
        }
    }

    /// Tag list payload.
    pub fn parse_tag(&self) -> Option<&TagList> {
        match &self.payload {
            Payload::Tags(t) => Some(t),
            _ => None,
        }
    }

    /// Buffer size payload.
    pub fn parse_buffer_size(&self) -> Option<&BufferSize> {
        match &self.payload {
            Payload::BufferSize(b) => Some(b),
            _ => None,
        }
    }

    /// Name and message of a sink-message.
    pub fn parse_sink_message(&self) -> Option<(&str, &Structure)> {
        match &self.payload {
            Payload::SinkMessage { name, message } => Some((name, message)),
            _ => None,
        }
    }

    /// Gap payload.
    pub fn parse_gap(&self) -> Option<&Gap> {
        match &self.payload {
            Payload::Gap(g) => Some(g),
            _ => None,
        }
    }

    /// QoS payload.
    pub fn parse_qos(&self) -> Option<&Qos> {
        match &self.payload {
            Payload::Qos(q) => Some(q),
            _ => None,
        }
    }

    /// Seek payload.
    pub fn parse_seek(&self) -> Option<&Seek> {
        match &self.payload {
            Payload::Seek(s) => Some(s),
            _ => None,
        }
    }

    /// Structure of a navigation message.
    pub fn parse_navigation(&self) -> Option<&Structure> {
        match (&self.payload, self.code.ty) {
            (Payload::Structure(s), MessageType::Navigation) => Some(s),
            _ => None,
        }
    }

    /// Latency of a latency message.
    pub fn parse_latency(&self) -> Option<ClockTime> {
        match self.payload {
            Payload::Latency(latency) => Some(latency),
            _ => None,
        }
    }

    /// Step payload.
    pub fn parse_step(&self) -> Option<&Step> {
        match &self.payload {
            Payload::Step(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidArgument(msg.into())
}

impl MiniObject<Message> {
    fn from_message(message: Message) -> Self {
        tracing::trace!(
            kind = message.type_name(),
            seqnum = message.seqnum,
            "created control message"
        );
        MiniObject::new(message)
    }

    /// Start a flush: waiters unblock and queued data is discarded.
    pub fn new_flush_start() -> Self {
        Self::from_message(Message::new(MessageType::FlushStart))
    }

    /// End a flush. `reset_time` asks consumers to reset running time.
    pub fn new_flush_stop(reset_time: bool) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::FlushStop,
            Payload::FlushStop { reset_time },
        ))
    }

    /// Announce a new stream.
    pub fn new_stream_start(stream_start: StreamStart) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::StreamStart,
            Payload::StreamStart(stream_start),
        ))
    }

    /// Announce a playback segment.
    ///
    /// Rejects zero rates and a stop position before the start.
    pub fn new_segment(segment: Segment) -> Result<Self> {
        if segment.rate == 0.0 {
            return Err(invalid("segment rate must not be zero"));
        }
        if segment.applied_rate == 0.0 {
            return Err(invalid("segment applied rate must not be zero"));
        }
        if let Some(stop) = segment.stop {
            if stop < segment.start {
                return Err(invalid(format!(
                    "segment stop {stop} before start {}",
                    segment.start
                )));
            }
        }
        Ok(Self::from_message(Message::with_payload(
            MessageType::Segment,
            Payload::Segment(segment),
        )))
    }

    /// Send stream metadata.
    pub fn new_tag(tags: TagList) -> Self {
        Self::from_message(Message::with_payload(MessageType::Tags, Payload::Tags(tags)))
    }

    /// Hint the buffering a consumer should provide.
    pub fn new_buffer_size(format: Format, min_size: i64, max_size: i64, is_async: bool) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::BufferSize,
            Payload::BufferSize(BufferSize {
                format,
                min_size,
                max_size,
                is_async,
            }),
        ))
    }

    /// Ask the sink to post `message` once it has rendered up to this point.
    pub fn new_sink_message(name: impl Into<String>, message: Structure) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::SinkMessage,
            Payload::SinkMessage {
                name: name.into(),
                message,
            },
        ))
    }

    /// Mark the end of the stream.
    pub fn new_eos() -> Self {
        Self::from_message(Message::new(MessageType::Eos))
    }

    /// Signal that no data arrives between `timestamp` and its end.
    pub fn new_gap(timestamp: ClockTime, duration: Option<ClockTime>) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::Gap,
            Payload::Gap(Gap {
                timestamp,
                duration,
            }),
        ))
    }

    /// Report processing quality upstream.
    pub fn new_qos(
        qos_type: QosType,
        proportion: f64,
        diff: ClockTimeDiff,
        timestamp: ClockTime,
    ) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::Qos,
            Payload::Qos(Qos {
                qos_type,
                proportion,
                diff,
                timestamp,
            }),
        ))
    }

    /// Request a new playback position. Rejects a zero rate.
    pub fn new_seek(seek: Seek) -> Result<Self> {
        if seek.rate == 0.0 {
            return Err(invalid("seek rate must not be zero"));
        }
        Ok(Self::from_message(Message::with_payload(
            MessageType::Seek,
            Payload::Seek(seek),
        )))
    }

    /// Forward a user interaction upstream.
    pub fn new_navigation(structure: Structure) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::Navigation,
            Payload::Structure(structure),
        ))
    }

    /// Configure the latency of the stream.
    pub fn new_latency(latency: ClockTime) -> Self {
        Self::from_message(Message::with_payload(
            MessageType::Latency,
            Payload::Latency(latency),
        ))
    }

    /// Request a step. Rejects a non-positive rate and an undefined format.
    pub fn new_step(
        format: Format,
        amount: u64,
        rate: f64,
        flush: bool,
        intermediate: bool,
    ) -> Result<Self> {
        if rate <= 0.0 || rate.is_nan() {
            return Err(invalid(format!("step rate must be positive, got {rate}")));
        }
        if format == Format::Undefined {
            return Err(invalid("step format must be defined"));
        }
        Ok(Self::from_message(Message::with_payload(
            MessageType::Step,
            Payload::Step(Step {
                format,
                amount,
                rate,
                flush,
                intermediate,
            }),
        )))
    }

    /// Ask upstream to renegotiate.
    pub fn new_reconfigure() -> Self {
        Self::from_message(Message::new(MessageType::Reconfigure))
    }

    /// Application-defined message of a custom kind.
    pub fn new_custom(ty: MessageType, structure: Structure) -> Result<Self> {
        if !ty.is_custom() {
            return Err(invalid(format!("{ty} is not a custom message type")));
        }
        Ok(Self::from_message(Message::with_payload(
            ty,
            Payload::Structure(structure),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_table_is_ordered() {
        for (i, ty) in MessageType::ALL.iter().enumerate() {
            assert_eq!(*ty as usize, i);
            assert_eq!(ty.code().message_type(), *ty);
        }
    }

    #[test]
    fn test_sticky_indices_unique() {
        let mut seen = [false; STICKY_SLOTS];
        for ty in MessageType::ALL {
            let code = ty.code();
            let sticky = code.flags().contains(MessageTypeFlags::STICKY);
            assert_eq!(sticky, code.sticky_index().is_some(), "{ty}");
            if let Some(index) = code.sticky_index() {
                assert!(!seen[index as usize], "duplicate sticky index for {ty}");
                seen[index as usize] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_direction_flags() {
        let eos = ControlMessage::new_eos();
        assert!(eos.is_downstream() && eos.is_serialized() && eos.is_sticky());
        assert!(!eos.is_upstream());

        let flush = ControlMessage::new_flush_start();
        assert!(flush.is_upstream() && flush.is_downstream());
        assert!(!flush.is_serialized());

        let stop = ControlMessage::new_flush_stop(true);
        assert!(stop.is_serialized());
        assert!(!stop.is_sticky());

        let seek = ControlMessage::new_seek(Seek::new_time(ClockTime::from_secs(3))).unwrap();
        assert!(seek.is_upstream() && !seek.is_downstream());
    }

    #[test]
    fn test_seqnum_monotonic_and_nonzero() {
        let a = ControlMessage::new_eos();
        let b = ControlMessage::new_eos();
        assert_ne!(a.seqnum(), 0);
        assert!(b.seqnum() > a.seqnum());
        assert_eq!(a.timestamp(), ClockTime::ZERO);
    }

    #[test]
    fn test_set_seqnum_rejects_zero() {
        let mut msg = ControlMessage::new_eos();
        let m = msg.get_mut().unwrap();
        let before = m.seqnum();
        m.set_seqnum(0);
        assert_eq!(m.seqnum(), before);
        m.set_seqnum(42);
        assert_eq!(m.seqnum(), 42);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(ControlMessage::new_seek(Seek::new_time(ClockTime::ZERO).with_rate(0.0)).is_err());
        assert!(ControlMessage::new_step(Format::Buffers, 1, 0.0, false, false).is_err());
        assert!(ControlMessage::new_step(Format::Buffers, 1, -1.0, false, false).is_err());
        assert!(ControlMessage::new_step(Format::Undefined, 1, 1.0, false, false).is_err());
        assert!(ControlMessage::new_segment(Segment::default().with_rate(0.0)).is_err());
        assert!(ControlMessage::new_segment(Segment::new_bytes(10, Some(5))).is_err());
        assert!(ControlMessage::new_custom(MessageType::Eos, Structure::new("x")).is_err());
    }

    #[test]
    fn test_parser_kind_mismatch() {
        let eos = ControlMessage::new_eos();
        assert!(eos.parse_segment().is_none());
        assert!(eos.parse_flush_stop().is_none());
        assert!(eos.structure().is_none());
        assert!(!eos.has_name("anything"));
    }

    #[test]
    fn test_copy_is_deep() {
        let mut tags = TagList::new();
        tags.set_title("one");
        let original = ControlMessage::new_tag(tags);
        let _shared = original.clone();

        let mut copy = original.copy().unwrap();
        assert_eq!(copy.seqnum(), original.seqnum());
        assert!(copy.is_writable());
        copy.get_mut().unwrap().set_timestamp(ClockTime::SECOND);

        assert_eq!(original.timestamp(), ClockTime::ZERO);
        assert_eq!(original.parse_tag().and_then(TagList::title), Some("one"));
    }

    #[test]
    fn test_navigation_structure() {
        let nav = ControlMessage::new_navigation(Structure::new("key-press").field("key", "a"));
        assert!(nav.has_name("key-press"));
        assert_eq!(nav.parse_navigation().and_then(|s| s.get_str("key")), Some("a"));

        let custom =
            ControlMessage::new_custom(MessageType::CustomUpstream, Structure::new("key-press"))
                .unwrap();
        assert!(custom.parse_navigation().is_none());
    }
}
