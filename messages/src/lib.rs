//! Messages exchanged at the trust boundary of Conclave, a privacy-preserving
//! distributed-aggregation service, with serialization and deserialization support.
//!
//! Every payload that crosses the boundary is a fixed-shape record defined here. Fields
//! that only the trusted side may interpret (`dc_message`, `user_message`,
//! `current_aggregated_value`, `sig`) are carried as [`OpaqueBytes`], a type that is
//! deliberately uninterpretable in this crate.

use anyhow::anyhow;
use base64::{display::Base64Display, engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use prio::codec::{decode_u32_items, encode_u32_items, CodecError, Decode, Encode};
use rand::{distributions::Standard, prelude::Distribution};
use serde::{
    de::{self, Visitor},
    Deserialize, Serialize, Serializer,
};
use std::{
    collections::HashSet,
    fmt::{self, Debug, Display, Formatter},
    io::{Cursor, Read},
    str::FromStr,
};

pub use prio::codec;


/// Errors returned by functions and methods in this module.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid parameter was passed.
    #[error("{0}")]
    InvalidParameter(&'static str),
    #[error("base64 decode failure: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

/// Identifier of one scheduling/aggregation epoch. Rounds are unsigned and monotonically
/// non-decreasing over the lifetime of a session.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Round(u32);

impl Round {
    /// Create a round from its wire counter.
    pub const fn from_number(round: u32) -> Self {
        Self(round)
    }

    /// Get this round's wire counter.
    pub fn as_number(&self) -> u32 {
        self.0
    }

    /// Return the round following this one. Fails if the round counter would overflow.
    pub fn increment(&self) -> Result<Self, Error> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(Error::InvalidParameter("round counter overflow"))
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for Round {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        self.0.encode(bytes)
    }

    fn encoded_len(&self) -> Option<usize> {
        self.0.encoded_len()
    }
}

impl Decode for Round {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Self(u32::decode(bytes)?))
    }
}

/// Identifier uniquely naming a registered client slot.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClientId([u8; Self::LEN]);

impl ClientId {
    /// LEN is the length of a client ID in bytes.
    pub const LEN: usize = 16;
}

impl Debug for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClientId({})",
            Base64Display::new(&self.0, &URL_SAFE_NO_PAD)
        )
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Base64Display::new(&self.0, &URL_SAFE_NO_PAD))
    }
}

impl Encode for ClientId {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        bytes.extend_from_slice(&self.0);
        Ok(())
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(Self::LEN)
    }
}

impl Decode for ClientId {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let mut decoded = [0u8; Self::LEN];
        bytes.read_exact(&mut decoded)?;
        Ok(Self(decoded))
    }
}

impl From<[u8; ClientId::LEN]> for ClientId {
    fn from(buf: [u8; ClientId::LEN]) -> Self {
        Self(buf)
    }
}

impl TryFrom<&[u8]> for ClientId {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(value.try_into().map_err(|_| {
            Error::InvalidParameter("byte slice has incorrect length for ClientId")
        })?))
    }
}

impl AsRef<[u8]> for ClientId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for ClientId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(URL_SAFE_NO_PAD.decode(s)?.as_ref())
    }
}

impl Distribution<ClientId> for Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> ClientId {
        ClientId(rng.gen())
    }
}

/// This customized implementation serializes a [`ClientId`] as a base64url-encoded string,
/// instead of as a byte array. This is more compact and ergonomic when serialized to YAML.
impl Serialize for ClientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = URL_SAFE_NO_PAD.encode(self.0);
        serializer.serialize_str(&encoded)
    }
}

struct ClientIdVisitor;

impl<'de> Visitor<'de> for ClientIdVisitor {
    type Value = ClientId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a base64url-encoded string that decodes to 16 bytes")
    }

    fn visit_str<E>(self, value: &str) -> Result<ClientId, E>
    where
        E: de::Error,
    {
        let decoded = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| E::custom("invalid base64url value"))?;

        ClientId::try_from(decoded.as_slice()).map_err(E::custom)
    }
}

/// This customized implementation deserializes a [`ClientId`] as a base64url-encoded
/// string, instead of as a byte array.
impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(ClientIdVisitor)
    }
}

/// Proof token attesting a client's finalized participation in a round. Footprints are
/// minted inside the trust boundary; this crate only moves them around.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Footprint([u8; Self::LEN]);

impl Footprint {
    /// LEN is the length of a footprint in bytes.
    pub const LEN: usize = 32;
}

impl Debug for Footprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Footprint({})",
            Base64Display::new(&self.0, &URL_SAFE_NO_PAD)
        )
    }
}

impl Display for Footprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Base64Display::new(&self.0, &URL_SAFE_NO_PAD))
    }
}

impl Encode for Footprint {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        bytes.extend_from_slice(&self.0);
        Ok(())
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(Self::LEN)
    }
}

impl Decode for Footprint {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let mut decoded = [0u8; Self::LEN];
        bytes.read_exact(&mut decoded)?;
        Ok(Self(decoded))
    }
}

impl From<[u8; Footprint::LEN]> for Footprint {
    fn from(buf: [u8; Footprint::LEN]) -> Self {
        Self(buf)
    }
}

impl TryFrom<&[u8]> for Footprint {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(value.try_into().map_err(|_| {
            Error::InvalidParameter("byte slice has incorrect length for Footprint")
        })?))
    }
}

impl AsRef<[u8]> for Footprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Distribution<Footprint> for Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Footprint {
        Footprint(rng.gen())
    }
}

/// An uninterpreted byte payload. Used for every field that only the trust boundary is
/// permitted to interpret: negotiation payloads, encrypted client contributions, running
/// accumulator values and signatures. At this layer the contents have no structure.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct OpaqueBytes(Vec<u8>);

impl OpaqueBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Contents are deliberately not printed.
impl Debug for OpaqueBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueBytes({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for OpaqueBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for OpaqueBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(Vec::from(bytes))
    }
}

impl Encode for OpaqueBytes {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_u32_items(bytes, &(), &self.0)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(4 + self.0.len())
    }
}

impl Decode for OpaqueBytes {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Self(decode_u32_items(&(), bytes)?))
    }
}

/// Per-slot participation bitmap for one round. The map has one entry per registered
/// client slot, and its length is the session's population size, constant for the
/// session's lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct ReservationMap(Vec<bool>);

impl ReservationMap {
    /// Create an empty map (no slot reserved) for the given population size.
    pub fn with_population(population: usize) -> Self {
        Self(vec![false; population])
    }

    /// The population size this map covers.
    pub fn population(&self) -> usize {
        self.0.len()
    }

    /// Whether the given slot is reserved. Returns `None` if the slot is out of range.
    pub fn get(&self, slot: usize) -> Option<bool> {
        self.0.get(slot).copied()
    }

    /// Mark the given slot reserved. Fails if the slot is out of range or already
    /// reserved.
    pub fn reserve(&mut self, slot: usize) -> Result<(), Error> {
        let entry = self
            .0
            .get_mut(slot)
            .ok_or(Error::InvalidParameter("slot out of range"))?;
        if *entry {
            return Err(Error::InvalidParameter("slot is already reserved"));
        }
        *entry = true;
        Ok(())
    }

    /// Number of reserved slots.
    pub fn reserved_count(&self) -> usize {
        self.0.iter().filter(|reserved| **reserved).count()
    }

    /// Iterator over the indexes of reserved slots, in ascending order.
    pub fn reserved_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(slot, reserved)| reserved.then_some(slot))
    }

    /// Iterator over the indexes of unreserved slots, in ascending order.
    pub fn unreserved_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(slot, reserved)| (!reserved).then_some(slot))
    }
}

impl Debug for ReservationMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReservationMap({}/{} reserved)",
            self.reserved_count(),
            self.population()
        )
    }
}

impl Encode for ReservationMap {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        let entries: Vec<u8> = self.0.iter().map(|reserved| u8::from(*reserved)).collect();
        encode_u32_items(bytes, &(), &entries)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(4 + self.0.len())
    }
}

impl Decode for ReservationMap {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let entries: Vec<u8> = decode_u32_items(&(), bytes)?;
        entries
            .into_iter()
            .map(|entry| match entry {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(CodecError::Other(
                    anyhow!("reservation map entry must be 0 or 1").into(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// A complete, self-contained snapshot of one round's scheduling progress. The trusted
/// side holds no hidden session: the host threads this state through every `schedule`
/// exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulingState {
    /// The round this snapshot belongs to.
    round: Round,
    /// Per-slot reservation bitmap.
    reservation_map: ReservationMap,
    /// Participation proof tokens for the slots reserved so far.
    footprints: Vec<Footprint>,
}

impl SchedulingState {
    /// Assemble a scheduling state. Fails if the footprint list contains duplicates.
    pub fn new(
        round: Round,
        reservation_map: ReservationMap,
        footprints: Vec<Footprint>,
    ) -> Result<Self, Error> {
        let mut seen = HashSet::with_capacity(footprints.len());
        for footprint in &footprints {
            if !seen.insert(footprint) {
                return Err(Error::InvalidParameter("duplicate footprint"));
            }
        }
        Ok(Self {
            round,
            reservation_map,
            footprints,
        })
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn reservation_map(&self) -> &ReservationMap {
        &self.reservation_map
    }

    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }
}

impl Encode for SchedulingState {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        self.round.encode(bytes)?;
        self.reservation_map.encode(bytes)?;
        encode_u32_items(bytes, &(), &self.footprints)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(
            self.round.encoded_len()?
                + self.reservation_map.encoded_len()?
                + 4
                + self.footprints.len() * Footprint::LEN,
        )
    }
}

impl Decode for SchedulingState {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let round = Round::decode(bytes)?;
        let reservation_map = ReservationMap::decode(bytes)?;
        let footprints = decode_u32_items(&(), bytes)?;
        Self::new(round, reservation_map, footprints).map_err(|err| CodecError::Other(err.into()))
    }
}

/// One `schedule` exchange, host to trusted side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulingRequest {
    /// The most recent scheduling state the host holds.
    cur_state: SchedulingState,
    /// The negotiation payload returned by the previous exchange, or empty on the first
    /// exchange of a round.
    cur_dc_message: OpaqueBytes,
}

impl SchedulingRequest {
    pub fn new(cur_state: SchedulingState, cur_dc_message: OpaqueBytes) -> Self {
        Self {
            cur_state,
            cur_dc_message,
        }
    }

    pub fn cur_state(&self) -> &SchedulingState {
        &self.cur_state
    }

    pub fn cur_dc_message(&self) -> &OpaqueBytes {
        &self.cur_dc_message
    }
}

impl Encode for SchedulingRequest {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        self.cur_state.encode(bytes)?;
        self.cur_dc_message.encode(bytes)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(self.cur_state.encoded_len()? + self.cur_dc_message.encoded_len()?)
    }
}

impl Decode for SchedulingRequest {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Self {
            cur_state: SchedulingState::decode(bytes)?,
            cur_dc_message: OpaqueBytes::decode(bytes)?,
        })
    }
}

/// One `schedule` exchange, trusted side to host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulingResponse {
    /// The advanced scheduling state, to be threaded into the next exchange verbatim.
    new_state: SchedulingState,
    /// Negotiation payload for the next exchange.
    new_dc_message: OpaqueBytes,
    /// When set, the round's client set is fixed and no further `schedule` exchange will
    /// be accepted for it.
    is_final: bool,
}

impl SchedulingResponse {
    pub fn new(new_state: SchedulingState, new_dc_message: OpaqueBytes, is_final: bool) -> Self {
        Self {
            new_state,
            new_dc_message,
            is_final,
        }
    }

    pub fn new_state(&self) -> &SchedulingState {
        &self.new_state
    }

    pub fn new_dc_message(&self) -> &OpaqueBytes {
        &self.new_dc_message
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

impl Encode for SchedulingResponse {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        self.new_state.encode(bytes)?;
        self.new_dc_message.encode(bytes)?;
        u8::from(self.is_final).encode(bytes)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(self.new_state.encoded_len()? + self.new_dc_message.encoded_len()? + 1)
    }
}

impl Decode for SchedulingResponse {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let new_state = SchedulingState::decode(bytes)?;
        let new_dc_message = OpaqueBytes::decode(bytes)?;
        let is_final = match u8::decode(bytes)? {
            0 => false,
            1 => true,
            _ => return Err(CodecError::UnexpectedValue),
        };
        Ok(Self {
            new_state,
            new_dc_message,
            is_final,
        })
    }
}

/// A running, self-verifying aggregate of client contributions for one round.
///
/// `sig` attests to exactly `(round, user_ids, aggregated_value)` and is recomputed by
/// the trusted side after every fold, so the object is verifiable for precisely the
/// committed participant set at all times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregation {
    /// The clients whose contributions have been folded in so far, in fold order, with
    /// no duplicates.
    user_ids: Vec<ClientId>,
    /// The opaque running accumulator.
    aggregated_value: OpaqueBytes,
    /// Signature over the canonical encoding of `(round, user_ids, aggregated_value)`.
    sig: OpaqueBytes,
}

impl Aggregation {
    /// Assemble an aggregation. Fails if the user ID list contains duplicates.
    pub fn new(
        user_ids: Vec<ClientId>,
        aggregated_value: OpaqueBytes,
        sig: OpaqueBytes,
    ) -> Result<Self, Error> {
        let mut seen = HashSet::with_capacity(user_ids.len());
        for user_id in &user_ids {
            if !seen.insert(user_id) {
                return Err(Error::InvalidParameter("duplicate user ID"));
            }
        }
        Ok(Self {
            user_ids,
            aggregated_value,
            sig,
        })
    }

    pub fn user_ids(&self) -> &[ClientId] {
        &self.user_ids
    }

    pub fn aggregated_value(&self) -> &OpaqueBytes {
        &self.aggregated_value
    }

    pub fn sig(&self) -> &OpaqueBytes {
        &self.sig
    }

    /// Whether the given client has already contributed to this aggregate.
    pub fn contains(&self, user_id: &ClientId) -> bool {
        self.user_ids.contains(user_id)
    }

    /// The canonical encoding of `(round, user_ids, aggregated_value)` that a signature
    /// over an aggregation attests to. User IDs are encoded in sorted order, so the
    /// attestation depends only on the participant set and never on fold order.
    pub fn signature_input(
        round: &Round,
        user_ids: &[ClientId],
        aggregated_value: &OpaqueBytes,
    ) -> Result<Vec<u8>, CodecError> {
        let mut canonical_user_ids = Vec::from(user_ids);
        canonical_user_ids.sort_unstable();

        let mut bytes = Vec::new();
        round.encode(&mut bytes)?;
        encode_u32_items(&mut bytes, &(), &canonical_user_ids)?;
        aggregated_value.encode(&mut bytes)?;
        Ok(bytes)
    }

    /// The canonical signed encoding for this aggregation at the given round.
    pub fn signed_payload(&self, round: &Round) -> Result<Vec<u8>, CodecError> {
        Self::signature_input(round, &self.user_ids, &self.aggregated_value)
    }
}

impl Encode for Aggregation {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_u32_items(bytes, &(), &self.user_ids)?;
        self.aggregated_value.encode(bytes)?;
        self.sig.encode(bytes)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(
            4 + self.user_ids.len() * ClientId::LEN
                + self.aggregated_value.encoded_len()?
                + self.sig.encoded_len()?,
        )
    }
}

impl Decode for Aggregation {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let user_ids = decode_u32_items(&(), bytes)?;
        let aggregated_value = OpaqueBytes::decode(bytes)?;
        let sig = OpaqueBytes::decode(bytes)?;
        Self::new(user_ids, aggregated_value, sig).map_err(|err| CodecError::Other(err.into()))
    }
}

/// One `aggregate` exchange, host to trusted side: fold a single client's contribution
/// into the running aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateRequest {
    /// The round this contribution belongs to.
    round: Round,
    /// The contributing client.
    user_id: ClientId,
    /// The client's encrypted contribution.
    user_message: OpaqueBytes,
    /// The running aggregate the host holds.
    current_agg: Aggregation,
}

impl AggregateRequest {
    pub fn new(
        round: Round,
        user_id: ClientId,
        user_message: OpaqueBytes,
        current_agg: Aggregation,
    ) -> Self {
        Self {
            round,
            user_id,
            user_message,
            current_agg,
        }
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn user_id(&self) -> &ClientId {
        &self.user_id
    }

    pub fn user_message(&self) -> &OpaqueBytes {
        &self.user_message
    }

    pub fn current_agg(&self) -> &Aggregation {
        &self.current_agg
    }
}

impl Encode for AggregateRequest {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        self.round.encode(bytes)?;
        self.user_id.encode(bytes)?;
        self.user_message.encode(bytes)?;
        self.current_agg.encode(bytes)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(
            self.round.encoded_len()?
                + self.user_id.encoded_len()?
                + self.user_message.encoded_len()?
                + self.current_agg.encoded_len()?,
        )
    }
}

impl Decode for AggregateRequest {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Self {
            round: Round::decode(bytes)?,
            user_id: ClientId::decode(bytes)?,
            user_message: OpaqueBytes::decode(bytes)?,
            current_agg: Aggregation::decode(bytes)?,
        })
    }
}

/// One `aggregate` exchange, trusted side to host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateResponse {
    /// The advanced aggregate.
    new_agg: Aggregation,
}

impl AggregateResponse {
    pub fn new(new_agg: Aggregation) -> Self {
        Self { new_agg }
    }

    pub fn new_agg(&self) -> &Aggregation {
        &self.new_agg
    }
}

impl Encode for AggregateResponse {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        self.new_agg.encode(bytes)
    }

    fn encoded_len(&self) -> Option<usize> {
        self.new_agg.encoded_len()
    }
}

impl Decode for AggregateResponse {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Self {
            new_agg: Aggregation::decode(bytes)?,
        })
    }
}

/// Zero-field acknowledgment, used by operations that return no payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Empty {}

impl Encode for Empty {
    fn encode(&self, _bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        Ok(())
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(0)
    }
}

impl Decode for Empty {
    fn decode(_bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Self {})
    }
}
