//! SV Ethernet frame encoder (component D).
//!
//! Builds one complete IEC 61850-9-2LE frame — 802.1Q + `EtherType`
//! `0x88BA` + SV header + `savPdu` — from a channel sample vector. The
//! encoder owns a reusable buffer sized to the worst-case MTU-limited
//! frame and never allocates on the hot path after warm-up.

use svts_common::{SvtsError, SvtsResult};

use crate::ber::write_tlv;
use crate::tags;

/// Matches `svts_sink::MAX_FRAME_LEN`; duplicated here so the codec has
/// no dependency on the transport crate.
const MAX_FRAME_LEN: usize = 1518;

/// Number of bytes in the SV header after the VLAN tag: `appId | length
/// | reserved1 | reserved2`, all 2 bytes wide.
const SV_HEADER_LEN: usize = 8;

/// One channel's value-and-quality pair for `seqData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSample {
    /// Scaled instantaneous value, per §4.C's 9-2LE convention.
    pub value: i32,
    /// Quality bitmask; `0x0000_0000` unless explicitly marked invalid.
    pub quality: u32,
}

impl ChannelSample {
    /// A valid sample with no quality flags raised.
    #[must_use]
    pub fn valid(value: i32) -> Self {
        Self { value, quality: 0 }
    }
}

/// Per-frame parameters that do not change tick-to-tick (drawn from the
/// stream's `StreamConfig` snapshot).
#[derive(Debug, Clone)]
pub struct FrameParams {
    /// Destination MAC address.
    pub mac_dst: [u8; 6],
    /// Source MAC address.
    pub mac_src: [u8; 6],
    /// 802.1Q VLAN id, 0..=4095.
    pub vlan_id: u16,
    /// 802.1Q priority, 0..=7.
    pub vlan_prio: u8,
    /// 802.1Q drop-eligible-indicator bit.
    pub vlan_dei: bool,
    /// Application id.
    pub app_id: u16,
    /// `svID`, at most 34 UTF-8 bytes.
    pub sv_id: String,
    /// Optional `datSet` reference, at most 65 bytes.
    pub dataset_ref: Option<String>,
    /// Configuration revision counter.
    pub conf_rev: u32,
    /// `smpRate` field value (samples per nominal period, or per second).
    pub smp_rate: u16,
}

/// Encodes complete SV frames into a reusable internal buffer.
///
/// All scratch space (the output frame, the `seqOfASDU` staging area,
/// the `savPdu` content staging area, and the per-ASDU staging areas)
/// is owned by the encoder and reused tick-to-tick via `clear()`, which
/// resets length but keeps the allocated capacity.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    buf: Vec<u8>,
    seq_of_asdu_scratch: Vec<u8>,
    pdu_content_scratch: Vec<u8>,
    asdu_scratch: Vec<u8>,
    seq_data_scratch: Vec<u8>,
}

impl FrameEncoder {
    /// Construct an encoder with buffers pre-sized to the MTU.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_FRAME_LEN),
            seq_of_asdu_scratch: Vec::with_capacity(MAX_FRAME_LEN),
            pdu_content_scratch: Vec::with_capacity(MAX_FRAME_LEN),
            asdu_scratch: Vec::with_capacity(256),
            seq_data_scratch: Vec::with_capacity(256),
        }
    }

    /// Encode one Ethernet frame carrying `n_asdu` ASDUs, one per entry
    /// of `asdus`, at contiguous `smpCnt` values starting at
    /// `smp_cnt_start`. Returns the encoded frame borrowed from the
    /// encoder's internal buffer.
    pub fn encode(
        &mut self,
        params: &FrameParams,
        smp_cnt_start: u16,
        asdus: &[Vec<ChannelSample>],
    ) -> SvtsResult<&[u8]> {
        if params.sv_id.as_bytes().len() > 34 {
            return Err(SvtsError::ConfigInvalid("svID exceeds 34 bytes".into()));
        }
        self.buf.clear();
        self.buf.extend_from_slice(&params.mac_dst);
        self.buf.extend_from_slice(&params.mac_src);
        self.buf.extend_from_slice(&tags::ETHERTYPE_VLAN.to_be_bytes());

        let tci = (u16::from(params.vlan_prio & 0x7) << 13)
            | (u16::from(params.vlan_dei) << 12)
            | (params.vlan_id & 0x0FFF);
        self.buf.extend_from_slice(&tci.to_be_bytes());
        self.buf.extend_from_slice(&tags::ETHERTYPE_SV.to_be_bytes());
        self.buf.extend_from_slice(&params.app_id.to_be_bytes());

        let length_field_pos = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 6]); // length(2) + reserved1(2) + reserved2(2)
        let pdu_start = self.buf.len();

        self.seq_of_asdu_scratch.clear();
        for (i, channels) in asdus.iter().enumerate() {
            let smp_cnt = smp_cnt_start.wrapping_add(i as u16);
            build_asdu(&mut self.asdu_scratch, &mut self.seq_data_scratch, params, smp_cnt, channels)?;
            write_tlv(&mut self.seq_of_asdu_scratch, tags::ASDU, &self.asdu_scratch)?;
        }

        self.pdu_content_scratch.clear();
        write_tlv(&mut self.pdu_content_scratch, tags::NO_ASDU, &[asdus.len() as u8])?;
        write_tlv(&mut self.pdu_content_scratch, tags::SEQ_OF_ASDU, &self.seq_of_asdu_scratch)?;
        write_tlv(&mut self.buf, tags::SAV_PDU, &self.pdu_content_scratch)?;

        let pdu_len = self.buf.len() - pdu_start;
        let length_value = u16::try_from(SV_HEADER_LEN + pdu_len).map_err(|_| {
            SvtsError::TooLarge {
                size: SV_HEADER_LEN + pdu_len,
                limit: usize::from(u16::MAX),
            }
        })?;
        self.buf[length_field_pos..length_field_pos + 2].copy_from_slice(&length_value.to_be_bytes());

        if self.buf.len() > MAX_FRAME_LEN {
            return Err(SvtsError::TooLarge {
                size: self.buf.len(),
                limit: MAX_FRAME_LEN,
            });
        }

        Ok(&self.buf)
    }

    /// The most recently encoded frame, if any.
    #[must_use]
    pub fn last_frame(&self) -> &[u8] {
        &self.buf
    }
}

/// Writes one ASDU's content into `asdu` (cleared first), using
/// `seq_data` as scratch space for the channel value/quality pairs.
/// Both buffers are caller-owned so repeated calls across a burst (and
/// across ticks) reuse their allocations.
fn build_asdu(
    asdu: &mut Vec<u8>,
    seq_data: &mut Vec<u8>,
    params: &FrameParams,
    smp_cnt: u16,
    channels: &[ChannelSample],
) -> SvtsResult<()> {
    asdu.clear();
    write_tlv(asdu, tags::SV_ID, params.sv_id.as_bytes())?;
    if let Some(dataset_ref) = &params.dataset_ref {
        if dataset_ref.as_bytes().len() > 65 {
            return Err(SvtsError::ConfigInvalid(
                "datSet reference exceeds 65 bytes".into(),
            ));
        }
        write_tlv(asdu, tags::SV_DAT_SET, dataset_ref.as_bytes())?;
    }
    write_tlv(asdu, tags::SMP_CNT, &smp_cnt.to_be_bytes())?;
    write_tlv(asdu, tags::SV_CONF_REV, &params.conf_rev.to_be_bytes())?;
    write_tlv(asdu, tags::SMP_SYNCH, &[0u8])?;
    write_tlv(asdu, tags::SMP_RATE, &params.smp_rate.to_be_bytes())?;

    seq_data.clear();
    for ch in channels {
        seq_data.extend_from_slice(&ch.value.to_be_bytes());
        seq_data.extend_from_slice(&ch.quality.to_be_bytes());
    }
    write_tlv(asdu, tags::SEQ_DATA, seq_data)?;
    Ok(())
}
