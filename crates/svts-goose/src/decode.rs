//! GOOSE frame/PDU decode (component E, decode half). Only decoding is
//! supported; publishing a GOOSE stream is not implemented here.

use svts_codec::ber::{decode_i64, decode_u64, iter_tlvs, read_tlv};
use svts_codec::tags;
use svts_common::{SvtsError, SvtsResult};

use crate::datamap::GooseValue;

/// One decoded GOOSE PDU (the fields named in the data model needed to
/// drive the subscriber and data-object map).
#[derive(Debug, Clone, PartialEq)]
pub struct GoosePdu {
    /// `appId` from the frame header (host order).
    pub app_id: u16,
    /// `gocbRef`.
    pub go_cb_ref: String,
    /// `datSet` reference.
    pub dataset_ref: String,
    /// `stNum`.
    pub st_num: u64,
    /// `sqNum`.
    pub sq_num: u64,
    /// `t`, the raw UTC-time octets (opaque; no PTP time sync is
    /// performed, so these are not interpreted against a local clock).
    pub t: Vec<u8>,
    /// `allData`, in declared dataset order.
    pub all_data: Vec<GooseValue>,
}

/// Decode one complete Ethernet II frame as a GOOSE PDU.
///
/// Returns `Ok(None)` when the frame's `EtherType` (after any 802.1Q
/// tag) is not `0x88B8` — a quick reject, never an error. A malformed
/// GOOSE-tagged frame is a `PARSE_ERROR`.
pub fn decode_frame(frame: &[u8]) -> SvtsResult<Option<GoosePdu>> {
    if frame.len() < 14 {
        return Err(SvtsError::ParseError("frame shorter than an Ethernet header".into()));
    }
    let mut offset = 12; // past dst(6) + src(6)
    let mut ethertype = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
    offset += 2;
    if ethertype == tags::ETHERTYPE_VLAN {
        if frame.len() < offset + 4 {
            return Err(SvtsError::ParseError("truncated VLAN tag".into()));
        }
        offset += 2; // skip TCI
        ethertype = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
        offset += 2;
    }
    if ethertype != tags::ETHERTYPE_GOOSE {
        return Ok(None);
    }
    if frame.len() < offset + 8 {
        return Err(SvtsError::ParseError("truncated GOOSE header".into()));
    }
    let app_id = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
    offset += 8; // appId(2) + length(2) + reserved1(2) + reserved2(2)

    let (tlv, _) = read_tlv(&frame[offset..])
        .map_err(|e| SvtsError::ParseError(format!("malformed gse:PDU: {e}")))?;
    if tlv.tag != tags::GOOSE_PDU {
        return Err(SvtsError::ParseError(format!(
            "expected gse:PDU tag 0x{:02X}, found 0x{:02X}",
            tags::GOOSE_PDU,
            tlv.tag
        )));
    }
    decode_pdu_content(app_id, tlv.content)
}

fn decode_pdu_content(app_id: u16, content: &[u8]) -> SvtsResult<Option<GoosePdu>> {
    let mut go_cb_ref = None;
    let mut dataset_ref = None;
    let mut st_num = None;
    let mut sq_num = None;
    let mut t = Vec::new();
    let mut all_data = Vec::new();

    for item in iter_tlvs(content) {
        let tlv = item.map_err(|e| SvtsError::ParseError(format!("malformed GOOSE field: {e}")))?;
        match tlv.tag {
            tags::GOCB_REF => go_cb_ref = Some(utf8_content(tlv.content)?),
            tags::GOOSE_DAT_SET => dataset_ref = Some(utf8_content(tlv.content)?),
            tags::GOOSE_T => t = tlv.content.to_vec(),
            tags::ST_NUM => st_num = Some(decode_u64(tlv.content)?),
            tags::SQ_NUM => sq_num = Some(decode_u64(tlv.content)?),
            tags::ALL_DATA => {
                for entry in iter_tlvs(tlv.content) {
                    let entry = entry.map_err(|e| {
                        SvtsError::ParseError(format!("malformed allData entry: {e}"))
                    })?;
                    all_data.push(decode_data_value(entry.tag, entry.content)?);
                }
            }
            // timeAllowedToLive, goID, test, confRev, ndsCom,
            // numDatSetEntries: not needed by the subscriber/evaluator.
            _ => {}
        }
    }

    let go_cb_ref = go_cb_ref.ok_or_else(|| SvtsError::ParseError("missing gocbRef".into()))?;
    let dataset_ref = dataset_ref.unwrap_or_default();
    let st_num = st_num.ok_or_else(|| SvtsError::ParseError("missing stNum".into()))?;
    let sq_num = sq_num.ok_or_else(|| SvtsError::ParseError("missing sqNum".into()))?;

    Ok(Some(GoosePdu {
        app_id,
        go_cb_ref,
        dataset_ref,
        st_num,
        sq_num,
        t,
        all_data,
    }))
}

fn utf8_content(content: &[u8]) -> SvtsResult<String> {
    std::str::from_utf8(content)
        .map(str::to_string)
        .map_err(|e| SvtsError::ParseError(format!("invalid UTF-8: {e}")))
}

fn decode_data_value(tag: u8, content: &[u8]) -> SvtsResult<GooseValue> {
    match tag {
        tags::DATA_BOOLEAN => {
            let byte = content
                .first()
                .ok_or_else(|| SvtsError::ParseError("empty boolean data item".to_string()))?;
            Ok(GooseValue::Bool(*byte != 0))
        }
        tags::DATA_INTEGER => decode_i64(content).map(GooseValue::Int),
        tags::DATA_UNSIGNED => decode_u64(content).map(GooseValue::Uint),
        tags::DATA_FLOAT => decode_float(content).map(GooseValue::Float),
        tags::DATA_UTF8_STRING => utf8_content(content).map(GooseValue::Utf8),
        tags::DATA_BIT_STRING => {
            // Leading octet is the BER "unused bits" count; the data
            // itself follows. Stored as raw octets (no bit-level view).
            let data = content.get(1..).unwrap_or(&[]);
            Ok(GooseValue::BitString(data.to_vec()))
        }
        other => Err(SvtsError::ParseError(format!(
            "unrecognized allData primitive tag 0x{other:02X}"
        ))),
    }
}

/// Decode an MMS `FloatingPoint` value: one exponent-width octet
/// followed by a big-endian IEEE-754 binary32 (the only width this
/// decoder needs to support for 9-2LE/GOOSE test gear).
fn decode_float(content: &[u8]) -> SvtsResult<f64> {
    if content.len() != 5 {
        return Err(SvtsError::ParseError(format!(
            "float data item must be 5 bytes (1 exponent-width + 4 IEEE-754), got {}",
            content.len()
        )));
    }
    let bits = u32::from_be_bytes([content[1], content[2], content[3], content[4]]);
    Ok(f64::from(f32::from_bits(bits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use svts_codec::ber::write_tlv;

    fn build_goose_frame(ethertype_is_goose: bool) -> Vec<u8> {
        let mut pdu_content = Vec::new();
        write_tlv(&mut pdu_content, tags::GOCB_REF, b"IED1GOOSE1/LLN0$GO$gcb1").unwrap();
        write_tlv(&mut pdu_content, tags::GOOSE_DAT_SET, b"IED1LD0/LLN0$DataSet1").unwrap();
        write_tlv(&mut pdu_content, tags::ST_NUM, &[3u8]).unwrap();
        write_tlv(&mut pdu_content, tags::SQ_NUM, &[0u8]).unwrap();

        let mut all_data = Vec::new();
        write_tlv(&mut all_data, tags::DATA_BOOLEAN, &[1u8]).unwrap();
        write_tlv(&mut all_data, tags::DATA_INTEGER, &0i32.to_be_bytes()).unwrap();
        write_tlv(&mut pdu_content, tags::ALL_DATA, &all_data).unwrap();

        let mut pdu = Vec::new();
        write_tlv(&mut pdu, tags::GOOSE_PDU, &pdu_content).unwrap();

        let mut frame = Vec::new();
        frame.extend_from_slice(&[0xAA; 6]); // dst
        frame.extend_from_slice(&[0xBB; 6]); // src
        let ethertype = if ethertype_is_goose {
            tags::ETHERTYPE_GOOSE
        } else {
            tags::ETHERTYPE_SV
        };
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(&0x0001u16.to_be_bytes()); // appId
        frame.extend_from_slice(&[0u8; 6]); // length + reserved1 + reserved2
        frame.extend_from_slice(&pdu);
        frame
    }

    #[test]
    fn test_decode_valid_goose_frame() {
        let frame = build_goose_frame(true);
        let pdu = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(pdu.go_cb_ref, "IED1GOOSE1/LLN0$GO$gcb1");
        assert_eq!(pdu.st_num, 3);
        assert_eq!(pdu.sq_num, 0);
        assert_eq!(pdu.all_data.len(), 2);
        assert_eq!(pdu.all_data[0], GooseValue::Bool(true));
        assert_eq!(pdu.all_data[1], GooseValue::Int(0));
    }

    #[test]
    fn test_non_goose_ethertype_is_quick_reject_not_error() {
        let frame = build_goose_frame(false);
        assert_eq!(decode_frame(&frame).unwrap(), None);
    }

    #[test]
    fn test_truncated_frame_is_parse_error() {
        let frame = vec![0u8; 4];
        assert!(decode_frame(&frame).is_err());
    }

    #[test]
    fn test_vlan_tagged_goose_frame_decodes() {
        let mut frame = vec![0xAAu8; 6];
        frame.extend_from_slice(&[0xBBu8; 6]);
        frame.extend_from_slice(&tags::ETHERTYPE_VLAN.to_be_bytes());
        frame.extend_from_slice(&0x8000u16.to_be_bytes()); // TCI
        frame.extend_from_slice(&tags::ETHERTYPE_GOOSE.to_be_bytes());
        frame.extend_from_slice(&0x0001u16.to_be_bytes());
        frame.extend_from_slice(&[0u8; 6]);

        let mut pdu_content = Vec::new();
        write_tlv(&mut pdu_content, tags::GOCB_REF, b"x").unwrap();
        write_tlv(&mut pdu_content, tags::GOOSE_DAT_SET, b"y").unwrap();
        write_tlv(&mut pdu_content, tags::ST_NUM, &[1u8]).unwrap();
        write_tlv(&mut pdu_content, tags::SQ_NUM, &[0u8]).unwrap();
        let mut pdu = Vec::new();
        write_tlv(&mut pdu, tags::GOOSE_PDU, &pdu_content).unwrap();
        frame.extend_from_slice(&pdu);

        let decoded = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(decoded.go_cb_ref, "x");
    }
}
